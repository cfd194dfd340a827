use revtag::RevisionTag;
use revtree::commands::Commands;
use revtree::services::{DirRevisionStore, RevisionStorage};
use std::collections::BTreeSet;

#[tokio::test]
async fn commits_and_queries_through_a_directory_archive() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let cmds = Commands::open(dir.path())?;

    let root = cmds.commit(b"root", &[]).await?;
    assert_eq!(root.height, 0);
    assert!(root.parents.is_empty());

    let root_hex = root.tag.to_hex();
    let left = cmds.commit(b"left", &[root_hex[..16].to_string()]).await?;
    let right = cmds.commit(b"right", &[root_hex.clone()]).await?;
    let names = vec![left.tag.to_hex(), right.tag.to_hex()];
    let merge = cmds.commit(b"merge", &names).await?;
    assert_eq!(merge.height, 2);

    let tips: Vec<RevisionTag> = cmds.tips().into_iter().map(|t| t.tag).collect();
    assert_eq!(tips, vec![merge.tag]);

    assert_eq!(cmds.common(&names).await?, root.tag);
    assert!(cmds.descends(&merge.tag.to_hex(), &root_hex).await?);
    assert!(cmds.is_superseded(&left.tag.to_hex()).await?);
    assert_eq!(
        cmds.minimal(&[root_hex.clone(), left.tag.to_hex(), merge.tag.to_hex()]).await?,
        BTreeSet::from([merge.tag])
    );
    assert_eq!(
        cmds.bases(&[merge.tag.to_hex()]).await?,
        BTreeSet::from([left.tag, right.tag])
    );
    assert_eq!(cmds.find(&left.tag.to_hex()[..10]).await?.tag, left.tag);
    assert_eq!(cmds.resolve("blank").await?, RevisionTag::blank());

    cmds.persist()?;
    assert!(dir.path().join("ancestry.snapshot").exists());
    Ok(())
}

#[tokio::test]
async fn reopened_archive_warms_from_its_snapshot() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let (first, second) = {
        let cmds = Commands::open(dir.path())?;
        let first = cmds.commit(b"one", &[]).await?;
        // no parents given: builds on the current tip
        let second = cmds.commit(b"two", &[]).await?;
        cmds.persist()?;
        (first.tag, second.tag)
    };

    let reopened = Commands::open(dir.path())?;
    let cache = reopened.tree().cache();
    assert!(cache.len() >= 3);
    assert!(cache.has_parents_for_tag(&first));
    assert_eq!(reopened.parents(&second.to_hex()).await?, vec![first]);
    Ok(())
}

#[test]
fn directory_store_resolves_unique_prefixes_only() {
    let dir = tempfile::tempdir().unwrap();
    let store = DirRevisionStore::open(dir.path()).unwrap();
    let a = store.commit(b"a", &[]).unwrap();
    let b = store.commit(b"b", &[a]).unwrap();

    assert_eq!(store.resolve(&a.to_hex()[..12]).unwrap(), a);
    assert_eq!(store.resolve(&b.to_hex().to_uppercase()).unwrap(), b);
    assert!(store.resolve("").is_err());
    assert!(store.resolve("zz").is_err());
    assert_eq!(store.read_declared_parents(&b).unwrap(), vec![a]);
    assert_eq!(store.branch_tips(), vec![b]);

    let mut all = store.local_revisions();
    all.sort();
    assert_eq!(all, vec![a, b]);
}

#[test]
fn directory_store_rejects_damaged_records() {
    let dir = tempfile::tempdir().unwrap();
    let store = DirRevisionStore::open(dir.path()).unwrap();
    let a = store.commit(b"a", &[]).unwrap();
    let b = store.commit(b"b", &[a]).unwrap();

    let record = dir.path().join("revisions").join(b.to_hex());
    let mut bytes = std::fs::read(&record).unwrap();
    bytes.truncate(bytes.len() - 1);
    std::fs::write(&record, bytes).unwrap();

    assert!(store.has_local_content(&b));
    assert!(store.read_declared_parents(&b).is_err());
}

#[tokio::test]
async fn rejected_commit_leaves_the_archive_untouched() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    std::fs::write(
        dir.path().join("config.toml"),
        "[ancestry]\nmax_parents_per_revision = 2\n",
    )?;
    let cmds = Commands::open(dir.path())?;

    let mut names = Vec::new();
    for label in ["a", "b", "c"] {
        names.push(cmds.commit(label.as_bytes(), &["blank".to_string()]).await?.tag.to_hex());
    }
    let tips_before: Vec<RevisionTag> = cmds.tips().into_iter().map(|t| t.tag).collect();
    assert_eq!(tips_before.len(), 3);

    assert!(cmds.commit(b"too wide", &names).await.is_err());

    let tips_after: Vec<RevisionTag> = cmds.tips().into_iter().map(|t| t.tag).collect();
    assert_eq!(tips_after, tips_before);
    let store = DirRevisionStore::open(dir.path())?;
    assert_eq!(store.local_revisions().len(), 3);

    // within the bound the merge goes through
    let merge = cmds.commit(b"merge", &names[..2]).await?;
    assert_eq!(merge.parents.len(), 2);
    Ok(())
}
