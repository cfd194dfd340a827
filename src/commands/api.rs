// src/commands/api.rs

use anyhow::{anyhow, Context, Result};
use revtag::{validate_parent_list_bounded, ContentHash, RevisionTag};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::ancestry::AncestryCache;
use crate::commands::init::ensure_initialized;
use crate::config::CoreConfig;
use crate::graph::RevisionTree;
use crate::services::{DirRevisionStore, OfflineSwarm, RevisionStorage};

/// One archive directory opened for inspection. Lookups never leave the machine.
pub struct Commands {
    root: PathBuf,
    config: CoreConfig,
    store: Arc<DirRevisionStore>,
    tree: RevisionTree,
}

#[derive(Debug, Serialize)]
pub struct CommitReport {
    pub tag: RevisionTag,
    pub height: u64,
    pub parents: Vec<RevisionTag>,
}

#[derive(Debug, Serialize)]
pub struct TagSummary {
    pub tag: RevisionTag,
    pub short: String,
    pub height: u64,
}

impl From<RevisionTag> for TagSummary {
    fn from(tag: RevisionTag) -> Self {
        Self {
            tag,
            short: tag.to_string(),
            height: tag.height(),
        }
    }
}

impl Commands {
    pub fn open(root: &Path) -> Result<Self> {
        let report = ensure_initialized(root)?;
        if !report.created.is_empty() {
            info!(root = ?report.root, created = ?report.created, "initialized archive");
        }
        let config = CoreConfig::load(&report.root)?;
        let store = Arc::new(DirRevisionStore::open(&report.root)?);
        let cache = AncestryCache::open(store.clone(), Arc::new(OfflineSwarm), config.ancestry_config());
        Ok(Self {
            root: report.root,
            config,
            store,
            tree: RevisionTree::new(Arc::new(cache)),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn tree(&self) -> &RevisionTree {
        &self.tree
    }

    /// Hex tag, unique hex prefix of a stored revision, or `blank`.
    pub async fn resolve(&self, input: &str) -> Result<RevisionTag> {
        if input.eq_ignore_ascii_case("blank") {
            return Ok(RevisionTag::blank());
        }
        if let Ok(tag) = RevisionTag::from_hex(input) {
            return Ok(tag);
        }
        match self.store.resolve(input) {
            Ok(tag) => Ok(tag),
            Err(local) => self
                .tree
                .tag_with_prefix(input)
                .await
                .ok_or_else(|| local.context(format!("unable to resolve revision {:?}", input))),
        }
    }

    async fn resolve_all(&self, inputs: &[String]) -> Result<Vec<RevisionTag>> {
        let mut tags = Vec::with_capacity(inputs.len());
        for input in inputs {
            tags.push(self.resolve(input).await?);
        }
        Ok(tags)
    }

    /// Record `content` as a new revision on top of `parents` (the current tips if none are
    /// given).
    pub async fn commit(&self, content: &[u8], parents: &[String]) -> Result<CommitReport> {
        let parents = if parents.is_empty() {
            self.store.branch_tips()
        } else {
            self.resolve_all(parents).await?
        };
        let cache = self.tree.cache();
        let planned = RevisionTag::commit(ContentHash::of(content), &parents);
        validate_parent_list_bounded(&planned, &parents, cache.config().max_parents)
            .with_context(|| format!("refusing to commit revision {}", planned))?;

        let tag = self.store.commit(content, &parents)?;
        cache
            .add_parents_for_tag(&tag, parents.clone())
            .with_context(|| format!("new revision {} failed its own parent check", tag))?;
        debug!(tag = %tag, parents = parents.len(), "committed revision");
        Ok(CommitReport {
            tag,
            height: tag.height(),
            parents,
        })
    }

    pub async fn parents(&self, input: &str) -> Result<Vec<RevisionTag>> {
        let tag = self.resolve(input).await?;
        let parents = self.tree.parents_for_tag(&tag).await?;
        Ok(parents.to_vec())
    }

    pub async fn common(&self, inputs: &[String]) -> Result<RevisionTag> {
        let tags = self.resolve_all(inputs).await?;
        Ok(self.tree.common_ancestor(tags).await?)
    }

    pub async fn descends(&self, input: &str, ancestor: &str) -> Result<bool> {
        let tag = self.resolve(input).await?;
        let ancestor = self.resolve(ancestor).await?;
        Ok(self.tree.descendent_of(tag, ancestor).await?)
    }

    pub async fn superseded(&self, new_tag: &str, existing: &str) -> Result<bool> {
        let new_tag = self.resolve(new_tag).await?;
        let existing = self.resolve(existing).await?;
        Ok(self.tree.superceded_by(new_tag, existing).await?)
    }

    pub async fn is_superseded(&self, input: &str) -> Result<bool> {
        let tag = self.resolve(input).await?;
        Ok(self.tree.is_superceded(tag).await?)
    }

    pub async fn minimal(&self, inputs: &[String]) -> Result<BTreeSet<RevisionTag>> {
        let tags = self.resolve_all(inputs).await?;
        Ok(self.tree.minimal_set(tags).await?)
    }

    pub async fn bases(&self, inputs: &[String]) -> Result<BTreeSet<RevisionTag>> {
        let tags = self.resolve_all(inputs).await?;
        Ok(self.tree.canonical_bases(tags).await?)
    }

    pub fn tips(&self) -> Vec<TagSummary> {
        self.store.branch_tips().into_iter().map(TagSummary::from).collect()
    }

    pub async fn find(&self, prefix: &str) -> Result<TagSummary> {
        self.tree
            .tag_with_prefix(prefix)
            .await
            .map(TagSummary::from)
            .ok_or_else(|| anyhow!("no revision reachable from the tips matches {:?}", prefix))
    }

    /// Write the ancestry snapshot if persistence is enabled.
    pub fn persist(&self) -> Result<()> {
        if self.tree.cache().config().snapshot_path.is_none() {
            return Ok(());
        }
        let written = self.tree.cache().save_snapshot()?;
        debug!(records = written, "ancestry snapshot saved");
        Ok(())
    }
}
