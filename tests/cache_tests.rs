mod common;

use common::*;
use revtag::{parent_commitment, ContentHash, RevisionTag, TagError};
use revtree::ancestry::AncestryCache;
use revtree::error::AncestryError;
use revtree::services::{ChannelSwarm, MemoryRevisionStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};

#[tokio::test]
async fn local_parents_are_validated_and_memoized() {
    let dag = Dag::new();
    let p = dag.root("p");
    let x = dag.commit("x", p);
    let cache = local_cache(dag.store.clone());
    assert!(cache.is_empty());

    assert!(cache.has_parents_for_tag(&x));
    assert!(!cache.is_empty());
    let parents = cache.parents_for_tag(&x).await.unwrap();
    assert_eq!(&parents[..], &[p]);
    assert!(cache.parents_for_tag(&p).await.unwrap().is_empty());

    // blank, x, p
    assert_eq!(cache.len(), 3);

    // once memoized, losing the local copy does not matter
    dag.store.remove(&x);
    assert_eq!(&cache.parents_for_tag_nonblocking(&x).unwrap()[..], &[p]);
}

#[tokio::test]
async fn blank_is_known_from_the_start() {
    let cache = local_cache(Arc::new(MemoryRevisionStore::new()));
    assert!(cache.parents_for_tag(&RevisionTag::blank()).await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn corrupt_local_record_is_never_cached() {
    let dag = Dag::new();
    let p = dag.root("p");
    let q = dag.root("q");
    let x = detached("x", &[p]);
    // stored record claims the wrong parent
    dag.store.insert(x, vec![q]);
    let cache = local_cache(dag.store.clone());

    assert!(!cache.has_parents_for_tag(&x));
    let err = cache.parents_for_tag(&x).await.unwrap_err();
    assert_eq!(err, AncestryError::NotFound { tag: x });
    assert!(cache.parents_for_tag_nonblocking(&x).is_none());
}

#[tokio::test(start_paused = true)]
async fn offline_lookup_fails_within_timeout_without_blocking_others() {
    let dag = Dag::new();
    let p = dag.root("p");
    let missing = detached("gone", &[p]);
    let cache = local_cache(dag.store.clone());

    let started = Instant::now();
    let (absent, present) = tokio::join!(cache.parents_for_tag(&missing), async {
        let parents = cache.parents_for_tag(&p).await;
        (parents, started.elapsed())
    });

    assert_eq!(absent.unwrap_err(), AncestryError::NotFound { tag: missing });
    let waited = started.elapsed();
    assert!(waited >= LOOKUP_TIMEOUT);
    assert!(waited < LOOKUP_TIMEOUT + Duration::from_millis(50));

    let (parents, answered_after) = present;
    assert!(parents.unwrap().is_empty());
    assert_eq!(answered_after, Duration::ZERO);
    assert_eq!(cache.pending_len(), 0);
}

#[tokio::test(start_paused = true)]
async fn network_response_wakes_every_waiter_with_one_request() {
    let remote = Dag::new();
    let p = remote.root("p");
    let x = remote.commit("x", p);
    let (cache, peer) = remote_cache(remote.store.clone(), PeerBehavior::Delayed(Duration::from_millis(50)), test_config());

    let (a, b) = tokio::join!(cache.parents_for_tag(&x), cache.parents_for_tag(&x));
    assert_eq!(&a.unwrap()[..], &[p]);
    assert_eq!(&b.unwrap()[..], &[p]);
    assert_eq!(peer.request_count(), 1);
    assert!(cache.has_parents_for_tag(&x));
    assert_eq!(cache.pending_len(), 0);
}

#[tokio::test(start_paused = true)]
async fn timeout_only_affects_its_own_waiter() {
    let remote = Dag::new();
    let p = remote.root("p");
    let x = remote.commit("x", p);
    let (swarm, _requests) = ChannelSwarm::new();
    let cache = AncestryCache::new(Arc::new(MemoryRevisionStore::new()), Arc::new(swarm), test_config());

    let (short, answer, long) = tokio::join!(
        cache.parents_for_tag_with_timeout(&x, Some(Duration::from_millis(100))),
        async {
            sleep(Duration::from_millis(500)).await;
            cache.receive_parents(&x, vec![p])
        },
        cache.parents_for_tag_with_timeout(&x, Some(Duration::from_secs(1))),
    );

    assert_eq!(short.unwrap_err(), AncestryError::NotFound { tag: x });
    answer.unwrap();
    assert_eq!(&long.unwrap()[..], &[p]);
}

#[tokio::test(start_paused = true)]
async fn invalid_response_is_ignored_and_waiters_keep_waiting() {
    let remote = Dag::new();
    let p = remote.root("p");
    let q = remote.root("q");
    let x = remote.commit("x", p);
    let (swarm, _requests) = ChannelSwarm::new();
    let cache = AncestryCache::new(Arc::new(MemoryRevisionStore::new()), Arc::new(swarm), test_config());

    let (waiter, _) = tokio::join!(cache.parents_for_tag_with_timeout(&x, None), async {
        sleep(Duration::from_millis(10)).await;
        let forged = cache.receive_parents(&x, vec![q]);
        assert!(matches!(
            forged,
            Err(AncestryError::Integrity(TagError::ParentCommitmentMismatch { .. }))
        ));
        assert!(!cache.has_parents_for_tag(&x));
        assert_eq!(cache.pending_len(), 1);

        sleep(Duration::from_millis(10)).await;
        cache.receive_parents(&x, vec![p]).unwrap();
    });

    assert_eq!(&waiter.unwrap()[..], &[p]);
}

#[tokio::test(start_paused = true)]
async fn corrupt_peer_never_poisons_the_cache() {
    let remote = Dag::new();
    let p = remote.root("p");
    let x = remote.commit("x", p);
    let (cache, peer) = remote_cache(remote.store.clone(), PeerBehavior::Corrupt, test_config());

    let err = cache.parents_for_tag(&x).await.unwrap_err();
    assert_eq!(err, AncestryError::NotFound { tag: x });
    assert_eq!(peer.request_count(), 1);
    assert!(!cache.has_parents_for_tag(&x));
}

#[tokio::test(start_paused = true)]
async fn repeated_requests_are_throttled_by_retry_interval() {
    let remote = Dag::new();
    let x = remote.commit("x", remote.root("p"));
    let (cache, peer) = remote_cache(remote.store.clone(), PeerBehavior::Silent, test_config());

    // both time out inside the one-second retry interval
    assert!(cache.parents_for_tag(&x).await.is_err());
    assert!(cache.parents_for_tag(&x).await.is_err());
    tokio::task::yield_now().await;
    assert_eq!(peer.request_count(), 1);

    sleep(Duration::from_secs(1)).await;
    assert!(cache.parents_for_tag(&x).await.is_err());
    tokio::task::yield_now().await;
    assert_eq!(peer.request_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn clear_forgets_entries_and_releases_waiters() {
    let dag = Dag::new();
    let p = dag.root("p");
    let x = detached("x", &[p]);
    let cache = local_cache(dag.store.clone());
    assert!(cache.has_parents_for_tag(&p));

    let (waiter, _) = tokio::join!(cache.parents_for_tag_with_timeout(&x, None), async {
        tokio::task::yield_now().await;
        cache.clear();
    });
    assert_eq!(waiter.unwrap_err(), AncestryError::NotFound { tag: x });
    assert_eq!(cache.len(), 1);
    assert!(cache.is_empty());
    assert_eq!(cache.pending_len(), 0);
}

#[tokio::test]
async fn direct_inserts_are_validated_and_bounded() {
    let dag = Dag::new();
    let roots: Vec<RevisionTag> = (0..9).map(|i| dag.root(&format!("r{i}"))).collect();
    let wide = detached("wide", &roots);
    let narrow = detached("narrow", &roots[..2]);
    let cache = local_cache(Arc::new(MemoryRevisionStore::new()));

    let err = cache.add_parents_for_tag(&wide, roots.clone()).unwrap_err();
    assert!(matches!(
        err,
        AncestryError::Integrity(TagError::TooManyParents { count: 9, max: 8, .. })
    ));

    assert!(cache.add_parents_for_tag(&narrow, roots[..1].to_vec()).is_err());
    let parents = cache.add_parents_for_tag(&narrow, roots[..2].to_vec()).unwrap();
    assert_eq!(parents.len(), 2);
    assert!(cache.has_parents_for_tag(&narrow));
}

#[tokio::test(start_paused = true)]
async fn response_with_overflowing_parent_height_is_rejected() {
    let top = RevisionTag::new(ContentHash::of(b"top"), u64::MAX, parent_commitment(&[]));
    let forged = RevisionTag::new(ContentHash::of(b"forged"), 0, parent_commitment(&[top]));
    let (swarm, _requests) = ChannelSwarm::new();
    let cache = AncestryCache::new(Arc::new(MemoryRevisionStore::new()), Arc::new(swarm), test_config());

    let (waiter, _) = tokio::join!(cache.parents_for_tag_with_timeout(&forged, Some(LOOKUP_TIMEOUT)), async {
        tokio::task::yield_now().await;
        let err = cache.receive_parents(&forged, vec![top]).unwrap_err();
        assert_eq!(err, AncestryError::Integrity(TagError::HeightOverflow { tag: forged }));
        assert!(!cache.has_parents_for_tag(&forged));
    });

    assert_eq!(waiter.unwrap_err(), AncestryError::NotFound { tag: forged });
    assert!(cache.add_parents_for_tag(&forged, vec![top]).is_err());
    assert_eq!(cache.len(), 1);
}
