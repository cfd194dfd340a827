// src/services/dir_store.rs
//! DirRevisionStore: content-addressed revision store on the filesystem.
//!
//! - Content blobs live under `<root>/objects/<content-hash>` where `content-hash = blake3(bytes)`.
//! - Each revision has a record `<root>/revisions/<tag-hex>` holding its declared parents:
//!   `count (u32 BE) || parent tag (48 bytes) * count`.
//! - `<root>/tips` is the concatenation of the current branch tips.
//!
//! All writes go through `write_atomic`. Records are not validated here; the ancestry cache
//! checks every parent list against its tag before using it.

use anyhow::{Context, Result};
use bytes::{Buf, BufMut, BytesMut};
use revtag::{ContentHash, RevisionTag, TAG_LEN};
use std::{fs, path::{Path, PathBuf}};
use tracing::warn;

use super::RevisionStorage;
use crate::utils::fsutil::write_atomic;

#[derive(Debug, Clone)]
pub struct DirRevisionStore {
    root: PathBuf,
}

impl DirRevisionStore {
    // A record never needs more than this; anything larger is corrupt.
    const MAX_RECORD_BYTES: u64 = 4 + (TAG_LEN as u64) * 4096;

    /// Open (or create) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(root.join("revisions"))
            .with_context(|| format!("create revisions dir under {:?}", root))?;
        fs::create_dir_all(root.join("objects"))
            .with_context(|| format!("create objects dir under {:?}", root))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn revisions_dir(&self) -> PathBuf {
        self.root.join("revisions")
    }

    fn record_path(&self, tag: &RevisionTag) -> PathBuf {
        self.revisions_dir().join(tag.to_hex())
    }

    fn tips_path(&self) -> PathBuf {
        self.root.join("tips")
    }

    /// Store `content`, record a revision on top of `parents`, and replace those parents
    /// with the new revision in the branch tip list.
    pub fn commit(&self, content: &[u8], parents: &[RevisionTag]) -> Result<RevisionTag> {
        let content_hash = ContentHash::of(content);
        let blob = self.root.join("objects").join(content_hash.to_hex());
        if !blob.exists() {
            write_atomic(&blob, content)?;
        }

        let tag = RevisionTag::commit(content_hash, parents);
        self.put_revision(&tag, parents)?;

        let mut tips = self.read_tips()?;
        tips.retain(|tip| !parents.contains(tip));
        if !tips.contains(&tag) {
            tips.push(tag);
        }
        self.write_tips(&tips)?;
        Ok(tag)
    }

    /// Write the parent record for `tag` (idempotent).
    pub fn put_revision(&self, tag: &RevisionTag, parents: &[RevisionTag]) -> Result<()> {
        let path = self.record_path(tag);
        if path.exists() {
            return Ok(());
        }
        let mut buf = BytesMut::with_capacity(4 + parents.len() * TAG_LEN);
        buf.put_u32(parents.len() as u32);
        for parent in parents {
            parent.put(&mut buf);
        }
        write_atomic(&path, &buf)
    }

    pub fn read_tips(&self) -> Result<Vec<RevisionTag>> {
        let path = self.tips_path();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let bytes = fs::read(&path).with_context(|| format!("read {:?}", path))?;
        if bytes.len() % TAG_LEN != 0 {
            anyhow::bail!("branch tip file appears corrupt: {:?}", path);
        }
        bytes
            .chunks(TAG_LEN)
            .map(|chunk| RevisionTag::from_bytes(chunk).map_err(anyhow::Error::from))
            .collect()
    }

    pub fn write_tips(&self, tips: &[RevisionTag]) -> Result<()> {
        let mut buf = BytesMut::with_capacity(tips.len() * TAG_LEN);
        for tip in tips {
            tip.put(&mut buf);
        }
        write_atomic(&self.tips_path(), &buf)
    }

    /// Resolve a (possibly abbreviated) hex tag against the stored revisions.
    pub fn resolve(&self, prefix: &str) -> Result<RevisionTag> {
        let wanted = prefix.trim().to_ascii_lowercase();
        if wanted.is_empty() {
            anyhow::bail!("empty revision prefix");
        }
        let mut matches = self.local_revisions();
        matches.retain(|tag| tag.matches_prefix(&wanted));
        match matches.len() {
            0 => anyhow::bail!("no revision matches {:?}", prefix),
            1 => Ok(matches[0]),
            n => anyhow::bail!("revision prefix {:?} is ambiguous ({} matches)", prefix, n),
        }
    }
}

impl RevisionStorage for DirRevisionStore {
    fn has_local_content(&self, tag: &RevisionTag) -> bool {
        self.record_path(tag).is_file()
    }

    fn read_declared_parents(&self, tag: &RevisionTag) -> Result<Vec<RevisionTag>> {
        let path = self.record_path(tag);
        let meta = fs::metadata(&path).with_context(|| format!("stat {:?}", path))?;
        if meta.len() > Self::MAX_RECORD_BYTES {
            anyhow::bail!(
                "revision record too large: {} bytes (max {})",
                meta.len(),
                Self::MAX_RECORD_BYTES
            );
        }
        let bytes = fs::read(&path).with_context(|| format!("read {:?}", path))?;
        let mut buf = bytes.as_slice();
        if buf.remaining() < 4 {
            anyhow::bail!("revision record {:?} is truncated", path);
        }
        let count = buf.get_u32() as usize;
        if buf.remaining() != count * TAG_LEN {
            anyhow::bail!(
                "revision record {:?} declares {} parents but holds {} bytes",
                path,
                count,
                buf.remaining()
            );
        }
        (0..count)
            .map(|_| RevisionTag::read(&mut buf).map_err(anyhow::Error::from))
            .collect()
    }

    fn local_revisions(&self) -> Vec<RevisionTag> {
        let entries = match fs::read_dir(self.revisions_dir()) {
            Ok(entries) => entries,
            Err(err) => {
                warn!(error = %err, root = ?self.root, "unable to list revisions");
                return Vec::new();
            }
        };
        entries
            .flatten()
            .filter_map(|entry| {
                let name = entry.file_name();
                RevisionTag::from_hex(name.to_str()?).ok()
            })
            .collect()
    }

    fn branch_tips(&self) -> Vec<RevisionTag> {
        self.read_tips().unwrap_or_else(|err| {
            warn!(error = %err, "unable to read branch tips");
            Vec::new()
        })
    }
}
