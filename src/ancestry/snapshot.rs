//! On-disk snapshot of the ancestry set.
//!
//! Layout (gzip compressed):
//! ```text
//! "RVTA" || version: u16 BE
//! repeated: tag[48] || parent_count: u32 BE || parent tag[48] * parent_count
//! ```
//! The snapshot is only a warm start. Readers re-validate every record, and a file that
//! cannot be read is replaced by a rescan of local storage.

use anyhow::{Context, Result};
use bytes::{Buf, BufMut, BytesMut};
use flate2::{read::GzDecoder, write::GzEncoder, Compression};
use revtag::{RevisionTag, TAG_LEN};
use std::fs;
use std::io::{Read, Write};
use std::path::Path;

use crate::utils::fsutil::write_atomic;

const MAGIC: &[u8; 4] = b"RVTA";
const VERSION: u16 = 1;

/// One `(tag, parents)` record as read back; not yet validated.
pub type Record = (RevisionTag, Vec<RevisionTag>);

pub fn encode<'a>(records: impl IntoIterator<Item = (&'a RevisionTag, &'a [RevisionTag])>) -> Result<Vec<u8>> {
    let mut raw = BytesMut::new();
    raw.put_slice(MAGIC);
    raw.put_u16(VERSION);
    for (tag, parents) in records {
        tag.put(&mut raw);
        raw.put_u32(parents.len() as u32);
        for parent in parents {
            parent.put(&mut raw);
        }
    }

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&raw).context("compress ancestry snapshot")?;
    encoder.finish().context("finish ancestry snapshot")
}

pub fn decode(compressed: &[u8]) -> Result<Vec<Record>> {
    let mut raw = Vec::new();
    GzDecoder::new(compressed)
        .read_to_end(&mut raw)
        .context("decompress ancestry snapshot")?;

    let mut buf = raw.as_slice();
    if buf.remaining() < MAGIC.len() + 2 || &buf[..MAGIC.len()] != MAGIC {
        anyhow::bail!("not an ancestry snapshot (bad magic)");
    }
    buf.advance(MAGIC.len());
    let version = buf.get_u16();
    if version != VERSION {
        anyhow::bail!("unsupported ancestry snapshot version {}", version);
    }

    let mut records = Vec::new();
    while buf.has_remaining() {
        let tag = RevisionTag::read(&mut buf).context("truncated snapshot record")?;
        if buf.remaining() < 4 {
            anyhow::bail!("truncated snapshot record for {}", tag);
        }
        let count = buf.get_u32() as usize;
        if buf.remaining() < count.saturating_mul(TAG_LEN) {
            anyhow::bail!("snapshot record for {} claims {} parents past end of file", tag, count);
        }
        let parents = (0..count)
            .map(|_| RevisionTag::read(&mut buf))
            .collect::<Result<Vec<_>, _>>()?;
        records.push((tag, parents));
    }
    Ok(records)
}

pub fn write_file<'a>(
    path: &Path,
    records: impl IntoIterator<Item = (&'a RevisionTag, &'a [RevisionTag])>,
) -> Result<()> {
    let bytes = encode(records)?;
    write_atomic(path, &bytes)
}

pub fn read_file(path: &Path) -> Result<Vec<Record>> {
    let bytes = fs::read(path).with_context(|| format!("read snapshot {:?}", path))?;
    decode(&bytes).with_context(|| format!("decode snapshot {:?}", path))
}
