use bytes::{Buf, BufMut};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;

use crate::commitment::{implied_height, parent_commitment};
use crate::error::TagError;

/// Width of a revision's content hash (blake3).
pub const CONTENT_HASH_LEN: usize = 32;

/// Serialized width of a tag: `content_hash || height (u64 BE) || parent_commitment (u64 BE)`.
pub const TAG_LEN: usize = CONTENT_HASH_LEN + 8 + 8;

/// Hash of a revision's content snapshot.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ContentHash(pub [u8; CONTENT_HASH_LEN]);

impl ContentHash {
    pub const ZERO: ContentHash = ContentHash([0u8; CONTENT_HASH_LEN]);

    /// `blake3(content)`.
    pub fn of(content: &[u8]) -> Self {
        ContentHash(*blake3::hash(content).as_bytes())
    }

    pub fn as_bytes(&self) -> &[u8; CONTENT_HASH_LEN] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; CONTENT_HASH_LEN]
    }

    pub fn to_hex(&self) -> String {
        encode_hex(&self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, TagError> {
        let raw = decode_hex(s)?;
        let bytes: [u8; CONTENT_HASH_LEN] = raw.as_slice().try_into().map_err(|_| TagError::MalformedTag {
            len: raw.len(),
            expected: CONTENT_HASH_LEN,
        })?;
        Ok(ContentHash(bytes))
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", self.to_hex())
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Identifies one revision: what it contains, how deep it sits, and whom it descends from.
///
/// Ordering is by `height`, then by unsigned lexicographic comparison of `content_hash`;
/// the maximum of a set of tags is its "latest" member. The commitment is compared last so
/// that `Ord` agrees with `Eq`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct RevisionTag {
    content_hash: ContentHash,
    height: u64,
    parent_commitment: u64,
}

impl RevisionTag {
    pub fn new(content_hash: ContentHash, height: u64, parent_commitment: u64) -> Self {
        Self {
            content_hash,
            height,
            parent_commitment,
        }
    }

    /// The tag for "no history": height 0, all-zero content hash, empty parent set.
    pub fn blank() -> Self {
        Self::new(ContentHash::ZERO, 0, parent_commitment(&[]))
    }

    /// Build the tag for a new revision on top of `parents`, deriving height and commitment.
    ///
    /// A parent at `u64::MAX` pins the height there; such a tag never passes
    /// [`validate_parent_list`](crate::validate_parent_list).
    pub fn commit(content_hash: ContentHash, parents: &[RevisionTag]) -> Self {
        let height = implied_height(parents).unwrap_or(u64::MAX);
        Self::new(content_hash, height, parent_commitment(parents))
    }

    pub fn is_blank(&self) -> bool {
        self.height == 0 && self.content_hash.is_zero()
    }

    pub fn content_hash(&self) -> &ContentHash {
        &self.content_hash
    }

    pub fn height(&self) -> u64 {
        self.height
    }

    pub fn parent_commitment(&self) -> u64 {
        self.parent_commitment
    }

    /// First 8 bytes of the serialized form, big endian.
    pub fn short_hash(&self) -> u64 {
        let mut head = [0u8; 8];
        head.copy_from_slice(&self.content_hash.0[..8]);
        u64::from_be_bytes(head)
    }

    pub fn put(&self, buf: &mut impl BufMut) {
        buf.put_slice(&self.content_hash.0);
        buf.put_u64(self.height);
        buf.put_u64(self.parent_commitment);
    }

    pub fn to_bytes(&self) -> [u8; TAG_LEN] {
        let mut out = [0u8; TAG_LEN];
        let mut cursor: &mut [u8] = &mut out;
        self.put(&mut cursor);
        out
    }

    /// Read one tag from the front of `buf`.
    pub fn read(buf: &mut impl Buf) -> Result<Self, TagError> {
        if buf.remaining() < TAG_LEN {
            return Err(TagError::MalformedTag {
                len: buf.remaining(),
                expected: TAG_LEN,
            });
        }
        let mut hash = [0u8; CONTENT_HASH_LEN];
        buf.copy_to_slice(&mut hash);
        let height = buf.get_u64();
        let parent_commitment = buf.get_u64();
        Ok(Self::new(ContentHash(hash), height, parent_commitment))
    }

    /// Decode an exact serialized tag.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TagError> {
        if bytes.len() != TAG_LEN {
            return Err(TagError::MalformedTag {
                len: bytes.len(),
                expected: TAG_LEN,
            });
        }
        let mut buf = bytes;
        Self::read(&mut buf)
    }

    pub fn to_hex(&self) -> String {
        encode_hex(&self.to_bytes())
    }

    pub fn from_hex(s: &str) -> Result<Self, TagError> {
        Self::from_bytes(&decode_hex(s)?)
    }

    /// Case-insensitive test against the start of the hex form.
    pub fn matches_prefix(&self, prefix: &str) -> bool {
        self.to_hex().starts_with(&prefix.to_ascii_lowercase())
    }
}

impl Ord for RevisionTag {
    fn cmp(&self, other: &Self) -> Ordering {
        self.height
            .cmp(&other.height)
            .then_with(|| self.content_hash.cmp(&other.content_hash))
            .then_with(|| self.parent_commitment.cmp(&other.parent_commitment))
    }
}

impl PartialOrd for RevisionTag {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for RevisionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&encode_hex(&self.content_hash.0[..4]))
    }
}

impl fmt::Debug for RevisionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RevisionTag({}@{}, {:016x})",
            encode_hex(&self.content_hash.0[..8]),
            self.height,
            self.parent_commitment
        )
    }
}

impl Serialize for RevisionTag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for RevisionTag {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        RevisionTag::from_hex(&text).map_err(serde::de::Error::custom)
    }
}

fn encode_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn decode_hex(s: &str) -> Result<Vec<u8>, TagError> {
    let s = s.trim();
    if s.len() % 2 != 0 || !s.is_ascii() {
        return Err(TagError::InvalidHex(s.to_string()));
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).map_err(|_| TagError::InvalidHex(s.to_string())))
        .collect()
}
