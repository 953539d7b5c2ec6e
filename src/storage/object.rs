//! Binary object encoding shared by blobs, snapshots and commits.
//!
//! Every object starts with a one-byte kind tag followed by a kind-specific
//! payload built from big-endian integers and length-prefixed byte strings.
//! The object id is the SHA-256 of this uncompressed encoding.

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;

use super::{ImmutableStore, ObjectId};
use crate::error::{Error, Result};

pub(crate) const MAX_BLOB_SIZE: usize = 100 * 1024 * 1024;
pub(crate) const MAX_SNAPSHOT_ENTRIES: usize = 10_000;
pub(crate) const MAX_PARENTS: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    Blob = 1,
    Snapshot = 2,
    Commit = 3,
}

impl ObjectKind {
    fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(ObjectKind::Blob),
            2 => Some(ObjectKind::Snapshot),
            3 => Some(ObjectKind::Commit),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Blob => "blob",
            ObjectKind::Snapshot => "snapshot",
            ObjectKind::Commit => "commit",
        }
    }

    /// Kind of an already encoded object, if its tag is known.
    pub fn of(raw: &[u8]) -> Option<Self> {
        raw.first().copied().and_then(Self::from_tag)
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.as_str();
        let mut chars = name.chars();
        match chars.next() {
            Some(first) => write!(f, "{}{}", first.to_ascii_uppercase(), chars.as_str()),
            None => Ok(()),
        }
    }
}

/// Compute the SHA-256 object id of an encoded object
pub fn compute_hash(raw: &[u8]) -> ObjectId {
    let mut hasher = Sha256::new();
    hasher.update(raw);
    hex::encode(hasher.finalize())
}

/// Builds the canonical encoding of one object.
pub struct ObjectWriter {
    buf: Vec<u8>,
}

impl ObjectWriter {
    pub fn new(kind: ObjectKind) -> Self {
        ObjectWriter {
            buf: vec![kind as u8],
        }
    }

    pub fn put_u32(&mut self, value: u32) -> &mut Self {
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub fn put_i64(&mut self, value: i64) -> &mut Self {
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub fn put_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.put_u32(bytes.len() as u32);
        self.buf.extend_from_slice(bytes);
        self
    }

    pub fn put_str(&mut self, value: &str) -> &mut Self {
        self.put_bytes(value.as_bytes())
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

/// Cursor over an encoded object of a known kind.
pub struct ObjectReader<'a> {
    id: &'a str,
    data: &'a [u8],
    pos: usize,
}

impl<'a> ObjectReader<'a> {
    /// Check the kind tag and position the cursor after it.
    pub fn open(id: &'a str, raw: &'a [u8], expected: ObjectKind) -> Result<Self> {
        match raw.first().copied() {
            Some(tag) if tag == expected as u8 => Ok(ObjectReader {
                id,
                data: raw,
                pos: 1,
            }),
            Some(tag) => Err(Error::Corrupt(format!(
                "object {} is not a {} (tag {})",
                id, expected, tag
            ))),
            None => Err(Error::Corrupt(format!("object {} is empty", id))),
        }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| Error::Corrupt(format!("object {} is truncated", self.id)))?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    pub fn u32(&mut self) -> Result<u32> {
        let bytes = self.take(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn i64(&mut self) -> Result<i64> {
        let bytes = self.take(8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(bytes);
        Ok(i64::from_be_bytes(buf))
    }

    /// Read a length-prefixed byte string of at most `limit` bytes.
    pub fn bytes(&mut self, limit: usize) -> Result<&'a [u8]> {
        let len = self.u32()? as usize;
        if len > limit {
            return Err(Error::Corrupt(format!(
                "object {} declares {} bytes, limit is {}",
                self.id, len, limit
            )));
        }
        self.take(len)
    }

    pub fn string(&mut self) -> Result<String> {
        let bytes = self.bytes(MAX_BLOB_SIZE)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| Error::Corrupt(format!("object {} holds invalid UTF-8", self.id)))
    }

    /// Read a count and validate it against `limit`.
    pub fn count(&mut self, limit: usize) -> Result<usize> {
        let count = self.u32()? as usize;
        if count > limit {
            return Err(Error::Corrupt(format!(
                "object {} declares {} entries, limit is {}",
                self.id, count, limit
            )));
        }
        Ok(count)
    }

    /// Fail if any bytes are left unread.
    pub fn finish(self) -> Result<()> {
        if self.pos != self.data.len() {
            return Err(Error::Corrupt(format!(
                "object {} has {} trailing bytes",
                self.id,
                self.data.len() - self.pos
            )));
        }
        Ok(())
    }
}

/// Read an object that must exist, mapping absence to `Error::NotFound`.
pub fn load_object<S: ImmutableStore + ?Sized>(
    store: &S,
    id: &str,
    kind: ObjectKind,
) -> Result<Vec<u8>> {
    store.read_object(id)?.ok_or_else(|| Error::NotFound {
        kind,
        hash: id.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_hash() {
        // SHA-256 of the empty string
        assert_eq!(
            compute_hash(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_reader_follows_writer_layout() -> Result<()> {
        let mut writer = ObjectWriter::new(ObjectKind::Commit);
        writer.put_str("snap").put_u32(2).put_i64(-5).put_bytes(&[0, 255]);
        let raw = writer.finish();
        assert_eq!(ObjectKind::of(&raw), Some(ObjectKind::Commit));

        let mut reader = ObjectReader::open("id", &raw, ObjectKind::Commit)?;
        assert_eq!(reader.string()?, "snap");
        assert_eq!(reader.u32()?, 2);
        assert_eq!(reader.i64()?, -5);
        assert_eq!(reader.bytes(16)?, &[0, 255]);
        reader.finish()
    }

    #[test]
    fn test_reader_rejects_wrong_kind() {
        let raw = ObjectWriter::new(ObjectKind::Blob).finish();
        let err = ObjectReader::open("abc", &raw, ObjectKind::Commit).err();
        assert!(matches!(err, Some(Error::Corrupt(_))));
    }

    #[test]
    fn test_reader_rejects_truncated_and_oversized() {
        let mut writer = ObjectWriter::new(ObjectKind::Blob);
        writer.put_u32(10);
        let raw = writer.finish();

        let mut reader = ObjectReader::open("abc", &raw, ObjectKind::Blob).unwrap();
        assert!(reader.bytes(100).is_err());

        let mut reader = ObjectReader::open("abc", &raw, ObjectKind::Blob).unwrap();
        assert!(reader.bytes(5).is_err());
    }

    #[test]
    fn test_trailing_bytes_are_corruption() {
        let mut writer = ObjectWriter::new(ObjectKind::Blob);
        writer.put_u32(1).put_u32(2);
        let raw = writer.finish();

        let mut reader = ObjectReader::open("abc", &raw, ObjectKind::Blob).unwrap();
        reader.u32().unwrap();
        assert!(reader.finish().is_err());
    }
}
