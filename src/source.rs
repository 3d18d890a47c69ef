//! Byte sources: random-access providers of the bytes being decoded.

use crate::decode::ParseError;
use std::path::Path;

/// Random-access byte provider. Implementations must be safe to share between
/// independent decodes, hence the `Sync` bound.
pub trait ByteSource: Sync {
    /// Read exactly `length` bytes at `offset`, or fail with
    /// [`ParseError::InsufficientData`].
    fn read(&self, offset: u64, length: u64) -> Result<Vec<u8>, ParseError>;

    /// Total number of bytes available.
    fn size(&self) -> u64;
}

fn read_within(data: &[u8], offset: u64, length: u64) -> Result<Vec<u8>, ParseError> {
    let available = (data.len() as u64).saturating_sub(offset);
    let insufficient = || ParseError::InsufficientData {
        offset,
        requested: length,
        available,
    };
    let end = offset.checked_add(length).ok_or_else(insufficient)?;
    if end > data.len() as u64 {
        return Err(insufficient());
    }
    Ok(data[offset as usize..end as usize].to_vec())
}

/// Source backed by a borrowed byte slice.
pub struct SliceSource<'a> {
    data: &'a [u8],
}

impl<'a> SliceSource<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        SliceSource { data }
    }
}

impl ByteSource for SliceSource<'_> {
    fn read(&self, offset: u64, length: u64) -> Result<Vec<u8>, ParseError> {
        read_within(self.data, offset, length)
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// Source holding a whole file in memory.
pub struct FileSource {
    data: Vec<u8>,
}

impl FileSource {
    pub fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let data = std::fs::read(path)?;
        Ok(FileSource { data })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

impl ByteSource for FileSource {
    fn read(&self, offset: u64, length: u64) -> Result<Vec<u8>, ParseError> {
        read_within(&self.data, offset, length)
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }
}
