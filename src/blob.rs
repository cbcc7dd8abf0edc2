//! Shared, immutable-by-default views over font bytes.

use std::path::Path;

/// How a [`Blob`] relates to the memory backing it.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum MemoryMode {
    /// The blob copies the bytes up front and owns the copy.
    Duplicate,
    /// The blob reads the caller's bytes and never writes them.
    ReadOnly,
    /// The blob may write the bytes in place.
    Writable,
    /// Read-only until a writable view is requested, then copied lazily.
    ReadOnlyMayMakeWritable,
}

#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    #[error("failed to open font file: {0}")]
    Io(#[from] std::io::Error),
}

enum Data<'a> {
    Borrowed(&'a [u8]),
    Owned(Vec<u8>),
    Mapped(memmap2::Mmap),
}

impl Data<'_> {
    fn as_slice(&self) -> &[u8] {
        match self {
            Data::Borrowed(d) => d,
            Data::Owned(d) => d,
            Data::Mapped(d) => d,
        }
    }
}

/// A byte range with a memory mode and a one-way immutability latch.
///
/// The original's reference counting maps onto Rust ownership: sub-blobs
/// borrow their parent, and the destructor hook is `Drop`.
pub struct Blob<'a> {
    data: Data<'a>,
    mode: MemoryMode,
    immutable: bool,
}

impl<'a> Blob<'a> {
    /// A read-only blob over the caller's bytes.
    pub fn new(data: &'a [u8]) -> Self {
        Blob::with_mode(data, MemoryMode::ReadOnly)
    }

    pub fn with_mode(data: &'a [u8], mode: MemoryMode) -> Self {
        match mode {
            MemoryMode::Duplicate => Blob {
                data: Data::Owned(data.to_vec()),
                mode: MemoryMode::Writable,
                immutable: false,
            },
            _ => Blob { data: Data::Borrowed(data), mode, immutable: false },
        }
    }

    pub fn from_vec(data: Vec<u8>) -> Blob<'static> {
        Blob { data: Data::Owned(data), mode: MemoryMode::Writable, immutable: false }
    }

    /// Memory-maps a font file read-only.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Blob<'static>, BlobError> {
        let file = std::fs::File::open(path)?;
        // The map is never written through and the file is expected to stay
        // unmodified for the blob's lifetime.
        let map = unsafe { memmap2::Mmap::map(&file)? };
        Ok(Blob { data: Data::Mapped(map), mode: MemoryMode::ReadOnly, immutable: false })
    }

    /// A read-only view of a sub-range, borrowing this blob.
    pub fn sub_blob(&self, offset: usize, len: usize) -> Option<Blob<'_>> {
        let end = offset.checked_add(len)?;
        let data = self.data.as_slice().get(offset..end)?;
        Some(Blob { data: Data::Borrowed(data), mode: MemoryMode::ReadOnly, immutable: true })
    }

    pub fn len(&self) -> usize {
        self.data.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn data(&self) -> &[u8] {
        self.data.as_slice()
    }

    /// Writable access; copies on write unless the blob already owns
    /// writable memory. Refused (`None`) once immutable.
    pub fn data_mut(&mut self) -> Option<&mut [u8]> {
        if self.immutable {
            return None;
        }

        if !matches!(self.data, Data::Owned(_)) || self.mode != MemoryMode::Writable {
            self.data = Data::Owned(self.data.as_slice().to_vec());
            self.mode = MemoryMode::Writable;
        }

        match &mut self.data {
            Data::Owned(d) => Some(d.as_mut_slice()),
            _ => None,
        }
    }

    pub fn mode(&self) -> MemoryMode {
        self.mode
    }

    pub fn make_immutable(&mut self) {
        self.immutable = true;
    }

    pub fn is_immutable(&self) -> bool {
        self.immutable
    }
}

impl std::fmt::Debug for Blob<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Blob")
            .field("len", &self.len())
            .field("mode", &self.mode)
            .field("immutable", &self.immutable)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sub_blob_is_read_only() {
        let bytes = [1u8, 2, 3, 4, 5];
        let blob = Blob::new(&bytes);
        let mut sub = blob.sub_blob(1, 3).unwrap();
        assert_eq!(sub.data(), &[2, 3, 4]);
        assert!(sub.data_mut().is_none());
        assert!(blob.sub_blob(3, 3).is_none());
    }

    #[test]
    fn writable_duplicates() {
        let bytes = [1u8, 2, 3];
        let mut blob = Blob::new(&bytes);
        {
            let data = blob.data_mut().unwrap();
            data[0] = 9;
        }
        assert_eq!(blob.data(), &[9, 2, 3]);
        // The source stays untouched.
        assert_eq!(bytes, [1, 2, 3]);
    }

    #[test]
    fn immutable_latch() {
        let mut blob = Blob::from_vec(vec![1, 2, 3]);
        assert!(blob.data_mut().is_some());
        blob.make_immutable();
        assert!(blob.data_mut().is_none());
        assert_eq!(blob.data(), &[1, 2, 3]);
    }

    #[test]
    fn duplicate_mode_copies_up_front() {
        let bytes = [7u8; 4];
        let mut blob = Blob::with_mode(&bytes, MemoryMode::Duplicate);
        assert_eq!(blob.mode(), MemoryMode::Writable);
        blob.data_mut().unwrap()[0] = 0;
        assert_eq!(bytes[0], 7);
    }
}
