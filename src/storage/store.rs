//! Memory-mapped byte store backing one file

use std::fs::{File, OpenOptions};
use std::ops::Range;
use std::path::{Path, PathBuf};

use memmap2::MmapMut;
use tracing::debug;

use super::format::PAGE_SIZE;
use crate::{Result, WiffError};

/// Resizable, randomly addressable byte region over one open file
///
/// Every write goes straight into the mapping; there is no buffering layer.
/// Writes past the current extent are rejected, callers must [`grow`] first.
///
/// [`grow`]: ByteStore::grow
pub struct ByteStore {
    path: PathBuf,
    file: File,
    mmap: MmapMut,
}

impl std::fmt::Debug for ByteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ByteStore")
            .field("path", &self.path)
            .field("len", &self.mmap.len())
            .finish()
    }
}

impl ByteStore {
    /// Open a file, creating a single zeroed page if it does not exist
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be opened or mapped
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        // Cannot map an empty file
        if file.metadata()?.len() == 0 {
            file.set_len(PAGE_SIZE)?;
        }

        Self::map(path, file)
    }

    /// Create a new file holding a single zeroed page
    ///
    /// # Errors
    ///
    /// Returns error if the file already exists or cannot be created
    pub fn create(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::AlreadyExists {
                    WiffError::AlreadyExists(path.display().to_string())
                } else {
                    WiffError::Io(e)
                }
            })?;

        file.set_len(PAGE_SIZE)?;

        Self::map(path, file)
    }

    fn map(path: &Path, file: File) -> Result<Self> {
        // SAFETY: the file is process-exclusive for the lifetime of the store
        let mmap = unsafe { MmapMut::map_mut(&file)? };

        Ok(Self {
            path: path.to_path_buf(),
            file,
            mmap,
        })
    }

    /// Path this store was opened from
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current extent in bytes
    #[must_use]
    pub fn len(&self) -> u64 {
        self.mmap.len() as u64
    }

    /// True if the store holds no bytes
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }

    fn range(&self, offset: u64, len: u64) -> Result<Range<usize>> {
        let extent = self.len();
        match offset.checked_add(len) {
            Some(end) if end <= extent => Ok(offset as usize..end as usize),
            _ => Err(WiffError::OutOfBounds {
                offset,
                len,
                extent,
            }),
        }
    }

    /// Borrow `len` bytes at `offset`
    ///
    /// # Errors
    ///
    /// Returns error if the range exceeds the extent
    pub fn read(&self, offset: u64, len: u64) -> Result<&[u8]> {
        let range = self.range(offset, len)?;
        Ok(&self.mmap[range])
    }

    /// Copy `N` bytes at `offset` into an array
    ///
    /// # Errors
    ///
    /// Returns error if the range exceeds the extent
    pub fn read_array<const N: usize>(&self, offset: u64) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read(offset, N as u64)?);
        Ok(out)
    }

    /// Write `bytes` at `offset`
    ///
    /// # Errors
    ///
    /// Returns error if the write would pass the extent
    pub fn write(&mut self, offset: u64, bytes: &[u8]) -> Result<()> {
        let range = self.range(offset, bytes.len() as u64)?;
        self.mmap[range].copy_from_slice(bytes);
        Ok(())
    }

    /// Set `len` bytes at `offset` to `byte`
    ///
    /// # Errors
    ///
    /// Returns error if the range exceeds the extent
    pub fn fill(&mut self, offset: u64, len: u64, byte: u8) -> Result<()> {
        let range = self.range(offset, len)?;
        self.mmap[range].fill(byte);
        Ok(())
    }

    /// Copy `len` bytes from `src` to `dest`; the ranges may overlap
    ///
    /// # Errors
    ///
    /// Returns error if either range exceeds the extent
    pub fn copy_within(&mut self, src: u64, dest: u64, len: u64) -> Result<()> {
        let from = self.range(src, len)?;
        let to = self.range(dest, len)?;
        self.mmap.copy_within(from, to.start);
        Ok(())
    }

    /// Extend the file and its mapping to `new_size` bytes; never shrinks
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be extended or remapped
    pub fn grow(&mut self, new_size: u64) -> Result<()> {
        if new_size <= self.len() {
            return Ok(());
        }

        debug!(
            "Growing {} from {} to {} bytes",
            self.path.display(),
            self.len(),
            new_size
        );

        self.mmap.flush()?;
        self.file.set_len(new_size)?;
        // SAFETY: see `map`
        self.mmap = unsafe { MmapMut::map_mut(&self.file)? };

        Ok(())
    }

    /// Flush the mapping to disk
    ///
    /// # Errors
    ///
    /// Returns error if the flush fails
    pub fn flush(&self) -> Result<()> {
        self.mmap.flush()?;
        Ok(())
    }

    /// Read a byte
    ///
    /// # Errors
    ///
    /// Returns error if the offset exceeds the extent
    pub fn read_u8(&self, offset: u64) -> Result<u8> {
        Ok(self.read_array::<1>(offset)?[0])
    }

    /// Read a little-endian `u16`
    ///
    /// # Errors
    ///
    /// Returns error if the range exceeds the extent
    pub fn read_u16(&self, offset: u64) -> Result<u16> {
        Ok(u16::from_le_bytes(self.read_array(offset)?))
    }

    /// Read a little-endian `u32`
    ///
    /// # Errors
    ///
    /// Returns error if the range exceeds the extent
    pub fn read_u32(&self, offset: u64) -> Result<u32> {
        Ok(u32::from_le_bytes(self.read_array(offset)?))
    }

    /// Read a little-endian `u64`
    ///
    /// # Errors
    ///
    /// Returns error if the range exceeds the extent
    pub fn read_u64(&self, offset: u64) -> Result<u64> {
        Ok(u64::from_le_bytes(self.read_array(offset)?))
    }

    /// Write a byte
    ///
    /// # Errors
    ///
    /// Returns error if the offset exceeds the extent
    pub fn write_u8(&mut self, offset: u64, value: u8) -> Result<()> {
        self.write(offset, &[value])
    }

    /// Write a little-endian `u16`
    ///
    /// # Errors
    ///
    /// Returns error if the range exceeds the extent
    pub fn write_u16(&mut self, offset: u64, value: u16) -> Result<()> {
        self.write(offset, &value.to_le_bytes())
    }

    /// Write a little-endian `u32`
    ///
    /// # Errors
    ///
    /// Returns error if the range exceeds the extent
    pub fn write_u32(&mut self, offset: u64, value: u32) -> Result<()> {
        self.write(offset, &value.to_le_bytes())
    }

    /// Write a little-endian `u64`
    ///
    /// # Errors
    ///
    /// Returns error if the range exceeds the extent
    pub fn write_u64(&mut self, offset: u64, value: u64) -> Result<()> {
        self.write(offset, &value.to_le_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_creates_page() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.bin");

        let store = ByteStore::open(&path).unwrap();
        assert_eq!(store.len(), PAGE_SIZE);
        assert!(store.read(0, PAGE_SIZE).unwrap().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_create_rejects_existing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.bin");

        ByteStore::create(&path).unwrap();
        assert!(matches!(
            ByteStore::create(&path),
            Err(WiffError::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_write_past_extent() {
        let dir = TempDir::new().unwrap();
        let mut store = ByteStore::open(&dir.path().join("store.bin")).unwrap();

        assert!(store.write(PAGE_SIZE - 2, &[1, 2]).is_ok());
        assert!(matches!(
            store.write(PAGE_SIZE - 1, &[1, 2]),
            Err(WiffError::OutOfBounds { .. })
        ));
        assert!(store.read(PAGE_SIZE, 1).is_err());
    }

    #[test]
    fn test_grow_keeps_data() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.bin");
        let mut store = ByteStore::open(&path).unwrap();

        store.write_u64(8, 0xDEAD_BEEF).unwrap();
        store.grow(3 * PAGE_SIZE).unwrap();
        assert_eq!(store.len(), 3 * PAGE_SIZE);
        assert_eq!(store.read_u64(8).unwrap(), 0xDEAD_BEEF);

        store.write_u16(3 * PAGE_SIZE - 2, 7).unwrap();

        // Never shrinks
        store.grow(PAGE_SIZE).unwrap();
        assert_eq!(store.len(), 3 * PAGE_SIZE);
        drop(store);

        assert_eq!(std::fs::metadata(&path).unwrap().len(), 3 * PAGE_SIZE);
    }

    #[test]
    fn test_typed_accessors() {
        let dir = TempDir::new().unwrap();
        let mut store = ByteStore::open(&dir.path().join("store.bin")).unwrap();

        store.write_u8(0, 0xAB).unwrap();
        store.write_u16(1, 0x1234).unwrap();
        store.write_u32(3, 0x89AB_CDEF).unwrap();
        assert_eq!(store.read_u8(0).unwrap(), 0xAB);
        assert_eq!(store.read_u16(1).unwrap(), 0x1234);
        assert_eq!(store.read_u32(3).unwrap(), 0x89AB_CDEF);
        assert_eq!(store.read(1, 2).unwrap(), &[0x34, 0x12]);
    }

    #[test]
    fn test_copy_within_overlapping() {
        let dir = TempDir::new().unwrap();
        let mut store = ByteStore::open(&dir.path().join("store.bin")).unwrap();

        store.write(0, &[1, 2, 3, 4]).unwrap();
        store.copy_within(0, 2, 4).unwrap();
        assert_eq!(store.read(0, 6).unwrap(), &[1, 2, 1, 2, 3, 4]);
    }
}
