//! Jump-table encoded lists of variable-length records
//!
//! A list lives at an absolute `base` inside a chunk. It starts with an array
//! of `(start, end)` u16 pairs, one per record, followed by the packed record
//! bytes. Offsets are relative to `base`. The record count is owned by the
//! enclosing block header, not by the list itself.

use std::ops::Range;

use super::chunk::ChunkFile;
use super::store::ByteStore;
use crate::{Result, WiffError};

/// Bytes per jump-table entry
pub const ENTRY_SIZE: u64 = 4;

/// Placement rules for a list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListLayout {
    /// Relative offset of the first record while the list is empty
    pub first_record: u16,
    /// Bytes the packed records move forward when the jump table is full
    pub table_growth: u16,
}

/// View over one jump-table list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JumpTable {
    base: u64,
    count: usize,
    layout: ListLayout,
}

impl JumpTable {
    /// View the list at `base` holding `count` records
    #[must_use]
    pub fn new(base: u64, count: usize, layout: ListLayout) -> Self {
        Self {
            base,
            count,
            layout,
        }
    }

    /// Absolute offset of the jump table
    #[must_use]
    pub fn base(&self) -> u64 {
        self.base
    }

    /// Number of records
    #[must_use]
    pub fn len(&self) -> usize {
        self.count
    }

    /// True if the list holds no records
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    fn entry_offset(&self, index: usize) -> u64 {
        self.base + index as u64 * ENTRY_SIZE
    }

    /// Raw `(start, end)` pair of record `index`
    ///
    /// # Errors
    ///
    /// Returns error if `index` is out of range
    pub fn entry(&self, store: &ByteStore, index: usize) -> Result<(u16, u16)> {
        if index >= self.count {
            return Err(WiffError::NotFound(format!(
                "record {index} of {}",
                self.count
            )));
        }
        let offset = self.entry_offset(index);
        Ok((store.read_u16(offset)?, store.read_u16(offset + 2)?))
    }

    /// Absolute byte range of record `index`; touches only its own entry
    ///
    /// # Errors
    ///
    /// Returns error if `index` is out of range
    pub fn get(&self, store: &ByteStore, index: usize) -> Result<Range<u64>> {
        let (start, end) = self.entry(store, index)?;
        Ok(self.base + u64::from(start)..self.base + u64::from(end))
    }

    /// Relative offset one past the last record (where the next one goes)
    ///
    /// # Errors
    ///
    /// Returns error if the jump table cannot be read
    pub fn data_end(&self, store: &ByteStore) -> Result<u64> {
        if self.count == 0 {
            Ok(u64::from(self.layout.first_record))
        } else {
            Ok(u64::from(self.entry(store, self.count - 1)?.1))
        }
    }

    /// Absolute offset one past the last byte the list occupies
    ///
    /// # Errors
    ///
    /// Returns error if the jump table cannot be read
    pub fn end(&self, store: &ByteStore) -> Result<u64> {
        Ok(self.base + self.data_end(store)?)
    }

    /// Reserve a record of `len` bytes and return its index
    ///
    /// `limit` is the absolute end of the enclosing chunk. If the jump table
    /// is out of slots the packed records are moved forward by the layout's
    /// growth step first. The record bytes themselves are left for the caller
    /// to fill in.
    ///
    /// # Errors
    ///
    /// Returns `InsufficientSpace` if the chunk must grow first, or
    /// `RecordListFull` if the record would end past the 16-bit offset range
    pub fn append(&mut self, store: &mut ByteStore, len: u64, limit: u64) -> Result<usize> {
        let (data_start, data_end) = if self.count == 0 {
            let first = u64::from(self.layout.first_record);
            (first, first)
        } else {
            (
                u64::from(self.entry(store, 0)?.0),
                u64::from(self.entry(store, self.count - 1)?.1),
            )
        };

        let table_needed = (self.count as u64 + 1) * ENTRY_SIZE;
        let mut shift = 0;
        if table_needed > data_start {
            let step = u64::from(self.layout.table_growth).max(ENTRY_SIZE);
            shift = (table_needed - data_start).div_ceil(step) * step;
        }

        let start = data_end + shift;
        let end = start + len;
        if end > u64::from(u16::MAX) {
            return Err(WiffError::RecordListFull { end });
        }
        if self.base + end > limit {
            return Err(WiffError::InsufficientSpace {
                needed: self.base + end - limit,
            });
        }

        if shift > 0 {
            self.shift_records(store, data_start, data_end, shift)?;
        }

        let offset = self.entry_offset(self.count);
        // Both fit in u16, checked above
        store.write_u16(offset, start as u16)?;
        store.write_u16(offset + 2, end as u16)?;

        self.count += 1;
        Ok(self.count - 1)
    }

    fn shift_records(
        &self,
        store: &mut ByteStore,
        data_start: u64,
        data_end: u64,
        shift: u64,
    ) -> Result<()> {
        store.copy_within(
            self.base + data_start,
            self.base + data_start + shift,
            data_end - data_start,
        )?;
        store.fill(self.base + data_start, shift, 0)?;

        for i in 0..self.count {
            let offset = self.entry_offset(i);
            let start = u64::from(store.read_u16(offset)?) + shift;
            let end = u64::from(store.read_u16(offset + 2)?) + shift;
            store.write_u16(offset, start as u16)?;
            store.write_u16(offset + 2, end as u16)?;
        }

        Ok(())
    }
}

/// Append a record to `list`, growing chunk `chunk` one page at a time until
/// it fits
///
/// # Errors
///
/// Returns `RecordListFull` if the list's offsets are exhausted, or any I/O
/// error from growing the chunk
pub fn append_growing(
    file: &mut ChunkFile,
    chunk: usize,
    list: &mut JumpTable,
    len: u64,
) -> Result<usize> {
    loop {
        let limit = file.chunk(chunk)?.end();
        match list.append(file.store_mut(), len, limit) {
            Err(WiffError::InsufficientSpace { .. }) => file.grow_chunk(chunk, 1)?,
            other => return other,
        }
    }
}
