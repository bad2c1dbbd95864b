//! The BGZF block-offset table: the parsed `.gzi` sidecar, used to resolve
//! an uncompressed ("virtual") position into a compressed file position
//! plus an intra-block skip.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt};

use crate::error::{RaidxError, Result};
use crate::utils::BUFFERSIZE;

/// One `(compressed_offset, uncompressed_offset)` pair from the `.gzi`
/// table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockOffset {
    pub compressed_offset: u64,
    pub uncompressed_offset: u64,
}

/// The full block-offset directory, including the implicit leading `(0,
/// 0)` entry, sorted by `uncompressed_offset`.
#[derive(Debug)]
pub struct BlockOffsetTable {
    entries: Vec<BlockOffset>,
}

impl BlockOffsetTable {
    /// Parse the binary `.gzi` sidecar at `path`.
    ///
    /// A parse failure here must never leave a partially built table
    /// observable by a caller: any error is returned before `entries` is
    /// handed to the caller.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|_| RaidxError::SourceMissing(path.to_path_buf()))?;
        let mut reader = BufReader::with_capacity(BUFFERSIZE, file);

        let explicit_count = reader.read_u64::<LittleEndian>().map_err(|e| {
            RaidxError::IndexMalformed(format!("{}: failed to read .gzi entry count: {e}", path.display()))
        })?;

        let mut entries = Vec::with_capacity(
            usize::try_from(explicit_count).unwrap_or(0).saturating_add(1),
        );
        entries.push(BlockOffset { compressed_offset: 0, uncompressed_offset: 0 });

        for i in 0..explicit_count {
            let compressed_offset = reader.read_u64::<LittleEndian>().map_err(|e| {
                RaidxError::IndexMalformed(format!(
                    "{}: truncated .gzi at entry {i}: {e}",
                    path.display()
                ))
            })?;
            let uncompressed_offset = reader.read_u64::<LittleEndian>().map_err(|e| {
                RaidxError::IndexMalformed(format!(
                    "{}: truncated .gzi at entry {i}: {e}",
                    path.display()
                ))
            })?;
            entries.push(BlockOffset { compressed_offset, uncompressed_offset });
        }

        if !entries.windows(2).all(|w| w[0].uncompressed_offset <= w[1].uncompressed_offset) {
            return Err(RaidxError::IndexMalformed(format!(
                "{}: .gzi entries are not sorted by uncompressed offset",
                path.display()
            )));
        }

        Ok(BlockOffsetTable { entries })
    }

    /// Locate the block containing uncompressed position `target`: returns
    /// the compressed file position to seek to and the number of bytes to
    /// discard from the front of that block once decompressed.
    pub fn locate(&self, target: u64) -> (u64, u64) {
        // Largest index i with entries[i].uncompressed_offset <= target.
        // partition_point is robust to any (non-existent, in practice)
        // duplicate uncompressed offsets.
        let idx = self
            .entries
            .partition_point(|e| e.uncompressed_offset <= target)
            .saturating_sub(1);
        let entry = self.entries[idx];
        (entry.compressed_offset, target - entry.uncompressed_offset)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        false // the implicit (0, 0) entry is always present
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use byteorder::WriteBytesExt;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_gzi(entries: &[(u64, u64)]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_u64::<LittleEndian>(entries.len() as u64).unwrap();
        for (c, u) in entries {
            file.write_u64::<LittleEndian>(*c).unwrap();
            file.write_u64::<LittleEndian>(*u).unwrap();
        }
        file.flush().unwrap();
        file
    }

    #[test]
    fn implicit_leading_entry() {
        let f = write_gzi(&[(100, 1000), (200, 2000)]);
        let table = BlockOffsetTable::load(f.path()).unwrap();
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn locate_binary_searches_correctly() {
        let f = write_gzi(&[(100, 1000), (200, 2000), (300, 3000)]);
        let table = BlockOffsetTable::load(f.path()).unwrap();

        assert_eq!(table.locate(0), (0, 0));
        assert_eq!(table.locate(500), (0, 500));
        assert_eq!(table.locate(1000), (100, 0));
        assert_eq!(table.locate(1500), (100, 500));
        assert_eq!(table.locate(2999), (200, 999));
        assert_eq!(table.locate(3500), (300, 500));
    }

    #[test]
    fn rejects_unsorted_entries() {
        let f = write_gzi(&[(200, 2000), (100, 1000)]);
        assert!(matches::matches!(
            BlockOffsetTable::load(f.path()),
            Err(RaidxError::IndexMalformed(_))
        ));
    }

    #[test]
    fn rejects_truncated_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_u64::<LittleEndian>(5).unwrap();
        file.write_u64::<LittleEndian>(100).unwrap();
        file.flush().unwrap();
        assert!(matches::matches!(
            BlockOffsetTable::load(file.path()),
            Err(RaidxError::IndexMalformed(_))
        ));
    }
}
