//! Offset and size resolution
//!
//! A single forward pass in source order. Entries without an offset are
//! placed at the running end of the previous entry, rounded up to their
//! kind's alignment. Nothing is reordered, so an auto-placed entry that
//! collides with a later explicit offset is left for [`PartitionTable::verify`]
//! to reject.

use super::{LayoutConfig, PartitionSize, PartitionTable};
use crate::error::{Error, ResolutionError};

impl PartitionTable {
    /// Fill in missing offsets and turn end-address sizes into byte counts
    pub fn resolve(&mut self, config: &LayoutConfig) -> Result<(), Error> {
        let mut last_end = config.reserved_boundary as u64;

        for entry in self.entries_mut() {
            let offset = match entry.offset {
                Some(offset) => offset as u64,
                None => last_end.next_multiple_of(entry.kind.alignment() as u64),
            };
            let offset = u32::try_from(offset).map_err(|_| ResolutionError::OutOfRange {
                name: entry.name.clone(),
                offset,
                size: 0,
            })?;

            let size = match entry.size {
                PartitionSize::Bytes(size) => size,
                PartitionSize::UpTo(end) => end.saturating_sub(offset),
            };
            if size == 0 {
                let end = match entry.size {
                    PartitionSize::UpTo(end) => end,
                    PartitionSize::Bytes(_) => offset,
                };
                return Err(ResolutionError::EmptyExtent {
                    name: entry.name.clone(),
                    offset,
                    end,
                }
                .into());
            }

            let end = offset as u64 + size as u64;
            if end > u32::MAX as u64 + 1 {
                return Err(ResolutionError::OutOfRange {
                    name: entry.name.clone(),
                    offset: offset as u64,
                    size: size as u64,
                }
                .into());
            }

            entry.offset = Some(offset);
            entry.size = PartitionSize::Bytes(size);
            log::debug!("resolved {}", entry);
            last_end = end;
        }

        Ok(())
    }
}
