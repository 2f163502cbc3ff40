//! Table validation
//!
//! Checks that a resolved table can be trusted by the bootloader: every
//! entry is complete and aligned, nothing sits in the reserved region, and
//! no two partitions share a byte.

use super::{LayoutConfig, PartitionEntry, PartitionTable};
use crate::error::{Error, ValidationError};

impl PartitionEntry {
    /// Check this entry on its own
    pub fn verify(&self) -> Result<(), ValidationError> {
        let missing = |field| ValidationError::MissingField {
            name: self.name.clone(),
            field,
        };

        if self.name.is_empty() {
            return Err(missing("name"));
        }
        let offset = self.offset.ok_or_else(|| missing("offset"))?;
        let alignment = self.kind.alignment();
        if offset % alignment != 0 {
            return Err(ValidationError::Misaligned {
                name: self.name.clone(),
                offset,
                alignment,
            });
        }
        if self.size.bytes().is_none() {
            return Err(missing("size"));
        }
        Ok(())
    }
}

impl PartitionTable {
    /// Verify every entry and the table as a whole
    pub fn verify(&self, config: &LayoutConfig) -> Result<(), Error> {
        for entry in self {
            entry.verify()?;
        }

        let mut sorted: Vec<(&PartitionEntry, u32, u32)> = self
            .iter()
            .filter_map(|e| e.range().map(|(offset, size)| (e, offset, size)))
            .collect();
        sorted.sort_by_key(|&(_, offset, _)| offset);

        if let Some(&(first, offset, _)) = sorted.first() {
            if offset < config.reserved_boundary {
                return Err(ValidationError::BelowReserved {
                    name: first.name.clone(),
                    offset,
                    boundary: config.reserved_boundary,
                }
                .into());
            }
        }

        for pair in sorted.windows(2) {
            let (last, last_offset, last_size) = pair[0];
            let (entry, offset, _) = pair[1];
            let last_end = last_offset as u64 + last_size as u64;
            if (offset as u64) < last_end {
                return Err(ValidationError::Overlap {
                    name: entry.name.clone(),
                    offset,
                    previous: last.name.clone(),
                    start: last_offset,
                    end: (last_end - 1) as u32,
                }
                .into());
            }
        }

        Ok(())
    }
}
