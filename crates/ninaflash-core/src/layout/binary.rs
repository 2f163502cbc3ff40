//! Binary partition table format
//!
//! Each partition is a 32-byte little-endian record:
//!
//! ```text
//! magic(2) | type(1) | subtype(1) | offset(4) | size(4) | name(16) | flags(4)
//! ```
//!
//! The records are followed by 0xFF padding up to [`MAX_PARTITION_LENGTH`],
//! which leaves the rest of the 4 KiB table sector for a signature.

use zerocopy::byteorder::little_endian::U32;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use super::{PartitionEntry, PartitionFlags, PartitionKind, PartitionSize, PartitionTable};
use crate::error::{EncodingError, Error, ValidationError};

/// Magic bytes at the start of every record
pub const PARTITION_MAGIC: [u8; 2] = [0xAA, 0x50];

/// Maximum size of the encoded table (96 records)
pub const MAX_PARTITION_LENGTH: usize = 0xC00;

/// Size of one encoded record
pub const RECORD_SIZE: usize = core::mem::size_of::<PartitionRecord>();

/// Width of the name field
pub const NAME_LEN: usize = 16;

/// A partition record, as it appears on flash
#[derive(FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned, Debug, Clone, Copy)]
#[repr(C, packed)]
pub struct PartitionRecord {
    magic: [u8; 2],
    kind: u8,
    subkind: u8,
    offset: U32,
    size: U32,
    name: [u8; NAME_LEN],
    flags: U32,
}

impl PartitionRecord {
    /// Build a record from a resolved entry
    pub fn from_entry(entry: &PartitionEntry) -> Result<Self, ValidationError> {
        let missing = |field| ValidationError::MissingField {
            name: entry.name.clone(),
            field,
        };
        let offset = entry.offset.ok_or_else(|| missing("offset"))?;
        let size = entry.size.bytes().ok_or_else(|| missing("size"))?;

        let mut name = [0u8; NAME_LEN];
        let bytes = entry.name.as_bytes();
        let len = bytes.len().min(NAME_LEN);
        name[..len].copy_from_slice(&bytes[..len]);

        Ok(Self {
            magic: PARTITION_MAGIC,
            kind: entry.kind.as_u8(),
            subkind: entry.subkind,
            offset: U32::new(offset),
            size: U32::new(size),
            name,
            flags: U32::new(entry.flags.bits()),
        })
    }

    /// Turn a record back into an entry
    pub fn to_entry(&self) -> PartitionEntry {
        let end = self.name.iter().position(|&b| b == 0).unwrap_or(NAME_LEN);
        PartitionEntry {
            name: String::from_utf8_lossy(&self.name[..end]).into_owned(),
            kind: PartitionKind::from_u8(self.kind),
            subkind: self.subkind,
            offset: Some(self.offset.get()),
            size: PartitionSize::Bytes(self.size.get()),
            flags: PartitionFlags::from_bits_retain(self.flags.get()),
        }
    }
}

impl PartitionTable {
    /// Encode the table into its on-flash form
    ///
    /// The result is always [`MAX_PARTITION_LENGTH`] bytes long.
    pub fn to_binary(&self) -> Result<Vec<u8>, Error> {
        let mut out = Vec::with_capacity(MAX_PARTITION_LENGTH);
        for entry in self {
            out.extend_from_slice(PartitionRecord::from_entry(entry)?.as_bytes());
        }

        if out.len() > MAX_PARTITION_LENGTH {
            return Err(EncodingError::TableTooLarge {
                size: out.len(),
                max: MAX_PARTITION_LENGTH,
            }
            .into());
        }

        out.resize(MAX_PARTITION_LENGTH, 0xFF);
        Ok(out)
    }

    /// Decode an on-flash table
    ///
    /// Stops at the first erased (all 0xFF) record or at the end of the data.
    pub fn from_binary(data: &[u8]) -> Result<Self, Error> {
        let mut table = PartitionTable::new();

        for (index, chunk) in data.chunks(RECORD_SIZE).enumerate() {
            if chunk.iter().all(|&b| b == 0xFF) {
                break;
            }
            let record = PartitionRecord::read_from_bytes(chunk).map_err(|_| {
                EncodingError::Truncated {
                    index,
                    len: chunk.len(),
                }
            })?;
            if record.magic != PARTITION_MAGIC {
                return Err(EncodingError::InvalidMagic {
                    index,
                    magic: record.magic,
                }
                .into());
            }

            let entry = record.to_entry();
            log::trace!("record {}: {}", index, entry);
            // a name collision in a foreign table is not fatal for reading,
            // keep the record under a positional name
            if let Err(mut entry) = table.push(entry) {
                entry.name = format!("{}#{}", entry.name, index);
                let _ = table.push(entry);
            }
        }

        Ok(table)
    }
}

/// Check whether a buffer starts with a partition record
pub fn has_partition_table(data: &[u8]) -> bool {
    data.starts_with(&PARTITION_MAGIC)
}
