//! Partition table layout engine
//!
//! A partition table is authored as a comma-separated descriptor where
//! offsets may be omitted and sizes may be given as an end address. The
//! pipeline is:
//!
//! - [`PartitionTable::from_descriptor`] parses the text
//! - [`PartitionTable::resolve`] fills in offsets and sizes
//! - [`PartitionTable::verify`] proves the layout consistent
//! - [`PartitionTable::to_binary`] encodes the on-flash table
//!
//! ```ignore
//! let config = LayoutConfig::default();
//! let mut table = PartitionTable::from_descriptor(&fs::read_to_string("partitions.csv")?)?;
//! table.resolve(&config)?;
//! table.verify(&config)?;
//! fs::write("partitions.bin", table.to_binary()?)?;
//! ```

mod binary;
mod params;
mod parse;
mod resolve;
mod types;
mod validate;

pub use binary::{
    has_partition_table, PartitionRecord, MAX_PARTITION_LENGTH, NAME_LEN, PARTITION_MAGIC,
    RECORD_SIZE,
};
pub use params::{FilesystemParams, DEFAULT_PARAM_FILE, FILESYSTEM_PARTITION};
pub use parse::parse_int;
pub use types::*;

impl PartitionTable {
    /// Render the table back into descriptor text
    pub fn to_descriptor(&self) -> String {
        let mut rows = vec![[
            "# Name".to_string(),
            "Type".to_string(),
            "SubType".to_string(),
            "Offset".to_string(),
            "Size".to_string(),
            "Flags".to_string(),
        ]];

        for entry in self {
            let subkind = entry
                .kind
                .subkind_name(entry.subkind)
                .unwrap_or_else(|| format!("{:#04x}", entry.subkind));
            let offset = entry.offset.map(|o| format!("{:#x}", o)).unwrap_or_default();
            let size = match entry.size {
                PartitionSize::Bytes(size) => format_size(size),
                PartitionSize::UpTo(end) => format!("-{:#x}", end),
            };
            let flags = PartitionFlags::NAMES
                .iter()
                .filter(|(_, flag)| entry.flags.contains(*flag))
                .map(|(name, _)| *name)
                .collect::<Vec<_>>()
                .join(":");
            rows.push([
                entry.name.clone(),
                entry.kind.to_string(),
                subkind,
                offset,
                size,
                flags,
            ]);
        }

        let mut widths = [0usize; 6];
        for row in &rows {
            for (w, cell) in widths.iter_mut().zip(row.iter()) {
                *w = (*w).max(cell.len() + 1);
            }
        }

        let mut out = String::new();
        for row in &rows {
            let mut line = String::new();
            for (i, cell) in row.iter().enumerate() {
                if i + 1 == row.len() {
                    line.push_str(cell);
                } else {
                    line.push_str(&format!("{:<width$} ", format!("{},", cell), width = widths[i]));
                }
            }
            out.push_str(line.trim_end());
            out.push('\n');
        }
        out
    }
}

/// Format a byte count the way descriptors usually spell it
pub fn format_size(size: u32) -> String {
    if size >= 1024 * 1024 && size % (1024 * 1024) == 0 {
        format!("{}M", size / (1024 * 1024))
    } else if size >= 1024 && size % 1024 == 0 {
        format!("{}K", size / 1024)
    } else {
        format!("{:#x}", size)
    }
}
