//! Filesystem image parameters
//!
//! The SPIFFS image generator runs as a separate build step and needs the
//! size and base address of the filesystem partition. When the last
//! partition in the table is named `storage`, those two values are
//! exported as make variables.

use std::fmt::Write as _;

use super::PartitionTable;

/// Name of the partition that holds the filesystem image
pub const FILESYSTEM_PARTITION: &str = "storage";

/// Default location of the exported make fragment
pub const DEFAULT_PARAM_FILE: &str = "components/spiffs_image/spiffs_param.mk";

/// Size and base address of the filesystem partition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilesystemParams {
    /// Partition size in bytes
    pub size: u32,
    /// Partition base address
    pub base: u32,
}

impl FilesystemParams {
    /// Derive the parameters from a resolved table
    ///
    /// Returns `None` unless the last entry is the filesystem partition.
    pub fn from_table(table: &PartitionTable) -> Option<Self> {
        let last = table.last()?;
        if last.name != FILESYSTEM_PARTITION {
            return None;
        }
        let (base, size) = last.range()?;
        Some(Self { size, base })
    }

    /// Render as make variable assignments
    pub fn to_make_vars(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "PART_SPIFFS_SIZE=\"{}\"", self.size);
        let _ = writeln!(out, "PART_SPIFFS_BASE_ADDR=\"{:#x}\"", self.base);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::LayoutConfig;

    fn resolved(text: &str) -> PartitionTable {
        let mut table = PartitionTable::from_descriptor_with(text, |_| None).unwrap();
        table.resolve(&LayoutConfig::default()).unwrap();
        table
    }

    #[test]
    fn test_storage_last() {
        let table = resolved("factory,app,factory,0x10000,0x180000\nstorage,data,spiffs,,-0x200000");
        let params = FilesystemParams::from_table(&table).unwrap();
        assert_eq!(params.base, 0x190000);
        assert_eq!(params.size, 0x70000);
        assert_eq!(
            params.to_make_vars(),
            "PART_SPIFFS_SIZE=\"458752\"\nPART_SPIFFS_BASE_ADDR=\"0x190000\"\n"
        );
    }

    #[test]
    fn test_storage_not_last() {
        let table = resolved("storage,data,spiffs,0x9000,0x1000\nfactory,app,factory,0x10000,0x180000");
        assert_eq!(FilesystemParams::from_table(&table), None);
    }

    #[test]
    fn test_empty_table() {
        assert_eq!(FilesystemParams::from_table(&PartitionTable::new()), None);
    }
}
