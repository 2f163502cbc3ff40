//! Layout types
//!
//! Core types for partition tables: entries, their kind/subkind
//! vocabulary, and the table itself.

use std::collections::HashMap;
use std::fmt;

use bitflags::bitflags;

/// First address that may be claimed by a partition
pub const DEFAULT_RESERVED_BOUNDARY: u32 = 0x5000;

/// Alignment required for executable partitions
pub const APP_ALIGNMENT: u32 = 0x10000;

/// Alignment required for every other partition
pub const DATA_ALIGNMENT: u32 = 4;

/// Partition type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PartitionKind {
    /// Executable application image
    App,
    /// Data region
    Data,
    /// Any other numeric type
    Other(u8),
}

impl PartitionKind {
    /// Symbolic names accepted in the descriptor
    pub const KEYWORDS: &'static [(&'static str, u8)] = &[("app", 0x00), ("data", 0x01)];

    /// Build a kind from its on-flash byte
    pub fn from_u8(value: u8) -> Self {
        match value {
            0x00 => Self::App,
            0x01 => Self::Data,
            other => Self::Other(other),
        }
    }

    /// On-flash byte for this kind
    pub fn as_u8(self) -> u8 {
        match self {
            Self::App => 0x00,
            Self::Data => 0x01,
            Self::Other(value) => value,
        }
    }

    /// Offset alignment required for partitions of this kind
    pub fn alignment(self) -> u32 {
        match self {
            Self::App => APP_ALIGNMENT,
            _ => DATA_ALIGNMENT,
        }
    }

    /// Subkind keywords valid for this kind
    pub fn subkinds(self) -> Vec<(String, u8)> {
        match self {
            Self::App => {
                let mut keywords = vec![("factory".to_string(), 0x00), ("test".to_string(), 0x20)];
                keywords.extend((0..16u8).map(|slot| (format!("ota_{}", slot), 0x10 + slot)));
                keywords
            }
            Self::Data => [
                ("ota", 0x00),
                ("phy", 0x01),
                ("nvs", 0x02),
                ("coredump", 0x03),
                ("esphttpd", 0x80),
                ("fat", 0x81),
                ("spiffs", 0x82),
            ]
            .iter()
            .map(|&(name, value)| (name.to_string(), value))
            .collect(),
            Self::Other(_) => Vec::new(),
        }
    }

    /// Keyword for a subkind value, if one exists
    pub fn subkind_name(self, subkind: u8) -> Option<String> {
        self.subkinds()
            .into_iter()
            .find(|(_, value)| *value == subkind)
            .map(|(name, _)| name)
    }
}

impl fmt::Display for PartitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::App => write!(f, "app"),
            Self::Data => write!(f, "data"),
            Self::Other(value) => write!(f, "{:#04x}", value),
        }
    }
}

/// Partition size as written in the descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionSize {
    /// A concrete byte count
    Bytes(u32),
    /// Extend up to (not including) this absolute address
    UpTo(u32),
}

impl PartitionSize {
    /// Byte count, if the size is concrete
    pub fn bytes(self) -> Option<u32> {
        match self {
            Self::Bytes(n) => Some(n),
            Self::UpTo(_) => None,
        }
    }
}

bitflags! {
    /// Partition attribute flags, as stored in the binary record
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PartitionFlags: u32 {
        /// Contents are flash-encrypted
        const ENCRYPTED = 1 << 0;
    }
}

impl PartitionFlags {
    /// Flag names accepted in the descriptor's flags column
    pub const NAMES: &'static [(&'static str, PartitionFlags)] =
        &[("encrypted", PartitionFlags::ENCRYPTED)];
}

/// One region of flash
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionEntry {
    /// Name, unique within a table
    pub name: String,
    /// Partition type
    pub kind: PartitionKind,
    /// Subtype tag, interpreted relative to `kind`
    pub subkind: u8,
    /// Start address, `None` until resolved if omitted
    pub offset: Option<u32>,
    /// Size, possibly an end-address sentinel until resolved
    pub size: PartitionSize,
    /// Attribute flags
    pub flags: PartitionFlags,
}

impl PartitionEntry {
    /// Create a fully specified entry
    pub fn new(name: impl Into<String>, kind: PartitionKind, subkind: u8, offset: u32, size: u32) -> Self {
        Self {
            name: name.into(),
            kind,
            subkind,
            offset: Some(offset),
            size: PartitionSize::Bytes(size),
            flags: PartitionFlags::empty(),
        }
    }

    /// Resolved `(offset, size)`, if both are concrete
    pub fn range(&self) -> Option<(u32, u32)> {
        Some((self.offset?, self.size.bytes()?))
    }

    /// Address one past the last byte, if resolved
    pub fn end(&self) -> Option<u64> {
        self.range().map(|(offset, size)| offset as u64 + size as u64)
    }

    /// Whether the entry is marked as encrypted
    pub fn encrypted(&self) -> bool {
        self.flags.contains(PartitionFlags::ENCRYPTED)
    }
}

impl fmt::Display for PartitionEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Part '{}' {}/{:#04x}", self.name, self.kind, self.subkind)?;
        match self.offset {
            Some(offset) => write!(f, " @ {:#x}", offset)?,
            None => write!(f, " @ auto")?,
        }
        match self.size {
            PartitionSize::Bytes(size) => write!(f, " size {:#x}", size),
            PartitionSize::UpTo(end) => write!(f, " up to {:#x}", end),
        }
    }
}

/// Knobs for resolving and validating a table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutConfig {
    /// Lowest address a partition may occupy; also the resolver's start
    pub reserved_boundary: u32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            reserved_boundary: DEFAULT_RESERVED_BOUNDARY,
        }
    }
}

/// An ordered partition table with lookup by name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartitionTable {
    entries: Vec<PartitionEntry>,
    index: HashMap<String, usize>,
}

impl PartitionTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry
    ///
    /// Returns the entry back if its name is already taken.
    pub fn push(&mut self, entry: PartitionEntry) -> Result<usize, PartitionEntry> {
        if self.index.contains_key(&entry.name) {
            return Err(entry);
        }
        let idx = self.entries.len();
        self.index.insert(entry.name.clone(), idx);
        self.entries.push(entry);
        Ok(idx)
    }

    /// Entry at a position
    pub fn get(&self, idx: usize) -> Option<&PartitionEntry> {
        self.entries.get(idx)
    }

    /// Find an entry by name
    pub fn by_name(&self, name: &str) -> Option<&PartitionEntry> {
        self.index.get(name).map(|&idx| &self.entries[idx])
    }

    /// Position of an entry by name
    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// All entries in source order
    pub fn entries(&self) -> &[PartitionEntry] {
        &self.entries
    }

    pub(crate) fn entries_mut(&mut self) -> &mut [PartitionEntry] {
        &mut self.entries
    }

    /// Iterate over entries in source order
    pub fn iter(&self) -> impl Iterator<Item = &PartitionEntry> {
        self.entries.iter()
    }

    /// Last entry in source order
    pub fn last(&self) -> Option<&PartitionEntry> {
        self.entries.last()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the table is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether every entry has a concrete offset and size
    pub fn is_resolved(&self) -> bool {
        self.entries.iter().all(|e| e.range().is_some())
    }
}

impl<'a> IntoIterator for &'a PartitionTable {
    type Item = &'a PartitionEntry;
    type IntoIter = std::slice::Iter<'a, PartitionEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
