//! Image region maps
//!
//! An [`ImageLayout`] names the places payloads can go. It is either the
//! fixed NINA-W102 map or derived from a resolved partition table.

use std::collections::HashMap;

use crate::layout::{PartitionKind, PartitionTable, MAX_PARTITION_LENGTH};

/// Region holding the second-stage bootloader
pub const BOOTLOADER: &str = "bootloader";
/// Region holding the encoded partition table
pub const PARTITION_TABLE: &str = "partition-table";
/// Region holding the application
pub const APP: &str = "app";
/// Region holding the PEM certificate bundle
pub const CERTS: &str = "certs";

/// Bootloader base address
pub const BOOTLOADER_OFFSET: u32 = 0x1000;
/// Partition table base address
pub const PARTITION_TABLE_OFFSET: u32 = 0x8000;
/// Application base address in the fixed layout
pub const APP_OFFSET: u32 = 0x10000;
/// Application region size in the fixed layout
pub const APP_SIZE: u32 = 0x180000;
/// Certificate bundle base address in the fixed layout
pub const CERTS_OFFSET: u32 = 0x190000;

/// How a payload is written into its region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    /// Copied verbatim
    Binary,
    /// Copied and followed by a NUL terminator
    Text,
}

/// A named place in the flash image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRegion {
    /// Region name
    pub name: String,
    /// Base address
    pub offset: u32,
    /// Capacity, `None` if the region runs to the end of the image
    pub size: Option<u32>,
    /// Payload handling
    pub payload: PayloadKind,
}

impl ImageRegion {
    /// Create a binary region
    pub fn new(name: impl Into<String>, offset: u32, size: Option<u32>) -> Self {
        Self {
            name: name.into(),
            offset,
            size,
            payload: PayloadKind::Binary,
        }
    }

    /// Mark the region as holding NUL-terminated text
    pub fn text(mut self) -> Self {
        self.payload = PayloadKind::Text;
        self
    }
}

/// Ordered set of image regions with lookup by name
#[derive(Debug, Clone, Default)]
pub struct ImageLayout {
    regions: Vec<ImageRegion>,
    index: HashMap<String, usize>,
}

impl ImageLayout {
    /// Create an empty layout
    pub fn new() -> Self {
        Self::default()
    }

    /// The fixed NINA-W102 layout
    pub fn nina_w102() -> Self {
        let mut layout = Self::new();
        for region in [
            ImageRegion::new(
                BOOTLOADER,
                BOOTLOADER_OFFSET,
                Some(PARTITION_TABLE_OFFSET - BOOTLOADER_OFFSET),
            ),
            ImageRegion::new(
                PARTITION_TABLE,
                PARTITION_TABLE_OFFSET,
                Some(MAX_PARTITION_LENGTH as u32),
            ),
            ImageRegion::new(APP, APP_OFFSET, Some(APP_SIZE)),
            ImageRegion::new(CERTS, CERTS_OFFSET, None).text(),
        ] {
            layout.add_region(region);
        }
        layout
    }

    /// Build a layout from a resolved partition table
    ///
    /// The bootloader and partition table keep their fixed addresses; every
    /// resolved partition becomes a region of the same name. The factory
    /// application (or the first application partition) is also reachable
    /// as [`APP`].
    pub fn from_table(table: &PartitionTable) -> Self {
        let mut layout = Self::new();
        layout.add_region(ImageRegion::new(
            BOOTLOADER,
            BOOTLOADER_OFFSET,
            Some(PARTITION_TABLE_OFFSET - BOOTLOADER_OFFSET),
        ));
        layout.add_region(ImageRegion::new(
            PARTITION_TABLE,
            PARTITION_TABLE_OFFSET,
            Some(MAX_PARTITION_LENGTH as u32),
        ));

        for entry in table {
            let Some((offset, size)) = entry.range() else {
                log::warn!("Skipping unresolved partition '{}'", entry.name);
                continue;
            };
            let mut region = ImageRegion::new(entry.name.clone(), offset, Some(size));
            if entry.name == CERTS {
                region = region.text();
            }
            layout.add_region(region);
        }

        if layout.by_name(APP).is_none() {
            let apps = || table.iter().filter(|e| e.kind == PartitionKind::App);
            let main_app = apps().find(|e| e.subkind == 0x00).or_else(|| apps().next());
            if let Some((offset, size)) = main_app.and_then(|e| e.range()) {
                layout.add_region(ImageRegion::new(APP, offset, Some(size)));
            }
        }

        layout
    }

    /// Add a region; a region with a name already present is ignored
    pub fn add_region(&mut self, region: ImageRegion) -> bool {
        if self.index.contains_key(&region.name) {
            log::warn!("Duplicate image region '{}' ignored", region.name);
            return false;
        }
        self.index.insert(region.name.clone(), self.regions.len());
        self.regions.push(region);
        true
    }

    /// Find a region by name
    pub fn by_name(&self, name: &str) -> Option<&ImageRegion> {
        self.index.get(name).map(|&idx| &self.regions[idx])
    }

    /// All regions in insertion order
    pub fn regions(&self) -> &[ImageRegion] {
        &self.regions
    }
}
