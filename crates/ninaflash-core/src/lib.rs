//! ninaflash-core - Partition table layout engine and flash image assembler
//!
//! This crate turns a human-written partition descriptor into the binary
//! partition table an ESP32 bootloader reads at boot, and places prebuilt
//! payloads (bootloader, table, application, certificates, filesystem)
//! into a single erase-filled flash image.
//!
//! # Pipeline
//!
//! ```ignore
//! use ninaflash_core::layout::{LayoutConfig, PartitionTable};
//! use ninaflash_core::image::{ImageAssembler, ImageLayout};
//!
//! let config = LayoutConfig::default();
//! let mut table = PartitionTable::from_descriptor(&text)?;
//! table.resolve(&config)?;
//! table.verify(&config)?;
//! let binary = table.to_binary()?;
//!
//! let mut assembler = ImageAssembler::new(ImageLayout::from_table(&table));
//! assembler.add_payload("partition-table", binary)?;
//! assembler.add_payload("app", app)?;
//! let image = assembler.build()?;
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod error;
pub mod image;
pub mod layout;

pub use error::{Error, Result};
