//! Flash image assembly
//!
//! Payloads are collected per region, then written into one buffer that
//! starts out fully erased (0xFF). Every output flavour is a slice of that
//! one buffer.

use std::ops::Range;

use super::layout::{ImageLayout, PayloadKind, APP, CERTS};
use crate::error::AssemblyError;

/// Value of an erased flash byte
pub const ERASE_VALUE: u8 = 0xFF;

/// Default granularity of the image length
pub const DEFAULT_BLOCK_SIZE: usize = 1024;

/// Assembly knobs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssemblerOptions {
    /// Image length and flavour ends are rounded up to this
    pub block_size: usize,
    /// Reject images that would not fit this flash size
    pub flash_size: Option<u32>,
}

impl Default for AssemblerOptions {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            flash_size: None,
        }
    }
}

/// Where a payload ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    /// Region name
    pub name: String,
    /// First byte
    pub offset: usize,
    /// Bytes written, including any terminator
    pub len: usize,
}

impl Placement {
    /// One past the last byte written
    pub fn end(&self) -> usize {
        self.offset + self.len
    }
}

/// An output file derived from the assembled image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFlavor {
    /// Bootloader, table, application and certificates
    Full,
    /// Everything up to the end of the application
    BootApp,
    /// The application alone
    App,
    /// The whole buffer, including the filesystem image
    All,
}

impl ImageFlavor {
    /// Every flavour, in output order
    pub const EVERY: [ImageFlavor; 4] = [Self::Full, Self::BootApp, Self::App, Self::All];

    /// File name suffix
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Full => "",
            Self::BootApp => "_BOOT_APP",
            Self::App => "_APP",
            Self::All => "_ALL",
        }
    }

    /// Output file name for a base name
    pub fn file_name(self, base: &str) -> String {
        format!("{}{}.bin", base, self.suffix())
    }
}

/// Collects payloads and builds a [`FlashImage`]
#[derive(Debug)]
pub struct ImageAssembler {
    layout: ImageLayout,
    options: AssemblerOptions,
    payloads: Vec<(String, Vec<u8>)>,
}

impl ImageAssembler {
    /// Create an assembler with default options
    pub fn new(layout: ImageLayout) -> Self {
        Self::with_options(layout, AssemblerOptions::default())
    }

    /// Create an assembler with explicit options
    pub fn with_options(layout: ImageLayout, options: AssemblerOptions) -> Self {
        Self {
            layout,
            options,
            payloads: Vec::new(),
        }
    }

    /// The region map in use
    pub fn layout(&self) -> &ImageLayout {
        &self.layout
    }

    /// Queue a payload for a region
    pub fn add_payload(&mut self, region: &str, data: impl Into<Vec<u8>>) -> Result<(), AssemblyError> {
        let data = data.into();
        let target = self
            .layout
            .by_name(region)
            .ok_or_else(|| AssemblyError::UnknownRegion(region.to_string()))?;

        let len = placed_len(target.payload, data.len());
        if let Some(size) = target.size {
            if len > size as usize {
                return Err(AssemblyError::PayloadTooLarge {
                    region: region.to_string(),
                    len,
                    size,
                });
            }
        }

        log::debug!(
            "Queued {} bytes for {} at {:#x}",
            data.len(),
            region,
            target.offset
        );
        self.payloads.push((region.to_string(), data));
        Ok(())
    }

    /// Write every queued payload into a fresh erased buffer
    pub fn build(&self) -> Result<FlashImage, AssemblyError> {
        if self.options.block_size == 0 {
            return Err(AssemblyError::ZeroBlockSize);
        }

        let mut placements = Vec::with_capacity(self.payloads.len());
        for (name, data) in &self.payloads {
            let region = self
                .layout
                .by_name(name)
                .ok_or_else(|| AssemblyError::UnknownRegion(name.clone()))?;
            let placement = Placement {
                name: name.clone(),
                offset: region.offset as usize,
                len: placed_len(region.payload, data.len()),
            };
            if let Some(flash_size) = self.options.flash_size {
                if placement.end() > flash_size as usize {
                    return Err(AssemblyError::ExceedsFlash {
                        region: name.clone(),
                        end: placement.end(),
                        flash_size,
                    });
                }
            }
            placements.push(placement);
        }

        for (i, later) in placements.iter().enumerate() {
            if let Some(earlier) = placements[..i]
                .iter()
                .find(|p| p.offset < later.end() && later.offset < p.end())
            {
                return Err(AssemblyError::Overlap {
                    region: later.name.clone(),
                    offset: later.offset,
                    end: later.end() - 1,
                    other: earlier.name.clone(),
                });
            }
        }

        let end = placements.iter().map(Placement::end).max().unwrap_or(0);
        let len = end.next_multiple_of(self.options.block_size);
        let mut data = vec![ERASE_VALUE; len];

        for ((_, payload), placement) in self.payloads.iter().zip(&placements) {
            let start = placement.offset;
            data[start..start + payload.len()].copy_from_slice(payload);
            if placement.len > payload.len() {
                data[start + payload.len()] = 0x00;
            }
        }

        log::info!("Assembled {} byte image from {} payloads", len, placements.len());
        Ok(FlashImage {
            data,
            block_size: self.options.block_size,
            placements,
        })
    }
}

fn placed_len(kind: PayloadKind, len: usize) -> usize {
    match kind {
        PayloadKind::Binary => len,
        PayloadKind::Text => len + 1,
    }
}

/// An assembled flash image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashImage {
    data: Vec<u8>,
    block_size: usize,
    placements: Vec<Placement>,
}

impl FlashImage {
    /// The whole buffer
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Buffer length
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if nothing was placed
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// All placements, in the order they were written
    pub fn placements(&self) -> &[Placement] {
        &self.placements
    }

    /// Most recent placement into a region
    pub fn placement(&self, name: &str) -> Option<&Placement> {
        self.placements.iter().rev().find(|p| p.name == name)
    }

    fn block_end(&self, end: usize) -> usize {
        end.next_multiple_of(self.block_size).min(self.data.len())
    }

    /// Byte range covered by a flavour, if the image has what it needs
    pub fn flavor_range(&self, flavor: ImageFlavor) -> Option<Range<usize>> {
        match flavor {
            ImageFlavor::All => Some(0..self.data.len()),
            ImageFlavor::Full => {
                let end = self
                    .placement(CERTS)
                    .map(|p| self.block_end(p.end()))
                    .unwrap_or(self.data.len());
                Some(0..end)
            }
            ImageFlavor::BootApp => {
                let app = self.placement(APP)?;
                Some(0..self.block_end(app.end()))
            }
            ImageFlavor::App => {
                let app = self.placement(APP)?;
                Some(app.offset..self.block_end(app.end()))
            }
        }
    }

    /// Bytes of a flavour
    pub fn flavor(&self, flavor: ImageFlavor) -> Option<&[u8]> {
        self.flavor_range(flavor).map(|r| &self.data[r])
    }

    /// Every available flavour with its output file name
    pub fn outputs(&self, base: &str) -> Vec<(String, &[u8])> {
        ImageFlavor::EVERY
            .iter()
            .filter_map(|&flavor| self.flavor(flavor).map(|bytes| (flavor.file_name(base), bytes)))
            .collect()
    }
}
