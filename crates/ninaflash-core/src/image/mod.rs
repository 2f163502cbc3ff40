//! Flash image assembly
//!
//! Places opaque payloads at the offsets of an [`ImageLayout`] and derives
//! the output images from the single assembled buffer.
//!
//! ```ignore
//! let mut asm = ImageAssembler::new(ImageLayout::nina_w102());
//! asm.add_payload(BOOTLOADER, fs::read("bootloader.bin")?)?;
//! asm.add_payload(APP, fs::read("nina-fw.bin")?)?;
//! let image = asm.build()?;
//! for (name, bytes) in image.outputs("NINA_W102") {
//!     fs::write(name, bytes)?;
//! }
//! ```

mod assemble;
mod layout;

pub use assemble::*;
pub use layout::*;
