//! Flash image combination

use super::table::{load_table, TableOptions};
use super::{read_input, write_outputs, CommandError};
use crate::cli::PayloadArgs;
use ninaflash_core::image::{
    AssemblerOptions, FlashImage, ImageAssembler, ImageLayout, APP, BOOTLOADER, CERTS,
    PARTITION_TABLE,
};
use ninaflash_core::layout::{format_size, FILESYSTEM_PARTITION};
use std::path::{Path, PathBuf};

/// Inputs of a combine run
#[derive(Debug, Clone)]
pub struct CombineOptions<'a> {
    /// Descriptor to lay the image out from; fixed layout when `None`
    pub table: Option<&'a Path>,
    /// Table resolution settings
    pub table_options: TableOptions,
    /// Assembly settings
    pub assembler: AssemblerOptions,
}

/// Assemble the image in memory
pub fn build_image(
    payloads: &PayloadArgs,
    options: &CombineOptions<'_>,
) -> Result<FlashImage, CommandError> {
    let (layout, generated_table) = match options.table {
        Some(path) => {
            let table = load_table(path, &options.table_options)?;
            (ImageLayout::from_table(&table), Some(table.to_binary()?))
        }
        None => {
            if payloads.filesystem.is_some() {
                return Err(CommandError::Usage(
                    "--filesystem needs a partition table (--table)".into(),
                ));
            }
            (ImageLayout::nina_w102(), None)
        }
    };

    let mut asm = ImageAssembler::with_options(layout, options.assembler);
    asm.add_payload(BOOTLOADER, read_input(&payloads.bootloader)?)?;

    match (&payloads.partitions, generated_table) {
        (Some(path), _) => asm.add_payload(PARTITION_TABLE, read_input(path)?)?,
        (None, Some(binary)) => asm.add_payload(PARTITION_TABLE, binary)?,
        (None, None) => log::warn!("No partition table given; leaving its region erased"),
    }

    asm.add_payload(APP, read_input(&payloads.app)?)?;

    if let Some(path) = &payloads.certs {
        asm.add_payload(CERTS, read_input(path)?)?;
    }
    if let Some(path) = &payloads.filesystem {
        asm.add_payload(FILESYSTEM_PARTITION, read_input(path)?)?;
    }

    Ok(asm.build()?)
}

/// Combine payloads and write every output flavour next to `base`
pub fn cmd_combine(
    base: &str,
    payloads: &PayloadArgs,
    options: &CombineOptions<'_>,
) -> Result<(), CommandError> {
    let image = build_image(payloads, options)?;

    for placement in image.placements() {
        log::info!(
            "  {:<16} {:#010x} {:>10}",
            placement.name,
            placement.offset,
            format_size(placement.len as u32)
        );
    }

    let outputs: Vec<(PathBuf, &[u8])> = image
        .outputs(base)
        .into_iter()
        .map(|(name, bytes)| (PathBuf::from(name), bytes))
        .collect();
    write_outputs(&outputs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ninaflash_core::error::AssemblyError;
    use ninaflash_core::image::{ImageFlavor, CERTS_OFFSET};
    use ninaflash_core::layout::{LayoutConfig, PartitionTable};
    use std::fs;

    struct Fixture {
        dir: tempfile::TempDir,
        payloads: PayloadArgs,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let path = |name: &str| dir.path().join(name);

        fs::write(path("bootloader.bin"), vec![0xB0; 0x4000]).unwrap();
        fs::write(path("nina-fw.bin"), vec![0x42; 0x20000]).unwrap();
        fs::write(path("roots.pem"), "-----BEGIN CERTIFICATE-----\n").unwrap();
        fs::write(
            path("partitions.csv"),
            "nvs,data,nvs,0x9000,0x6000\n\
             phy_init,data,phy,0xf000,0x1000\n\
             factory,app,factory,0x10000,0x180000\n\
             certs,data,0x04,,0x20000\n\
             storage,data,spiffs,,-0x200000\n",
        )
        .unwrap();
        fs::write(path("spiffs.bin"), vec![0x5F; 0x1000]).unwrap();

        let payloads = PayloadArgs {
            bootloader: path("bootloader.bin"),
            partitions: None,
            app: path("nina-fw.bin"),
            certs: Some(path("roots.pem")),
            filesystem: None,
        };
        Fixture { dir, payloads }
    }

    fn options(table: Option<&Path>) -> CombineOptions<'_> {
        CombineOptions {
            table,
            table_options: TableOptions {
                layout: LayoutConfig::default(),
                verify: true,
            },
            assembler: AssemblerOptions::default(),
        }
    }

    #[test]
    fn test_fixed_layout_image() {
        let fx = fixture();
        let image = build_image(&fx.payloads, &options(None)).unwrap();
        let data = image.as_bytes();

        assert_eq!(data[0x1000], 0xB0);
        assert_eq!(data[0x5000], 0xFF);
        // no partition table given: its region stays erased
        assert!(data[0x8000..0x8C00].iter().all(|&b| b == 0xFF));
        assert_eq!(data[0x10000], 0x42);

        let pem = b"-----BEGIN CERTIFICATE-----\n";
        let base = CERTS_OFFSET as usize;
        assert_eq!(&data[base..base + pem.len()], pem);
        assert_eq!(data[base + pem.len()], 0x00);
        assert_eq!(image.len() % 1024, 0);
    }

    #[test]
    fn test_table_and_fixed_agree() {
        let fx = fixture();
        let csv = fx.dir.path().join("partitions.csv");
        let fixed = build_image(&fx.payloads, &options(None)).unwrap();
        let from_table = build_image(&fx.payloads, &options(Some(&csv))).unwrap();

        for name in [BOOTLOADER, APP, CERTS] {
            assert_eq!(
                fixed.placement(name).unwrap().offset,
                from_table.placement(name).unwrap().offset
            );
        }

        // the generated table is embedded at 0x8000 and decodes back
        let table = PartitionTable::from_binary(&from_table.as_bytes()[0x8000..0x8C00]).unwrap();
        assert_eq!(table.by_name("factory").unwrap().offset, Some(0x10000));
    }

    #[test]
    fn test_filesystem_with_table() {
        let mut fx = fixture();
        let csv = fx.dir.path().join("partitions.csv");
        fx.payloads.filesystem = Some(fx.dir.path().join("spiffs.bin"));

        let image = build_image(&fx.payloads, &options(Some(&csv))).unwrap();
        assert_eq!(image.as_bytes()[0x1B0000], 0x5F);
        assert_eq!(image.len(), 0x1B1000);
        assert!(image.flavor(ImageFlavor::Full).unwrap().len() < image.len());
    }

    #[test]
    fn test_filesystem_needs_table() {
        let mut fx = fixture();
        fx.payloads.filesystem = Some(fx.dir.path().join("spiffs.bin"));
        let err = build_image(&fx.payloads, &options(None)).unwrap_err();
        assert!(matches!(err, CommandError::Usage(_)));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_oversized_bootloader() {
        let fx = fixture();
        fs::write(&fx.payloads.bootloader, vec![0; 0x8000]).unwrap();
        let err = build_image(&fx.payloads, &options(None)).unwrap_err();
        assert!(matches!(
            err,
            CommandError::Assembly(AssemblyError::PayloadTooLarge { .. })
        ));
    }

    #[test]
    fn test_combine_writes_flavors() {
        let fx = fixture();
        let base = fx.dir.path().join("out/NINA_W102");
        let base = base.to_str().unwrap();
        cmd_combine(base, &fx.payloads, &options(None)).unwrap();

        for suffix in ["", "_BOOT_APP", "_APP", "_ALL"] {
            let path = PathBuf::from(format!("{}{}.bin", base, suffix));
            assert!(path.exists(), "{:?} missing", path);
        }
        let full = fs::read(format!("{}.bin", base)).unwrap();
        let app = fs::read(format!("{}_APP.bin", base)).unwrap();
        assert_eq!(&full[0x10000..0x10000 + app.len()], &app[..]);
    }

    #[test]
    fn test_missing_payload_writes_nothing() {
        let mut fx = fixture();
        fx.payloads.app = fx.dir.path().join("missing.bin");
        let base = fx.dir.path().join("NINA_W102");
        let err = cmd_combine(base.to_str().unwrap(), &fx.payloads, &options(None)).unwrap_err();
        assert!(matches!(err, CommandError::Read { .. }));
        assert!(!fx.dir.path().join("NINA_W102.bin").exists());
    }
}
