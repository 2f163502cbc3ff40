//! Partition table generation

use super::{read_text, write_outputs, CommandError};
use ninaflash_core::layout::{FilesystemParams, LayoutConfig, PartitionTable};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Options for turning a descriptor into a table
#[derive(Debug, Clone)]
pub struct TableOptions {
    /// Resolver/validator settings
    pub layout: LayoutConfig,
    /// Run the validator after resolution
    pub verify: bool,
}

/// Parse, resolve and (optionally) verify a descriptor file
pub fn load_table(input: &Path, options: &TableOptions) -> Result<PartitionTable, CommandError> {
    let text = read_text(input)?;

    log::info!("Parsing descriptor {:?}...", input);
    let mut table = PartitionTable::from_descriptor(&text)?;
    table.resolve(&options.layout)?;

    if options.verify {
        log::info!("Verifying table...");
        table.verify(&options.layout)?;
    } else {
        log::debug!("Skipping table verification");
    }

    Ok(table)
}

/// Generate `output` from `input` and export the filesystem parameters
pub fn cmd_gen_table(
    input: &Path,
    output: &Path,
    param_file: &Path,
    options: &TableOptions,
) -> Result<(), CommandError> {
    // a stale export must not survive a run that no longer produces one
    match fs::remove_file(param_file) {
        Ok(()) => log::debug!("Removed stale {:?}", param_file),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(source) => {
            return Err(CommandError::Write {
                path: param_file.to_path_buf(),
                source,
            })
        }
    }

    let table = load_table(input, options)?;
    let binary = table.to_binary()?;
    log::info!("Encoded {} partitions", table.len());

    let params = FilesystemParams::from_table(&table);
    let params_text = params.map(|p| p.to_make_vars());

    let mut outputs: Vec<(PathBuf, &[u8])> = vec![(output.to_path_buf(), binary.as_slice())];
    if let Some(text) = &params_text {
        outputs.push((param_file.to_path_buf(), text.as_bytes()));
    }
    write_outputs(&outputs)?;

    if let Some(p) = params {
        log::info!(
            "Filesystem partition: {} bytes at {:#x}",
            p.size,
            p.base
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ninaflash_core::error::{ResolutionError, ValidationError};
    use ninaflash_core::Error;

    const NINA_CSV: &str = "\
# Name,   Type, SubType, Offset,  Size, Flags
nvs,      data, nvs,     0x9000,  0x6000,
phy_init, data, phy,     0xf000,  0x1000,
factory,  app,  factory, 0x10000, 0x180000,
certs,    data, 0x04,    ,        0x20000,
storage,  data, spiffs,  ,        -0x200000,
";

    fn options(verify: bool) -> TableOptions {
        TableOptions {
            layout: LayoutConfig::default(),
            verify,
        }
    }

    #[test]
    fn test_gen_table() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("partitions.csv");
        let output = dir.path().join("partitions.bin");
        let params = dir.path().join("spiffs/spiffs_param.mk");
        fs::write(&input, NINA_CSV).unwrap();

        cmd_gen_table(&input, &output, &params, &options(true)).unwrap();

        let bin = fs::read(&output).unwrap();
        assert_eq!(bin.len(), 0xC00);
        let decoded = PartitionTable::from_binary(&bin).unwrap();
        assert_eq!(decoded.len(), 5);
        assert_eq!(decoded.by_name("storage").unwrap().range(), Some((0x1B0000, 0x50000)));

        assert_eq!(
            fs::read_to_string(&params).unwrap(),
            "PART_SPIFFS_SIZE=\"327680\"\nPART_SPIFFS_BASE_ADDR=\"0x1b0000\"\n"
        );
    }

    #[test]
    fn test_stale_params_removed() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("partitions.csv");
        let output = dir.path().join("partitions.bin");
        let params = dir.path().join("spiffs_param.mk");
        fs::write(&input, "factory,app,factory,0x10000,1M\n").unwrap();
        fs::write(&params, "stale").unwrap();

        cmd_gen_table(&input, &output, &params, &options(true)).unwrap();
        assert!(output.exists());
        assert!(!params.exists());
    }

    #[test]
    fn test_failure_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("partitions.csv");
        let output = dir.path().join("partitions.bin");
        let params = dir.path().join("spiffs_param.mk");
        fs::write(&input, "a,data,nvs,,0x4000\nb,data,phy,0x6000,0x1000\n").unwrap();

        let err = cmd_gen_table(&input, &output, &params, &options(true)).unwrap_err();
        assert!(matches!(
            err,
            CommandError::Core(Error::Validation(ValidationError::Overlap { .. }))
        ));
        assert_eq!(err.exit_code(), 2);
        assert!(!output.exists());
        assert!(!params.exists());
    }

    #[test]
    fn test_no_verify_still_resolves() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("partitions.csv");
        let output = dir.path().join("partitions.bin");
        let params = dir.path().join("spiffs_param.mk");
        fs::write(&input, "boot,app,factory,0x1000,0x7000\napp,app,ota_0,,0x180000\n").unwrap();

        assert!(cmd_gen_table(&input, &output, &params, &options(true)).is_err());
        cmd_gen_table(&input, &output, &params, &options(false)).unwrap();

        let decoded = PartitionTable::from_binary(&fs::read(&output).unwrap()).unwrap();
        assert_eq!(decoded.by_name("app").unwrap().offset, Some(0x10000));
    }

    #[test]
    fn test_resolution_error_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("partitions.csv");
        fs::write(&input, "nvs,data,nvs,0x9000,-0x8000\n").unwrap();

        let err = load_table(&input, &options(false)).unwrap_err();
        assert!(matches!(
            err,
            CommandError::Core(Error::Resolution(ResolutionError::EmptyExtent { .. }))
        ));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_table(&dir.path().join("nope.csv"), &options(true)).unwrap_err();
        assert!(matches!(err, CommandError::Read { .. }));
        assert_eq!(err.exit_code(), 1);
    }
}
