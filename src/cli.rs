//! CLI argument parsing

use clap::{ArgAction, Parser, Subcommand};
use ninaflash_core::layout::{parse_int, DEFAULT_PARAM_FILE};
use std::path::PathBuf;

/// Parse an address or size: decimal, hex (0x...), with optional k/m suffix
fn parse_address(s: &str) -> Result<u32, String> {
    let value = parse_int(s.trim(), &[]).map_err(|e| e.to_string())?;
    u32::try_from(value).map_err(|_| format!("Value out of range: {}", s))
}

#[derive(Parser)]
#[command(name = "ninaflash")]
#[command(author, version, about = "NINA-W102 partition table and flash image tool", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Don't print status messages
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Lowest address a partition may occupy
    #[arg(long, global = true, value_parser = parse_address, default_value = "0x5000")]
    pub reserved: u32,

    #[command(subcommand)]
    pub command: Commands,
}

/// Payload files placed by `combine`
#[derive(clap::Args, Debug, Clone, Default)]
pub struct PayloadArgs {
    /// Second-stage bootloader binary
    #[arg(long, default_value = "build/bootloader/bootloader.bin")]
    pub bootloader: PathBuf,

    /// Encoded partition table (generated from --table when omitted)
    #[arg(long)]
    pub partitions: Option<PathBuf>,

    /// Application binary
    #[arg(long, default_value = "build/nina-fw.bin")]
    pub app: PathBuf,

    /// PEM certificate bundle (stored NUL-terminated)
    #[arg(long)]
    pub certs: Option<PathBuf>,

    /// Filesystem image for the storage partition (requires --table)
    #[arg(long)]
    pub filesystem: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate the binary partition table from a descriptor
    GenTable {
        /// Partition descriptor (CSV)
        #[arg(default_value = "partitions.csv")]
        input: PathBuf,

        /// Output file for the binary table
        #[arg(default_value = "partitions.bin")]
        output: PathBuf,

        /// Skip layout verification
        #[arg(long = "no-verify", action = ArgAction::SetFalse)]
        verify: bool,

        /// Where to export the filesystem size and base address
        #[arg(long, default_value = DEFAULT_PARAM_FILE)]
        param_file: PathBuf,
    },

    /// Combine payloads into flash images
    Combine {
        /// Base name of the output files
        #[arg(default_value = "NINA_W102")]
        base: String,

        /// Lay out the image from this descriptor instead of the fixed map
        #[arg(short, long)]
        table: Option<PathBuf>,

        /// Skip layout verification of --table
        #[arg(long = "no-verify", action = ArgAction::SetFalse)]
        verify: bool,

        /// Reject images larger than this (e.g. 2M, 0x200000)
        #[arg(long, value_parser = parse_address)]
        flash_size: Option<u32>,

        /// Image length granularity
        #[arg(long, value_parser = parse_address, default_value = "1k")]
        block_size: u32,

        #[command(flatten)]
        payloads: PayloadArgs,
    },

    /// Show a partition table (binary or descriptor)
    Show {
        /// Table file
        file: PathBuf,

        /// Print descriptor text instead of the summary
        #[arg(short, long)]
        descriptor: bool,
    },
}
