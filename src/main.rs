//! ninaflash - partition tables and flash images for NINA-W102 firmware
//!
//! Turns a partition descriptor into the binary table the bootloader reads
//! and combines bootloader, table, application, certificates and an
//! optional filesystem image into flashable files.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use commands::combine::CombineOptions;
use commands::table::TableOptions;
use ninaflash_core::image::AssemblerOptions;
use ninaflash_core::layout::LayoutConfig;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logger
    let default_level = if cli.quiet { "error" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    // Set log level based on verbosity
    if !cli.quiet {
        match cli.verbose {
            0 => {} // default (info)
            1 => log::set_max_level(log::LevelFilter::Debug),
            _ => log::set_max_level(log::LevelFilter::Trace),
        }
    }

    let layout = LayoutConfig {
        reserved_boundary: cli.reserved,
    };

    let result = match cli.command {
        Commands::GenTable {
            input,
            output,
            verify,
            param_file,
        } => commands::table::cmd_gen_table(
            &input,
            &output,
            &param_file,
            &TableOptions { layout, verify },
        ),
        Commands::Combine {
            base,
            table,
            verify,
            flash_size,
            block_size,
            payloads,
        } => {
            let options = CombineOptions {
                table: table.as_deref(),
                table_options: TableOptions { layout, verify },
                assembler: AssemblerOptions {
                    block_size: block_size as usize,
                    flash_size,
                },
            };
            commands::combine::cmd_combine(&base, &payloads, &options)
        }
        Commands::Show { file, descriptor } => {
            commands::show::cmd_show(&file, &layout, descriptor)
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(e.exit_code())
        }
    }
}
