//! Partition table display

use super::{read_input, CommandError};
use ninaflash_core::layout::{
    format_size, has_partition_table, FilesystemParams, LayoutConfig, PartitionSize,
    PartitionTable,
};
use std::path::Path;

/// Load a table from either encoding
///
/// Binary tables are recognised by the record magic at the start of the
/// file; anything else is parsed and resolved as a descriptor.
pub fn load_any(file: &Path, config: &LayoutConfig) -> Result<PartitionTable, CommandError> {
    let data = read_input(file)?;

    if has_partition_table(&data) {
        log::debug!("{:?} is a binary partition table", file);
        return Ok(PartitionTable::from_binary(&data)?);
    }

    log::debug!("{:?} has no table magic, parsing as descriptor", file);
    let text = String::from_utf8_lossy(&data);
    let mut table = PartitionTable::from_descriptor(&text)?;
    table.resolve(config)?;
    Ok(table)
}

/// Print a partition table
pub fn print_table(table: &PartitionTable) {
    println!("Partitions ({}):", table.len());
    println!(
        "{:<16} {:>6} {:>10} {:>10} {:>10} {:>10} {:>10}",
        "Name", "Type", "SubType", "Start", "End", "Size", "Flags"
    );
    println!("{:-<78}", "");

    for entry in table {
        let subkind = entry
            .kind
            .subkind_name(entry.subkind)
            .unwrap_or_else(|| format!("{:#04x}", entry.subkind));
        let (start, end, size) = match (entry.offset, entry.size) {
            (Some(offset), PartitionSize::Bytes(size)) => (
                format!("{:#010X}", offset),
                match (offset as u64 + size as u64).checked_sub(1) {
                    Some(last) if size > 0 => format!("{:#010X}", last),
                    _ => "-".into(),
                },
                format_size(size),
            ),
            _ => ("-".into(), "-".into(), "-".into()),
        };

        println!(
            "{:<16} {:>6} {:>10} {:>10} {:>10} {:>10} {:>10}",
            entry.name,
            entry.kind.to_string(),
            subkind,
            start,
            end,
            size,
            if entry.encrypted() { "encrypted" } else { "-" }
        );
    }

    if let Some(params) = FilesystemParams::from_table(table) {
        println!(
            "\nFilesystem: {} at {:#X}",
            format_size(params.size),
            params.base
        );
    }
}

/// Show a binary table or descriptor, optionally as descriptor text
pub fn cmd_show(file: &Path, config: &LayoutConfig, descriptor: bool) -> Result<(), CommandError> {
    let table = load_any(file, config)?;
    if descriptor {
        print!("{}", table.to_descriptor());
    } else {
        print_table(&table);
    }
    Ok(())
}
