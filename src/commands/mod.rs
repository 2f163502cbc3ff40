//! CLI command implementations
//!
//! Every command builds its outputs fully in memory and only then writes
//! them, each through a temporary sibling file that is renamed into place.
//! A failing run therefore never leaves a half-written output behind.

pub mod combine;
pub mod show;
pub mod table;

use ninaflash_core::Error as CoreError;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors surfaced by the CLI commands
#[derive(Debug, Error)]
pub enum CommandError {
    /// Layout, encoding or assembly failure
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Image assembly failure
    #[error(transparent)]
    Assembly(#[from] ninaflash_core::error::AssemblyError),

    /// An input file could not be read
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// An output file could not be written
    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Invalid argument combination
    #[error("{0}")]
    Usage(String),
}

impl CommandError {
    /// Process exit status for this error
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Core(err) => err.exit_code(),
            Self::Assembly(_) | Self::Usage(_) => 2,
            Self::Read { .. } | Self::Write { .. } => 1,
        }
    }
}

/// Read a whole input file
pub fn read_input(path: &Path) -> Result<Vec<u8>, CommandError> {
    let data = fs::read(path).map_err(|source| CommandError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    log::debug!("Read {} bytes from {:?}", data.len(), path);
    Ok(data)
}

/// Read a whole input file as text
pub fn read_text(path: &Path) -> Result<String, CommandError> {
    fs::read_to_string(path).map_err(|source| CommandError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write several outputs so that either all of them land or none do
///
/// Every file is staged next to its destination first; the renames only
/// start once all staging writes succeeded.
pub fn write_outputs(outputs: &[(PathBuf, &[u8])]) -> Result<(), CommandError> {
    let mut staged = Vec::with_capacity(outputs.len());

    for (path, data) in outputs {
        let tmp = tmp_path(path);
        let result = path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .map_or(Ok(()), fs::create_dir_all)
            .and_then(|_| fs::write(&tmp, data));
        if let Err(source) = result {
            let _ = fs::remove_file(&tmp);
            for (staged_tmp, _) in &staged {
                let _ = fs::remove_file(staged_tmp);
            }
            return Err(CommandError::Write {
                path: path.clone(),
                source,
            });
        }
        staged.push((tmp, path));
    }

    for (idx, (tmp, path)) in staged.iter().enumerate() {
        if let Err(source) = fs::rename(tmp, path) {
            for (staged_tmp, _) in &staged[idx..] {
                let _ = fs::remove_file(staged_tmp);
            }
            return Err(CommandError::Write {
                path: path.to_path_buf(),
                source,
            });
        }
        log::info!("Wrote {:?}", path);
    }

    Ok(())
}
