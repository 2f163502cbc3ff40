//! Error types for ninaflash-core
//!
//! Each stage of the pipeline has its own error enum so callers can branch
//! on what went wrong; [`Error`] wraps them all.

use thiserror::Error;

/// Reason a descriptor line could not be parsed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseErrorKind {
    /// `$NAME` did not resolve to an environment variable
    #[error("unknown variable '{0}'")]
    UnknownVariable(String),

    /// A required field was left empty
    #[error("field '{0}' can't be left empty")]
    EmptyField(&'static str),

    /// A numeric field could not be parsed and has no keyword vocabulary
    #[error("invalid field value {0}")]
    InvalidNumber(String),

    /// A value was neither a number nor one of the known keywords
    #[error("value '{value}' is not valid. Known keywords: {known}")]
    UnknownKeyword {
        /// The offending value
        value: String,
        /// Comma-separated list of accepted keywords
        known: String,
    },

    /// A numeric value does not fit the field
    #[error("value {value} is out of range for field '{field}'")]
    OutOfRange {
        /// Field name
        field: &'static str,
        /// The parsed value
        value: i64,
    },

    /// The flags column contained an unknown flag
    #[error("flag column contains unknown flag '{0}'")]
    UnknownFlag(String),

    /// A partition name was used twice
    #[error("duplicate partition name '{0}'")]
    DuplicateName(String),
}

/// The resolver could not turn an entry into a concrete byte range
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    /// The size resolves to zero or a negative extent
    #[error("partition {name}: size resolves to an empty extent (offset {offset:#x}, end {end:#x})")]
    EmptyExtent {
        /// Partition name
        name: String,
        /// Resolved offset
        offset: u32,
        /// Requested end address
        end: u32,
    },

    /// The resolved range does not fit a 32-bit address space
    #[error("partition {name}: range {offset:#x}+{size:#x} exceeds the 32-bit address space")]
    OutOfRange {
        /// Partition name
        name: String,
        /// Resolved offset
        offset: u64,
        /// Resolved size
        size: u64,
    },
}

/// A resolved table is not internally consistent
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or still unresolved
    #[error("partition {name} invalid: {field} field is not set")]
    MissingField {
        /// Partition name
        name: String,
        /// Field name
        field: &'static str,
    },

    /// Offset does not respect the kind's alignment
    #[error("partition {name} invalid: offset {offset:#x} is not aligned to {alignment:#x}")]
    Misaligned {
        /// Partition name
        name: String,
        /// Offending offset
        offset: u32,
        /// Required alignment
        alignment: u32,
    },

    /// The lowest partition starts inside the reserved region
    #[error("partition {name}: offset {offset:#x} is below {boundary:#x}")]
    BelowReserved {
        /// Partition name
        name: String,
        /// Offending offset
        offset: u32,
        /// Reserved boundary
        boundary: u32,
    },

    /// Two partitions overlap
    #[error("partition {name} at {offset:#x} overlaps {previous} at {start:#x}-{end:#x}")]
    Overlap {
        /// Partition starting too early
        name: String,
        /// Its offset
        offset: u32,
        /// Partition it collides with
        previous: String,
        /// Start of the previous partition
        start: u32,
        /// Last byte of the previous partition (inclusive)
        end: u32,
    },
}

/// The binary partition table could not be produced or read back
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodingError {
    /// Encoded records do not fit the table area
    #[error("partition table is {size} bytes, maximum is {max} bytes")]
    TableTooLarge {
        /// Encoded size
        size: usize,
        /// Maximum allowed size
        max: usize,
    },

    /// A record does not start with the partition magic
    #[error("record {index} has invalid magic {magic:02x?}")]
    InvalidMagic {
        /// Record index
        index: usize,
        /// Magic bytes found
        magic: [u8; 2],
    },

    /// The data ends in the middle of a record
    #[error("record {index} is truncated ({len} bytes)")]
    Truncated {
        /// Record index
        index: usize,
        /// Bytes available
        len: usize,
    },
}

/// A payload cannot be placed into the flash image
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssemblyError {
    /// No region with this name exists in the image layout
    #[error("no image region named '{0}'")]
    UnknownRegion(String),

    /// Payload is larger than its region
    #[error("payload for {region} is {len} bytes, region holds {size} bytes")]
    PayloadTooLarge {
        /// Region name
        region: String,
        /// Payload length (including terminator)
        len: usize,
        /// Region size
        size: u32,
    },

    /// Two payloads would be written over the same bytes
    #[error("payload for {region} at {offset:#x}-{end:#x} overlaps payload for {other}")]
    Overlap {
        /// Region placed later
        region: String,
        /// First byte of its placement
        offset: usize,
        /// Last byte of its placement (inclusive)
        end: usize,
        /// Region it collides with
        other: String,
    },

    /// Block size of zero
    #[error("block size must not be zero")]
    ZeroBlockSize,

    /// Image would not fit the flash
    #[error("payload for {region} ends at {end:#x}, beyond flash size {flash_size:#x}")]
    ExceedsFlash {
        /// Region name
        region: String,
        /// End of the placement
        end: usize,
        /// Flash size
        flash_size: u32,
    },
}

/// Crate-wide error type
#[derive(Debug, Error)]
pub enum Error {
    /// Descriptor parse failure
    #[error("error at line {line}: {kind}")]
    Parse {
        /// 1-based line number
        line: usize,
        /// What went wrong
        kind: ParseErrorKind,
    },

    /// Resolution failure
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    /// Validation failure
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Encoding or decoding failure
    #[error(transparent)]
    Encoding(#[from] EncodingError),

    /// Image assembly failure
    #[error(transparent)]
    Assembly(#[from] AssemblyError),
}

impl Error {
    /// Process exit status for this error
    ///
    /// Every core failure is a problem with the inputs' content, which
    /// exits with 2; I/O failures belong to the caller.
    pub fn exit_code(&self) -> u8 {
        2
    }
}

/// Result type alias using the crate Error type
pub type Result<T> = std::result::Result<T, Error>;
