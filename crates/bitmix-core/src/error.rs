//! Error and advisory types.
//!
//! Fatal conditions (the output file cannot be opened, an input file is too
//! small to test) are [`BitmixError`]s. Configuration problems that are
//! corrected in place are [`Advisory`] values: the caller gets the corrected
//! configuration back together with the advisory, and the advisory has
//! already been logged.

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// Result type for bitmix operations.
pub type Result<T> = std::result::Result<T, BitmixError>;

/// Errors that terminate a run.
#[derive(Debug, Error)]
pub enum BitmixError {
    /// Could not open a file for reading or writing.
    #[error("couldn't open '{}': {source}", path.display())]
    Open {
        /// File that failed to open.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Input file holds too few bits for the battery.
    #[error("datafile '{}' too small: {bits} bits, need at least {min_bits}", path.display())]
    FileTooSmall {
        /// The file that was measured.
        path: PathBuf,
        /// Bits available in the file.
        bits: u64,
        /// Minimum bits required.
        min_bits: u64,
    },

    /// A buffer of zero SAC blocks was requested.
    #[error("buffer must hold at least one 64-word block")]
    InvalidBlockCount,

    /// Unknown finalizer name where a substitute is not acceptable.
    #[error("hash {name} not found")]
    UnknownFinalizer {
        /// The name that failed to resolve.
        name: String,
    },

    /// I/O error while writing or reading data.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A non-fatal configuration condition that was corrected or merits a warning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Advisory {
    /// An even sequence increment was forced odd.
    EvenIncrement {
        /// Increment as supplied.
        requested: u64,
        /// Increment actually used (low bit set).
        effective: u64,
    },

    /// SAC rows built from an additive base sequence repeat across blocks.
    CorrelatedSacBases {
        /// Number of 64-word SAC blocks that will be produced.
        blocks: u64,
        /// Increment of the additive sequence.
        increment: u64,
    },

    /// Flipping these input bits left the finalizer output unchanged in at
    /// least one SAC block.
    FixedPointBits {
        /// Finalizer that produced the zero SAC words.
        finalizer: String,
        /// Input bit positions, ascending.
        bits: Vec<usize>,
    },

    /// Finalizer selection failed; the previous finalizer stays active.
    UnknownFinalizer {
        /// The name that failed to resolve.
        name: String,
    },

    /// A numeric argument did not parse; a default was used instead.
    MalformedNumber {
        /// Which option the value belonged to.
        option: String,
        /// The text that failed to parse.
        value: String,
    },
}

impl std::fmt::Display for Advisory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EvenIncrement { effective, .. } => {
                write!(f, "increment must be odd. setting=0x{effective:016x}")
            }
            Self::CorrelatedSacBases { blocks, increment } => write!(
                f,
                "SAC over an additive sequence (inc=0x{increment:016x}) repeats rows across \
                 {blocks} blocks; use an lcg or pcg sequence"
            ),
            Self::FixedPointBits { finalizer, bits } => write!(
                f,
                "hash {finalizer}: flipping input bits {bits:?} leaves the output unchanged"
            ),
            Self::UnknownFinalizer { name } => write!(f, "hash {name} not found. unmodified"),
            Self::MalformedNumber { option, value } => {
                write!(f, "skipping malformed {option} argument '{value}'")
            }
        }
    }
}

impl Advisory {
    /// Log the advisory at warn level and hand it back.
    pub fn logged(self) -> Self {
        log::warn!("{self}");
        self
    }
}
