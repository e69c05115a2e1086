//! # bitmix-core
//!
//! **How well does your 64-bit finalizer avalanche?**
//!
//! `bitmix-core` builds test data for 64-bit bit finalizers (the last mixing
//! step of hashes like MurmurHash3 and wyhash) and aggregates the p-values a
//! statistical battery reports on that data.
//!
//! ## Quick Start
//!
//! ```
//! use bitmix_core::{
//!     FillStrategy, Sequence, SequenceKind, SequenceState, WordBuffer, resolve,
//! };
//!
//! let mix13 = resolve("mix13").unwrap();
//! let mut seq = Sequence::new(SequenceKind::Pcg, SequenceState::default());
//! let mut buf = WordBuffer::default();
//! buf.fill(FillStrategy::Sac, &mix13, &mut seq);
//! assert_eq!(buf.byte_len(), 1024);
//! ```
//!
//! ## Architecture
//!
//! Sequence → Finalizer → Buffer (SEQ or SAC) → Battery → Aggregator
//!
//! - [`finalizer`]: the registry of named finalizers and the active selection.
//! - [`sequence`]: Weyl, LCG and PCG counter sequences.
//! - [`buffer`]: fills word buffers with hashed sequence values or SAC rows.
//! - [`sampler`]: 32-bit and double views for pull-style batteries.
//! - [`sink`]: writes buffers to files and sizes files for testing.
//! - [`aggregate`]: classifies p-values and keeps per-statistic totals.
//! - [`refine`]: decides when an inconclusive result earns a larger sample.

pub mod aggregate;
pub mod buffer;
pub mod error;
pub mod finalizer;
pub mod refine;
pub mod sampler;
pub mod sequence;
pub mod sink;

pub use aggregate::{
    Aggregator, DisplayRow, FinalReport, FinalRow, Observation, StatisticRecord, Thresholds,
    TrialCounters, Verdict, tail,
};
pub use buffer::{BLOCK_WORDS, DEFAULT_BLOCKS, FillStrategy, WordBuffer, sac_policy_advisory};
pub use error::{Advisory, BitmixError, Result};
pub use finalizer::{
    ActiveFinalizer, BitFinalizer, Builtin, Finalizer, FinalizerKind, XorshiftMul3, brace_list,
    lookup, names, resolve,
};
pub use refine::{RefineState, Refinement};
pub use sampler::{SampleView, Sampler};
pub use sequence::{PHI, Sequence, SequenceKind, SequenceState, random_counter};
pub use sink::{Construction, MIN_FILE_BITS, SizeUnit, testable_bits, write_buffers, write_file};

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
