//! Writing constructed buffers out, and sizing data files for battery runs.
//!
//! Files are raw little-endian 64-bit words written one buffer at a time.
//! Every buffer goes through `write_all`, so a short write is continued until
//! the buffer is fully written and any error ends the run; nothing is
//! silently dropped.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::buffer::{FillStrategy, WordBuffer, sac_policy_advisory};
use crate::error::{Advisory, BitmixError, Result};
use crate::finalizer::BitFinalizer;
use crate::sequence::Sequence;

/// Smallest data file a battery is run on, in bits.
pub const MIN_FILE_BITS: u64 = 4096;

/// Size unit for requested output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeUnit {
    Kib,
    Mib,
    Gib,
}

impl SizeUnit {
    fn shift(self) -> u32 {
        match self {
            Self::Kib => 10,
            Self::Mib => 20,
            Self::Gib => 30,
        }
    }

    /// `value` units in bytes, saturating.
    pub fn bytes(self, value: u64) -> u64 {
        value
            .checked_shl(self.shift())
            .filter(|b| b >> self.shift() == value)
            .unwrap_or(u64::MAX)
    }
}

/// Number of whole buffers needed to cover `total_bytes`, at least one.
pub fn buffers_for_bytes(total_bytes: u64, buffer_bytes: usize) -> u64 {
    let per = buffer_bytes.max(1) as u64;
    total_bytes.div_ceil(per).max(1)
}

/// What to generate: strategy, finalizer and base sequence.
///
/// Also remembers which input bits have shown up as SAC fixed points, so
/// each one is reported once however many buffers are filled.
pub struct Construction<'a, F: BitFinalizer + ?Sized> {
    pub strategy: FillStrategy,
    pub finalizer: &'a F,
    pub sequence: &'a mut Sequence,
    fixed: u64,
}

impl<'a, F: BitFinalizer + ?Sized> Construction<'a, F> {
    pub fn new(strategy: FillStrategy, finalizer: &'a F, sequence: &'a mut Sequence) -> Self {
        Self {
            strategy,
            finalizer,
            sequence,
            fixed: 0,
        }
    }

    /// The correlated-bases advisory for producing `blocks` SAC blocks from
    /// this job's sequence, logged when it fires. `None` for SEQ fills.
    pub fn policy_advisory(&self, blocks: u64) -> Option<Advisory> {
        match self.strategy {
            FillStrategy::Sac => {
                sac_policy_advisory(self.sequence.kind, self.sequence.state.increment, blocks)
            }
            FillStrategy::Seq => None,
        }
    }

    /// Overwrite `buf` with the next buffer of data.
    ///
    /// After a SAC fill, input bits newly seen as fixed points come back as an
    /// [`Advisory::FixedPointBits`] (already logged).
    pub fn fill(&mut self, buf: &mut WordBuffer) -> Option<Advisory> {
        buf.fill(self.strategy, self.finalizer, &mut *self.sequence);
        if self.strategy != FillStrategy::Sac {
            return None;
        }
        let fresh = buf.sac_fixed_mask() & !self.fixed;
        if fresh == 0 {
            return None;
        }
        self.fixed |= fresh;
        let bits = (0..64).filter(|p| fresh >> p & 1 == 1).collect();
        Some(
            Advisory::FixedPointBits {
                finalizer: self.finalizer.name().to_string(),
                bits,
            }
            .logged(),
        )
    }

    /// Every input bit reported as a fixed point so far, ascending.
    pub fn fixed_bits(&self) -> Vec<usize> {
        (0..64).filter(|p| self.fixed >> p & 1 == 1).collect()
    }
}

/// Fill `buf` `count` times, writing each fill to `out`.
///
/// Returns the number of bytes written. `out` is flushed before returning.
pub fn write_buffers<W, F>(
    out: &mut W,
    buf: &mut WordBuffer,
    job: &mut Construction<'_, F>,
    count: u64,
) -> Result<u64>
where
    W: Write,
    F: BitFinalizer + ?Sized,
{
    let mut written = 0u64;
    for _ in 0..count {
        job.fill(buf);
        out.write_all(&buf.to_le_bytes())?;
        written += buf.byte_len() as u64;
    }
    out.flush()?;
    Ok(written)
}

/// Create (or truncate) `path` and write `count` buffers into it.
///
/// A SAC job over an additive sequence logs the correlated-bases advisory
/// before anything is written.
pub fn write_file<F>(
    path: &Path,
    buf: &mut WordBuffer,
    job: &mut Construction<'_, F>,
    count: u64,
) -> Result<u64>
where
    F: BitFinalizer + ?Sized,
{
    job.policy_advisory(count.saturating_mul(buf.blocks() as u64));
    let file = File::create(path).map_err(|source| BitmixError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let mut out = BufWriter::with_capacity(buf.byte_len(), file);
    let written = write_buffers(&mut out, buf, job, count)?;
    log::debug!("wrote {written} bytes to {}", path.display());
    Ok(written)
}

/// Size of `path` in bytes.
pub fn file_size(path: &Path) -> Result<u64> {
    std::fs::metadata(path)
        .map(|m| m.len())
        .map_err(|source| BitmixError::Open {
            path: path.to_path_buf(),
            source,
        })
}

/// Size of `path` in bits, rejecting files too small to test.
pub fn testable_bits(path: &Path) -> Result<u64> {
    let bits = file_size(path)?.saturating_mul(8);
    if bits < MIN_FILE_BITS {
        return Err(BitmixError::FileTooSmall {
            path: path.to_path_buf(),
            bits,
            min_bits: MIN_FILE_BITS,
        });
    }
    Ok(bits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::finalizer::{Builtin, Finalizer, resolve};
    use crate::sequence::{SequenceKind, SequenceState};

    #[test]
    fn test_size_units() {
        assert_eq!(SizeUnit::Kib.bytes(3), 3 << 10);
        assert_eq!(SizeUnit::Mib.bytes(1), 1 << 20);
        assert_eq!(SizeUnit::Gib.bytes(2), 2 << 30);
        assert_eq!(SizeUnit::Gib.bytes(u64::MAX), u64::MAX);
    }

    #[test]
    fn test_buffers_round_up() {
        assert_eq!(buffers_for_bytes(1024, 1024), 1);
        assert_eq!(buffers_for_bytes(1025, 1024), 2);
        assert_eq!(buffers_for_bytes(0, 1024), 1);
        assert_eq!(buffers_for_bytes(1 << 20, 1024), 1024);
    }

    #[test]
    fn test_write_file_layout() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("data.bin");
        let mix = resolve("mix13").unwrap();
        let mut seq = Sequence::new(SequenceKind::Pcg, SequenceState::new(0, 1).0);
        let mut buf = WordBuffer::default();
        let mut job = Construction::new(FillStrategy::Sac, &mix, &mut seq);
        let written = write_file(&path, &mut buf, &mut job, 3).unwrap();
        assert_eq!(written, 3 * 1024);

        let data = std::fs::read(&path).unwrap();
        assert_eq!(data.len(), 3 * 1024);
        // The last buffer in the file is what the buffer holds now.
        assert_eq!(&data[2 * 1024..], &buf.to_le_bytes()[..]);
        assert_eq!(file_size(&path).unwrap(), 3 * 1024);
    }

    #[test]
    fn test_write_buffers_to_memory() {
        let mix = resolve("murmur3").unwrap();
        let mut seq = Sequence::new(SequenceKind::Weyl, SequenceState::new(0, 1).0);
        let mut buf = WordBuffer::with_blocks(1).unwrap();
        let mut out = Vec::new();
        let mut job = Construction::new(FillStrategy::Seq, &mix, &mut seq);
        write_buffers(&mut out, &mut buf, &mut job, 2).unwrap();
        assert_eq!(out.len(), 1024);
        let word = u64::from_le_bytes(out[8..16].try_into().unwrap());
        assert_eq!(word, mix.hash(1));
        let word = u64::from_le_bytes(out[512..520].try_into().unwrap());
        assert_eq!(word, mix.hash(64));
    }

    #[test]
    fn test_unwritable_path_is_open_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("missing-dir").join("data.bin");
        let mix = resolve("mix01").unwrap();
        let mut seq = Sequence::new(SequenceKind::Lcg, SequenceState::default());
        let mut buf = WordBuffer::default();
        let mut job = Construction::new(FillStrategy::Sac, &mix, &mut seq);
        let err = write_file(&path, &mut buf, &mut job, 1).unwrap_err();
        assert!(matches!(err, BitmixError::Open { .. }));
        assert!(!path.exists());
    }

    #[test]
    fn test_missing_file_size_is_open_error() {
        let tmp = tempfile::tempdir().unwrap();
        let err = file_size(&tmp.path().join("nope.bin")).unwrap_err();
        assert!(matches!(err, BitmixError::Open { .. }));
    }

    #[test]
    fn test_small_file_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("small.bin");
        std::fs::write(&path, [0u8; 100]).unwrap();
        assert!(matches!(
            testable_bits(&path),
            Err(BitmixError::FileTooSmall { bits: 800, .. })
        ));
        std::fs::write(&path, [0u8; 512]).unwrap();
        assert_eq!(testable_bits(&path).unwrap(), 4096);
    }

    #[test]
    fn test_weyl_sac_job_reports_correlated_bases() {
        let mix = resolve("mix13").unwrap();
        let mut seq = Sequence::new(SequenceKind::Weyl, SequenceState::new(0, 2).0);
        let job = Construction::new(FillStrategy::Sac, &mix, &mut seq);
        assert_eq!(
            job.policy_advisory(2),
            Some(Advisory::CorrelatedSacBases {
                blocks: 2,
                increment: 3
            })
        );
        assert!(job.policy_advisory(1).is_none());

        let job = Construction::new(FillStrategy::Seq, &mix, &mut seq);
        assert!(job.policy_advisory(1000).is_none());
    }

    #[test]
    fn test_fixed_points_reported_once() {
        // Drops the top input bit.
        let lossy = Finalizer::Builtin(Builtin {
            name: "lossy",
            description: "",
            f: |x| (x << 1).wrapping_mul(0x9e3779b97f4a7c15),
        });
        let mut seq = Sequence::new(SequenceKind::Pcg, SequenceState::new(5, 1).0);
        let mut buf = WordBuffer::default();
        let mut job = Construction::new(FillStrategy::Sac, &lossy, &mut seq);

        assert_eq!(
            job.fill(&mut buf),
            Some(Advisory::FixedPointBits {
                finalizer: "lossy".into(),
                bits: vec![63]
            })
        );
        assert_eq!(job.fill(&mut buf), None);
        assert_eq!(job.fixed_bits(), vec![63]);

        let mut out = Vec::new();
        write_buffers(&mut out, &mut buf, &mut job, 2).unwrap();
        assert_eq!(job.fixed_bits(), vec![63]);
    }

    #[test]
    fn test_good_finalizer_has_no_fixed_points() {
        let mix = resolve("mix13").unwrap();
        let mut seq = Sequence::new(SequenceKind::Lcg, SequenceState::new(5, 1).0);
        let mut buf = WordBuffer::default();
        let mut job = Construction::new(FillStrategy::Sac, &mix, &mut seq);
        for _ in 0..8 {
            assert!(job.fill(&mut buf).is_none());
        }
        assert!(job.fixed_bits().is_empty());
    }
}
