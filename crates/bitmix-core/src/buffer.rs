//! Word buffer construction from a base sequence and a finalizer.
//!
//! # Strategies
//!
//! - **Seq**: `buf[i] = hash(u_i)`, the hashed base sequence.
//! - **Sac**: for each 64-word block draw one base `x = u_n`, `h = hash(x)`,
//!   then `buf[p] = h ^ hash(x ^ (1 << p))` for `p` in `0..64`. Each word is
//!   the output difference caused by flipping input bit `p`, so an ideal
//!   finalizer gives words that look uniformly random.
//!
//! The base sequence for SAC must not be an additive recurrence when more
//! than one block is produced: consecutive bases then differ by a constant
//! and rows repeat across blocks. [`sac_policy_advisory`] flags that case.

use serde::Serialize;

use crate::error::{Advisory, BitmixError, Result};
use crate::finalizer::BitFinalizer;
use crate::sequence::{Sequence, SequenceKind};

/// Words per SAC block (one per input bit).
pub const BLOCK_WORDS: usize = 64;
/// Default buffer capacity in SAC blocks.
pub const DEFAULT_BLOCKS: usize = 2;

/// How the buffer is filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FillStrategy {
    /// Strict avalanche criterion rows.
    #[default]
    Sac,
    /// Hash of the base sequence.
    Seq,
}

impl std::fmt::Display for FillStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sac => write!(f, "sac"),
            Self::Seq => write!(f, "seq"),
        }
    }
}

/// Warn when a SAC fill of `blocks` blocks would be driven by an additive
/// sequence.
///
/// A single block is fine (there is nothing to correlate with); past that,
/// the Weyl generator yields bases with a constant stride whatever the
/// increment, so the advisory fires for any increment.
pub fn sac_policy_advisory(kind: SequenceKind, increment: u64, blocks: u64) -> Option<Advisory> {
    if kind == SequenceKind::Weyl && blocks > 1 {
        Some(Advisory::CorrelatedSacBases { blocks, increment }.logged())
    } else {
        None
    }
}

/// Fixed-capacity buffer of 64-bit words, a whole number of SAC blocks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordBuffer {
    words: Vec<u64>,
}

impl Default for WordBuffer {
    fn default() -> Self {
        Self {
            words: vec![0; DEFAULT_BLOCKS * BLOCK_WORDS],
        }
    }
}

impl WordBuffer {
    /// A zeroed buffer of `blocks` SAC blocks.
    pub fn with_blocks(blocks: usize) -> Result<Self> {
        if blocks == 0 {
            return Err(BitmixError::InvalidBlockCount);
        }
        Ok(Self {
            words: vec![0; blocks * BLOCK_WORDS],
        })
    }

    /// Number of SAC blocks held.
    pub fn blocks(&self) -> usize {
        self.words.len() / BLOCK_WORDS
    }

    /// Capacity in bytes.
    pub fn byte_len(&self) -> usize {
        self.words.len() * 8
    }

    pub fn words(&self) -> &[u64] {
        &self.words
    }

    /// Overwrite every word using `strategy`.
    pub fn fill<F>(&mut self, strategy: FillStrategy, hash: &F, seq: &mut Sequence)
    where
        F: BitFinalizer + ?Sized,
    {
        match strategy {
            FillStrategy::Sac => self.fill_sac(hash, seq),
            FillStrategy::Seq => self.fill_seq(hash, seq),
        }
    }

    /// `buf[i] = hash(u_i)`.
    pub fn fill_seq<F>(&mut self, hash: &F, seq: &mut Sequence)
    where
        F: BitFinalizer + ?Sized,
    {
        for w in self.words.iter_mut() {
            *w = hash.hash(seq.next_u64());
        }
    }

    /// One base value per 64-word block, one word per flipped input bit.
    pub fn fill_sac<F>(&mut self, hash: &F, seq: &mut Sequence)
    where
        F: BitFinalizer + ?Sized,
    {
        for block in self.words.chunks_exact_mut(BLOCK_WORDS) {
            sac_block(hash, seq.next_u64(), block);
        }
    }

    /// Input bits whose flip left some SAC block's output unchanged, as a
    /// mask. Only meaningful after a SAC fill.
    pub fn sac_fixed_mask(&self) -> u64 {
        self.words
            .chunks_exact(BLOCK_WORDS)
            .flat_map(sac_fixed_bits)
            .fold(0, |mask, p| mask | (1u64 << p))
    }

    /// Little-endian byte image of the buffer.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.byte_len());
        for w in &self.words {
            out.extend_from_slice(&w.to_le_bytes());
        }
        out
    }
}

/// Fill one 64-word block with `hash(x) ^ hash(x ^ 2^p)`.
#[inline]
pub fn sac_block<F>(hash: &F, x: u64, block: &mut [u64])
where
    F: BitFinalizer + ?Sized,
{
    debug_assert_eq!(block.len(), BLOCK_WORDS);
    let h = hash.hash(x);
    for (p, w) in block.iter_mut().enumerate() {
        *w = h ^ hash.hash(x ^ (1u64 << p));
    }
}

/// Bit positions whose flip leaves the output unchanged (zero SAC words).
///
/// A bijective finalizer never produces one; a non-empty result points at a
/// defect worth reporting.
pub fn sac_fixed_bits(block: &[u64]) -> Vec<usize> {
    block
        .iter()
        .enumerate()
        .filter(|(_, w)| **w == 0)
        .map(|(p, _)| p)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::finalizer::{Builtin, Finalizer, MIX13, XORSHIFT_MUL_3, lookup};
    use crate::sequence::SequenceState;

    fn seq(kind: SequenceKind, counter: u64, increment: u64) -> Sequence {
        Sequence::new(kind, SequenceState::new(counter, increment).0)
    }

    #[test]
    fn test_sac_word_is_output_difference() {
        let mix13 = Finalizer::XorshiftMul3(XORSHIFT_MUL_3[MIX13]);
        let mut buf = WordBuffer::with_blocks(1).unwrap();
        let mut s = seq(SequenceKind::Pcg, 42, 1);
        let mut peek = s;
        let x = peek.next_u64();
        buf.fill_sac(&mix13, &mut s);
        for p in 0..64 {
            let expected = mix13.hash(x) ^ mix13.hash(x ^ (1u64 << p));
            assert_eq!(buf.words()[p], expected, "bit {p}");
        }
    }

    #[test]
    fn test_sac_draws_one_base_per_block() {
        let mix = lookup("mix01").unwrap();
        let mut buf = WordBuffer::with_blocks(3).unwrap();
        let mut s = seq(SequenceKind::Lcg, 1, 1);
        buf.fill_sac(&mix, &mut s);

        let bases: Vec<u64> = seq(SequenceKind::Lcg, 1, 1).take(4).collect();
        assert_eq!(s.next_u64(), bases[3]);
        for (b, block) in buf.words().chunks(BLOCK_WORDS).enumerate() {
            let mut expect = [0u64; BLOCK_WORDS];
            sac_block(&mix, bases[b], &mut expect);
            assert_eq!(block, &expect[..]);
        }
    }

    #[test]
    fn test_seq_hashes_sequence() {
        let mix = lookup("murmur3").unwrap();
        let mut buf = WordBuffer::with_blocks(1).unwrap();
        buf.fill(FillStrategy::Seq, &mix, &mut seq(SequenceKind::Weyl, 100, 7));
        for (i, w) in buf.words().iter().enumerate() {
            assert_eq!(*w, mix.hash(100 + 7 * i as u64));
        }
    }

    #[test]
    fn test_fill_overwrites_everything() {
        let mix = lookup("mix13").unwrap();
        let mut buf = WordBuffer::with_blocks(2).unwrap();
        buf.fill_seq(&mix, &mut seq(SequenceKind::Pcg, 1, 1));
        let first = buf.clone();
        buf.fill_seq(&mix, &mut seq(SequenceKind::Pcg, 2, 1));
        assert!(buf.words().iter().zip(first.words()).all(|(a, b)| a != b));
    }

    #[test]
    fn test_identity_has_single_bit_sac_rows() {
        let identity = Finalizer::Builtin(Builtin {
            name: "identity",
            description: "",
            f: |x| x,
        });
        let mut block = [0u64; BLOCK_WORDS];
        sac_block(&identity, 0x1234, &mut block);
        for (p, w) in block.iter().enumerate() {
            assert_eq!(*w, 1u64 << p);
        }
        assert!(sac_fixed_bits(&block).is_empty());
    }

    #[test]
    fn test_fixed_bits_flags_ignored_input() {
        // Ignores the top input bit entirely.
        let lossy = Finalizer::Builtin(Builtin {
            name: "lossy",
            description: "",
            f: |x| (x << 1).wrapping_mul(0x9e3779b97f4a7c15),
        });
        let mut block = [0u64; BLOCK_WORDS];
        sac_block(&lossy, 99, &mut block);
        assert_eq!(sac_fixed_bits(&block), vec![63]);

        let mut buf = WordBuffer::with_blocks(2).unwrap();
        buf.fill_sac(&lossy, &mut seq(SequenceKind::Pcg, 7, 1));
        assert_eq!(buf.sac_fixed_mask(), 1u64 << 63);

        let mix = lookup("mix13").unwrap();
        buf.fill_sac(&mix, &mut seq(SequenceKind::Pcg, 7, 1));
        assert_eq!(buf.sac_fixed_mask(), 0);
    }

    #[test]
    fn test_zero_blocks_rejected() {
        assert!(matches!(
            WordBuffer::with_blocks(0),
            Err(BitmixError::InvalidBlockCount)
        ));
    }

    #[test]
    fn test_default_buffer_is_one_kib() {
        let buf = WordBuffer::default();
        assert_eq!(buf.blocks(), DEFAULT_BLOCKS);
        assert_eq!(buf.byte_len(), 1024);
    }

    #[test]
    fn test_le_bytes_layout() {
        let mix = lookup("mix13").unwrap();
        let mut buf = WordBuffer::with_blocks(1).unwrap();
        buf.fill_seq(&mix, &mut seq(SequenceKind::Weyl, 5, 1));
        let bytes = buf.to_le_bytes();
        assert_eq!(bytes.len(), 512);
        assert_eq!(&bytes[..8], &buf.words()[0].to_le_bytes());
    }

    #[test]
    fn test_sac_policy_flags_weyl_over_many_blocks() {
        assert_eq!(
            sac_policy_advisory(SequenceKind::Weyl, 3, 2),
            Some(Advisory::CorrelatedSacBases {
                blocks: 2,
                increment: 3
            })
        );
        assert!(sac_policy_advisory(SequenceKind::Weyl, 3, 1).is_none());
        assert!(sac_policy_advisory(SequenceKind::Lcg, 1, 1000).is_none());
        assert!(sac_policy_advisory(SequenceKind::Pcg, 1, 1000).is_none());
    }
}
