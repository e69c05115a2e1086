//! Live 32-bit / double views over a finalized 64-bit stream.
//!
//! Batteries designed around 32-bit generators only look at part of each
//! word, so the same underlying stream is offered three ways:
//!
//! | view       | `u32`                        | `f64` (53 bits, scaled by 2^-53) |
//! |------------|------------------------------|----------------------------------|
//! | `Low`      | `w & 0xffff_ffff`            | low 53 bits                      |
//! | `High`     | `w >> 32`                    | `w >> 11`                        |
//! | `Reversed` | `reverse_bits(w) & 0xffff_ffff` | low 53 bits of `reverse_bits(w)` |

use serde::Serialize;

use crate::finalizer::{ActiveFinalizer, BitFinalizer};
use crate::sequence::Sequence;

const F64_MANTISSA: u64 = (1 << 53) - 1;
const F64_SCALE: f64 = 1.0 / (1u64 << 53) as f64;

/// Which bits of each finalized word a 32-bit consumer sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleView {
    #[default]
    Low,
    High,
    Reversed,
}

impl std::fmt::Display for SampleView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "lower 32-bits"),
            Self::High => write!(f, "high 32-bits"),
            Self::Reversed => write!(f, "bitreverse & truncated to 32-bits"),
        }
    }
}

impl SampleView {
    /// 32-bit sample of `w` under this view.
    #[inline]
    pub fn u32_of(self, w: u64) -> u32 {
        match self {
            Self::Low => w as u32,
            Self::High => (w >> 32) as u32,
            Self::Reversed => w.reverse_bits() as u32,
        }
    }

    /// Uniform double in `[0, 1)` taken from `w` under this view.
    #[inline]
    pub fn f64_of(self, w: u64) -> f64 {
        let bits = match self {
            Self::Low => w & F64_MANTISSA,
            Self::High => w >> 11,
            Self::Reversed => w.reverse_bits() & F64_MANTISSA,
        };
        bits as f64 * F64_SCALE
    }
}

/// Pull-style generator: `hash(u_n)` seen through a [`SampleView`].
#[derive(Debug, Clone)]
pub struct Sampler {
    finalizer: ActiveFinalizer,
    sequence: Sequence,
    view: SampleView,
}

impl Sampler {
    pub fn new(finalizer: ActiveFinalizer, sequence: Sequence, view: SampleView) -> Self {
        Self {
            finalizer,
            sequence,
            view,
        }
    }

    /// Next full finalized word.
    #[inline]
    pub fn next_word(&mut self) -> u64 {
        self.finalizer.hash(self.sequence.next_u64())
    }

    /// Next 32-bit sample.
    #[inline]
    pub fn next_u32(&mut self) -> u32 {
        let w = self.next_word();
        self.view.u32_of(w)
    }

    /// Next double-precision sample in `[0, 1)`.
    #[inline]
    pub fn next_f64(&mut self) -> f64 {
        let w = self.next_word();
        self.view.f64_of(w)
    }

    pub fn view(&self) -> SampleView {
        self.view
    }

    pub fn finalizer(&self) -> &ActiveFinalizer {
        &self.finalizer
    }

    /// Current sequence state (the counter advances with every sample).
    pub fn sequence(&self) -> &Sequence {
        &self.sequence
    }
}
