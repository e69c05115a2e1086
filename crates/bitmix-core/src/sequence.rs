//! Counter-driven base sequences `u_n` fed to the finalizer.
//!
//! All three generators thread the same [`SequenceState`]:
//!
//! - **Weyl** (additive recurrence): `u_n = c + n*inc`. Low entropy, a
//!   baseline only.
//! - **LCG**: `c' = K_MUL*c + K_ADD`, returns the pre-step state. Medium
//!   entropy, weak low bits.
//! - **PCG**: the LCG step, but the returned value goes through one `mix13`
//!   round first. High entropy.
//!
//! Output is a pure function of the initial `(counter, increment)` and the
//! number of calls.

use std::hint::black_box;

use serde::Serialize;

use crate::error::Advisory;
use crate::finalizer::{MIX13, XORSHIFT_MUL_3};

/// LCG multiplier shared by the LCG and PCG generators.
pub const K_MUL: u64 = 0xd1342543de82ef95;
/// LCG additive constant shared by the LCG and PCG generators.
pub const K_ADD: u64 = 0x2545f4914f6cdd1d;
/// Golden ratio increment (`--phi`).
pub const PHI: u64 = 0x9e3779b97f4a7c15;

/// Which transition law drives the sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SequenceKind {
    /// Additive recurrence (Weyl sequence).
    #[default]
    Weyl,
    /// 64-bit linear congruential generator.
    Lcg,
    /// LCG state with a mixed output.
    Pcg,
}

impl std::fmt::Display for SequenceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Weyl => write!(f, "weyl"),
            Self::Lcg => write!(f, "lcg"),
            Self::Pcg => write!(f, "pcg"),
        }
    }
}

impl SequenceKind {
    /// Relative entropy of the raw sequence, for display.
    pub fn entropy_label(&self) -> &'static str {
        match self {
            Self::Weyl => "low",
            Self::Lcg => "medium",
            Self::Pcg => "high",
        }
    }
}

/// Mutable state shared by every generator kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SequenceState {
    pub counter: u64,
    /// Always odd.
    pub increment: u64,
}

impl Default for SequenceState {
    fn default() -> Self {
        Self {
            counter: 0,
            increment: 1,
        }
    }
}

impl SequenceState {
    /// Build a state, forcing the increment odd.
    ///
    /// An even increment is corrected by setting its low bit; the correction
    /// is logged and returned as an [`Advisory`].
    pub fn new(counter: u64, increment: u64) -> (Self, Option<Advisory>) {
        let effective = increment | 1;
        let advisory = (effective != increment).then(|| {
            Advisory::EvenIncrement {
                requested: increment,
                effective,
            }
            .logged()
        });
        (
            Self {
                counter,
                increment: effective,
            },
            advisory,
        )
    }

    /// Weyl step.
    #[inline(always)]
    pub fn next_weyl(&mut self) -> u64 {
        let r = self.counter;
        self.counter = self.counter.wrapping_add(self.increment);
        r
    }

    /// LCG step. The returned value passes through an optimization barrier so
    /// benchmark loops can't discard the state computation.
    #[inline(always)]
    pub fn next_lcg(&mut self) -> u64 {
        let r = black_box(self.counter);
        self.counter = K_MUL.wrapping_mul(r).wrapping_add(K_ADD);
        r
    }

    /// PCG step: LCG transition, `mix13` output.
    #[inline(always)]
    pub fn next_pcg(&mut self) -> u64 {
        let s = self.counter;
        let r = black_box(XORSHIFT_MUL_3[MIX13].mix(s));
        self.counter = K_MUL.wrapping_mul(s).wrapping_add(K_ADD);
        r
    }
}

/// A generator kind bound to its state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Sequence {
    pub kind: SequenceKind,
    pub state: SequenceState,
}

impl Sequence {
    pub fn new(kind: SequenceKind, state: SequenceState) -> Self {
        Self { kind, state }
    }

    /// Next raw value `u_n`.
    #[inline]
    pub fn next_u64(&mut self) -> u64 {
        match self.kind {
            SequenceKind::Weyl => self.state.next_weyl(),
            SequenceKind::Lcg => self.state.next_lcg(),
            SequenceKind::Pcg => self.state.next_pcg(),
        }
    }
}

impl Iterator for Sequence {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        Some(self.next_u64())
    }
}

/// A hard-to-guess starting counter.
///
/// OS randomness when available, otherwise the wall clock; either way folded
/// through an LCG step and an xorshift so the raw source never shows up
/// directly.
pub fn random_counter() -> u64 {
    let mut bytes = [0u8; 8];
    let seed = match getrandom::fill(&mut bytes) {
        Ok(()) => u64::from_le_bytes(bytes),
        Err(e) => {
            log::debug!("getrandom failed ({e}), seeding counter from the clock");
            let ts = std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default();
            ts.as_nanos() as u64
        }
    };
    let c = seed ^ (seed << 32);
    let c = c.wrapping_mul(K_MUL).wrapping_add(K_ADD);
    c ^ (c >> 36)
}
