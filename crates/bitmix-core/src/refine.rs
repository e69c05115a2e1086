//! Adaptive sample-size refinement.
//!
//! A test run starts at a base size. After each pass the summary p-value is
//! judged on its tail `t = min(p, 1-p)`:
//!
//! - `t <= suspect`: conclusive, stop.
//! - `t < band`: inconclusive, double the size and run again.
//! - otherwise: clearly unremarkable, stop.
//!
//! The pass limit caps the number of runs. The default of one pass means
//! refinement never kicks in unless asked for.

use serde::Serialize;

use crate::aggregate::{DEFAULT_SUSPECT, tail};

/// Default number of passes.
pub const DEFAULT_REFINE_LIMIT: u32 = 1;
/// Default upper edge of the inconclusive band on `t`.
pub const DEFAULT_REFINE_BAND: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefineState {
    Coarse,
    Refining,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Refinement {
    state: RefineState,
    size: u64,
    passes: u32,
    limit: u32,
    suspect: f64,
    band: f64,
}

impl Refinement {
    /// Start at `base_size`. A zero `limit` is treated as one.
    pub fn new(base_size: u64, limit: u32) -> Self {
        Self {
            state: RefineState::Coarse,
            size: base_size.max(1),
            passes: 0,
            limit: limit.max(1),
            suspect: DEFAULT_SUSPECT,
            band: DEFAULT_REFINE_BAND,
        }
    }

    /// Override the thresholds on `t`.
    pub fn with_thresholds(mut self, suspect: f64, band: f64) -> Self {
        self.suspect = suspect;
        self.band = band.max(suspect);
        self
    }

    pub fn state(&self) -> RefineState {
        self.state
    }

    /// Size for the next (or last) pass.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn passes(&self) -> u32 {
        self.passes
    }

    pub fn is_done(&self) -> bool {
        self.state == RefineState::Done
    }

    /// Feed the summary p-value of the pass just run.
    pub fn observe(&mut self, p: f64) -> RefineState {
        if self.is_done() {
            return self.state;
        }
        self.passes += 1;
        let t = tail(p);

        self.state = if t <= self.suspect || self.passes >= self.limit || t >= self.band {
            RefineState::Done
        } else {
            self.size = self.size.saturating_mul(2);
            log::info!(
                "inconclusive (t={t:.4}), refining at size {} (pass {}/{})",
                self.size,
                self.passes + 1,
                self.limit
            );
            RefineState::Refining
        };
        self.state
    }
}
