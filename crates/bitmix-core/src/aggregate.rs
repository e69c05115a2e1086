//! Per-statistic p-value classification and cross-trial aggregation.
//!
//! A battery run ("trial") yields `(id, name, p)` for each statistic it
//! evaluated. Everything is judged on the two-sided tail `t = min(p, 1-p)`:
//!
//! ```text
//!   t >= report            ignored
//!   suspect < t < report   noted (shown, not counted)
//!   fail < t <= suspect    suspicious
//!   t <= fail              failed (not also counted as suspicious)
//! ```
//!
//! Per-statistic records keep the worst `t` seen and the suspicious/fail
//! counts; [`Aggregator::final_rows`] reports them in battery order.

use serde::Serialize;

/// Default display threshold on `t`.
pub const DEFAULT_REPORT: f64 = 0.01;
/// Default suspicious threshold on `t`.
pub const DEFAULT_SUSPECT: f64 = 0.001;
/// Default failure threshold on `t`: 2^-40.
pub const DEFAULT_FAIL: f64 = 1.0 / (1u64 << 40) as f64;

/// Two-sided tail of a p-value. Values outside `[0, 1]` are clamped and NaN
/// maps to 0 (the worst possible result).
#[inline]
pub fn tail(p: f64) -> f64 {
    if p.is_nan() {
        return 0.0;
    }
    let p = p.clamp(0.0, 1.0);
    p.min(1.0 - p)
}

/// Classification thresholds, all on `t`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Thresholds {
    pub report: f64,
    pub suspect: f64,
    pub fail: f64,
    /// Hide rows that don't improve on the statistic's worst `t` so far.
    pub trim: bool,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            report: DEFAULT_REPORT,
            suspect: DEFAULT_SUSPECT,
            fail: DEFAULT_FAIL,
            trim: true,
        }
    }
}

/// How a single p-value was judged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Unremarkable,
    Noted,
    Suspicious,
    Failed,
}

impl Thresholds {
    pub fn classify(&self, p: f64) -> Verdict {
        let t = tail(p);
        if t >= self.report {
            Verdict::Unremarkable
        } else if t <= self.fail {
            Verdict::Failed
        } else if t <= self.suspect {
            Verdict::Suspicious
        } else {
            Verdict::Noted
        }
    }
}

/// One statistic's result from one battery run.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub id: usize,
    pub name: String,
    pub p_value: f64,
}

/// Running per-statistic summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatisticRecord {
    pub name: String,
    pub warn_count: u32,
    pub fail_count: u32,
    /// Smallest `t` seen, starts at 1.
    pub worst_t: f64,
}

impl Default for StatisticRecord {
    fn default() -> Self {
        Self {
            name: String::new(),
            warn_count: 0,
            fail_count: 0,
            worst_t: 1.0,
        }
    }
}

/// Totals across all trials. Only ever incremented.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TrialCounters {
    pub statistic_count: u64,
    pub suspicious_count: u64,
    pub failure_count: u64,
}

/// A row for the live per-trial listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayRow {
    pub trial: u32,
    pub id: usize,
    pub name: String,
    pub p_value: f64,
    pub verdict: Verdict,
}

/// A row of the end-of-run totals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinalRow {
    pub id: usize,
    pub name: String,
    pub warn_count: u32,
    pub fail_count: u32,
    pub worst_t: f64,
}

/// Serializable end-of-run report.
#[derive(Debug, Clone, Serialize)]
pub struct FinalReport {
    pub trials: u32,
    pub thresholds: Thresholds,
    pub counters: TrialCounters,
    pub passed: bool,
    pub statistics: Vec<FinalRow>,
}

/// Accumulates trial results. Trials are fed strictly one after another.
#[derive(Debug, Clone, Default)]
pub struct Aggregator {
    thresholds: Thresholds,
    records: Vec<StatisticRecord>,
    counters: TrialCounters,
    trials: u32,
}

impl Aggregator {
    pub fn new(thresholds: Thresholds) -> Self {
        Self {
            thresholds,
            ..Self::default()
        }
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    /// Fold one trial in and return the rows to show for it.
    ///
    /// `evaluated` is how many statistics the battery ran this trial; it is
    /// added to `statistic_count` whether or not they were interesting.
    pub fn record_trial(
        &mut self,
        trial: u32,
        observations: &[Observation],
        evaluated: usize,
    ) -> Vec<DisplayRow> {
        self.trials += 1;
        self.counters.statistic_count += evaluated as u64;

        let mut rows = Vec::new();
        for obs in observations {
            if obs.p_value.is_nan() {
                log::warn!("statistic {} ({}) returned NaN", obs.id, obs.name);
            }
            let t = tail(obs.p_value);
            if t >= self.thresholds.report {
                continue;
            }

            let trim = self.thresholds.trim;
            let verdict = self.thresholds.classify(obs.p_value);
            let record = self.record_mut(obs.id, &obs.name);

            let mut show = true;
            if t < record.worst_t {
                record.worst_t = t;
            } else if trim {
                show = false;
            }

            match verdict {
                Verdict::Failed => {
                    record.fail_count += 1;
                    self.counters.failure_count += 1;
                }
                Verdict::Suspicious => {
                    record.warn_count += 1;
                    self.counters.suspicious_count += 1;
                }
                Verdict::Noted | Verdict::Unremarkable => {}
            }

            if show {
                rows.push(DisplayRow {
                    trial,
                    id: obs.id,
                    name: obs.name.clone(),
                    p_value: obs.p_value,
                    verdict,
                });
            }
        }
        log::debug!(
            "trial {trial}: {} of {evaluated} statistics below report threshold",
            rows.len()
        );
        rows
    }

    fn record_mut(&mut self, id: usize, name: &str) -> &mut StatisticRecord {
        if id >= self.records.len() {
            self.records.resize_with(id + 1, StatisticRecord::default);
        }
        let record = &mut self.records[id];
        if record.name.is_empty() {
            record.name = name.to_string();
        }
        record
    }

    pub fn record(&self, id: usize) -> Option<&StatisticRecord> {
        self.records.get(id)
    }

    pub fn counters(&self) -> TrialCounters {
        self.counters
    }

    pub fn trials(&self) -> u32 {
        self.trials
    }

    /// Nothing suspicious and nothing failed.
    pub fn passed_all(&self) -> bool {
        self.counters.suspicious_count + self.counters.failure_count == 0
    }

    /// Statistics with at least one suspicious or failed result, in id order.
    pub fn final_rows(&self) -> Vec<FinalRow> {
        self.records
            .iter()
            .enumerate()
            .filter(|(_, r)| r.warn_count + r.fail_count > 0)
            .map(|(id, r)| FinalRow {
                id,
                name: r.name.clone(),
                warn_count: r.warn_count,
                fail_count: r.fail_count,
                worst_t: r.worst_t,
            })
            .collect()
    }

    pub fn final_report(&self) -> FinalReport {
        FinalReport {
            trials: self.trials,
            thresholds: self.thresholds,
            counters: self.counters,
            passed: self.passed_all(),
            statistics: self.final_rows(),
        }
    }
}
