//! `bitmix test`: run the battery over a live finalizer or a data file and
//! aggregate the results across trials.

use std::path::Path;

use bitmix_core::refine::{DEFAULT_REFINE_BAND, DEFAULT_REFINE_LIMIT};
use bitmix_core::{
    Aggregator, BitFinalizer, BitmixError, DisplayRow, FinalReport, Observation, Refinement,
    Result, Sampler, Thresholds, random_counter, tail, testable_bits,
};
use bitmix_tests::{BatteryKind, DEFAULT_BITS, MIN_BITS, Outcome, UniformStream};
use serde::Serialize;

use crate::SourceArgs;
use crate::table::{Align, Cell, Table, Tone};

const DEFAULT_TRIALS: u64 = 20;
const MIN_BLOCKS: u64 = MIN_BITS / 64;

pub struct TestCommandConfig<'a> {
    pub file: Option<&'a str>,
    pub battery: &'a str,
    pub blocks: Option<&'a str>,
    pub trials: Option<&'a str>,
    pub pshow: Option<&'a str>,
    pub psus: Option<&'a str>,
    pub pfail: Option<&'a str>,
    pub trim: bool,
    pub sample: &'a str,
    pub ascii: bool,
    pub refine_limit: Option<&'a str>,
    pub output_path: Option<&'a str>,
    pub source: &'a SourceArgs,
}

/// Live samples for the battery, one finalized word per draw.
struct LiveStream(Sampler);

impl UniformStream for LiveStream {
    fn next_u32(&mut self) -> u32 {
        self.0.next_u32()
    }

    fn next_f64(&mut self) -> f64 {
        self.0.next_f64()
    }
}

/// What the battery runs over.
enum Input {
    File { data: Vec<u8> },
    Live { stream: LiveStream, limit: u32 },
}

/// Everything a finished run prints or serializes.
#[derive(Serialize)]
struct RunReport {
    battery: String,
    /// `(label, value)` pairs in print order.
    header: Vec<(String, String)>,
    #[serde(skip)]
    rows: Vec<DisplayRow>,
    report: FinalReport,
}

/// Battery size in bits from `--blocks`. Fewer than 8 blocks is ignored.
fn battery_bits(blocks: Option<&str>) -> u64 {
    match blocks.map(|b| super::number_or("blocks", Some(b), 0)) {
        None => DEFAULT_BITS,
        Some(n) if n < MIN_BLOCKS => {
            log::warn!("blocks={n} ignored. >= {MIN_BLOCKS} required");
            DEFAULT_BITS
        }
        Some(n) => n.saturating_mul(64),
    }
}

fn trial_count(trials: Option<&str>) -> u64 {
    match super::number_or("trials", trials, DEFAULT_TRIALS) {
        0 => {
            log::warn!("trials=0 ignored");
            DEFAULT_TRIALS
        }
        n => n,
    }
}

fn thresholds(cfg: &TestCommandConfig<'_>) -> Thresholds {
    let defaults = Thresholds::default();
    Thresholds {
        report: super::float_or("pshow", cfg.pshow, defaults.report),
        suspect: super::float_or("psus", cfg.psus, defaults.suspect),
        fail: super::float_or("pfail", cfg.pfail, defaults.fail),
        trim: cfg.trim,
    }
}

/// Smallest `t` across one pass, the figure refinement decides on.
fn summary_p(outcomes: &[Outcome]) -> f64 {
    outcomes
        .iter()
        .map(|o| tail(o.result.p_value))
        .fold(0.5, f64::min)
}

fn observations(outcomes: &[Outcome]) -> Vec<Observation> {
    outcomes
        .iter()
        .map(|o| Observation {
            id: o.id,
            name: o.result.name.clone(),
            p_value: o.result.p_value,
        })
        .collect()
}

fn execute(cfg: &TestCommandConfig<'_>) -> Result<RunReport> {
    let kind = super::parse_battery(cfg.battery);
    let thresholds = thresholds(cfg);
    let mut header = vec![("battery".to_string(), kind.to_string())];

    let (mut input, bits, trials) = match cfg.file {
        Some(file) => {
            let path = Path::new(file);
            let bits = testable_bits(path)?;
            let data = std::fs::read(path).map_err(|source| BitmixError::Open {
                path: path.to_path_buf(),
                source,
            })?;
            if cfg.trials.is_some() {
                log::warn!("--trials ignored for file input");
            }
            header.push(("file".into(), format!("{file} : {bits} bits")));
            (Input::File { data }, bits, 1)
        }
        None => {
            let finalizer = super::select_finalizer(cfg.source.hash.as_deref());
            let sequence = super::build_sequence(cfg.source, random_counter());
            let view = super::parse_view(cfg.sample);
            let limit = super::number_or(
                "refine-limit",
                cfg.refine_limit,
                DEFAULT_REFINE_LIMIT as u64,
            )
            .min(u32::MAX as u64) as u32;

            header.push(("source".into(), finalizer.name().to_string()));
            if let Some(def) = finalizer.params() {
                header.push(("params".into(), super::list::param_line(def)));
            }
            header.push((
                "sequence".into(),
                format!("{} ({} entropy)", sequence.kind, sequence.kind.entropy_label()),
            ));
            header.push(("counter".into(), format!("0x{:016x}", sequence.state.counter)));
            header.push(("inc".into(), format!("0x{:016x}", sequence.state.increment)));
            header.push(("sample".into(), view.to_string()));

            let stream = LiveStream(Sampler::new(finalizer, sequence, view));
            let trials = trial_count(cfg.trials);
            header.push(("trials".into(), trials.to_string()));
            (Input::Live { stream, limit }, battery_bits(cfg.blocks), trials)
        }
    };

    let mut aggregator = Aggregator::new(thresholds);
    let mut rows = Vec::new();
    for trial in 0..trials {
        let trial = trial.min(u32::MAX as u64) as u32;
        let outcomes = match &mut input {
            Input::File { data } => bitmix_tests::run_bytes(kind, data),
            Input::Live { stream, limit } => {
                let mut refinement = Refinement::new(bits, *limit)
                    .with_thresholds(thresholds.suspect, DEFAULT_REFINE_BAND);
                loop {
                    let outcomes = bitmix_tests::run_stream(kind, stream, refinement.size());
                    refinement.observe(summary_p(&outcomes));
                    if refinement.is_done() {
                        break outcomes;
                    }
                }
            }
        };
        log::debug!(
            "trial {trial}: {} of {} statistics evaluated",
            outcomes.len(),
            kind.statistics().len()
        );
        rows.extend(aggregator.record_trial(trial, &observations(&outcomes), outcomes.len()));
    }

    Ok(RunReport {
        battery: kind.to_string(),
        header,
        rows,
        report: aggregator.final_report(),
    })
}

fn render(run: &RunReport, ascii: bool) -> String {
    let mut out = String::new();
    for (label, value) in &run.header {
        out.push_str(&format!("{:<10}{value}\n", format!("{label}:")));
    }
    out.push('\n');

    let report = &run.report;
    if !run.rows.is_empty() {
        if report.trials > 1 {
            out.push_str("TRIALS:\n");
        }
        let mut table = Table::new(&[
            ("trial", Align::Right),
            ("id", Align::Right),
            ("statistic", Align::Left),
            ("p-value", Align::Right),
        ]);
        for row in &run.rows {
            table.push(vec![
                Cell::new(row.trial.to_string()),
                Cell::new(row.id.to_string()),
                Cell::new(row.name.clone()),
                Cell::toned(format!("{:12.10}", row.p_value), Tone::from(row.verdict)),
            ]);
        }
        out.push_str(&table.render(ascii));
        out.push('\n');
    }

    let counters = report.counters;
    if report.passed {
        out.push_str(&format!(
            "result:  passed all {} statistics\n",
            counters.statistic_count
        ));
        return out;
    }

    out.push_str(&format!("statistics: {}\n", counters.statistic_count));
    out.push_str(&format!("suspicious: {}\n", counters.suspicious_count));
    out.push_str(&format!("failed:     {}\n", counters.failure_count));

    if report.trials > 1 {
        out.push_str("\nTOTALS:\n");
        let mut totals = Table::new(&[
            ("id", Align::Right),
            ("statistic", Align::Left),
            ("suspicious", Align::Right),
            ("fail", Align::Right),
            ("worst t", Align::Right),
        ]);
        for row in &report.statistics {
            let tone = if row.fail_count > 0 {
                Tone::Fail
            } else {
                Tone::Warn
            };
            totals.push(vec![
                Cell::new(row.id.to_string()),
                Cell::new(row.name.clone()),
                Cell::new(row.warn_count.to_string()),
                Cell::new(row.fail_count.to_string()),
                Cell::toned(format!("{:e}", row.worst_t), tone),
            ]);
        }
        out.push_str(&totals.render(ascii));
    }
    out
}

pub fn run(cfg: TestCommandConfig<'_>) -> Result<()> {
    let report = execute(&cfg)?;
    print!("{}", render(&report, cfg.ascii));

    if let Some(path) = cfg.output_path {
        let json = serde_json::to_string_pretty(&report)
            .map_err(|e| BitmixError::Io(std::io::Error::other(e)))?;
        std::fs::write(path, json)?;
        println!("\nResults written to {path}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitmix_core::{
        Construction, FillStrategy, Sequence, SequenceKind, SequenceState, WordBuffer, write_file,
    };

    fn config<'a>(file: Option<&'a str>, source: &'a SourceArgs) -> TestCommandConfig<'a> {
        TestCommandConfig {
            file,
            battery: "bits",
            blocks: None,
            trials: None,
            pshow: None,
            psus: None,
            pfail: None,
            trim: true,
            sample: "lo",
            ascii: true,
            refine_limit: None,
            output_path: None,
            source,
        }
    }

    fn mix13_pcg() -> SourceArgs {
        SourceArgs {
            hash: Some("mix13".into()),
            sequence: "pcg".into(),
            counter: Some("0x2545f4914f6cdd1d".into()),
            ..SourceArgs::default()
        }
    }

    fn write_mix13_file(path: &Path, kib: u64) {
        let finalizer = bitmix_core::resolve("mix13").unwrap();
        let mut seq = Sequence::new(SequenceKind::Pcg, SequenceState::new(99, 1).0);
        let mut buf = WordBuffer::default();
        let mut job = Construction::new(FillStrategy::Seq, &finalizer, &mut seq);
        write_file(path, &mut buf, &mut job, kib).unwrap();
    }

    // -----------------------------------------------------------------------
    // option handling
    // -----------------------------------------------------------------------

    #[test]
    fn blocks_below_minimum_are_ignored() {
        assert_eq!(battery_bits(None), DEFAULT_BITS);
        assert_eq!(battery_bits(Some("7")), DEFAULT_BITS);
        assert_eq!(battery_bits(Some("8")), 512);
        assert_eq!(battery_bits(Some("1000")), 64_000);
    }

    #[test]
    fn zero_trials_are_ignored() {
        assert_eq!(trial_count(None), DEFAULT_TRIALS);
        assert_eq!(trial_count(Some("0")), DEFAULT_TRIALS);
        assert_eq!(trial_count(Some("3")), 3);
    }

    #[test]
    fn summary_is_smallest_tail() {
        let outcome = |id, p| Outcome {
            id,
            result: bitmix_tests::TestResult {
                name: format!("s{id}"),
                p_value: p,
                statistic: 0.0,
                details: String::new(),
            },
        };
        let outcomes = vec![outcome(0, 0.4), outcome(1, 0.999), outcome(2, 0.2)];
        assert!((summary_p(&outcomes) - 0.001).abs() < 1e-12);
        assert_eq!(summary_p(&[]), 0.5);
    }

    // -----------------------------------------------------------------------
    // file runs
    // -----------------------------------------------------------------------

    #[test]
    fn file_run_is_a_single_trial() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("mix13.bin");
        write_mix13_file(&path, 8);
        let source = SourceArgs::default();
        let cfg = TestCommandConfig {
            trials: Some("5"),
            ..config(path.to_str(), &source)
        };

        let run = execute(&cfg).unwrap();
        assert_eq!(run.report.trials, 1);
        assert!(run.report.counters.statistic_count > 0);
        assert!(run.report.counters.statistic_count <= 10);
        assert!(run.header.iter().any(|(k, v)| k == "file" && v.ends_with(": 65536 bits")));
    }

    #[test]
    fn constant_file_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("zeros.bin");
        std::fs::write(&path, vec![0u8; 4096]).unwrap();
        let source = SourceArgs::default();

        let run = execute(&config(path.to_str(), &source)).unwrap();
        assert!(!run.report.passed);
        assert!(run.report.counters.failure_count > 0);

        let text = render(&run, true);
        assert!(text.contains("failed:"));
        assert!(!text.contains("TOTALS:"));
    }

    #[test]
    fn tiny_file_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("tiny.bin");
        std::fs::write(&path, [0u8; 16]).unwrap();
        let source = SourceArgs::default();
        assert!(matches!(
            execute(&config(path.to_str(), &source)),
            Err(BitmixError::FileTooSmall { bits: 128, .. })
        ));
    }

    #[test]
    fn missing_file_is_rejected() {
        let source = SourceArgs::default();
        assert!(matches!(
            execute(&config(Some("/nonexistent/bitmix.bin"), &source)),
            Err(BitmixError::Open { .. })
        ));
    }

    // -----------------------------------------------------------------------
    // live runs
    // -----------------------------------------------------------------------

    #[test]
    fn live_run_counts_trials() {
        let source = mix13_pcg();
        let cfg = TestCommandConfig {
            trials: Some("2"),
            ..config(None, &source)
        };
        let run = execute(&cfg).unwrap();
        assert_eq!(run.report.trials, 2);
        assert!(run.report.counters.statistic_count > 0);
        assert!(run.header.iter().any(|(k, v)| k == "source" && v == "mix13"));
        assert!(run.header.iter().any(|(k, v)| k == "counter" && v == "0x2545f4914f6cdd1d"));
        assert!(run.header.iter().any(|(k, v)| {
            k == "params" && v == "30 0xbf58476d1ce4e5b9 27 0x94d049bb133111eb 31"
        }));
    }

    #[test]
    fn live_run_is_reproducible_with_fixed_counter() {
        let source = mix13_pcg();
        let cfg = TestCommandConfig {
            trials: Some("1"),
            trim: false,
            pshow: Some("0.5"),
            ..config(None, &source)
        };
        let a = execute(&cfg).unwrap();
        let b = execute(&cfg).unwrap();
        assert_eq!(a.rows, b.rows);
    }

    #[test]
    fn json_report_is_written() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("report.json");
        let source = mix13_pcg();
        let cfg = TestCommandConfig {
            trials: Some("1"),
            output_path: out.to_str(),
            ..config(None, &source)
        };
        run(cfg).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(json["battery"], "bits");
        assert_eq!(json["report"]["trials"], 1);
        assert!(json["report"]["counters"]["statistic_count"].as_u64().unwrap() > 0);
    }

    // -----------------------------------------------------------------------
    // rendering
    // -----------------------------------------------------------------------

    #[test]
    fn passing_run_prints_result_line() {
        let run = RunReport {
            battery: "bits".into(),
            header: vec![("battery".into(), "bits".into())],
            rows: Vec::new(),
            report: Aggregator::new(Thresholds::default()).final_report(),
        };
        let text = render(&run, true);
        assert!(text.starts_with("battery:  bits\n"));
        assert!(text.contains("result:  passed all 0 statistics"));
    }

    #[test]
    fn multi_trial_failures_print_totals() {
        let mut agg = Aggregator::new(Thresholds::default());
        let obs = |p| {
            vec![Observation {
                id: 0,
                name: "Monobit".into(),
                p_value: p,
            }]
        };
        let mut rows = agg.record_trial(0, &obs(0.0), 1);
        rows.extend(agg.record_trial(1, &obs(0.0005), 1));
        let run = RunReport {
            battery: "bits".into(),
            header: Vec::new(),
            rows,
            report: agg.final_report(),
        };

        let text = render(&run, true);
        assert!(text.contains("TRIALS:"));
        assert!(text.contains("TOTALS:"));
        assert!(text.contains("suspicious: 1"));
        assert!(text.contains("failed:     1"));
        assert!(text.contains("0.0000000000"));
    }
}
