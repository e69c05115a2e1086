pub mod list;
pub mod makedata;
pub mod show;
pub mod stream;
pub mod test;

use bitmix_core::{
    ActiveFinalizer, Advisory, FillStrategy, PHI, SampleView, Sequence, SequenceKind,
    SequenceState,
};
use bitmix_tests::BatteryKind;

use crate::SourceArgs;

/// Parse an unsigned integer the way C `strtoul(s, _, 0)` does: `0x`/`0X`
/// prefix for hex, a leading `0` for octal, decimal otherwise. The whole
/// string must be consumed.
pub fn parse_u64(s: &str) -> Option<u64> {
    let s = s.trim();
    let s = s.strip_prefix('+').unwrap_or(s);
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).ok()
    } else if s.len() > 1 && s.starts_with('0') {
        u64::from_str_radix(&s[1..], 8).ok()
    } else {
        s.parse().ok()
    }
}

/// Numeric option value, or `default` when absent. A malformed value is
/// reported and replaced by `default`.
pub fn number_or(option: &str, value: Option<&str>, default: u64) -> u64 {
    let Some(text) = value else {
        return default;
    };
    match parse_u64(text) {
        Some(v) => v,
        None => {
            Advisory::MalformedNumber {
                option: option.to_string(),
                value: text.to_string(),
            }
            .logged();
            default
        }
    }
}

/// Floating-point option value, or `default` when absent or malformed.
pub fn float_or(option: &str, value: Option<&str>, default: f64) -> f64 {
    let Some(text) = value else {
        return default;
    };
    match text.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => v,
        _ => {
            Advisory::MalformedNumber {
                option: option.to_string(),
                value: text.to_string(),
            }
            .logged();
            default
        }
    }
}

/// Parse a base sequence name into the enum.
pub fn parse_sequence(s: &str) -> SequenceKind {
    match s {
        "weyl" | "lds" => SequenceKind::Weyl,
        "lcg" => SequenceKind::Lcg,
        "pcg" => SequenceKind::Pcg,
        _ => {
            log::warn!("unknown sequence '{s}', using weyl");
            SequenceKind::Weyl
        }
    }
}

/// Parse a fill strategy name into the enum.
pub fn parse_fill(s: &str) -> FillStrategy {
    match s {
        "sac" => FillStrategy::Sac,
        "seq" => FillStrategy::Seq,
        _ => {
            log::warn!("unknown fill '{s}', using sac");
            FillStrategy::Sac
        }
    }
}

/// Parse a sample view name into the enum.
pub fn parse_view(s: &str) -> SampleView {
    match s {
        "lo" | "low" => SampleView::Low,
        "hi" | "high" => SampleView::High,
        "reversed" => SampleView::Reversed,
        _ => {
            log::warn!("unknown sample view '{s}', using lo");
            SampleView::Low
        }
    }
}

/// Parse a battery name into the enum.
pub fn parse_battery(s: &str) -> BatteryKind {
    match s {
        "bits" => BatteryKind::Bits,
        "full" => BatteryKind::Full,
        _ => {
            log::warn!("unknown battery '{s}', using bits");
            BatteryKind::Bits
        }
    }
}

/// The finalizer named by `--hash`, or the default when absent.
/// An unknown name leaves the default in place.
pub fn select_finalizer(name: Option<&str>) -> ActiveFinalizer {
    let mut active = ActiveFinalizer::default();
    if let Some(name) = name {
        active.select(name);
    }
    active
}

/// Build the base sequence from the shared source options.
///
/// `default_counter` is used when `--counter` is absent or malformed.
pub fn build_sequence(args: &SourceArgs, default_counter: u64) -> Sequence {
    let counter = number_or("counter", args.counter.as_deref(), default_counter);
    let increment = if args.phi {
        PHI
    } else {
        number_or("increment", args.increment.as_deref(), 1)
    };
    let (state, _) = SequenceState::new(counter, increment);
    Sequence::new(parse_sequence(&args.sequence), state)
}
