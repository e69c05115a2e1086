use std::path::Path;

use bitmix_core::{
    BitFinalizer, Construction, Result, SizeUnit, WordBuffer, sink::buffers_for_bytes, write_file,
};

use crate::SourceArgs;

pub struct MakedataCommandConfig<'a> {
    pub path: &'a str,
    pub kb: Option<&'a str>,
    pub mb: Option<&'a str>,
    pub gb: Option<&'a str>,
    pub fill: &'a str,
    pub source: &'a SourceArgs,
}

/// Requested size in bytes, or `None` for the default single buffer.
fn requested_bytes(cfg: &MakedataCommandConfig<'_>) -> Option<u64> {
    let (option, value, unit) = if let Some(v) = cfg.gb {
        ("gb", v, SizeUnit::Gib)
    } else if let Some(v) = cfg.mb {
        ("mb", v, SizeUnit::Mib)
    } else if let Some(v) = cfg.kb {
        ("kb", v, SizeUnit::Kib)
    } else {
        return None;
    };
    match super::number_or(option, Some(value), 0) {
        0 => None,
        n => Some(unit.bytes(n)),
    }
}

pub fn run(cfg: MakedataCommandConfig<'_>) -> Result<()> {
    let finalizer = super::select_finalizer(cfg.source.hash.as_deref());
    let mut sequence = super::build_sequence(cfg.source, 0);
    let strategy = super::parse_fill(cfg.fill);

    let mut buf = WordBuffer::default();
    let count = requested_bytes(&cfg)
        .map(|bytes| buffers_for_bytes(bytes, buf.byte_len()))
        .unwrap_or(1);

    let mut job = Construction::new(strategy, &finalizer, &mut sequence);
    let written = write_file(Path::new(cfg.path), &mut buf, &mut job, count)?;
    let fixed = job.fixed_bits();

    println!(
        "wrote {written} bytes of {strategy} data to {} (hash: {}, sequence: {}, inc: 0x{:016x})",
        cfg.path,
        finalizer.name(),
        sequence.kind,
        sequence.state.increment,
    );
    if !fixed.is_empty() {
        println!("fixed-point input bits: {fixed:?}");
    }
    Ok(())
}
