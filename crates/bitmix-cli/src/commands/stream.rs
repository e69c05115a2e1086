use std::io::{BufWriter, ErrorKind, Write};

use bitmix_core::{Advisory, BLOCK_WORDS, BitFinalizer, Construction, Result, WordBuffer};

use crate::SourceArgs;

/// What one stream run produced.
#[derive(Debug, Default)]
struct Streamed {
    written: u64,
    advisories: Vec<Advisory>,
}

pub fn run(bytes: Option<&str>, fill: &str, source: &SourceArgs) -> Result<()> {
    let total = super::number_or("bytes", bytes, 0);
    let stdout = std::io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let streamed = emit(&mut out, total, fill, source)?;
    log::debug!(
        "streamed {} bytes, {} advisories",
        streamed.written,
        streamed.advisories.len()
    );
    Ok(())
}

/// Write generated data to `out` until `total` bytes (0 = forever) or the
/// reader goes away. Other write errors are returned.
fn emit<W: Write>(out: &mut W, total: u64, fill: &str, source: &SourceArgs) -> Result<Streamed> {
    let finalizer = super::select_finalizer(source.hash.as_deref());
    let mut sequence = super::build_sequence(source, 0);
    let mut buf = WordBuffer::default();
    let mut job = Construction::new(super::parse_fill(fill), &finalizer, &mut sequence);
    log::debug!("streaming {} data from {}", job.strategy, finalizer.name());

    let mut streamed = Streamed::default();
    let blocks = match total {
        0 => u64::MAX,
        n => n.div_ceil(BLOCK_WORDS as u64 * 8),
    };
    streamed.advisories.extend(job.policy_advisory(blocks));

    loop {
        if total > 0 && streamed.written >= total {
            break;
        }
        let want = if total == 0 {
            buf.byte_len() as u64
        } else {
            (total - streamed.written).min(buf.byte_len() as u64)
        };

        streamed.advisories.extend(job.fill(&mut buf));
        let bytes = buf.to_le_bytes();
        match out
            .write_all(&bytes[..want as usize])
            .and_then(|()| out.flush())
        {
            Ok(()) => streamed.written += want,
            Err(e) if e.kind() == ErrorKind::BrokenPipe => break,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(streamed)
}
