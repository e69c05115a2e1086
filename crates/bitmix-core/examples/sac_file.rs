//! Write SAC data for one finalizer to a file.
//!
//! Builds 64 KiB of strict-avalanche rows for `mix13` over a PCG base
//! sequence and writes them as little-endian words.
//!
//! Run: `cargo run --example sac_file`

use std::path::Path;

use bitmix_core::{
    Construction, FillStrategy, Sequence, SequenceKind, SequenceState, SizeUnit, WordBuffer,
    random_counter, resolve, sink::buffers_for_bytes, write_file,
};

fn main() -> bitmix_core::Result<()> {
    let output_path = Path::new("mix13_sac.bin");
    let finalizer = resolve("mix13").expect("mix13 is in the catalog");

    let (state, _) = SequenceState::new(random_counter(), 1);
    let mut sequence = Sequence::new(SequenceKind::Pcg, state);
    let mut buf = WordBuffer::default();
    let count = buffers_for_bytes(SizeUnit::Kib.bytes(64), buf.byte_len());

    println!(
        "Writing {count} buffers of {} bytes to {}",
        buf.byte_len(),
        output_path.display()
    );

    let mut job = Construction::new(FillStrategy::Sac, &finalizer, &mut sequence);
    let written = write_file(output_path, &mut buf, &mut job, count)?;

    println!("Done. Wrote {written} bytes");
    Ok(())
}
