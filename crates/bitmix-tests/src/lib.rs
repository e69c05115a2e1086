//! Bit-level statistical battery for finalizer output.
//!
//! Two batteries run over a [`UniformStream`] (live generation) or a byte
//! slice (file mode):
//!
//! - [`BatteryKind::Bits`]: ten NIST SP 800-22 style bit tests.
//! - [`BatteryKind::Full`]: the same ten, then byte/word-level tests and two
//!   floating-point statistics drawn with [`UniformStream::next_f64`].
//!
//! Every statistic reports a p-value oriented so that both tails matter:
//! values near 0 and values near 1 are equally suspicious. A statistic that
//! can't be computed on the given input is left out of the run.

use flate2::Compression;
use flate2::write::ZlibEncoder;
use rustfft::{FftPlanner, num_complex::Complex};
use statrs::distribution::{ChiSquared, ContinuousCDF, Discrete, DiscreteCDF, Normal, Poisson};
use statrs::function::erf::erfc;
use std::f64::consts::SQRT_2;
use std::io::Write;

/// Default battery size in bits.
pub const DEFAULT_BITS: u64 = 32_000;
/// Smallest battery size accepted for live runs.
pub const MIN_BITS: u64 = 512;

// ═══════════════════════════════════════════════════════════════════════════════
// Core types
// ═══════════════════════════════════════════════════════════════════════════════

/// Source of uniform samples for a live battery run.
pub trait UniformStream {
    fn next_u32(&mut self) -> u32;
    /// Uniform on `[0, 1)`.
    fn next_f64(&mut self) -> f64;
}

impl<T: UniformStream + ?Sized> UniformStream for &mut T {
    fn next_u32(&mut self) -> u32 {
        (**self).next_u32()
    }

    fn next_f64(&mut self) -> f64 {
        (**self).next_f64()
    }
}

/// Result of a single statistic.
#[derive(Debug, Clone)]
pub struct TestResult {
    pub name: String,
    pub p_value: f64,
    pub statistic: f64,
    pub details: String,
}

/// A statistic's result tagged with its stable battery index.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub id: usize,
    pub result: TestResult,
}

/// Data one battery pass runs over.
#[derive(Debug, Clone, Default)]
pub struct Sample {
    /// Bit data, most significant bit of each byte first.
    pub bytes: Vec<u8>,
    /// Doubles for the floating-point statistics.
    pub floats: Vec<f64>,
}

impl Sample {
    /// Draw `bits` bits (rounded up to whole words) from `stream`, plus one
    /// double per 64 bits when `kind` needs them.
    pub fn from_stream<S>(kind: BatteryKind, stream: &mut S, bits: u64) -> Self
    where
        S: UniformStream + ?Sized,
    {
        let words = bits.div_ceil(32) as usize;
        let mut bytes = Vec::with_capacity(words * 4);
        for _ in 0..words {
            bytes.extend_from_slice(&stream.next_u32().to_be_bytes());
        }
        let floats = match kind {
            BatteryKind::Bits => Vec::new(),
            BatteryKind::Full => (0..bits / 64).map(|_| stream.next_f64()).collect(),
        };
        Self { bytes, floats }
    }

    /// Use `data` as is. Doubles come from its little-endian 64-bit words.
    pub fn from_bytes(kind: BatteryKind, data: &[u8]) -> Self {
        let floats = match kind {
            BatteryKind::Bits => Vec::new(),
            BatteryKind::Full => data
                .chunks_exact(8)
                .map(|c| {
                    let mut w = [0u8; 8];
                    w.copy_from_slice(c);
                    (u64::from_le_bytes(w) >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
                })
                .collect(),
        };
        Self {
            bytes: data.to_vec(),
            floats,
        }
    }

    /// Number of bits available to the bit tests.
    pub fn bits(&self) -> u64 {
        self.bytes.len() as u64 * 8
    }
}

type BitTest = fn(&[u8]) -> Option<TestResult>;
type FloatTest = fn(&[f64]) -> Option<TestResult>;

#[derive(Clone, Copy)]
enum Input {
    Bytes(BitTest),
    Floats(FloatTest),
}

/// A named entry in the battery.
pub struct Statistic {
    pub name: &'static str,
    input: Input,
}

impl Statistic {
    const fn bytes(name: &'static str, f: BitTest) -> Self {
        Self {
            name,
            input: Input::Bytes(f),
        }
    }

    const fn floats(name: &'static str, f: FloatTest) -> Self {
        Self {
            name,
            input: Input::Floats(f),
        }
    }

    pub fn run(&self, sample: &Sample) -> Option<TestResult> {
        match self.input {
            Input::Bytes(f) => f(&sample.bytes),
            Input::Floats(f) => f(&sample.floats),
        }
    }
}

impl std::fmt::Debug for Statistic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Statistic").field("name", &self.name).finish()
    }
}

/// Which battery to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BatteryKind {
    #[default]
    Bits,
    Full,
}

impl std::fmt::Display for BatteryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bits => write!(f, "bits"),
            Self::Full => write!(f, "full"),
        }
    }
}

impl BatteryKind {
    /// Statistics in id order. `Bits` is a prefix of `Full`, so ids agree.
    pub fn statistics(&self) -> &'static [Statistic] {
        match self {
            Self::Bits => &STATISTICS[..BITS_LEN],
            Self::Full => &STATISTICS[..],
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Helpers
// ═══════════════════════════════════════════════════════════════════════════════

/// Unpack a byte slice into individual bits (MSB first per byte).
fn to_bits(data: &[u8]) -> Vec<u8> {
    let mut bits = Vec::with_capacity(data.len() * 8);
    for &byte in data {
        for shift in (0..8).rev() {
            bits.push((byte >> shift) & 1);
        }
    }
    bits
}

/// Big-endian 32-bit words of `data`; a trailing partial word is dropped.
fn to_words(data: &[u8]) -> Vec<u32> {
    data.chunks_exact(4)
        .map(|c| u32::from_be_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

/// Upper tail of the standard normal.
fn normal_upper(z: f64) -> f64 {
    0.5 * erfc(z / SQRT_2)
}

fn chi2_sf(df: f64, x: f64) -> Option<f64> {
    ChiSquared::new(df).ok().map(|d| d.sf(x))
}

fn found(name: &str, p: f64, statistic: f64, details: String) -> Option<TestResult> {
    Some(TestResult {
        name: name.to_string(),
        p_value: p.clamp(0.0, 1.0),
        statistic,
        details,
    })
}

/// Chi-squared over observed bin counts against probabilities.
fn chi2_bins(observed: &[u64], probs: &[f64], total: f64) -> f64 {
    observed
        .iter()
        .zip(probs)
        .filter(|(_, p)| **p > 0.0)
        .map(|(&o, &p)| {
            let expected = p * total;
            let diff = o as f64 - expected;
            diff * diff / expected
        })
        .sum()
}

// ═══════════════════════════════════════════════════════════════════════════════
// 1. FREQUENCY TESTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Monobit frequency: signed excess of ones over zeros.
pub fn monobit_frequency(data: &[u8]) -> Option<TestResult> {
    let name = "Monobit";
    let n = data.len() as u64 * 8;
    if n < 100 {
        return None;
    }
    let ones: u64 = data.iter().map(|b| b.count_ones() as u64).sum();
    let s = 2 * ones as i64 - n as i64;
    let z = s as f64 / (n as f64).sqrt();
    found(name, normal_upper(z), z, format!("S={s}, n={n}"))
}

/// Block frequency: proportion of ones within 128-bit blocks.
pub fn block_frequency(data: &[u8]) -> Option<TestResult> {
    let name = "Block Frequency (M=128)";
    let block_size: usize = 128;
    let bits = to_bits(data);
    let num_blocks = bits.len() / block_size;
    if num_blocks < 10 {
        return None;
    }
    let mut chi2 = 0.0;
    for block in bits.chunks_exact(block_size) {
        let ones: usize = block.iter().map(|&b| b as usize).sum();
        let proportion = ones as f64 / block_size as f64;
        chi2 += (proportion - 0.5) * (proportion - 0.5);
    }
    chi2 *= 4.0 * block_size as f64;
    let p = chi2_sf(num_blocks as f64, chi2)?;
    found(name, p, chi2, format!("blocks={num_blocks}"))
}

/// Byte frequency: chi-squared over the 256 byte values.
pub fn byte_frequency(data: &[u8]) -> Option<TestResult> {
    let name = "Byte Frequency";
    let n = data.len();
    if n < 256 * 5 {
        return None;
    }
    let mut hist = [0u64; 256];
    for &b in data {
        hist[b as usize] += 1;
    }
    let expected = n as f64 / 256.0;
    let chi2: f64 = hist
        .iter()
        .map(|&c| {
            let diff = c as f64 - expected;
            diff * diff / expected
        })
        .sum();
    let p = chi2_sf(255.0, chi2)?;
    found(name, p, chi2, format!("n={n}, expected_per_bin={expected:.1}"))
}

// ═══════════════════════════════════════════════════════════════════════════════
// 2. RUNS TESTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Runs: number of uninterrupted runs of equal bits.
///
/// Skipped when the ones proportion is too far from 1/2 for the normal
/// approximation; monobit covers that case.
pub fn runs_test(data: &[u8]) -> Option<TestResult> {
    let name = "Runs";
    let bits = to_bits(data);
    let n = bits.len();
    if n < 100 {
        return None;
    }
    let ones: usize = bits.iter().map(|&b| b as usize).sum();
    let prop = ones as f64 / n as f64;
    if (prop - 0.5).abs() >= 2.0 / (n as f64).sqrt() {
        return None;
    }
    let runs = 1 + bits.windows(2).filter(|w| w[0] != w[1]).count();
    let pq = prop * (1.0 - prop);
    let expected = 2.0 * n as f64 * pq;
    let z = (runs as f64 - expected) / (2.0 * (n as f64).sqrt() * pq);
    found(name, normal_upper(z), z, format!("runs={runs}, expected={expected:.0}"))
}

/// Longest run of ones within 8-bit blocks.
pub fn longest_run_of_ones(data: &[u8]) -> Option<TestResult> {
    let name = "Longest Run (M=8)";
    let num_blocks = data.len();
    if num_blocks < 16 {
        return None;
    }

    // bins: <=1, 2, 3, >=4
    let mut observed = [0u64; 4];
    for &byte in data {
        let bin = match longest_ones(byte) {
            0 | 1 => 0,
            2 => 1,
            3 => 2,
            _ => 3,
        };
        observed[bin] += 1;
    }

    let probs = [0.2148, 0.3672, 0.2305, 0.1875];
    let chi2 = chi2_bins(&observed, &probs, num_blocks as f64);
    let p = chi2_sf(3.0, chi2)?;
    found(name, p, chi2, format!("blocks={num_blocks}, bins={observed:?}"))
}

/// Length of the longest run of ones in `byte`.
fn longest_ones(byte: u8) -> u32 {
    let mut best = 0;
    let mut run = 0;
    for shift in (0..8).rev() {
        if (byte >> shift) & 1 == 1 {
            run += 1;
            best = best.max(run);
        } else {
            run = 0;
        }
    }
    best
}

// ═══════════════════════════════════════════════════════════════════════════════
// 3. SERIAL TESTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Counts of every overlapping (cyclic) `m`-bit pattern.
fn pattern_counts(bits: &[u8], m: usize) -> Vec<u64> {
    let n = bits.len();
    let mut counts = vec![0u64; 1 << m];
    for i in 0..n {
        let mut val = 0usize;
        for j in 0..m {
            val = (val << 1) | bits[(i + j) % n] as usize;
        }
        counts[val] += 1;
    }
    counts
}

fn psi_sq(bits: &[u8], m: usize) -> f64 {
    if m == 0 {
        return 0.0;
    }
    let n = bits.len() as f64;
    let counts = pattern_counts(bits, m);
    let sum_sq: f64 = counts.iter().map(|&c| (c as f64) * (c as f64)).sum();
    sum_sq * (counts.len() as f64) / n - n
}

/// Serial: overlapping 4-bit pattern frequencies.
pub fn serial_test(data: &[u8]) -> Option<TestResult> {
    let name = "Serial (m=4)";
    let m = 4usize;
    let bits = to_bits(data);
    let n = bits.len();
    if n < 256 {
        return None;
    }
    let delta = psi_sq(&bits, m) - psi_sq(&bits, m - 1);
    let p = chi2_sf((1u64 << (m - 1)) as f64, delta)?;
    found(name, p, delta, format!("n_bits={n}"))
}

/// Approximate entropy: 3-bit against 4-bit pattern frequencies.
pub fn approximate_entropy(data: &[u8]) -> Option<TestResult> {
    let name = "Approximate Entropy (m=3)";
    let m = 3usize;
    let bits = to_bits(data);
    let n = bits.len();
    if n < 256 {
        return None;
    }

    let phi = |block_len: usize| -> f64 {
        pattern_counts(&bits, block_len)
            .iter()
            .filter(|&&c| c > 0)
            .map(|&c| {
                let p = c as f64 / n as f64;
                p * p.ln()
            })
            .sum()
    };

    let apen = phi(m) - phi(m + 1);
    let chi2 = 2.0 * n as f64 * (std::f64::consts::LN_2 - apen);
    let p = chi2_sf((1u64 << m) as f64, chi2)?;
    found(name, p, chi2, format!("ApEn={apen:.6}"))
}

// ═══════════════════════════════════════════════════════════════════════════════
// 4. SPECTRAL TESTS
// ═══════════════════════════════════════════════════════════════════════════════

/// DFT spectral: excess of peaks above the 95% threshold.
pub fn dft_spectral(data: &[u8]) -> Option<TestResult> {
    let name = "DFT Spectral";
    let bits = to_bits(data);
    let n = bits.len();
    if n < 1000 {
        return None;
    }

    let mut buffer: Vec<Complex<f64>> = bits
        .iter()
        .map(|&b| Complex {
            re: if b == 1 { 1.0 } else { -1.0 },
            im: 0.0,
        })
        .collect();

    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(n);
    fft.process(&mut buffer);

    let half = n / 2;
    let threshold = (2.995732274 * n as f64).sqrt();
    let n0 = 0.95 * half as f64;
    let n1 = buffer[..half].iter().filter(|c| c.norm() < threshold).count() as f64;
    let z = (n0 - n1) / (n as f64 * 0.95 * 0.05 / 4.0).sqrt();
    found(
        name,
        normal_upper(z),
        z,
        format!("below_threshold={}/{half}", n1 as u64),
    )
}

// ═══════════════════════════════════════════════════════════════════════════════
// 5. CORRELATION TESTS
// ═══════════════════════════════════════════════════════════════════════════════

const AUTOCORRELATION_LAGS: [usize; 3] = [1, 8, 32];

/// Bit autocorrelation at lags 1, 8 and 32, combined as a chi-squared.
pub fn autocorrelation(data: &[u8]) -> Option<TestResult> {
    let name = "Autocorrelation (d=1,8,32)";
    let bits = to_bits(data);
    let n = bits.len();
    if n < 1000 {
        return None;
    }
    let mut chi2 = 0.0;
    let mut parts = Vec::with_capacity(AUTOCORRELATION_LAGS.len());
    for &d in &AUTOCORRELATION_LAGS {
        let count = n - d;
        let diffs: usize = (0..count).map(|i| (bits[i] ^ bits[i + d]) as usize).sum();
        let z = (2.0 * diffs as f64 - count as f64) / (count as f64).sqrt();
        chi2 += z * z;
        parts.push(format!("z{d}={z:.3}"));
    }
    let p = chi2_sf(AUTOCORRELATION_LAGS.len() as f64, chi2)?;
    found(name, p, chi2, parts.join(", "))
}

/// Bit avalanche between adjacent 32-bit words: `popcount(w[i] ^ w[i+1])`
/// should average 16.
pub fn word_avalanche(data: &[u8]) -> Option<TestResult> {
    let name = "Adjacent Word Avalanche (32-bit)";
    let words = to_words(data);
    if words.len() < 100 {
        return None;
    }
    let pairs = words.len() - 1;
    let total: u64 = words
        .windows(2)
        .map(|w| (w[0] ^ w[1]).count_ones() as u64)
        .sum();
    let expected = 16.0 * pairs as f64;
    let z = (total as f64 - expected) / (8.0 * pairs as f64).sqrt();
    let mean = total as f64 / pairs as f64;
    found(name, normal_upper(z), z, format!("mean_diff={mean:.3}/32 bits"))
}

// ═══════════════════════════════════════════════════════════════════════════════
// 6. PATTERN TESTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Maurer's universal statistic with 6-bit blocks.
pub fn maurers_universal(data: &[u8]) -> Option<TestResult> {
    let name = "Maurer Universal (L=6)";
    let l = 6usize;
    let q = 640usize;
    let bits = to_bits(data);
    let total_blocks = bits.len() / l;
    if total_blocks < q + 1000 {
        return None;
    }
    let k = total_blocks - q;

    let block_at = |i: usize| -> usize {
        bits[i * l..(i + 1) * l]
            .iter()
            .fold(0usize, |acc, &b| (acc << 1) | b as usize)
    };

    let mut table = vec![0usize; 1 << l];
    for i in 0..q {
        table[block_at(i)] = i + 1;
    }

    let mut total = 0.0f64;
    for i in q..q + k {
        let block = block_at(i);
        total += ((i + 1 - table[block]) as f64).log2();
        table[block] = i + 1;
    }

    let fn_val = total / k as f64;
    let expected = 5.2177052;
    let variance = 2.954;
    let lf = l as f64;
    let c = 0.7 - 0.8 / lf + (4.0 + 32.0 / lf) * (k as f64).powf(-3.0 / lf) / 15.0;
    let sigma = c * (variance / k as f64).sqrt();
    let z = (expected - fn_val) / sigma;
    found(name, normal_upper(z), fn_val, format!("fn={fn_val:.4}, K={k}"))
}

/// Compression: a deflate result shorter than the input by `s` bytes has
/// probability at most `2^(-8s)` for random input. Reports half that bound,
/// and 1/2 when nothing was saved.
pub fn compression_ratio(data: &[u8]) -> Option<TestResult> {
    let name = "Compression (deflate)";
    let n = data.len();
    if n < 256 {
        return None;
    }
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(data).ok()?;
    let compressed = encoder.finish().ok()?;
    let ratio = compressed.len() as f64 / n as f64;
    let saved = n.saturating_sub(compressed.len());
    let p = 0.5 * 2f64.powf(-8.0 * saved as f64);
    found(name, p, ratio, format!("{}/{n} = {ratio:.4}", compressed.len()))
}

// ═══════════════════════════════════════════════════════════════════════════════
// 7. ADVANCED TESTS
// ═══════════════════════════════════════════════════════════════════════════════

const RANK_DIM: usize = 16;

/// GF(2) rank of a matrix given as row bitmasks `cols` wide.
fn gf2_rank(rows: &mut [u32], cols: usize) -> usize {
    let mut rank = 0;
    for col in 0..cols {
        let bit = 1u32 << (cols - 1 - col);
        let Some(pivot) = (rank..rows.len()).find(|&r| rows[r] & bit != 0) else {
            continue;
        };
        rows.swap(rank, pivot);
        let pivot_row = rows[rank];
        for (r, row) in rows.iter_mut().enumerate() {
            if r != rank && *row & bit != 0 {
                *row ^= pivot_row;
            }
        }
        rank += 1;
    }
    rank
}

/// Probability that a random `m x q` binary matrix has rank `r`.
fn rank_probability(m: usize, q: usize, r: usize) -> f64 {
    let exp = (r * (q + m - r)) as f64 - (m * q) as f64;
    let mut prod = 1.0;
    for i in 0..r {
        let i = i as f64;
        prod *= (1.0 - 2f64.powf(i - q as f64)) * (1.0 - 2f64.powf(i - m as f64))
            / (1.0 - 2f64.powf(i - r as f64));
    }
    2f64.powf(exp) * prod
}

/// Binary matrix rank over 16x16 matrices.
pub fn binary_matrix_rank(data: &[u8]) -> Option<TestResult> {
    let name = "Matrix Rank (16x16)";
    let bits_per_matrix = RANK_DIM * RANK_DIM;
    let bytes_per_matrix = bits_per_matrix / 8;
    let num_matrices = data.len() / bytes_per_matrix;
    if num_matrices < 38 {
        return None;
    }

    let mut counts = [0u64; 3];
    for chunk in data.chunks_exact(bytes_per_matrix) {
        let mut rows: Vec<u32> = chunk
            .chunks_exact(2)
            .map(|r| u16::from_be_bytes([r[0], r[1]]) as u32)
            .collect();
        let rank = gf2_rank(&mut rows, RANK_DIM);
        let bin = if rank == RANK_DIM {
            0
        } else if rank == RANK_DIM - 1 {
            1
        } else {
            2
        };
        counts[bin] += 1;
    }

    let p_full = rank_probability(RANK_DIM, RANK_DIM, RANK_DIM);
    let p_m1 = rank_probability(RANK_DIM, RANK_DIM, RANK_DIM - 1);
    let probs = [p_full, p_m1, 1.0 - p_full - p_m1];
    let chi2 = chi2_bins(&counts, &probs, num_matrices as f64);
    let p = chi2_sf(2.0, chi2)?;
    found(
        name,
        p,
        chi2,
        format!("N={num_matrices}, full={}, full-1={}", counts[0], counts[1]),
    )
}

/// Berlekamp-Massey algorithm for binary sequences. Returns the LFSR complexity.
fn berlekamp_massey(seq: &[u8]) -> usize {
    let n = seq.len();
    let mut c = vec![0u8; n + 1];
    let mut b = vec![0u8; n + 1];
    c[0] = 1;
    b[0] = 1;
    let mut l: usize = 0;
    let mut m: isize = -1;

    for ni in 0..n {
        let mut d: u8 = seq[ni];
        for i in 1..=l {
            d ^= c[i] & seq[ni - i];
        }
        if d == 1 {
            let t = c.clone();
            let shift = (ni as isize - m) as usize;
            for i in shift..=n {
                c[i] ^= b[i - shift];
            }
            if l <= ni / 2 {
                l = ni + 1 - l;
                m = ni as isize;
                b = t;
            }
        }
    }
    l
}

/// Linear complexity of 200-bit blocks.
pub fn linear_complexity(data: &[u8]) -> Option<TestResult> {
    let name = "Linear Complexity (M=200)";
    let block_size = 200usize;
    let bits = to_bits(data);
    let num_blocks = bits.len() / block_size;
    if num_blocks < 20 {
        return None;
    }

    let m = block_size as f64;
    let sign = if block_size % 2 == 0 { 1.0 } else { -1.0 };
    let mu = m / 2.0 + (9.0 + sign) / 36.0 - (m / 3.0 + 2.0 / 9.0) / 2.0_f64.powf(m);

    let mut observed = [0u64; 7];
    let mut total_l = 0usize;
    for block in bits.chunks_exact(block_size) {
        let complexity = berlekamp_massey(block);
        total_l += complexity;
        let t = sign * (complexity as f64 - mu) + 2.0 / 9.0;
        let bin = if t <= -2.5 {
            0
        } else if t <= -1.5 {
            1
        } else if t <= -0.5 {
            2
        } else if t <= 0.5 {
            3
        } else if t <= 1.5 {
            4
        } else if t <= 2.5 {
            5
        } else {
            6
        };
        observed[bin] += 1;
    }

    let probs = [0.010417, 0.03125, 0.125, 0.5, 0.25, 0.0625, 0.020833];
    let chi2 = chi2_bins(&observed, &probs, num_blocks as f64);
    let p = chi2_sf(6.0, chi2)?;
    let mean_l = total_l as f64 / num_blocks as f64;
    found(name, p, chi2, format!("N={num_blocks}, mean_complexity={mean_l:.1}"))
}

/// Cumulative sums (forward): maximum excursion of the ±1 random walk.
pub fn cusum_test(data: &[u8]) -> Option<TestResult> {
    let name = "Cumulative Sums";
    let bits = to_bits(data);
    let n = bits.len();
    if n < 100 {
        return None;
    }

    let mut s: i64 = 0;
    let mut z: u64 = 0;
    for &bit in &bits {
        s += if bit == 1 { 1 } else { -1 };
        z = z.max(s.unsigned_abs());
    }
    let z = z as f64;

    let nf = n as f64;
    let sqrt_n = nf.sqrt();
    let norm = Normal::standard();
    let phi = |k: f64, a: f64| norm.cdf((4.0 * k + a) * z / sqrt_n);

    let end = ((nf / z - 1.0) / 4.0).floor() as i64;
    let mut sum1 = 0.0;
    for k in ((-nf / z + 1.0) / 4.0).floor() as i64..=end {
        let kf = k as f64;
        sum1 += phi(kf, 1.0) - phi(kf, -1.0);
    }
    let mut sum2 = 0.0;
    for k in ((-nf / z - 3.0) / 4.0).floor() as i64..=end {
        let kf = k as f64;
        sum2 += phi(kf, 3.0) - phi(kf, 1.0);
    }
    let p = 1.0 - sum1 + sum2;
    found(name, p, z, format!("max|S|={z:.0}, n={n}"))
}

const BIRTHDAYS: usize = 512;
const DAY_BITS: u32 = 24;

/// Birthday spacings: 512 birthdays in a year of 2^24 days per sample,
/// repeated spacings are Poisson with mean 2 per sample.
pub fn birthday_spacing(data: &[u8]) -> Option<TestResult> {
    let name = "Birthday Spacings (n=512, d=2^24)";
    let words = to_words(data);
    let samples = words.len() / BIRTHDAYS;
    if samples == 0 {
        return None;
    }

    let mut collisions = 0u64;
    for chunk in words.chunks_exact(BIRTHDAYS) {
        let mut days: Vec<u32> = chunk.iter().map(|w| w >> (32 - DAY_BITS)).collect();
        days.sort_unstable();
        let mut spacings: Vec<u32> = days.windows(2).map(|d| d[1] - d[0]).collect();
        spacings.sort_unstable();
        collisions += spacings.windows(2).filter(|s| s[0] == s[1]).count() as u64;
    }

    let m = BIRTHDAYS as f64;
    let lambda = samples as f64 * m * m * m / (4.0 * (1u64 << DAY_BITS) as f64);
    let poisson = Poisson::new(lambda).ok()?;
    // Mid-p upper tail keeps the discrete distribution off the 0/1 edges.
    let p = poisson.sf(collisions) + 0.5 * poisson.pmf(collisions);
    found(
        name,
        p,
        collisions as f64,
        format!("collisions={collisions}, lambda={lambda:.2}, samples={samples}"),
    )
}

// ═══════════════════════════════════════════════════════════════════════════════
// 8. FLOATING-POINT TESTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Asymptotic Kolmogorov upper tail `Q(lambda)`.
fn kolmogorov_sf(lambda: f64) -> f64 {
    if lambda < 0.2 {
        return 1.0;
    }
    let mut p = 0.0;
    for k in 1..=100i32 {
        let sign = if k % 2 == 0 { -1.0 } else { 1.0 };
        p += sign * (-2.0 * (k as f64 * lambda).powi(2)).exp();
    }
    (2.0 * p).clamp(0.0, 1.0)
}

/// Kolmogorov-Smirnov distance from U(0,1).
pub fn ks_uniform(floats: &[f64]) -> Option<TestResult> {
    let name = "KS Uniform (f64)";
    let n = floats.len();
    if n < 50 {
        return None;
    }
    let mut sorted = floats.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let nf = n as f64;
    let mut d_max = 0.0f64;
    for (i, &x) in sorted.iter().enumerate() {
        let f_x = x.clamp(0.0, 1.0);
        d_max = d_max
            .max((i + 1) as f64 / nf - f_x)
            .max(f_x - i as f64 / nf);
    }

    let sqrt_n = nf.sqrt();
    let lambda = (sqrt_n + 0.12 + 0.11 / sqrt_n) * d_max;
    found(name, kolmogorov_sf(lambda), d_max, format!("D={d_max:.6}, n={n}"))
}

/// Mean (1/2) and variance (1/12) of U(0,1) doubles, combined as a
/// chi-squared with two degrees of freedom.
pub fn mean_variance(floats: &[f64]) -> Option<TestResult> {
    let name = "Mean & Variance (f64)";
    let n = floats.len();
    if n < 50 {
        return None;
    }
    let nf = n as f64;
    let mean: f64 = floats.iter().sum::<f64>() / nf;
    let var: f64 = floats.iter().map(|x| (x - mean) * (x - mean)).sum::<f64>() / nf;

    let z_mean = (mean - 0.5) / (1.0 / (12.0 * nf)).sqrt();
    let z_var = (var - 1.0 / 12.0) / (1.0 / (180.0 * nf)).sqrt();
    let chi2 = z_mean * z_mean + z_var * z_var;
    let p = chi2_sf(2.0, chi2)?;
    found(name, p, chi2, format!("mean={mean:.5}, var={var:.5}"))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Test battery
// ═══════════════════════════════════════════════════════════════════════════════

const BITS_LEN: usize = 10;

static STATISTICS: [Statistic; 18] = [
    // bits
    Statistic::bytes("Monobit", monobit_frequency),
    Statistic::bytes("Block Frequency (M=128)", block_frequency),
    Statistic::bytes("Runs", runs_test),
    Statistic::bytes("Longest Run (M=8)", longest_run_of_ones),
    Statistic::bytes("Serial (m=4)", serial_test),
    Statistic::bytes("Approximate Entropy (m=3)", approximate_entropy),
    Statistic::bytes("Cumulative Sums", cusum_test),
    Statistic::bytes("Matrix Rank (16x16)", binary_matrix_rank),
    Statistic::bytes("Linear Complexity (M=200)", linear_complexity),
    Statistic::bytes("DFT Spectral", dft_spectral),
    // full
    Statistic::bytes("Byte Frequency", byte_frequency),
    Statistic::bytes("Autocorrelation (d=1,8,32)", autocorrelation),
    Statistic::bytes("Birthday Spacings (n=512, d=2^24)", birthday_spacing),
    Statistic::bytes("Adjacent Word Avalanche (32-bit)", word_avalanche),
    Statistic::bytes("Maurer Universal (L=6)", maurers_universal),
    Statistic::bytes("Compression (deflate)", compression_ratio),
    Statistic::floats("KS Uniform (f64)", ks_uniform),
    Statistic::floats("Mean & Variance (f64)", mean_variance),
];

/// Run `kind` over `sample`. Statistics that can't be computed (or panic)
/// are left out, so the result length is the number actually evaluated.
pub fn run_sample(kind: BatteryKind, sample: &Sample) -> Vec<Outcome> {
    kind.statistics()
        .iter()
        .enumerate()
        .filter_map(|(id, stat)| {
            match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| stat.run(sample))) {
                Ok(Some(result)) => Some(Outcome { id, result }),
                Ok(None) | Err(_) => None,
            }
        })
        .collect()
}

/// Draw `bits` bits from `stream` and run `kind` over them.
pub fn run_stream<S: UniformStream + ?Sized>(
    kind: BatteryKind,
    stream: &mut S,
    bits: u64,
) -> Vec<Outcome> {
    run_sample(kind, &Sample::from_stream(kind, stream, bits))
}

/// Run `kind` over the whole of `data`.
pub fn run_bytes(kind: BatteryKind, data: &[u8]) -> Vec<Outcome> {
    run_sample(kind, &Sample::from_bytes(kind, data))
}
