//! Bit finalizer catalog and the active-finalizer selection.
//!
//! Two catalogs exist:
//!
//! - [`XORSHIFT_MUL_3`]: three stage xorshift/multiply finalizers, each fully
//!   described by five numbers `(s0, m0, s1, m1, s2)`:
//!
//!   ```text
//!   x = (x ^ (x >> s0)) * m0
//!   x = (x ^ (x >> s1)) * m1
//!   x =  x ^ (x >> s2)
//!   ```
//!
//! - [`BUILTINS`]: finalizers that don't fit that template (128-bit widening
//!   multiplies and friends). Lookup falls through to this catalog only when
//!   the parameterized one misses.
//!
//! Every finalizer implements [`BitFinalizer`], which is all the buffer and
//! sampling code needs.

use serde::Serialize;

use crate::error::Advisory;

/// Plain 64-bit to 64-bit hash function.
pub type HashFn = fn(u64) -> u64;

/// Anything that can act as the bit finalizer under test.
pub trait BitFinalizer {
    /// Mix one 64-bit word.
    fn hash(&self, x: u64) -> u64;

    /// Display name used in reports.
    fn name(&self) -> &str;
}

/// The closed-form three stage xorshift/multiply transform.
///
/// Shifts wrap at the word width; multiplication is mod 2^64.
#[inline(always)]
pub const fn xorshift_mul_3(x: u64, s0: u32, m0: u64, s1: u32, m1: u64, s2: u32) -> u64 {
    let x = (x ^ x.wrapping_shr(s0)).wrapping_mul(m0);
    let x = (x ^ x.wrapping_shr(s1)).wrapping_mul(m1);
    x ^ x.wrapping_shr(s2)
}

// ---------------------------------------------------------------------------
// Parameterized catalog
// ---------------------------------------------------------------------------

/// A parameterized three stage xorshift/multiply finalizer.
///
/// Two definitions with the same parameters behave identically; the name is
/// only a label. Multipliers are expected to be odd (so each multiply is a
/// bijection mod 2^64) but that is not checked here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct XorshiftMul3 {
    pub name: &'static str,
    pub s0: u32,
    pub m0: u64,
    pub s1: u32,
    pub m1: u64,
    pub s2: u32,
}

impl XorshiftMul3 {
    /// Register a definition. Used to build the compile-time catalog.
    pub const fn new(name: &'static str, s0: u32, m0: u64, s1: u32, m1: u64, s2: u32) -> Self {
        Self {
            name,
            s0,
            m0,
            s1,
            m1,
            s2,
        }
    }

    /// Evaluate the finalizer.
    #[inline(always)]
    pub const fn mix(&self, x: u64) -> u64 {
        xorshift_mul_3(x, self.s0, self.m0, self.s1, self.m1, self.s2)
    }

    /// True when both multipliers are odd.
    pub const fn is_bijective(&self) -> bool {
        self.m0 & 1 == 1 && self.m1 & 1 == 1
    }

    /// Render the definition as a standalone Rust function.
    pub fn render_source(&self, indent: usize) -> String {
        let pad = " ".repeat(indent);
        format!(
            "{pad}pub fn {name}(x: u64) -> u64 {{\n\
             {pad}    let x = (x ^ (x >> {s0:2})).wrapping_mul(0x{m0:016x});\n\
             {pad}    let x = (x ^ (x >> {s1:2})).wrapping_mul(0x{m1:016x});\n\
             {pad}    x ^ (x >> {s2:2})\n\
             {pad}}}\n",
            name = self.name,
            s0 = self.s0,
            m0 = self.m0,
            s1 = self.s1,
            m1 = self.m1,
            s2 = self.s2,
        )
    }
}

impl BitFinalizer for XorshiftMul3 {
    #[inline]
    fn hash(&self, x: u64) -> u64 {
        self.mix(x)
    }

    fn name(&self) -> &str {
        self.name
    }
}

/// Hardcoded parameter sets, searched in order by exact name.
pub static XORSHIFT_MUL_3: [XorshiftMul3; 18] = [
    // http://zimbry.blogspot.com/2011/09/better-bit-mixing-improving-on.html
    XorshiftMul3::new("mix01", 31, 0x7fb5d329728ea185, 27, 0x81dadef4bc2dd44d, 33),
    XorshiftMul3::new("mix02", 33, 0x64dd81482cbd31d7, 31, 0xe36aa5c613612997, 31),
    XorshiftMul3::new("mix03", 31, 0x99bcf6822b23ca35, 30, 0x14020a57acced8b7, 33),
    XorshiftMul3::new("mix04", 33, 0x62a9d9ed799705f5, 28, 0xcb24d0a5c88c35b3, 32),
    XorshiftMul3::new("mix05", 31, 0x79c135c1674b9add, 29, 0x54c77c86f6913e45, 30),
    XorshiftMul3::new("mix06", 31, 0x69b0bc90bd9a8c49, 27, 0x3d5e661a2a77868d, 30),
    XorshiftMul3::new("mix07", 30, 0x16a6ac37883af045, 26, 0xcc9c31a4274686a5, 32),
    XorshiftMul3::new("mix08", 30, 0x294aa62849912f0b, 28, 0x0a9ba9c8a5b15117, 31),
    XorshiftMul3::new("mix09", 32, 0x4cd6944c5cc20b6d, 29, 0xfc12c5b19d3259e9, 32),
    XorshiftMul3::new("mix10", 30, 0xe4c7e495f4c683f5, 32, 0xfda871baea35a293, 33),
    XorshiftMul3::new("mix11", 27, 0x97d461a8b11570d9, 28, 0x02271eb7c6c4cd6b, 32),
    XorshiftMul3::new("mix12", 29, 0x3cd0eb9d47532dfb, 26, 0x63660277528772bb, 33),
    XorshiftMul3::new("mix13", 30, 0xbf58476d1ce4e5b9, 27, 0x94d049bb133111eb, 31),
    XorshiftMul3::new("mix14", 30, 0x4be98134a5976fd3, 29, 0x3bc0993a5ad19a13, 31),
    XorshiftMul3::new("lea01", 32, 0xdaba0b6eb09322e3, 32, 0xdaba0b6eb09322e3, 32),
    // https://github.com/aappleby/smhasher/wiki/MurmurHash3
    XorshiftMul3::new("murmur3", 33, 0xff51afd7ed558ccd, 33, 0xc4ceb9fe1a85ec53, 33),
    XorshiftMul3::new("xxhash", 33, 0xc2b2ae3d27d4eb4f, 29, 0x165667b19e3779f9, 32),
    XorshiftMul3::new("degski", 32, 0xdaba0b6eb09322e3, 32, 0xdaba0b6eb09322e3, 32),
];

/// Index of `mix13` (the SplitMix64 finalizer) in [`XORSHIFT_MUL_3`].
pub const MIX13: usize = 12;

/// Linear scan of the parameterized catalog. Case-sensitive.
pub fn lookup_xorshift_mul_3(name: &str) -> Option<(usize, &'static XorshiftMul3)> {
    XORSHIFT_MUL_3
        .iter()
        .enumerate()
        .find(|(_, def)| def.name == name)
}

// ---------------------------------------------------------------------------
// Named builtins
// ---------------------------------------------------------------------------

/// A finalizer that doesn't fit the parameterized template.
#[derive(Debug, Clone, Copy)]
pub struct Builtin {
    pub name: &'static str,
    pub description: &'static str,
    pub f: HashFn,
}

impl BitFinalizer for Builtin {
    #[inline]
    fn hash(&self, x: u64) -> u64 {
        (self.f)(x)
    }

    fn name(&self) -> &str {
        self.name
    }
}

/// XOR of the high and low halves of the full 128-bit product `a * b`.
#[inline(always)]
pub fn mum(a: u64, b: u64) -> u64 {
    let r = (a as u128) * (b as u128);
    ((r >> 64) as u64) ^ (r as u64)
}

/// wyhash style single multiply finalizer.
pub fn wyhash(x: u64) -> u64 {
    mum(x, 0xe7037ed1a0b428db)
}

/// Untruncated square of `u ^ k` folded to 64 bits, then one xorshift-multiply.
pub fn ur_mum(u: u64) -> u64 {
    const K: u64 = 0x8bb84b93962eacc9;

    let u = u ^ K;
    let t = (u as u128) * (u as u128);
    let t = t ^ (t >> 64);
    let u = t as u64;
    (u ^ (u >> 32)).wrapping_mul(0x7fb5d329728ea185)
}

/// [`ur_mum`] with a final xorshift.
pub fn no_ur_mum(u: u64) -> u64 {
    let u = ur_mum(u);
    u ^ (u >> 32)
}

/// MurmurHash64A finalizer. Known to be weak.
pub fn murmur2(x: u64) -> u64 {
    let x = x ^ (x >> 47);
    let x = x.wrapping_mul(0xc6a4a7935bd1e995);
    x ^ (x >> 47)
}

/// Non-parameterized finalizers, consulted after [`XORSHIFT_MUL_3`].
pub static BUILTINS: [Builtin; 4] = [
    Builtin {
        name: "wyhash",
        description: "hi ^ lo of the 128-bit product x * 0xe7037ed1a0b428db",
        f: wyhash,
    },
    Builtin {
        name: "ur_mum",
        description: "square of (x ^ k) folded hi ^ lo, then xorshift-multiply",
        f: ur_mum,
    },
    Builtin {
        name: "no_ur_mum",
        description: "ur_mum followed by a 32-bit xorshift",
        f: no_ur_mum,
    },
    Builtin {
        name: "murmur2",
        description: "MurmurHash64A finalizer (weak reference point)",
        f: murmur2,
    },
];

/// The finalizer in force before any selection.
pub const DEFAULT_BUILTIN: usize = 0;

/// Linear scan of the builtin catalog. Case-sensitive.
pub fn lookup_builtin(name: &str) -> Option<(usize, &'static Builtin)> {
    BUILTINS.iter().enumerate().find(|(_, b)| b.name == name)
}

// ---------------------------------------------------------------------------
// Uniform dispatch
// ---------------------------------------------------------------------------

/// Either kind of finalizer, dispatched uniformly.
#[derive(Debug, Clone, Copy)]
pub enum Finalizer {
    XorshiftMul3(XorshiftMul3),
    Builtin(Builtin),
}

impl BitFinalizer for Finalizer {
    #[inline]
    fn hash(&self, x: u64) -> u64 {
        match self {
            Self::XorshiftMul3(def) => def.mix(x),
            Self::Builtin(b) => (b.f)(x),
        }
    }

    fn name(&self) -> &str {
        match self {
            Self::XorshiftMul3(def) => def.name,
            Self::Builtin(b) => b.name,
        }
    }
}

/// Resolve a name against the parameterized catalog, then the builtins.
pub fn lookup(name: &str) -> Option<Finalizer> {
    resolve(name).map(|active| active.finalizer)
}

/// Every selectable name, parameterized entries first.
pub fn names() -> impl Iterator<Item = &'static str> {
    XORSHIFT_MUL_3
        .iter()
        .map(|d| d.name)
        .chain(BUILTINS.iter().map(|b| b.name))
}

/// Brace list of the parameterized names, e.g. `{mix01,mix02,...}`.
pub fn brace_list() -> String {
    let names: Vec<&str> = XORSHIFT_MUL_3.iter().map(|d| d.name).collect();
    format!("{{{}}}", names.join(","))
}

// ---------------------------------------------------------------------------
// Active selection
// ---------------------------------------------------------------------------

/// How the active finalizer was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalizerKind {
    /// Compiled-in default, never explicitly selected.
    DefaultBuiltin,
    /// Entry from [`XORSHIFT_MUL_3`].
    Parameterized,
    /// Entry from [`BUILTINS`].
    NamedBuiltin,
}

impl std::fmt::Display for FinalizerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DefaultBuiltin => write!(f, "default"),
            Self::Parameterized => write!(f, "xorshift_mul_3"),
            Self::NamedBuiltin => write!(f, "builtin"),
        }
    }
}

/// The finalizer a run is using. Always holds a valid function.
///
/// This is an ordinary value owned by the caller and passed to the buffer and
/// sampling code; independent runs in one process each carry their own.
#[derive(Debug, Clone, Copy)]
pub struct ActiveFinalizer {
    pub finalizer: Finalizer,
    pub kind: FinalizerKind,
    /// Catalog index; `None` for the default builtin.
    pub id: Option<usize>,
}

impl Default for ActiveFinalizer {
    fn default() -> Self {
        Self {
            finalizer: Finalizer::Builtin(BUILTINS[DEFAULT_BUILTIN]),
            kind: FinalizerKind::DefaultBuiltin,
            id: None,
        }
    }
}

impl ActiveFinalizer {
    /// Switch to the finalizer called `name`.
    ///
    /// On a miss the current selection is left untouched, the miss is logged,
    /// and `false` is returned.
    pub fn select(&mut self, name: &str) -> bool {
        match resolve(name) {
            Some(found) => {
                *self = found;
                true
            }
            None => {
                Advisory::UnknownFinalizer {
                    name: name.to_string(),
                }
                .logged();
                false
            }
        }
    }

    /// Parameters of the active finalizer, when it is parameterized.
    pub fn params(&self) -> Option<&XorshiftMul3> {
        match &self.finalizer {
            Finalizer::XorshiftMul3(def) => Some(def),
            Finalizer::Builtin(_) => None,
        }
    }
}

impl BitFinalizer for ActiveFinalizer {
    #[inline]
    fn hash(&self, x: u64) -> u64 {
        self.finalizer.hash(x)
    }

    fn name(&self) -> &str {
        self.finalizer.name()
    }
}

/// Look `name` up as a ready-to-use [`ActiveFinalizer`].
pub fn resolve(name: &str) -> Option<ActiveFinalizer> {
    if let Some((id, def)) = lookup_xorshift_mul_3(name) {
        return Some(ActiveFinalizer {
            finalizer: Finalizer::XorshiftMul3(*def),
            kind: FinalizerKind::Parameterized,
            id: Some(id),
        });
    }
    lookup_builtin(name).map(|(id, b)| ActiveFinalizer {
        finalizer: Finalizer::Builtin(*b),
        kind: FinalizerKind::NamedBuiltin,
        id: Some(id),
    })
}
