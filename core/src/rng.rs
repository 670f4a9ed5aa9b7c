//! Deterministic random number generation.
//!
//! RULE: Nothing inside the stepper may call a platform RNG.
//! All randomness flows through StreamRng instances derived
//! from the single master seed of the run.
//!
//! Each concern gets its own RNG stream, seeded deterministically
//! from (master_seed XOR stream_index * golden ratio). This means:
//!   - Adding a new stream never changes existing streams.
//!   - Error triggers cannot perturb adversary re-targeting and vice versa.

use rand::{RngCore, SeedableRng};
use rand_pcg::Pcg64Mcg;

/// A named, deterministic RNG for a single concern.
pub struct StreamRng {
    pub name: &'static str,
    inner: Pcg64Mcg,
}

impl StreamRng {
    /// Create a stream RNG from the master seed and a stable
    /// stream index. The index must never change once assigned.
    pub fn new(master_seed: u64, stream_index: u64) -> Self {
        let derived_seed = master_seed ^ (stream_index.wrapping_mul(0x9e37_79b9_7f4a_7c15));
        Self {
            name: "unnamed",
            inner: Pcg64Mcg::seed_from_u64(derived_seed),
        }
    }

    pub fn with_name(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    /// Roll a float in [0.0, 1.0).
    pub fn next_f64(&mut self) -> f64 {
        let bits = self.inner.next_u64();
        (bits >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    /// Roll a u64 in [0, n).
    pub fn next_u64_below(&mut self, n: u64) -> u64 {
        assert!(n > 0, "n must be > 0");
        self.inner.next_u64() % n
    }

    /// Roll a float in [lo, hi). Returns `lo` when the range is empty.
    pub fn uniform(&mut self, lo: f64, hi: f64) -> f64 {
        if hi <= lo {
            return lo;
        }
        lo + (hi - lo) * self.next_f64()
    }

    /// Roll a float in [-mag, mag).
    pub fn symmetric(&mut self, mag: f64) -> f64 {
        self.uniform(-mag, mag)
    }

    /// Bernoulli trial: returns true with probability p.
    pub fn chance(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }

    /// Bernoulli trial for a Poisson process with `rate_per_sec`
    /// observed over `dt_secs`: p = 1 - exp(-rate * dt).
    pub fn chance_over(&mut self, rate_per_sec: f64, dt_secs: f64) -> bool {
        if rate_per_sec <= 0.0 || dt_secs <= 0.0 {
            return false;
        }
        self.chance(1.0 - (-rate_per_sec * dt_secs).exp())
    }

    /// Pick one element uniformly. Returns None for an empty slice.
    pub fn pick<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        if items.is_empty() {
            return None;
        }
        items.get(self.next_u64_below(items.len() as u64) as usize)
    }
}

/// A fresh master seed for runs that were not given one. The only place
/// outside a seeded stream where platform entropy is drawn.
pub fn fresh_seed() -> u64 {
    rand::random()
}

/// Source of all stream RNGs for a single run.
pub struct RngBank {
    master_seed: u64,
}

impl RngBank {
    pub fn new(master_seed: u64) -> Self {
        Self { master_seed }
    }

    pub fn master_seed(&self) -> u64 {
        self.master_seed
    }

    pub fn for_stream(&self, slot: StreamSlot) -> StreamRng {
        StreamRng::new(self.master_seed, slot as u64).with_name(slot.name())
    }
}

/// Stable stream slot assignments.
/// NEVER reorder or remove entries — only append.
/// Reordering changes every stream's seed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u64)]
pub enum StreamSlot {
    Setup     = 0,
    Adversary = 1,
    Friendly  = 2,
    Noise     = 3,
    // Add new streams here — append only.
}

impl StreamSlot {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Setup     => "setup",
            Self::Adversary => "adversary",
            Self::Friendly  => "friendly",
            Self::Noise     => "noise",
        }
    }
}
