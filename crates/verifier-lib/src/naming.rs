//! Randomized names for per-run grid resources
//!
//! Every run deploys onto shared infrastructure, so workload and gateway
//! names must not collide between concurrent runs. The generator is an
//! injected dependency rather than ambient global state: production code
//! uses [`RandomNames::from_entropy`], tests use [`RandomNames::seeded`]
//! to get the same names on every run.

use rand::distributions::Alphanumeric;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;

/// Source of randomness for names and random choices
pub trait NameGenerator: Send + Sync {
    /// Random ASCII alphanumeric string of exactly `len` characters
    fn alphanumeric(&self, len: usize) -> String;

    /// Random index in `0..upper`. `upper` must be non-zero.
    fn index(&self, upper: usize) -> usize;

    /// Random integer in the inclusive range `low..=high`
    fn int_in(&self, low: u32, high: u32) -> u32;
}

/// [`NameGenerator`] backed by a seedable PRNG
pub struct RandomNames {
    rng: Mutex<StdRng>,
}

impl RandomNames {
    pub fn from_entropy() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    fn with_rng<T>(&self, f: impl FnOnce(&mut StdRng) -> T) -> T {
        // Poisoning leaves the PRNG state intact
        let mut rng = match self.rng.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut rng)
    }
}

impl Default for RandomNames {
    fn default() -> Self {
        Self::from_entropy()
    }
}

impl NameGenerator for RandomNames {
    fn alphanumeric(&self, len: usize) -> String {
        self.with_rng(|rng| {
            rng.sample_iter(&Alphanumeric)
                .take(len)
                .map(char::from)
                .collect()
        })
    }

    fn index(&self, upper: usize) -> usize {
        self.with_rng(|rng| rng.gen_range(0..upper.max(1)))
    }

    fn int_in(&self, low: u32, high: u32) -> u32 {
        let (low, high) = if low <= high { (low, high) } else { (high, low) };
        self.with_rng(|rng| rng.gen_range(low..=high))
    }
}

/// Name with a fixed prefix and a random alphanumeric suffix
pub fn prefixed(names: &dyn NameGenerator, prefix: &str, suffix_len: usize) -> String {
    format!("{}{}", prefix, names.alphanumeric(suffix_len))
}
