//! # Injectable Randomness
//!
//! The bandit's exploration branch and the A/B test runner both need a
//! source of randomness, but production's `rand::thread_rng()` is not
//! deterministic enough for tests that assert on exploration-vs-exploitation
//! outcomes. `RandomSource` is the seam: production code takes
//! `Arc<dyn RandomSource>` (default `StdRngSource`, seeded from the OS),
//! tests inject a fixed-seed or scripted implementation.

use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// A source of uniform randomness, injected wherever production code would
/// otherwise call `rand::thread_rng()` directly.
pub trait RandomSource: Send + Sync {
    /// Uniform float in `[0, 1)`.
    fn next_f64(&self) -> f64;

    /// Uniform index in `[0, len)`. Panics if `len == 0`.
    fn next_index(&self, len: usize) -> usize {
        assert!(len > 0, "next_index called with empty range");
        (self.next_f64() * len as f64) as usize
    }
}

/// Default production implementation, backed by `rand::rngs::StdRng`.
pub struct StdRngSource(Mutex<StdRng>);

impl StdRngSource {
    pub fn from_entropy() -> Self {
        StdRngSource(Mutex::new(StdRng::from_entropy()))
    }

    pub fn from_seed(seed: u64) -> Self {
        StdRngSource(Mutex::new(StdRng::seed_from_u64(seed)))
    }
}

impl Default for StdRngSource {
    fn default() -> Self {
        Self::from_entropy()
    }
}

impl RandomSource for StdRngSource {
    fn next_f64(&self) -> f64 {
        self.0.lock().expect("rng mutex poisoned").gen::<f64>()
    }
}
