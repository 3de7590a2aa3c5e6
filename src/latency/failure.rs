//! Synthetic failure injection.

use std::sync::{Mutex, PoisonError};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;

/// A failure raised on purpose by a service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{service} service error occurred!")]
pub struct InjectedFailure {
    pub service: &'static str,
}

/// Raises [`InjectedFailure`] with a fixed probability.
#[derive(Debug)]
pub struct FailureInjector {
    rate: f64,
    rng: Mutex<StdRng>,
}

impl FailureInjector {
    /// `rate` is clamped to `[0, 1]`; NaN disables injection.
    pub fn new(rate: f64) -> Self {
        Self::with_rng(rate, StdRng::from_entropy())
    }

    pub fn seeded(rate: f64, seed: u64) -> Self {
        Self::with_rng(rate, StdRng::seed_from_u64(seed))
    }

    fn with_rng(rate: f64, rng: StdRng) -> Self {
        let rate = if rate.is_nan() { 0.0 } else { rate.clamp(0.0, 1.0) };
        Self {
            rate,
            rng: Mutex::new(rng),
        }
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// One draw: `Err` with probability `rate`.
    pub fn check(&self, service: &'static str) -> Result<(), InjectedFailure> {
        let fail = {
            let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
            rng.gen_bool(self.rate)
        };

        if fail {
            Err(InjectedFailure { service })
        } else {
            Ok(())
        }
    }
}
