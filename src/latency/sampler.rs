//! Time-windowed latency sampling.
//!
//! The distribution used for a sample is chosen by the current minute of the
//! hour modulo 10, so generated traffic rotates through three shapes:
//!
//! ```text
//! minute % 10   shape         parameters                       bound
//! 0..=2         Gaussian      mean = budget / 2, sd = 20ms     clamp [0, budget]
//! 3..=5         Exponential   mean = budget                    min(budget)
//! 6..=9         Uniform       k in 0..=units, k * 10ms         inherent
//! ```

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Exp, Normal};
use thiserror::Error;

use crate::latency::clock::Clock;
use crate::observability::metrics;

/// Seconds represented by one latency budget unit.
pub const SECONDS_PER_UNIT: f64 = 0.01;

/// Standard deviation of the Gaussian shape in seconds.
pub const GAUSSIAN_STD_DEV: f64 = 0.02;

/// Errors returned by [`LatencySampler::sample`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LatencyError {
    /// The budget was negative or does not fit in `u32` units.
    #[error("invalid argument: latency budget must be within 0..={max} units, got {0}", max = u32::MAX)]
    InvalidArgument(i64),

    /// The distribution rejected its parameters.
    #[error("invalid distribution parameters: {0}")]
    Distribution(String),
}

/// The probability distribution behind a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LatencyShape {
    Gaussian,
    Exponential,
    Uniform,
}

impl LatencyShape {
    /// Shape selected for a minute of the hour.
    pub fn for_minute(minute: u32) -> Self {
        match minute % 10 {
            0..=2 => Self::Gaussian,
            3..=5 => Self::Exponential,
            _ => Self::Uniform,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gaussian => "gaussian",
            Self::Exponential => "exponential",
            Self::Uniform => "uniform",
        }
    }

    /// Draw a bounded delay in seconds from this shape.
    pub fn draw<R: Rng + ?Sized>(self, max_units: u32, rng: &mut R) -> Result<f64, LatencyError> {
        if max_units == 0 {
            return Ok(0.0);
        }

        let upper = upper_bound(max_units);
        let raw = match self {
            Self::Gaussian => Normal::new(upper / 2.0, GAUSSIAN_STD_DEV)
                .map_err(|e| LatencyError::Distribution(e.to_string()))?
                .sample(rng),
            Self::Exponential => Exp::new(1.0 / upper)
                .map_err(|e| LatencyError::Distribution(e.to_string()))?
                .sample(rng),
            Self::Uniform => f64::from(rng.gen_range(0..=max_units)) * SECONDS_PER_UNIT,
        };

        Ok(self.bound(max_units, raw))
    }

    /// Post-process a raw draw into `[0, max_units * 0.01]`.
    pub fn bound(self, max_units: u32, raw: f64) -> f64 {
        let upper = upper_bound(max_units);
        match self {
            Self::Gaussian => raw.clamp(0.0, upper),
            // Exponential draws are never negative.
            Self::Exponential => raw.min(upper),
            Self::Uniform => raw,
        }
    }
}

/// Largest delay a budget allows, in seconds.
pub fn upper_bound(max_units: u32) -> f64 {
    f64::from(max_units) * SECONDS_PER_UNIT
}

/// A delay produced by the sampler.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampledDelay {
    secs: f64,
    shape: LatencyShape,
}

impl SampledDelay {
    pub fn as_secs_f64(&self) -> f64 {
        self.secs
    }

    pub fn shape(&self) -> LatencyShape {
        self.shape
    }

    pub fn as_duration(&self) -> Duration {
        Duration::from_secs_f64(self.secs)
    }
}

/// Latency sampler driven by an injected clock and a pseudo-random source.
///
/// Sampling is synchronous; callers await the returned delay themselves.
pub struct LatencySampler {
    clock: Arc<dyn Clock>,
    rng: Mutex<StdRng>,
}

impl std::fmt::Debug for LatencySampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LatencySampler")
            .field("shape", &self.current_shape())
            .finish_non_exhaustive()
    }
}

impl LatencySampler {
    /// Create a sampler seeded from OS entropy.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_rng(clock, StdRng::from_entropy())
    }

    /// Create a sampler with a reproducible random sequence.
    pub fn seeded(clock: Arc<dyn Clock>, seed: u64) -> Self {
        Self::with_rng(clock, StdRng::seed_from_u64(seed))
    }

    fn with_rng(clock: Arc<dyn Clock>, rng: StdRng) -> Self {
        Self {
            clock,
            rng: Mutex::new(rng),
        }
    }

    /// Shape that a sample taken now would use.
    pub fn current_shape(&self) -> LatencyShape {
        LatencyShape::for_minute(self.clock.minute())
    }

    /// Sample a delay no longer than `max_units * 10ms`.
    pub fn sample(&self, max_units: i64) -> Result<SampledDelay, LatencyError> {
        let units = u32::try_from(max_units).map_err(|_| LatencyError::InvalidArgument(max_units))?;
        let shape = self.current_shape();

        let secs = {
            let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
            shape.draw(units, &mut *rng)?
        };

        metrics::record_sampled_delay(shape.as_str(), secs);
        Ok(SampledDelay { secs, shape })
    }

    /// A whole number of `step`s, uniform over `0..=max_steps`.
    pub fn stepped(&self, max_steps: u32, step: Duration) -> Duration {
        let steps = {
            let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
            rng.gen_range(0..=max_steps)
        };
        step.saturating_mul(steps)
    }
}
