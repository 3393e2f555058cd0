use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::metric::MetricSpec;

/// Source of the next raw observation for a metric. The monitor clamps and classifies whatever
/// is returned. `previous` is `None` while the monitor seeds history.
pub trait MetricSampler: Send {
    fn sample(&mut self, spec: &MetricSpec, previous: Option<f64>) -> f64;
}

impl<F> MetricSampler for F
where
    F: FnMut(&MetricSpec, Option<f64>) -> f64 + Send,
{
    fn sample(&mut self, spec: &MetricSpec, previous: Option<f64>) -> f64 {
        self(spec, previous)
    }
}

/// Bounded random walk: each value moves at most `max_step` from the previous one, or from the
/// baseline when there is none.
pub struct RandomWalkSampler {
    rng: StdRng,
}

impl RandomWalkSampler {
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn new(seed: Option<u64>) -> Self {
        seed.map_or_else(Self::from_entropy, Self::seeded)
    }
}

impl MetricSampler for RandomWalkSampler {
    fn sample(&mut self, spec: &MetricSpec, previous: Option<f64>) -> f64 {
        let from = previous.unwrap_or(spec.baseline);
        let step = spec.max_step.abs();
        if step == 0.0 {
            return from;
        }
        from + self.rng.gen_range(-step..=step)
    }
}
