use std::collections::VecDeque;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Ordered so that `max` yields the worst status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HealthStatus {
    Healthy,
    Warning,
    Critical,
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthStatus::Healthy => f.write_str("HEALTHY"),
            HealthStatus::Warning => f.write_str("WARNING"),
            HealthStatus::Critical => f.write_str("CRITICAL"),
        }
    }
}

/// Upper bounds; a value must exceed a bound to breach it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Thresholds {
    pub warning_above: Option<f64>,
    pub critical_above: Option<f64>,
}

impl Thresholds {
    pub const NONE: Thresholds = Thresholds {
        warning_above: None,
        critical_above: None,
    };

    pub const fn new(warning_above: f64, critical_above: f64) -> Self {
        Self {
            warning_above: Some(warning_above),
            critical_above: Some(critical_above),
        }
    }

    pub fn classify(&self, value: f64) -> HealthStatus {
        if self.critical_above.is_some_and(|limit| value > limit) {
            HealthStatus::Critical
        } else if self.warning_above.is_some_and(|limit| value > limit) {
            HealthStatus::Warning
        } else {
            HealthStatus::Healthy
        }
    }

    /// The bound that `status` implies was crossed.
    pub fn breached(&self, status: HealthStatus) -> Option<f64> {
        match status {
            HealthStatus::Healthy => None,
            HealthStatus::Warning => self.warning_above,
            HealthStatus::Critical => self.critical_above,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricSample {
    pub at: DateTime<Utc>,
    pub value: f64,
}

/// Static description of a monitored metric.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSpec {
    pub name: &'static str,
    pub unit: &'static str,
    pub description: &'static str,
    /// Centre of the seeded history.
    pub baseline: f64,
    /// Largest move allowed per step, in either direction.
    pub max_step: f64,
    pub thresholds: Thresholds,
}

/// A metric with its rolling history. Status, current value and history always agree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthMetric {
    #[serde(flatten)]
    spec: MetricSpec,
    status: HealthStatus,
    current_value: f64,
    history: VecDeque<MetricSample>,
    #[serde(skip)]
    capacity: usize,
}

impl HealthMetric {
    pub fn new(spec: MetricSpec, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            status: spec.thresholds.classify(spec.baseline),
            current_value: spec.baseline,
            spec,
            history: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn spec(&self) -> &MetricSpec {
        &self.spec
    }

    pub fn name(&self) -> &'static str {
        self.spec.name
    }

    pub fn status(&self) -> HealthStatus {
        self.status
    }

    pub fn current_value(&self) -> f64 {
        self.current_value
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Oldest first.
    pub fn history(&self) -> impl ExactSizeIterator<Item = &MetricSample> {
        self.history.iter()
    }

    pub fn last_value(&self) -> Option<f64> {
        self.history.back().map(|sample| sample.value)
    }

    /// Clamp, classify, and append one observation, evicting the oldest beyond capacity.
    pub fn record(&mut self, at: DateTime<Utc>, value: f64) -> HealthStatus {
        let value = if value.is_finite() { value.max(0.0) } else { 0.0 };
        if self.history.len() == self.capacity {
            self.history.pop_front();
        }
        self.history.push_back(MetricSample { at, value });
        self.current_value = value;
        self.status = self.spec.thresholds.classify(value);
        self.status
    }
}
