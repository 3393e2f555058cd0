use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info};

use super::catalog::default_catalog;
use super::metric::{HealthMetric, HealthStatus, MetricSpec};
use super::sampler::{MetricSampler, RandomWalkSampler};
use crate::config::MonitorConfig;

/// Spacing of the synthetic history laid down before the first tick.
pub const SEED_SPACING_SECS: i64 = 60;

fn seed_spacing() -> chrono::Duration {
    chrono::Duration::seconds(SEED_SPACING_SECS)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthAlert {
    pub metric: &'static str,
    pub status: HealthStatus,
    pub value: f64,
    pub threshold: f64,
    pub unit: &'static str,
    pub message: String,
}

/// Point-in-time copy of every metric plus the derived overall status.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthSnapshot {
    pub taken_at: DateTime<Utc>,
    pub overall: HealthStatus,
    pub metrics: Vec<HealthMetric>,
    pub alerts: Vec<HealthAlert>,
}

impl HealthSnapshot {
    fn capture(taken_at: DateTime<Utc>, metrics: &[HealthMetric]) -> Self {
        let overall = metrics
            .iter()
            .map(HealthMetric::status)
            .max()
            .unwrap_or(HealthStatus::Healthy);

        let alerts = metrics
            .iter()
            .filter_map(|metric| {
                let status = metric.status();
                let threshold = metric.spec().thresholds.breached(status)?;
                Some(HealthAlert {
                    metric: metric.name(),
                    status,
                    value: metric.current_value(),
                    threshold,
                    unit: metric.spec().unit,
                    message: format!(
                        "{} at {:.2}{} exceeds the {} threshold of {}{}",
                        metric.name(),
                        metric.current_value(),
                        metric.spec().unit,
                        status,
                        threshold,
                        metric.spec().unit
                    ),
                })
            })
            .collect();

        Self {
            taken_at,
            overall,
            metrics: metrics.to_vec(),
            alerts,
        }
    }

    pub fn metric(&self, name: &str) -> Option<&HealthMetric> {
        self.metrics.iter().find(|metric| metric.name() == name)
    }
}

/// Owns the metric set. Every tick samples, classifies and records each metric in one step.
pub struct HealthMonitor {
    metrics: Vec<HealthMetric>,
    sampler: Box<dyn MetricSampler>,
    last_tick: DateTime<Utc>,
}

impl HealthMonitor {
    /// Build a monitor whose histories are pre-filled with `capacity` points ending before `now`.
    pub fn new<S>(catalog: Vec<MetricSpec>, capacity: usize, sampler: S, now: DateTime<Utc>) -> Self
    where
        S: MetricSampler + 'static,
    {
        let mut sampler: Box<dyn MetricSampler> = Box::new(sampler);
        let metrics = catalog
            .into_iter()
            .map(|spec| {
                let mut metric = HealthMetric::new(spec, capacity);
                let points = metric.capacity() as i32;
                for offset in (1..=points).rev() {
                    // Seeded points are drawn independently around the baseline.
                    let value = sampler.sample(metric.spec(), None);
                    metric.record(now - seed_spacing() * offset, value);
                }
                metric
            })
            .collect();

        Self {
            metrics,
            sampler,
            last_tick: now,
        }
    }

    /// Default catalog driven by a random walk, seeded from configuration when requested.
    pub fn from_config(config: &MonitorConfig) -> Self {
        Self::new(
            default_catalog(),
            config.history_capacity,
            RandomWalkSampler::new(config.seed),
            Utc::now(),
        )
    }

    pub fn tick(&mut self) -> HealthSnapshot {
        self.tick_at(Utc::now())
    }

    pub fn tick_at(&mut self, now: DateTime<Utc>) -> HealthSnapshot {
        for metric in &mut self.metrics {
            let value = self.sampler.sample(metric.spec(), metric.last_value());
            let status = metric.record(now, value);
            debug!(metric = metric.name(), value = metric.current_value(), %status, "metric sampled");
        }
        self.last_tick = now;
        self.snapshot()
    }

    pub fn snapshot(&self) -> HealthSnapshot {
        HealthSnapshot::capture(self.last_tick, &self.metrics)
    }

    pub fn metrics(&self) -> &[HealthMetric] {
        &self.metrics
    }

    /// Move the monitor onto the runtime and tick every `every`. Must be called from within a
    /// tokio runtime.
    pub fn spawn(self, every: Duration) -> MonitorHandle {
        let mut monitor = self;
        let (updates, receiver) = watch::channel(monitor.snapshot());
        let every = every.max(Duration::from_millis(1));

        let task = tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + every, every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(interval_ms = every.as_millis() as u64, "health monitor started");
            loop {
                ticker.tick().await;
                let snapshot = monitor.tick();
                if updates.send(snapshot).is_err() {
                    debug!("health monitor has no observers left; stopping");
                    break;
                }
            }
        });

        MonitorHandle { receiver, task }
    }
}

/// Running monitor. Dropping the handle stops the ticker.
pub struct MonitorHandle {
    receiver: watch::Receiver<HealthSnapshot>,
    task: JoinHandle<()>,
}

impl MonitorHandle {
    pub fn snapshot(&self) -> HealthSnapshot {
        self.receiver.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<HealthSnapshot> {
        self.receiver.clone()
    }

    pub fn shutdown(self) {}
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
