//! Service health monitor: rolling per-metric history with threshold classification.

pub mod catalog;
pub mod metric;
pub mod monitor;
pub mod sampler;

pub use catalog::default_catalog;
pub use metric::{HealthMetric, HealthStatus, MetricSample, MetricSpec, Thresholds};
pub use monitor::{HealthAlert, HealthMonitor, HealthSnapshot, MonitorHandle};
pub use sampler::{MetricSampler, RandomWalkSampler};
