//! Utility-based loan underwriting client.
//!
//! Three subsystems share one backend: [`underwriting::UtilityEngine`] turns applicant
//! profiles into decisions, [`audit::AuditSyncChannel`] keeps a cached view of the decision
//! ledger in step with decisions and searches, and [`health::HealthMonitor`] tracks service
//! metrics on its own cadence.

pub mod analytics;
pub mod audit;
pub mod backend;
pub mod config;
pub mod error;
pub mod health;
pub mod telemetry;
pub mod underwriting;
