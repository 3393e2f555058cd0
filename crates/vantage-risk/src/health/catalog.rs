use super::metric::{MetricSpec, Thresholds};

pub const API_LATENCY: &str = "API Latency";
pub const MODEL_INFERENCE_TIME: &str = "Model Inference Time";
pub const DATABASE_CONNECTION: &str = "Database Connection";
pub const CPU_USAGE: &str = "CPU Usage";
pub const MEMORY_USAGE: &str = "Memory Usage";
pub const ERROR_RATE: &str = "Error Rate";

/// Metrics watched by the default monitor, in display order.
pub fn default_catalog() -> Vec<MetricSpec> {
    vec![
        MetricSpec {
            name: API_LATENCY,
            unit: "ms",
            description: "Average response time for API requests",
            baseline: 45.0,
            max_step: 10.0,
            thresholds: Thresholds::NONE,
        },
        MetricSpec {
            name: MODEL_INFERENCE_TIME,
            unit: "ms",
            description: "Time to generate decision for single applicant",
            baseline: 127.0,
            max_step: 20.0,
            thresholds: Thresholds::NONE,
        },
        MetricSpec {
            name: DATABASE_CONNECTION,
            unit: "ms",
            description: "Query execution time to database",
            baseline: 2.0,
            max_step: 0.5,
            thresholds: Thresholds::NONE,
        },
        MetricSpec {
            name: CPU_USAGE,
            unit: "%",
            description: "Current CPU utilization across all servers",
            baseline: 68.0,
            max_step: 7.5,
            thresholds: Thresholds::new(60.0, 80.0),
        },
        MetricSpec {
            name: MEMORY_USAGE,
            unit: "%",
            description: "Allocated memory in use",
            baseline: 54.0,
            max_step: 5.0,
            thresholds: Thresholds::NONE,
        },
        MetricSpec {
            name: ERROR_RATE,
            unit: "%",
            description: "Percentage of failed transactions",
            baseline: 0.02,
            max_step: 0.025,
            thresholds: Thresholds::new(0.1, 0.5),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn names_are_unique() {
        let catalog = default_catalog();
        let names: HashSet<&str> = catalog.iter().map(|spec| spec.name).collect();
        assert_eq!(names.len(), catalog.len());
        assert_eq!(catalog.len(), 6);
    }

    #[test]
    fn only_cpu_and_error_rate_carry_thresholds() {
        let guarded: Vec<&str> = default_catalog()
            .iter()
            .filter(|spec| spec.thresholds != Thresholds::NONE)
            .map(|spec| spec.name)
            .collect();
        assert_eq!(guarded, vec![CPU_USAGE, ERROR_RATE]);
    }

    #[test]
    fn descriptions_match_the_dashboard_copy() {
        let catalog = default_catalog();
        let describe = |name: &str| {
            catalog
                .iter()
                .find(|spec| spec.name == name)
                .map(|spec| spec.description)
        };
        assert_eq!(
            describe(API_LATENCY),
            Some("Average response time for API requests")
        );
        assert_eq!(
            describe(MODEL_INFERENCE_TIME),
            Some("Time to generate decision for single applicant")
        );
        assert_eq!(describe(ERROR_RATE), Some("Percentage of failed transactions"));
    }
}
