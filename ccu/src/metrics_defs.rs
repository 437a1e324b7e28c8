//! Metrics definitions for the CCU client.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricType {
    Counter,
    Histogram,
}

impl MetricType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            MetricType::Counter => "Counter",
            MetricType::Histogram => "Histogram",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MetricDef {
    pub name: &'static str,
    pub metric_type: MetricType,
    pub description: &'static str,
}

#[macro_export]
macro_rules! counter {
    ($def:expr) => {
        metrics::counter!($def.name)
    };
}

#[macro_export]
macro_rules! histogram {
    ($def:expr) => {
        metrics::histogram!($def.name)
    };
}

pub const PURGE_SUBMITTED: MetricDef = MetricDef {
    name: "ccu.purge.submitted",
    metric_type: MetricType::Counter,
    description: "Number of purge requests accepted by the CCU API",
};

pub const PURGE_FAILED: MetricDef = MetricDef {
    name: "ccu.purge.failed",
    metric_type: MetricType::Counter,
    description: "Number of purge requests that were rejected or never reached the CCU API",
};

pub const URLS_QUEUED: MetricDef = MetricDef {
    name: "ccu.purge.urls",
    metric_type: MetricType::Histogram,
    description: "Number of URLs sent in a single purge request",
};

pub const INVALID_PATHS: MetricDef = MetricDef {
    name: "ccu.purge.invalid_paths",
    metric_type: MetricType::Counter,
    description: "Number of user supplied paths rejected during normalization",
};

pub const STATUS_CHECKS: MetricDef = MetricDef {
    name: "ccu.status.checks",
    metric_type: MetricType::Counter,
    description: "Number of purge status checks made against the CCU API",
};

pub const REQUEST_DURATION: MetricDef = MetricDef {
    name: "ccu.request.duration",
    metric_type: MetricType::Histogram,
    description: "Round trip time of a CCU API request in seconds",
};

pub const ALL_METRICS: &[MetricDef] = &[
    PURGE_SUBMITTED,
    PURGE_FAILED,
    URLS_QUEUED,
    INVALID_PATHS,
    STATUS_CHECKS,
    REQUEST_DURATION,
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_metric_names_are_unique() {
        let names: HashSet<_> = ALL_METRICS.iter().map(|m| m.name).collect();
        assert_eq!(names.len(), ALL_METRICS.len());
        assert!(ALL_METRICS.iter().all(|m| m.name.starts_with("ccu.")));
    }
}
