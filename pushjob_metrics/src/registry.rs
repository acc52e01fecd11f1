use prometheus::proto::{Metric, MetricFamily};
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, IntGaugeVec, Opts, Registry};
use pushjob_core::{PushJobError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

pub const COUNT_METRIC: &str = "service_total_count";
pub const DURATION_METRIC: &str = "service_duration_milliseconds";
pub const LAST_VALUE_METRIC: &str = "service_rows";
pub const FAILURE_METRIC: &str = "service_failures_total";
pub const NAME_LABEL: &str = "name";

pub const DURATION_BUCKETS: [f64; 10] = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0];

/// Read-only view of one work item's facets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub name: String,
    pub count: u64,
    pub last_value: i64,
    pub observations: u64,
    pub duration_sum_ms: f64,
    pub failures: u64,
}

/// The per-work-item metric vectors, all keyed by the `name` label.
#[derive(Clone)]
pub struct ServiceMetrics {
    count: IntCounterVec,
    duration: HistogramVec,
    last_value: IntGaugeVec,
    failures: IntCounterVec,
}

impl ServiceMetrics {
    pub fn new() -> Result<Self> {
        let count = IntCounterVec::new(
            Opts::new(COUNT_METRIC, "Completed invocations per work item"),
            &[NAME_LABEL],
        )?;

        let duration = HistogramVec::new(
            HistogramOpts::new(DURATION_METRIC, "Work item latency in milliseconds")
                .buckets(DURATION_BUCKETS.to_vec()),
            &[NAME_LABEL],
        )?;

        let last_value = IntGaugeVec::new(
            Opts::new(LAST_VALUE_METRIC, "Value returned by the latest invocation"),
            &[NAME_LABEL],
        )?;

        let failures = IntCounterVec::new(
            Opts::new(FAILURE_METRIC, "Failed invocations per work item"),
            &[NAME_LABEL],
        )?;

        Ok(Self {
            count,
            duration,
            last_value,
            failures,
        })
    }

    /// Registers every vector. A second registration into the same registry
    /// is a configuration error and fails.
    pub fn register(&self, registry: &Registry) -> Result<()> {
        register_one(registry, COUNT_METRIC, Box::new(self.count.clone()))?;
        register_one(registry, DURATION_METRIC, Box::new(self.duration.clone()))?;
        register_one(registry, LAST_VALUE_METRIC, Box::new(self.last_value.clone()))?;
        register_one(registry, FAILURE_METRIC, Box::new(self.failures.clone()))?;
        Ok(())
    }
}

fn register_one(
    registry: &Registry,
    name: &str,
    collector: Box<dyn prometheus::core::Collector>,
) -> Result<()> {
    match registry.register(collector) {
        Ok(()) => Ok(()),
        Err(prometheus::Error::AlreadyReg) => {
            Err(PushJobError::DuplicateRegistration(name.to_string()))
        }
        Err(e) => Err(e.into()),
    }
}

/// Shared, thread-safe metrics store. Cloning is cheap and every clone
/// writes into the same underlying registry.
#[derive(Clone)]
pub struct MetricsRegistry {
    registry: Arc<Registry>,
    metrics: ServiceMetrics,
}

impl MetricsRegistry {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        let metrics = ServiceMetrics::new()?;
        metrics.register(&registry)?;

        #[cfg(target_os = "linux")]
        register_one(
            &registry,
            "process",
            Box::new(prometheus::process_collector::ProcessCollector::for_self()),
        )?;

        Ok(Self {
            registry: Arc::new(registry),
            metrics,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn observe_duration(&self, name: &str, millis: f64) {
        self.metrics
            .duration
            .with_label_values(&[name])
            .observe(millis);
    }

    pub fn set_last_value(&self, name: &str, value: i64) {
        self.metrics.last_value.with_label_values(&[name]).set(value);
    }

    pub fn inc_count(&self, name: &str) {
        self.metrics.count.with_label_values(&[name]).inc();
    }

    pub fn inc_failure(&self, name: &str) {
        self.metrics.failures.with_label_values(&[name]).inc();
    }

    pub fn gather(&self) -> Vec<MetricFamily> {
        self.registry.gather()
    }

    /// Snapshot of a single work item, `None` if it has never been recorded.
    pub fn sample(&self, name: &str) -> Option<MetricSample> {
        self.samples().into_iter().find(|s| s.name == name)
    }

    /// Snapshot of every recorded work item, ordered by name.
    ///
    /// Reads go through `gather`, so looking up a name never creates a series.
    pub fn samples(&self) -> Vec<MetricSample> {
        let mut samples: BTreeMap<String, MetricSample> = BTreeMap::new();

        for family in self.gather() {
            for metric in family.get_metric() {
                let Some(name) = name_label(metric) else {
                    continue;
                };

                let sample = samples
                    .entry(name.to_string())
                    .or_insert_with(|| MetricSample {
                        name: name.to_string(),
                        ..Default::default()
                    });

                match family.get_name() {
                    COUNT_METRIC => sample.count = metric.get_counter().get_value() as u64,
                    LAST_VALUE_METRIC => {
                        sample.last_value = metric.get_gauge().get_value() as i64
                    }
                    DURATION_METRIC => {
                        let histogram = metric.get_histogram();
                        sample.observations = histogram.get_sample_count();
                        sample.duration_sum_ms = histogram.get_sample_sum();
                    }
                    FAILURE_METRIC => sample.failures = metric.get_counter().get_value() as u64,
                    _ => {}
                }
            }
        }

        samples.into_values().collect()
    }
}

fn name_label(metric: &Metric) -> Option<&str> {
    metric
        .get_label()
        .iter()
        .find(|pair| pair.get_name() == NAME_LABEL)
        .map(|pair| pair.get_value())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_creation() {
        let registry = MetricsRegistry::new().unwrap();
        assert!(registry.samples().is_empty());
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let registry = Registry::new();
        let metrics = ServiceMetrics::new().unwrap();
        metrics.register(&registry).unwrap();

        let err = metrics.register(&registry).unwrap_err();
        assert!(matches!(
            err,
            PushJobError::DuplicateRegistration(ref name) if name == COUNT_METRIC
        ));

        let other = ServiceMetrics::new().unwrap();
        assert!(other.register(&registry).is_err());
    }

    #[test]
    fn test_facets_are_keyed_by_name() {
        let registry = MetricsRegistry::new().unwrap();

        registry.inc_count("action-1");
        registry.inc_count("action-1");
        registry.set_last_value("action-1", 5);
        registry.observe_duration("action-1", 2.5);
        registry.inc_count("action-2");

        let first = registry.sample("action-1").unwrap();
        assert_eq!(first.count, 2);
        assert_eq!(first.last_value, 5);
        assert_eq!(first.observations, 1);
        assert_eq!(first.duration_sum_ms, 2.5);

        let second = registry.sample("action-2").unwrap();
        assert_eq!(second.count, 1);
        assert_eq!(second.observations, 0);

        let names: Vec<String> = registry.samples().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["action-1", "action-2"]);
    }

    #[test]
    fn test_last_value_is_overwritten() {
        let registry = MetricsRegistry::new().unwrap();

        registry.set_last_value("action-1", 7);
        registry.set_last_value("action-1", 2);

        assert_eq!(registry.sample("action-1").unwrap().last_value, 2);
    }

    #[test]
    fn test_reading_does_not_create_series() {
        let registry = MetricsRegistry::new().unwrap();

        assert!(registry.sample("missing").is_none());
        assert!(registry.sample("missing").is_none());
        assert!(registry.samples().is_empty());
    }

    #[test]
    fn test_clones_share_state() {
        let registry = MetricsRegistry::new().unwrap();
        let clone = registry.clone();

        clone.inc_count("action-1");

        assert_eq!(registry.sample("action-1").unwrap().count, 1);
    }

    #[test]
    fn test_concurrent_writers() {
        let registry = MetricsRegistry::new().unwrap();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    for _ in 0..250 {
                        registry.inc_count("action-1");
                        registry.observe_duration("action-1", 1.0);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let sample = registry.sample("action-1").unwrap();
        assert_eq!(sample.count, 1000);
        assert_eq!(sample.observations, 1000);
    }
}
