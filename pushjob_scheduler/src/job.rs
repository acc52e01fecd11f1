use pushjob_metrics::{instrument, MetricsRegistry};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;

pub type Work = Arc<dyn Fn() -> i64 + Send + Sync>;

/// A named, zero-argument unit of work.
#[derive(Clone)]
pub struct Job {
    name: String,
    work: Work,
}

impl Job {
    pub fn new<F>(name: impl Into<String>, work: F) -> Self
    where
        F: Fn() -> i64 + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            work: Arc::new(work),
        }
    }

    /// The placeholder job: sleeps 1 to 7 ms and reports how long it slept.
    pub fn placeholder(name: impl Into<String>) -> Self {
        Self::new(name, random_rows)
    }

    /// Wraps the work so every call is timed and counted under the job name.
    pub fn instrumented(self, registry: &MetricsRegistry) -> Self {
        let work = self.work;
        let instrumented = instrument(registry.clone(), self.name.clone(), move || work());

        Self {
            name: self.name,
            work: Arc::new(instrumented),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn work(&self) -> Work {
        self.work.clone()
    }

    pub fn call(&self) -> i64 {
        (self.work)()
    }
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job").field("name", &self.name).finish()
    }
}

pub fn random_rows() -> i64 {
    let n = rand::thread_rng().gen_range(1..=7u64);
    std::thread::sleep(Duration::from_millis(n));
    n as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_rows_range() {
        for _ in 0..20 {
            let n = random_rows();
            assert!((1..=7).contains(&n));
        }
    }

    #[test]
    fn test_instrumented_job_records_metrics() {
        let registry = MetricsRegistry::new().unwrap();
        let job = Job::placeholder("action-1").instrumented(&registry);

        let value = job.call();

        let sample = registry.sample("action-1").unwrap();
        assert_eq!(job.name(), "action-1");
        assert_eq!(sample.count, 1);
        assert_eq!(sample.last_value, value);
        assert!(sample.duration_sum_ms >= value as f64);
    }

    #[test]
    fn test_plain_job_records_nothing() {
        let registry = MetricsRegistry::new().unwrap();
        let job = Job::new("action-1", || 3);

        assert_eq!(job.call(), 3);
        assert!(registry.samples().is_empty());
    }
}
