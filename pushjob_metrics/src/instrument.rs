//! Timing and counting wrappers for zero-argument work functions.

use crate::registry::MetricsRegistry;
use std::sync::Arc;
use std::time::Instant;

/// Records the elapsed time into the duration histogram when dropped, so the
/// observation lands on every exit path, unwinding included.
struct DurationGuard<'a> {
    registry: &'a MetricsRegistry,
    name: &'a str,
    start: Instant,
}

impl<'a> DurationGuard<'a> {
    fn start(registry: &'a MetricsRegistry, name: &'a str) -> Self {
        Self {
            registry,
            name,
            start: Instant::now(),
        }
    }
}

impl Drop for DurationGuard<'_> {
    fn drop(&mut self) {
        let millis = self.start.elapsed().as_secs_f64() * 1e3;
        self.registry.observe_duration(self.name, millis);
    }
}

/// Wraps `work` so that each call records its latency, stores the returned
/// value as the last value and bumps the invocation count under `name`.
pub fn instrument<F>(
    registry: MetricsRegistry,
    name: impl Into<String>,
    work: F,
) -> impl Fn() -> i64 + Send + Sync + 'static
where
    F: Fn() -> i64 + Send + Sync + 'static,
{
    let name: Arc<str> = Arc::from(name.into());

    move || {
        let _timer = DurationGuard::start(&registry, &name);

        let value = work();
        registry.set_last_value(&name, value);
        registry.inc_count(&name);

        value
    }
}

/// Like [`instrument`] for work that can fail.
///
/// Latency is recorded for every call. A failed call increments the failure
/// counter and leaves both the count and the last value untouched.
pub fn instrument_fallible<F, E>(
    registry: MetricsRegistry,
    name: impl Into<String>,
    work: F,
) -> impl Fn() -> Result<i64, E> + Send + Sync + 'static
where
    F: Fn() -> Result<i64, E> + Send + Sync + 'static,
{
    let name: Arc<str> = Arc::from(name.into());

    move || {
        let _timer = DurationGuard::start(&registry, &name);

        match work() {
            Ok(value) => {
                registry.set_last_value(&name, value);
                registry.inc_count(&name);
                Ok(value)
            }
            Err(e) => {
                registry.inc_failure(&name);
                Err(e)
            }
        }
    }
}
