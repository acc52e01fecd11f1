pub mod exporters;
pub mod instrument;
pub mod push;
pub mod registry;

pub use exporters::{PrometheusExporter, CONTENT_TYPE};
pub use instrument::{instrument, instrument_fallible};
pub use push::{PushGateway, PushStats, PushStatsSnapshot, PushTarget, Pusher};
pub use registry::{MetricSample, MetricsRegistry, ServiceMetrics};
