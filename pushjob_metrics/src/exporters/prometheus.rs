use crate::registry::MetricsRegistry;
use prometheus::{Encoder, TextEncoder};
use pushjob_core::{PushJobError, Result};

/// Content type of the text exposition format, shared by pull and push.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4";

pub struct PrometheusExporter;

impl PrometheusExporter {
    pub fn format(registry: &MetricsRegistry) -> Result<String> {
        let encoder = TextEncoder::new();
        let families = registry.gather();

        let mut buffer = Vec::new();
        encoder.encode(&families, &mut buffer)?;

        String::from_utf8(buffer).map_err(|e| PushJobError::Encode(e.to_string()))
    }
}
