use crate::exporters::{PrometheusExporter, CONTENT_TYPE};
use crate::registry::MetricsRegistry;
use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use pushjob_core::{PushConfig, PushJobError, Result};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const BASE64_SUFFIX: &str = "@base64";

/// Destination for encoded metric payloads.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PushTarget: Send + Sync {
    /// Delivers one exposition-format payload.
    async fn push(&self, body: String) -> Result<()>;
}

/// Pushgateway client grouping metrics under `job` and `instance`.
pub struct PushGateway {
    client: reqwest::Client,
    endpoint: String,
}

impl PushGateway {
    pub fn new(config: &PushConfig, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            endpoint: grouping_url(config.url(), config.job(), config.instance()),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl PushTarget for PushGateway {
    async fn push(&self, body: String) -> Result<()> {
        let response = self
            .client
            .put(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, CONTENT_TYPE)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PushJobError::Gateway {
                target: self.endpoint.clone(),
                status: status.as_u16(),
            });
        }

        Ok(())
    }
}

/// Builds `<url>/metrics/job/<job>/instance/<instance>`.
pub fn grouping_url(base: &str, job: &str, instance: &str) -> String {
    format!(
        "{}/metrics/{}/{}",
        base.trim_end_matches('/'),
        encode_component("job", job),
        encode_component("instance", instance)
    )
}

/// Encodes one grouping label as a path segment pair.
///
/// Values that are empty or contain `/` cannot be plain path segments and are
/// sent base64 encoded with the `@base64` suffix on the label name.
fn encode_component(label: &str, value: &str) -> String {
    if value.is_empty() {
        format!("{}{}/=", label, BASE64_SUFFIX)
    } else if value.contains('/') {
        format!(
            "{}{}/{}",
            label,
            BASE64_SUFFIX,
            URL_SAFE_NO_PAD.encode(value.as_bytes())
        )
    } else {
        format!("{}/{}", label, urlencoding::encode(value))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PushStatsSnapshot {
    pub attempts: u64,
    pub successes: u64,
    pub failures: u64,
    pub last_success: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

/// Delivery bookkeeping, written by the pusher and read by health checks.
#[derive(Debug, Clone, Default)]
pub struct PushStats {
    inner: Arc<RwLock<PushStatsSnapshot>>,
}

impl PushStats {
    pub fn new() -> Self {
        Self::default()
    }

    async fn record_success(&self) {
        let mut stats = self.inner.write().await;
        stats.attempts += 1;
        stats.successes += 1;
        stats.last_success = Some(Utc::now());
    }

    async fn record_failure(&self, error: &PushJobError) {
        let mut stats = self.inner.write().await;
        stats.attempts += 1;
        stats.failures += 1;
        stats.last_error = Some(error.to_string());
    }

    pub async fn snapshot(&self) -> PushStatsSnapshot {
        self.inner.read().await.clone()
    }
}

/// Periodically pushes the whole registry to a [`PushTarget`].
pub struct Pusher<T> {
    registry: MetricsRegistry,
    target: T,
    interval: Duration,
    stats: PushStats,
}

impl<T> Pusher<T>
where
    T: PushTarget + 'static,
{
    pub fn new(registry: MetricsRegistry, target: T, interval: Duration) -> Self {
        Self {
            registry,
            target,
            interval,
            stats: PushStats::new(),
        }
    }

    pub fn stats(&self) -> PushStats {
        self.stats.clone()
    }

    /// Encodes the current registry state and hands it to the target once.
    pub async fn push_once(&self) -> Result<()> {
        let body = PrometheusExporter::format(&self.registry)?;
        self.target.push(body).await
    }

    /// Pushes on every tick until `token` is cancelled. The first push happens
    /// one interval after start. Failures are logged and counted, never retried.
    pub async fn run(self, token: CancellationToken) {
        info!("Starting metrics pusher (interval: {:?})", self.interval);

        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;

                _ = token.cancelled() => {
                    break;
                }

                _ = ticker.tick() => {
                    match self.push_once().await {
                        Ok(()) => {
                            debug!("Pushed metrics");
                            self.stats.record_success().await;
                        }
                        Err(e) => {
                            warn!("Could not push to Pushgateway: {}", e);
                            self.stats.record_failure(&e).await;
                        }
                    }
                }
            }
        }

        info!("Metrics pusher stopped");
    }

    pub fn spawn(self, token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(token))
    }
}
