use crate::error::{PushJobError, Result};
use std::net::SocketAddr;
use std::time::Duration;

pub const GATEWAY_ENV: &str = "APP_PUSH_GATEWAY";
pub const INSTANCE_ENV: &str = "APP_INSTANCE";

pub const DEFAULT_GATEWAY: &str = "http://localhost:9091";
pub const DEFAULT_JOB: &str = "app-service";
pub const DEFAULT_JOB_NAME: &str = "action-1";
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_PUSH_TIMEOUT: Duration = Duration::from_secs(10);

/// Where and how often metrics are pushed. Fixed once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushConfig {
    instance: String,
    job: String,
    interval: Duration,
    url: String,
}

impl PushConfig {
    pub fn builder() -> PushConfigBuilder {
        PushConfigBuilder::default()
    }

    /// Reads `APP_PUSH_GATEWAY` and `APP_INSTANCE`, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::builder().with_lookup(lookup).build()
    }

    pub fn instance(&self) -> &str {
        &self.instance
    }

    pub fn job(&self) -> &str {
        &self.job
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[derive(Default)]
pub struct PushConfigBuilder {
    instance: Option<String>,
    job: Option<String>,
    interval: Option<Duration>,
    url: Option<String>,
}

impl PushConfigBuilder {
    /// Seeds url and instance from raw environment values. Nothing is
    /// validated until `build`, so later setters can replace a bad value.
    pub fn with_lookup<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(GATEWAY_ENV).filter(|v| !v.is_empty()) {
            self.url = Some(url);
        }
        if let Some(instance) = lookup(INSTANCE_ENV) {
            self.instance = Some(instance);
        }
        self
    }

    pub fn instance(mut self, instance: impl Into<String>) -> Self {
        self.instance = Some(instance.into());
        self
    }

    pub fn job(mut self, job: impl Into<String>) -> Self {
        self.job = Some(job.into());
        self
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn build(self) -> Result<PushConfig> {
        let config = PushConfig {
            instance: self.instance.unwrap_or_default(),
            job: self.job.unwrap_or_else(|| DEFAULT_JOB.to_string()),
            interval: self.interval.unwrap_or(DEFAULT_INTERVAL),
            url: self.url.unwrap_or_else(|| DEFAULT_GATEWAY.to_string()),
        };

        if config.job.is_empty() {
            return Err(PushJobError::InvalidConfig(
                "push job label cannot be empty".to_string(),
            ));
        }

        if config.interval.is_zero() {
            return Err(PushJobError::InvalidConfig(
                "push interval must be > 0".to_string(),
            ));
        }

        let parsed = reqwest::Url::parse(&config.url).map_err(|e| {
            PushJobError::InvalidConfig(format!("Invalid gateway url '{}': {}", config.url, e))
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(PushJobError::InvalidConfig(format!(
                "Gateway url '{}' must use http or https",
                config.url
            )));
        }

        Ok(config)
    }
}

/// The scheduled unit of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobConfig {
    pub name: String,
    pub interval: Duration,
}

impl JobConfig {
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(PushJobError::InvalidConfig(
                "job name cannot be empty".to_string(),
            ));
        }
        if self.interval.is_zero() {
            return Err(PushJobError::InvalidConfig(format!(
                "job '{}' interval must be > 0",
                self.name
            )));
        }
        Ok(())
    }
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_JOB_NAME.to_string(),
            interval: DEFAULT_INTERVAL,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub listen_addr: SocketAddr,
    pub shutdown_timeout: Duration,
    pub push_timeout: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            push_timeout: DEFAULT_PUSH_TIMEOUT,
        }
    }
}

/// Everything the coordinator needs to start the service.
#[derive(Debug, Clone)]
pub struct Settings {
    pub push: PushConfig,
    pub job: JobConfig,
    pub service: ServiceConfig,
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        self.job.validate()?;
        if self.service.shutdown_timeout.is_zero() {
            return Err(PushJobError::InvalidConfig(
                "shutdown timeout must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}
