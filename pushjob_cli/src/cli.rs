use clap::Parser;
use pushjob_core::config::{
    DEFAULT_JOB, DEFAULT_JOB_NAME, DEFAULT_LISTEN_ADDR, DEFAULT_PUSH_TIMEOUT,
    DEFAULT_SHUTDOWN_TIMEOUT,
};
use pushjob_core::{JobConfig, PushConfig, Result, ServiceConfig, Settings};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;

#[derive(Parser, Debug)]
#[command(name = "pushjob")]
#[command(about = "Runs a scheduled job and delivers its metrics by push and pull", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Pushgateway base url [default: $APP_PUSH_GATEWAY or http://localhost:9091]
    #[arg(long)]
    pub gateway: Option<String>,

    /// Instance grouping label [default: $APP_INSTANCE or empty]
    #[arg(long)]
    pub instance: Option<String>,

    /// Job grouping label used when pushing
    #[arg(long, default_value = DEFAULT_JOB)]
    pub job: String,

    /// How often metrics are pushed
    #[arg(long, default_value = "5s", value_parser = humantime::parse_duration)]
    pub push_interval: Duration,

    /// Name of the scheduled work item
    #[arg(long, default_value = DEFAULT_JOB_NAME)]
    pub job_name: String,

    /// How often the scheduled work runs
    #[arg(long, default_value = "5s", value_parser = humantime::parse_duration)]
    pub job_interval: Duration,

    /// Address of the pull endpoint
    #[arg(long, env = "PUSHJOB_LISTEN", default_value = DEFAULT_LISTEN_ADDR)]
    pub listen: SocketAddr,

    /// Upper bound on draining the pull endpoint at shutdown
    #[arg(long, value_parser = humantime::parse_duration)]
    pub shutdown_timeout: Option<Duration>,

    /// Per-request timeout when talking to the gateway
    #[arg(long, value_parser = humantime::parse_duration)]
    pub push_timeout: Option<Duration>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub log_json: bool,

    /// Write logs to a daily rolling file in this directory instead of stdout
    #[arg(long)]
    pub log_dir: Option<PathBuf>,
}

impl Cli {
    pub fn log_level(&self) -> Level {
        if self.verbose {
            Level::DEBUG
        } else if self.quiet {
            Level::ERROR
        } else {
            Level::INFO
        }
    }

    pub fn settings(&self) -> Result<Settings> {
        self.settings_from(|key| std::env::var(key).ok())
    }

    /// Layers command line flags over raw environment values and validates
    /// the merged result once.
    pub fn settings_from<F>(&self, lookup: F) -> Result<Settings>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut push = PushConfig::builder()
            .with_lookup(lookup)
            .job(self.job.as_str())
            .interval(self.push_interval);
        if let Some(url) = &self.gateway {
            push = push.url(url.as_str());
        }
        if let Some(instance) = &self.instance {
            push = push.instance(instance.as_str());
        }
        let push = push.build()?;

        let settings = Settings {
            push,
            job: JobConfig {
                name: self.job_name.clone(),
                interval: self.job_interval,
            },
            service: ServiceConfig {
                listen_addr: self.listen,
                shutdown_timeout: self.shutdown_timeout.unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT),
                push_timeout: self.push_timeout.unwrap_or(DEFAULT_PUSH_TIMEOUT),
            },
        };
        settings.validate()?;

        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pushjob_core::config::{GATEWAY_ENV, INSTANCE_ENV};
    use pushjob_core::PushJobError;

    fn env(key: &str) -> Option<String> {
        match key {
            GATEWAY_ENV => Some("http://env-gateway:9091".to_string()),
            INSTANCE_ENV => Some("env-instance".to_string()),
            _ => None,
        }
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["pushjob", "--listen", "0.0.0.0:8080"]).unwrap();
        let settings = cli.settings_from(env).unwrap();

        assert_eq!(settings.push.url(), "http://env-gateway:9091");
        assert_eq!(settings.push.instance(), "env-instance");
        assert_eq!(settings.push.job(), "app-service");
        assert_eq!(settings.push.interval(), Duration::from_secs(5));
        assert_eq!(settings.job.name, "action-1");
        assert_eq!(settings.job.interval, Duration::from_secs(5));
        assert_eq!(settings.service.listen_addr.port(), 8080);
        assert_eq!(settings.service.shutdown_timeout, Duration::from_secs(5));
        assert_eq!(cli.log_level(), Level::INFO);
    }

    #[test]
    fn test_flags_override_environment() {
        let cli = Cli::try_parse_from([
            "pushjob",
            "--gateway",
            "http://flag-gateway:9091",
            "--instance",
            "",
            "--push-interval",
            "250ms",
            "--job-interval",
            "1m",
            "--verbose",
        ])
        .unwrap();
        let settings = cli.settings_from(env).unwrap();

        assert_eq!(settings.push.url(), "http://flag-gateway:9091");
        assert_eq!(settings.push.instance(), "");
        assert_eq!(settings.push.interval(), Duration::from_millis(250));
        assert_eq!(settings.job.interval, Duration::from_secs(60));
        assert_eq!(cli.log_level(), Level::DEBUG);
    }

    #[test]
    fn test_gateway_flag_replaces_invalid_environment() {
        let cli = Cli::try_parse_from(["pushjob", "--gateway", "http://good:9091"]).unwrap();
        let settings = cli
            .settings_from(|key| (key == GATEWAY_ENV).then(|| "not a url".to_string()))
            .unwrap();

        assert_eq!(settings.push.url(), "http://good:9091");
    }

    #[test]
    fn test_invalid_environment_without_flag_is_rejected() {
        let cli = Cli::try_parse_from(["pushjob"]).unwrap();
        let result = cli.settings_from(|key| (key == GATEWAY_ENV).then(|| "not a url".to_string()));

        assert!(matches!(result, Err(PushJobError::InvalidConfig(_))));
    }

    #[test]
    fn test_invalid_duration_is_rejected() {
        assert!(Cli::try_parse_from(["pushjob", "--push-interval", "often"]).is_err());
    }

    #[test]
    fn test_zero_job_interval_is_rejected() {
        let cli = Cli::try_parse_from(["pushjob", "--job-interval", "0s"]).unwrap();
        assert!(cli.settings_from(env).is_err());
    }

    #[test]
    fn test_verbose_and_quiet_conflict() {
        assert!(Cli::try_parse_from(["pushjob", "--verbose", "--quiet"]).is_err());
    }
}
