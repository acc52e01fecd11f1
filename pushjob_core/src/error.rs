use thiserror::Error;

#[derive(Error, Debug)]
pub enum PushJobError {
    #[error("Metric already registered: {0}")]
    DuplicateRegistration(String),

    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("Encoding error: {0}")]
    Encode(String),

    #[error("Gateway {target} answered with status {status}")]
    Gateway { target: String, status: u16 },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PushJobError {
    /// Errors that must stop the process during startup.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PushJobError::DuplicateRegistration(_)
                | PushJobError::InvalidConfig(_)
                | PushJobError::Bind { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, PushJobError>;
