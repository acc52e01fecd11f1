pub mod config;
pub mod error;
pub mod lifecycle;

pub use config::{JobConfig, PushConfig, ServiceConfig, Settings};
pub use error::{PushJobError, Result};
pub use lifecycle::{shutdown_signal, Lifecycle, LifecycleState};
