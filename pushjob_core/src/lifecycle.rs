use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Idle,
    Running,
    ShuttingDown,
    Stopped,
}

/// Process-wide state machine: `Idle -> Running -> ShuttingDown -> Stopped`.
///
/// Every transition is a compare-and-set on the current state, so only the
/// first caller of [`Lifecycle::begin_shutdown`] wins and later calls are no-ops.
#[derive(Debug, Clone)]
pub struct Lifecycle {
    state: Arc<watch::Sender<LifecycleState>>,
}

impl Lifecycle {
    pub fn new() -> Self {
        let (state, _) = watch::channel(LifecycleState::Idle);
        Self {
            state: Arc::new(state),
        }
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }

    pub fn mark_running(&self) -> bool {
        self.transition(LifecycleState::Idle, LifecycleState::Running)
    }

    pub fn begin_shutdown(&self) -> bool {
        self.transition(LifecycleState::Running, LifecycleState::ShuttingDown)
    }

    pub fn mark_stopped(&self) -> bool {
        self.transition(LifecycleState::ShuttingDown, LifecycleState::Stopped)
    }

    fn transition(&self, from: LifecycleState, to: LifecycleState) -> bool {
        let changed = self.state.send_if_modified(|current| {
            if *current == from {
                *current = to;
                true
            } else {
                false
            }
        });

        if changed {
            info!("Lifecycle {:?} -> {:?}", from, to);
        }
        changed
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolves on the first SIGINT or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install SIGINT handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT, starting graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_happy_path() {
        let lifecycle = Lifecycle::new();
        assert_eq!(lifecycle.state(), LifecycleState::Idle);

        assert!(lifecycle.mark_running());
        assert!(lifecycle.begin_shutdown());
        assert!(lifecycle.mark_stopped());
        assert_eq!(lifecycle.state(), LifecycleState::Stopped);
    }

    #[test]
    fn test_shutdown_happens_once() {
        let lifecycle = Lifecycle::new();
        lifecycle.mark_running();

        assert!(lifecycle.begin_shutdown());
        assert!(!lifecycle.begin_shutdown());
        assert_eq!(lifecycle.state(), LifecycleState::ShuttingDown);
    }

    #[test]
    fn test_out_of_order_transitions_are_ignored() {
        let lifecycle = Lifecycle::new();

        assert!(!lifecycle.begin_shutdown());
        assert!(!lifecycle.mark_stopped());
        assert_eq!(lifecycle.state(), LifecycleState::Idle);
    }

    #[tokio::test]
    async fn test_subscribers_observe_transitions() {
        let lifecycle = Lifecycle::new();
        let mut rx = lifecycle.subscribe();

        lifecycle.mark_running();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), LifecycleState::Running);

        let shared = lifecycle.clone();
        shared.begin_shutdown();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), LifecycleState::ShuttingDown);
    }
}
