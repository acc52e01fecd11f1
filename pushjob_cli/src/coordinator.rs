use crate::server::{self, AppState};
use pushjob_core::{Lifecycle, PushJobError, Result, Settings};
use pushjob_metrics::{MetricsRegistry, PushGateway, PushStats, Pusher};
use pushjob_scheduler::{Job, Scheduler};
use std::future::{Future, IntoFuture};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Wires the registry, the scheduled job, the pusher and the pull endpoint
/// together under one cancellation token.
pub struct Coordinator {
    settings: Settings,
    registry: MetricsRegistry,
    lifecycle: Lifecycle,
    token: CancellationToken,
}

impl Coordinator {
    pub fn new(settings: Settings) -> Result<Self> {
        settings.validate()?;
        let registry = MetricsRegistry::new()?;

        Ok(Self {
            settings,
            registry,
            lifecycle: Lifecycle::new(),
            token: CancellationToken::new(),
        })
    }

    pub fn registry(&self) -> &MetricsRegistry {
        &self.registry
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    /// Binds the pull endpoint, then starts the pusher, the scheduler and the
    /// HTTP listener. Nothing is spawned if binding fails.
    pub async fn start(self) -> Result<RunningService> {
        let push = &self.settings.push;
        let gateway = PushGateway::new(push, self.settings.service.push_timeout)?;

        let addr = self.settings.service.listen_addr;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| PushJobError::Bind { addr, source })?;
        let local_addr = listener.local_addr()?;

        info!(
            endpoint = %gateway.endpoint(),
            "Pushing metrics every {:?}",
            push.interval()
        );
        let pusher = Pusher::new(self.registry.clone(), gateway, push.interval());
        let push_stats = pusher.stats();
        let pusher = pusher.spawn(self.token.clone());

        let job = Job::placeholder(self.settings.job.name.as_str()).instrumented(&self.registry);
        let scheduler = Scheduler::new(job, self.settings.job.interval).spawn(self.token.clone());

        let app = server::router(AppState::new(
            self.registry.clone(),
            push_stats.clone(),
            self.lifecycle.clone(),
        ));
        let server_token = self.token.clone();
        let server = spawn_listener(
            self.token.clone(),
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { server_token.cancelled().await })
                .into_future(),
        );

        info!("Listening on {}", local_addr);
        self.lifecycle.mark_running();

        Ok(RunningService {
            local_addr,
            registry: self.registry,
            lifecycle: self.lifecycle,
            token: self.token,
            push_stats,
            shutdown_timeout: self.settings.service.shutdown_timeout,
            scheduler,
            pusher,
            server,
        })
    }
}

/// Runs the pull endpoint. A listener failure cancels `token` so the rest of
/// the service stops with it.
fn spawn_listener<F>(token: CancellationToken, serve: F) -> JoinHandle<std::io::Result<()>>
where
    F: Future<Output = std::io::Result<()>> + Send + 'static,
{
    tokio::spawn(async move {
        let result = serve.await;
        if let Err(e) = &result {
            error!("HTTP listener failed: {}", e);
            token.cancel();
        }
        result
    })
}

pub struct RunningService {
    local_addr: SocketAddr,
    registry: MetricsRegistry,
    lifecycle: Lifecycle,
    token: CancellationToken,
    push_stats: PushStats,
    shutdown_timeout: Duration,
    scheduler: JoinHandle<u64>,
    pusher: JoinHandle<()>,
    server: JoinHandle<std::io::Result<()>>,
}

impl RunningService {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn registry(&self) -> &MetricsRegistry {
        &self.registry
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    pub fn push_stats(&self) -> &PushStats {
        &self.push_stats
    }

    /// The root token; cancelling it stops the service like a signal would.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Blocks until `shutdown` resolves or the root token is cancelled, then
    /// stops every loop.
    pub async fn wait<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            _ = shutdown => {
                info!("Shutdown requested");
            }
            _ = self.token.cancelled() => {
                info!("Root context cancelled");
            }
        }

        self.stop().await;
    }

    async fn stop(mut self) {
        if !self.lifecycle.begin_shutdown() {
            return;
        }
        self.token.cancel();

        match tokio::time::timeout(self.shutdown_timeout, &mut self.server).await {
            Ok(Ok(Ok(()))) => info!("HTTP listener stopped"),
            Ok(Ok(Err(_))) => warn!("HTTP listener had already failed"),
            Ok(Err(e)) => error!("HTTP listener task failed: {}", e),
            Err(_) => {
                warn!(
                    "HTTP listener did not drain within {:?}, aborting",
                    self.shutdown_timeout
                );
                self.server.abort();
            }
        }

        let loops = futures::future::join(&mut self.scheduler, &mut self.pusher);
        match tokio::time::timeout(self.shutdown_timeout, loops).await {
            Ok((scheduler, pusher)) => {
                if let Err(e) = scheduler {
                    error!("Scheduler task failed: {}", e);
                }
                if let Err(e) = pusher {
                    error!("Pusher task failed: {}", e);
                }
            }
            Err(_) => warn!(
                "Background loops did not stop within {:?}",
                self.shutdown_timeout
            ),
        }

        self.lifecycle.mark_stopped();
        info!("Shutdown complete");
    }
}
