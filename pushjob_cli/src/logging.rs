use std::path::Path;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;

/// Installs the global subscriber. Keep the returned guard alive for the
/// lifetime of the process so buffered lines are flushed on exit.
pub fn init(level: Level, json: bool, log_dir: Option<&Path>) -> anyhow::Result<WorkerGuard> {
    let (writer, guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, "pushjob.log"))
        }
        None => tracing_appender::non_blocking(std::io::stdout()),
    };

    let builder = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_ansi(log_dir.is_none())
        .with_writer(writer);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }

    Ok(guard)
}
