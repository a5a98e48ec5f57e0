pub mod commands;
pub mod init;
pub mod record;
pub mod recover;
pub mod stats;
pub mod sync;
pub mod task;
pub mod watch;

pub use commands::*;

use crate::config::Config;
use crate::error::LifelockError;
use crate::service::Lifelock;

/// Load config, open the data directory and load the task list.
pub fn open_app() -> Result<Lifelock, LifelockError> {
    let app = Lifelock::open(Config::load()?)?;
    app.init()?;
    Ok(app)
}

/// Final checkpoint and flush before the process exits.
pub async fn close(app: &Lifelock) {
    let report = app.dispose().await;
    if report.failed > 0 {
        tracing::warn!(failed = report.failed, "some records could not be synced and stay pending");
    }
}
