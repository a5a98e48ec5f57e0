//! Periodic re-save of the loaded task list, plus immediate saves on the
//! lifecycle signals that precede the process being reclaimed.

use std::future::Future;
use std::time::Duration;

use tokio::time::MissedTickBehavior;

use crate::redundant::SaveReport;
use crate::service::Lifelock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    VisibilityHidden,
    PageHide,
}

impl LifecycleEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VisibilityHidden => "visibility_hidden",
            Self::PageHide => "page_hide",
        }
    }
}

pub trait Snapshotter: Send + Sync {
    /// `None` when there was nothing to save.
    fn checkpoint(&self) -> Option<SaveReport>;
}

impl Snapshotter for Lifelock {
    fn checkpoint(&self) -> Option<SaveReport> {
        Lifelock::checkpoint(self)
    }
}

/// Save synchronously before returning control to the caller.
pub fn on_lifecycle<S: Snapshotter + ?Sized>(target: &S, event: LifecycleEvent) -> Option<SaveReport> {
    let report = target.checkpoint()?;
    tracing::info!(
        event = event.as_str(),
        succeeded = report.succeeded,
        attempted = report.attempted,
        "lifecycle save"
    );
    Some(report)
}

/// Re-save every `interval` until `shutdown` resolves, then save once more.
/// Returns the number of periodic saves performed.
pub async fn run<S, F>(target: &S, interval: Duration, shutdown: F) -> usize
where
    S: Snapshotter + ?Sized,
    F: Future<Output = ()>,
{
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately; the list was just loaded.
    ticker.tick().await;
    tokio::pin!(shutdown);

    let mut saves = 0;
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let Some(report) = target.checkpoint() else {
                    continue;
                };
                saves += 1;
                if !report.ok {
                    tracing::warn!(succeeded = report.succeeded, failed = ?report.failed, "auto-save below quorum");
                } else {
                    tracing::debug!(succeeded = report.succeeded, "auto-save");
                }
            }
            _ = &mut shutdown => {
                on_lifecycle(target, LifecycleEvent::PageHide);
                break;
            }
        }
    }
    saves
}
