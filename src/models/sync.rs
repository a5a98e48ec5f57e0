use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncStats {
    pub local_records: i64,
    pub pending_sync: i64,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub online: bool,
    /// Keys waiting in the backoff queue.
    pub retrying: usize,
}
