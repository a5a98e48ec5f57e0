use serde_json::{json, Value};

use crate::error::LifelockError;
use crate::models::{SyncStats, SyncedRecord, Task};
use crate::redundant::SaveReport;
use crate::sync::SyncReport;
use crate::views::DaySummary;

pub fn success(data: Value) -> Value {
    json!({
        "success": true,
        "data": data
    })
}

pub fn error(err: &LifelockError) -> Value {
    json!({
        "success": false,
        "error": {
            "code": err.code.as_str(),
            "message": err.message
        }
    })
}

pub fn task_summary(t: &Task) -> Value {
    json!({
        "id": t.id,
        "title": t.title,
        "kind": t.kind.as_str(),
        "priority": t.priority.as_str(),
        "completed": t.completed
    })
}

pub fn task_detail(t: &Task) -> Value {
    json!({
        "id": t.id,
        "title": t.title,
        "description": t.description,
        "kind": t.kind.as_str(),
        "priority": t.priority.as_str(),
        "completed": t.completed,
        "completed_at": t.completed_at,
        "created_at": t.created_at,
        "saved_at": t.saved_at
    })
}

pub fn save_report(r: &SaveReport) -> Value {
    json!({
        "ok": r.ok,
        "attempted": r.attempted,
        "succeeded": r.succeeded,
        "failed": r.failed,
        "saved_at": r.saved_at,
        "backup_path": r.backup_path.as_ref().map(|p| p.to_string_lossy().to_string())
    })
}

pub fn record_json(r: &SyncedRecord) -> Value {
    json!({
        "id": r.id,
        "userId": r.user_id,
        "entity": r.entity.as_str(),
        "date": r.date,
        "payload": r.payload,
        "dirty": r.dirty,
        "updatedAt": r.updated_at,
        "remoteUpdatedAt": r.remote_updated_at
    })
}

pub fn sync_stats(s: &SyncStats) -> Value {
    json!({
        "localRecords": s.local_records,
        "pendingSync": s.pending_sync,
        "lastSyncAt": s.last_sync_at,
        "online": s.online,
        "retrying": s.retrying
    })
}

pub fn sync_report(r: &SyncReport) -> Value {
    json!({
        "flushed": r.flushed,
        "failed": r.failed,
        "skipped": r.skipped
    })
}

pub fn day_summary(d: &DaySummary) -> Value {
    json!({
        "date": d.date.format("%Y-%m-%d").to_string(),
        "total": d.total,
        "completed": d.completed
    })
}
