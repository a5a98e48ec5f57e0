use crate::models::{SyncStats, SyncedRecord, Task};
use crate::redundant::SaveReport;
use crate::sync::SyncReport;
use crate::views::DaySummary;

fn short_id(id: &str) -> &str {
    &id[..std::cmp::min(10, id.len())]
}

pub fn print_task_list(tasks: &[Task]) {
    if tasks.is_empty() {
        println!("No tasks found.");
        return;
    }
    for t in tasks {
        println!(
            "  [{}] {} ({}) {} {}",
            if t.completed { "x" } else { " " },
            t.title,
            short_id(&t.id),
            t.kind.as_str(),
            t.priority.as_str()
        );
    }
}

pub fn print_save_report(r: &SaveReport) {
    let status = if r.ok { "saved" } else { "saved below quorum" };
    println!("Tasks {status}: {}/{} slots", r.succeeded, r.attempted);
    if !r.failed.is_empty() {
        println!("  Failed slots: {}", r.failed.join(", "));
    }
    if let Some(ref path) = r.backup_path {
        println!("  Backup: {}", path.display());
    }
}

pub fn print_record(r: &SyncedRecord) {
    let state = if r.dirty { "pending sync" } else { "synced" };
    println!("Record: {}/{} ({state})", r.entity, r.date);
    println!("  Updated: {}", r.updated_at);
    match serde_json::to_string_pretty(&r.payload) {
        Ok(s) => println!("{s}"),
        Err(_) => println!("{}", r.payload),
    }
}

pub fn print_record_list(records: &[SyncedRecord]) {
    if records.is_empty() {
        println!("No records found.");
        return;
    }
    for r in records {
        println!(
            "  {} {}{}",
            r.date,
            r.entity,
            if r.dirty { " *" } else { "" }
        );
    }
}

pub fn print_sync_stats(s: &SyncStats) {
    println!("Sync: {}", if s.online { "online" } else { "offline" });
    println!("  Local records: {}", s.local_records);
    println!("  Pending sync: {}", s.pending_sync);
    match s.last_sync_at {
        Some(at) => println!("  Last sync: {at}"),
        None => println!("  Last sync: never"),
    }
}

pub fn print_sync_report(r: &SyncReport) {
    println!(
        "Sync finished: flushed={} failed={} skipped={}",
        r.flushed, r.failed, r.skipped
    );
}

pub fn print_week(days: &[DaySummary]) {
    for d in days {
        println!("  {} {}/{}", d.date.format("%a %Y-%m-%d"), d.completed, d.total);
    }
}
