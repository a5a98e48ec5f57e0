use serde_json::json;

use crate::cli::commands::SyncCommands;
use crate::cli::{close, open_app};
use crate::error::LifelockError;
use crate::output;

pub async fn run(cmd: SyncCommands, json_output: bool) -> i32 {
    let result = match cmd {
        SyncCommands::Now => run_now(json_output).await,
        SyncCommands::Status => run_status(json_output).await,
    };
    output::finish(result, json_output)
}

async fn run_now(json_output: bool) -> Result<i32, LifelockError> {
    let app = open_app()?;
    let report = app.force_sync().await;
    let stats = app.sync_stats()?;
    close(&app).await;

    if json_output {
        output::print_json(&output::json::success(json!({
            "report": output::json::sync_report(&report),
            "stats": output::json::sync_stats(&stats)
        })));
    } else {
        if !stats.online {
            println!("Offline: no remote configured, {} record(s) pending.", stats.pending_sync);
        }
        output::text::print_sync_report(&report);
    }
    Ok(0)
}

async fn run_status(json_output: bool) -> Result<i32, LifelockError> {
    let app = open_app()?;
    let stats = app.sync_stats()?;

    if json_output {
        output::print_json(&output::json::success(output::json::sync_stats(&stats)));
    } else {
        output::text::print_sync_stats(&stats);
    }
    Ok(0)
}
