use serde_json::json;

use crate::cli::{close, open_app};
use crate::error::LifelockError;
use crate::output;

pub async fn run_recover(json_output: bool) -> i32 {
    output::finish(recover_inner(json_output).await, json_output)
}

pub async fn run_backup(json_output: bool) -> i32 {
    output::finish(backup_inner(json_output).await, json_output)
}

async fn recover_inner(json_output: bool) -> Result<i32, LifelockError> {
    let app = open_app()?;
    let recovered = app.recover();
    close(&app).await;

    if json_output {
        let tasks_json: Vec<_> = recovered.iter().map(output::json::task_summary).collect();
        output::print_json(&output::json::success(json!({
            "recovered": recovered.len(),
            "tasks": tasks_json
        })));
    } else if recovered.is_empty() {
        println!("Nothing recoverable found.");
    } else {
        println!("Recovered {} task(s):", recovered.len());
        output::text::print_task_list(&recovered);
    }
    Ok(0)
}

async fn backup_inner(json_output: bool) -> Result<i32, LifelockError> {
    let app = open_app()?;
    let Some(report) = app.checkpoint() else {
        return Err(LifelockError::validation(
            "No tasks to back up. Run `lifelock recover` if tasks went missing.",
        ));
    };
    close(&app).await;

    if json_output {
        output::print_json(&output::json::success(output::json::save_report(&report)));
    } else {
        output::text::print_save_report(&report);
    }
    Ok(if report.ok { 0 } else { 1 })
}
