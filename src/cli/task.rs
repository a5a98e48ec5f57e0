use serde_json::json;

use crate::cli::commands::TaskCommands;
use crate::cli::{close, open_app};
use crate::error::LifelockError;
use crate::models::{Priority, WorkKind};
use crate::output;

pub async fn run(cmd: TaskCommands, json_output: bool) -> i32 {
    let result = match cmd {
        TaskCommands::Add { title, description, kind, priority } => {
            run_add(&title, description.as_deref(), &kind, &priority, json_output).await
        }
        TaskCommands::List => run_list(json_output).await,
        TaskCommands::Toggle { id } => run_toggle(&id, json_output).await,
    };
    output::finish(result, json_output)
}

fn parse_kind(s: &str) -> Result<WorkKind, LifelockError> {
    WorkKind::from_str(s).ok_or_else(|| {
        LifelockError::validation(format!("Invalid kind '{s}': expected deep, light or morning"))
    })
}

fn parse_priority(s: &str) -> Result<Priority, LifelockError> {
    Priority::from_str(s).ok_or_else(|| {
        LifelockError::validation(format!(
            "Invalid priority '{s}': expected low, medium, high, urgent or critical"
        ))
    })
}

async fn run_add(
    title: &str,
    description: Option<&str>,
    kind: &str,
    priority: &str,
    json_output: bool,
) -> Result<i32, LifelockError> {
    // Validate before touching storage
    let kind = parse_kind(kind)?;
    let priority = parse_priority(priority)?;

    let app = open_app()?;
    let (task, report) = app.add_task(title, description, kind, priority)?;
    close(&app).await;

    if json_output {
        output::print_json(&output::json::success(json!({
            "task": output::json::task_detail(&task),
            "save": output::json::save_report(&report)
        })));
    } else {
        println!("Added task: {} ({})", task.title, task.id);
        output::text::print_save_report(&report);
    }
    Ok(0)
}

async fn run_list(json_output: bool) -> Result<i32, LifelockError> {
    let app = open_app()?;
    let tasks = app.tasks();
    close(&app).await;

    if json_output {
        let tasks_json: Vec<_> = tasks.iter().map(output::json::task_summary).collect();
        let completed = tasks.iter().filter(|t| t.completed).count();
        output::print_json(&output::json::success(json!({
            "tasks": tasks_json,
            "total": tasks.len(),
            "completed": completed
        })));
    } else {
        output::text::print_task_list(&tasks);
    }
    Ok(0)
}

async fn run_toggle(reference: &str, json_output: bool) -> Result<i32, LifelockError> {
    let app = open_app()?;
    let (task, report) = app.toggle_task(reference)?;
    close(&app).await;

    if json_output {
        output::print_json(&output::json::success(json!({
            "task": output::json::task_detail(&task),
            "save": output::json::save_report(&report)
        })));
    } else {
        let state = if task.completed { "completed" } else { "reopened" };
        println!("Task {state}: {} ({})", task.title, task.id);
    }
    Ok(0)
}
