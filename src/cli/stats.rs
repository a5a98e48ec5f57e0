use chrono::{Duration, Local};
use serde_json::json;

use crate::cli::commands::StatsCommands;
use crate::cli::open_app;
use crate::error::LifelockError;
use crate::models::parse_date;
use crate::output;

pub fn run(cmd: StatsCommands, json_output: bool) -> i32 {
    let result = match cmd {
        StatsCommands::Week { date } => run_week(date.as_deref(), json_output),
        StatsCommands::Streak => run_streak(json_output),
    };
    output::finish(result, json_output)
}

fn run_week(date: Option<&str>, json_output: bool) -> Result<i32, LifelockError> {
    let start = match date {
        Some(d) => parse_date(d)?,
        None => Local::now().date_naive() - Duration::days(6),
    };
    let app = open_app()?;
    let days = app.week_summary(start)?;

    if json_output {
        let days_json: Vec<_> = days.iter().map(output::json::day_summary).collect();
        let completed: usize = days.iter().map(|d| d.completed).sum();
        let total: usize = days.iter().map(|d| d.total).sum();
        output::print_json(&output::json::success(json!({
            "days": days_json,
            "completed": completed,
            "total": total
        })));
    } else {
        output::text::print_week(&days);
    }
    Ok(0)
}

fn run_streak(json_output: bool) -> Result<i32, LifelockError> {
    let app = open_app()?;
    let streak = app.completion_streak(Local::now().date_naive())?;

    if json_output {
        output::print_json(&output::json::success(json!({ "streak": streak })));
    } else {
        println!("Current streak: {streak} day(s)");
    }
    Ok(0)
}
