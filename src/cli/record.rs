use chrono::Local;
use serde_json::{json, Value};

use crate::cli::commands::RecordCommands;
use crate::cli::{close, open_app};
use crate::error::LifelockError;
use crate::models::{parse_date, EntityKind};
use crate::output;
use crate::service::default_range;

pub async fn run(cmd: RecordCommands, json_output: bool) -> i32 {
    let result = match cmd {
        RecordCommands::Get { entity, date } => run_get(&entity, date, json_output).await,
        RecordCommands::Put { entity, date, data } => run_put(&entity, date, &data, json_output).await,
        RecordCommands::List { entity, from, to } => {
            run_list(&entity, from.as_deref(), to.as_deref(), json_output).await
        }
    };
    output::finish(result, json_output)
}

pub fn parse_entity(s: &str) -> Result<EntityKind, LifelockError> {
    EntityKind::from_str(s).ok_or_else(|| {
        let known: Vec<&str> = EntityKind::ALL.iter().map(|k| k.as_str()).collect();
        LifelockError::validation(format!("Unknown entity '{s}'. Expected one of: {}", known.join(", ")))
    })
}

/// `--date` or today. Day-scoped entities need a real date; the others take an id.
fn resolve_date(entity: EntityKind, date: Option<String>) -> Result<String, LifelockError> {
    match date {
        None => Ok(Local::now().date_naive().format("%Y-%m-%d").to_string()),
        Some(d) if entity.is_day_scoped() => Ok(parse_date(&d)?.format("%Y-%m-%d").to_string()),
        Some(d) => Ok(d),
    }
}

async fn run_get(entity: &str, date: Option<String>, json_output: bool) -> Result<i32, LifelockError> {
    let entity = parse_entity(entity)?;
    let date = resolve_date(entity, date)?;
    let app = open_app()?;
    let record = app.get_record(entity, &date).await?;
    close(&app).await;

    if json_output {
        output::print_json(&output::json::success(json!({
            "record": output::json::record_json(&record)
        })));
    } else {
        output::text::print_record(&record);
    }
    Ok(0)
}

async fn run_put(
    entity: &str,
    date: Option<String>,
    data: &str,
    json_output: bool,
) -> Result<i32, LifelockError> {
    let entity = parse_entity(entity)?;
    let date = resolve_date(entity, date)?;
    let payload: Value = serde_json::from_str(data)
        .map_err(|e| LifelockError::validation(format!("--data is not valid JSON: {e}")))?;

    let app = open_app()?;
    let record = app.put_record(entity, &date, payload)?;
    close(&app).await;
    // Re-read: the closing flush may have cleared the dirty flag.
    let record = app.records().get(&record.key())?;

    if json_output {
        output::print_json(&output::json::success(json!({
            "record": output::json::record_json(&record)
        })));
    } else {
        let state = if record.dirty { "pending sync" } else { "synced" };
        println!("Saved {}/{} ({state})", record.entity, record.date);
    }
    Ok(0)
}

async fn run_list(
    entity: &str,
    from: Option<&str>,
    to: Option<&str>,
    json_output: bool,
) -> Result<i32, LifelockError> {
    let entity = parse_entity(entity)?;
    let from = from.map(parse_date).transpose()?;
    let to = to.map(parse_date).transpose()?;
    let (from, to) = default_range(from, to);

    let app = open_app()?;
    let records = app.list_records(entity, from, to)?;
    close(&app).await;

    if json_output {
        let records_json: Vec<_> = records.iter().map(output::json::record_json).collect();
        output::print_json(&output::json::success(json!({
            "records": records_json,
            "from": from.format("%Y-%m-%d").to_string(),
            "to": to.format("%Y-%m-%d").to_string()
        })));
    } else {
        output::text::print_record_list(&records);
    }
    Ok(0)
}
