//! Derived views over the daily `tasks` records.

use std::collections::HashSet;

use chrono::{Duration, NaiveDate};
use serde::Serialize;
use serde_json::Value;

use crate::error::LifelockError;
use crate::models::EntityKind;
use crate::store::OfflineStore;

/// How far back a streak is followed.
const MAX_STREAK_DAYS: i64 = 366;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DaySummary {
    pub date: NaiveDate,
    pub total: usize,
    pub completed: usize,
}

fn count_tasks(payload: &Value) -> (usize, usize) {
    let Some(items) = payload.as_array() else {
        return (0, 0);
    };
    let completed = items
        .iter()
        .filter(|t| t.get("completed").and_then(Value::as_bool).unwrap_or(false))
        .count();
    (items.len(), completed)
}

/// One entry per day for the seven days starting at `start`, zero-filled.
pub fn week_summary(
    store: &OfflineStore,
    user_id: &str,
    start: NaiveDate,
) -> Result<Vec<DaySummary>, LifelockError> {
    let end = start + Duration::days(6);
    let records = store.query(user_id, EntityKind::Tasks, start, end)?;

    let mut days: Vec<DaySummary> = (0..7)
        .map(|offset| DaySummary {
            date: start + Duration::days(offset),
            total: 0,
            completed: 0,
        })
        .collect();
    for record in records {
        let Ok(date) = NaiveDate::parse_from_str(&record.date, "%Y-%m-%d") else {
            continue;
        };
        let index = (date - start).num_days() as usize;
        if let Some(day) = days.get_mut(index) {
            let (total, completed) = count_tasks(&record.payload);
            day.total += total;
            day.completed += completed;
        }
    }
    Ok(days)
}

/// Consecutive days with at least one completed task, ending at `today`.
/// A day without completions yet does not break a streak that ran through yesterday.
pub fn completion_streak(
    store: &OfflineStore,
    user_id: &str,
    today: NaiveDate,
) -> Result<u32, LifelockError> {
    let from = today - Duration::days(MAX_STREAK_DAYS);
    let records = store.query(user_id, EntityKind::Tasks, from, today)?;
    let active: HashSet<String> = records
        .iter()
        .filter(|r| count_tasks(&r.payload).1 > 0)
        .map(|r| r.date.clone())
        .collect();

    let key = |day: NaiveDate| day.format("%Y-%m-%d").to_string();
    let mut day = if active.contains(&key(today)) {
        today
    } else {
        today - Duration::days(1)
    };
    let mut streak = 0;
    while active.contains(&key(day)) {
        streak += 1;
        day -= Duration::days(1);
    }
    Ok(streak)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RecordKey;
    use serde_json::json;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn put(store: &OfflineStore, date: &str, payload: Value) {
        let key = RecordKey::new("u1", EntityKind::Tasks, date).unwrap();
        store.put(&key, payload, true).unwrap();
    }

    #[test]
    fn test_week_summary_counts_per_day() {
        let store = OfflineStore::in_memory("test").unwrap();
        put(&store, "2026-04-06", json!([{"completed": true}, {"completed": false}]));
        put(&store, "2026-04-08", json!([{"completed": true}]));
        put(&store, "2026-04-20", json!([{"completed": true}]));

        let week = week_summary(&store, "u1", day("2026-04-06")).unwrap();
        assert_eq!(week.len(), 7);
        assert_eq!((week[0].total, week[0].completed), (2, 1));
        assert_eq!((week[1].total, week[1].completed), (0, 0));
        assert_eq!((week[2].total, week[2].completed), (1, 1));
        assert_eq!(week[6].date, day("2026-04-12"));
    }

    #[test]
    fn test_streak_counts_back_from_yesterday_when_today_is_empty() {
        let store = OfflineStore::in_memory("test").unwrap();
        for date in ["2026-04-07", "2026-04-08", "2026-04-09"] {
            put(&store, date, json!([{"completed": true}]));
        }
        put(&store, "2026-04-05", json!([{"completed": true}]));
        put(&store, "2026-04-10", json!([{"completed": false}]));

        assert_eq!(completion_streak(&store, "u1", day("2026-04-10")).unwrap(), 3);
        assert_eq!(completion_streak(&store, "u1", day("2026-04-09")).unwrap(), 3);
        assert_eq!(completion_streak(&store, "u1", day("2026-04-12")).unwrap(), 0);
    }
}
