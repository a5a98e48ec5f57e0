//! Remote relational store client.
//!
//! The sync engine only needs idempotent upsert keyed by a composite key and
//! equality-filtered queries. [`RestRemote`] speaks the PostgREST dialect
//! used by Supabase; [`MemoryRemote`] is an in-process table set.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use crate::error::LifelockError;

/// Columns that identify a row on the remote side.
pub const RECORD_KEY_COLUMNS: &[&str] = &["user_id", "date"];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoteFilter {
    pub eq: Vec<(String, Value)>,
}

impl RemoteFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.eq.push((column.to_string(), value.into()));
        self
    }

    pub fn matches(&self, row: &Value) -> bool {
        self.eq
            .iter()
            .all(|(column, value)| row.get(column) == Some(value))
    }
}

#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Insert or replace the row identified by `key_columns`. Must be idempotent.
    async fn upsert(&self, table: &str, key_columns: &[&str], row: &Value) -> Result<(), LifelockError>;

    async fn query(&self, table: &str, filter: &RemoteFilter) -> Result<Vec<Value>, LifelockError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct RemoteCall {
    pub table: String,
    pub row: Value,
}

/// In-process remote used for tests and local demos. Failures can be injected
/// to exercise the retry path.
#[derive(Default)]
pub struct MemoryRemote {
    tables: Mutex<HashMap<String, Vec<Value>>>,
    calls: Mutex<Vec<RemoteCall>>,
    fail_next: AtomicUsize,
    unreachable: AtomicBool,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every upsert attempted so far, including failed ones.
    pub fn upsert_calls(&self) -> Vec<RemoteCall> {
        self.calls.lock().clone()
    }

    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.tables.lock().get(table).cloned().unwrap_or_default()
    }

    /// Place a row directly, as if another device had written it.
    pub fn insert_row(&self, table: &str, row: Value) {
        self.tables.lock().entry(table.to_string()).or_default().push(row);
    }

    /// Make the next `n` calls fail.
    pub fn fail_next(&self, n: usize) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), LifelockError> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(LifelockError::remote("remote store unreachable"));
        }
        let injected = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if injected.is_ok() {
            return Err(LifelockError::remote("injected remote failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for MemoryRemote {
    async fn upsert(&self, table: &str, key_columns: &[&str], row: &Value) -> Result<(), LifelockError> {
        self.calls.lock().push(RemoteCall {
            table: table.to_string(),
            row: row.clone(),
        });
        self.check_available()?;

        let mut tables = self.tables.lock();
        let rows = tables.entry(table.to_string()).or_default();
        let same_key = |existing: &Value| {
            key_columns
                .iter()
                .all(|column| existing.get(*column) == row.get(*column))
        };
        match rows.iter_mut().find(|existing| same_key(existing)) {
            Some(existing) => *existing = row.clone(),
            None => rows.push(row.clone()),
        }
        Ok(())
    }

    async fn query(&self, table: &str, filter: &RemoteFilter) -> Result<Vec<Value>, LifelockError> {
        self.check_available()?;
        Ok(self
            .rows(table)
            .into_iter()
            .filter(|row| filter.matches(row))
            .collect())
    }
}

/// PostgREST client (`/rest/v1/<table>`), as exposed by Supabase.
pub struct RestRemote {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl RestRemote {
    pub fn new(base_url: &str, api_key: Option<&str>) -> Result<Self, LifelockError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| LifelockError::remote(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.map(str::to_string),
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.base_url)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.header("apikey", key).bearer_auth(key),
            None => request,
        }
    }
}

/// PostgREST renders an equality filter as `column=eq.value`.
fn filter_params(filter: &RemoteFilter) -> Vec<(String, String)> {
    let mut params = vec![("select".to_string(), "*".to_string())];
    for (column, value) in &filter.eq {
        let rendered = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        params.push((column.clone(), format!("eq.{rendered}")));
    }
    params
}

#[async_trait]
impl RemoteStore for RestRemote {
    async fn upsert(&self, table: &str, key_columns: &[&str], row: &Value) -> Result<(), LifelockError> {
        let request = self
            .client
            .post(self.table_url(table))
            .query(&[("on_conflict", key_columns.join(","))])
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&[row]);
        self.authorize(request)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| LifelockError::remote(format!("upsert into {table} failed: {e}")))?;
        Ok(())
    }

    async fn query(&self, table: &str, filter: &RemoteFilter) -> Result<Vec<Value>, LifelockError> {
        let request = self
            .client
            .get(self.table_url(table))
            .query(&filter_params(filter));
        let rows = self
            .authorize(request)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| LifelockError::remote(format!("query on {table} failed: {e}")))?
            .json::<Vec<Value>>()
            .await
            .map_err(|e| LifelockError::remote(format!("invalid response from {table}: {e}")))?;
        Ok(rows)
    }
}
