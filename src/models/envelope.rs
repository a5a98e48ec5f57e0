use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::LifelockError;
use crate::models::Task;

/// Current envelope schema version written by this crate.
pub const ENVELOPE_VERSION: u32 = 2;

/// Wrapper around every persisted document.
///
/// Version history:
/// - 1: `data` is `{"tasks": [...]}`
/// - 2: `data` is the task array itself
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    #[serde(default)]
    pub device: String,
    pub data: Value,
}

impl Envelope {
    pub fn wrap(data: Value, device: &str) -> Self {
        Self {
            version: ENVELOPE_VERSION,
            saved_at: Utc::now(),
            device: device.to_string(),
            data,
        }
    }

    pub fn for_tasks(tasks: &[Task], device: &str) -> Result<Self, LifelockError> {
        Ok(Self::wrap(serde_json::to_value(tasks)?, device))
    }

    pub fn encode(&self) -> Result<String, LifelockError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse raw slot contents. Anything not shaped as an envelope is an error.
    pub fn decode(raw: &str) -> Result<Self, LifelockError> {
        let envelope: Envelope = serde_json::from_str(raw)?;
        if envelope.version == 0 || envelope.version > ENVELOPE_VERSION {
            return Err(LifelockError::serialization(format!(
                "Unsupported envelope version {}",
                envelope.version
            )));
        }
        Ok(envelope)
    }

    /// Upgrade to the current version, one step at a time.
    pub fn migrate(mut self) -> Result<Self, LifelockError> {
        while self.version < ENVELOPE_VERSION {
            self = match self.version {
                1 => migrate_v1(self)?,
                v => {
                    return Err(LifelockError::serialization(format!(
                        "No migration from envelope version {v}"
                    )))
                }
            };
        }
        Ok(self)
    }

    pub fn into_tasks(self) -> Result<Vec<Task>, LifelockError> {
        let current = self.migrate()?;
        let mut tasks: Vec<Task> = serde_json::from_value(current.data)?;
        for task in &mut tasks {
            task.normalize();
        }
        Ok(tasks)
    }
}

fn migrate_v1(envelope: Envelope) -> Result<Envelope, LifelockError> {
    let tasks = match envelope.data {
        Value::Object(mut map) => map.remove("tasks").unwrap_or(Value::Array(Vec::new())),
        _ => {
            return Err(LifelockError::serialization(
                "Version 1 envelope data must be an object with a tasks field",
            ))
        }
    };
    Ok(Envelope {
        version: 2,
        data: tasks,
        ..envelope
    })
}

/// Decode raw slot contents straight to a task list.
pub fn decode_tasks(raw: &str) -> Result<Vec<Task>, LifelockError> {
    Envelope::decode(raw)?.into_tasks()
}
