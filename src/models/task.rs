use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::LifelockError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkKind {
    Deep,
    Light,
    Morning,
}

impl WorkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deep => "deep",
            Self::Light => "light",
            Self::Morning => "morning",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "deep" => Some(Self::Deep),
            "light" => Some(Self::Light),
            "morning" => Some(Self::Morning),
            _ => None,
        }
    }
}

/// Variant order is significant: `Critical` compares greatest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
    Critical,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Urgent => "urgent",
            Self::Critical => "critical",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "urgent" => Some(Self::Urgent),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub kind: WorkKind,
    pub priority: Priority,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub saved_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(
        title: &str,
        description: Option<&str>,
        kind: WorkKind,
        priority: Priority,
    ) -> Result<Self, LifelockError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(LifelockError::validation("Task title must not be empty"));
        }
        Ok(Self {
            id: ulid::Ulid::new().to_string(),
            title: title.to_string(),
            description: description.map(str::to_string),
            kind,
            priority,
            completed: false,
            completed_at: None,
            created_at: Utc::now(),
            saved_at: None,
        })
    }

    /// Flip completion, keeping `completed_at` set exactly when `completed` is true.
    pub fn toggle(&mut self, now: DateTime<Utc>) {
        self.completed = !self.completed;
        self.completed_at = if self.completed { Some(now) } else { None };
    }

    /// Repairs a record whose completion timestamp disagrees with its flag.
    pub fn normalize(&mut self) {
        if self.completed && self.completed_at.is_none() {
            self.completed_at = Some(self.saved_at.unwrap_or(self.created_at));
        } else if !self.completed {
            self.completed_at = None;
        }
    }
}

/// Sort by priority (critical first), then by creation time.
pub fn sort_by_priority(tasks: &mut [Task]) {
    tasks.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then_with(|| a.created_at.cmp(&b.created_at))
    });
}
