use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    NotInitialized,
    RecordNotFound,
    TaskNotFound,
    AmbiguousRef,
    ValidationError,
    DatabaseError,
    SchemaMismatch,
    StorageError,
    SerializationError,
    RemoteError,
    ConfigError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotInitialized => "NOT_INITIALIZED",
            Self::RecordNotFound => "RECORD_NOT_FOUND",
            Self::TaskNotFound => "TASK_NOT_FOUND",
            Self::AmbiguousRef => "AMBIGUOUS_REF",
            Self::ValidationError => "VALIDATION_ERROR",
            Self::DatabaseError => "DATABASE_ERROR",
            Self::SchemaMismatch => "SCHEMA_MISMATCH",
            Self::StorageError => "STORAGE_ERROR",
            Self::SerializationError => "SERIALIZATION_ERROR",
            Self::RemoteError => "REMOTE_ERROR",
            Self::ConfigError => "CONFIG_ERROR",
        }
    }
}

#[derive(Debug, Error)]
#[error("{message}")]
pub struct LifelockError {
    pub code: ErrorCode,
    pub message: String,
}

impl LifelockError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn not_initialized() -> Self {
        Self::new(
            ErrorCode::NotInitialized,
            "lifelock is not initialized. Run `lifelock init` first.",
        )
    }

    pub fn record_not_found(reference: &str) -> Self {
        Self::new(
            ErrorCode::RecordNotFound,
            format!("Record not found: {reference}"),
        )
    }

    pub fn task_not_found(reference: &str) -> Self {
        Self::new(
            ErrorCode::TaskNotFound,
            format!("Task not found: {reference}"),
        )
    }

    pub fn ambiguous_ref(reference: &str, candidates: &[String]) -> Self {
        Self::new(
            ErrorCode::AmbiguousRef,
            format!(
                "Ambiguous reference '{}'. Candidates: {}",
                reference,
                candidates.join(", ")
            ),
        )
    }

    pub fn schema_mismatch(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::SchemaMismatch, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationError, message)
    }

    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DatabaseError, message)
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::StorageError, message)
    }

    pub fn serialization(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::SerializationError, message)
    }

    pub fn remote(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::RemoteError, message)
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigError, message)
    }

    /// True when the local schema is missing a table or column the code expects.
    pub fn is_schema_mismatch(&self) -> bool {
        self.code == ErrorCode::SchemaMismatch
    }
}

impl From<rusqlite::Error> for LifelockError {
    fn from(e: rusqlite::Error) -> Self {
        let message = e.to_string();
        // SQLite reports a dropped or never-created table only through the message.
        if message.contains("no such table") || message.contains("no such column") {
            return Self::schema_mismatch(message);
        }
        Self::database(message)
    }
}

impl From<serde_json::Error> for LifelockError {
    fn from(e: serde_json::Error) -> Self {
        Self::serialization(e.to_string())
    }
}

impl From<std::io::Error> for LifelockError {
    fn from(e: std::io::Error) -> Self {
        Self::storage(e.to_string())
    }
}
