//! Persisted log records and in-flight log lines.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One decoded line read from a container log stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLine {
    pub timestamp: DateTime<Utc>,
    pub text: String,
}

impl LogLine {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            text: text.into(),
        }
    }
}

/// One message inside a persisted log record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogMessage {
    pub timestamp: DateTime<Utc>,
    pub text: String,
}

impl From<LogLine> for LogMessage {
    fn from(line: LogLine) -> Self {
        Self {
            timestamp: line.timestamp,
            text: line.text,
        }
    }
}

/// The per-job document persisted in the log store.
///
/// `finished` is a terminal monotone transition; no messages are appended
/// after it becomes true.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    pub finished: bool,
    #[serde(default)]
    pub stream: Vec<LogMessage>,
}
