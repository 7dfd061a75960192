//! Request validation shared by the API and page handlers.
//!
//! Validators collect every problem instead of stopping at the first one, so a
//! form can show all of its errors at once.

use serde::Serialize;
use uuid::Uuid;

/// A single validation problem, keyed by the field it belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
    pub path: String,
    pub message: String,
}

impl Issue {
    pub fn new(path: &str, message: &str) -> Self {
        Self {
            path: path.to_string(),
            message: message.to_string(),
        }
    }
}

#[derive(Debug, Default)]
pub struct Issues(Vec<Issue>);

impl Issues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, path: &str, message: &str) {
        self.0.push(Issue::new(path, message));
    }

    /// Character-count bounds check; `min` of 0 means the field may be empty
    pub fn check_length(
        &mut self,
        path: &str,
        value: &str,
        min: usize,
        max: usize,
        too_short: &str,
        too_long: &str,
    ) {
        let len = value.chars().count();
        if len < min {
            self.push(path, too_short);
        } else if len > max {
            self.push(path, too_long);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn finish<T>(self, value: T) -> Result<T, Vec<Issue>> {
        if self.0.is_empty() {
            Ok(value)
        } else {
            Err(self.0)
        }
    }
}

/// Parse a record id supplied by the client
pub fn parse_id(path: &str, raw: &str) -> Result<Uuid, Vec<Issue>> {
    Uuid::parse_str(raw.trim()).map_err(|_| vec![Issue::new(path, "Invalid id")])
}

/// Treat blank optional strings as absent
pub fn non_empty(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}
