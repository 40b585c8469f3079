use crate::kind::UnitKind;
use crate::task::Task;
use crate::AtelierResult;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Outcome tag of a unit invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitStatus {
    /// The unit produced an output.
    Success,
    /// The unit failed internally.
    Error,
    /// The unit exceeded its task's timeout.
    Timeout,
    /// The unit observed cancellation and gave up.
    Cancelled,
}

impl fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitStatus::Success => write!(f, "success"),
            UnitStatus::Error => write!(f, "error"),
            UnitStatus::Timeout => write!(f, "timeout"),
            UnitStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// The result of executing a [`Task`].
///
/// A success always carries an output and never an error; every other status
/// carries an error and never an output. The constructors uphold this and
/// [`UnitResult::normalized`] repairs results built by hand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitResult {
    /// Unit type that produced this result.
    pub unit: UnitKind,
    /// ID of the originating task.
    pub task_id: Uuid,
    pub status: UnitStatus,
    /// Unit-specific payload, present only on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,
    /// References to produced artifacts (URLs, file paths, provider ids).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub output_refs: Vec<String>,
    /// Observability data. Non-authoritative.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,
    #[serde(with = "crate::duration_ms", rename = "elapsed_ms")]
    pub elapsed: Duration,
    /// Human-readable cause, present on every non-success status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UnitResult {
    fn base(task: &Task, status: UnitStatus) -> Self {
        Self {
            unit: task.unit,
            task_id: task.id,
            status,
            output: None,
            output_refs: Vec::new(),
            metadata: HashMap::new(),
            elapsed: Duration::ZERO,
            error: None,
        }
    }

    /// A successful result carrying `output`.
    pub fn success(task: &Task, output: serde_json::Value) -> Self {
        let mut result = Self::base(task, UnitStatus::Success);
        result.output = Some(output);
        result
    }

    /// A failed result.
    pub fn failure(task: &Task, error: impl Into<String>) -> Self {
        let mut result = Self::base(task, UnitStatus::Error);
        result.error = Some(error.into());
        result
    }

    /// A timed-out result; `elapsed` is set to the task's budget.
    pub fn timed_out(task: &Task) -> Self {
        let mut result = Self::base(task, UnitStatus::Timeout);
        result.error = Some(format!("timed out after {:?}", task.timeout));
        result.elapsed = task.timeout;
        result
    }

    /// A cancelled result.
    pub fn cancelled(task: &Task, reason: impl Into<String>) -> Self {
        let mut result = Self::base(task, UnitStatus::Cancelled);
        result.error = Some(reason.into());
        result
    }

    /// Convert a fallible unit body into a result.
    pub fn from_outcome(task: &Task, outcome: AtelierResult<serde_json::Value>) -> Self {
        match outcome {
            Ok(output) => Self::success(task, output),
            Err(e) => Self::failure(task, e.to_string()),
        }
    }

    pub fn with_ref(mut self, reference: impl Into<String>) -> Self {
        self.output_refs.push(reference.into());
        self
    }

    pub fn with_refs(mut self, refs: impl IntoIterator<Item = String>) -> Self {
        self.output_refs.extend(refs);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed = elapsed;
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == UnitStatus::Success
    }

    fn has_output(&self) -> bool {
        matches!(&self.output, Some(v) if !v.is_null())
    }

    fn has_error(&self) -> bool {
        matches!(&self.error, Some(e) if !e.is_empty())
    }

    /// Whether status, output and error agree with each other.
    pub fn is_consistent(&self) -> bool {
        if self.is_success() {
            self.has_output() && !self.has_error()
        } else {
            !self.has_output() && self.has_error()
        }
    }

    /// Repair a result whose status disagrees with its output or error.
    ///
    /// A success without output becomes an error. Non-success results lose
    /// any output and receive a generic cause when none was given.
    pub fn normalized(mut self) -> Self {
        if self.is_consistent() {
            return self;
        }
        if self.is_success() {
            if self.has_output() {
                self.error = None;
                return self;
            }
            self.status = UnitStatus::Error;
            self.output = None;
            self.error = Some("unit returned success without output".to_string());
            return self;
        }
        self.output = None;
        if !self.has_error() {
            self.error = Some(format!("unit finished with status {}", self.status));
        }
        self
    }

    /// The `"unit_type: message"` line recorded for a non-success result.
    pub fn error_line(&self) -> Option<String> {
        if self.is_success() {
            return None;
        }
        let message = self.error.as_deref().unwrap_or("unknown error");
        Some(format!("{}: {message}", self.unit))
    }
}
