use crate::kind::{Priority, UnitKind};
use crate::ContextMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Default per-unit timeout budget.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// A single unit invocation.
///
/// Built by the orchestrator from the current context snapshot and handed to
/// the unit by shared reference, so units can read but never mutate it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub unit: UnitKind,
    pub instruction: String,
    #[serde(default)]
    pub parameters: ContextMap,
    /// Snapshot of accumulated state from earlier units in the same run.
    #[serde(default)]
    pub context: ContextMap,
    pub priority: Priority,
    #[serde(with = "crate::duration_ms", rename = "timeout_ms")]
    pub timeout: Duration,
    pub created_at: DateTime<Utc>,
}

impl Task {
    pub fn new(unit: UnitKind, instruction: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            unit,
            instruction: instruction.into(),
            parameters: ContextMap::new(),
            context: ContextMap::new(),
            priority: unit.default_priority(),
            timeout: DEFAULT_TIMEOUT,
            created_at: Utc::now(),
        }
    }

    pub fn with_parameters(mut self, parameters: ContextMap) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_context(mut self, context: ContextMap) -> Self {
        self.context = context;
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Output folded into the context by an earlier unit, if it succeeded.
    pub fn upstream(&self, unit: UnitKind) -> Option<&serde_json::Value> {
        self.context.get(unit.as_str())
    }

    /// A caller-supplied parameter.
    pub fn parameter(&self, key: &str) -> Option<&serde_json::Value> {
        self.parameters.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_task_creation() {
        let task = Task::new(UnitKind::Copywriter, "Write a caption");
        assert_eq!(task.unit, UnitKind::Copywriter);
        assert_eq!(task.priority, Priority::High);
        assert_eq!(task.timeout, DEFAULT_TIMEOUT);
        assert!(task.context.is_empty());
        assert!(task.parameters.is_empty());
    }

    #[test]
    fn test_task_ids_are_unique() {
        let a = Task::new(UnitKind::Assembler, "x");
        let b = Task::new(UnitKind::Assembler, "x");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_upstream_reads_context_by_unit_key() {
        let mut context = ContextMap::new();
        context.insert("copywriter".into(), json!({"caption": "hi"}));
        let task = Task::new(UnitKind::Assembler, "assemble").with_context(context);
        assert_eq!(
            task.upstream(UnitKind::Copywriter),
            Some(&json!({"caption": "hi"}))
        );
        assert!(task.upstream(UnitKind::ImageGenerator).is_none());
    }

    #[test]
    fn test_timeout_serializes_as_millis() {
        let task = Task::new(UnitKind::Publisher, "post").with_timeout(Duration::from_millis(1500));
        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["timeout_ms"], 1500);
        let parsed: Task = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.timeout, Duration::from_millis(1500));
    }
}
