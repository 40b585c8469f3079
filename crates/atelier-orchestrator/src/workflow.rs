use crate::topology::Topology;
use atelier_core::{ContextMap, UnitKind, UnitResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Most errors a run may collect and still be reported as `partial`.
pub const PARTIAL_ERROR_LIMIT: usize = 2;

/// Context key holding the analyzer's refined instruction.
pub const PRIMARY_INSTRUCTION_KEY: &str = "primary_instruction";

/// Analyzer output fields copied to top-level context keys in hybrid runs.
pub const INSTRUCTION_ALIASES: [(&str, &str); 3] = [
    ("refined_instruction", PRIMARY_INSTRUCTION_KEY),
    ("audience", "target_audience"),
    ("tone", "tone"),
];

/// Overall status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowStatus {
    /// Stages are still executing.
    Running,
    /// No unit failed.
    Success,
    /// One or two units failed.
    Partial,
    /// Three or more units failed.
    Error,
}

impl WorkflowStatus {
    /// Terminal status for a finished run with `errors` failed units.
    pub fn from_error_count(errors: usize) -> Self {
        match errors {
            0 => WorkflowStatus::Success,
            n if n <= PARTIAL_ERROR_LIMIT => WorkflowStatus::Partial,
            _ => WorkflowStatus::Error,
        }
    }

    pub fn is_terminal(&self) -> bool {
        *self != WorkflowStatus::Running
    }
}

impl std::fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkflowStatus::Running => write!(f, "running"),
            WorkflowStatus::Success => write!(f, "success"),
            WorkflowStatus::Partial => write!(f, "partial"),
            WorkflowStatus::Error => write!(f, "error"),
        }
    }
}

/// The accumulated record of one orchestration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowResult {
    pub id: Uuid,
    pub topology: Topology,
    pub status: WorkflowStatus,
    /// Per-unit results in completion order.
    pub unit_results: Vec<UnitResult>,
    /// Initial keys plus every successful unit's output keyed by unit type.
    pub context: ContextMap,
    /// `"unit_type: message"` per unit that did not succeed.
    pub errors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_output: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub output_refs: Vec<String>,
    /// Planned units that were never attempted, in plan order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<UnitKind>,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(with = "atelier_core::duration_ms", rename = "elapsed_ms")]
    pub elapsed: Duration,
}

impl WorkflowResult {
    pub fn new(id: Uuid, topology: Topology, context: ContextMap) -> Self {
        Self {
            id,
            topology,
            status: WorkflowStatus::Running,
            unit_results: Vec::new(),
            context,
            errors: Vec::new(),
            final_output: None,
            output_refs: Vec::new(),
            skipped: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
            elapsed: Duration::ZERO,
        }
    }

    /// Fold one unit result into the run.
    ///
    /// Success writes the output (and non-empty refs) into the context.
    /// Anything else appends to `errors` and leaves the context untouched.
    pub fn record(&mut self, result: UnitResult) {
        if self.status.is_terminal() {
            return;
        }
        match (&result.output, result.is_success()) {
            (Some(output), true) => {
                self.context
                    .insert(result.unit.as_str().to_string(), output.clone());
                if !result.output_refs.is_empty() {
                    self.context.insert(
                        result.unit.refs_key(),
                        serde_json::Value::from(result.output_refs.clone()),
                    );
                }
            }
            _ => {
                if let Some(line) = result.error_line() {
                    self.errors.push(line);
                }
            }
        }
        self.unit_results.push(result);
    }

    /// Copy analyzer fields to their alias keys.
    pub fn apply_aliases(&mut self, output: &serde_json::Value) {
        let Some(fields) = output.as_object() else {
            return;
        };
        for (field, alias) in INSTRUCTION_ALIASES {
            if let Some(value) = fields.get(field) {
                self.context.insert(alias.to_string(), value.clone());
            }
        }
    }

    pub fn mark_skipped(&mut self, unit: UnitKind) {
        if !self.status.is_terminal() && !self.skipped.contains(&unit) {
            self.skipped.push(unit);
        }
    }

    pub fn unit_result(&self, unit: UnitKind) -> Option<&UnitResult> {
        self.unit_results.iter().find(|r| r.unit == unit)
    }

    pub fn ran(&self, unit: UnitKind) -> bool {
        self.unit_result(unit).is_some()
    }

    /// Settle the terminal status and final output. Later calls are no-ops.
    pub fn finish(&mut self, elapsed: Duration) {
        if self.status.is_terminal() {
            return;
        }
        if let Some(terminal) = self
            .unit_result(UnitKind::TERMINAL)
            .filter(|r| r.is_success())
        {
            let (output, output_refs) = (terminal.output.clone(), terminal.output_refs.clone());
            self.final_output = output;
            self.output_refs = output_refs;
        }
        self.status = WorkflowStatus::from_error_count(self.errors.len());
        self.elapsed = elapsed;
        self.finished_at = Some(Utc::now());
    }
}

/// Pollable view of an in-flight or finished run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub id: Uuid,
    pub topology: Topology,
    pub status: WorkflowStatus,
    /// Label of the stage currently executing, if the run is in flight.
    #[serde(default)]
    pub current_stage: Option<String>,
    /// Units that have produced a result, in completion order.
    pub completed_units: Vec<UnitKind>,
    pub error_count: usize,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunSummary {
    pub fn from_run(run: &WorkflowResult, current_stage: Option<String>) -> Self {
        Self {
            id: run.id,
            topology: run.topology,
            status: run.status,
            current_stage,
            completed_units: run.unit_results.iter().map(|r| r.unit).collect(),
            error_count: run.errors.len(),
            started_at: run.started_at,
            finished_at: run.finished_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atelier_core::Task;
    use serde_json::json;

    fn ok(unit: UnitKind, output: serde_json::Value) -> UnitResult {
        UnitResult::success(&Task::new(unit, "go"), output)
    }

    fn failed(unit: UnitKind, msg: &str) -> UnitResult {
        UnitResult::failure(&Task::new(unit, "go"), msg)
    }

    fn run() -> WorkflowResult {
        let mut context = ContextMap::new();
        context.insert("instruction".into(), json!("go"));
        WorkflowResult::new(Uuid::new_v4(), Topology::Sequential, context)
    }

    #[test]
    fn test_status_thresholds() {
        assert_eq!(WorkflowStatus::from_error_count(0), WorkflowStatus::Success);
        assert_eq!(WorkflowStatus::from_error_count(1), WorkflowStatus::Partial);
        assert_eq!(WorkflowStatus::from_error_count(2), WorkflowStatus::Partial);
        assert_eq!(WorkflowStatus::from_error_count(3), WorkflowStatus::Error);
        assert_eq!(WorkflowStatus::from_error_count(10), WorkflowStatus::Error);
    }

    #[test]
    fn test_record_success_writes_context() {
        let mut run = run();
        run.record(ok(UnitKind::ImageGenerator, json!({"w": 512})).with_ref("img://1"));
        assert_eq!(run.context["image_generator"], json!({"w": 512}));
        assert_eq!(run.context["image_generator_refs"], json!(["img://1"]));
        assert!(run.errors.is_empty());
    }

    #[test]
    fn test_record_failure_leaves_context() {
        let mut run = run();
        run.record(failed(UnitKind::MusicComposer, "no credits"));
        assert!(!run.context.contains_key("music_composer"));
        assert_eq!(run.errors, vec!["music_composer: no credits".to_string()]);
        assert!(run.ran(UnitKind::MusicComposer));
    }

    #[test]
    fn test_finish_takes_terminal_output() {
        let mut run = run();
        run.record(ok(UnitKind::Assembler, json!("final.mp4")).with_ref("out://final"));
        run.record(failed(UnitKind::Publisher, "offline"));
        run.finish(Duration::from_millis(10));
        assert_eq!(run.status, WorkflowStatus::Partial);
        assert_eq!(run.final_output, Some(json!("final.mp4")));
        assert_eq!(run.output_refs, vec!["out://final".to_string()]);
        assert!(run.finished_at.is_some());
    }

    #[test]
    fn test_finish_without_terminal_output() {
        let mut run = run();
        run.record(failed(UnitKind::Assembler, "bad codec"));
        run.finish(Duration::ZERO);
        assert!(run.final_output.is_none());
        assert!(run.output_refs.is_empty());
    }

    #[test]
    fn test_finished_run_is_frozen() {
        let mut run = run();
        run.finish(Duration::ZERO);
        assert_eq!(run.status, WorkflowStatus::Success);
        run.record(failed(UnitKind::Copywriter, "late"));
        run.mark_skipped(UnitKind::Publisher);
        run.finish(Duration::from_secs(1));
        assert!(run.unit_results.is_empty());
        assert!(run.skipped.is_empty());
        assert_eq!(run.status, WorkflowStatus::Success);
        assert_eq!(run.elapsed, Duration::ZERO);
    }

    #[test]
    fn test_apply_aliases() {
        let mut run = run();
        run.apply_aliases(&json!({
            "refined_instruction": "a 15s teaser",
            "tone": "warm",
            "keywords": ["x"]
        }));
        assert_eq!(run.context[PRIMARY_INSTRUCTION_KEY], json!("a 15s teaser"));
        assert_eq!(run.context["tone"], json!("warm"));
        assert!(!run.context.contains_key("target_audience"));
        assert!(!run.context.contains_key("keywords"));

        run.apply_aliases(&json!("plain text"));
        assert_eq!(run.context.len(), 3);
    }

    #[test]
    fn test_summary_from_run() {
        let mut run = run();
        run.record(ok(UnitKind::Copywriter, json!("caption")));
        run.record(failed(UnitKind::VoiceNarrator, "muted"));
        let summary = RunSummary::from_run(&run, Some("voice_narrator".into()));
        assert_eq!(summary.status, WorkflowStatus::Running);
        assert_eq!(
            summary.completed_units,
            vec![UnitKind::Copywriter, UnitKind::VoiceNarrator]
        );
        assert_eq!(summary.error_count, 1);
        assert_eq!(summary.current_stage.as_deref(), Some("voice_narrator"));
    }
}
