use crate::config::OrchestratorConfig;
use crate::monitor::UnitMonitor;
use crate::registry::UnitRegistry;
use crate::runner::run_supervised;
use crate::topology::{Stage, StageMode, Topology};
use crate::unit::WorkUnit;
use crate::workflow::{RunSummary, WorkflowResult, PRIMARY_INSTRUCTION_KEY};
use atelier_core::{ContextMap, Task, UnitKind, UnitResult};
use futures_util::stream::{FuturesUnordered, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Everything a caller supplies for one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRequest {
    /// Chosen up front so the run can be polled while in flight.
    pub id: Uuid,
    pub instruction: String,
    pub topology: Topology,
    #[serde(default)]
    pub parameters: ContextMap,
    #[serde(default)]
    pub targets: Vec<String>,
}

impl RunRequest {
    pub fn new(instruction: impl Into<String>, topology: Topology) -> Self {
        Self {
            id: Uuid::new_v4(),
            instruction: instruction.into(),
            topology,
            parameters: ContextMap::new(),
            targets: Vec::new(),
        }
    }

    pub fn with_parameters(mut self, parameters: ContextMap) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_targets(mut self, targets: Vec<String>) -> Self {
        self.targets = targets;
        self
    }

    /// The context every run starts from.
    fn initial_context(&self) -> ContextMap {
        let mut context = ContextMap::new();
        context.insert(
            "instruction".to_string(),
            serde_json::Value::String(self.instruction.clone()),
        );
        context.insert(
            "parameters".to_string(),
            serde_json::Value::Object(self.parameters.clone()),
        );
        context.insert(
            "targets".to_string(),
            serde_json::Value::from(self.targets.clone()),
        );
        context
    }
}

/// Whether the run may advance past a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Halt,
}

/// The orchestration engine.
///
/// Owns the unit registry and runs one of three stage topologies over it,
/// threading an accumulating context from stage to stage.
pub struct Orchestrator {
    registry: UnitRegistry,
    config: OrchestratorConfig,
    monitor: Arc<UnitMonitor>,
    runs: Arc<RwLock<HashMap<Uuid, RunSummary>>>,
}

impl Orchestrator {
    pub fn new(config: OrchestratorConfig) -> Self {
        Self {
            registry: UnitRegistry::new(),
            config,
            monitor: Arc::new(UnitMonitor::new()),
            runs: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Create with a pre-built set of units.
    pub fn with_units(
        config: OrchestratorConfig,
        units: impl IntoIterator<Item = Arc<dyn WorkUnit>>,
    ) -> Self {
        let mut orchestrator = Self::new(config);
        for unit in units {
            orchestrator.register_unit(unit);
        }
        orchestrator
    }

    /// Register a unit. A unit of the same type registered earlier is replaced.
    pub fn register_unit(&mut self, unit: Arc<dyn WorkUnit>) {
        self.registry.register(unit);
    }

    /// Registered unit types in declared order.
    pub fn registered_units(&self) -> Vec<UnitKind> {
        self.registry.kinds()
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Get a reference to the monitor.
    pub fn monitor(&self) -> &Arc<UnitMonitor> {
        &self.monitor
    }

    /// Summary of an in-flight or finished run.
    pub async fn run_status(&self, run_id: Uuid) -> Option<RunSummary> {
        let runs = self.runs.read().await;
        runs.get(&run_id).cloned()
    }

    /// Run the pipeline for an instruction under the chosen topology.
    pub async fn run(
        &self,
        instruction: &str,
        topology: Topology,
        parameters: ContextMap,
        targets: Vec<String>,
    ) -> WorkflowResult {
        let request = RunRequest::new(instruction, topology)
            .with_parameters(parameters)
            .with_targets(targets);
        self.execute(request).await
    }

    /// Run a prepared request. Unit faults never escape; inspect the returned
    /// status and per-unit results instead.
    pub async fn execute(&self, request: RunRequest) -> WorkflowResult {
        let start = Instant::now();
        let mut run = WorkflowResult::new(request.id, request.topology, request.initial_context());
        let stages = request.topology.stages();

        info!(
            run_id = %run.id,
            topology = %run.topology,
            stages = stages.len(),
            registered = self.registry.unit_count(),
            "Orchestrator: starting run"
        );

        for (index, stage) in stages.iter().enumerate() {
            self.publish(&run, Some(stage.label())).await;

            let flow = match stage.mode {
                StageMode::Single => self.run_single_stage(&request, stage, &mut run).await,
                StageMode::Concurrent => self.run_concurrent_stage(&request, stage, &mut run).await,
            };

            if flow == Flow::Halt {
                for unit in stages[index + 1..].iter().flat_map(|s| s.units.iter()) {
                    run.mark_skipped(*unit);
                }
                break;
            }
        }

        run.finish(start.elapsed());
        self.publish(&run, None).await;

        info!(
            run_id = %run.id,
            status = %run.status,
            errors = run.errors.len(),
            skipped = run.skipped.len(),
            duration_ms = run.elapsed.as_millis() as u64,
            "Orchestrator: run complete"
        );

        run
    }

    /// A stage holding one unit, executed alone.
    async fn run_single_stage(
        &self,
        request: &RunRequest,
        stage: &Stage,
        run: &mut WorkflowResult,
    ) -> Flow {
        for (position, kind) in stage.units.iter().enumerate() {
            let Some(unit) = self.resolve(*kind, run) else {
                continue;
            };
            let flow = self
                .run_slot(request, unit, stage.halt_on_critical, stage.refines_instruction, run)
                .await;
            if flow == Flow::Halt {
                for rest in &stage.units[position + 1..] {
                    run.mark_skipped(*rest);
                }
                return Flow::Halt;
            }
        }
        Flow::Continue
    }

    /// Fan out every concurrency-safe member against one snapshot, then run
    /// the members that are not concurrency-safe one at a time.
    async fn run_concurrent_stage(
        &self,
        request: &RunRequest,
        stage: &Stage,
        run: &mut WorkflowResult,
    ) -> Flow {
        let mut fan_out = Vec::new();
        let mut sequential = Vec::new();
        for kind in &stage.units {
            match self.resolve(*kind, run) {
                Some(unit) if unit.concurrency_safe() => fan_out.push(unit),
                Some(unit) => {
                    info!(
                        run_id = %run.id,
                        unit = %kind,
                        "Unit is not concurrency-safe, moving to a sequential slot"
                    );
                    sequential.push(unit);
                }
                None => {}
            }
        }

        let mut pending: FuturesUnordered<_> = fan_out
            .into_iter()
            .map(|unit| {
                let task = self.build_task(request, unit.kind(), &run.context);
                self.invoke(unit, task)
            })
            .collect();

        info!(
            run_id = %run.id,
            members = pending.len(),
            "Concurrent stage started"
        );

        // Fold in settle order; the stage ends once every member is folded.
        while let Some(result) = pending.next().await {
            run.record(result);
            self.publish(run, Some(stage.label())).await;
        }
        drop(pending);

        for (position, unit) in sequential.iter().enumerate() {
            let flow = self
                .run_slot(request, Arc::clone(unit), true, false, run)
                .await;
            if flow == Flow::Halt {
                for rest in &sequential[position + 1..] {
                    run.mark_skipped(rest.kind());
                }
                return Flow::Halt;
            }
        }
        Flow::Continue
    }

    /// Run one unit alone and fold its result.
    async fn run_slot(
        &self,
        request: &RunRequest,
        unit: Arc<dyn WorkUnit>,
        halt_on_critical: bool,
        refines_instruction: bool,
        run: &mut WorkflowResult,
    ) -> Flow {
        let kind = unit.kind();
        let task = self.build_task(request, kind, &run.context);
        let result = self.invoke(unit, task).await;
        let succeeded = result.is_success();

        if refines_instruction {
            match &result.output {
                Some(output) if succeeded => run.apply_aliases(output),
                _ => warn!(
                    run_id = %run.id,
                    unit = %kind,
                    "Instruction refinement unavailable, continuing with the original instruction"
                ),
            }
        }
        run.record(result);
        self.publish(run, None).await;

        if !succeeded && halt_on_critical && kind.is_critical() {
            error!(
                run_id = %run.id,
                unit = %kind,
                "Critical unit failed, stopping run"
            );
            return Flow::Halt;
        }
        Flow::Continue
    }

    fn resolve(&self, kind: UnitKind, run: &mut WorkflowResult) -> Option<Arc<dyn WorkUnit>> {
        match self.registry.get(kind) {
            Some(unit) => Some(Arc::clone(unit)),
            None => {
                warn!(run_id = %run.id, unit = %kind, "No unit registered, skipping");
                run.mark_skipped(kind);
                None
            }
        }
    }

    fn build_task(&self, request: &RunRequest, kind: UnitKind, context: &ContextMap) -> Task {
        let instruction = context
            .get(PRIMARY_INSTRUCTION_KEY)
            .and_then(serde_json::Value::as_str)
            .unwrap_or(&request.instruction);

        Task::new(kind, instruction)
            .with_parameters(request.parameters.clone())
            .with_context(context.clone())
            .with_timeout(self.config.timeout_for(kind))
    }

    async fn invoke(&self, unit: Arc<dyn WorkUnit>, task: Task) -> UnitResult {
        self.monitor.start_task(task.unit, task.id).await;
        let result = run_supervised(unit, task).await;
        self.monitor.record_result(&result).await;
        result
    }

    async fn publish(&self, run: &WorkflowResult, current_stage: Option<String>) {
        let summary = RunSummary::from_run(run, current_stage);
        let mut runs = self.runs.write().await;
        runs.insert(run.id, summary);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::WorkflowStatus;
    use async_trait::async_trait;
    use serde_json::json;
    use tokio_util::sync::CancellationToken;

    /// Echoes the instruction it was given.
    struct EchoUnit(UnitKind);

    #[async_trait]
    impl WorkUnit for EchoUnit {
        fn kind(&self) -> UnitKind {
            self.0
        }

        fn display_name(&self) -> &str {
            "echo"
        }

        async fn execute(&self, task: &Task, _cancel: &CancellationToken) -> UnitResult {
            UnitResult::success(task, json!({ "instruction": task.instruction }))
        }
    }

    #[test]
    fn test_initial_context() {
        let mut params = ContextMap::new();
        params.insert("aspect".into(), json!("9:16"));
        let request = RunRequest::new("teaser", Topology::Sequential)
            .with_parameters(params)
            .with_targets(vec!["instagram".into()]);
        let context = request.initial_context();
        assert_eq!(context.len(), 3);
        assert_eq!(context["instruction"], json!("teaser"));
        assert_eq!(context["parameters"], json!({"aspect": "9:16"}));
        assert_eq!(context["targets"], json!(["instagram"]));
    }

    #[test]
    fn test_build_task_prefers_primary_instruction() {
        let orchestrator = Orchestrator::new(OrchestratorConfig::default());
        let request = RunRequest::new("raw", Topology::Hybrid);
        let mut context = request.initial_context();

        let task = orchestrator.build_task(&request, UnitKind::Copywriter, &context);
        assert_eq!(task.instruction, "raw");

        context.insert(PRIMARY_INSTRUCTION_KEY.into(), json!("refined"));
        let task = orchestrator.build_task(&request, UnitKind::Copywriter, &context);
        assert_eq!(task.instruction, "refined");
        assert_eq!(task.context, context);
    }

    #[tokio::test]
    async fn test_empty_registry_skips_everything() {
        let orchestrator = Orchestrator::new(OrchestratorConfig::default());
        let result = orchestrator
            .run("anything", Topology::Parallel, ContextMap::new(), vec![])
            .await;
        assert_eq!(result.status, WorkflowStatus::Success);
        assert!(result.unit_results.is_empty());
        assert_eq!(result.skipped.len(), UnitKind::ALL.len());
        assert_eq!(result.context.len(), 3);
    }

    #[tokio::test]
    async fn test_run_status_after_completion() {
        let orchestrator = Orchestrator::with_units(
            OrchestratorConfig::default(),
            [Arc::new(EchoUnit(UnitKind::Copywriter)) as Arc<dyn WorkUnit>],
        );
        let request = RunRequest::new("caption", Topology::Sequential);
        let id = request.id;
        assert!(orchestrator.run_status(id).await.is_none());

        let result = orchestrator.execute(request).await;
        let summary = orchestrator.run_status(id).await.unwrap();
        assert_eq!(summary.status, result.status);
        assert_eq!(summary.completed_units, vec![UnitKind::Copywriter]);
        assert!(summary.current_stage.is_none());
        assert!(summary.finished_at.is_some());
    }
}
