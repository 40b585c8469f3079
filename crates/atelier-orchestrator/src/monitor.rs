use atelier_core::{UnitKind, UnitResult, UnitStatus};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Counters tracked per unit type across runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitMetrics {
    pub invocations: u32,
    pub successes: u32,
    pub errors: u32,
    pub timeouts: u32,
    pub cancellations: u32,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerStatus {
    Idle,
    Working,
    Error,
}

/// Real-time snapshot of one unit type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitState {
    pub unit: UnitKind,
    pub current_task: Option<Uuid>,
    pub status: WorkerStatus,
    pub metrics: UnitMetrics,
}

/// Tracks state and metrics for every unit type in the roster.
pub struct UnitMonitor {
    states: Arc<RwLock<HashMap<UnitKind, UnitState>>>,
}

impl UnitMonitor {
    pub fn new() -> Self {
        let states = UnitKind::ALL
            .into_iter()
            .map(|unit| {
                (
                    unit,
                    UnitState {
                        unit,
                        current_task: None,
                        status: WorkerStatus::Idle,
                        metrics: UnitMetrics::default(),
                    },
                )
            })
            .collect();
        Self {
            states: Arc::new(RwLock::new(states)),
        }
    }

    /// Mark a unit as working on a task.
    pub async fn start_task(&self, unit: UnitKind, task_id: Uuid) {
        let mut states = self.states.write().await;
        if let Some(state) = states.get_mut(&unit) {
            state.current_task = Some(task_id);
            state.status = WorkerStatus::Working;
            state.metrics.invocations += 1;
        }
    }

    /// Record a finished invocation and return the unit to idle (or error).
    pub async fn record_result(&self, result: &UnitResult) {
        let mut states = self.states.write().await;
        if let Some(state) = states.get_mut(&result.unit) {
            state.current_task = None;
            state.metrics.duration_ms += result.elapsed.as_millis() as u64;
            match result.status {
                UnitStatus::Success => state.metrics.successes += 1,
                UnitStatus::Error => state.metrics.errors += 1,
                UnitStatus::Timeout => state.metrics.timeouts += 1,
                UnitStatus::Cancelled => state.metrics.cancellations += 1,
            }
            state.status = if result.is_success() {
                WorkerStatus::Idle
            } else {
                WorkerStatus::Error
            };
        }
    }

    /// Get a snapshot of all unit states, in declared order.
    pub async fn snapshot(&self) -> Vec<UnitState> {
        let states = self.states.read().await;
        UnitKind::ALL
            .iter()
            .filter_map(|unit| states.get(unit).cloned())
            .collect()
    }

    pub async fn get_state(&self, unit: UnitKind) -> Option<UnitState> {
        let states = self.states.read().await;
        states.get(&unit).cloned()
    }

    /// Get aggregate metrics across all units.
    pub async fn aggregate_metrics(&self) -> UnitMetrics {
        let states = self.states.read().await;
        let mut total = UnitMetrics::default();
        for state in states.values() {
            total.invocations += state.metrics.invocations;
            total.successes += state.metrics.successes;
            total.errors += state.metrics.errors;
            total.timeouts += state.metrics.timeouts;
            total.cancellations += state.metrics.cancellations;
            total.duration_ms += state.metrics.duration_ms;
        }
        total
    }

    pub async fn to_json(&self) -> serde_json::Value {
        let states = self.snapshot().await;
        let aggregate = self.aggregate_metrics().await;
        serde_json::json!({
            "units": states,
            "aggregate": aggregate,
        })
    }
}

impl Default for UnitMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atelier_core::Task;
    use serde_json::json;
    use std::time::Duration;

    #[tokio::test]
    async fn test_initial_state() {
        let monitor = UnitMonitor::new();
        let states = monitor.snapshot().await;
        assert_eq!(states.len(), UnitKind::ALL.len());
        assert_eq!(states[0].unit, UnitKind::ContentAnalyzer);
        for state in &states {
            assert_eq!(state.status, WorkerStatus::Idle);
            assert!(state.current_task.is_none());
        }
    }

    #[tokio::test]
    async fn test_start_and_record_success() {
        let monitor = UnitMonitor::new();
        let task = Task::new(UnitKind::Copywriter, "caption");

        monitor.start_task(UnitKind::Copywriter, task.id).await;
        let state = monitor.get_state(UnitKind::Copywriter).await.unwrap();
        assert_eq!(state.status, WorkerStatus::Working);
        assert_eq!(state.current_task, Some(task.id));

        let result = UnitResult::success(&task, json!("hi")).with_elapsed(Duration::from_millis(40));
        monitor.record_result(&result).await;
        let state = monitor.get_state(UnitKind::Copywriter).await.unwrap();
        assert_eq!(state.status, WorkerStatus::Idle);
        assert!(state.current_task.is_none());
        assert_eq!(state.metrics.invocations, 1);
        assert_eq!(state.metrics.successes, 1);
        assert_eq!(state.metrics.duration_ms, 40);
    }

    #[tokio::test]
    async fn test_record_timeout() {
        let monitor = UnitMonitor::new();
        let task = Task::new(UnitKind::VideoGenerator, "clip").with_timeout(Duration::from_millis(10));
        monitor.start_task(task.unit, task.id).await;
        monitor.record_result(&UnitResult::timed_out(&task)).await;

        let state = monitor.get_state(UnitKind::VideoGenerator).await.unwrap();
        assert_eq!(state.status, WorkerStatus::Error);
        assert_eq!(state.metrics.timeouts, 1);
        assert_eq!(state.metrics.duration_ms, 10);
    }

    #[tokio::test]
    async fn test_aggregate_metrics() {
        let monitor = UnitMonitor::new();
        let a = Task::new(UnitKind::ImageGenerator, "a");
        let b = Task::new(UnitKind::MusicComposer, "b");
        monitor.start_task(a.unit, a.id).await;
        monitor.start_task(b.unit, b.id).await;
        monitor.record_result(&UnitResult::success(&a, json!(1))).await;
        monitor.record_result(&UnitResult::failure(&b, "x")).await;

        let agg = monitor.aggregate_metrics().await;
        assert_eq!(agg.invocations, 2);
        assert_eq!(agg.successes, 1);
        assert_eq!(agg.errors, 1);
    }

    #[tokio::test]
    async fn test_to_json() {
        let monitor = UnitMonitor::new();
        let json = monitor.to_json().await;
        assert!(json["units"].is_array());
        assert!(json["aggregate"].is_object());
    }
}
