use crate::unit::WorkUnit;
use atelier_core::{Task, UnitResult};
use std::any::Any;
use std::sync::Arc;
use tokio::task::JoinError;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Run a unit's `execute` under the task's timeout and a fault envelope.
///
/// Always returns a well-formed [`UnitResult`]:
/// - completed in time: the unit's result, normalized, with the measured `elapsed`;
/// - deadline elapsed: status `timeout`, `elapsed` equal to the budget. The call is
///   detached rather than awaited and its cancellation token is fired;
/// - panicked: status `error` carrying the panic message.
pub async fn run_supervised(unit: Arc<dyn WorkUnit>, task: Task) -> UnitResult {
    let kind = unit.kind();
    let task = Arc::new(task);
    let cancel = CancellationToken::new();

    info!(
        unit = %kind,
        name = %unit.display_name(),
        task_id = %task.id,
        priority = %task.priority,
        timeout_ms = task.timeout.as_millis() as u64,
        "Unit started"
    );

    let start = Instant::now();
    let handle = {
        let unit = Arc::clone(&unit);
        let task = Arc::clone(&task);
        let cancel = cancel.clone();
        tokio::spawn(async move { unit.execute(&task, &cancel).await })
    };

    // Dropping the JoinHandle on timeout detaches the spawned call.
    let result = match tokio::time::timeout(task.timeout, handle).await {
        Ok(Ok(result)) => correlate(result, &task)
            .normalized()
            .with_elapsed(start.elapsed()),
        Ok(Err(e)) => UnitResult::failure(&task, fault_message(e)).with_elapsed(start.elapsed()),
        Err(_) => {
            cancel.cancel();
            UnitResult::timed_out(&task)
        }
    };

    if result.is_success() {
        info!(
            unit = %kind,
            task_id = %task.id,
            elapsed_ms = result.elapsed.as_millis() as u64,
            refs = result.output_refs.len(),
            "Unit finished"
        );
    } else {
        warn!(
            unit = %kind,
            task_id = %task.id,
            status = %result.status,
            elapsed_ms = result.elapsed.as_millis() as u64,
            error = result.error.as_deref().unwrap_or_default(),
            "Unit did not succeed"
        );
    }

    result
}

/// Pin the result to the task it answers.
fn correlate(mut result: UnitResult, task: &Task) -> UnitResult {
    if result.unit != task.unit || result.task_id != task.id {
        warn!(
            unit = %task.unit,
            task_id = %task.id,
            reported_unit = %result.unit,
            reported_task = %result.task_id,
            "Unit returned a result for a different task"
        );
        result.unit = task.unit;
        result.task_id = task.id;
    }
    result
}

fn fault_message(err: JoinError) -> String {
    if err.is_panic() {
        panic_message(err.into_panic())
    } else {
        "unit task was aborted".to_string()
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unit panicked".to_string()
    }
}
