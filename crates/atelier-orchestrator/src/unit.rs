use atelier_core::{Task, UnitKind, UnitResult};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Trait that every worker unit must implement.
///
/// `execute` must not fail: internal faults are reported as a [`UnitResult`]
/// with an error status. The supervised runner catches panics as a second
/// line of defense, but a well-behaved unit does not rely on it.
///
/// `cancel` fires when the runner stops waiting for the unit (its timeout
/// elapsed). Long-running units should watch it and bail out early; the runner
/// never waits for them either way.
#[async_trait]
pub trait WorkUnit: Send + Sync {
    /// The unit type this worker fills in the roster.
    fn kind(&self) -> UnitKind;

    /// Human-readable name used in logs.
    fn display_name(&self) -> &str;

    /// Whether this unit may run concurrently with other units of the same run.
    ///
    /// Units returning `false` are kept out of concurrent stages and run in a
    /// sequential slot instead.
    fn concurrency_safe(&self) -> bool {
        true
    }

    /// Execute one task against the current context snapshot.
    async fn execute(&self, task: &Task, cancel: &CancellationToken) -> UnitResult;
}
