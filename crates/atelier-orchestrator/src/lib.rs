//! Task-orchestration engine with supervised execution and three stage topologies.
//!
//! Coordinates a fixed roster of worker units (analysis, media generation,
//! post-processing) that together produce one composite artifact. Each unit
//! runs under a timeout and fault envelope; the orchestrator folds every
//! successful result into a shared context that later units read from.
//!
//! # Main types
//!
//! - [`Orchestrator`]: Owns the unit registry and runs a [`Topology`] over it.
//! - [`WorkUnit`]: The contract every worker unit implements.
//! - [`run_supervised`]: Timeout and panic envelope around a single unit call.
//! - [`WorkflowResult`]: Accumulated record of one run.
//! - [`UnitMonitor`]: Per-unit state and metrics across runs.
//! - [`SimulatedUnit`]: Provider-free unit used for dry runs.

/// Timeout configuration.
pub mod config;
/// Orchestration engine and topology execution.
pub mod engine;
/// Unit health and metrics monitoring.
pub mod monitor;
/// Unit registry keyed by unit type.
pub mod registry;
pub mod roster;
/// Supervised execution of a single unit.
pub mod runner;
/// Topologies and their stage plans.
pub mod topology;
/// The worker unit contract.
pub mod unit;
/// Run records, status aggregation and run summaries.
pub mod workflow;

pub use config::OrchestratorConfig;
pub use engine::{Orchestrator, RunRequest};
pub use monitor::{UnitMetrics, UnitMonitor, UnitState, WorkerStatus};
pub use registry::UnitRegistry;
pub use roster::{default_roster, Behavior, SimulatedUnit, SimulationConfig};
pub use runner::run_supervised;
pub use topology::{Stage, StageMode, Topology};
pub use unit::WorkUnit;
pub use workflow::{RunSummary, WorkflowResult, WorkflowStatus, PRIMARY_INSTRUCTION_KEY};
