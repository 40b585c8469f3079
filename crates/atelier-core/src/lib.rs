//! Core types and error definitions for the Atelier orchestration engine.
//!
//! This crate provides the foundational types shared across all Atelier crates:
//! error handling, the closed set of worker unit types, and the task/result
//! model exchanged between the orchestrator and its worker units.
//!
//! # Main types
//!
//! - [`AtelierError`]: Unified error enum for all Atelier subsystems.
//! - [`AtelierResult`]: Convenience alias for `Result<T, AtelierError>`.
//! - [`UnitKind`]: The fixed roster of worker unit types.
//! - [`Task`]: Immutable description of one unit invocation.
//! - [`UnitResult`]: The outcome of executing a [`Task`].

/// Serde helpers for encoding [`std::time::Duration`] as milliseconds.
pub mod duration_ms;
/// Worker unit types, phases, and priorities.
pub mod kind;
/// Unit results and their status tags.
pub mod result;
/// Task descriptions handed to worker units.
pub mod task;

pub use kind::{Priority, UnitKind, UnitPhase};
pub use result::{UnitResult, UnitStatus};
pub use task::Task;

/// Key/value state threaded through a run.
///
/// Used both for the caller's parameter bag and for the accumulated context.
pub type ContextMap = serde_json::Map<String, serde_json::Value>;

// --- Error types ---

/// Top-level error type for the Atelier engine.
///
/// Each variant corresponds to a subsystem that can produce errors.
#[derive(Debug, thiserror::Error)]
pub enum AtelierError {
    /// A fault raised inside a worker unit.
    #[error("Unit error: {0}")]
    Unit(String),

    /// An error from the orchestration engine itself.
    #[error("Orchestrator error: {0}")]
    Orchestrator(String),

    /// An error in configuration parsing or validation.
    #[error("Config error: {0}")]
    Config(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A convenience `Result` alias using [`AtelierError`].
pub type AtelierResult<T> = Result<T, AtelierError>;
