//! Provider-free stand-ins for every unit type.
//!
//! [`SimulatedUnit`] does no real generation work. It sleeps for a configured
//! latency and then succeeds, fails, hangs or panics, which makes the full
//! roster usable for dry runs and for exercising each topology end to end.

use crate::unit::WorkUnit;
use async_trait::async_trait;
use atelier_core::{AtelierResult, Task, UnitKind, UnitPhase, UnitResult};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// What a simulated unit does once its latency has elapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Behavior {
    /// Returns a plausible output for the unit type.
    Succeed,
    /// Returns an error result.
    Fail,
    /// Never returns on its own; only the cancellation token ends it.
    Hang,
    /// Panics inside `execute`.
    Panic,
}

/// `[simulation]` section of the CLI configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationConfig {
    #[serde(default = "default_latency_ms")]
    pub default_latency_ms: u64,
    /// Per-unit latency overrides keyed by unit type name.
    #[serde(default)]
    pub latency_ms: HashMap<String, u64>,
    #[serde(default)]
    pub fail: Vec<String>,
    #[serde(default)]
    pub hang: Vec<String>,
    #[serde(default)]
    pub panic: Vec<String>,
    /// Units that declare themselves unsafe for concurrent stages.
    #[serde(default)]
    pub sequential_only: Vec<String>,
}

fn default_latency_ms() -> u64 {
    50
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            default_latency_ms: default_latency_ms(),
            latency_ms: HashMap::new(),
            fail: Vec::new(),
            hang: Vec::new(),
            panic: Vec::new(),
            sequential_only: Vec::new(),
        }
    }
}

impl SimulationConfig {
    fn behavior_for(&self, unit: UnitKind) -> AtelierResult<Behavior> {
        let mut behavior = Behavior::Succeed;
        for (names, candidate) in [
            (&self.fail, Behavior::Fail),
            (&self.hang, Behavior::Hang),
            (&self.panic, Behavior::Panic),
        ] {
            for name in names {
                if name.parse::<UnitKind>()? == unit {
                    behavior = candidate;
                }
            }
        }
        Ok(behavior)
    }

    fn latency_for(&self, unit: UnitKind) -> AtelierResult<Duration> {
        let mut ms = self.default_latency_ms;
        for (name, value) in &self.latency_ms {
            if name.parse::<UnitKind>()? == unit {
                ms = *value;
            }
        }
        Ok(Duration::from_millis(ms))
    }

    fn is_sequential_only(&self, unit: UnitKind) -> AtelierResult<bool> {
        for name in &self.sequential_only {
            if name.parse::<UnitKind>()? == unit {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// Build one simulated unit per unit type, in declared order.
pub fn default_roster(config: &SimulationConfig) -> AtelierResult<Vec<Arc<dyn WorkUnit>>> {
    UnitKind::ALL
        .into_iter()
        .map(|unit| {
            let sim = SimulatedUnit::new(unit)
                .with_behavior(config.behavior_for(unit)?)
                .with_latency(config.latency_for(unit)?)
                .with_concurrency_safe(!config.is_sequential_only(unit)?);
            Ok(Arc::new(sim) as Arc<dyn WorkUnit>)
        })
        .collect()
}

/// Display name for a unit type.
pub fn display_name(unit: UnitKind) -> &'static str {
    match unit {
        UnitKind::ContentAnalyzer => "Content Analyzer",
        UnitKind::Copywriter => "Copywriter",
        UnitKind::ImageGenerator => "Image Generator",
        UnitKind::VideoGenerator => "Video Generator",
        UnitKind::MusicComposer => "Music Composer",
        UnitKind::VoiceNarrator => "Voice Narrator",
        UnitKind::Assembler => "Assembler",
        UnitKind::SafetyReviewer => "Safety Reviewer",
        UnitKind::Publisher => "Publisher",
    }
}

/// A stand-in worker unit with scripted behavior.
#[derive(Debug, Clone)]
pub struct SimulatedUnit {
    unit: UnitKind,
    behavior: Behavior,
    latency: Duration,
    concurrency_safe: bool,
}

impl SimulatedUnit {
    pub fn new(unit: UnitKind) -> Self {
        Self {
            unit,
            behavior: Behavior::Succeed,
            latency: Duration::from_millis(default_latency_ms()),
            concurrency_safe: true,
        }
    }

    pub fn with_behavior(mut self, behavior: Behavior) -> Self {
        self.behavior = behavior;
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_concurrency_safe(mut self, safe: bool) -> Self {
        self.concurrency_safe = safe;
        self
    }

    fn output(&self, task: &Task) -> serde_json::Value {
        let upstream: Vec<&str> = UnitKind::ALL
            .iter()
            .filter(|k| task.upstream(**k).is_some())
            .map(UnitKind::as_str)
            .collect();

        match self.unit {
            UnitKind::ContentAnalyzer => {
                let keywords: Vec<String> = task
                    .instruction
                    .split_whitespace()
                    .filter(|w| w.len() > 4)
                    .take(5)
                    .map(str::to_lowercase)
                    .collect();
                json!({
                    "refined_instruction": format!("{} (refined)", task.instruction.trim()),
                    "audience": "general",
                    "tone": "upbeat",
                    "keywords": keywords,
                })
            }
            UnitKind::SafetyReviewer => json!({
                "approved": true,
                "reviewed": upstream,
            }),
            UnitKind::Publisher => json!({
                "published_to": task.context.get("targets").cloned().unwrap_or_else(|| json!([])),
            }),
            _ => json!({
                "unit": self.unit,
                "instruction": task.instruction,
                "inputs": upstream,
            }),
        }
    }

    fn artifact_ref(&self, task: &Task) -> Option<String> {
        match self.unit.phase() {
            UnitPhase::Generation => Some(format!("sim://{}/{}", self.unit, task.id)),
            UnitPhase::PostProcessing if self.unit.is_terminal() => {
                Some(format!("sim://{}/{}", self.unit, task.id))
            }
            _ => None,
        }
    }
}

#[async_trait]
impl WorkUnit for SimulatedUnit {
    fn kind(&self) -> UnitKind {
        self.unit
    }

    fn display_name(&self) -> &str {
        display_name(self.unit)
    }

    fn concurrency_safe(&self) -> bool {
        self.concurrency_safe
    }

    async fn execute(&self, task: &Task, cancel: &CancellationToken) -> UnitResult {
        tokio::select! {
            _ = tokio::time::sleep(self.latency) => {}
            _ = cancel.cancelled() => return UnitResult::cancelled(task, "cancelled before completion"),
        }

        match self.behavior {
            Behavior::Succeed => {
                let result = UnitResult::success(task, self.output(task))
                    .with_metadata("simulated", json!(true));
                match self.artifact_ref(task) {
                    Some(reference) => result.with_ref(reference),
                    None => result,
                }
            }
            Behavior::Fail => {
                UnitResult::failure(task, format!("simulated failure in {}", self.unit))
            }
            Behavior::Hang => {
                cancel.cancelled().await;
                UnitResult::cancelled(task, "cancelled while hanging")
            }
            Behavior::Panic => panic!("simulated fault in {}", self.unit),
        }
    }
}
