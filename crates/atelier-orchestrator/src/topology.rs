use atelier_core::{AtelierError, UnitKind, UnitPhase};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Stage arrangement selected per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Topology {
    /// Every unit alone, in declared order.
    Sequential,
    /// Analysis and generation fanned out, then post-processing in order.
    Parallel,
    /// Analysis alone, generation fanned out, then post-processing in order.
    Hybrid,
}

impl fmt::Display for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Topology::Sequential => write!(f, "sequential"),
            Topology::Parallel => write!(f, "parallel"),
            Topology::Hybrid => write!(f, "hybrid"),
        }
    }
}

impl FromStr for Topology {
    type Err = AtelierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sequential" => Ok(Topology::Sequential),
            "parallel" => Ok(Topology::Parallel),
            "hybrid" => Ok(Topology::Hybrid),
            other => Err(AtelierError::Config(format!("unknown topology: {other}"))),
        }
    }
}

/// How the members of a stage are executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageMode {
    /// One unit, alone.
    Single,
    /// All concurrency-safe members at once, against one shared snapshot.
    Concurrent,
}

/// One step of a topology.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    pub units: Vec<UnitKind>,
    pub mode: StageMode,
    /// A critical unit failing in this stage stops the run.
    pub halt_on_critical: bool,
    /// A successful result is also copied into the instruction aliases.
    pub refines_instruction: bool,
}

impl Stage {
    fn single(unit: UnitKind) -> Self {
        Self {
            units: vec![unit],
            mode: StageMode::Single,
            halt_on_critical: true,
            refines_instruction: false,
        }
    }

    fn concurrent(units: impl IntoIterator<Item = UnitKind>) -> Self {
        Self {
            units: units.into_iter().collect(),
            mode: StageMode::Concurrent,
            halt_on_critical: false,
            refines_instruction: false,
        }
    }

    fn non_halting(mut self) -> Self {
        self.halt_on_critical = false;
        self
    }

    fn refining(mut self) -> Self {
        self.refines_instruction = true;
        self
    }

    /// Short label used in run summaries and logs.
    pub fn label(&self) -> String {
        let names: Vec<&str> = self.units.iter().map(UnitKind::as_str).collect();
        match self.mode {
            StageMode::Single => names.join(","),
            StageMode::Concurrent => format!("concurrent[{}]", names.join(",")),
        }
    }
}

impl Topology {
    /// The fixed stage plan for this topology.
    pub fn stages(&self) -> Vec<Stage> {
        let post_processing = UnitKind::in_phase(UnitPhase::PostProcessing).map(Stage::single);
        match self {
            Topology::Sequential => UnitKind::ALL.into_iter().map(Stage::single).collect(),
            Topology::Parallel => {
                let front = UnitKind::ALL
                    .into_iter()
                    .filter(|k| k.phase() != UnitPhase::PostProcessing);
                std::iter::once(Stage::concurrent(front))
                    .chain(post_processing)
                    .collect()
            }
            Topology::Hybrid => [
                Stage::single(UnitKind::ContentAnalyzer)
                    .non_halting()
                    .refining(),
                Stage::concurrent(UnitKind::in_phase(UnitPhase::Generation)),
            ]
            .into_iter()
            .chain(post_processing)
            .collect(),
        }
    }
}
