use crate::AtelierError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The fixed roster of worker unit types.
///
/// Variants are listed in declared pipeline order; [`UnitKind::ALL`] preserves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    /// Analyzes the raw instruction and informs every later unit.
    ContentAnalyzer,
    /// Writes captions, scripts and other copy.
    Copywriter,
    /// Produces still images.
    ImageGenerator,
    /// Produces video clips.
    VideoGenerator,
    /// Produces a music track.
    MusicComposer,
    /// Produces a spoken voice-over.
    VoiceNarrator,
    /// Combines generated media into the composite artifact.
    Assembler,
    /// Safety and compliance gate over the assembled artifact.
    SafetyReviewer,
    /// Publishes the approved artifact to its targets.
    Publisher,
}

/// Where a unit type sits in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitPhase {
    /// Runs before generation and refines the instruction.
    Analysis,
    /// Primary media generation.
    Generation,
    /// Runs over the generated media, always in declared order.
    PostProcessing,
}

impl UnitKind {
    /// Every unit type in declared pipeline order.
    pub const ALL: [UnitKind; 9] = [
        UnitKind::ContentAnalyzer,
        UnitKind::Copywriter,
        UnitKind::ImageGenerator,
        UnitKind::VideoGenerator,
        UnitKind::MusicComposer,
        UnitKind::VoiceNarrator,
        UnitKind::Assembler,
        UnitKind::SafetyReviewer,
        UnitKind::Publisher,
    ];

    /// The unit whose result becomes the run's final output.
    pub const TERMINAL: UnitKind = UnitKind::Assembler;

    /// Stable snake_case name, also used as the unit's context key.
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitKind::ContentAnalyzer => "content_analyzer",
            UnitKind::Copywriter => "copywriter",
            UnitKind::ImageGenerator => "image_generator",
            UnitKind::VideoGenerator => "video_generator",
            UnitKind::MusicComposer => "music_composer",
            UnitKind::VoiceNarrator => "voice_narrator",
            UnitKind::Assembler => "assembler",
            UnitKind::SafetyReviewer => "safety_reviewer",
            UnitKind::Publisher => "publisher",
        }
    }

    /// Context key under which this unit's artifact references are stored.
    pub fn refs_key(&self) -> String {
        format!("{}_refs", self.as_str())
    }

    /// Pipeline phase of this unit type.
    pub fn phase(&self) -> UnitPhase {
        match self {
            UnitKind::ContentAnalyzer => UnitPhase::Analysis,
            UnitKind::Copywriter
            | UnitKind::ImageGenerator
            | UnitKind::VideoGenerator
            | UnitKind::MusicComposer
            | UnitKind::VoiceNarrator => UnitPhase::Generation,
            UnitKind::Assembler | UnitKind::SafetyReviewer | UnitKind::Publisher => {
                UnitPhase::PostProcessing
            }
        }
    }

    /// Whether a failure of this unit in a sequential stage halts the run.
    pub fn is_critical(&self) -> bool {
        matches!(self, UnitKind::ContentAnalyzer | UnitKind::SafetyReviewer)
    }

    /// Whether this unit supplies the run's final output.
    pub fn is_terminal(&self) -> bool {
        *self == Self::TERMINAL
    }

    /// Priority tag attached to tasks for this unit.
    pub fn default_priority(&self) -> Priority {
        if self.is_critical() {
            return Priority::Critical;
        }
        match self.phase() {
            UnitPhase::Analysis | UnitPhase::Generation => Priority::High,
            UnitPhase::PostProcessing if self.is_terminal() => Priority::High,
            UnitPhase::PostProcessing if *self == UnitKind::Publisher => Priority::Low,
            UnitPhase::PostProcessing => Priority::Medium,
        }
    }

    /// Unit types of the given phase, in declared order.
    pub fn in_phase(phase: UnitPhase) -> impl Iterator<Item = UnitKind> {
        Self::ALL.into_iter().filter(move |k| k.phase() == phase)
    }
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UnitKind {
    type Err = AtelierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == normalized)
            .ok_or_else(|| AtelierError::Config(format!("unknown unit type: {s}")))
    }
}

/// Priority tag carried by a task. Informational only; never affects scheduling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Failure halts the run.
    Critical,
    /// Primary generation work.
    High,
    /// Supporting steps.
    Medium,
    /// Best-effort delivery steps.
    Low,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::Critical => write!(f, "critical"),
            Priority::High => write!(f, "high"),
            Priority::Medium => write!(f, "medium"),
            Priority::Low => write!(f, "low"),
        }
    }
}
