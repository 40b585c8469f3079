use atelier_core::{AtelierError, AtelierResult, UnitKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Timeout budgets for unit invocations.
///
/// ```toml
/// default_timeout_ms = 120000
///
/// [timeouts_ms]
/// video_generator = 600000
/// publisher = 30000
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    #[serde(default = "default_timeout_ms")]
    pub default_timeout_ms: u64,
    /// Per-unit overrides keyed by unit type name.
    #[serde(default)]
    pub timeouts_ms: HashMap<String, u64>,
}

fn default_timeout_ms() -> u64 {
    120_000
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: default_timeout_ms(),
            timeouts_ms: HashMap::new(),
        }
    }
}

impl OrchestratorConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> AtelierResult<Self> {
        let config: Self = toml::from_str(s).map_err(|e| AtelierError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout_ms = millis(timeout);
        self
    }

    pub fn with_timeout(mut self, unit: UnitKind, timeout: Duration) -> Self {
        self.timeouts_ms
            .insert(unit.as_str().to_string(), millis(timeout));
        self
    }

    /// Reject zero budgets and overrides for unknown unit types.
    pub fn validate(&self) -> AtelierResult<()> {
        if self.default_timeout_ms == 0 {
            return Err(AtelierError::Config(
                "default_timeout_ms must be greater than zero".to_string(),
            ));
        }
        for (name, ms) in &self.timeouts_ms {
            let unit: UnitKind = name.parse()?;
            if *ms == 0 {
                return Err(AtelierError::Config(format!(
                    "timeout for {unit} must be greater than zero"
                )));
            }
        }
        Ok(())
    }

    /// Budget for one invocation of `unit`.
    pub fn timeout_for(&self, unit: UnitKind) -> Duration {
        let ms = self
            .timeouts_ms
            .get(unit.as_str())
            .copied()
            .unwrap_or(self.default_timeout_ms);
        Duration::from_millis(ms)
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.default_timeout_ms, 120_000);
        assert_eq!(
            config.timeout_for(UnitKind::Copywriter),
            Duration::from_secs(120)
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_with_overrides() {
        let config = OrchestratorConfig::from_toml_str(
            r#"
            default_timeout_ms = 5000

            [timeouts_ms]
            video_generator = 60000
            "#,
        )
        .unwrap();
        assert_eq!(
            config.timeout_for(UnitKind::VideoGenerator),
            Duration::from_secs(60)
        );
        assert_eq!(
            config.timeout_for(UnitKind::Publisher),
            Duration::from_secs(5)
        );
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = OrchestratorConfig::from_toml_str("").unwrap();
        assert_eq!(config, OrchestratorConfig::default());
    }

    #[test]
    fn test_rejects_unknown_unit() {
        let err = OrchestratorConfig::from_toml_str("[timeouts_ms]\nmixer = 10\n").unwrap_err();
        assert!(err.to_string().contains("unknown unit type: mixer"));
    }

    #[test]
    fn test_rejects_zero_timeouts() {
        assert!(OrchestratorConfig::from_toml_str("default_timeout_ms = 0").is_err());
        assert!(OrchestratorConfig::from_toml_str("[timeouts_ms]\npublisher = 0\n").is_err());
    }

    #[test]
    fn test_builders() {
        let config = OrchestratorConfig::default()
            .with_default_timeout(Duration::from_millis(250))
            .with_timeout(UnitKind::SafetyReviewer, Duration::from_millis(40));
        assert_eq!(
            config.timeout_for(UnitKind::SafetyReviewer),
            Duration::from_millis(40)
        );
        assert_eq!(
            config.timeout_for(UnitKind::Assembler),
            Duration::from_millis(250)
        );
    }
}
