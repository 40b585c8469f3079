//! `atelier.toml` loading.
//!
//! A missing file yields the defaults. A file that exists but fails to parse
//! or validate is an error.

use atelier_core::{AtelierError, AtelierResult};
use atelier_orchestrator::{default_roster, OrchestratorConfig, SimulationConfig};
use serde::Deserialize;
use std::path::Path;

/// Full CLI configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AtelierConfig {
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
}

impl AtelierConfig {
    /// Check every section, including unit names used by the simulation.
    pub fn validate(&self) -> AtelierResult<()> {
        self.orchestrator.validate()?;
        default_roster(&self.simulation)?;
        Ok(())
    }
}

/// Read, parse and validate the config at `path`.
pub fn load_config(path: &Path) -> AtelierResult<AtelierConfig> {
    if !path.exists() {
        tracing::info!(path = %path.display(), "No config file found, using defaults");
        return Ok(AtelierConfig::default());
    }

    let raw = std::fs::read_to_string(path).map_err(|e| {
        AtelierError::Config(format!("Failed to read config {}: {e}", path.display()))
    })?;
    let config: AtelierConfig = toml::from_str(&raw).map_err(|e| {
        AtelierError::Config(format!("Failed to parse config {}: {e}", path.display()))
    })?;
    config.validate()?;
    Ok(config)
}
