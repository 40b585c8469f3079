use crate::unit::WorkUnit;
use atelier_core::UnitKind;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Registry of worker units, keyed by unit type.
///
/// Each orchestrator owns exactly one registry. Registering a unit type that
/// is already present replaces the previous unit.
pub struct UnitRegistry {
    units: HashMap<UnitKind, Arc<dyn WorkUnit>>,
}

impl UnitRegistry {
    pub fn new() -> Self {
        Self {
            units: HashMap::new(),
        }
    }

    /// Register a unit, returning the unit it replaced, if any.
    pub fn register(&mut self, unit: Arc<dyn WorkUnit>) -> Option<Arc<dyn WorkUnit>> {
        let kind = unit.kind();
        let name = unit.display_name().to_string();
        let previous = self.units.insert(kind, unit);
        match &previous {
            Some(old) => warn!(
                unit = %kind,
                name = %name,
                replaced = %old.display_name(),
                "Replaced registered unit"
            ),
            None => info!(unit = %kind, name = %name, "Registered unit"),
        }
        previous
    }

    pub fn get(&self, kind: UnitKind) -> Option<&Arc<dyn WorkUnit>> {
        self.units.get(&kind)
    }

    pub fn contains(&self, kind: UnitKind) -> bool {
        self.units.contains_key(&kind)
    }

    /// Registered unit types in declared pipeline order.
    pub fn kinds(&self) -> Vec<UnitKind> {
        UnitKind::ALL
            .into_iter()
            .filter(|k| self.units.contains_key(k))
            .collect()
    }

    pub fn unit_count(&self) -> usize {
        self.units.len()
    }
}

impl Default for UnitRegistry {
    fn default() -> Self {
        Self::new()
    }
}
