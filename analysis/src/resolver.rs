use crate::catalog::ArchiveLocator;
use crate::metadata::{find_world_radius, read_save_metadata};
use crate::snapshot::SnapshotDir;
use serde::Serialize;
use serde_json::{Map, Value};
use shared::ZoneDefinition;
use std::path::PathBuf;

/// Zone configuration of one snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedZones {
    /// Plant zones, repaired, in discovery order
    pub zones: Vec<ZoneDefinition>,
    pub world_radius: f64,
    /// Archive the zones were read from
    pub archive: Option<PathBuf>,
    pub errors: Vec<String>,
}

impl ResolvedZones {
    /// No zones and the default radius
    pub fn unresolved(world_radius: f64) -> Self {
        Self {
            zones: Vec::new(),
            world_radius,
            archive: None,
            errors: Vec::new(),
        }
    }

    pub fn is_resolved(&self) -> bool {
        !self.zones.is_empty()
    }
}

/// Finds the save archive behind a snapshot and reads its zone settings
pub struct ZoneResolver<L> {
    locator: L,
    default_world_radius: f64,
}

impl<L: ArchiveLocator> ZoneResolver<L> {
    pub fn new(locator: L, default_world_radius: f64) -> Self {
        Self {
            locator,
            default_world_radius,
        }
    }

    /// Resolve the zones of a snapshot.
    ///
    /// Never fails: a missing or unreadable archive gives no zones and the
    /// default world radius, with the reason in `errors`.
    pub fn resolve(&self, dir: &SnapshotDir) -> ResolvedZones {
        let mut resolved = ResolvedZones::unresolved(self.default_world_radius);

        let Some(archive) = self.locator.locate(&dir.data_dir) else {
            let message = format!("no save archive found for {}", dir.data_dir.display());
            tracing::warn!("{}", message);
            resolved.errors.push(message);
            return resolved;
        };

        let metadata = match read_save_metadata(&archive) {
            Ok(metadata) => metadata,
            Err(e) => {
                tracing::warn!("Falling back to default zones: {}", e);
                resolved.errors.push(e.to_string());
                return resolved;
            }
        };

        resolved.zones = plant_zones(&metadata.zones);
        resolved.world_radius = match find_world_radius(&metadata.documents)
            .filter(|r| r.is_finite() && *r > 0.0)
        {
            Some(radius) => radius,
            None => {
                tracing::warn!(
                    "No usable SimulationSize in {}, using world radius {}",
                    archive.display(),
                    self.default_world_radius
                );
                self.default_world_radius
            }
        };
        resolved.errors.extend(metadata.errors);
        resolved.archive = Some(archive);

        tracing::info!(
            "Resolved {} plant zones, world radius {}",
            resolved.zones.len(),
            resolved.world_radius
        );
        resolved
    }
}

/// Keep the candidates that describe plant zones, with known corruption fixed
pub fn plant_zones(candidates: &[Map<String, Value>]) -> Vec<ZoneDefinition> {
    candidates
        .iter()
        .filter_map(ZoneDefinition::from_fields)
        .filter(ZoneDefinition::is_plant_zone)
        .map(ZoneDefinition::repaired)
        .collect()
}
