pub mod aggregate;
pub mod catalog;
pub mod classify;
pub mod combat;
pub mod config;
pub mod metadata;
pub mod neural;
pub mod population;
pub mod resolver;
pub mod snapshot;
pub mod stats;

pub use aggregate::{aggregate_records, SpatialAggregator};
pub use catalog::{
    categorize_entry, extract_save, ArchiveLocator, CatalogError, EntryKind, ExtractionStats,
    FixedArchive, SaveCatalog, SaveEntry, SaveKind,
};
pub use classify::{classify, Classifier, LegacyIslands, ZoneMap, BEYOND_ZONE, VOID_ZONE};
pub use combat::{analyze_combat, CombatOptions, CombatProfile, CombatReport};
pub use config::{AnalysisConfig, ClassifierFallback, ConfigError, LegacyLayout};
pub use metadata::{read_save_metadata, MetadataError, SaveMetadata};
pub use neural::{analyze_neural, BrainShape, SpeciesBrains};
pub use population::{compare_populations, summarize_population, PopulationComparison, PopulationSummary};
pub use resolver::{ResolvedZones, ZoneResolver};
pub use snapshot::{extract_fields, load_snapshot, FieldTable, Snapshot, SnapshotDir, SnapshotError};

use std::path::Path;

/// Zones and world radius of the snapshot at `path`; see [`ZoneResolver::resolve`]
pub fn resolve_zones<L: ArchiveLocator>(
    locator: L,
    path: &Path,
    config: &AnalysisConfig,
) -> ResolvedZones {
    ZoneResolver::new(locator, config.default_world_radius).resolve(&SnapshotDir::new(path))
}

/// Spatial report of the snapshot at `path`; see [`SpatialAggregator::aggregate`]
pub fn aggregate<L: ArchiveLocator>(
    locator: L,
    path: &Path,
    config: &AnalysisConfig,
) -> Result<shared::SpatialReport, SnapshotError> {
    SpatialAggregator::new(locator, config.clone()).aggregate(path)
}
