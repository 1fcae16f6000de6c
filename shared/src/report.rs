use crate::ZoneDefinition;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Which classification strategy produced the zone names of a report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationMode {
    /// Zone geometry resolved from the save's settings
    Metadata,
    /// Fixed-threshold island layout
    Legacy,
    /// No zone data; every organism is `Unknown`
    Unresolved,
}

/// Spatial distribution of one snapshot across its habitat zones
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpatialReport {
    /// Organisms that had both coordinates
    pub total_organisms: usize,

    /// Organisms skipped because a coordinate was missing
    pub unclassified: usize,

    pub world_radius: f64,

    pub classification: ClassificationMode,

    pub zone_totals: BTreeMap<String, usize>,

    /// Per-zone summary rows, sorted by zone name
    pub zones: Vec<ZoneSummary>,

    pub zone_species_breakdown: BTreeMap<String, BTreeMap<String, usize>>,

    pub species_zone_preferences: BTreeMap<String, SpeciesPreference>,

    pub coordinate_ranges_by_zone: BTreeMap<String, CoordinateRange>,

    pub radial_analysis: RadialAnalysis,

    pub zone_configuration: Vec<ZoneDefinition>,

    /// Files that failed to load, as `file: reason`
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneSummary {
    pub zone: String,
    pub count: usize,
    /// Share of all classified organisms, 0-100
    pub percentage: f64,
    pub dominant_species: Option<SpeciesCount>,
    pub species_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeciesCount {
    pub species: String,
    pub count: usize,
}

/// Where one species lives
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeciesPreference {
    pub total: usize,
    pub primary_zone: String,
    pub primary_count: usize,
    pub zones: BTreeMap<String, ZoneShare>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoneShare {
    pub count: usize,
    /// Share of the species' own population, 0-100
    pub percentage: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoordinateRange {
    pub x_range: [f64; 2],
    pub y_range: [f64; 2],
    pub center: [f64; 2],
    pub organism_count: usize,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RadialAnalysis {
    /// Absolute distance from the origin, `[min, max]`
    pub overall_range: [f64; 2],
    /// The same range divided by the world radius
    pub relative_range: [f64; 2],
    pub mean_distance: f64,
    pub zone_distance_ranges: BTreeMap<String, DistanceRange>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistanceRange {
    pub min_distance: f64,
    pub max_distance: f64,
    pub mean_distance: f64,
}

impl SpatialReport {
    /// Most and least populated zones, first encountered wins ties
    pub fn population_extremes(&self) -> Option<(&ZoneSummary, &ZoneSummary)> {
        let mut iter = self.zones.iter();
        let first = iter.next()?;
        let (mut most, mut least) = (first, first);
        for zone in iter {
            if zone.count > most.count {
                most = zone;
            }
            if zone.count < least.count {
                least = zone;
            }
        }
        Some((most, least))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(zone: &str, count: usize) -> ZoneSummary {
        ZoneSummary {
            zone: zone.to_string(),
            count,
            percentage: 0.0,
            dominant_species: None,
            species_count: 0,
        }
    }

    fn report(zones: Vec<ZoneSummary>) -> SpatialReport {
        SpatialReport {
            total_organisms: zones.iter().map(|z| z.count).sum(),
            unclassified: 0,
            world_radius: 1000.0,
            classification: ClassificationMode::Metadata,
            zone_totals: zones.iter().map(|z| (z.zone.clone(), z.count)).collect(),
            zones,
            zone_species_breakdown: BTreeMap::new(),
            species_zone_preferences: BTreeMap::new(),
            coordinate_ranges_by_zone: BTreeMap::new(),
            radial_analysis: RadialAnalysis::default(),
            zone_configuration: Vec::new(),
            errors: Vec::new(),
        }
    }

    #[test]
    fn test_population_extremes() {
        let report = report(vec![summary("Core", 4), summary("Mid", 9), summary("Outer", 1)]);
        let (most, least) = report.population_extremes().unwrap();
        assert_eq!(most.zone, "Mid");
        assert_eq!(least.zone, "Outer");
    }

    #[test]
    fn test_population_extremes_empty() {
        assert!(report(Vec::new()).population_extremes().is_none());
    }

    #[test]
    fn test_report_serialization() {
        let report = report(vec![summary("Core", 2)]);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["classification"], "metadata");
        assert_eq!(json["zone_totals"]["Core"], 2);

        let decoded: SpatialReport = serde_json::from_value(json).unwrap();
        assert_eq!(decoded, report);
    }
}
