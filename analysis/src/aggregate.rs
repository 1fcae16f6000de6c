use crate::catalog::ArchiveLocator;
use crate::classify::Classifier;
use crate::config::AnalysisConfig;
use crate::resolver::ZoneResolver;
use crate::snapshot::{load_snapshot, SnapshotError};
use crate::stats::{mean, min_max, percentage};
use shared::{
    CoordinateRange, DistanceRange, RadialAnalysis, Record, SpatialReport, SpeciesCount,
    SpeciesPreference, ZoneDefinition, ZoneShare, ZoneSummary, NO_SPECIES,
};
use std::collections::BTreeMap;
use std::path::Path;

pub const X_FIELD: &str = "rb2d.px";
pub const Y_FIELD: &str = "rb2d.py";
pub const SPECIES_FIELD: &str = "genes.tag";

/// Counts keyed by name, in first-seen order
#[derive(Debug, Default)]
struct Tally(Vec<(String, usize)>);

impl Tally {
    fn bump(&mut self, key: &str) {
        match self.0.iter_mut().find(|(k, _)| k == key) {
            Some((_, count)) => *count += 1,
            None => self.0.push((key.to_string(), 1)),
        }
    }

    /// Highest count; the first key seen wins a tie
    fn leader(&self) -> Option<(&str, usize)> {
        self.0.iter().fold(None, |best, (key, count)| match best {
            Some((_, top)) if *count <= top => best,
            _ => Some((key.as_str(), *count)),
        })
    }

    fn total(&self) -> usize {
        self.0.iter().map(|(_, c)| c).sum()
    }

    fn to_map(&self) -> BTreeMap<String, usize> {
        self.0.iter().cloned().collect()
    }
}

/// Everything collected for one zone
#[derive(Debug, Default)]
struct ZoneBucket {
    species: Tally,
    xs: Vec<f64>,
    ys: Vec<f64>,
    distances: Vec<f64>,
}

/// Classify every record and summarize the zones they fall in.
///
/// Records without both coordinates are counted in `unclassified` and left
/// out of every other figure. A missing species tag is reported as `None`.
pub fn aggregate_records(
    records: &[Record],
    classifier: &Classifier,
    world_radius: f64,
    zone_configuration: Vec<ZoneDefinition>,
    errors: Vec<String>,
) -> SpatialReport {
    let mut buckets: BTreeMap<String, ZoneBucket> = BTreeMap::new();
    let mut species_zones: BTreeMap<String, Tally> = BTreeMap::new();
    let mut all_distances = Vec::new();
    let mut unclassified = 0;

    for record in records {
        let (Some(x), Some(y)) = (record.f64_at(X_FIELD), record.f64_at(Y_FIELD)) else {
            unclassified += 1;
            continue;
        };
        let species = record.str_at(SPECIES_FIELD).unwrap_or(NO_SPECIES);
        let zone = classifier.classify(x, y);
        let distance = x.hypot(y);

        let bucket = buckets.entry(zone.to_string()).or_default();
        bucket.species.bump(species);
        bucket.xs.push(x);
        bucket.ys.push(y);
        bucket.distances.push(distance);

        species_zones
            .entry(species.to_string())
            .or_default()
            .bump(zone);
        all_distances.push(distance);
    }

    let total = all_distances.len();
    tracing::debug!(
        "Classified {} organisms into {} zones ({} without coordinates)",
        total,
        buckets.len(),
        unclassified
    );

    // 1. per-zone summaries
    let zones = buckets
        .iter()
        .map(|(zone, bucket)| ZoneSummary {
            zone: zone.clone(),
            count: bucket.xs.len(),
            percentage: percentage(bucket.xs.len(), total),
            dominant_species: bucket.species.leader().map(|(species, count)| SpeciesCount {
                species: species.to_string(),
                count,
            }),
            species_count: bucket.species.0.len(),
        })
        .collect();

    // 2. where each species lives
    let species_zone_preferences = species_zones
        .iter()
        .filter_map(|(species, tally)| {
            let total = tally.total();
            let (primary_zone, primary_count) = tally.leader()?;
            let zones = tally
                .0
                .iter()
                .map(|(zone, count)| {
                    let share = ZoneShare {
                        count: *count,
                        percentage: percentage(*count, total),
                    };
                    (zone.clone(), share)
                })
                .collect();
            Some((
                species.clone(),
                SpeciesPreference {
                    total,
                    primary_zone: primary_zone.to_string(),
                    primary_count,
                    zones,
                },
            ))
        })
        .collect();

    // 3. geometry per zone
    let mut coordinate_ranges_by_zone = BTreeMap::new();
    let mut zone_distance_ranges = BTreeMap::new();
    for (zone, bucket) in &buckets {
        let (Some(x_range), Some(y_range), Some(cx), Some(cy)) = (
            min_max(&bucket.xs),
            min_max(&bucket.ys),
            mean(&bucket.xs),
            mean(&bucket.ys),
        ) else {
            continue;
        };
        coordinate_ranges_by_zone.insert(
            zone.clone(),
            CoordinateRange {
                x_range: [x_range.0, x_range.1],
                y_range: [y_range.0, y_range.1],
                center: [cx, cy],
                organism_count: bucket.xs.len(),
            },
        );

        if let (Some((lo, hi)), Some(avg)) = (min_max(&bucket.distances), mean(&bucket.distances)) {
            zone_distance_ranges.insert(
                zone.clone(),
                DistanceRange {
                    min_distance: lo,
                    max_distance: hi,
                    mean_distance: avg,
                },
            );
        }
    }

    let (lo, hi) = min_max(&all_distances).unwrap_or((0.0, 0.0));
    let radial_analysis = RadialAnalysis {
        overall_range: [lo, hi],
        relative_range: [lo / world_radius, hi / world_radius],
        mean_distance: mean(&all_distances).unwrap_or(0.0),
        zone_distance_ranges,
    };

    SpatialReport {
        total_organisms: total,
        unclassified,
        world_radius,
        classification: classifier.mode(),
        zone_totals: buckets
            .iter()
            .map(|(zone, bucket)| (zone.clone(), bucket.xs.len()))
            .collect(),
        zones,
        zone_species_breakdown: buckets
            .iter()
            .map(|(zone, bucket)| (zone.clone(), bucket.species.to_map()))
            .collect(),
        species_zone_preferences,
        coordinate_ranges_by_zone,
        radial_analysis,
        zone_configuration,
        errors,
    }
}

/// Resolves zones, loads a snapshot and builds its spatial report
pub struct SpatialAggregator<L> {
    resolver: ZoneResolver<L>,
    config: AnalysisConfig,
}

impl<L: ArchiveLocator> SpatialAggregator<L> {
    pub fn new(locator: L, config: AnalysisConfig) -> Self {
        Self {
            resolver: ZoneResolver::new(locator, config.default_world_radius),
            config,
        }
    }

    /// Fails only when the snapshot has no organism files at all
    pub fn aggregate(&self, path: &Path) -> Result<SpatialReport, SnapshotError> {
        let snapshot = load_snapshot(path)?;
        let resolved = self.resolver.resolve(&snapshot.dir);
        let classifier = Classifier::for_zones(&resolved, &self.config);

        let world_radius = match &classifier {
            Classifier::Metadata(map) => map.world_radius(),
            _ => resolved.world_radius,
        };

        tracing::info!(
            "Classifying {} organisms with {:?} zones",
            snapshot.records.len(),
            classifier.mode()
        );

        let mut errors = snapshot.errors;
        errors.extend(resolved.errors);
        Ok(aggregate_records(
            &snapshot.records,
            &classifier,
            world_radius,
            resolved.zones,
            errors,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::FixedArchive;
    use crate::classify::ZoneMap;
    use crate::config::ClassifierFallback;
    use serde_json::json;
    use shared::{ClassificationMode, UNKNOWN_ZONE};

    fn organism(name: &str, x: Option<f64>, y: Option<f64>, tag: Option<&str>) -> Record {
        let mut rb2d = serde_json::Map::new();
        if let Some(x) = x {
            rb2d.insert("px".into(), json!(x));
        }
        if let Some(y) = y {
            rb2d.insert("py".into(), json!(y));
        }
        let genes = match tag {
            Some(tag) => json!({ "tag": tag }),
            None => json!({}),
        };
        Record::from_value(name, json!({ "rb2d": rb2d, "genes": genes }))
    }

    fn zones() -> Vec<ZoneDefinition> {
        vec![
            ZoneDefinition::disc("Core", 0.3),
            ZoneDefinition::ring("Mid", 0.6, 1.0),
        ]
    }

    fn report(records: &[Record]) -> SpatialReport {
        let classifier = Classifier::Metadata(ZoneMap::new(&zones(), 1000.0));
        aggregate_records(records, &classifier, 1000.0, zones(), Vec::new())
    }

    #[test]
    fn test_zone_totals_sum_to_classified_count() {
        let records: Vec<_> = (0..40)
            .map(|i| {
                let r = i as f64 * 50.0;
                organism(&format!("bibite_{i}.bb8"), Some(r), Some(-r / 2.0), Some("A"))
            })
            .collect();
        let report = report(&records);

        assert_eq!(report.total_organisms, 40);
        assert_eq!(report.zone_totals.values().sum::<usize>(), 40);
        assert_eq!(report.unclassified, 0);
        assert_eq!(report.classification, ClassificationMode::Metadata);
    }

    #[test]
    fn test_missing_coordinates_are_unclassified() {
        let records = vec![
            organism("a.bb8", Some(0.0), Some(0.0), Some("A")),
            organism("b.bb8", None, Some(10.0), Some("A")),
            organism("c.bb8", Some(10.0), None, Some("B")),
        ];
        let report = report(&records);
        assert_eq!(report.total_organisms, 1);
        assert_eq!(report.unclassified, 2);
        assert!(!report.species_zone_preferences.contains_key("B"));
    }

    #[test]
    fn test_missing_tag_is_none_species() {
        let records = vec![
            organism("a.bb8", Some(10.0), Some(0.0), None),
            organism("b.bb8", Some(20.0), Some(0.0), Some("A")),
        ];
        let report = report(&records);

        assert_eq!(report.zone_totals["Core"], 2);
        assert_eq!(report.zone_species_breakdown["Core"][NO_SPECIES], 1);
        assert_eq!(report.species_zone_preferences[NO_SPECIES].primary_zone, "Core");
    }

    #[test]
    fn test_dominant_species_tie_goes_to_first_seen() {
        let records = vec![
            organism("1.bb8", Some(0.0), Some(0.0), Some("Zebra")),
            organism("2.bb8", Some(0.0), Some(0.0), Some("Aardvark")),
            organism("3.bb8", Some(0.0), Some(0.0), Some("Aardvark")),
            organism("4.bb8", Some(0.0), Some(0.0), Some("Zebra")),
        ];
        let report = report(&records);
        let core = &report.zones[0];
        assert_eq!(core.zone, "Core");
        assert_eq!(
            core.dominant_species,
            Some(SpeciesCount {
                species: "Zebra".to_string(),
                count: 2
            })
        );
        assert_eq!(core.species_count, 2);
    }

    #[test]
    fn test_species_preferences_sum_to_hundred() {
        let records = vec![
            organism("1.bb8", Some(0.0), Some(0.0), Some("A")),
            organism("2.bb8", Some(800.0), Some(0.0), Some("A")),
            organism("3.bb8", Some(900.0), Some(0.0), Some("A")),
            organism("4.bb8", Some(100.0), Some(0.0), Some("B")),
        ];
        let report = report(&records);

        let a = &report.species_zone_preferences["A"];
        assert_eq!(a.total, 3);
        assert_eq!(a.primary_zone, "Mid");
        assert_eq!(a.primary_count, 2);
        let sum: f64 = a.zones.values().map(|s| s.percentage).sum();
        assert!((sum - 100.0).abs() < 1e-9);

        let zone_sum: f64 = report.zones.iter().map(|z| z.percentage).sum();
        assert!((zone_sum - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_coordinate_and_radial_ranges() {
        let records = vec![
            organism("1.bb8", Some(600.0), Some(0.0), Some("A")),
            organism("2.bb8", Some(0.0), Some(-800.0), Some("A")),
            organism("3.bb8", Some(30.0), Some(40.0), Some("B")),
        ];
        let report = report(&records);

        let mid = &report.coordinate_ranges_by_zone["Mid"];
        assert_eq!(mid.x_range, [0.0, 600.0]);
        assert_eq!(mid.y_range, [-800.0, 0.0]);
        assert_eq!(mid.center, [300.0, -400.0]);
        assert_eq!(mid.organism_count, 2);

        let radial = &report.radial_analysis;
        assert_eq!(radial.overall_range, [50.0, 800.0]);
        assert_eq!(radial.relative_range, [0.05, 0.8]);
        let mid_distances = &radial.zone_distance_ranges["Mid"];
        assert_eq!(mid_distances.min_distance, 600.0);
        assert_eq!(mid_distances.max_distance, 800.0);
        assert_eq!(mid_distances.mean_distance, 700.0);
    }

    #[test]
    fn test_empty_input() {
        let report = report(&[]);
        assert_eq!(report.total_organisms, 0);
        assert!(report.zones.is_empty());
        assert_eq!(report.radial_analysis.overall_range, [0.0, 0.0]);
    }

    #[test]
    fn test_aggregator_without_archive() {
        let root = tempfile::tempdir().unwrap();
        let data = root.path().join("autosave_1");
        std::fs::create_dir_all(&data).unwrap();
        std::fs::write(
            data.join("bibite_0.bb8"),
            r#"{"rb2d": {"px": 5.0, "py": 5.0}, "genes": {"tag": "A"}}"#,
        )
        .unwrap();
        std::fs::write(data.join("bibite_1.bb8"), "{ broken").unwrap();

        let locator = FixedArchive(root.path().join("missing.zip"));
        let aggregator = SpatialAggregator::new(locator, AnalysisConfig::default());
        let report = aggregator.aggregate(&data).unwrap();

        assert_eq!(report.classification, ClassificationMode::Unresolved);
        assert_eq!(report.zone_totals[UNKNOWN_ZONE], 1);
        // one unreadable file plus the missing archive
        assert_eq!(report.errors.len(), 2);

        let legacy = SpatialAggregator::new(
            FixedArchive(root.path().join("missing.zip")),
            AnalysisConfig {
                fallback: ClassifierFallback::Legacy,
                ..Default::default()
            },
        );
        let report = legacy.aggregate(&data).unwrap();
        assert_eq!(report.classification, ClassificationMode::Legacy);
        assert_eq!(report.zone_totals["Center"], 1);
    }
}
