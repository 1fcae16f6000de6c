use crate::stats::percentage;
use serde::Serialize;
use serde_json::Value;
use shared::Record;
use std::collections::BTreeMap;

pub const TAG_FIELD: &str = "genes.tag";
pub const SPECIES_ID_FIELD: &str = "genes.speciesID";

/// Species label when neither tag nor species id is present
pub const UNKNOWN_SPECIES: &str = "Unknown";

/// Change beyond this many percent counts as growth or decline
const TREND_THRESHOLD: f64 = 20.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeciesShare {
    pub species: String,
    pub count: usize,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PopulationSummary {
    pub total: usize,
    /// Largest species first; equal counts by name
    pub species: Vec<SpeciesShare>,
    /// Species ids found under each tag
    pub tag_breakdown: BTreeMap<String, BTreeMap<String, usize>>,
}

impl PopulationSummary {
    pub fn counts(&self) -> BTreeMap<String, usize> {
        self.species
            .iter()
            .map(|s| (s.species.clone(), s.count))
            .collect()
    }
}

/// Text form of a scalar field: strings as is, numbers and booleans printed
pub fn label_at(record: &Record, path: &str) -> Option<String> {
    match record.extract(path)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Tag first, then species id
pub fn species_key(record: &Record) -> String {
    label_at(record, TAG_FIELD)
        .or_else(|| label_at(record, SPECIES_ID_FIELD))
        .unwrap_or_else(|| UNKNOWN_SPECIES.to_string())
}

pub fn summarize_population(records: &[Record]) -> PopulationSummary {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut tag_breakdown: BTreeMap<String, BTreeMap<String, usize>> = BTreeMap::new();

    for record in records {
        *counts.entry(species_key(record)).or_default() += 1;

        let tag = label_at(record, TAG_FIELD).unwrap_or_else(|| UNKNOWN_SPECIES.to_string());
        let id = label_at(record, SPECIES_ID_FIELD).unwrap_or_else(|| UNKNOWN_SPECIES.to_string());
        *tag_breakdown.entry(tag).or_default().entry(id).or_default() += 1;
    }

    let total = records.len();
    let mut species: Vec<SpeciesShare> = counts
        .into_iter()
        .map(|(species, count)| SpeciesShare {
            species,
            count,
            percentage: percentage(count, total),
        })
        .collect();
    // Stable sort keeps name order among equal counts
    species.sort_by(|a, b| b.count.cmp(&a.count));

    PopulationSummary {
        total,
        species,
        tag_breakdown,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Trend {
    New,
    Extinct,
    Growing,
    Declining,
    Stable,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeciesChange {
    pub species: String,
    pub before: usize,
    pub after: usize,
    pub change: i64,
    /// `None` for species that did not exist before
    pub percent_change: Option<f64>,
    pub trend: Trend,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PopulationComparison {
    pub before_total: usize,
    pub after_total: usize,
    pub changes: Vec<SpeciesChange>,
}

impl PopulationComparison {
    pub fn with_trend(&self, trend: Trend) -> impl Iterator<Item = &SpeciesChange> {
        self.changes.iter().filter(move |c| c.trend == trend)
    }
}

/// Species-by-species change between two snapshots, ordered by species name
pub fn compare_populations(before: &PopulationSummary, after: &PopulationSummary) -> PopulationComparison {
    let before_counts = before.counts();
    let after_counts = after.counts();

    let mut names: Vec<&String> = before_counts.keys().chain(after_counts.keys()).collect();
    names.sort();
    names.dedup();

    let changes = names
        .into_iter()
        .map(|name| {
            let a = before_counts.get(name).copied().unwrap_or(0);
            let b = after_counts.get(name).copied().unwrap_or(0);
            let change = b as i64 - a as i64;
            let percent_change = (a > 0).then(|| change as f64 / a as f64 * 100.0);
            let trend = match (a, b, percent_change) {
                (0, b, _) if b > 0 => Trend::New,
                (a, 0, _) if a > 0 => Trend::Extinct,
                (_, _, Some(p)) if p > TREND_THRESHOLD => Trend::Growing,
                (_, _, Some(p)) if p < -TREND_THRESHOLD => Trend::Declining,
                _ => Trend::Stable,
            };
            SpeciesChange {
                species: name.clone(),
                before: a,
                after: b,
                change,
                percent_change,
                trend,
            }
        })
        .collect();

    PopulationComparison {
        before_total: before.total,
        after_total: after.total,
        changes,
    }
}
