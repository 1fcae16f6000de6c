use crate::combat::GENERATION_FIELD;
use crate::population::{label_at, SPECIES_ID_FIELD, TAG_FIELD, UNKNOWN_SPECIES};
use crate::stats::{min_max, summarize, Summary};
use serde::Serialize;
use shared::Record;
use std::collections::BTreeMap;

pub const NODES_FIELD: &str = "brain.Nodes";
pub const SYNAPSES_FIELD: &str = "brain.Synapses";

/// Brain size of one organism
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BrainShape {
    pub nodes: usize,
    pub synapses: usize,
}

impl BrainShape {
    pub fn of(record: &Record) -> Self {
        Self {
            nodes: record.len_at(NODES_FIELD),
            synapses: record.len_at(SYNAPSES_FIELD),
        }
    }

    /// Synapses per node
    pub fn complexity(&self) -> f64 {
        self.synapses as f64 / self.nodes.max(1) as f64
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeciesBrains {
    pub species_id: String,
    /// Tag of the first organism seen
    pub tag: String,
    pub organisms: usize,
    pub generations: Option<[f64; 2]>,
    pub nodes: Summary,
    pub synapses: Summary,
    pub complexity: Summary,
}

/// Neural network size statistics per species id, ordered by id
pub fn analyze_neural(records: &[Record]) -> Vec<SpeciesBrains> {
    let mut groups: BTreeMap<String, Vec<&Record>> = BTreeMap::new();
    for record in records {
        let id = label_at(record, SPECIES_ID_FIELD).unwrap_or_else(|| UNKNOWN_SPECIES.to_string());
        groups.entry(id).or_default().push(record);
    }

    groups
        .into_iter()
        .filter_map(|(species_id, members)| {
            let shapes: Vec<BrainShape> = members.iter().map(|r| BrainShape::of(r)).collect();
            let nodes: Vec<f64> = shapes.iter().map(|s| s.nodes as f64).collect();
            let synapses: Vec<f64> = shapes.iter().map(|s| s.synapses as f64).collect();
            let complexity: Vec<f64> = shapes.iter().map(BrainShape::complexity).collect();
            let generations: Vec<f64> = members
                .iter()
                .filter_map(|r| r.f64_at(GENERATION_FIELD))
                .collect();

            Some(SpeciesBrains {
                tag: members
                    .first()
                    .and_then(|r| label_at(r, TAG_FIELD))
                    .unwrap_or_else(|| UNKNOWN_SPECIES.to_string()),
                organisms: members.len(),
                generations: min_max(&generations).map(|(lo, hi)| [lo, hi]),
                nodes: summarize(&nodes)?,
                synapses: summarize(&synapses)?,
                complexity: summarize(&complexity)?,
                species_id,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn brain(id: u32, tag: &str, gen: u32, nodes: usize, synapses: usize) -> Record {
        Record::from_value(
            "bibite.bb8",
            json!({
                "genes": { "speciesID": id, "tag": tag, "gen": gen },
                "brain": {
                    "Nodes": vec![json!({ "Type": 0 }); nodes],
                    "Synapses": vec![json!({ "Weight": 1.0 }); synapses]
                }
            }),
        )
    }

    #[test]
    fn test_brain_shape() {
        let shape = BrainShape::of(&brain(1, "A", 1, 4, 10));
        assert_eq!(shape.nodes, 4);
        assert_eq!(shape.synapses, 10);
        assert_eq!(shape.complexity(), 2.5);

        let empty = BrainShape::of(&Record::from_value("x.bb8", json!({})));
        assert_eq!(empty.complexity(), 0.0);
    }

    #[test]
    fn test_analyze_neural_groups_by_species_id() {
        let records = vec![
            brain(2, "Blue", 10, 4, 8),
            brain(1, "Red", 3, 10, 10),
            brain(2, "Teal", 14, 6, 6),
        ];
        let species = analyze_neural(&records);

        assert_eq!(species.len(), 2);
        assert_eq!(species[0].species_id, "1");
        assert_eq!(species[0].nodes.std, 0.0);

        let two = &species[1];
        assert_eq!(two.tag, "Blue");
        assert_eq!(two.organisms, 2);
        assert_eq!(two.generations, Some([10.0, 14.0]));
        assert_eq!(two.nodes.mean, 5.0);
        assert_eq!(two.complexity.mean, 1.5);
    }
}
