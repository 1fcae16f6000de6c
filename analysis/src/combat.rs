use crate::population::{label_at, SPECIES_ID_FIELD, TAG_FIELD, UNKNOWN_SPECIES};
use crate::stats::{percentage, summarize, Summary};
use serde::Serialize;
use shared::Record;
use std::collections::BTreeMap;

pub const DAMAGE_FIELD: &str = "body.mouth.totalDamageDealt";
pub const KILLS_FIELD: &str = "body.mouth.totalMurders";
pub const BITES_FIELD: &str = "body.mouth.bibitesBitten";
pub const SIZE_FIELD: &str = "body.d2Size";
pub const EGGS_FIELD: &str = "body.eggLayer.nEggsLaid";
pub const TIME_ALIVE_FIELD: &str = "clock.timeAlive";
pub const GENERATION_FIELD: &str = "genes.gen";

/// Organisms above this size are mature
pub const MATURE_SIZE: f64 = 0.5;

/// Size floor so hatchlings do not divide by zero
const MIN_SIZE: f64 = 0.01;

/// One kill is worth this much damage in the fitness score
const KILL_WEIGHT: f64 = 100.0;

const TOP_DAMAGE: usize = 8;
const TOP_KILLERS: usize = 8;
const TOP_FITNESS: usize = 5;

#[derive(Debug, Clone, Default)]
pub struct CombatOptions {
    /// Divide damage and kills by body size
    pub size_relative: bool,
    /// Only organisms with this tag
    pub lineage: Option<String>,
}

/// Combat record of one organism
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CombatProfile {
    pub file: String,
    pub tag: String,
    pub species_id: String,
    pub generation: f64,
    pub damage: f64,
    pub kills: f64,
    pub bites: f64,
    pub size: f64,
    pub eggs_laid: f64,
    pub time_alive: f64,
    pub size_adjusted_damage: f64,
    pub size_kill_ratio: f64,
    pub combat_fitness: f64,
    pub damage_per_minute: f64,
    pub kill_rate_per_bite: f64,
    pub eggs_per_hour: f64,
}

impl CombatProfile {
    pub fn from_record(record: &Record, size_relative: bool) -> Self {
        let number = |path: &str| record.f64_at(path).unwrap_or(0.0);
        let damage = number(DAMAGE_FIELD);
        let kills = number(KILLS_FIELD);
        let bites = number(BITES_FIELD);
        let size = number(SIZE_FIELD);
        let eggs_laid = number(EGGS_FIELD);
        let time_alive = record
            .f64_at(TIME_ALIVE_FIELD)
            .filter(|t| *t != 0.0)
            .unwrap_or(1.0);

        let (size_adjusted_damage, size_kill_ratio) = if size_relative {
            (damage / size.max(MIN_SIZE), kills / size.max(MIN_SIZE))
        } else {
            (damage, kills)
        };

        Self {
            file: record.name().to_string(),
            tag: label_at(record, TAG_FIELD).unwrap_or_else(|| UNKNOWN_SPECIES.to_string()),
            species_id: label_at(record, SPECIES_ID_FIELD)
                .unwrap_or_else(|| UNKNOWN_SPECIES.to_string()),
            generation: number(GENERATION_FIELD),
            damage,
            kills,
            bites,
            size,
            eggs_laid,
            time_alive,
            size_adjusted_damage,
            size_kill_ratio,
            combat_fitness: size_adjusted_damage + KILL_WEIGHT * size_kill_ratio,
            damage_per_minute: damage / time_alive.max(1.0) * 60.0,
            kill_rate_per_bite: if bites > 0.0 { kills / bites } else { 0.0 },
            eggs_per_hour: eggs_laid / (time_alive / 3600.0),
        }
    }

    pub fn is_combatant(&self) -> bool {
        self.damage > 0.0 || self.kills > 0.0 || self.bites > 0.0
    }

    pub fn is_killer(&self) -> bool {
        self.kills > 0.0
    }

    pub fn is_mature(&self) -> bool {
        self.size > MATURE_SIZE
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CombatSummary {
    pub total_organisms: usize,
    pub total_combatants: usize,
    pub total_killers: usize,
    pub total_mature: usize,
    pub mature_combatants: usize,
    pub participation_rate: f64,
    pub kill_rate: f64,
    pub maturity_rate: f64,
}

/// Damage statistics of one tag
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineageCombat {
    pub organisms: usize,
    pub combatants: usize,
    pub damage: Option<Summary>,
    pub kills: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CombatReport {
    pub size_relative: bool,
    pub lineage: Option<String>,
    pub summary: CombatSummary,
    pub top_damage_dealers: Vec<CombatProfile>,
    pub top_killers: Vec<CombatProfile>,
    pub top_combat_fitness: Vec<CombatProfile>,
    pub lineages: BTreeMap<String, LineageCombat>,
}

/// Score every organism and rank the mature fighters.
///
/// Returns `None` when no organism passes the lineage filter.
pub fn analyze_combat(records: &[Record], options: &CombatOptions) -> Option<CombatReport> {
    let profiles: Vec<CombatProfile> = records
        .iter()
        .map(|r| CombatProfile::from_record(r, options.size_relative))
        .filter(|p| options.lineage.as_ref().map_or(true, |l| &p.tag == l))
        .collect();
    if profiles.is_empty() {
        return None;
    }

    tracing::info!("Scoring combat for {} organisms", profiles.len());

    let total = profiles.len();
    let total_combatants = profiles.iter().filter(|p| p.is_combatant()).count();
    let total_killers = profiles.iter().filter(|p| p.is_killer()).count();
    let total_mature = profiles.iter().filter(|p| p.is_mature()).count();

    let mature_fighters: Vec<&CombatProfile> = profiles
        .iter()
        .filter(|p| p.is_mature() && p.is_combatant())
        .collect();

    let top_by = |key: fn(&CombatProfile) -> f64, n: usize| -> Vec<CombatProfile> {
        let mut ranked = mature_fighters.clone();
        ranked.sort_by(|a, b| key(b).total_cmp(&key(a)));
        ranked.into_iter().take(n).cloned().collect()
    };

    let mut lineages: BTreeMap<String, Vec<&CombatProfile>> = BTreeMap::new();
    for profile in &profiles {
        lineages.entry(profile.tag.clone()).or_default().push(profile);
    }
    let lineages = lineages
        .into_iter()
        .map(|(tag, members)| {
            let damage: Vec<f64> = members.iter().map(|p| p.damage).collect();
            let combat = LineageCombat {
                organisms: members.len(),
                combatants: members.iter().filter(|p| p.is_combatant()).count(),
                damage: summarize(&damage),
                kills: members.iter().map(|p| p.kills).sum(),
            };
            (tag, combat)
        })
        .collect();

    Some(CombatReport {
        size_relative: options.size_relative,
        lineage: options.lineage.clone(),
        summary: CombatSummary {
            total_organisms: total,
            total_combatants,
            total_killers,
            total_mature,
            mature_combatants: mature_fighters.len(),
            participation_rate: percentage(total_combatants, total),
            kill_rate: percentage(total_killers, total),
            maturity_rate: percentage(total_mature, total),
        },
        top_damage_dealers: top_by(|p| p.size_adjusted_damage, TOP_DAMAGE),
        top_killers: top_by(|p| p.size_kill_ratio, TOP_KILLERS),
        top_combat_fitness: top_by(|p| p.combat_fitness, TOP_FITNESS),
        lineages,
    })
}
