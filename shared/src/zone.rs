use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Zone whose distribution field is known to be corrupted in saved settings
pub const ANTI_PRED_ZONE: &str = "AntiPred";

/// Material of zones that actually grow food; other materials are spawn or decoration
pub const PLANT_MATERIAL: &str = "Plant";

/// How biomass is spread across a zone, which also decides its shape
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Distribution {
    /// Uniform disc; positioned away from the origin it is a sanctuary
    Flat,
    /// Disc centered on the world origin
    CentricGradual,
    /// Annulus around the origin
    Ring,
    FlatRing,
    Other(String),
}

impl Distribution {
    pub fn as_str(&self) -> &str {
        match self {
            Distribution::Flat => "Flat",
            Distribution::CentricGradual => "CentricGradual",
            Distribution::Ring => "Ring",
            Distribution::FlatRing => "FlatRing",
            Distribution::Other(name) => name,
        }
    }

    pub fn is_ring(&self) -> bool {
        matches!(self, Distribution::Ring | Distribution::FlatRing)
    }
}

impl From<&str> for Distribution {
    fn from(value: &str) -> Self {
        match value {
            "Flat" => Distribution::Flat,
            "CentricGradual" => Distribution::CentricGradual,
            "Ring" => Distribution::Ring,
            "FlatRing" => Distribution::FlatRing,
            other => Distribution::Other(other.to_string()),
        }
    }
}

impl From<String> for Distribution {
    fn from(value: String) -> Self {
        Distribution::from(value.as_str())
    }
}

impl From<Distribution> for String {
    fn from(value: Distribution) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for Distribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named habitat region of the simulated world.
///
/// `inside_radius` is a fraction of `radius`, not an absolute length.
/// When `radius_is_relative` is false the radii and position are in world
/// units and must be divided by the world radius before comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneDefinition {
    pub name: String,

    pub radius: f64,

    #[serde(default)]
    pub inside_radius: f64,

    pub distribution: Distribution,

    #[serde(default)]
    pub pos_x: f64,

    #[serde(default)]
    pub pos_y: f64,

    #[serde(default = "default_relative")]
    pub radius_is_relative: bool,

    #[serde(default)]
    pub material: String,
}

fn default_relative() -> bool {
    true
}

impl ZoneDefinition {
    /// Relative disc centered on the origin
    pub fn disc(name: &str, radius: f64) -> Self {
        Self {
            name: name.to_string(),
            radius,
            inside_radius: 0.0,
            distribution: Distribution::CentricGradual,
            pos_x: 0.0,
            pos_y: 0.0,
            radius_is_relative: true,
            material: PLANT_MATERIAL.to_string(),
        }
    }

    /// Relative ring; `inside_radius` is a fraction of `radius`
    pub fn ring(name: &str, inside_radius: f64, radius: f64) -> Self {
        Self {
            inside_radius,
            distribution: Distribution::Ring,
            ..Self::disc(name, radius)
        }
    }

    /// Relative flat circle centered at `(pos_x, pos_y)`
    pub fn positioned(name: &str, pos_x: f64, pos_y: f64, radius: f64) -> Self {
        Self {
            distribution: Distribution::Flat,
            pos_x,
            pos_y,
            ..Self::disc(name, radius)
        }
    }

    /// Build a zone from a loosely typed settings object.
    ///
    /// Numbers may arrive as strings (XML attributes, INI values) and key
    /// case varies between save versions. Returns `None` without a name.
    pub fn from_fields(fields: &Map<String, Value>) -> Option<Self> {
        let name = lookup(fields, "name").and_then(as_text).filter(|n| !n.is_empty())?;

        Some(Self {
            name,
            radius: lookup(fields, "radius").and_then(as_number).unwrap_or(0.0),
            inside_radius: lookup(fields, "insideRadius").and_then(as_number).unwrap_or(0.0),
            distribution: lookup(fields, "distribution")
                .and_then(as_text)
                .map(Distribution::from)
                .unwrap_or_else(|| Distribution::Other(String::new())),
            pos_x: lookup(fields, "posX").and_then(as_number).unwrap_or(0.0),
            pos_y: lookup(fields, "posY").and_then(as_number).unwrap_or(0.0),
            radius_is_relative: lookup(fields, "radiusIsRelative")
                .and_then(as_flag)
                .unwrap_or(true),
            material: lookup(fields, "material").and_then(as_text).unwrap_or_default(),
        })
    }

    pub fn is_plant_zone(&self) -> bool {
        self.material == PLANT_MATERIAL && self.radius > 0.0
    }

    /// Distribution after correcting the known AntiPred corruption
    pub fn effective_distribution(&self) -> Distribution {
        if self.name == ANTI_PRED_ZONE && self.distribution == Distribution::Flat {
            Distribution::CentricGradual
        } else {
            self.distribution.clone()
        }
    }

    /// Rewrite fields known to be corrupted at the source
    pub fn repaired(mut self) -> Self {
        self.distribution = self.effective_distribution();
        self
    }

    /// Geometry in world-radius units: `(radius, inside_radius, pos_x, pos_y)`
    pub fn relative_geometry(&self, world_radius: f64) -> (f64, f64, f64, f64) {
        if self.radius_is_relative {
            (self.radius, self.inside_radius, self.pos_x, self.pos_y)
        } else {
            (
                self.radius / world_radius,
                self.inside_radius / world_radius,
                self.pos_x / world_radius,
                self.pos_y / world_radius,
            )
        }
    }
}

/// Exact key first, then a case-insensitive match
fn lookup<'a>(fields: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    fields.get(key).or_else(|| {
        fields
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    })
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn as_flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Some(true),
            "false" | "0" | "no" => Some(false),
            _ => None,
        },
        Value::Number(n) => n.as_f64().map(|v| v != 0.0),
        _ => None,
    }
}
