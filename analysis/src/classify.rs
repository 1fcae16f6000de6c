//! Assigns world coordinates to named habitat zones.
//!
//! Two strategies exist. [`ZoneMap`] uses zone geometry read from the save
//! and [`LegacyIslands`] uses the fixed island thresholds of older worlds.
//! [`Classifier`] picks one per snapshot.

use crate::config::{AnalysisConfig, ClassifierFallback, LegacyLayout};
use crate::resolver::ResolvedZones;
use shared::{ClassificationMode, Distribution, ZoneDefinition, DEFAULT_WORLD_RADIUS, UNKNOWN_ZONE};

/// Reported when the radial distance cannot be placed near any band
pub const BEYOND_ZONE: &str = "Beyond";

/// Far outside the legacy islands
pub const VOID_ZONE: &str = "Void";

/// Centre discs are tried before rings
const DISC_PRIORITY: u8 = 1;
const RING_PRIORITY: u8 = 2;

/// Flat circle away from the origin; always wins over radial bands
#[derive(Debug, Clone, PartialEq)]
struct PositionedZone {
    name: String,
    x: f64,
    y: f64,
    radius: f64,
}

/// Disc or ring around the origin, in world-radius units
#[derive(Debug, Clone, PartialEq)]
struct RadialBand {
    name: String,
    min: f64,
    max: f64,
    priority: u8,
}

impl RadialBand {
    fn width(&self) -> f64 {
        self.max - self.min
    }

    fn contains(&self, distance: f64) -> bool {
        self.min <= distance && distance <= self.max
    }

    /// Distance from `distance` to the nearest edge; `None` when inside
    fn gap(&self, distance: f64) -> Option<f64> {
        if distance < self.min {
            Some(self.min - distance)
        } else if distance > self.max {
            Some(distance - self.max)
        } else {
            None
        }
    }
}

/// Zone geometry of one snapshot, prepared for repeated lookups
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneMap {
    positioned: Vec<PositionedZone>,
    /// Sorted by priority, then narrowest first
    bands: Vec<RadialBand>,
    world_radius: f64,
}

impl ZoneMap {
    /// Partition `zones` into positioned circles and radial bands.
    ///
    /// Zones fitting neither shape are ignored, as are rings whose inner
    /// edge is not below their outer edge. A non-positive or non-finite
    /// world radius is replaced by the default.
    pub fn new(zones: &[ZoneDefinition], world_radius: f64) -> Self {
        let world_radius = if world_radius.is_finite() && world_radius > 0.0 {
            world_radius
        } else {
            DEFAULT_WORLD_RADIUS
        };

        let mut positioned = Vec::new();
        let mut bands = Vec::new();

        for zone in zones {
            let (radius, inside, x, y) = zone.relative_geometry(world_radius);
            let at_origin = x == 0.0 && y == 0.0;

            match zone.effective_distribution() {
                Distribution::Flat if !at_origin => positioned.push(PositionedZone {
                    name: zone.name.clone(),
                    x,
                    y,
                    radius,
                }),
                Distribution::CentricGradual if at_origin => bands.push(RadialBand {
                    name: zone.name.clone(),
                    min: 0.0,
                    max: radius,
                    priority: DISC_PRIORITY,
                }),
                d if d.is_ring() && at_origin => {
                    let min = inside * radius;
                    if min < radius && inside < radius {
                        bands.push(RadialBand {
                            name: zone.name.clone(),
                            min,
                            max: radius,
                            priority: RING_PRIORITY,
                        });
                    } else {
                        tracing::debug!(
                            "Ignoring ring {} with inner edge past its outer edge",
                            zone.name
                        );
                    }
                }
                _ => {}
            }
        }

        bands.sort_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then_with(|| a.width().total_cmp(&b.width()))
        });

        Self {
            positioned,
            bands,
            world_radius,
        }
    }

    pub fn world_radius(&self) -> f64 {
        self.world_radius
    }

    /// True when no zone can ever match
    pub fn is_empty(&self) -> bool {
        self.positioned.is_empty() && self.bands.is_empty()
    }

    /// Name of the zone containing `(x, y)`, in world units.
    ///
    /// Positioned circles are tested first and the closest centre wins an
    /// overlap. Otherwise the first band containing the radial distance
    /// matches, or failing that the band with the nearest edge.
    pub fn classify(&self, x: f64, y: f64) -> &str {
        let rel_x = x / self.world_radius;
        let rel_y = y / self.world_radius;

        // 1. positioned sanctuaries
        let mut closest: Option<(&PositionedZone, f64)> = None;
        for zone in &self.positioned {
            let d = (rel_x - zone.x).hypot(rel_y - zone.y);
            if d <= zone.radius && closest.map_or(true, |(_, best)| d < best) {
                closest = Some((zone, d));
            }
        }
        if let Some((zone, _)) = closest {
            return &zone.name;
        }

        if self.bands.is_empty() {
            return UNKNOWN_ZONE;
        }

        // 2. radial bands
        let distance = x.hypot(y) / self.world_radius;
        if let Some(band) = self.bands.iter().find(|b| b.contains(distance)) {
            return &band.name;
        }

        // 3. nearest band edge
        let mut nearest: Option<(&RadialBand, f64)> = None;
        for band in &self.bands {
            if let Some(gap) = band.gap(distance) {
                if nearest.map_or(true, |(_, best)| gap < best) {
                    nearest = Some((band, gap));
                }
            }
        }
        nearest.map_or(BEYOND_ZONE, |(band, _)| band.name.as_str())
    }
}

/// Classify one point against a zone list; see [`ZoneMap::classify`]
pub fn classify(x: f64, y: f64, zones: &[ZoneDefinition], world_radius: f64) -> String {
    ZoneMap::new(zones, world_radius).classify(x, y).to_string()
}

/// Fixed-threshold layout of the original island worlds
#[derive(Debug, Clone, PartialEq)]
pub struct LegacyIslands {
    void_threshold: f64,
    bands: Vec<(String, f64)>,
}

impl LegacyIslands {
    pub fn new(layout: &LegacyLayout) -> Self {
        Self {
            void_threshold: layout.void_threshold,
            bands: layout
                .bands
                .iter()
                .map(|b| (b.name.clone(), b.max_distance))
                .collect(),
        }
    }

    /// Points past the threshold on either axis are in the void; the rest
    /// take the first band reaching their distance from the origin
    pub fn classify(&self, x: f64, y: f64) -> &str {
        if x.abs() > self.void_threshold || y.abs() > self.void_threshold {
            return VOID_ZONE;
        }
        let distance = x.hypot(y);
        self.bands
            .iter()
            .find(|(_, max)| distance <= *max)
            .map_or(BEYOND_ZONE, |(name, _)| name.as_str())
    }
}

/// Classification strategy for one snapshot
#[derive(Debug, Clone, PartialEq)]
pub enum Classifier {
    Metadata(ZoneMap),
    Legacy(LegacyIslands),
    /// Every organism is `Unknown`
    Unresolved,
}

impl Classifier {
    /// Metadata zones when any resolved, otherwise the configured fallback
    pub fn for_zones(resolved: &ResolvedZones, config: &AnalysisConfig) -> Self {
        if resolved.is_resolved() {
            return Self::Metadata(ZoneMap::new(&resolved.zones, resolved.world_radius));
        }
        match config.fallback {
            ClassifierFallback::Legacy => Self::Legacy(LegacyIslands::new(&config.legacy)),
            ClassifierFallback::Unknown => Self::Unresolved,
        }
    }

    pub fn mode(&self) -> ClassificationMode {
        match self {
            Self::Metadata(_) => ClassificationMode::Metadata,
            Self::Legacy(_) => ClassificationMode::Legacy,
            Self::Unresolved => ClassificationMode::Unresolved,
        }
    }

    pub fn classify(&self, x: f64, y: f64) -> &str {
        match self {
            Self::Metadata(map) => map.classify(x, y),
            Self::Legacy(islands) => islands.classify(x, y),
            Self::Unresolved => UNKNOWN_ZONE,
        }
    }
}
