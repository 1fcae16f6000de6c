use serde::{Deserialize, Serialize};
use shared::DEFAULT_WORLD_RADIUS;
use std::path::{Path, PathBuf};

/// Process-wide settings for locating saves and classifying organisms
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Directory holding manual saves and the autosave folder
    pub saves_dir: PathBuf,

    /// Names tried, in order, for the autosave folder under `saves_dir`
    pub autosave_dir_names: Vec<String>,

    /// Directory extracted snapshots are written to
    pub data_dir: PathBuf,

    /// World radius when the save has no SimulationSize setting
    pub default_world_radius: f64,

    /// What to do when no zone metadata could be resolved
    pub fallback: ClassifierFallback,

    pub legacy: LegacyLayout,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            saves_dir: PathBuf::from("Savefiles"),
            autosave_dir_names: vec!["Autosaves".to_string(), "autosaves".to_string()],
            data_dir: PathBuf::from("data"),
            default_world_radius: DEFAULT_WORLD_RADIUS,
            fallback: ClassifierFallback::Unknown,
            legacy: LegacyLayout::default(),
        }
    }
}

impl AnalysisConfig {
    /// Load a JSON config file; missing fields take their defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Autosave folders that exist under `saves_dir`
    pub fn autosave_dirs(&self) -> Vec<PathBuf> {
        self.autosave_dir_names
            .iter()
            .map(|name| self.saves_dir.join(name))
            .filter(|dir| dir.is_dir())
            .collect()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierFallback {
    /// Report every organism as `Unknown`
    Unknown,
    /// Use the fixed-threshold island layout
    Legacy,
}

/// Fixed-threshold layout used before zones were read from save metadata.
///
/// Distances are absolute world units measured from the origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LegacyLayout {
    /// Points beyond this on either axis are in the void
    pub void_threshold: f64,

    /// `(name, max_distance)`, checked in order
    pub bands: Vec<LegacyBand>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyBand {
    pub name: String,
    pub max_distance: f64,
}

impl Default for LegacyLayout {
    fn default() -> Self {
        let band = |name: &str, max_distance: f64| LegacyBand {
            name: name.to_string(),
            max_distance,
        };
        Self {
            void_threshold: 14000.0,
            bands: vec![
                band("Center", 3000.0),
                band("Inner", 7000.0),
                band("Outer", 14000.0),
            ],
        }
    }
}
