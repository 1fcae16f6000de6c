pub mod record;
pub mod report;
pub mod zone;

pub use record::*;
pub use report::*;
pub use zone::*;

/// Extension of organism record files inside saves and snapshot directories
pub const RECORD_EXTENSION: &str = "bb8";

/// World radius used when a save does not carry a SimulationSize setting
pub const DEFAULT_WORLD_RADIUS: f64 = 1500.0;

/// Zone name for points no zone can claim
pub const UNKNOWN_ZONE: &str = "Unknown";

/// Species key for organisms without a hereditary tag
pub const NO_SPECIES: &str = "None";
