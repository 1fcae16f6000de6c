use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Top-level sections every organism record is expected to carry
pub const REQUIRED_SECTIONS: [&str; 6] = ["transform", "genes", "brain", "rb2d", "body", "clock"];

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Raised when an organism record cannot be loaded
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("file not found: {0}")]
    NotFound(PathBuf),

    #[error("error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// One organism's full state as loaded from a save file.
///
/// The document is read-only after load and is only consumed through
/// dotted field paths such as `genes.tag` or `body.mouth.totalDamageDealt`.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Name of the file the record came from
    name: String,

    root: Value,
}

impl Record {
    /// Load and parse a record file, stripping a UTF-8 byte-order mark
    pub fn load(path: &Path) -> Result<Self, ParseError> {
        if !path.exists() {
            return Err(ParseError::NotFound(path.to_path_buf()));
        }

        let bytes = std::fs::read(path).map_err(|source| ParseError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let root = parse_json_bytes(&bytes).map_err(|source| ParseError::Json {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(Self { name, root })
    }

    /// Wrap an already parsed document
    pub fn from_value(name: impl Into<String>, root: Value) -> Self {
        Self {
            name: name.into(),
            root,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> &Value {
        &self.root
    }

    /// Resolve a dotted path against this record
    pub fn extract(&self, path: &str) -> Option<&Value> {
        extract(&self.root, path)
    }

    /// Resolve every path independently; missing fields map to `None`
    pub fn extract_many<S: AsRef<str>>(&self, paths: &[S]) -> BTreeMap<String, Option<Value>> {
        paths
            .iter()
            .map(|p| (p.as_ref().to_string(), self.extract(p.as_ref()).cloned()))
            .collect()
    }

    /// Numeric field; anything that is not a JSON number counts as missing
    pub fn f64_at(&self, path: &str) -> Option<f64> {
        self.extract(path).and_then(Value::as_f64)
    }

    pub fn str_at(&self, path: &str) -> Option<&str> {
        self.extract(path).and_then(Value::as_str)
    }

    /// Length of an array field, 0 when absent or not an array
    pub fn len_at(&self, path: &str) -> usize {
        self.extract(path)
            .and_then(Value::as_array)
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// Required top-level sections that this record lacks
    pub fn missing_sections(&self) -> Vec<&'static str> {
        REQUIRED_SECTIONS
            .iter()
            .copied()
            .filter(|section| self.root.get(section).is_none())
            .collect()
    }
}

/// Parse JSON text from raw bytes, ignoring a leading byte-order mark
pub fn parse_json_bytes(bytes: &[u8]) -> Result<Value, serde_json::Error> {
    serde_json::from_slice(strip_bom(bytes))
}

pub fn strip_bom(bytes: &[u8]) -> &[u8] {
    bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes)
}

/// Walk a dotted path segment by segment.
///
/// Objects are indexed by key and arrays by decimal position. Returns `None`
/// as soon as a segment is missing or the current node is not a container.
pub fn extract<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(value, |node, segment| match node {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;
    use std::io::Write;

    fn sample() -> Record {
        Record::from_value(
            "bibite_1.bb8",
            json!({
                "genes": { "tag": "Pred", "gen": 12 },
                "body": { "mouth": { "totalDamageDealt": 42.5 } },
                "brain": { "Nodes": [{ "Type": 1 }, { "Type": 2 }] },
                "rb2d": { "px": 10.0, "py": -4.0 }
            }),
        )
    }

    #[test]
    fn test_extract_nested_field() {
        let record = sample();
        assert_eq!(record.str_at("genes.tag"), Some("Pred"));
        assert_eq!(record.f64_at("body.mouth.totalDamageDealt"), Some(42.5));
    }

    #[test]
    fn test_extract_missing_segment_is_none() {
        let record = sample();
        assert!(record.extract("genes.speciesID").is_none());
        assert!(record.extract("body.mouth.totalDamageDealt.deeper").is_none());
        assert!(record.extract("nothing.here").is_none());
    }

    #[test]
    fn test_extract_array_index() {
        let record = sample();
        assert_eq!(record.extract("brain.Nodes.1.Type"), Some(&json!(2)));
        assert!(record.extract("brain.Nodes.7.Type").is_none());
        assert!(record.extract("brain.Nodes.first").is_none());
    }

    #[test]
    fn test_extract_many_keeps_missing_paths() {
        let record = sample();
        let fields = record.extract_many(&["genes.gen", "genes.missing"]);
        assert_eq!(fields.len(), 2);
        assert_eq!(fields["genes.gen"], Some(json!(12)));
        assert_eq!(fields["genes.missing"], None);
    }

    #[test]
    fn test_len_at() {
        let record = sample();
        assert_eq!(record.len_at("brain.Nodes"), 2);
        assert_eq!(record.len_at("brain.Synapses"), 0);
    }

    #[test]
    fn test_missing_sections() {
        let record = sample();
        assert_eq!(record.missing_sections(), vec!["transform", "clock"]);
    }

    #[test]
    fn test_load_strips_bom() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bibite_3.bb8");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(UTF8_BOM).unwrap();
        file.write_all(br#"{"genes": {"tag": "Greencreep"}}"#).unwrap();
        drop(file);

        let record = Record::load(&path).unwrap();
        assert_eq!(record.name(), "bibite_3.bb8");
        assert_eq!(record.str_at("genes.tag"), Some("Greencreep"));
    }

    #[test]
    fn test_load_errors() {
        let dir = tempfile::tempdir().unwrap();

        let missing = Record::load(&dir.path().join("absent.bb8"));
        assert!(matches!(missing, Err(ParseError::NotFound(_))));

        let broken = dir.path().join("broken.bb8");
        std::fs::write(&broken, "{ not json").unwrap();
        assert!(matches!(Record::load(&broken), Err(ParseError::Json { .. })));
    }

    proptest! {
        #[test]
        fn proptest_extract_follows_nested_keys(
            keys in proptest::collection::vec("[a-zA-Z_][a-zA-Z0-9_]{0,7}", 1..6),
            leaf in -1e6f64..1e6,
        ) {
            let root = keys
                .iter()
                .rev()
                .fold(json!(leaf), |inner, key| json!({ key.as_str(): inner }));
            let path = keys.join(".");

            let deeper = format!("{}.deeper", path);

            prop_assert_eq!(extract(&root, &path), Some(&json!(leaf)));
            prop_assert!(extract(&root, &deeper).is_none());
        }
    }
}
