use serde::Serialize;
use serde_json::Value;
use shared::{Record, RECORD_EXTENSION};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Subdirectory of a snapshot that holds living organisms
pub const BIBITES_DIR: &str = "bibites";

#[derive(Debug, Error)]
pub enum SnapshotError {
    /// Nothing to analyze: no organism files in the directory
    #[error("no .bb8 files found in {0}")]
    NoData(PathBuf),

    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Where one snapshot's files live.
///
/// A snapshot can be named by its data directory, by the `bibites/`
/// directory inside it, or by any organism file in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotDir {
    /// Directory the organism files are read from
    pub records_dir: PathBuf,

    /// Directory named after the save archive it was extracted from
    pub data_dir: PathBuf,
}

impl SnapshotDir {
    pub fn new(path: &Path) -> Self {
        let path = if path.is_file() {
            path.parent().unwrap_or(path)
        } else {
            path
        };

        let nested = path.join(BIBITES_DIR);
        if path.file_name().is_some_and(|n| n == BIBITES_DIR) {
            Self {
                records_dir: path.to_path_buf(),
                data_dir: path.parent().unwrap_or(path).to_path_buf(),
            }
        } else if nested.is_dir() && !has_records(path) {
            Self {
                records_dir: nested,
                data_dir: path.to_path_buf(),
            }
        } else {
            Self {
                records_dir: path.to_path_buf(),
                data_dir: path.to_path_buf(),
            }
        }
    }

    /// Save name the snapshot was extracted from
    pub fn save_name(&self) -> Option<&str> {
        self.data_dir.file_name().and_then(|n| n.to_str())
    }

    /// Organism files in sorted filename order
    pub fn record_files(&self) -> Result<Vec<PathBuf>, SnapshotError> {
        let entries = std::fs::read_dir(&self.records_dir).map_err(|source| SnapshotError::Io {
            path: self.records_dir.clone(),
            source,
        })?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && is_record_file(p))
            .collect();
        files.sort();

        if files.is_empty() {
            return Err(SnapshotError::NoData(self.records_dir.clone()));
        }
        Ok(files)
    }
}

fn has_records(dir: &Path) -> bool {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .any(|e| is_record_file(&e.path()))
        })
        .unwrap_or(false)
}

pub fn is_record_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(RECORD_EXTENSION))
}

/// Every loadable organism of one snapshot
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub dir: SnapshotDir,
    pub records: Vec<Record>,
    /// Files that failed to load, as `file: reason`
    pub errors: Vec<String>,
}

impl Snapshot {
    /// Organism files that were found, loadable or not
    pub fn file_count(&self) -> usize {
        self.records.len() + self.errors.len()
    }
}

/// Load every organism file of a snapshot.
///
/// Unparsable files are recorded in `errors` and skipped; the only failure
/// is a directory without any organism files.
pub fn load_snapshot(path: &Path) -> Result<Snapshot, SnapshotError> {
    let dir = SnapshotDir::new(path);
    let files = dir.record_files()?;

    tracing::info!(
        "Loading {} organisms from {}",
        files.len(),
        dir.records_dir.display()
    );

    let mut records = Vec::with_capacity(files.len());
    let mut errors = Vec::new();
    for file in files {
        match Record::load(&file) {
            Ok(record) => records.push(record),
            Err(e) => {
                tracing::debug!("Skipping {}: {}", file.display(), e);
                errors.push(format!("{}: {}", file_label(&file), e));
            }
        }
    }

    if !errors.is_empty() {
        tracing::warn!("{} organism files failed to load", errors.len());
    }

    Ok(Snapshot {
        dir,
        records,
        errors,
    })
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// One row of a batch field extraction
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldRow {
    pub file: String,
    pub fields: BTreeMap<String, Option<Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldTable {
    pub paths: Vec<String>,
    pub rows: Vec<FieldRow>,
    pub errors: Vec<String>,
}

/// Extract the same dotted paths from every organism of a snapshot
pub fn extract_fields(path: &Path, paths: &[String]) -> Result<FieldTable, SnapshotError> {
    let snapshot = load_snapshot(path)?;
    Ok(FieldTable {
        paths: paths.to_vec(),
        rows: snapshot
            .records
            .iter()
            .map(|record| FieldRow {
                file: record.name().to_string(),
                fields: record.extract_many(paths),
            })
            .collect(),
        errors: snapshot.errors,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn write_record(dir: &Path, name: &str, body: &str) {
        std::fs::write(dir.join(name), body).unwrap();
    }

    #[test]
    fn test_snapshot_dir_variants() {
        let root = tempfile::tempdir().unwrap();
        let data = root.path().join("autosave_20250831115522");
        let bibites = data.join(BIBITES_DIR);
        std::fs::create_dir_all(&bibites).unwrap();
        write_record(&bibites, "bibite_0.bb8", "{}");

        let from_data = SnapshotDir::new(&data);
        assert_eq!(from_data.records_dir, bibites);
        assert_eq!(from_data.save_name(), Some("autosave_20250831115522"));

        let from_bibites = SnapshotDir::new(&bibites);
        assert_eq!(from_bibites, from_data);

        let from_file = SnapshotDir::new(&bibites.join("bibite_0.bb8"));
        assert_eq!(from_file, from_data);
    }

    #[test]
    fn test_flat_directory() {
        let root = tempfile::tempdir().unwrap();
        write_record(root.path(), "bibite_0.bb8", "{}");
        let dir = SnapshotDir::new(root.path());
        assert_eq!(dir.records_dir, root.path());
        assert_eq!(dir.data_dir, root.path());
    }

    #[test]
    fn test_load_snapshot_collects_errors() {
        let root = tempfile::tempdir().unwrap();
        write_record(root.path(), "bibite_1.bb8", r#"{"genes": {"tag": "A"}}"#);
        write_record(root.path(), "bibite_2.bb8", "not json");
        write_record(root.path(), "notes.txt", "ignored");

        let snapshot = load_snapshot(root.path()).unwrap();
        assert_eq!(snapshot.records.len(), 1);
        assert_eq!(snapshot.errors.len(), 1);
        assert!(snapshot.errors[0].starts_with("bibite_2.bb8:"));
        assert_eq!(snapshot.file_count(), 2);
    }

    #[test]
    fn test_empty_directory_is_no_data() {
        let root = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_snapshot(root.path()),
            Err(SnapshotError::NoData(_))
        ));
    }

    #[test]
    fn test_extract_fields() {
        let root = tempfile::tempdir().unwrap();
        write_record(root.path(), "bibite_1.bb8", r#"{"genes": {"tag": "A", "gen": 3}}"#);
        write_record(root.path(), "bibite_2.bb8", r#"{"genes": {"tag": "B"}}"#);

        let paths = vec!["genes.tag".to_string(), "genes.gen".to_string()];
        let table = extract_fields(root.path(), &paths).unwrap();
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0].file, "bibite_1.bb8");
        assert_eq!(table.rows[0].fields["genes.gen"], Some(json!(3)));
        assert_eq!(table.rows[1].fields["genes.gen"], None);
    }
}
