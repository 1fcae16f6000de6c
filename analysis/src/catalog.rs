use crate::config::AnalysisConfig;
use crate::snapshot::BIBITES_DIR;
use serde::Serialize;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use thiserror::Error;

/// Extensions of screenshots and thumbnails stored inside saves
pub const IMAGE_EXTENSIONS: [&str; 7] = ["png", "jpg", "jpeg", "gif", "bmp", "tiff", "webp"];

const AUTOSAVE_PREFIX: &str = "autosave_";

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("no save directory found at {0}")]
    MissingSaveDir(PathBuf),

    #[error("no save matching '{0}'")]
    NoMatch(String),

    #[error("no autosaves found in {0}")]
    NoAutosaves(PathBuf),

    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid save archive {path}: {source}")]
    Archive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },
}

/// Maps an extracted snapshot directory back to the save archive it came from
pub trait ArchiveLocator {
    fn locate(&self, data_dir: &Path) -> Option<PathBuf>;
}

impl<T: ArchiveLocator + ?Sized> ArchiveLocator for Box<T> {
    fn locate(&self, data_dir: &Path) -> Option<PathBuf> {
        (**self).locate(data_dir)
    }
}

/// Always answers with one known archive
#[derive(Debug, Clone)]
pub struct FixedArchive(pub PathBuf);

impl ArchiveLocator for FixedArchive {
    fn locate(&self, _data_dir: &Path) -> Option<PathBuf> {
        self.0.is_file().then(|| self.0.clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveKind {
    Autosave,
    Manual,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SaveEntry {
    pub name: String,
    pub path: PathBuf,
    pub kind: SaveKind,
    pub size_bytes: u64,
    #[serde(skip)]
    pub modified: Option<SystemTime>,
    /// Whether a snapshot directory already exists for this save
    pub cached: bool,
}

/// Save archives on disk: manual saves plus the autosave folder
#[derive(Debug, Clone)]
pub struct SaveCatalog {
    saves_dir: PathBuf,
    autosave_dirs: Vec<PathBuf>,
    data_dir: PathBuf,
}

impl SaveCatalog {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            saves_dir: config.saves_dir.clone(),
            autosave_dirs: config.autosave_dirs(),
            data_dir: config.data_dir.clone(),
        }
    }

    /// Every save archive, autosaves first, each group sorted by name
    pub fn list(&self) -> Result<Vec<SaveEntry>, CatalogError> {
        if !self.saves_dir.is_dir() {
            return Err(CatalogError::MissingSaveDir(self.saves_dir.clone()));
        }

        let mut saves = Vec::new();
        for dir in &self.autosave_dirs {
            saves.extend(self.scan(dir, SaveKind::Autosave)?);
        }
        saves.extend(self.scan(&self.saves_dir, SaveKind::Manual)?);
        Ok(saves)
    }

    /// Newest autosave; autosave names embed their timestamp
    pub fn latest_autosave(&self) -> Result<SaveEntry, CatalogError> {
        let mut autosaves = Vec::new();
        for dir in &self.autosave_dirs {
            autosaves.extend(self.scan(dir, SaveKind::Autosave)?);
        }
        autosaves
            .into_iter()
            .filter(|s| s.name.starts_with(AUTOSAVE_PREFIX))
            .max_by(|a, b| a.name.cmp(&b.name))
            .ok_or_else(|| CatalogError::NoAutosaves(self.saves_dir.clone()))
    }

    /// Save whose name equals `pattern`, else the newest one containing it
    pub fn find(&self, pattern: &str) -> Result<SaveEntry, CatalogError> {
        let saves = self.list()?;
        if let Some(exact) = saves.iter().find(|s| s.name == pattern) {
            return Ok(exact.clone());
        }
        let needle = pattern.to_lowercase();
        saves
            .into_iter()
            .filter(|s| s.name.to_lowercase().contains(&needle))
            .max_by(|a, b| a.modified.cmp(&b.modified).then_with(|| a.name.cmp(&b.name)))
            .ok_or_else(|| CatalogError::NoMatch(pattern.to_string()))
    }

    /// Snapshot directory a save extracts to
    pub fn output_dir(&self, save: &SaveEntry) -> PathBuf {
        self.data_dir.join(&save.name)
    }

    fn scan(&self, dir: &Path, kind: SaveKind) -> Result<Vec<SaveEntry>, CatalogError> {
        let entries = std::fs::read_dir(dir).map_err(|source| CatalogError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut saves: Vec<SaveEntry> = entries
            .filter_map(Result::ok)
            .map(|e| e.path())
            .filter(|p| p.is_file() && is_zip(p))
            .filter_map(|path| {
                let name = path.file_stem()?.to_str()?.to_string();
                let meta = std::fs::metadata(&path).ok();
                Some(SaveEntry {
                    cached: self.data_dir.join(&name).join(BIBITES_DIR).is_dir(),
                    size_bytes: meta.as_ref().map(|m| m.len()).unwrap_or(0),
                    modified: meta.and_then(|m| m.modified().ok()),
                    name,
                    path,
                    kind,
                })
            })
            .collect();
        saves.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(saves)
    }
}

impl ArchiveLocator for SaveCatalog {
    fn locate(&self, data_dir: &Path) -> Option<PathBuf> {
        let name = data_dir.file_name()?.to_str()?;
        let mut dirs = self.autosave_dirs.clone();
        dirs.push(self.saves_dir.clone());
        dirs.into_iter()
            .map(|dir| dir.join(format!("{name}.zip")))
            .find(|candidate| candidate.is_file())
    }
}

fn is_zip(path: &Path) -> bool {
    has_extension(path, &["zip"])
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| extensions.iter().any(|x| x.eq_ignore_ascii_case(e)))
}

/// What an entry inside a save archive holds
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryKind {
    Bibite(u32),
    Egg(u32),
    /// Organism file that matches neither naming pattern
    OtherRecord,
    Image,
    /// Everything else: settings, world state, scene descriptions
    Metadata,
}

/// Classify an archive entry name; both `/` and `\` separate directories
pub fn categorize_entry(name: &str) -> EntryKind {
    let normalized = name.replace('\\', "/").to_lowercase();
    let path = Path::new(&normalized);

    if has_extension(path, &IMAGE_EXTENSIONS) {
        return EntryKind::Image;
    }
    if !has_extension(path, &[shared::RECORD_EXTENSION]) {
        return EntryKind::Metadata;
    }

    let parts: Vec<&str> = normalized.split('/').collect();
    let basename = parts.last().copied().unwrap_or_default();
    let stem = basename.trim_end_matches(".bb8");

    if let Some(n) = numbered(stem, "bibite_") {
        if parts.contains(&"bibites") || basename.contains("bibite") {
            return EntryKind::Bibite(n);
        }
    }
    if let Some(n) = numbered(stem, "egg_") {
        if parts.contains(&"eggs") || basename.contains("egg") {
            return EntryKind::Egg(n);
        }
    }
    EntryKind::OtherRecord
}

fn numbered(stem: &str, prefix: &str) -> Option<u32> {
    stem.strip_prefix(prefix)?.parse().ok()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExtractionStats {
    pub bibites: usize,
    pub eggs: usize,
    pub images: usize,
    pub skipped: usize,
    pub errors: Vec<String>,
}

/// Unpack a save into `out_dir/{bibites,eggs,images}`.
///
/// Entries that fail to read or write are recorded and skipped.
pub fn extract_save(zip_path: &Path, out_dir: &Path) -> Result<ExtractionStats, CatalogError> {
    let file = File::open(zip_path).map_err(|source| CatalogError::Io {
        path: zip_path.to_path_buf(),
        source,
    })?;
    let mut archive = zip::ZipArchive::new(file).map_err(|source| CatalogError::Archive {
        path: zip_path.to_path_buf(),
        source,
    })?;

    let mut stats = ExtractionStats::default();
    for i in 0..archive.len() {
        let mut entry = match archive.by_index(i) {
            Ok(entry) => entry,
            Err(e) => {
                stats.errors.push(format!("entry {i}: {e}"));
                continue;
            }
        };
        if entry.is_dir() {
            continue;
        }

        let name = entry.name().to_string();
        let target = match categorize_entry(&name) {
            EntryKind::Bibite(n) => {
                stats.bibites += 1;
                out_dir.join(BIBITES_DIR).join(format!("bibite_{n}.bb8"))
            }
            EntryKind::Egg(n) => {
                stats.eggs += 1;
                out_dir.join("eggs").join(format!("egg_{n}.bb8"))
            }
            EntryKind::Image => {
                stats.images += 1;
                out_dir.join("images").join(entry_basename(&name))
            }
            EntryKind::OtherRecord | EntryKind::Metadata => {
                stats.skipped += 1;
                continue;
            }
        };

        let mut bytes = Vec::new();
        if let Err(e) = entry.read_to_end(&mut bytes) {
            stats.errors.push(format!("{name}: {e}"));
            continue;
        }
        if let Err(e) = write_file(&target, &bytes) {
            stats.errors.push(format!("{name}: {e}"));
        }
    }

    tracing::info!(
        "Extracted {} bibites, {} eggs, {} images from {}",
        stats.bibites,
        stats.eggs,
        stats.images,
        zip_path.display()
    );
    Ok(stats)
}

fn entry_basename(name: &str) -> String {
    name.rsplit(['/', '\\']).next().unwrap_or(name).to_string()
}

fn write_file(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::FileOptions;

    fn write_zip(path: &Path, entries: &[(&str, &str)]) {
        let mut writer = zip::ZipWriter::new(File::create(path).unwrap());
        for (name, body) in entries {
            writer.start_file(*name, FileOptions::default()).unwrap();
            writer.write_all(body.as_bytes()).unwrap();
        }
        writer.finish().unwrap();
    }

    fn catalog_in(root: &Path) -> SaveCatalog {
        SaveCatalog::new(&AnalysisConfig {
            saves_dir: root.join("Savefiles"),
            data_dir: root.join("data"),
            ..Default::default()
        })
    }

    #[test]
    fn test_categorize_entry() {
        assert_eq!(categorize_entry("bibites/bibite_5.bb8"), EntryKind::Bibite(5));
        assert_eq!(categorize_entry("bibites\\bibite_12.bb8"), EntryKind::Bibite(12));
        assert_eq!(categorize_entry("eggs/egg_2.bb8"), EntryKind::Egg(2));
        assert_eq!(categorize_entry("misc/thing.bb8"), EntryKind::OtherRecord);
        assert_eq!(categorize_entry("screenshot.PNG"), EntryKind::Image);
        assert_eq!(categorize_entry("settings.bb8settings"), EntryKind::Metadata);
        assert_eq!(categorize_entry("scene.bb8scene"), EntryKind::Metadata);
    }

    #[test]
    fn test_extract_save() {
        let root = tempfile::tempdir().unwrap();
        let zip_path = root.path().join("save.zip");
        write_zip(
            &zip_path,
            &[
                ("bibites/bibite_0.bb8", "{}"),
                ("bibites/bibite_1.bb8", "{}"),
                ("eggs/egg_0.bb8", "{}"),
                ("settings.bb8settings", "{}"),
            ],
        );

        let out = root.path().join("out");
        let stats = extract_save(&zip_path, &out).unwrap();
        assert_eq!(stats.bibites, 2);
        assert_eq!(stats.eggs, 1);
        assert_eq!(stats.skipped, 1);
        assert!(stats.errors.is_empty());
        assert!(out.join("bibites/bibite_1.bb8").is_file());
        assert!(out.join("eggs/egg_0.bb8").is_file());
    }

    #[test]
    fn test_extract_save_keeps_large_entries_whole() {
        let root = tempfile::tempdir().unwrap();
        let zip_path = root.path().join("save.zip");
        let body = format!(r#"{{"genes": {{"tag": "{}"}}}}"#, "x".repeat(300_000));
        write_zip(&zip_path, &[("bibites/bibite_0.bb8", body.as_str())]);

        let out = root.path().join("out");
        let stats = extract_save(&zip_path, &out).unwrap();
        assert_eq!(stats.bibites, 1);
        let written = std::fs::read_to_string(out.join("bibites/bibite_0.bb8")).unwrap();
        assert_eq!(written, body);
    }

    #[test]
    fn test_catalog_locates_archive() {
        let root = tempfile::tempdir().unwrap();
        let autosaves = root.path().join("Savefiles/Autosaves");
        std::fs::create_dir_all(&autosaves).unwrap();
        write_zip(&autosaves.join("autosave_20250831115522.zip"), &[]);
        write_zip(&root.path().join("Savefiles/experiment.zip"), &[]);

        let catalog = catalog_in(root.path());
        let data_dir = root.path().join("data/autosave_20250831115522");
        assert_eq!(
            catalog.locate(&data_dir),
            Some(autosaves.join("autosave_20250831115522.zip"))
        );
        assert_eq!(
            catalog.locate(&root.path().join("data/experiment")),
            Some(root.path().join("Savefiles/experiment.zip"))
        );
        assert_eq!(catalog.locate(&root.path().join("data/missing")), None);
    }

    #[test]
    fn test_latest_autosave_and_find() {
        let root = tempfile::tempdir().unwrap();
        let autosaves = root.path().join("Savefiles/Autosaves");
        std::fs::create_dir_all(&autosaves).unwrap();
        write_zip(&autosaves.join("autosave_20250830090000.zip"), &[]);
        write_zip(&autosaves.join("autosave_20250831115522.zip"), &[]);
        write_zip(&root.path().join("Savefiles/validation-1.zip"), &[]);

        let catalog = catalog_in(root.path());
        assert_eq!(catalog.list().unwrap().len(), 3);
        assert_eq!(
            catalog.latest_autosave().unwrap().name,
            "autosave_20250831115522"
        );

        let found = catalog.find("validation").unwrap();
        assert_eq!(found.kind, SaveKind::Manual);
        assert_eq!(
            catalog.output_dir(&found),
            root.path().join("data/validation-1")
        );
        assert!(matches!(catalog.find("nope"), Err(CatalogError::NoMatch(_))));
    }

    #[test]
    fn test_missing_save_dir() {
        let root = tempfile::tempdir().unwrap();
        let catalog = catalog_in(root.path());
        assert!(matches!(
            catalog.list(),
            Err(CatalogError::MissingSaveDir(_))
        ));
    }
}
