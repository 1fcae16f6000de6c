//! Reads the non-organism files of a save archive and harvests zone
//! definitions and world settings from whatever format they are in.

use crate::catalog::{categorize_entry, EntryKind};
use serde::Serialize;
use serde_json::{Map, Value};
use shared::record::strip_bom;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Seek};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Key substrings that mark an object as describing a zone
const ZONE_INDICATORS: [&str; 7] = [
    "zone",
    "region",
    "area",
    "island",
    "habitat",
    "biome",
    "territory",
];

/// Zone geometry keys; any of these also marks an object as a zone
const ZONE_GEOMETRY_KEYS: [&str; 6] = [
    "material",
    "distribution",
    "posx",
    "posy",
    "radius",
    "insideradius",
];

/// Shortest printable run reported from binary files
const MIN_STRING_LEN: usize = 4;

/// Nested settings whose JSON text is shorter than this are kept whole
const SMALL_SETTING_LEN: usize = 200;

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("save file not found: {0}")]
    NotFound(PathBuf),

    #[error("file is not a .zip file: {0}")]
    NotZip(PathBuf),

    #[error("invalid or corrupted zip file {path}: {source}")]
    BadArchive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// How a metadata file was understood
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FileKind {
    Json,
    Xml,
    Ini,
    Text,
    /// Not UTF-8; only printable runs are reported, never zone data
    Binary {
        strings: usize,
        zone_strings: Vec<String>,
        setting_strings: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileReport {
    pub name: String,
    pub size: usize,
    pub kind: FileKind,
    pub zone_candidates: usize,
}

/// Everything harvested from one save archive
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SaveMetadata {
    pub save_name: String,
    pub files: Vec<FileReport>,
    /// Zone-like objects, unfiltered, in discovery order
    pub zones: Vec<Map<String, Value>>,
    /// Flattened settings; later files override earlier ones
    pub settings: BTreeMap<String, Value>,
    /// Parsed structured documents, used for the world-radius lookup
    #[serde(skip)]
    pub documents: Vec<Value>,
    pub errors: Vec<String>,
}

/// Open a save archive and analyze every metadata entry
pub fn read_save_metadata(zip_path: &Path) -> Result<SaveMetadata, MetadataError> {
    if !zip_path.exists() {
        return Err(MetadataError::NotFound(zip_path.to_path_buf()));
    }
    let is_zip = zip_path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("zip"));
    if !is_zip {
        return Err(MetadataError::NotZip(zip_path.to_path_buf()));
    }

    let file = File::open(zip_path).map_err(|source| MetadataError::Io {
        path: zip_path.to_path_buf(),
        source,
    })?;
    let archive = zip::ZipArchive::new(file).map_err(|source| MetadataError::BadArchive {
        path: zip_path.to_path_buf(),
        source,
    })?;

    let save_name = zip_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(read_archive_metadata(archive, save_name))
}

/// Analyze the metadata entries of an already opened archive
pub fn read_archive_metadata<R: Read + Seek>(
    mut archive: zip::ZipArchive<R>,
    save_name: String,
) -> SaveMetadata {
    let mut metadata = SaveMetadata {
        save_name,
        ..Default::default()
    };

    let names: Vec<String> = archive
        .file_names()
        .filter(|name| categorize_entry(name) == EntryKind::Metadata && !name.ends_with('/'))
        .map(str::to_string)
        .collect();

    tracing::debug!(
        "Found {} metadata files in {}",
        names.len(),
        metadata.save_name
    );

    for name in names {
        let mut bytes = Vec::new();
        let read = archive
            .by_name(&name)
            .map_err(|e| e.to_string())
            .and_then(|mut entry| entry.read_to_end(&mut bytes).map_err(|e| e.to_string()));
        if let Err(e) = read {
            let message = format!("Failed to analyze {name}: {e}");
            tracing::warn!("{}", message);
            metadata.errors.push(message);
            continue;
        }

        let file_name = name.rsplit(['/', '\\']).next().unwrap_or(&name).to_string();
        let parsed = parse_document(&bytes);
        if let Some(error) = &parsed.error {
            tracing::warn!("Failed to parse {}: {}", file_name, error);
        }

        let mut zone_candidates = 0;
        if let Some(document) = parsed.document {
            let zones = find_zone_candidates(&document);
            zone_candidates = zones.len();
            metadata.zones.extend(zones);
            if parsed.kind != FileKind::Xml {
                metadata.settings.extend(flatten_settings(&document));
            }
            metadata.documents.push(document);
        }

        metadata.files.push(FileReport {
            name: file_name,
            size: bytes.len(),
            kind: parsed.kind,
            zone_candidates,
        });
    }

    metadata
}

/// Result of sniffing one metadata file
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedDocument {
    pub kind: FileKind,
    pub document: Option<Value>,
    /// Parse failure of the format the content looked like
    pub error: Option<String>,
}

/// Try JSON, then XML (text starting with `<`), then INI (text containing
/// `=` or `[`), else plain text. Bytes that are not UTF-8 are binary.
pub fn parse_document(bytes: &[u8]) -> ParsedDocument {
    let text = match std::str::from_utf8(strip_bom(bytes)) {
        Ok(text) => text,
        Err(_) => {
            return ParsedDocument {
                kind: analyze_binary(bytes),
                document: None,
                error: None,
            }
        }
    };

    let json_error = match serde_json::from_str::<Value>(text) {
        Ok(value) if is_meaningful(&value) => {
            return ParsedDocument {
                kind: FileKind::Json,
                document: Some(value),
                error: None,
            }
        }
        Ok(_) => None,
        Err(e) => Some(format!("invalid JSON: {e}")),
    };

    let trimmed = text.trim_start();
    if trimmed.starts_with('<') {
        return match xml_to_value(text) {
            Ok(value) => ParsedDocument {
                kind: FileKind::Xml,
                document: Some(value),
                error: None,
            },
            Err(e) => ParsedDocument {
                kind: FileKind::Text,
                document: None,
                error: Some(format!("invalid XML: {e}")),
            },
        };
    }

    if text.contains('=') || text.contains('[') {
        return match parse_ini(text) {
            Some(value) => ParsedDocument {
                kind: FileKind::Ini,
                document: Some(value),
                error: None,
            },
            None => ParsedDocument {
                kind: FileKind::Text,
                document: None,
                error: json_error.or_else(|| Some("invalid INI".to_string())),
            },
        };
    }

    ParsedDocument {
        kind: FileKind::Text,
        document: None,
        error: None,
    }
}

/// Empty or scalar JSON documents carry no settings
fn is_meaningful(value: &Value) -> bool {
    match value {
        Value::Object(map) => !map.is_empty(),
        Value::Array(items) => !items.is_empty(),
        _ => false,
    }
}

/// Convert an XML document into the same value model as JSON.
///
/// Attributes become keys, repeated child tags become arrays and a text-only
/// element collapses to its text.
pub fn xml_to_value(text: &str) -> Result<Value, roxmltree::Error> {
    let doc = roxmltree::Document::parse(text)?;
    let root = doc.root_element();
    let mut wrapper = Map::new();
    wrapper.insert(root.tag_name().name().to_string(), element_to_value(root));
    Ok(Value::Object(wrapper))
}

fn element_to_value(node: roxmltree::Node<'_, '_>) -> Value {
    let mut map = Map::new();
    for attr in node.attributes() {
        map.insert(attr.name().to_string(), Value::String(attr.value().to_string()));
    }

    let text = node.text().map(str::trim).filter(|t| !t.is_empty());
    let children: Vec<_> = node.children().filter(|c| c.is_element()).collect();

    if let Some(text) = text {
        if map.is_empty() && children.is_empty() {
            return Value::String(text.to_string());
        }
        map.insert("_text".to_string(), Value::String(text.to_string()));
    }

    for child in children {
        let tag = child.tag_name().name().to_string();
        let value = element_to_value(child);
        match map.get_mut(&tag) {
            Some(Value::Array(items)) => items.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                map.insert(tag, value);
            }
        }
    }

    Value::Object(map)
}

/// Parse `[section]` / `key = value` text into `{section: {key: value}}`.
///
/// Keys are lower-cased, `;` and `#` start comments and `:` is accepted as a
/// separator. Returns `None` for text with no sections or a key outside one.
pub fn parse_ini(text: &str) -> Option<Value> {
    let mut sections = Map::new();
    let mut current: Option<String> = None;

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
            continue;
        }

        if let Some(section) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            let section = section.trim().to_string();
            sections
                .entry(section.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            current = Some(section);
            continue;
        }

        let section = current.as_ref()?;
        let (key, value) = line.split_once('=').or_else(|| line.split_once(':'))?;
        if let Some(Value::Object(entries)) = sections.get_mut(section) {
            entries.insert(
                key.trim().to_lowercase(),
                Value::String(value.trim().to_string()),
            );
        }
    }

    (!sections.is_empty()).then_some(Value::Object(sections))
}

/// Printable ASCII runs of at least four characters
pub fn printable_strings(bytes: &[u8]) -> Vec<String> {
    let mut strings = Vec::new();
    let mut current = String::new();
    for &byte in bytes {
        if (32..=126).contains(&byte) {
            current.push(byte as char);
        } else {
            if current.len() >= MIN_STRING_LEN {
                strings.push(std::mem::take(&mut current));
            }
            current.clear();
        }
    }
    if current.len() >= MIN_STRING_LEN {
        strings.push(current);
    }
    strings
}

fn analyze_binary(bytes: &[u8]) -> FileKind {
    let strings = printable_strings(bytes);
    let matching = |words: &[&str]| -> Vec<String> {
        strings
            .iter()
            .filter(|s| {
                let lower = s.to_lowercase();
                words.iter().any(|w| lower.contains(w))
            })
            .take(10)
            .cloned()
            .collect()
    };

    FileKind::Binary {
        strings: strings.len(),
        zone_strings: matching(&["zone", "region", "island", "area", "habitat"]),
        setting_strings: matching(&["setting", "config", "param", "value"]),
    }
}

/// Recursively collect zone-like objects.
///
/// Every object element of a `zones` array is a candidate. Any other object
/// with a zone indicator or zone geometry key is a candidate too, unless it
/// is the holder of a `zones` array. Elements of `zones` arrays are not
/// searched further.
pub fn find_zone_candidates(document: &Value) -> Vec<Map<String, Value>> {
    let mut found = Vec::new();
    search_zones(document, &mut found);
    found
}

fn search_zones(value: &Value, found: &mut Vec<Map<String, Value>>) {
    match value {
        Value::Object(map) => {
            let zones = zones_array(map);
            if let Some(zones) = zones {
                found.extend(zones.iter().filter_map(Value::as_object).cloned());
            } else if is_zone_like(map) {
                found.push(map.clone());
            }

            for (key, child) in map {
                let is_zones_array = zones.is_some() && key.eq_ignore_ascii_case("zones");
                if !is_zones_array && (child.is_object() || child.is_array()) {
                    search_zones(child, found);
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                search_zones(item, found);
            }
        }
        _ => {}
    }
}

fn zones_array(map: &Map<String, Value>) -> Option<&Vec<Value>> {
    map.iter()
        .find(|(k, v)| k.eq_ignore_ascii_case("zones") && v.is_array())
        .and_then(|(_, v)| v.as_array())
}

fn is_zone_like(map: &Map<String, Value>) -> bool {
    map.keys().any(|key| {
        let key = key.to_lowercase();
        ZONE_INDICATORS.iter().any(|w| key.contains(w)) || ZONE_GEOMETRY_KEYS.contains(&key.as_str())
    })
}

/// Flatten nested settings into `a.b.c` keys.
///
/// Scalars are kept as is, small nested structures are kept whole and larger
/// objects are descended into. Small objects inside arrays are flattened
/// with an `[i]` suffix.
pub fn flatten_settings(document: &Value) -> BTreeMap<String, Value> {
    let mut settings = BTreeMap::new();
    flatten_into(document, "", &mut settings);
    settings
}

fn flatten_into(value: &Value, prefix: &str, settings: &mut BTreeMap<String, Value>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                match child {
                    Value::Object(_) | Value::Array(_) => {
                        if child.to_string().len() < SMALL_SETTING_LEN {
                            settings.insert(path, child.clone());
                        } else if child.is_object() {
                            flatten_into(child, &path, settings);
                        }
                    }
                    Value::Null => {}
                    scalar => {
                        settings.insert(path, scalar.clone());
                    }
                }
            }
        }
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                if item.as_object().is_some_and(|m| m.len() < 10) {
                    flatten_into(item, &format!("{prefix}[{i}]"), settings);
                }
            }
        }
        _ => {}
    }
}

/// World radius from a `SimulationSize`-like setting.
///
/// The value is either a number (possibly as text) or an object whose
/// `Value` field holds it. The first match in document order wins.
pub fn find_world_radius(documents: &[Value]) -> Option<f64> {
    documents.iter().find_map(search_simulation_size)
}

fn search_simulation_size(value: &Value) -> Option<f64> {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                if key.to_lowercase().contains("simulationsize") {
                    if let Some(size) = setting_number(child) {
                        return Some(size);
                    }
                }
            }
            map.values().find_map(search_simulation_size)
        }
        Value::Array(items) => items.iter().find_map(search_simulation_size),
        _ => None,
    }
}

fn setting_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        Value::Object(map) => map
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case("value"))
            .and_then(|(_, v)| setting_number(v)),
        _ => None,
    }
}
