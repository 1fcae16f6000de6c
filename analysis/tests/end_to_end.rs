use analysis::{
    extract_save, read_save_metadata, resolve_zones, AnalysisConfig, FixedArchive,
    SaveCatalog, SpatialAggregator,
};
use serde_json::json;
use shared::{ClassificationMode, NO_SPECIES};
use std::io::Write;
use std::path::Path;

const SETTINGS: &str = r#"{
    "SimulationSize": { "Value": 1000 },
    "zones": [
        { "name": "Core", "material": "Plant", "distribution": "CentricGradual", "radius": 0.3 },
        { "name": "Mid", "material": "Plant", "distribution": "Ring", "insideRadius": 0.6, "radius": 1.0 },
        { "name": "Spawn", "material": "Meat", "distribution": "Flat", "posX": 0.5, "radius": 0.2 }
    ]
}"#;

fn bibite(x: f64, y: f64, tag: Option<&str>) -> String {
    let genes = match tag {
        Some(tag) => json!({ "tag": tag, "speciesID": 1 }),
        None => json!({ "speciesID": 2 }),
    };
    json!({
        "transform": {},
        "genes": genes,
        "brain": { "Nodes": [], "Synapses": [] },
        "rb2d": { "px": x, "py": y },
        "body": {},
        "clock": { "timeAlive": 10.0 }
    })
    .to_string()
}

fn write_save(path: &Path) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    let file = std::fs::File::create(path).unwrap();
    let mut writer = zip::ZipWriter::new(file);
    let entries = [
        ("settings.json".to_string(), SETTINGS.to_string()),
        ("bibites/bibite_0.bb8".to_string(), bibite(0.0, 0.0, Some("Red"))),
        ("bibites/bibite_1.bb8".to_string(), bibite(700.0, 0.0, None)),
        ("bibites/bibite_2.bb8".to_string(), bibite(2000.0, 0.0, Some("Red"))),
        ("eggs/egg_0.bb8".to_string(), "{}".to_string()),
        ("screenshot.png".to_string(), "png".to_string()),
    ];
    for (name, body) in entries {
        writer
            .start_file(name, zip::write::FileOptions::default())
            .unwrap();
        writer.write_all(body.as_bytes()).unwrap();
    }
    writer.finish().unwrap();
}

#[test]
fn test_spatial_report_from_autosave() {
    let root = tempfile::tempdir().unwrap();
    let config = AnalysisConfig {
        saves_dir: root.path().join("Savefiles"),
        data_dir: root.path().join("data"),
        ..Default::default()
    };
    write_save(&config.saves_dir.join("Autosaves").join("autosave_20250101120000.zip"));

    let catalog = SaveCatalog::new(&config);
    let save = catalog.latest_autosave().unwrap();
    let out_dir = catalog.output_dir(&save);
    let stats = extract_save(&save.path, &out_dir).unwrap();
    assert_eq!(stats.bibites, 3);
    assert_eq!(stats.eggs, 1);
    assert_eq!(stats.images, 1);

    let report = SpatialAggregator::new(catalog, config.clone())
        .aggregate(&out_dir)
        .unwrap();

    assert_eq!(report.classification, ClassificationMode::Metadata);
    assert_eq!(report.world_radius, 1000.0);
    assert_eq!(report.total_organisms, 3);
    assert_eq!(report.zone_totals["Core"], 1);
    assert_eq!(report.zone_totals["Mid"], 2);
    assert_eq!(report.zone_species_breakdown["Mid"][NO_SPECIES], 1);
    assert_eq!(report.zone_configuration.len(), 2);
    assert!(report.errors.is_empty());

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["radial_analysis"]["overall_range"], json!([0.0, 2000.0]));
}

#[test]
fn test_metadata_inspection_and_resolution() {
    let root = tempfile::tempdir().unwrap();
    let zip_path = root.path().join("experiment.zip");
    write_save(&zip_path);

    let metadata = read_save_metadata(&zip_path).unwrap();
    assert_eq!(metadata.save_name, "experiment");
    assert_eq!(metadata.files.len(), 1);
    assert_eq!(metadata.files[0].zone_candidates, 3);

    let data = root.path().join("experiment");
    std::fs::create_dir_all(&data).unwrap();
    let resolved = resolve_zones(FixedArchive(zip_path), &data, &AnalysisConfig::default());
    let names: Vec<_> = resolved.zones.iter().map(|z| z.name.as_str()).collect();
    assert_eq!(names, vec!["Core", "Mid"]);
    assert_eq!(resolved.world_radius, 1000.0);
}
