use crate::render::{fmt_num, fmt_pct, to_pretty_json, value_cell, write_json, OutputFormat, Table};
use analysis::metadata::FileKind;
use analysis::{
    analyze_combat, analyze_neural, compare_populations, extract_fields, extract_save,
    load_snapshot, read_save_metadata, summarize_population, AnalysisConfig, ArchiveLocator,
    CombatOptions, FixedArchive, SaveCatalog, SaveEntry, SaveKind, SnapshotDir,
    SpatialAggregator, ZoneResolver,
};
use anyhow::{bail, Context, Result};
use clap::Args;
use serde::Serialize;
use shared::Record;
use std::path::{Path, PathBuf};

/// Which snapshot a command works on
#[derive(Args, Debug, Clone)]
pub struct SnapshotArgs {
    /// Snapshot directory, its bibites/ folder, or one organism file
    pub path: Option<PathBuf>,

    /// Use the save whose name matches this pattern, extracting it if needed
    #[arg(long, conflicts_with = "path")]
    pub save: Option<String>,

    /// Use the newest autosave, extracting it if needed
    #[arg(long, conflicts_with_all = ["path", "save"])]
    pub latest: bool,
}

/// Where zone metadata comes from
#[derive(Args, Debug, Clone)]
pub struct ArchiveArgs {
    /// Save archive to read zones from instead of looking it up by name
    #[arg(long)]
    pub archive: Option<PathBuf>,
}

impl ArchiveArgs {
    fn locator(&self, config: &AnalysisConfig) -> Box<dyn ArchiveLocator> {
        match &self.archive {
            Some(path) => Box::new(FixedArchive(path.clone())),
            None => Box::new(SaveCatalog::new(config)),
        }
    }
}

/// Resolve the snapshot directory, extracting a save on first use
pub fn snapshot_path(args: &SnapshotArgs, config: &AnalysisConfig) -> Result<PathBuf> {
    if let Some(path) = &args.path {
        if !path.exists() {
            bail!("Path not found: {}", path.display());
        }
        return Ok(path.clone());
    }

    let catalog = SaveCatalog::new(config);
    let save = match (&args.save, args.latest) {
        (Some(pattern), _) => catalog.find(pattern)?,
        (None, true) => catalog.latest_autosave()?,
        (None, false) => bail!("Give a snapshot path, --save <pattern> or --latest"),
    };

    let out_dir = catalog.output_dir(&save);
    if save.cached {
        tracing::info!("Using cached snapshot {}", out_dir.display());
    } else {
        let stats = extract_save(&save.path, &out_dir)?;
        tracing::info!("Extracted {} organisms to {}", stats.bibites, out_dir.display());
    }
    Ok(out_dir)
}

fn emit<T: Serialize>(report: &T, output: Option<&Path>) -> Result<()> {
    if let Some(path) = output {
        write_json(path, report)?;
    }
    Ok(())
}

pub fn saves(config: &AnalysisConfig, json: bool) -> Result<()> {
    let saves = SaveCatalog::new(config).list()?;
    if json {
        println!("{}", to_pretty_json(&saves)?);
        return Ok(());
    }
    if saves.is_empty() {
        println!("No saves found in {}", config.saves_dir.display());
        return Ok(());
    }

    let mut table = Table::new(&["Name", "Kind", "Size (MB)", "Extracted"]);
    for save in &saves {
        table.push(save_row(save));
    }
    println!("{}", table.render());
    Ok(())
}

fn save_row(save: &SaveEntry) -> Vec<String> {
    let kind = match save.kind {
        SaveKind::Autosave => "autosave",
        SaveKind::Manual => "manual",
    };
    vec![
        save.name.clone(),
        kind.to_string(),
        format!("{:.1}", save.size_bytes as f64 / (1024.0 * 1024.0)),
        if save.cached { "yes" } else { "" }.to_string(),
    ]
}

pub fn extract(
    config: &AnalysisConfig,
    pattern: Option<&str>,
    out: Option<PathBuf>,
    force: bool,
) -> Result<()> {
    let catalog = SaveCatalog::new(config);
    let save = match pattern {
        Some(pattern) => catalog.find(pattern)?,
        None => catalog.latest_autosave()?,
    };
    let out_dir = out.unwrap_or_else(|| catalog.output_dir(&save));

    if save.cached && !force {
        println!("{} already extracted to {}", save.name, out_dir.display());
        return Ok(());
    }

    let stats = extract_save(&save.path, &out_dir)?;
    println!("Extracted {} to {}", save.name, out_dir.display());
    println!(
        "  bibites: {}  eggs: {}  images: {}  skipped: {}",
        stats.bibites, stats.eggs, stats.images, stats.skipped
    );
    if !stats.errors.is_empty() {
        tracing::warn!("{} entries failed to extract", stats.errors.len());
    }
    Ok(())
}

pub fn fields(path: &Path, paths: &[String], format: OutputFormat) -> Result<()> {
    if paths.is_empty() {
        bail!("Name at least one field, e.g. --field genes.tag");
    }
    let table = extract_fields(path, paths)?;
    if !table.errors.is_empty() {
        tracing::warn!("{} files failed to load", table.errors.len());
    }

    match format {
        OutputFormat::Json => println!("{}", to_pretty_json(&table.rows)?),
        OutputFormat::Table | OutputFormat::Csv => {
            let mut headers = vec!["file".to_string()];
            headers.extend(paths.iter().cloned());
            let mut out = Table::new(&headers);
            for row in &table.rows {
                let mut cells = vec![row.file.clone()];
                cells.extend(paths.iter().map(|p| value_cell(row.fields.get(p).and_then(Option::as_ref))));
                out.push(cells);
            }
            if format == OutputFormat::Csv {
                print!("{}", out.to_csv());
            } else {
                println!("{}", out.render());
            }
        }
    }
    Ok(())
}

pub fn validate(path: &Path) -> Result<()> {
    let dir = SnapshotDir::new(path);
    let files = dir.record_files()?;

    let mut valid = 0;
    let mut table = Table::new(&["File", "Problem"]);
    for file in &files {
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        match Record::load(file) {
            Ok(record) => {
                let missing = record.missing_sections();
                if missing.is_empty() {
                    valid += 1;
                } else {
                    table.push(vec![name, format!("missing {}", missing.join(", "))]);
                }
            }
            Err(e) => table.push(vec![name, e.to_string()]),
        }
    }

    println!("{valid}/{} organism files are valid", files.len());
    if !table.is_empty() {
        println!("{}", table.render());
    }
    Ok(())
}

pub fn zones(
    config: &AnalysisConfig,
    path: &Path,
    archive: &ArchiveArgs,
    output: Option<&Path>,
) -> Result<()> {
    let dir = SnapshotDir::new(path);
    let locator = archive.locator(config);
    let Some(zip) = locator.locate(&dir.data_dir) else {
        bail!("No save archive found for {}", dir.data_dir.display());
    };

    let metadata = read_save_metadata(&zip)?;
    let resolved = ZoneResolver::new(locator, config.default_world_radius).resolve(&dir);

    println!("Save: {}", metadata.save_name);
    let mut files = Table::new(&["File", "Size", "Kind", "Zone candidates"]);
    for file in &metadata.files {
        let kind = match &file.kind {
            FileKind::Json => "json".to_string(),
            FileKind::Xml => "xml".to_string(),
            FileKind::Ini => "ini".to_string(),
            FileKind::Text => "text".to_string(),
            FileKind::Binary { strings, .. } => format!("binary ({strings} strings)"),
        };
        files.push(vec![
            file.name.clone(),
            file.size.to_string(),
            kind,
            file.zone_candidates.to_string(),
        ]);
    }
    println!("{}", files.render());

    println!("\nWorld radius: {}", fmt_num(resolved.world_radius));
    let mut zones = Table::new(&["Zone", "Distribution", "Radius", "Inside", "Position", "Relative"]);
    for zone in &resolved.zones {
        zones.push(vec![
            zone.name.clone(),
            zone.distribution.to_string(),
            fmt_num(zone.radius),
            fmt_num(zone.inside_radius),
            format!("({}, {})", fmt_num(zone.pos_x), fmt_num(zone.pos_y)),
            zone.radius_is_relative.to_string(),
        ]);
    }
    if zones.is_empty() {
        println!("No plant zones found");
    } else {
        println!("{}", zones.render());
    }

    #[derive(Serialize)]
    struct ZonesReport<'a> {
        metadata: &'a analysis::SaveMetadata,
        resolved: &'a analysis::ResolvedZones,
    }
    emit(
        &ZonesReport {
            metadata: &metadata,
            resolved: &resolved,
        },
        output,
    )
}

pub fn spatial(
    config: &AnalysisConfig,
    path: &Path,
    archive: &ArchiveArgs,
    output: Option<&Path>,
) -> Result<()> {
    let aggregator = SpatialAggregator::new(archive.locator(config), config.clone());
    let report = aggregator
        .aggregate(path)
        .with_context(|| format!("Spatial analysis of {} failed", path.display()))?;

    let mut table = Table::new(&["Zone", "Count", "% of Population", "Dominant Species", "Species"]);
    for zone in &report.zones {
        let dominant = zone
            .dominant_species
            .as_ref()
            .map(|d| format!("{} ({})", d.species, d.count))
            .unwrap_or_default();
        table.push(vec![
            zone.zone.clone(),
            zone.count.to_string(),
            fmt_pct(zone.percentage),
            dominant,
            zone.species_count.to_string(),
        ]);
    }
    println!("{}", table.render());

    let radial = &report.radial_analysis;
    println!("\nOrganisms classified: {}", report.total_organisms);
    if report.unclassified > 0 {
        println!("Without coordinates: {}", report.unclassified);
    }
    println!(
        "World radius: {} ({:?} zones)",
        fmt_num(report.world_radius),
        report.classification
    );
    println!(
        "Distance from center: {} - {} (mean {})",
        fmt_num(radial.overall_range[0]),
        fmt_num(radial.overall_range[1]),
        fmt_num(radial.mean_distance)
    );
    if let Some((most, least)) = report.population_extremes() {
        println!("Most populated: {} ({})", most.zone, most.count);
        println!("Least populated: {} ({})", least.zone, least.count);
    }
    if !report.errors.is_empty() {
        tracing::warn!("{} problems during analysis", report.errors.len());
    }

    emit(&report, output)
}

pub fn population(path: &Path, output: Option<&Path>) -> Result<()> {
    let snapshot = load_snapshot(path)?;
    let summary = summarize_population(&snapshot.records);

    let mut table = Table::new(&["Species", "Count", "Percentage"]);
    for share in &summary.species {
        table.push(vec![
            share.species.clone(),
            share.count.to_string(),
            fmt_pct(share.percentage),
        ]);
    }
    println!("{}", table.render());
    println!("\nTotal organisms: {}", summary.total);

    emit(&summary, output)
}

pub fn compare(before: &Path, after: &Path, output: Option<&Path>) -> Result<()> {
    let a = summarize_population(&load_snapshot(before)?.records);
    let b = summarize_population(&load_snapshot(after)?.records);
    let comparison = compare_populations(&a, &b);

    let mut table = Table::new(&["Species", "Before", "After", "Change", "% Change", "Status"]);
    for change in &comparison.changes {
        table.push(vec![
            change.species.clone(),
            change.before.to_string(),
            change.after.to_string(),
            format!("{:+}", change.change),
            change
                .percent_change
                .map(|p| format!("{p:+.1}%"))
                .unwrap_or_else(|| "new".to_string()),
            format!("{:?}", change.trend).to_uppercase(),
        ]);
    }
    println!("{}", table.render());
    println!(
        "\nTotal: {} -> {} ({:+})",
        comparison.before_total,
        comparison.after_total,
        comparison.after_total as i64 - comparison.before_total as i64
    );

    emit(&comparison, output)
}

pub fn combat(path: &Path, options: &CombatOptions, output: Option<&Path>) -> Result<()> {
    let snapshot = load_snapshot(path)?;
    let Some(report) = analyze_combat(&snapshot.records, options) else {
        bail!("No organisms to analyze");
    };

    let s = &report.summary;
    println!("Organisms: {}", s.total_organisms);
    println!("Combat participation: {}", fmt_pct(s.participation_rate));
    println!("Kill rate: {}", fmt_pct(s.kill_rate));
    println!("Maturity rate: {}", fmt_pct(s.maturity_rate));

    let label = if report.size_relative { "Size-adjusted" } else { "Absolute" };
    println!("\nTop damage dealers ({label})");
    let mut table = Table::new(&["File", "Tag", "Size", "Damage", "Kills", "Fitness"]);
    for p in &report.top_damage_dealers {
        table.push(vec![
            p.file.clone(),
            p.tag.clone(),
            fmt_num(p.size),
            fmt_num(p.size_adjusted_damage),
            fmt_num(p.kills),
            fmt_num(p.combat_fitness),
        ]);
    }
    println!("{}", table.render());

    emit(&report, output)
}

pub fn neural(path: &Path, output: Option<&Path>) -> Result<()> {
    let snapshot = load_snapshot(path)?;
    let species = analyze_neural(&snapshot.records);

    let mut table = Table::new(&["Species", "Tag", "Count", "Generations", "Nodes", "Synapses", "Complexity"]);
    for s in &species {
        let generations = s
            .generations
            .map(|[lo, hi]| format!("{}-{}", fmt_num(lo), fmt_num(hi)))
            .unwrap_or_default();
        table.push(vec![
            s.species_id.clone(),
            s.tag.clone(),
            s.organisms.to_string(),
            generations,
            format!("{:.1} ± {:.1}", s.nodes.mean, s.nodes.std),
            format!("{:.1} ± {:.1}", s.synapses.mean, s.synapses.std),
            format!("{:.2} ± {:.2}", s.complexity.mean, s.complexity.std),
        ]);
    }
    println!("{}", table.render());

    emit(&species, output)
}
