mod commands;
mod render;

use analysis::{AnalysisConfig, CombatOptions};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use commands::{ArchiveArgs, SnapshotArgs};
use render::OutputFormat;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(
    name = "bibites",
    version,
    about = "Extract and analyze Bibites save files"
)]
struct Cli {
    /// JSON config file; flags below override its fields
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding save archives
    #[arg(long, global = true, env = "BIBITES_SAVES_DIR")]
    saves_dir: Option<PathBuf>,

    /// Directory extracted snapshots are written to
    #[arg(long, global = true, env = "BIBITES_DATA_DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List save archives
    Saves {
        #[arg(long)]
        json: bool,
    },
    /// Unpack a save into the data directory
    ExtractSave {
        /// Save name or part of it; the newest autosave when omitted
        pattern: Option<String>,
        /// Output directory instead of <data-dir>/<save name>
        #[arg(short, long)]
        out: Option<PathBuf>,
        /// Extract again even if already extracted
        #[arg(long)]
        force: bool,
    },
    /// Extract dotted fields from every organism
    Fields {
        #[command(flatten)]
        snapshot: SnapshotArgs,
        /// Dotted field path, e.g. genes.tag; repeatable
        #[arg(short, long = "field", required = true)]
        fields: Vec<String>,
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },
    /// Check organism files for required sections
    Validate {
        #[command(flatten)]
        snapshot: SnapshotArgs,
    },
    /// Show the metadata files and zone configuration of a save
    Zones {
        #[command(flatten)]
        snapshot: SnapshotArgs,
        #[command(flatten)]
        archive: ArchiveArgs,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Population distribution across habitat zones
    Spatial {
        #[command(flatten)]
        snapshot: SnapshotArgs,
        #[command(flatten)]
        archive: ArchiveArgs,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Species counts
    Population {
        #[command(flatten)]
        snapshot: SnapshotArgs,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Species changes between two snapshots
    Compare {
        before: PathBuf,
        after: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Combat effectiveness rankings
    Combat {
        #[command(flatten)]
        snapshot: SnapshotArgs,
        /// Rank by raw damage and kills instead of per unit of size
        #[arg(long)]
        absolute: bool,
        /// Only organisms with this tag
        #[arg(long)]
        lineage: Option<String>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Neural network size per species
    Neural {
        #[command(flatten)]
        snapshot: SnapshotArgs,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

impl Cli {
    fn load_config(&self) -> Result<AnalysisConfig> {
        let mut config = match &self.config {
            Some(path) => AnalysisConfig::load(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => AnalysisConfig::default(),
        };
        if let Some(dir) = &self.saves_dir {
            config.saves_dir = dir.clone();
        }
        if let Some(dir) = &self.data_dir {
            config.data_dir = dir.clone();
        }
        Ok(config)
    }
}

fn main() -> Result<()> {
    // Logs go to stderr so reports on stdout stay pipeable
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bibites=info,analysis=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = cli.load_config()?;

    match cli.command {
        Command::Saves { json } => commands::saves(&config, json),
        Command::ExtractSave {
            pattern,
            out,
            force,
        } => commands::extract(&config, pattern.as_deref(), out, force),
        Command::Fields {
            snapshot,
            fields,
            format,
        } => {
            let path = commands::snapshot_path(&snapshot, &config)?;
            commands::fields(&path, &fields, format)
        }
        Command::Validate { snapshot } => {
            let path = commands::snapshot_path(&snapshot, &config)?;
            commands::validate(&path)
        }
        Command::Zones {
            snapshot,
            archive,
            output,
        } => {
            let path = commands::snapshot_path(&snapshot, &config)?;
            commands::zones(&config, &path, &archive, output.as_deref())
        }
        Command::Spatial {
            snapshot,
            archive,
            output,
        } => {
            let path = commands::snapshot_path(&snapshot, &config)?;
            commands::spatial(&config, &path, &archive, output.as_deref())
        }
        Command::Population { snapshot, output } => {
            let path = commands::snapshot_path(&snapshot, &config)?;
            commands::population(&path, output.as_deref())
        }
        Command::Compare {
            before,
            after,
            output,
        } => commands::compare(&before, &after, output.as_deref()),
        Command::Combat {
            snapshot,
            absolute,
            lineage,
            output,
        } => {
            let path = commands::snapshot_path(&snapshot, &config)?;
            let options = CombatOptions {
                size_relative: !absolute,
                lineage,
            };
            commands::combat(&path, &options, output.as_deref())
        }
        Command::Neural { snapshot, output } => {
            let path = commands::snapshot_path(&snapshot, &config)?;
            commands::neural(&path, output.as_deref())
        }
    }
}
