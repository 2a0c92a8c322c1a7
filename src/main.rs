//! Label Inspector - printed label verification
//!
//! Checks that a product label shows what the reference database says it must:
//! detected regions are read, normalized and compared field by field.

mod config;
mod inspection;
mod reference;
mod storage;
mod vision;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::config::AppConfig;
use crate::inspection::{annotate, InspectionReport, Inspector, LabelSelection, Status};
use crate::storage::SqliteReferenceStore;
use crate::vision::{FragmentReplay, RawDetection};

/// Label Inspector - verify printed labels against reference data
#[derive(Parser, Debug)]
#[command(name = "label-inspector")]
#[command(about = "Verify printed product labels against a reference database")]
struct Args {
    /// Configuration file (defaults to config.toml in the config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Inspect one label image
    Verify {
        /// Label image
        #[arg(long)]
        image: PathBuf,
        /// Detector output: JSON array of {class, box, confidence}
        #[arg(long)]
        detections: PathBuf,
        /// Recorded whole-image OCR: JSON array of {text, polygon | box}
        #[arg(long)]
        ocr: PathBuf,
        /// Label type; overrides the configured default
        #[arg(long, value_enum)]
        label_type: Option<LabelSelection>,
        /// Reference database; overrides the configured path
        #[arg(long)]
        db: Option<PathBuf>,
        /// Write an annotated copy of the image here
        #[arg(long)]
        annotate: Option<PathBuf>,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Validate and print the active field mapping table
    Fields {
        /// Print the table as TOML, in the format accepted by `fields.mapping`
        #[arg(long)]
        toml: bool,
    },
    /// Write the active configuration to a file
    InitConfig {
        /// Destination (defaults to config.toml in the config directory)
        #[arg(long)]
        output: Option<PathBuf>,
        /// Replace an existing file
        #[arg(long)]
        force: bool,
    },
    /// Create the reference schema, optionally importing seed rows
    InitDb {
        /// Reference database; overrides the configured path
        #[arg(long)]
        db: Option<PathBuf>,
        /// JSON seed file: {"inside": [...], "outside": [...]}
        #[arg(long)]
        seed: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    let args = Args::parse();

    let (config, config_path) = match load_or_default_config(args.config.as_deref()) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::from(2);
        }
    };

    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    match config_path {
        Some(path) => info!("Loaded configuration from {:?}", path),
        None => info!("Using default configuration"),
    }

    match run(args.command, &config) {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(2)
        }
    }
}

/// Load configuration from the given file, the default location, or fall back to defaults
fn load_or_default_config(explicit: Option<&Path>) -> Result<(AppConfig, Option<PathBuf>)> {
    if let Some(path) = explicit {
        return Ok((config::load_config(path)?, Some(path.to_path_buf())));
    }

    if let Ok(config_dir) = storage::get_config_dir() {
        let config_path = config_dir.join("config.toml");
        if config_path.exists() {
            return Ok((config::load_config(&config_path)?, Some(config_path)));
        }
    }

    Ok((AppConfig::default(), None))
}

fn database_path(override_path: Option<PathBuf>, config: &AppConfig) -> Result<PathBuf> {
    match override_path.or_else(|| config.store.database.clone()) {
        Some(path) => Ok(path),
        None => storage::default_database_path(),
    }
}

fn run(command: Command, config: &AppConfig) -> Result<ExitCode> {
    match command {
        Command::Verify {
            image: image_path,
            detections,
            ocr,
            label_type,
            db,
            annotate: annotate_path,
            json,
        } => {
            let source = image::open(&image_path)
                .with_context(|| format!("Failed to open image: {:?}", image_path))?
                .to_rgb8();
            let detections = load_detections(&detections)?;
            let engine = FragmentReplay::from_file(&ocr)?;
            let store = SqliteReferenceStore::new(database_path(db, config)?);
            let fields = config.fields.load_table()?;

            let inspector = Inspector::new(
                Box::new(engine),
                Box::new(store),
                fields,
                config.inspection.frame_markers.clone(),
            );
            let selection = label_type.unwrap_or(config.inspection.default_label_type);
            let report = inspector.inspect(&source, &detections, selection);

            if let Some(path) = annotate_path {
                annotate(&source, &report)
                    .save(&path)
                    .with_context(|| format!("Failed to write annotated image: {:?}", path))?;
                info!("Annotated image written to {:?}", path);
            }

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&report);
            }

            Ok(exit_code(report.outcome.status))
        }
        Command::Fields { toml } => {
            let table = config.fields.load_table()?;
            if toml {
                print!("{}", table.to_toml()?);
                return Ok(ExitCode::SUCCESS);
            }

            println!("{:<18} {:<26} {:<8} {}", "COLUMN", "DETECTOR CLASS", "LABELS", "CHECK");
            for entry in table.entries() {
                let check = if table.is_logo_class(&entry.detector_class) {
                    "presence"
                } else {
                    "text"
                };
                println!(
                    "{:<18} {:<26} {:<8} {}",
                    entry.column.as_str(),
                    entry.detector_class,
                    format!("{:?}", entry.applies_to).to_lowercase(),
                    check
                );
            }
            let logos = table.logo_classes();
            if !logos.is_empty() {
                println!("\nLogo classes: {}", logos.join(", "));
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::InitConfig { output, force } => {
            let path = match output {
                Some(path) => path,
                None => storage::get_config_dir()?.join("config.toml"),
            };
            if path.exists() && !force {
                anyhow::bail!("Config already exists: {:?} (use --force to replace it)", path);
            }
            config::save_config(config, &path)?;
            println!("Configuration written to {:?}", path);
            Ok(ExitCode::SUCCESS)
        }
        Command::InitDb { db, seed } => {
            let store = SqliteReferenceStore::new(database_path(db, config)?);
            store.init_schema()?;
            if let Some(seed) = seed {
                let rows = store.import_seed(&seed)?;
                println!("Imported {} reference rows into {:?}", rows, store.path());
            } else {
                println!("Reference schema ready in {:?}", store.path());
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn load_detections(path: &Path) -> Result<Vec<RawDetection>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read detections: {:?}", path))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse detections: {:?}", path))
}

fn exit_code(status: Status) -> ExitCode {
    match status {
        Status::Ok => ExitCode::SUCCESS,
        Status::Defect => ExitCode::from(1),
        Status::Error => ExitCode::from(2),
    }
}

fn print_report(report: &InspectionReport) {
    let outcome = &report.outcome;
    println!("Request:    {}", report.request_id);
    println!("Label type: {}", report.label_type);
    println!("Status:     {}", outcome.status);

    if !outcome.matched.is_empty() {
        println!("\nMatched ({}):", outcome.matched.len());
        for item in &outcome.matched {
            println!(
                "  {:<26} reference={:?} recognized={:?}",
                item.field, item.reference_value, item.recognized_value
            );
        }
    }

    if !outcome.defects.is_empty() {
        println!("\nDefects ({}):", outcome.defects.len());
        for item in &outcome.defects {
            println!(
                "  {:<26} {:<22} reference={:?} recognized={:?}",
                item.field,
                item.reason.to_string(),
                item.reference_value,
                item.recognized_value
            );
        }
    }
}
