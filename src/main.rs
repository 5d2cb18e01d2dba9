#![forbid(unsafe_code)]

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, Level as TraceLevel};
use tracing_subscriber::FmtSubscriber;

use jobgauge_adjust::catalog::{Catalog, JobCatalogEntry};
use jobgauge_adjust::config::{persistent, SettingsStore};
use jobgauge_adjust::constants::validation;
use jobgauge_adjust::localization::{Language, Localizer};
use jobgauge_adjust::scenario::Scenario;
use jobgauge_adjust::types::JobId;

#[derive(Parser, Debug)]
#[command(name = "jobgauge-adjust", version, about = "Reposition, rotate and hide job gauge pieces")]
struct Cli {
    /// Settings file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Catalog JSON to use instead of the built-in one
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    /// Directory holding `<lang>/strings.json`
    #[arg(long, global = true)]
    strings: Option<PathBuf>,

    #[arg(long, global = true, default_value = "en")]
    language: Language,

    /// Overrides LOG_LEVEL (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List jobs and their adjustable gauge pieces
    Catalog {
        #[arg(long)]
        job: Option<JobId>,
    },
    /// Print stored settings
    Show {
        #[arg(long)]
        job: Option<JobId>,
    },
    Enable { job: JobId },
    Disable { job: JobId },
    /// Edit one gauge piece
    Set {
        job: JobId,
        key: String,
        #[arg(long, allow_hyphen_values = true)]
        offset_x: Option<i32>,
        #[arg(long, allow_hyphen_values = true)]
        offset_y: Option<i32>,
        /// Degrees, -180..=180
        #[arg(long, allow_hyphen_values = true)]
        rotation: Option<i32>,
        #[arg(long)]
        hide: Option<bool>,
        #[arg(long)]
        left_align: Option<bool>,
    },
    /// Clear offsets and visibility of one gauge piece
    Reset { job: JobId, key: String },
    /// Replay a scenario script against the simulated host
    Simulate { script: PathBuf },
    /// Write every display string as a strings template
    Strings { out: PathBuf },
}

/// Requested edit of one element
#[derive(Debug, Default)]
struct ElementEdit {
    offset_x: Option<i32>,
    offset_y: Option<i32>,
    rotation: Option<i32>,
    hide: Option<bool>,
    left_align: Option<bool>,
}

fn init_logging(level: Option<&str>) -> Result<()> {
    let level = level
        .map(str::to_string)
        .or_else(|| std::env::var("LOG_LEVEL").ok())
        .unwrap_or_else(|| "info".to_string())
        .to_lowercase();
    let log_level = match level.as_str() {
        "trace" => TraceLevel::TRACE,
        "debug" => TraceLevel::DEBUG,
        "warn" => TraceLevel::WARN,
        "error" => TraceLevel::ERROR,
        _ => TraceLevel::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

fn load_catalog(path: Option<&Path>) -> Result<Catalog> {
    match path {
        Some(path) => Catalog::load(path),
        None => Catalog::builtin(),
    }
}

fn load_localizer(dir: Option<&Path>, language: Language) -> Result<Localizer> {
    match dir {
        Some(dir) => Localizer::load(dir, language),
        None => Ok(Localizer::new(language)),
    }
}

fn catalog_job(catalog: &Catalog, job: JobId) -> Result<&JobCatalogEntry> {
    catalog
        .job(job)
        .with_context(|| format!("Job {} is not in the catalog", job))
}

/// Localize every job and element name, in display order
fn describe_catalog(catalog: &Catalog, localizer: &mut Localizer, only: Option<JobId>) -> Vec<String> {
    let mut lines = Vec::new();
    for entry in catalog.jobs_by_name() {
        if only.is_some_and(|job| job != entry.id) {
            continue;
        }
        let name = localizer.localize(&format!("Job.{}", entry.id), &entry.name, None);
        if entry.coming_soon {
            lines.push(format!("{:>3}  {} (coming soon)", entry.id, name));
            continue;
        }
        lines.push(format!("{:>3}  {}", entry.id, name));
        for panel in &entry.panels {
            lines.push(format!("       {}", panel.name));
            for descriptor in &panel.elements {
                let display = localizer.localize(
                    &format!("Element.{}.{}", entry.id, descriptor.key),
                    &descriptor.display_name,
                    None,
                );
                let mut flags = Vec::new();
                if descriptor.can_rotate {
                    flags.push("rotate");
                }
                if descriptor.can_left_align {
                    flags.push("left-align");
                }
                lines.push(format!(
                    "         {:<16} {:<28} ids={:?} [{}]",
                    descriptor.key,
                    display,
                    descriptor.element_ids,
                    flags.join(", ")
                ));
            }
        }
    }
    lines
}

fn show_settings(store: &SettingsStore, catalog: &Catalog, only: Option<JobId>) {
    for (job, settings) in &store.jobs {
        if only.is_some_and(|wanted| wanted != *job) {
            continue;
        }
        let name = catalog.job(*job).map_or("unknown", |entry| entry.name.as_str());
        println!("{:>3}  {} enabled={}", job, name, settings.enabled);
        for (key, component) in &settings.components {
            if component.is_default() && only.is_none() {
                continue;
            }
            println!(
                "       {:<16} offset=({}, {}) rotation={} hide={} left_align={}",
                key, component.offset_x, component.offset_y, component.rotation, component.hide, component.left_align
            );
        }
    }
}

/// Apply an edit after checking it against what the element supports
fn apply_edit(store: &mut SettingsStore, catalog: &Catalog, job: JobId, key: &str, edit: ElementEdit) -> Result<()> {
    let entry = catalog_job(catalog, job)?;
    let descriptor = entry
        .descriptor(key)
        .with_context(|| format!("Job {} has no gauge piece '{}'", entry.name, key))?;

    if let Some(rotation) = edit.rotation {
        if !descriptor.can_rotate {
            bail!("'{}' cannot be rotated", key);
        }
        if !(validation::MIN_ROTATION..=validation::MAX_ROTATION).contains(&rotation) {
            bail!(
                "Rotation {} is outside {}..={}",
                rotation,
                validation::MIN_ROTATION,
                validation::MAX_ROTATION
            );
        }
    }
    for offset in [edit.offset_x, edit.offset_y].into_iter().flatten() {
        if offset.unsigned_abs() > validation::MAX_OFFSET.unsigned_abs() {
            bail!(
                "Offset {} is outside -{}..={}",
                offset,
                validation::MAX_OFFSET,
                validation::MAX_OFFSET
            );
        }
    }
    if edit.left_align == Some(true) && !descriptor.can_left_align {
        bail!("'{}' cannot be left-aligned", key);
    }

    let component = store.job_or_default(job).component_or_default(key);
    if let Some(offset_x) = edit.offset_x {
        component.offset_x = offset_x;
    }
    if let Some(offset_y) = edit.offset_y {
        component.offset_y = offset_y;
    }
    if let Some(rotation) = edit.rotation {
        component.rotation = rotation;
    }
    if let Some(hide) = edit.hide {
        component.hide = hide;
    }
    if let Some(left_align) = edit.left_align {
        component.left_align = left_align;
    }
    info!(job = job, key = %key, settings = ?component, "Updated gauge piece");
    Ok(())
}

fn set_enabled(catalog: &Catalog, config_path: &Path, job: JobId, enabled: bool) -> Result<()> {
    let entry = catalog_job(catalog, job)?;
    if entry.coming_soon && enabled {
        bail!("{} has no adjustable gauge yet", entry.name);
    }
    let mut store = persistent::load(config_path)?;
    store.ensure_catalog_entries(catalog);
    store.job_or_default(job).enabled = enabled;
    persistent::save(&store, config_path)?;
    info!(job = job, name = %entry.name, enabled = enabled, "Saved job state");
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level.as_deref())?;

    let catalog = load_catalog(cli.catalog.as_deref())?;
    let config_path = cli.config.clone().unwrap_or_else(persistent::default_path);

    match cli.command {
        Command::Catalog { job } => {
            let mut localizer = load_localizer(cli.strings.as_deref(), cli.language)?;
            if let Some(job) = job {
                catalog_job(&catalog, job)?;
            }
            for line in describe_catalog(&catalog, &mut localizer, job) {
                println!("{}", line);
            }
        }
        Command::Show { job } => {
            let mut store = persistent::load(&config_path)?;
            store.ensure_catalog_entries(&catalog);
            show_settings(&store, &catalog, job);
        }
        Command::Enable { job } => set_enabled(&catalog, &config_path, job, true)?,
        Command::Disable { job } => set_enabled(&catalog, &config_path, job, false)?,
        Command::Set {
            job,
            key,
            offset_x,
            offset_y,
            rotation,
            hide,
            left_align,
        } => {
            let mut store = persistent::load(&config_path)?;
            store.ensure_catalog_entries(&catalog);
            let edit = ElementEdit {
                offset_x,
                offset_y,
                rotation,
                hide,
                left_align,
            };
            apply_edit(&mut store, &catalog, job, &key, edit)?;
            persistent::save(&store, &config_path)?;
        }
        Command::Reset { job, key } => {
            let entry = catalog_job(&catalog, job)?;
            if entry.descriptor(&key).is_none() {
                bail!("Job {} has no gauge piece '{}'", entry.name, key);
            }
            let mut store = persistent::load(&config_path)?;
            store.job_or_default(job).component_or_default(&key).reset_placement();
            persistent::save(&store, &config_path)?;
            info!(job = job, key = %key, "Reset gauge piece");
        }
        Command::Simulate { script } => {
            let scenario = Scenario::load(&script)?;
            let report = scenario.run(&catalog)?;
            print!("{}", report);
        }
        Command::Strings { out } => {
            let mut localizer = load_localizer(cli.strings.as_deref(), cli.language)?;
            describe_catalog(&catalog, &mut localizer, None);
            localizer.export(&out)?;
        }
    }

    Ok(())
}
