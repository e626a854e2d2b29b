//! Inkwell - a versioned diary that syncs through a shared folder
//!
//! ## Usage
//!
//! ```bash
//! # Start an entry (saved as an editable draft)
//! inkwell new --title "Harbour walk" --content "Fog until noon"
//!
//! # Change it, freeze it, and record it as a version
//! inkwell edit 3f2a --content "Fog until noon, then sun"
//! inkwell seal 3f2a
//! inkwell commit 3f2a
//!
//! # Read
//! inkwell list
//! inkwell show 3f2a
//! inkwell history 3f2a
//!
//! # Exchange versions with your other devices
//! inkwell --shared-dir ~/Dropbox/inkwell sync
//! ```
//!
//! Entry ids can be abbreviated to any unambiguous prefix, or to the short
//! form shown by `list`.

mod display;
mod remote;
mod resolve;

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::{Instrument, debug, info_span};

use inkwell_core::{DiaryId, EntryFields, Location, Rejection, SaveOutcome, Weather};
use inkwell_logging::{DeviceContextGuard, InkwellSubscriberBuilder, LogConfig};
use inkwell_sync::{Journal, JournalConfig};

use display::*;
use resolve::resolve_diary_id;

/// Inkwell - a versioned diary that syncs through a shared folder
#[derive(Parser)]
#[command(name = "inkwell")]
#[command(about = "Versioned diary with multi-device sync")]
#[command(version)]
struct Cli {
    /// Data directory (defaults to the platform data dir)
    #[arg(long, global = true, env = "INKWELL_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Shared folder to sync through, overriding inkwell.toml
    #[arg(long, global = true, env = "INKWELL_SHARED_DIR")]
    shared_dir: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// More log output (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a new entry as a draft
    New {
        #[command(flatten)]
        fields: FieldArgs,
        /// Seal the draft right away
        #[arg(long)]
        seal: bool,
    },
    /// Edit an entry's draft, starting one from the current version if needed
    Edit {
        /// Entry ID (full or partial)
        id: String,
        #[command(flatten)]
        fields: FieldArgs,
    },
    /// Freeze a draft so it can be committed
    Seal {
        /// Entry ID (full or partial)
        id: String,
    },
    /// Record sealed drafts as new versions
    Commit {
        /// Entry ID (full or partial)
        #[arg(required_unless_present = "all", conflicts_with = "all")]
        id: Option<String>,
        /// Commit every sealed draft
        #[arg(long)]
        all: bool,
    },
    /// Show an entry, or its draft if it has one
    Show {
        /// Entry ID (full or partial)
        id: String,
    },
    /// List live entries, newest date first
    List,
    /// List drafts
    Drafts,
    /// Show every version of an entry
    History {
        /// Entry ID (full or partial)
        id: String,
    },
    /// Delete an entry (its history is kept)
    Delete {
        /// Entry ID (full or partial)
        id: String,
    },
    /// Commit sealed drafts, upload this device's stream, merge peers
    Sync,
    /// Show this device's identity and storage location
    Whoami,
    /// Start a fresh stream under a new device identity
    ResetDevice,
    /// Rebuild the current-version index from the version log
    Repair,
    /// Print the effective configuration
    Config,
}

/// Field values given on the command line
#[derive(Args, Default)]
struct FieldArgs {
    /// Entry title
    #[arg(short, long)]
    title: Option<String>,
    /// Entry body
    #[arg(short, long)]
    content: Option<String>,
    /// Entry date (YYYY-MM-DD)
    #[arg(short, long)]
    date: Option<NaiveDate>,
    /// Latitude, with --lon
    #[arg(long, requires = "lon", allow_hyphen_values = true)]
    lat: Option<f64>,
    /// Longitude, with --lat
    #[arg(long, requires = "lat", allow_hyphen_values = true)]
    lon: Option<f64>,
    /// Place name, with --lat and --lon
    #[arg(long, requires = "lat")]
    place: Option<String>,
    /// Weather condition, e.g. "Light rain"
    #[arg(long)]
    weather: Option<String>,
    /// Temperature in degrees Celsius, with --weather
    #[arg(long, requires = "weather", allow_hyphen_values = true)]
    temp: Option<f64>,
}

impl FieldArgs {
    /// Overwrite the given fields of `fields`
    fn apply(self, mut fields: EntryFields) -> EntryFields {
        if let Some(title) = self.title {
            fields.title = title;
        }
        if let Some(content) = self.content {
            fields.content = content;
        }
        if let Some(date) = self.date {
            fields.date = date;
        }
        if let (Some(lat), Some(lon)) = (self.lat, self.lon) {
            let mut location = Location::new(lat, lon);
            if let Some(place) = self.place {
                location = location.with_place_name(place);
            }
            fields.location = Some(location);
        }
        if let Some(condition) = self.weather {
            let mut weather = Weather::new(condition);
            if let Some(celsius) = self.temp {
                weather = weather.with_temperature(celsius);
            }
            fields.weather = Some(weather);
        }
        fields
    }

    fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.content.is_none()
            && self.date.is_none()
            && self.lat.is_none()
            && self.weather.is_none()
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

/// Console filter: the configured one unless -v was given
fn log_level(verbose: u8, configured: &str) -> String {
    match verbose {
        0 => configured.to_string(),
        1 => "info".to_string(),
        _ => "debug".to_string(),
    }
}

fn load_config(cli: &Cli) -> Result<JournalConfig> {
    let data_dir = cli
        .data_dir
        .clone()
        .unwrap_or_else(JournalConfig::default_data_dir);
    let mut config = JournalConfig::load_or_default(data_dir)?;
    if let Some(shared_dir) = &cli.shared_dir {
        config.shared_dir = Some(shared_dir.clone());
    }
    Ok(config)
}

async fn open_journal(config: JournalConfig) -> Result<Journal> {
    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("creating {}", config.data_dir.display()))?;
    let object_store = remote::object_store_for(&config).await?;
    Journal::open(config, object_store).context("opening journal")
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;

    let log_config = LogConfig::cli(log_level(cli.verbose, &config.log_filter), &config.data_dir);
    let _log_guard = InkwellSubscriberBuilder::new()
        .with_config(log_config)
        .init();
    debug!(data_dir = %config.data_dir.display(), "Loaded configuration");

    if let Commands::Config = cli.command {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    let journal = open_journal(config).await?;
    let _device = DeviceContextGuard::new(&journal.stream_id());
    let span = info_span!("device", stream = %journal.stream_id().short());

    let out = Output { json: cli.json };
    dispatch(&journal, &out, cli.command).instrument(span).await
}

async fn dispatch(journal: &Journal, out: &Output, command: Commands) -> Result<()> {
    match command {
        Commands::New { fields, seal } => cmd_new(journal, out, fields, seal),
        Commands::Edit { id, fields } => cmd_edit(journal, out, &id, fields),
        Commands::Seal { id } => cmd_seal(journal, out, &id),
        Commands::Commit { id, all } => cmd_commit(journal, out, id.as_deref(), all),
        Commands::Show { id } => cmd_show(journal, out, &id),
        Commands::List => cmd_list(journal, out),
        Commands::Drafts => cmd_drafts(journal, out),
        Commands::History { id } => cmd_history(journal, out, &id),
        Commands::Delete { id } => cmd_delete(journal, out, &id),
        Commands::Sync => cmd_sync(journal, out).await,
        Commands::Whoami => cmd_whoami(journal, out),
        Commands::ResetDevice => cmd_reset_device(journal, out),
        Commands::Repair => cmd_repair(journal, out),
        Commands::Config => Ok(()),
    }
}

/// Switches between colored text and JSON on stdout
struct Output {
    json: bool,
}

impl Output {
    /// Print `value` as JSON, or run `human` otherwise
    fn emit<T: Serialize>(&self, value: &T, human: impl FnOnce()) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            human();
        }
        Ok(())
    }
}

/// Entries that have a draft or a live version
fn live_or_draft_ids(journal: &Journal) -> Result<Vec<DiaryId>> {
    let mut ids: Vec<DiaryId> = journal.get_diaries()?.iter().map(|v| v.diary_id).collect();
    ids.extend(journal.list_drafts()?.iter().map(|d| d.diary_id));
    Ok(ids)
}

fn resolve(journal: &Journal, query: &str) -> Result<DiaryId> {
    Ok(resolve_diary_id(query, live_or_draft_ids(journal)?)?)
}

fn rejection_message(rejection: Rejection) -> &'static str {
    match rejection {
        Rejection::AlreadySealed => "draft is sealed and can no longer be edited, commit it first",
        Rejection::NotFound => "entry has no draft",
        Rejection::NotSealed => "draft is not sealed, seal it first",
    }
}

#[derive(Serialize)]
struct SavedJson {
    diary_id: DiaryId,
    sealed: bool,
}

fn save(journal: &Journal, diary_id: Option<DiaryId>, fields: EntryFields) -> Result<DiaryId> {
    match journal.save_draft(diary_id, fields)? {
        SaveOutcome::Saved(saved) => Ok(saved.diary_id),
        SaveOutcome::Rejected(rejection) => bail!(rejection_message(rejection)),
    }
}

fn cmd_new(journal: &Journal, out: &Output, fields: FieldArgs, seal: bool) -> Result<()> {
    let diary_id = save(journal, None, fields.apply(EntryFields::today()))?;
    let sealed = seal && journal.seal_draft(&diary_id)?.is_some();

    out.emit(&SavedJson { diary_id, sealed }, || {
        print_success(&format!("Created entry {}", diary_id.short()));
        if sealed {
            print_info("Draft sealed, run 'inkwell commit' or 'inkwell sync' to record it");
        }
    })
}

fn cmd_edit(journal: &Journal, out: &Output, query: &str, fields: FieldArgs) -> Result<()> {
    let diary_id = resolve(journal, query)?;
    if fields.is_empty() {
        bail!("nothing to change, pass at least one of --title, --content, --date, --lat/--lon, --weather");
    }

    let base = match journal.get_draft(&diary_id)? {
        Some(draft) if draft.is_sealed() => bail!(rejection_message(Rejection::AlreadySealed)),
        Some(draft) => draft.fields,
        None => match journal.get_diary(&diary_id)? {
            Some(version) => version.fields,
            None => bail!("entry {} not found", diary_id.short()),
        },
    };

    save(journal, Some(diary_id), fields.apply(base))?;
    out.emit(
        &SavedJson {
            diary_id,
            sealed: false,
        },
        || print_success(&format!("Saved draft of {}", diary_id.short())),
    )
}

fn cmd_seal(journal: &Journal, out: &Output, query: &str) -> Result<()> {
    let diary_id = resolve(journal, query)?;
    let Some(seal) = journal.seal_draft(&diary_id)? else {
        bail!("entry {} has no draft to seal", diary_id.short());
    };

    out.emit(&seal, || {
        print_success(&format!(
            "Sealed {}, it will commit as version {}",
            diary_id.short(),
            seal.pending_version_id.short()
        ))
    })
}

#[derive(Serialize)]
struct CommitJson {
    committed: usize,
    failed: usize,
}

fn cmd_commit(journal: &Journal, out: &Output, query: Option<&str>, all: bool) -> Result<()> {
    let report = match query {
        Some(query) if !all => {
            let diary_id = resolve(journal, query)?;
            if !journal.commit_sealed_draft(&diary_id)? {
                bail!(
                    "entry {} has no sealed draft, seal it first",
                    diary_id.short()
                );
            }
            CommitJson {
                committed: 1,
                failed: 0,
            }
        }
        _ => {
            let summary = journal.commit_all_sealed_drafts()?;
            CommitJson {
                committed: summary.committed,
                failed: summary.failed,
            }
        }
    };

    out.emit(&report, || {
        print_success(&format!("Committed {} drafts", report.committed));
        if report.failed > 0 {
            print_warning(&format!(
                "{} drafts failed to commit and stay sealed",
                report.failed
            ));
        }
    })
}

fn cmd_show(journal: &Journal, out: &Output, query: &str) -> Result<()> {
    let diary_id = resolve(journal, query)?;

    if let Some(draft) = journal.get_draft(&diary_id)? {
        return out.emit(&draft, || print_draft(&draft));
    }
    match journal.get_diary(&diary_id)? {
        Some(version) => out.emit(&version, || print_version(&version)),
        None => bail!("entry {} not found", diary_id.short()),
    }
}

fn cmd_list(journal: &Journal, out: &Output) -> Result<()> {
    let diaries = journal.get_diaries()?;
    out.emit(&diaries, || print_entry_list(&diaries))
}

fn cmd_drafts(journal: &Journal, out: &Output) -> Result<()> {
    let drafts = journal.list_drafts()?;
    out.emit(&drafts, || print_draft_list(&drafts))
}

fn cmd_history(journal: &Journal, out: &Output, query: &str) -> Result<()> {
    // Deleted entries still have history
    let mut ids = live_or_draft_ids(journal)?;
    ids.extend(journal.store().local_log().all()?.iter().map(|v| v.diary_id));
    let diary_id = resolve_diary_id(query, ids)?;

    let history = journal.history(&diary_id)?;
    out.emit(&history, || print_history(&history))
}

#[derive(Serialize)]
struct DeletedJson {
    diary_id: DiaryId,
    deleted: bool,
}

fn cmd_delete(journal: &Journal, out: &Output, query: &str) -> Result<()> {
    let diary_id = resolve(journal, query)?;
    let deleted = journal.delete_diary(&diary_id)?;

    out.emit(&DeletedJson { diary_id, deleted }, || {
        if deleted {
            print_success(&format!("Deleted {}", diary_id.short()));
        } else {
            print_info(&format!(
                "{} had no committed version, its draft was discarded",
                diary_id.short()
            ));
        }
    })
}

async fn cmd_sync(journal: &Journal, out: &Output) -> Result<()> {
    if journal.config().shared_dir.is_none() {
        bail!("no shared folder configured, pass --shared-dir or set shared_dir in inkwell.toml");
    }

    match journal.sync_with_cloud().await? {
        Some(report) => out.emit(&report, || print_sync_report(&report)),
        None => {
            print_info("Another sync is already running");
            Ok(())
        }
    }
}

#[derive(Serialize)]
struct WhoamiJson {
    stream_id: String,
    data_dir: PathBuf,
    shared_dir: Option<PathBuf>,
    versions: usize,
}

fn cmd_whoami(journal: &Journal, out: &Output) -> Result<()> {
    let config = journal.config();
    let info = WhoamiJson {
        stream_id: journal.stream_id().to_string(),
        data_dir: config.data_dir.clone(),
        shared_dir: config.shared_dir.clone(),
        versions: journal.store().local_log().len()?,
    };

    out.emit(&info, || {
        print_info(&format!("Device stream: {}", info.stream_id));
        print_info(&format!("Data: {}", info.data_dir.display()));
        match &info.shared_dir {
            Some(dir) => print_info(&format!("Shared folder: {}", dir.display())),
            None => print_info("Shared folder: not configured"),
        }
        print_info(&format!("Versions known: {}", info.versions));
    })
}

fn cmd_reset_device(journal: &Journal, out: &Output) -> Result<()> {
    let previous = journal.stream_id();
    let stream_id = journal.reset_stream_id()?;

    out.emit(&stream_id, || {
        print_success(&format!(
            "Device stream {} replaced by {}",
            previous.short(),
            stream_id.short()
        ));
        print_info("Versions already synced stay available to every device");
    })
}

fn cmd_repair(journal: &Journal, out: &Output) -> Result<()> {
    let heads = journal.recompute_all_heads()?;
    out.emit(&heads, || {
        print_success(&format!("Rebuilt the current version of {} entries", heads))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_new_with_fields() {
        let cli = Cli::try_parse_from([
            "inkwell", "new", "-t", "Walk", "--date", "2024-03-01", "--lat", "-33.9", "--lon",
            "18.4", "--seal",
        ])
        .unwrap();

        let Commands::New { fields, seal } = cli.command else {
            panic!("expected new");
        };
        assert!(seal);
        let fields = fields.apply(EntryFields::new(NaiveDate::from_ymd_opt(2020, 1, 1).unwrap()));
        assert_eq!(fields.title, "Walk");
        assert_eq!(fields.date, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(fields.location.unwrap().latitude, -33.9);
    }

    #[test]
    fn test_commit_needs_id_or_all() {
        assert!(Cli::try_parse_from(["inkwell", "commit"]).is_err());
        assert!(Cli::try_parse_from(["inkwell", "commit", "--all"]).is_ok());
        assert!(Cli::try_parse_from(["inkwell", "commit", "abcd", "--all"]).is_err());
    }

    #[test]
    fn test_apply_keeps_unset_fields() {
        let base = EntryFields::new(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())
            .with_title("Old")
            .with_content("Body")
            .with_weather(Weather::new("Clear"));
        let args = FieldArgs {
            title: Some("New".to_string()),
            ..Default::default()
        };

        assert!(!args.is_empty());
        let fields = args.apply(base);
        assert_eq!(fields.title, "New");
        assert_eq!(fields.content, "Body");
        assert_eq!(fields.weather.unwrap().condition, "Clear");
    }

    #[test]
    fn test_log_level() {
        assert_eq!(log_level(0, "warn,inkwell_sync=info"), "warn,inkwell_sync=info");
        assert_eq!(log_level(1, "warn"), "info");
        assert_eq!(log_level(5, "warn"), "debug");
    }
}
