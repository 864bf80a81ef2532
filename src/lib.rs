pub mod config;
pub mod gateway;
pub mod models;
pub mod patch;
pub mod persist;
pub mod store;
mod utils;

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};

use config::ConfigStore;
use gateway::HttpGateway;
use models::{DraftUpdate, FieldKey, FontType, Location, Schedule};
use persist::{DraftStorage, FileStorage};
use store::DraftStore;

pub use store::{DraftError, SaveAllError};

type CliStore = DraftStore<HttpGateway, FileStorage>;

#[derive(Debug, Parser)]
#[command(name = "event-draft", version, about = "Compose and publish an event draft")]
struct Cli {
    /// Config file (defaults to the per-user data directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Draft storage file (defaults to the per-user data directory)
    #[arg(long, global = true)]
    storage: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create the remote draft for this session
    Init,
    /// Stage a local change
    #[command(subcommand)]
    Set(SetCommand),
    /// Save one field, or every dirty field
    Save {
        #[arg(value_enum)]
        field: Option<FieldArg>,
    },
    /// Publish the draft
    Publish,
    /// Show the draft and its field statuses
    Status,
    /// Discard the draft and start over
    Reset,
    /// Store the bearer token used for backend requests
    Login { token: String },
    /// Forget the stored bearer token
    Logout,
}

#[derive(Debug, Subcommand)]
enum SetCommand {
    Title { value: String },
    /// RFC 3339 start and end timestamps
    Schedule { start: String, end: String },
    ClearSchedule,
    Street { value: String },
    Lot { value: Option<String> },
    Capacity { value: Option<u32> },
    Price { value: Option<u32> },
    Playlist { value: Option<String> },
    Information { value: Option<String> },
    Font {
        #[arg(value_enum)]
        value: FontArg,
    },
    AllowExternal {
        #[arg(action = ArgAction::Set)]
        value: bool,
    },
    Cover { url: Option<String> },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FieldArg {
    Title,
    Schedule,
    Location,
    Capacity,
    Price,
    Playlist,
    Information,
}

impl From<FieldArg> for FieldKey {
    fn from(arg: FieldArg) -> Self {
        match arg {
            FieldArg::Title => FieldKey::Title,
            FieldArg::Schedule => FieldKey::Schedule,
            FieldArg::Location => FieldKey::Location,
            FieldArg::Capacity => FieldKey::Capacity,
            FieldArg::Price => FieldKey::Price,
            FieldArg::Playlist => FieldKey::Playlist,
            FieldArg::Information => FieldKey::Information,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FontArg {
    Normal,
    Library,
    Thin,
}

impl From<FontArg> for FontType {
    fn from(arg: FontArg) -> Self {
        match arg {
            FontArg::Normal => FontType::Normal,
            FontArg::Library => FontType::Library,
            FontArg::Thin => FontType::Thin,
        }
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn parse_timestamp(label: &str, value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("{label} must be an RFC 3339 timestamp, got {value:?}"))
}

fn to_update(command: SetCommand, store: &CliStore) -> Result<DraftUpdate> {
    let update = match command {
        SetCommand::Title { value } => DraftUpdate::Title(value),
        SetCommand::Schedule { start, end } => DraftUpdate::Schedule(Some(Schedule {
            start_at: parse_timestamp("start", &start)?,
            end_at: parse_timestamp("end", &end)?,
        })),
        SetCommand::ClearSchedule => DraftUpdate::Schedule(None),
        SetCommand::Street { value } => DraftUpdate::Location(Location {
            street_address: value,
            ..store.data().location
        }),
        SetCommand::Lot { value } => DraftUpdate::Location(Location {
            lot_number: value,
            ..store.data().location
        }),
        SetCommand::Capacity { value } => DraftUpdate::Capacity(value),
        SetCommand::Price { value } => DraftUpdate::Price(value),
        SetCommand::Playlist { value } => DraftUpdate::Playlist(value),
        SetCommand::Information { value } => DraftUpdate::Information(value),
        SetCommand::Font { value } => DraftUpdate::FontType(value.into()),
        SetCommand::AllowExternal { value } => DraftUpdate::AllowExternal(value),
        SetCommand::Cover { url } => DraftUpdate::CoverImageUrl(url),
    };
    Ok(update)
}

fn print_status(store: &CliStore) {
    let data = store.data();
    println!("draft:   {}", describe_draft(store));
    let title = if data.title.is_empty() { "-" } else { data.title.as_str() };
    println!("title:   {title}");
    if let Some(schedule) = data.schedule {
        println!(
            "when:    {} -> {}",
            schedule.start_at.to_rfc3339(),
            schedule.end_at.to_rfc3339()
        );
    }
    println!();
    for field in FieldKey::ALL {
        let status = store.status(field);
        match store.error(field) {
            Some(message) => println!("{:<12} {:<7} {message}", field.as_str(), status.as_str()),
            None => println!("{:<12} {}", field.as_str(), status.as_str()),
        }
    }
    if store.has_unsaved() {
        println!("\nunsaved changes pending");
    }
}

fn describe_draft(store: &CliStore) -> String {
    match (store.event_id(), store.init_error()) {
        (Some(id), _) => format!("#{id} ({:?})", store.init_status()),
        (None, Some(err)) => format!("not created: {err}"),
        (None, None) => "not created".to_string(),
    }
}

async fn execute(command: Command, store: &CliStore, config: &ConfigStore) -> Result<()> {
    match command {
        Command::Init => {
            store.init_draft().await;
            if let Some(err) = store.init_error() {
                anyhow::bail!("draft creation failed: {err}");
            }
        }
        Command::Set(set) => {
            let update = to_update(set, store)?;
            store.update(update);
        }
        Command::Save { field: Some(field) } => {
            store.save_field(field.into()).await?;
        }
        Command::Save { field: None } => {
            let saved = store.save_all_dirty().await.map_err(|err| {
                let details = err
                    .failures
                    .iter()
                    .map(|(field, failure)| format!("{field}: {failure}"))
                    .collect::<Vec<_>>()
                    .join("; ");
                anyhow::anyhow!("{err}: {details}")
            })?;
            tracing::info!("saved {} field(s)", saved.len());
        }
        Command::Publish => {
            let event = store.publish().await?;
            println!("published event #{}", event.event_id);
            store.reset();
            return Ok(());
        }
        Command::Status => {}
        Command::Reset => store.reset(),
        Command::Login { token } => {
            config.update(|cfg| cfg.access_token = Some(token.trim().to_string()))?;
            println!("token stored");
            return Ok(());
        }
        Command::Logout => {
            config.update(|cfg| cfg.access_token = None)?;
            store.reset();
            store
                .storage()
                .clear()
                .context("failed to clear draft storage")?;
            println!("signed out");
            return Ok(());
        }
    }
    print_status(store);
    Ok(())
}

pub async fn run() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config = match cli.config {
        Some(path) => ConfigStore::load_from(path),
        None => ConfigStore::load(),
    }
    .context("failed to load config")?;
    let config = Arc::new(config);

    let gateway =
        HttpGateway::from_config(config.clone()).context("failed to build backend client")?;
    let storage = match cli.storage {
        Some(path) => FileStorage::new(path),
        None => FileStorage::open_default(),
    };
    tracing::debug!(path = ?storage.path(), "opening draft storage");
    let store = DraftStore::open(gateway, storage).context("failed to restore event draft")?;

    execute(cli.command, &store, &config).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_schedule_and_save() {
        let cli = Cli::try_parse_from([
            "event-draft",
            "set",
            "schedule",
            "2025-10-08T19:00:00-06:00",
            "2025-10-08T23:00:00-06:00",
        ])
        .expect("parse set schedule");
        assert!(matches!(cli.command, Command::Set(SetCommand::Schedule { .. })));

        let cli = Cli::try_parse_from(["event-draft", "save", "location"]).expect("parse save");
        match cli.command {
            Command::Save { field: Some(field) } => {
                assert_eq!(FieldKey::from(field), FieldKey::Location)
            }
            other => panic!("unexpected command {other:?}"),
        }

        let cli = Cli::try_parse_from(["event-draft", "set", "allow-external", "true"])
            .expect("parse allow-external");
        assert!(matches!(
            cli.command,
            Command::Set(SetCommand::AllowExternal { value: true })
        ));
    }

    #[test]
    fn timestamps_are_normalized_to_utc() {
        let parsed = parse_timestamp("start", "2025-10-08T19:00:00-06:00").expect("parse");
        assert_eq!(parsed.to_rfc3339(), "2025-10-09T01:00:00+00:00");
        assert!(parse_timestamp("start", "tomorrow").is_err());
    }

    #[tokio::test]
    async fn logout_forgets_token_and_draft() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = ConfigStore::load_from(dir.path().join("config.json")).expect("load config");
        config
            .update(|cfg| cfg.access_token = Some("t0k".into()))
            .expect("store token");

        let draft_path = dir.path().join("draft.json");
        let gateway = HttpGateway::new(
            "http://127.0.0.1:9",
            std::time::Duration::from_secs(1),
            Arc::new(gateway::StaticToken(None)),
        )
        .expect("build gateway");
        let store = DraftStore::new(gateway, FileStorage::new(draft_path.clone()));
        store.update(DraftUpdate::Title("Rooftop Social".into()));
        assert!(draft_path.exists());

        execute(Command::Logout, &store, &config)
            .await
            .expect("logout");

        assert!(!draft_path.exists());
        assert_eq!(config.read().access_token, None);
        assert_eq!(store.data().title, "");
        assert!(!store.has_unsaved());
    }
}
