//! hw: hellowords journal CLI
//!
//! Session:
//!   login --id <id> --email <email>  - sign in (flushes an entry staged while signed out)
//!   logout                           - sign out and drop the in-memory key
//!
//! Entries:
//!   write [<text>]         - save a new entry (reads stdin when no text is given)
//!   edit <id> <text>       - save an edited copy of an entry as a new entry
//!   list                   - decrypt and print every entry, newest first
//!   search <query>         - semantic search over your entries
//!   delete <id>            - delete one entry
//!   delete-all --yes       - delete every entry
//!   delete-account --yes   - delete every entry, wipe local state, sign out
//!   flush                  - retry a staged entry now
//!
//! Local state:
//!   draft show|set|clear   - the unsaved composition
//!   location on|off|status - whether new entries record a location
//!   config show            - display current configuration

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use hw_core::config::{expand_tilde, HwConfig, StoreBackend};
use hw_core::HwError;
use hw_crypto::{Codec, KdfParams};
use hw_embed::{EmbeddingClient, OpenAiEmbedder};
use hw_journal::{
    Account, FlushOutcome, Journal, LocalAuth, SaveOutcome, StaticLocator, TeardownGapDetector,
};
use hw_store::{EntryStore, JsonSlotStore, LocalStore, MemoryEntryStore, RestConfig, RestEntryStore};

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "hw",
    version,
    about = "hellowords: an end-to-end encrypted journal",
    long_about = "hw: write, search and manage journal entries encrypted on this device"
)]
struct Cli {
    /// Path to hellowords.toml configuration file
    #[arg(
        long,
        short = 'c',
        env = "HW_CONFIG",
        default_value = "~/.config/hellowords/config.toml"
    )]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides [log] level
    #[arg(long, env = "HW_LOG")]
    log: Option<String>,

    /// Log format (json, text); overrides [log] format
    #[arg(long, env = "HW_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Debug, ValueEnum)]
enum LogFormat {
    Json,
    Text,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Sign in as an account
    Login {
        #[arg(long)]
        id: String,
        #[arg(long)]
        email: String,
    },

    /// Sign out
    Logout,

    /// Save a new entry
    Write {
        /// Entry text (default: read from stdin)
        text: Option<String>,
    },

    /// Save an edited copy of an entry; the original is left as written
    Edit { id: Uuid, text: String },

    /// Decrypt and print all entries
    List,

    /// Semantic search over entries
    Search { query: String },

    /// Delete one entry
    Delete { id: Uuid },

    /// Delete every entry of the signed-in account
    #[command(name = "delete-all")]
    DeleteAll {
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },

    /// Delete every entry, forget local preferences and sign out
    #[command(name = "delete-account")]
    DeleteAccount {
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },

    /// Flush an entry staged while signed out
    Flush,

    /// Unsaved composition
    Draft {
        #[command(subcommand)]
        action: DraftAction,
    },

    /// Location saving preference
    Location {
        #[command(subcommand)]
        action: LocationAction,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum DraftAction {
    Show,
    Set { text: String },
    Clear,
}

#[derive(Subcommand, Debug)]
enum LocationAction {
    On,
    Off,
    Status,
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the active configuration (merged defaults + config file)
    Show,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = expand_tilde(&cli.config);
    let config = HwConfig::load(&config_path)
        .with_context(|| format!("loading config: {}", config_path.display()))?;

    let level = cli.log.clone().unwrap_or_else(|| config.log.level.clone());
    let format = cli.log_format.clone().unwrap_or(match config.log.format.as_str() {
        "json" => LogFormat::Json,
        _ => LogFormat::Text,
    });
    init_logging(&level, &format);

    tracing::debug!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_path.display(),
        backend = ?config.store.backend,
        "hw starting"
    );

    if let Commands::Config { action: ConfigAction::Show } = cli.command {
        return cmd_config_show(&config, &config_path);
    }

    let app = App::open(&config)?;
    if let Some(outcome) = app.journal.start().await {
        report_flush(&outcome);
    }
    let restored = app.journal.restore_draft(&app.teardown)?;

    let result = app.run(cli.command, restored).await;
    if let Err(e) = app.teardown.record_teardown() {
        tracing::warn!(error = %e, "could not record teardown");
    }
    result
}

fn init_logging(level: &str, format: &LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

/// Point auth failures at `hw login`; pass everything else through.
fn needs_login(e: HwError) -> anyhow::Error {
    match e {
        HwError::Auth(_) => anyhow::anyhow!("{e} (run `hw login` first)"),
        other => other.into(),
    }
}

// ── Wiring ────────────────────────────────────────────────────────────────────

struct App {
    journal: Journal,
    auth: Arc<LocalAuth>,
    teardown: TeardownGapDetector,
}

impl App {
    fn open(config: &HwConfig) -> Result<Self> {
        let slots_path = expand_tilde(&config.local.slots_path);
        let slots: Arc<dyn LocalStore> = Arc::new(
            JsonSlotStore::open(&slots_path)
                .with_context(|| format!("opening local slots: {}", slots_path.display()))?,
        );
        let auth = Arc::new(LocalAuth::open(slots.clone()).context("restoring session")?);

        let codec = Codec::new(KdfParams {
            iterations: config.crypto.pbkdf2_iterations,
        });
        let locator = Arc::new(StaticLocator::new(config.location.label.clone()));

        let teardown = TeardownGapDetector::new(slots.clone());
        let journal = Journal::new(build_store(config)?, build_embedder(config)?, slots, auth.clone(), codec)?
            .with_locator(locator, Duration::from_secs(config.location.timeout_secs))
            .with_search_options((&config.search).into());

        Ok(Self { journal, auth, teardown })
    }

    /// Run one command. `restored` is the draft as it stood at startup.
    async fn run(&self, command: Commands, restored: Option<String>) -> Result<()> {
        match command {
            Commands::Login { id, email } => self.login(id, email).await,
            Commands::Logout => self.journal.sign_out().await.map_err(Into::into),
            Commands::Write { text } => self.write(text).await,
            Commands::Edit { id, text } => self.edit(id, &text).await,
            Commands::List => self.list().await,
            Commands::Search { query } => self.search(&query).await,
            Commands::Delete { id } => {
                self.journal.delete_entry(id).await.map_err(needs_login)?;
                println!("deleted {id}");
                Ok(())
            }
            Commands::DeleteAll { yes } => self.delete_all(yes).await,
            Commands::DeleteAccount { yes } => self.delete_account(yes).await,
            Commands::Flush => {
                let outcome = self.journal.flush_pending().await.map_err(needs_login)?;
                report_flush(&outcome);
                Ok(())
            }
            Commands::Draft { action } => self.draft(action, restored),
            Commands::Location { action } => self.location(action),
            Commands::Config { .. } => Ok(()),
        }
    }

    async fn login(&self, id: String, email: String) -> Result<()> {
        let account = Account { id, email };
        self.auth.complete_sign_in(account.clone())?;
        println!("signed in as {}", account.email);
        if let Some(outcome) = self.journal.on_session_changed(Some(account)).await {
            report_flush(&outcome);
        }
        Ok(())
    }

    async fn write(&self, text: Option<String>) -> Result<()> {
        let text = match text {
            Some(t) => t,
            None => {
                let mut buf = String::new();
                std::io::stdin()
                    .read_to_string(&mut buf)
                    .context("reading entry from stdin")?;
                buf
            }
        };

        self.journal.edit(&text, None)?;
        let pb = make_spinner("write");
        pb.set_message("encrypting...");
        let outcome = self.journal.save(&text, None).await;
        pb.finish_and_clear();
        report_save(&outcome.context("saving entry")?);
        Ok(())
    }

    async fn edit(&self, id: Uuid, text: &str) -> Result<()> {
        let opened = self.journal.open_entry(id).await.map_err(needs_login)?;
        let outcome = self.journal.save(text, Some(&opened)).await.context("saving edit")?;
        report_save(&outcome);
        Ok(())
    }

    async fn list(&self) -> Result<()> {
        let pb = make_spinner("list");
        pb.set_message("decrypting entries...");
        let entries = self.journal.load_entries().await;
        pb.finish_and_clear();
        let entries = entries.map_err(needs_login)?;

        if entries.is_empty() {
            println!("no entries");
            return Ok(());
        }
        for hit in &entries {
            println!(
                "{}  {}  {} words  {}",
                hit.entry.id,
                hit.entry.created_at.format("%Y-%m-%d %H:%M"),
                hit.entry.word_count,
                hit.entry.location
            );
            println!("    {}", hit.content.replace('\n', "\n    "));
        }
        Ok(())
    }

    async fn search(&self, query: &str) -> Result<()> {
        let pb = make_spinner("search");
        pb.set_message("searching...");
        let hits = self.journal.search(query).await;
        pb.finish_and_clear();
        let hits = hits.map_err(needs_login)?;

        if hits.is_empty() {
            println!("no matches");
            return Ok(());
        }
        for hit in &hits {
            let score = hit.similarity.unwrap_or_default();
            println!("{:.3}  {}  {}", score, hit.entry.id, hit.content);
        }
        Ok(())
    }

    async fn delete_all(&self, yes: bool) -> Result<()> {
        if !yes {
            anyhow::bail!("refusing to delete every entry without --yes");
        }
        let removed = self
            .journal
            .delete_all_entries()
            .await
            .map_err(needs_login)?;
        println!("deleted {removed} entries");
        Ok(())
    }

    async fn delete_account(&self, yes: bool) -> Result<()> {
        if !yes {
            anyhow::bail!("refusing to delete the account without --yes");
        }
        let removed = self.journal.delete_account().await.map_err(needs_login)?;
        println!("deleted {removed} entries and signed out");
        Ok(())
    }

    fn draft(&self, action: DraftAction, restored: Option<String>) -> Result<()> {
        match action {
            DraftAction::Show => match restored {
                Some(text) => println!("{text}"),
                None => println!("no draft"),
            },
            DraftAction::Set { text } => self.journal.edit(&text, None)?,
            DraftAction::Clear => self.journal.clear_draft()?,
        }
        Ok(())
    }

    fn location(&self, action: LocationAction) -> Result<()> {
        match action {
            LocationAction::On => self.journal.set_location_enabled(true)?,
            LocationAction::Off => self.journal.set_location_enabled(false)?,
            LocationAction::Status => {}
        }
        let state = if self.journal.location_enabled()? { "on" } else { "off" };
        println!("location saving: {state}");
        Ok(())
    }
}

fn build_store(config: &HwConfig) -> Result<Arc<dyn EntryStore>> {
    match config.store.backend {
        StoreBackend::Memory => {
            tracing::warn!("memory entry store: entries are discarded when hw exits");
            Ok(Arc::new(MemoryEntryStore::new()))
        }
        StoreBackend::Rest => {
            let key_env = &config.store.api_key_env;
            let api_key = std::env::var(key_env)
                .with_context(|| format!("store API key: ${key_env} is not set"))?;
            let mut rest = RestConfig::from_core_config(&config.store, api_key);
            rest.access_token = std::env::var(&config.store.access_token_env).ok();
            Ok(Arc::new(RestEntryStore::new(rest)?))
        }
    }
}

fn build_embedder(config: &HwConfig) -> Result<EmbeddingClient> {
    if !config.embedding.enabled {
        return Ok(EmbeddingClient::disabled());
    }
    match std::env::var(&config.embedding.api_key_env) {
        Ok(key) => {
            let provider = OpenAiEmbedder::from_config(&config.embedding, key)?;
            Ok(EmbeddingClient::new(Arc::new(provider)))
        }
        Err(_) => {
            tracing::warn!(
                env = %config.embedding.api_key_env,
                "embedding API key not set; entries are saved without a search index"
            );
            Ok(EmbeddingClient::disabled())
        }
    }
}

// ── Output ────────────────────────────────────────────────────────────────────

fn make_spinner(prefix: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{prefix:.bold} {spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_prefix(prefix.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

fn report_save(outcome: &SaveOutcome) {
    match outcome {
        SaveOutcome::Skipped => println!("nothing to save"),
        SaveOutcome::Unchanged => println!("no changes"),
        SaveOutcome::Saved(entry) => println!("saved {} ({} words)", entry.id, entry.word_count),
        SaveOutcome::Staged => {
            println!("saved locally; it will sync after `hw login`")
        }
    }
}

fn report_flush(outcome: &FlushOutcome) {
    match outcome {
        FlushOutcome::Flushed(entry) => println!("synced pending entry {}", entry.id),
        FlushOutcome::Failed(e) => {
            eprintln!("pending entry not synced: {e} (retry with `hw flush`)")
        }
        FlushOutcome::NothingStaged | FlushOutcome::AlreadyFlushing => {}
    }
}

fn cmd_config_show(config: &HwConfig, config_path: &Path) -> Result<()> {
    if config_path.exists() {
        println!("# Configuration from: {}", config_path.display());
    } else {
        println!("# Configuration: defaults (no file at {})", config_path.display());
    }
    println!();
    let rendered = toml::to_string_pretty(config).context("serializing config to TOML")?;
    print!("{rendered}");
    Ok(())
}
