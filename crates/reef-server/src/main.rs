//! reef-server binary.
//!
//! Reads `config.toml` (or the path given with `--config`) layered under
//! `REEF_*` environment variables (`REEF_SCHEDULE__MONTH=3` for nested
//! keys), opens the SQLite store, and then either serves the API or runs a
//! one-off command.
//!
//! # Commands
//!
//! ```text
//! reef-server serve                  # HTTP API + yearly scheduler
//! reef-server check [--year 2027]    # run the yearly check once and exit
//! reef-server import profiles.json   # load exported profile documents
//! reef-server hash-password          # print an argon2 hash for config.toml
//! ```

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
use chrono::{Datelike as _, Utc};
use clap::{Parser, Subcommand};
use rand_core::OsRng;
use reef_core::{job::YearlyCheck, profile::Profile, store::ProfileStore as _};
use reef_server::{AppState, ServerConfig, scheduler};
use reef_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Reef rewards server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Serve the HTTP API and run the yearly check on schedule.
  Serve,
  /// Run the yearly points check once and print the report.
  Check {
    /// Year to check; defaults to the current year.
    #[arg(long)]
    year: Option<i32>,
  },
  /// Import exported profile documents from a JSON file (one object or an
  /// array of them).
  Import { file: PathBuf },
  /// Print the argon2 hash for a password entered on stdin and exit.
  HashPassword,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  if let Command::HashPassword = cli.command {
    let password = read_password()?;
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
      .hash_password(password.as_bytes(), &salt)
      .map_err(|e| anyhow::anyhow!("argon2 error: {e}"))?
      .to_string();
    println!("{hash}");
    return Ok(());
  }

  // Load configuration.
  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(
      config::Environment::with_prefix("REEF")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true),
    )
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  let store_path = expand_tilde(&server_cfg.store_path);
  if let Some(parent) = store_path.parent()
    && !parent.as_os_str().is_empty()
  {
    std::fs::create_dir_all(parent)
      .with_context(|| format!("failed to create {parent:?}"))?;
  }

  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;
  let store = Arc::new(store);

  match cli.command {
    Command::Serve => serve(store, server_cfg).await,
    Command::Check { year } => check(store, year).await,
    Command::Import { file } => import(store, &file).await,
    Command::HashPassword => Ok(()),
  }
}

async fn serve(store: Arc<SqliteStore>, cfg: ServerConfig) -> anyhow::Result<()> {
  let auth = cfg.auth()?;
  cfg.schedule.validate()?;

  scheduler::spawn(store.clone(), cfg.schedule);

  let app = reef_server::router(AppState { store, auth: Arc::new(auth) });
  let address = format!("{}:{}", cfg.host, cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

async fn check(store: Arc<SqliteStore>, year: Option<i32>) -> anyhow::Result<()> {
  let now = Utc::now();
  let report = YearlyCheck::new(store)
    .run(year.unwrap_or_else(|| now.year()), now)
    .await
    .context("yearly check failed")?;
  println!("{}", serde_json::to_string_pretty(&report)?);
  Ok(())
}

async fn import(store: Arc<SqliteStore>, file: &Path) -> anyhow::Result<()> {
  let raw = std::fs::read_to_string(file)
    .with_context(|| format!("failed to read {file:?}"))?;
  let documents = match serde_json::from_str::<serde_json::Value>(&raw)
    .with_context(|| format!("{file:?} is not valid JSON"))?
  {
    serde_json::Value::Array(items) => items,
    single => vec![single],
  };

  // Decode everything first so a bad document aborts before any write.
  let profiles = documents
    .into_iter()
    .enumerate()
    .map(|(i, doc)| {
      Profile::from_document(doc).with_context(|| format!("document #{i}"))
    })
    .collect::<anyhow::Result<Vec<_>>>()?;

  for profile in profiles.iter().cloned() {
    let uid = profile.uid;
    store
      .import_profile(profile)
      .await
      .with_context(|| format!("failed to import profile {uid}"))?;
  }

  tracing::info!(count = profiles.len(), "imported profiles");
  Ok(())
}

/// Read one line from stdin as the password.
fn read_password() -> anyhow::Result<String> {
  use std::io::{self, BufRead, Write};
  let stdin = io::stdin();
  print!("Password: ");
  io::stdout().flush().ok();
  let mut line = String::new();
  stdin.lock().read_line(&mut line)?;
  Ok(
    line
      .trim_end_matches('\n')
      .trim_end_matches('\r')
      .to_string(),
  )
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
