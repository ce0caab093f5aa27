//! Oiler CLI — declare backup requests and manage adapter endpoints.
//!
//! Every command builds its own [`Invocation`] from flags and the local
//! config file, opens the namespace's store, runs one operation, and exits.

#![allow(clippy::print_stdout, clippy::print_stderr)]

mod config;
mod progress;
mod prompt;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::OnceLock;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use oiler_core::adapter::{AdapterRegistry, AdapterRemoval, AdapterWrite, REGISTRY_NAME};
use oiler_core::backup::{
    BackupRequest, BackupRequests, DEFAULT_MAX_BACKUP_COUNT, DEFAULT_SCHEDULE, NewBackupRequest,
};
use oiler_core::spec::{SecretSource, split_assignment};
use oiler_store::FileBackend;
use tracing_subscriber::EnvFilter;

use crate::config::LocalConfig;
use crate::progress::Steps;
use crate::prompt::TerminalPrompt;

// ── ANSI color helpers ───────────────────────────────────────────────

#[derive(Clone, Copy)]
struct Palette {
    reset: &'static str,
    bold: &'static str,
    dim: &'static str,
    red: &'static str,
    green: &'static str,
    yellow: &'static str,
    cyan: &'static str,
    white: &'static str,
}

const COLOR: Palette = Palette {
    reset: "\x1b[0m",
    bold: "\x1b[1m",
    dim: "\x1b[2m",
    red: "\x1b[31m",
    green: "\x1b[32m",
    yellow: "\x1b[33m",
    cyan: "\x1b[36m",
    white: "\x1b[37m",
};

const PLAIN: Palette = Palette {
    reset: "",
    bold: "",
    dim: "",
    red: "",
    green: "",
    yellow: "",
    cyan: "",
    white: "",
};

static PALETTE: OnceLock<Palette> = OnceLock::new();

fn palette() -> Palette {
    *PALETTE.get_or_init(|| COLOR)
}

// ── CLI structure ────────────────────────────────────────────────────

/// Oiler — scheduled database backups, declared from the command line.
#[derive(Parser)]
#[command(
    name = "oiler",
    version,
    about = "Oiler CLI — declare backup requests and manage adapter endpoints",
    long_about = None,
    after_help = "Environment variables:\n  \
         OILER_CONFIG     Config file (default: ~/.oiler/.config.json)\n  \
         OILER_STORE_DIR  Resource store directory (default: ~/.oiler/store)\n  \
         OILER_LOG        Log filter, e.g. debug (falls back to RUST_LOG)\n  \
         OILER_LOG_FORMAT Set to json for JSON log lines on stderr\n\n\
         Examples:\n  \
         oiler config set namespace=backups\n  \
         oiler backup create --name nightly --db postgres@db.local:5432/app \\\n      \
         --s3 https://s3.example.com/pg-backups --db-user-stdin --db-pass-stdin\n  \
         oiler backup update nightly spec.schedule='0 3 * * *'\n  \
         oiler adapter add postgres=http://pg-adapter.backups.svc:8080"
)]
struct Cli {
    /// Path to the config file.
    #[arg(long, global = true, env = "OILER_CONFIG")]
    config: Option<PathBuf>,

    /// Directory holding per-namespace resource stores.
    #[arg(long, global = true, env = "OILER_STORE_DIR")]
    store_dir: Option<PathBuf>,

    /// Disable colored output.
    #[arg(long, global = true, default_value = "false")]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show or change local settings.
    Config {
        #[command(subcommand)]
        action: Option<ConfigCommands>,
    },
    /// Backup request operations.
    Backup {
        #[command(subcommand)]
        action: BackupCommands,
    },
    /// Adapter endpoint operations.
    Adapter {
        #[command(subcommand)]
        action: AdapterCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the current settings.
    Get,
    /// Set one value (key=value). Keys: kube-config-path, namespace, store-dir.
    Set {
        /// Assignment in key=value format.
        assignment: String,
    },
}

#[derive(Subcommand)]
enum BackupCommands {
    /// List all backup requests in the namespace.
    List,
    /// Show one backup request (credentials are never printed).
    Get {
        /// Backup request name.
        name: String,
    },
    /// Declare a new backup request.
    Create(CreateArgs),
    /// Delete a backup request.
    Delete {
        /// Backup request name.
        name: String,
    },
    /// Set one field of a backup request (dotted.path[:type]=value).
    Update {
        /// Backup request name.
        name: String,
        /// Assignment such as spec.schedule=0 3 * * * or spec.maxBackupCount:int=5.
        assignment: String,
    },
}

#[derive(Args)]
struct CreateArgs {
    /// Backup request name.
    #[arg(long)]
    name: String,
    /// Database in dbType@dbUri:dbPort/dbName format.
    #[arg(long)]
    db: String,
    /// Database user.
    #[arg(long, conflicts_with = "db_user_stdin")]
    db_user: Option<String>,
    /// Database password.
    #[arg(long, conflicts_with = "db_pass_stdin")]
    db_pass: Option<String>,
    /// Prompt for the database user instead.
    #[arg(long, default_value = "false")]
    db_user_stdin: bool,
    /// Prompt for the database password instead.
    #[arg(long, default_value = "false")]
    db_pass_stdin: bool,
    /// Object storage in endpoint/bucket format.
    #[arg(long)]
    s3: String,
    /// Object storage access key.
    #[arg(long, conflicts_with = "s3_access_key_stdin")]
    s3_access_key: Option<String>,
    /// Object storage secret key.
    #[arg(long, conflicts_with = "s3_secret_key_stdin")]
    s3_secret_key: Option<String>,
    /// Prompt for the object storage access key instead.
    #[arg(long, default_value = "false")]
    s3_access_key_stdin: bool,
    /// Prompt for the object storage secret key instead.
    #[arg(long, default_value = "false")]
    s3_secret_key_stdin: bool,
    /// Cron schedule.
    #[arg(long, default_value = DEFAULT_SCHEDULE)]
    schedule: String,
    /// Number of backups to retain.
    #[arg(long, default_value_t = DEFAULT_MAX_BACKUP_COUNT)]
    max_backup_count: u64,
}

#[derive(Subcommand)]
enum AdapterCommands {
    /// Add or replace an adapter (name=url).
    Add {
        /// Assignment in name=url format.
        assignment: String,
    },
    /// Remove an adapter.
    Delete {
        /// Adapter name.
        name: String,
    },
    /// List all adapters.
    List,
}

// ── Invocation ───────────────────────────────────────────────────────

/// Settings resolved for a single command run.
struct Invocation {
    config_path: PathBuf,
    config: LocalConfig,
    store_dir: Option<PathBuf>,
}

impl Invocation {
    fn load(config_path: Option<PathBuf>, store_dir: Option<PathBuf>) -> Result<Self> {
        let config_path = match config_path {
            Some(path) => path,
            None => LocalConfig::default_path()?,
        };
        let config = LocalConfig::load_from(&config_path)?;
        Ok(Self {
            config_path,
            config,
            store_dir,
        })
    }

    fn store(&self) -> Result<FileBackend> {
        let root = self.config.store_root(self.store_dir.as_deref())?;
        tracing::debug!(root = %root.display(), "opening store");
        Ok(FileBackend::new(root))
    }
}

// ── Pretty output helpers ────────────────────────────────────────────

fn header(icon: &str, title: &str) {
    let Palette { reset, bold, dim, cyan, .. } = palette();
    println!("{bold}{cyan}{icon} {title}{reset}");
    println!("{dim}─────────────────────────────────────────{reset}");
}

fn kv_line(key: &str, value: &str) {
    let Palette { reset, dim, white, .. } = palette();
    println!("  {dim}{key:<20}{reset} {white}{value}{reset}");
}

fn success(msg: &str) {
    let Palette { reset, bold, green, .. } = palette();
    println!("{green}{bold}✓{reset} {msg}");
}

fn warning(msg: &str) {
    let Palette { reset, bold, yellow, .. } = palette();
    println!("{yellow}{bold}⚠{reset} {yellow}{msg}{reset}");
}

fn print_table(headers: &[&str], rows: &[Vec<String>]) {
    let Palette { reset, bold, dim, .. } = palette();
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }
    let pad = |cell: &str, width: usize| format!("{cell:<width$}");

    let head: Vec<String> = headers
        .iter()
        .zip(&widths)
        .map(|(h, w)| pad(&h.to_uppercase(), *w))
        .collect();
    println!("  {bold}{}{reset}", head.join("  "));
    let rule: usize = widths.iter().sum::<usize>() + 2 * widths.len().saturating_sub(1);
    println!("  {dim}{}{reset}", "─".repeat(rule));
    for row in rows {
        let cells: Vec<String> = row.iter().zip(&widths).map(|(c, w)| pad(c, *w)).collect();
        println!("  {}", cells.join("  "));
    }
    println!("  {dim}{}{reset}", "─".repeat(rule));
    println!("  {bold}TOTAL{reset} {}", rows.len());
}

fn display_or_dash(value: &str) -> &str {
    if value.is_empty() { "-" } else { value }
}

// ── Entrypoint ───────────────────────────────────────────────────────

fn init_tracing() {
    let filter = EnvFilter::try_from_env("OILER_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    // OILER_LOG_FORMAT=json for machine-readable logs.
    if std::env::var("OILER_LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")) {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let _ = PALETTE.set(if cli.no_color { PLAIN } else { COLOR });
    init_tracing();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let Palette { reset, bold, red, .. } = palette();
            eprintln!();
            eprintln!("  {red}{bold}✗ Error:{reset} {e:#}");
            eprintln!();
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let invocation = Invocation::load(cli.config, cli.store_dir)?;
    match cli.command {
        Commands::Config { action } => cmd_config(invocation, action),
        Commands::Backup { action } => cmd_backup(&invocation, action).await,
        Commands::Adapter { action } => cmd_adapter(&invocation, action).await,
    }
}

// ── Config ───────────────────────────────────────────────────────────

fn cmd_config(mut invocation: Invocation, action: Option<ConfigCommands>) -> Result<()> {
    match action.unwrap_or(ConfigCommands::Get) {
        ConfigCommands::Get => {
            let store_root = invocation.config.store_root(invocation.store_dir.as_deref())?;
            header("⚙", "Oiler Config");
            kv_line("Config File", &invocation.config_path.display().to_string());
            kv_line("Kube Config Path", &invocation.config.kube_config_path);
            kv_line("Namespace", &invocation.config.namespace);
            kv_line("Store", &store_root.display().to_string());
            Ok(())
        }
        ConfigCommands::Set { assignment } => {
            let (key, value) = split_assignment(&assignment, "<key>=<value>")?;
            invocation.config.set(key, value)?;
            invocation.config.save_to(&invocation.config_path)?;
            success(&format!("Set {key} = {value}"));
            Ok(())
        }
    }
}

// ── Backup requests ──────────────────────────────────────────────────

async fn cmd_backup(invocation: &Invocation, action: BackupCommands) -> Result<()> {
    let backups = BackupRequests::new(invocation.store()?);
    match action {
        BackupCommands::List => {
            let mut steps = Steps::stderr(2);
            steps.step("Getting BackupRequests");
            let items = backups.list().await.context("failed to list backup requests")?;
            steps.step("Generating results");
            let rows: Vec<Vec<String>> = items
                .iter()
                .enumerate()
                .map(|(i, b)| {
                    vec![
                        (i + 1).to_string(),
                        b.name().to_owned(),
                        b.spec.db_spec.uri.clone(),
                        b.spec.db_spec.db_name.clone(),
                        b.spec.db_spec.db_type.clone(),
                        b.spec.schedule.clone(),
                        display_or_dash(b.status_text()).to_owned(),
                    ]
                })
                .collect();
            header("🗄", &format!("Backup Requests ({})", invocation.config.namespace));
            print_table(
                &[
                    "#",
                    "Name",
                    "Database URI",
                    "Database Name",
                    "Database Type",
                    "Schedule",
                    "Status",
                ],
                &rows,
            );
            Ok(())
        }
        BackupCommands::Get { name } => {
            Steps::stderr(1).step("Getting BackupRequest");
            let backup = backups.get(&name).await?;
            print_backup(&backup);
            Ok(())
        }
        BackupCommands::Create(args) => {
            let mut steps = Steps::stderr(2);
            steps.step("Preparing");
            let request = NewBackupRequest {
                db_user: SecretSource::from_flags(args.db_user, args.db_user_stdin),
                db_password: SecretSource::from_flags(args.db_pass, args.db_pass_stdin),
                s3_access_key: SecretSource::from_flags(args.s3_access_key, args.s3_access_key_stdin),
                s3_secret_key: SecretSource::from_flags(args.s3_secret_key, args.s3_secret_key_stdin),
                schedule: args.schedule,
                max_backup_count: args.max_backup_count,
                ..NewBackupRequest::new(args.name, args.db, args.s3)
            };
            steps.step("Creating BackupRequest");
            let backup = backups.create(request, &TerminalPrompt).await?;
            success(&format!("BackupRequest '{}' created successfully", backup.name()));
            println!();
            print_backup(&backup);
            Ok(())
        }
        BackupCommands::Delete { name } => {
            Steps::stderr(1).step("Deleting BackupRequest");
            backups.delete(&name).await?;
            success(&format!("BackupRequest '{name}' deleted"));
            Ok(())
        }
        BackupCommands::Update { name, assignment } => {
            Steps::stderr(1).step("Updating BackupRequest");
            backups.update(&name, &assignment).await?;
            let field = assignment.split_once('=').map_or(assignment.as_str(), |(f, _)| f);
            success(&format!("BackupRequest '{name}' updated ({field})"));
            Ok(())
        }
    }
}

fn print_backup(backup: &BackupRequest) {
    let db = &backup.spec.db_spec;
    let s3 = &backup.spec.s3_spec;
    header("🗄", &format!("BackupRequest {}", backup.name()));
    kv_line(
        "Database",
        &format!("{}@{}:{}/{}", db.db_type, db.uri, db.port, db.db_name),
    );
    kv_line("DB User", if db.user.is_empty() { "-" } else { "(set)" });
    kv_line("DB Password", if db.pass.is_empty() { "-" } else { "(set)" });
    kv_line("S3 Endpoint", &s3.endpoint);
    kv_line("S3 Bucket", &s3.bucket_name);
    kv_line("Schedule", &backup.spec.schedule);
    kv_line("Max Backups", &backup.spec.max_backup_count.to_string());
    kv_line("Status", display_or_dash(backup.status_text()));
    if let Some(version) = backup.metadata.resource_version.as_deref() {
        kv_line("Resource Version", version);
    }
}

// ── Adapters ─────────────────────────────────────────────────────────

async fn cmd_adapter(invocation: &Invocation, action: AdapterCommands) -> Result<()> {
    let adapters = AdapterRegistry::new(invocation.store()?);
    match action {
        AdapterCommands::Add { assignment } => {
            let (name, url) = split_assignment(&assignment, "<name>=<url>")?;
            Steps::stderr(1).step("Updating config map");
            match adapters.add_or_update(name, url).await? {
                AdapterWrite::CreatedRegistry => success(&format!(
                    "Created ConfigMap '{REGISTRY_NAME}' with entry '{name}={url}'"
                )),
                AdapterWrite::Added | AdapterWrite::Updated { .. } => success(&format!(
                    "Updated ConfigMap '{REGISTRY_NAME}' with entry '{name}={url}'"
                )),
            }
            Ok(())
        }
        AdapterCommands::Delete { name } => {
            Steps::stderr(1).step("Updating config map");
            match adapters.delete(&name).await? {
                AdapterRemoval::Removed { .. } => {
                    success(&format!("Deleted entry '{name}' from ConfigMap '{REGISTRY_NAME}'"));
                }
                AdapterRemoval::NotFound => {
                    warning(&format!("Entry '{name}' not found in ConfigMap '{REGISTRY_NAME}'"));
                }
            }
            Ok(())
        }
        AdapterCommands::List => {
            let mut steps = Steps::stderr(2);
            steps.step("Getting config map");
            let items = adapters.list().await.context("failed to list adapters")?;
            steps.step("Generating results");
            let rows: Vec<Vec<String>> = items
                .into_iter()
                .enumerate()
                .map(|(i, a)| vec![(i + 1).to_string(), a.name, a.url])
                .collect();
            header("🔌", "Adapters");
            print_table(&["#", "Adapter Name", "Adapter URI"], &rows);
            Ok(())
        }
    }
}
