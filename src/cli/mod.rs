//! `sheetpilot` command line.

mod commands;

use crate::audit::AuditLog;
use crate::config::{AppConfig, ConfigStore};
use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

/// Environment variable holding the log filter
pub const LOG_ENV: &str = "SHEETPILOT_LOG";

#[derive(Parser)]
#[command(name = "sheetpilot")]
#[command(about = "Clean spreadsheet data from the command line")]
#[command(version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Data directory (default: $SHEETPILOT_HOME or ~/.sheetpilot)
    #[arg(long, global = true)]
    pub home: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load a file, run cleaning steps and save the result
    Clean(CleanArgs),

    /// List registered cleaning modules and their parameters
    Modules,

    /// Manage user accounts
    Users {
        /// Administrator username (required once an admin exists)
        #[arg(long)]
        admin_user: Option<String>,

        /// Administrator password
        #[arg(long, requires = "admin_user")]
        admin_password: Option<String>,

        #[command(subcommand)]
        action: UserCommand,
    },

    /// Show the most recent audit entries
    Audit {
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
}

#[derive(Args)]
pub struct CleanArgs {
    /// Input file path
    #[arg(short, long)]
    pub input: PathBuf,

    /// Output file path; the extension picks the format
    #[arg(short, long)]
    pub output: PathBuf,

    /// Input format (detected from the extension when omitted)
    #[arg(short, long)]
    pub format: Option<String>,

    /// Imputation settings, e.g. "columns=A,B method=mean"
    #[arg(long)]
    pub impute: Option<String>,

    /// Normalization settings, e.g. "columns=X,Y lowercase=true"
    #[arg(long)]
    pub normalize: Option<String>,

    /// Outlier settings, e.g. "columns=P,Q method=iqr threshold=1.5"
    #[arg(long)]
    pub outlier: Option<String>,

    /// JSON pipeline config; replaces the per-module flags
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Module id to run; repeat for several steps
    #[arg(long = "module")]
    pub modules: Vec<String>,

    /// JSON parameters for the matching --module
    #[arg(long = "params")]
    pub params: Vec<String>,

    /// Abort at the first failing step
    #[arg(long)]
    pub stop_on_error: bool,

    /// Run as this user
    #[arg(long)]
    pub user: Option<String>,

    #[arg(long, requires = "user")]
    pub password: Option<String>,
}

#[derive(Subcommand)]
pub enum UserCommand {
    /// Create an account
    Add {
        username: String,
        password: String,
        #[arg(long, default_value = crate::auth::DEFAULT_ROLE)]
        role: String,
    },
    /// List accounts
    List,
    /// Delete an account
    Delete { username: String },
    /// Change an account's role
    SetRole { username: String, role: String },
    /// Change an account's password
    SetPassword { username: String, password: String },
}

/// Shared state for one CLI invocation
pub(crate) struct App {
    pub store: ConfigStore,
    pub config: AppConfig,
    pub audit: Arc<AuditLog>,
}

/// Install the global logger. `SHEETPILOT_LOG` wins over `default_filter`.
pub fn init_logging(default_filter: &str) {
    let env = env_logger::Env::default().filter_or(LOG_ENV, default_filter);
    if env_logger::Builder::from_env(env).try_init().is_err() {
        log::debug!("Logger already initialized");
    }
}

pub async fn run(cli: Cli) -> Result<()> {
    let store = ConfigStore::new(cli.home.clone().unwrap_or_else(ConfigStore::default_home));
    let created = store.ensure_config_file().await?;
    let config = store.load().await?;

    let filter = if cli.verbose {
        "debug"
    } else {
        config.log_filter.as_str()
    };
    init_logging(filter);
    if created {
        log::info!("Created default config at {}", store.config_path().display());
    }
    log::debug!("Using data directory {}", store.home().display());

    let audit = Arc::new(AuditLog::open(store.audit_db_path())?);
    let app = App {
        store,
        config,
        audit,
    };

    match cli.command {
        Commands::Clean(args) => commands::clean(&app, args).await,
        Commands::Modules => commands::modules(),
        Commands::Users {
            admin_user,
            admin_password,
            action,
        } => commands::users(&app, admin_user, admin_password, action),
        Commands::Audit { limit } => commands::audit(&app, limit),
    }
}
