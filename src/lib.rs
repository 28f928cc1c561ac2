// Library root for wen: exposes modules and the shared entry points for both binaries.

pub mod cli;
pub mod config;
pub mod db;
pub mod display;
pub mod error;
pub mod recorder;
pub mod session;
pub mod util;

use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;

use cli::{Cli, Commands};
use config::Config;
use db::{Db, StoreOptions};
use display::SessionPrinter;
use error::StoreError;
use recorder::{RecordOutcome, RecordPolicy};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    StartSession,
    StopSession,
    Append,
    Show {
        limit: Option<usize>,
        since: Option<i64>,
    },
}

/// Everything one invocation needs, resolved from flags, config and the
/// process environment.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub db_path: PathBuf,
    pub store: StoreOptions,
    pub pid: i64,
    pub timestamp: i64,
    pub cmdline: Option<String>,
    pub action: Action,
    pub policy: RecordPolicy,
    pub time_format: String,
}

impl Invocation {
    pub fn from_cli(cli: Cli, config: &Config, home: Option<&Path>, cwd: &Path) -> Self {
        let raw_path = cli
            .history_db
            .as_deref()
            .unwrap_or(&config.history.db_path);
        let mut policy = config.recorder.policy();
        if cli.no_ignore_dups {
            policy.ignore_duplicates = false;
        }
        if cli.no_ignore_space {
            policy.ignore_leading_space = false;
        }
        let bare = Commands::Show {
            limit: None,
            since: None,
        };
        let action = match cli.command.unwrap_or(bare) {
            Commands::StartSession => Action::StartSession,
            Commands::StopSession => Action::StopSession,
            Commands::Append => Action::Append,
            Commands::Show { limit, since } => Action::Show {
                limit: limit.or(config.display.limit),
                since,
            },
        };

        Self {
            db_path: util::resolve_path(raw_path, home, cwd),
            store: StoreOptions {
                repair: cli.fix,
                busy_timeout: config.db.busy_timeout(),
            },
            pid: cli.pid.unwrap_or_else(util::parent_pid),
            timestamp: cli.ts.unwrap_or_else(util::now_timestamp),
            cmdline: cli.cmdline,
            action,
            policy,
            time_format: config.display.time_format.clone(),
        }
    }

    /// The `wen-append` fast path: parent pid, current time, default
    /// filtering, and an incompatible store is replaced rather than refused.
    pub fn fast_append(cmdline: String, config: &Config, home: Option<&Path>, cwd: &Path) -> Self {
        Self {
            db_path: util::resolve_path(&config.history.db_path, home, cwd),
            store: StoreOptions {
                repair: true,
                busy_timeout: config.db.busy_timeout(),
            },
            pid: util::parent_pid(),
            timestamp: util::now_timestamp(),
            cmdline: Some(cmdline),
            action: Action::Append,
            policy: config.recorder.policy(),
            time_format: config.display.time_format.clone(),
        }
    }
}

/// Opens the store, performs the action, and closes the store again.
pub fn run<W: Write>(invocation: &Invocation, out: &mut W) -> anyhow::Result<()> {
    match invocation.action {
        Action::Show { since, .. } => {
            if !display::is_valid_time_format(&invocation.time_format) {
                anyhow::bail!("invalid time format {:?}", invocation.time_format);
            }
            if let Some(since) = since {
                db::check_timestamp(since)?;
            }
        }
        _ => db::check_timestamp(invocation.timestamp)?,
    }

    let db = Db::open_checked(&invocation.db_path, &invocation.store).with_context(|| {
        format!(
            "cannot use history database {}",
            invocation.db_path.display()
        )
    })?;

    let cmdline = invocation.cmdline.as_deref();
    let (ts, pid) = (invocation.timestamp, invocation.pid);
    match invocation.action {
        Action::StartSession => {
            recorder::record_session_start(&db, ts, pid, cmdline)?;
        }
        Action::StopSession => {
            recorder::record_session_stop(&db, ts, pid, cmdline)?;
        }
        Action::Append => {
            if let RecordOutcome::Suppressed(reason) =
                recorder::record_history(&db, &invocation.policy, ts, pid, cmdline)?
            {
                tracing::debug!(?reason, "append skipped");
            }
        }
        Action::Show { limit, since } => {
            let sessions = session::load(&db, since, limit)?;
            tracing::debug!(sessions = sessions.len(), "showing sessions");
            SessionPrinter::new(chrono::Local, &invocation.time_format).print(out, &sessions)?;
        }
    }

    db.close()?;
    Ok(())
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
}

fn load_config() -> Config {
    Config::load().unwrap_or_else(|e| {
        eprintln!("wen: ignoring config: {e}");
        Config::default()
    })
}

pub fn main_inner() -> anyhow::Result<()> {
    init_logging();

    let cli = Cli::parse();
    let config = load_config();
    let cwd = std::env::current_dir().context("cannot determine working directory")?;
    let invocation = Invocation::from_cli(cli, &config, dirs::home_dir().as_deref(), &cwd);
    tracing::debug!(?invocation, "wen invocation");

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    run(&invocation, &mut out)?;
    out.flush()?;
    Ok(())
}

fn append_arg(arg: Option<OsString>) -> Result<String, StoreError> {
    let arg = arg.ok_or_else(|| StoreError::InvalidInput("usage: wen-append <commandline>".into()))?;
    arg.into_string().map_err(|raw| {
        StoreError::InvalidInput(format!("commandline is not valid UTF-8: {raw:?}"))
    })
}

pub fn append_main() -> anyhow::Result<()> {
    init_logging();

    let cmdline = append_arg(std::env::args_os().nth(1))?;
    let config = load_config();
    let cwd = std::env::current_dir().context("cannot determine working directory")?;
    let invocation =
        Invocation::fast_append(cmdline, &config, dirs::home_dir().as_deref(), &cwd);
    run(&invocation, &mut std::io::sink())
}
