use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "wen",
    version = env!("WEN_BUILD_VERSION"),
    about = "Command-line history manager."
)]
pub struct Cli {
    /// Path to wen history database file
    #[arg(short = 'H', long, global = true)]
    pub history_db: Option<String>,

    /// Automatically fix invalid database by replacing it
    #[arg(short, long, global = true, default_value_t = false)]
    pub fix: bool,

    /// Commandline to append
    #[arg(short, long, global = true, allow_hyphen_values = true)]
    pub cmdline: Option<String>,

    /// PID associated with commandline (defaults to the parent process)
    #[arg(short, long, global = true)]
    pub pid: Option<i64>,

    /// Unix timestamp associated with commandline (defaults to now)
    #[arg(short, long, global = true, allow_negative_numbers = true)]
    pub ts: Option<i64>,

    /// Include duplicate commands
    #[arg(short = 'd', long, global = true, default_value_t = false)]
    pub no_ignore_dups: bool,

    /// Include commands that start with a space
    #[arg(short = 's', long, global = true, default_value_t = false)]
    pub no_ignore_space: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Mark the start of a shell session
    StartSession,
    /// Mark the end of a shell session
    StopSession,
    /// Append a commandline to the history
    Append,
    /// Print recorded sessions
    Show {
        /// Only read the newest N entries
        #[arg(short = 'n', long)]
        limit: Option<usize>,

        /// Skip entries older than this Unix timestamp
        #[arg(long, allow_negative_numbers = true)]
        since: Option<i64>,
    },
}
