use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "brewsync")]
#[command(about = "Push Kleiner-Brauhelfer recipes to Grainfather")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// More log output (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Debug logging for every component, including HTTP internals
    #[arg(short, long, global = true)]
    pub debug: bool,

    /// Report what would change without writing to Grainfather
    #[arg(short = 'n', long, global = true)]
    pub dry_run: bool,

    /// Update matched recipes even when nothing differs
    #[arg(short, long, global = true)]
    pub force: bool,

    /// Additional JSON config file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Grainfather account (email)
    #[arg(short, long, global = true, value_name = "USER")]
    pub user: Option<String>,

    /// Grainfather password
    #[arg(short, long, global = true, value_name = "PASSWORD")]
    pub password: Option<String>,

    /// File whose first line is the Grainfather password
    #[arg(short = 'P', long = "pwfile", global = true, value_name = "FILE")]
    pub password_file: Option<PathBuf>,

    /// Log out after the command
    #[arg(short, long, global = true)]
    pub logout: bool,

    /// Kleiner-Brauhelfer database file
    #[arg(short, long = "kbhfile", global = true, value_name = "FILE")]
    pub kbh_file: Option<PathBuf>,

    /// Print reports as JSON
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List local and remote recipes
    List {
        /// Recipe name pattern (shell glob)
        pattern: Option<String>,
    },
    /// Print the full Grainfather records as JSON
    Dump {
        /// Recipe name pattern (shell glob)
        pattern: Option<String>,
    },
    /// Create or update Grainfather recipes from local recipes
    Push {
        /// Recipe name pattern (shell glob)
        pattern: Option<String>,
    },
    /// Delete Grainfather recipes
    Delete {
        /// Recipe name pattern (shell glob)
        pattern: String,
    },
    /// Show differences between one local and one remote recipe
    Diff {
        /// Recipe name pattern (shell glob)
        pattern: String,
    },
    /// Push, then push again whenever the local database changes
    Daemon {
        /// Recipe name pattern (shell glob)
        pattern: Option<String>,
    },
    /// Log out and forget the stored session
    Logout,
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

impl Commands {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::List { .. } => "list",
            Self::Dump { .. } => "dump",
            Self::Push { .. } => "push",
            Self::Delete { .. } => "delete",
            Self::Diff { .. } => "diff",
            Self::Daemon { .. } => "daemon",
            Self::Logout => "logout",
            Self::Completions { .. } => "completions",
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}
