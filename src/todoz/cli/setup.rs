use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Returns the version string, including the git hash for non-release builds.
/// Format: "0.1.0" for releases, "0.1.0 (abc1234)" for dev builds
fn get_version() -> &'static str {
    const VERSION: &str = env!("CARGO_PKG_VERSION");
    const GIT_HASH: &str = env!("GIT_HASH");
    const IS_RELEASE: &str = env!("IS_RELEASE");

    use std::sync::OnceLock;
    static VERSION_STRING: OnceLock<String> = OnceLock::new();

    VERSION_STRING.get_or_init(|| {
        if IS_RELEASE == "true" || GIT_HASH.is_empty() {
            VERSION.to_string()
        } else {
            format!("{} ({})", VERSION, GIT_HASH)
        }
    })
}

#[derive(Parser, Debug)]
#[command(name = "todoz", bin_name = "todoz", version = get_version())]
#[command(about = "A small reactive task list for the command line", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Data directory (default: $TODOZ_HOME, else the platform data dir)
    #[arg(long, global = true, value_name = "DIR")]
    pub dir: Option<PathBuf>,

    /// Verbose output (debug logs on stderr)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Add a todo
    #[command(alias = "a")]
    Add {
        /// Text of the todo (words are joined with spaces)
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },

    /// List todos
    #[command(alias = "ls")]
    List {
        /// Only completed todos
        #[arg(long, conflicts_with = "remaining")]
        done: bool,

        /// Only todos still to do
        #[arg(long)]
        remaining: bool,
    },

    /// Mark todos done, or not done again
    #[command(alias = "t")]
    Toggle {
        /// Positions as shown by `list` (e.g. 1 3)
        #[arg(required = true, num_args = 1..)]
        positions: Vec<usize>,
    },

    /// Replace the text of a todo
    #[command(alias = "e")]
    Edit {
        /// Position as shown by `list`
        position: usize,

        /// New text
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },

    /// Remove todos
    #[command(name = "rm", alias = "remove")]
    Remove {
        /// Positions as shown by `list` (e.g. 1 3)
        #[arg(required = true, num_args = 1..)]
        positions: Vec<usize>,
    },

    /// Remove every completed todo
    Clear,

    /// Get or set configuration
    Config {
        /// Configuration key (namespace, hint-delay-ms, show-done)
        key: Option<String>,

        /// Value to set (if omitted, prints current value)
        value: Option<String>,
    },
}
