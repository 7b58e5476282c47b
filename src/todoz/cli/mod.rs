//! # CLI Behavior
//!
//! This is **one possible UI client** for todoz, not the application itself.
//! The CLI is the only place that knows about terminal I/O, exit codes and
//! output formatting.
//!
//! ### Naked Execution (`todoz`)
//!
//! Running `todoz` with no arguments defaults to `todoz list`.
//!
//! ### Positions
//!
//! Commands that target todos take 1-based positions as printed by `list`
//! (`todoz toggle 1 3`). Positions are resolved before anything changes, so
//! a bad position aborts the whole command.
//!
//! ### Data Directory
//!
//! `--dir <path>`, else `$TODOZ_HOME`, else the platform data directory.
//! The list lives in `<dir>/<namespace>.json`, settings in `<dir>/config.json`.
//!
//! ## Module Structure
//!
//! - `commands`: Context setup, dispatch and per-command handlers
//! - `print`: Output formatting (lines, stats, messages)
//! - `setup`: Argument parsing via clap

mod commands;
mod print;
pub mod setup;

pub use commands::run;
