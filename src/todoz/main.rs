//! # Todoz CLI
//!
//! The binary is intentionally thin: the CLI lives in `src/todoz/cli/`, while
//! this file only invokes `cli::run()` and handles process termination.
//!
//! One invocation builds a [`todoz::api::TodoApp`] over the on-disk list,
//! applies a single command through it and prints what the views rendered.

mod cli;

fn main() {
    if let Err(e) = cli::run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
