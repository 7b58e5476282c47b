//! # CLI Layer
//!
//! The CLI layer is the **only** place in the codebase that:
//! - Knows about terminal I/O (stdout, stderr)
//! - Installs the tracing subscriber
//! - Handles argument parsing
//! - Formats output for human consumption
//!
//! ## Responsibilities
//!
//! 1. **Argument Parsing**: Convert shell arguments into typed commands via clap
//! 2. **Context Setup**: Resolve the data dir, load config, build the `TodoApp`
//! 3. **API Dispatch**: Call the appropriate `TodoApp` method
//! 4. **Output Formatting**: Print `CmdResult` messages and the rendered list
//!
//! Each invocation renders into a `MemorySurface`; `list` prints the item
//! lines the views produced, in list order.

use super::print::{print_config, print_messages, print_stats, print_todos, ListedTodo};
use super::setup::{Cli, Commands};
use clap::Parser;
use directories::ProjectDirs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use todoz::api::{CmdMessage, TodoApp};
use todoz::binding::SystemClock;
use todoz::config::{validate_namespace, TodozConfig};
use todoz::error::{Result, TodozError};
use todoz::store::fs::FileAdapter;
use todoz::view::{ItemLine, MemorySurface};
use tracing_subscriber::EnvFilter;

const HOME_ENV: &str = "TODOZ_HOME";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListFilter {
    All,
    Done,
    Remaining,
}

struct AppContext {
    app: TodoApp,
    surface: Rc<MemorySurface>,
    data_dir: PathBuf,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let data_dir = resolve_data_dir(cli.dir.as_deref())?;

    // `config` must work even when the configured list cannot be opened.
    match cli.command {
        Some(Commands::Config { key, value }) => handle_config(&data_dir, key, value),
        command => {
            let ctx = init_context(data_dir)?;
            dispatch(&ctx, command)
        }
    }
}

fn dispatch(ctx: &AppContext, command: Option<Commands>) -> Result<()> {
    match command {
        Some(Commands::Add { text }) => handle_add(ctx, &text.join(" ")),
        Some(Commands::List { done, remaining }) => {
            let filter = match (done, remaining) {
                (true, _) => ListFilter::Done,
                (_, true) => ListFilter::Remaining,
                _ => ListFilter::All,
            };
            handle_list(ctx, filter)
        }
        Some(Commands::Toggle { positions }) => handle_toggle(ctx, &positions),
        Some(Commands::Edit { position, text }) => handle_edit(ctx, position, &text.join(" ")),
        Some(Commands::Remove { positions }) => handle_remove(ctx, &positions),
        Some(Commands::Clear) => handle_clear(ctx),
        Some(Commands::Config { key, value }) => handle_config(&ctx.data_dir, key, value),
        None => handle_list(ctx, ListFilter::All),
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("todoz=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn resolve_data_dir(dir: Option<&Path>) -> Result<PathBuf> {
    if let Some(dir) = dir {
        return Ok(dir.to_path_buf());
    }
    if let Some(home) = std::env::var_os(HOME_ENV).filter(|h| !h.is_empty()) {
        return Ok(PathBuf::from(home));
    }
    ProjectDirs::from("com", "todoz", "todoz")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .ok_or_else(|| TodozError::Api("Could not determine data directory".into()))
}

fn load_config(data_dir: &Path) -> TodozConfig {
    TodozConfig::load(data_dir).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "unreadable config, using defaults");
        TodozConfig::default()
    })
}

fn init_context(data_dir: PathBuf) -> Result<AppContext> {
    let config = load_config(&data_dir);
    validate_namespace(&config.namespace).map_err(|_| {
        TodozError::Api(format!(
            "Invalid namespace in config: {} (fix it with `todoz config namespace <name>`)",
            config.namespace
        ))
    })?;
    tracing::debug!(dir = %data_dir.display(), namespace = %config.namespace, "opening list");

    let adapter = Rc::new(FileAdapter::new(data_dir.clone(), config.namespace.clone()));
    let surface = Rc::new(MemorySurface::new());
    let app = TodoApp::new(adapter, surface.clone(), Rc::new(SystemClock::new()), config)?;

    Ok(AppContext {
        app,
        surface,
        data_dir,
    })
}

fn handle_add(ctx: &AppContext, text: &str) -> Result<()> {
    let result = ctx.app.create(text)?;
    print_messages(&result.messages);
    Ok(())
}

fn handle_list(ctx: &AppContext, filter: ListFilter) -> Result<()> {
    let show_done = ctx.app.config().show_done;
    let listed: Vec<ListedTodo> = ctx
        .app
        .todos()
        .iter()
        .enumerate()
        .map(|(i, todo)| ListedTodo {
            position: i + 1,
            line: ctx.surface.item(todo.cid()).unwrap_or_else(|| ItemLine {
                text: todo.text(),
                done: todo.done(),
                editing: false,
            }),
        })
        .filter(|t| match filter {
            ListFilter::All => show_done || !t.line.done,
            ListFilter::Done => t.line.done,
            ListFilter::Remaining => !t.line.done,
        })
        .collect();

    print_todos(&listed);
    print_stats(ctx.surface.stats());
    Ok(())
}

fn handle_toggle(ctx: &AppContext, positions: &[usize]) -> Result<()> {
    let result = ctx.app.toggle(positions)?;
    print_messages(&result.messages);
    Ok(())
}

fn handle_edit(ctx: &AppContext, position: usize, text: &str) -> Result<()> {
    let result = ctx.app.edit(position, text)?;
    print_messages(&result.messages);
    Ok(())
}

fn handle_remove(ctx: &AppContext, positions: &[usize]) -> Result<()> {
    let result = ctx.app.remove(positions)?;
    print_messages(&result.messages);
    Ok(())
}

fn handle_clear(ctx: &AppContext) -> Result<()> {
    let result = ctx.app.clear_completed()?;
    print_messages(&result.messages);
    Ok(())
}

fn handle_config(data_dir: &Path, key: Option<String>, value: Option<String>) -> Result<()> {
    let mut config = load_config(data_dir);
    match (key, value) {
        (None, _) => print_config(&config),
        (Some(key), None) => match config.get(&key) {
            Some(value) => println!("{}", value),
            None => print_messages(&[CmdMessage::error(format!("Unknown config key: {}", key))]),
        },
        (Some(key), Some(value)) => {
            config.set(&key, &value)?;
            config.save(data_dir)?;
            let shown = config.get(&key).unwrap_or(value);
            print_messages(&[CmdMessage::success(format!("{} set to {}", key, shown))]);
        }
    }
    Ok(())
}
