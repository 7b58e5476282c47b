use colored::Colorize;
use todoz::api::{CmdMessage, MessageLevel};
use todoz::config::TodozConfig;
use todoz::model::Stats;
use todoz::view::ItemLine;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

const LINE_WIDTH: usize = 80;
const DONE_MARKER: &str = "[x]";
const OPEN_MARKER: &str = "[ ]";

/// One row of `list` output: the item as the view rendered it, and its
/// 1-based position in the full list.
pub(super) struct ListedTodo {
    pub position: usize,
    pub line: ItemLine,
}

pub(super) fn print_messages(messages: &[CmdMessage]) {
    for message in messages {
        match message.level {
            MessageLevel::Info => println!("{}", message.content.dimmed()),
            MessageLevel::Success => println!("{}", message.content.green()),
            MessageLevel::Warning => println!("{}", message.content.yellow()),
            MessageLevel::Error => println!("{}", message.content.red()),
        }
    }
}

pub(super) fn print_todos(todos: &[ListedTodo]) {
    if todos.is_empty() {
        println!("No todos.");
        return;
    }
    let position_width = todos
        .iter()
        .map(|t| t.position.to_string().len())
        .max()
        .unwrap_or(1);

    for todo in todos {
        let row = format_todo(todo, position_width);
        if todo.line.done {
            println!("{}", row.dimmed());
        } else {
            println!("{}", row);
        }
    }
}

pub(super) fn print_stats(stats: Stats) {
    println!();
    println!("{}", format_stats(stats).dimmed());
}

pub(super) fn print_config(config: &TodozConfig) {
    for key in todoz::config::KEYS {
        if let Some(value) = config.get(key) {
            println!("{} = {}", key, value);
        }
    }
}

fn format_todo(todo: &ListedTodo, position_width: usize) -> String {
    let marker = if todo.line.done {
        DONE_MARKER
    } else {
        OPEN_MARKER
    };
    let prefix = format!(
        "{} {:>width$}. ",
        marker,
        todo.position,
        width = position_width
    );
    let available = LINE_WIDTH.saturating_sub(prefix.width());
    format!("{}{}", prefix, truncate_to_width(&todo.line.text, available))
}

fn format_stats(stats: Stats) -> String {
    let left = if stats.remaining == 1 { "item" } else { "items" };
    format!(
        "{} {} left, {} done, {} total",
        stats.remaining, left, stats.done, stats.total
    )
}

fn truncate_to_width(s: &str, max_width: usize) -> String {
    if s.width() <= max_width {
        return s.to_string();
    }
    let mut result = String::new();
    let mut current_width = 0;

    for c in s.chars() {
        let char_width = c.width().unwrap_or(0);
        if current_width + char_width > max_width.saturating_sub(1) {
            result.push('…');
            return result;
        }
        result.push(c);
        current_width += char_width;
    }

    result
}
