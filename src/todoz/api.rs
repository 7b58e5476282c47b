//! # API Facade
//!
//! [`TodoApp`] is the application context: it is built once at startup and
//! owns the [`TodoList`] and the [`AppView`] bound to it. There are no
//! process-wide globals; whoever needs the list or the views gets them from
//! the app.
//!
//! ## Role and Responsibilities
//!
//! The facade:
//! - **Normalizes inputs**: todos are addressed by 1-based display position,
//!   resolved against the current list before anything is mutated
//! - **Routes through the views**: edits, toggles and removals go through the
//!   item's [`TodoView`], so the surface sees exactly what a UI would
//! - **Returns structured types** (`Result<CmdResult>`)
//!
//! ## What the API Does NOT Do
//!
//! - **I/O**: no stdout or stderr; presentation is the caller's concern
//! - **Model logic**: ordering, validation and persistence live in the core

use crate::binding::Clock;
use crate::config::TodozConfig;
use crate::error::{Result, TodozError};
use crate::model::{Stats, Todo, TodoList};
use crate::store::PersistenceAdapter;
use crate::view::{AppView, Surface, TodoView};
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone)]
pub struct CmdMessage {
    pub level: MessageLevel,
    pub content: String,
}

impl CmdMessage {
    pub fn info(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Info,
            content: content.into(),
        }
    }

    pub fn success(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Success,
            content: content.into(),
        }
    }

    pub fn warning(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Warning,
            content: content.into(),
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Error,
            content: content.into(),
        }
    }
}

#[derive(Debug, Default)]
pub struct CmdResult {
    pub affected: Vec<Todo>,
    pub messages: Vec<CmdMessage>,
}

impl CmdResult {
    pub fn add_message(&mut self, message: CmdMessage) {
        self.messages.push(message);
    }

    pub fn with_affected(mut self, todos: Vec<Todo>) -> Self {
        self.affected = todos;
        self
    }
}

/// The application context.
#[derive(Debug)]
pub struct TodoApp {
    list: TodoList,
    view: AppView,
    config: TodozConfig,
}

impl TodoApp {
    /// Bind the views and load the namespace from `adapter`.
    pub fn new(
        adapter: Rc<dyn PersistenceAdapter>,
        surface: Rc<dyn Surface>,
        clock: Rc<dyn Clock>,
        config: TodozConfig,
    ) -> Result<Self> {
        let list = TodoList::new(adapter);
        let view = AppView::new(list.clone(), surface, clock, config.hint_delay())?;
        list.fetch()?;
        tracing::debug!(
            namespace = list.collection().namespace(),
            todos = list.len(),
            "app ready"
        );
        Ok(Self { list, view, config })
    }

    pub fn list(&self) -> &TodoList {
        &self.list
    }

    pub fn view(&self) -> &AppView {
        &self.view
    }

    pub fn config(&self) -> &TodozConfig {
        &self.config
    }

    pub fn todos(&self) -> Vec<Todo> {
        self.list.todos()
    }

    pub fn stats(&self) -> Stats {
        self.list.stats()
    }

    /// The todo at 1-based `position`.
    pub fn todo(&self, position: usize) -> Result<Todo> {
        self.resolve(&[position])
            .map(|views| views[0].todo().clone())
    }

    pub fn create(&self, text: &str) -> Result<CmdResult> {
        let mut result = CmdResult::default();
        match self.view.create_on_enter(text)? {
            Some(todo) => {
                result.add_message(CmdMessage::success(format!("Added: {}", todo.text())));
                Ok(result.with_affected(vec![todo]))
            }
            None => {
                result.add_message(CmdMessage::warning("Nothing to add"));
                Ok(result)
            }
        }
    }

    pub fn toggle(&self, positions: &[usize]) -> Result<CmdResult> {
        let views = self.resolve(positions)?;
        let mut result = CmdResult::default();
        for view in &views {
            view.toggle_done()?;
            let todo = view.todo();
            let verb = if todo.done() { "Completed" } else { "Reopened" };
            result.add_message(CmdMessage::success(format!("{}: {}", verb, todo.text())));
        }
        Ok(result.with_affected(views.iter().map(|v| v.todo().clone()).collect()))
    }

    /// Replace the text of the todo at `position`.
    pub fn edit(&self, position: usize, text: &str) -> Result<CmdResult> {
        let views = self.resolve(&[position])?;
        let view = &views[0];
        view.edit()?;
        if let Err(e) = view.commit(text) {
            view.cancel()?;
            return Err(e);
        }
        let mut result = CmdResult::default();
        result.add_message(CmdMessage::success(format!(
            "Updated {}: {}",
            position,
            view.todo().text()
        )));
        Ok(result.with_affected(vec![view.todo().clone()]))
    }

    pub fn remove(&self, positions: &[usize]) -> Result<CmdResult> {
        let views = self.resolve(positions)?;
        let mut result = CmdResult::default();
        for view in &views {
            view.clear()?;
            result.add_message(CmdMessage::success(format!(
                "Removed: {}",
                view.todo().text()
            )));
        }
        Ok(result.with_affected(views.iter().map(|v| v.todo().clone()).collect()))
    }

    pub fn clear_completed(&self) -> Result<CmdResult> {
        let done = self.list.done();
        let count = self.view.clear_completed()?;
        let mut result = CmdResult::default();
        if count == 0 {
            result.add_message(CmdMessage::info("No completed todos"));
        } else {
            let noun = if count == 1 { "todo" } else { "todos" };
            result.add_message(CmdMessage::success(format!(
                "Cleared {} completed {}",
                count, noun
            )));
        }
        Ok(result.with_affected(done))
    }

    pub fn input_changed(&self, value: &str) -> Result<()> {
        self.view.input_changed(value)
    }

    /// Run due delayed actions. Returns whether anything ran.
    pub fn tick(&self) -> Result<bool> {
        self.view.tick()
    }

    /// Map 1-based positions to item views, failing on the first bad one.
    /// Duplicates are collapsed, first occurrence wins.
    fn resolve(&self, positions: &[usize]) -> Result<Vec<TodoView>> {
        if positions.is_empty() {
            return Err(TodozError::Api("No todos selected".into()));
        }
        let views = self.view.views();
        let mut selected: Vec<TodoView> = Vec::with_capacity(positions.len());
        for &position in positions {
            let view = position
                .checked_sub(1)
                .and_then(|index| views.get(index))
                .ok_or_else(|| {
                    TodozError::Api(format!(
                        "Index {} out of range (1-{})",
                        position,
                        views.len()
                    ))
                })?;
            if !selected.iter().any(|v| v.cid() == view.cid()) {
                selected.push(view.clone());
            }
        }
        Ok(selected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::ManualClock;
    use crate::store::memory::fixtures::StoreFixture;
    use crate::store::memory::InMemoryAdapter;
    use crate::view::MemorySurface;

    fn app_with(adapter: InMemoryAdapter) -> (Rc<MemorySurface>, TodoApp) {
        let surface = Rc::new(MemorySurface::new());
        let app = TodoApp::new(
            Rc::new(adapter),
            surface.clone(),
            Rc::new(ManualClock::new()),
            TodozConfig::default(),
        )
        .unwrap();
        (surface, app)
    }

    fn texts(app: &TodoApp) -> Vec<String> {
        app.todos().iter().map(Todo::text).collect()
    }

    #[test]
    fn new_loads_existing_todos() {
        let (surface, app) = app_with(StoreFixture::new().with_todos(2).store);
        assert_eq!(texts(&app), vec!["Test todo 1", "Test todo 2"]);
        assert_eq!(surface.item_count(), 2);
        assert_eq!(surface.stats().total, 2);
    }

    #[test]
    fn create_reports_added_todo() {
        let (_, app) = app_with(InMemoryAdapter::default());
        let result = app.create("write docs").unwrap();
        assert_eq!(result.affected.len(), 1);
        assert_eq!(result.messages[0].level, MessageLevel::Success);

        let result = app.create("  ").unwrap();
        assert!(result.affected.is_empty());
        assert_eq!(result.messages[0].level, MessageLevel::Warning);
    }

    #[test]
    fn toggle_by_position() {
        let (_, app) = app_with(StoreFixture::new().with_todos(3).store);
        app.toggle(&[1, 3]).unwrap();

        let done: Vec<_> = app.list().done().iter().map(Todo::text).collect();
        assert_eq!(done, vec!["Test todo 1", "Test todo 3"]);
    }

    #[test]
    fn out_of_range_position_mutates_nothing() {
        let (_, app) = app_with(StoreFixture::new().with_todos(2).store);
        let err = app.toggle(&[1, 5]).unwrap_err();
        assert!(matches!(err, TodozError::Api(_)));
        assert!(app.list().done().is_empty());
        assert!(app.toggle(&[0]).is_err());
        assert!(app.toggle(&[]).is_err());
    }

    #[test]
    fn duplicate_positions_apply_once() {
        let (_, app) = app_with(StoreFixture::new().with_todos(1).store);
        let result = app.toggle(&[1, 1]).unwrap();
        assert_eq!(result.affected.len(), 1);
        assert!(app.todo(1).unwrap().done());
    }

    #[test]
    fn edit_updates_text() {
        let (surface, app) = app_with(StoreFixture::new().with_todo("old").store);
        app.edit(1, "new").unwrap();

        let todo = app.todo(1).unwrap();
        assert_eq!(todo.text(), "new");
        let line = surface.item(todo.cid()).unwrap();
        assert_eq!(line.text, "new");
        assert!(!line.editing);
    }

    #[test]
    fn failed_edit_leaves_view_viewing() {
        let (surface, app) = app_with(StoreFixture::new().with_todo("old").store);
        assert!(matches!(app.edit(1, " "), Err(TodozError::Validation(_))));

        let todo = app.todo(1).unwrap();
        assert_eq!(todo.text(), "old");
        assert!(!surface.item(todo.cid()).unwrap().editing);
    }

    #[test]
    fn remove_resolves_positions_before_mutating() {
        let (_, app) = app_with(StoreFixture::new().with_todos(3).store);
        app.remove(&[1, 2]).unwrap();
        assert_eq!(texts(&app), vec!["Test todo 3"]);
    }

    #[test]
    fn clear_completed_reports_count() {
        let store = StoreFixture::new()
            .with_todo("a")
            .with_done_todo("b")
            .with_todo("c")
            .store;
        let (_, app) = app_with(store);

        let result = app.clear_completed().unwrap();
        assert_eq!(result.affected.len(), 1);
        assert_eq!(texts(&app), vec!["a", "c"]);

        let result = app.clear_completed().unwrap();
        assert_eq!(result.messages[0].level, MessageLevel::Info);
    }

    #[test]
    fn persistence_error_surfaces_from_toggle() {
        let adapter = Rc::new(StoreFixture::new().with_todo("a").store);
        let app = TodoApp::new(
            adapter.clone(),
            Rc::new(MemorySurface::new()),
            Rc::new(ManualClock::new()),
            TodozConfig::default(),
        )
        .unwrap();

        adapter.set_simulate_write_error(true);
        let err = app.toggle(&[1]).unwrap_err();

        assert!(err.is_persistence());
        assert!(app.todo(1).unwrap().done());
    }
}
