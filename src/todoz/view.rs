//! # Views
//!
//! Two bindings connect the model to a rendering [`Surface`]:
//!
//! - [`TodoView`] renders one todo and owns its per-item UI mode.
//! - [`AppView`] keeps one `TodoView` per member of a [`TodoList`], renders
//!   the stats line and drives the delayed input hint.
//!
//! The surface is whatever draws things. [`MemorySurface`] keeps the latest
//! rendered state so the CLI can print it and tests can inspect it.
//!
//! ## Item Modes
//!
//! ```text
//! Viewing --edit--> Editing --commit/cancel--> Viewing
//! Viewing|Editing --destroy--> Destroyed (terminal)
//! ```
//!
//! A commit whose text fails validation stays in `Editing`.

use crate::binding::{BindingScope, Clock, Debouncer, ViewBinding};
use crate::collection::{CollectionEvent, CollectionEventKind};
use crate::error::{Result, TodozError};
use crate::events::Topic;
use crate::model::{Stats, Todo, TodoList};
use crate::record::{Record, RecordEventKind};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};
use std::time::Duration;
use uuid::Uuid;

/// Shown once the user has typed into the new-todo input and paused.
pub const HINT: &str = "Press Enter to save this task";

/// What a surface needs to draw one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemLine {
    pub text: String,
    pub done: bool,
    pub editing: bool,
}

/// Rendering seam. Items are keyed by the record's client id.
pub trait Surface {
    fn show_item(&self, key: Uuid, line: &ItemLine) -> Result<()>;
    fn remove_item(&self, key: Uuid) -> Result<()>;
    fn show_stats(&self, stats: Stats) -> Result<()>;
    fn show_hint(&self, hint: &str) -> Result<()>;
    fn hide_hint(&self) -> Result<()>;
}

/// Surface that keeps the latest rendered state in memory.
#[derive(Debug, Default)]
pub struct MemorySurface {
    items: RefCell<HashMap<Uuid, ItemLine>>,
    stats: Cell<Stats>,
    hint: RefCell<Option<String>>,
    removals: Cell<usize>,
}

impl MemorySurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn item(&self, key: Uuid) -> Option<ItemLine> {
        self.items.borrow().get(&key).cloned()
    }

    pub fn item_count(&self) -> usize {
        self.items.borrow().len()
    }

    pub fn stats(&self) -> Stats {
        self.stats.get()
    }

    pub fn hint(&self) -> Option<String> {
        self.hint.borrow().clone()
    }

    /// Number of `remove_item` calls so far.
    pub fn removals(&self) -> usize {
        self.removals.get()
    }
}

impl Surface for MemorySurface {
    fn show_item(&self, key: Uuid, line: &ItemLine) -> Result<()> {
        self.items.borrow_mut().insert(key, line.clone());
        Ok(())
    }

    fn remove_item(&self, key: Uuid) -> Result<()> {
        self.items.borrow_mut().remove(&key);
        self.removals.set(self.removals.get() + 1);
        Ok(())
    }

    fn show_stats(&self, stats: Stats) -> Result<()> {
        self.stats.set(stats);
        Ok(())
    }

    fn show_hint(&self, hint: &str) -> Result<()> {
        *self.hint.borrow_mut() = Some(hint.to_string());
        Ok(())
    }

    fn hide_hint(&self) -> Result<()> {
        *self.hint.borrow_mut() = None;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemMode {
    Viewing,
    Editing,
    Destroyed,
}

struct TodoViewInner {
    todo: Todo,
    surface: Rc<dyn Surface>,
    mode: Cell<ItemMode>,
    scope: RefCell<BindingScope>,
    disposed: Cell<bool>,
}

/// Binding for a single todo.
#[derive(Clone)]
pub struct TodoView {
    inner: Rc<TodoViewInner>,
}

impl fmt::Debug for TodoView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TodoView")
            .field("cid", &self.cid())
            .field("mode", &self.mode())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

impl TodoView {
    /// Bind to `todo` and render it.
    pub fn new(todo: Todo, surface: Rc<dyn Surface>) -> Result<Self> {
        let view = Self {
            inner: Rc::new(TodoViewInner {
                todo,
                surface,
                mode: Cell::new(ItemMode::Viewing),
                scope: RefCell::new(BindingScope::new()),
                disposed: Cell::new(false),
            }),
        };
        view.bind();
        view.render()?;
        Ok(view)
    }

    fn bind(&self) {
        let record = self.inner.todo.record();
        let mut scope = self.inner.scope.borrow_mut();

        let weak = Rc::downgrade(&self.inner);
        scope.hold(record.subscribe(Topic::Kind(RecordEventKind::Change), move |_| {
            match upgrade(&weak) {
                Some(view) => view.render(),
                None => Ok(()),
            }
        }));

        let weak = Rc::downgrade(&self.inner);
        scope.hold(record.subscribe(Topic::Kind(RecordEventKind::Destroy), move |_| {
            match upgrade(&weak) {
                Some(view) => view.detach(),
                None => Ok(()),
            }
        }));
    }

    pub fn todo(&self) -> &Todo {
        &self.inner.todo
    }

    pub fn cid(&self) -> Uuid {
        self.inner.todo.cid()
    }

    pub fn mode(&self) -> ItemMode {
        self.inner.mode.get()
    }

    pub fn line(&self) -> ItemLine {
        ItemLine {
            text: self.inner.todo.text(),
            done: self.inner.todo.done(),
            editing: self.mode() == ItemMode::Editing,
        }
    }

    pub fn edit(&self) -> Result<()> {
        match self.mode() {
            ItemMode::Destroyed => Err(TodozError::Destroyed),
            ItemMode::Editing => Ok(()),
            ItemMode::Viewing => {
                self.inner.mode.set(ItemMode::Editing);
                self.render()
            }
        }
    }

    /// Save `text` and leave editing.
    ///
    /// On a validation error the view stays in `Editing`. Persistence errors
    /// still leave editing, since the new text is already applied.
    pub fn commit(&self, text: &str) -> Result<()> {
        match self.mode() {
            ItemMode::Destroyed => return Err(TodozError::Destroyed),
            ItemMode::Viewing => return Err(TodozError::Api("item is not being edited".into())),
            ItemMode::Editing => {}
        }
        let result = self.inner.todo.set_text(text);
        if let Err(e) = &result {
            if !e.is_persistence() {
                return result;
            }
        }
        self.inner.mode.set(ItemMode::Viewing);
        self.render()?;
        result
    }

    pub fn cancel(&self) -> Result<()> {
        if self.mode() != ItemMode::Editing {
            return Ok(());
        }
        self.inner.mode.set(ItemMode::Viewing);
        self.render()
    }

    pub fn toggle_done(&self) -> Result<()> {
        self.inner.todo.toggle()
    }

    /// Destroy the underlying todo.
    pub fn clear(&self) -> Result<()> {
        self.inner.todo.destroy()
    }

    /// Take the item off the surface and release every subscription.
    fn detach(&self) -> Result<()> {
        if self.is_disposed() {
            return Ok(());
        }
        if self.inner.todo.record().is_destroyed() {
            self.inner.mode.set(ItemMode::Destroyed);
        }
        self.dispose();
        self.inner.surface.remove_item(self.cid())
    }
}

fn upgrade(weak: &Weak<TodoViewInner>) -> Option<TodoView> {
    weak.upgrade().map(|inner| TodoView { inner })
}

impl ViewBinding for TodoView {
    fn render(&self) -> Result<()> {
        if self.is_disposed() || self.mode() == ItemMode::Destroyed {
            return Ok(());
        }
        self.inner.surface.show_item(self.cid(), &self.line())
    }

    fn dispose(&self) {
        if self.inner.disposed.replace(true) {
            return;
        }
        self.inner.scope.borrow_mut().clear();
    }

    fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }
}

struct AppViewInner {
    list: TodoList,
    surface: Rc<dyn Surface>,
    views: RefCell<Vec<TodoView>>,
    scope: RefCell<BindingScope>,
    disposed: Cell<bool>,
    hint: Debouncer,
    hint_delay: Duration,
}

/// Top-level binding over a [`TodoList`].
#[derive(Clone)]
pub struct AppView {
    inner: Rc<AppViewInner>,
}

impl fmt::Debug for AppView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppView")
            .field("views", &self.inner.views.borrow().len())
            .field("hint", &self.inner.hint)
            .finish()
    }
}

impl AppView {
    /// Bind to `list`, build views for its current members and render stats.
    pub fn new(
        list: TodoList,
        surface: Rc<dyn Surface>,
        clock: Rc<dyn Clock>,
        hint_delay: Duration,
    ) -> Result<Self> {
        let view = Self {
            inner: Rc::new(AppViewInner {
                list,
                surface,
                views: RefCell::new(Vec::new()),
                scope: RefCell::new(BindingScope::new()),
                disposed: Cell::new(false),
                hint: Debouncer::new(clock),
                hint_delay,
            }),
        };
        view.bind();
        view.add_all()?;
        view.render()?;
        Ok(view)
    }

    fn bind(&self) {
        let collection = self.inner.list.collection();
        let mut scope = self.inner.scope.borrow_mut();

        let weak = Rc::downgrade(&self.inner);
        scope.hold(collection.subscribe(Topic::Kind(CollectionEventKind::Add), move |event| {
            match (weak.upgrade(), event) {
                (Some(inner), CollectionEvent::Add { record, .. }) => {
                    AppView { inner }.add_one(record)
                }
                _ => Ok(()),
            }
        }));

        let weak = Rc::downgrade(&self.inner);
        scope.hold(collection.subscribe(Topic::Kind(CollectionEventKind::Reset), move |_| {
            match weak.upgrade() {
                Some(inner) => AppView { inner }.add_all(),
                None => Ok(()),
            }
        }));

        let weak = Rc::downgrade(&self.inner);
        scope.hold(collection.subscribe(Topic::Kind(CollectionEventKind::Remove), move |event| {
            match (weak.upgrade(), event) {
                (Some(inner), CollectionEvent::Remove { record, .. }) => {
                    AppView { inner }.remove_one(record)
                }
                _ => Ok(()),
            }
        }));

        let weak = Rc::downgrade(&self.inner);
        scope.hold(collection.subscribe(Topic::All, move |_| match weak.upgrade() {
            Some(inner) => AppView { inner }.render(),
            None => Ok(()),
        }));
    }

    pub fn list(&self) -> &TodoList {
        &self.inner.list
    }

    /// Item views in list order.
    pub fn views(&self) -> Vec<TodoView> {
        let views = self.inner.views.borrow();
        self.inner
            .list
            .todos()
            .iter()
            .filter_map(|todo| views.iter().find(|v| v.cid() == todo.cid()).cloned())
            .collect()
    }

    pub fn view_for(&self, cid: Uuid) -> Option<TodoView> {
        self.inner
            .views
            .borrow()
            .iter()
            .find(|v| v.cid() == cid)
            .cloned()
    }

    /// Create a todo from the new-todo input. Blank input is ignored.
    pub fn create_on_enter(&self, text: &str) -> Result<Option<Todo>> {
        if text.trim().is_empty() {
            return Ok(None);
        }
        self.inner.hint.cancel();
        self.inner.surface.hide_hint()?;
        self.inner.list.create(text).map(Some)
    }

    pub fn clear_completed(&self) -> Result<usize> {
        self.inner.list.clear_completed()
    }

    /// The new-todo input changed: hide the hint and, for non-blank input,
    /// show it again after the configured delay.
    pub fn input_changed(&self, value: &str) -> Result<()> {
        self.inner.surface.hide_hint()?;
        self.inner.hint.cancel();
        if value.trim().is_empty() {
            return Ok(());
        }
        let surface = Rc::clone(&self.inner.surface);
        self.inner
            .hint
            .schedule(self.inner.hint_delay, move || surface.show_hint(HINT));
        Ok(())
    }

    pub fn hint_pending(&self) -> bool {
        self.inner.hint.is_pending()
    }

    /// Run the pending hint if it is due.
    pub fn tick(&self) -> Result<bool> {
        self.inner.hint.poll()
    }

    fn add_one(&self, record: &Record) -> Result<()> {
        if self.view_for(record.cid()).is_some() {
            return Ok(());
        }
        let view = TodoView::new(Todo::from(record.clone()), Rc::clone(&self.inner.surface))?;
        self.inner.views.borrow_mut().push(view);
        Ok(())
    }

    fn add_all(&self) -> Result<()> {
        let old = std::mem::take(&mut *self.inner.views.borrow_mut());
        for view in old {
            view.detach()?;
        }
        for todo in self.inner.list.todos() {
            self.add_one(todo.record())?;
        }
        Ok(())
    }

    fn remove_one(&self, record: &Record) -> Result<()> {
        let removed = {
            let mut views = self.inner.views.borrow_mut();
            let position = views.iter().position(|v| v.cid() == record.cid());
            position.map(|index| views.remove(index))
        };
        match removed {
            Some(view) => view.detach(),
            None => Ok(()),
        }
    }
}

impl ViewBinding for AppView {
    /// Refresh the stats line.
    fn render(&self) -> Result<()> {
        if self.is_disposed() {
            return Ok(());
        }
        self.inner.surface.show_stats(self.inner.list.stats())
    }

    fn dispose(&self) {
        if self.inner.disposed.replace(true) {
            return;
        }
        self.inner.hint.cancel();
        self.inner.scope.borrow_mut().clear();
        let views = std::mem::take(&mut *self.inner.views.borrow_mut());
        for view in views {
            view.dispose();
        }
    }

    fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }
}
