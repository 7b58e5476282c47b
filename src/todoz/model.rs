//! # Todo Model
//!
//! The concrete record type of the application. A [`Todo`] is a thin typed
//! view over a [`Record`] governed by [`TodoSchema`]; a [`TodoList`] is a
//! [`Collection`] of them ordered by their `order` attribute.
//!
//! | attribute | type   | default | rule                       |
//! |-----------|--------|---------|----------------------------|
//! | `text`    | string |         | required, not blank        |
//! | `done`    | bool   | `false` |                            |
//! | `order`   | int    | next    | assigned by [`TodoList`]   |

use crate::attributes::{AttrValue, Attributes, Patch, DONE, ORDER, TEXT};
use crate::collection::{by_attribute, Collection};
use crate::error::{Result, TodozError};
use crate::record::{Record, Schema};
use crate::store::PersistenceAdapter;
use serde::Serialize;
use std::rc::Rc;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default)]
pub struct TodoSchema;

impl Schema for TodoSchema {
    fn defaults(&self) -> Attributes {
        let mut defaults = Attributes::new();
        defaults.insert(DONE.to_string(), AttrValue::Bool(false));
        defaults
    }

    fn validate(&self, candidate: &Attributes) -> Result<()> {
        match candidate.get(TEXT) {
            Some(AttrValue::Text(text)) if !text.trim().is_empty() => {}
            Some(AttrValue::Text(_)) | None | Some(AttrValue::Null) => {
                return Err(TodozError::Validation("todo text cannot be empty".into()))
            }
            Some(other) => {
                return Err(TodozError::Validation(format!(
                    "text must be a string, got {}",
                    other.type_name()
                )))
            }
        }
        expect_type(candidate, DONE, "bool", |v| matches!(v, AttrValue::Bool(_)))?;
        expect_type(candidate, ORDER, "int", |v| matches!(v, AttrValue::Int(_)))?;
        Ok(())
    }
}

fn expect_type(
    candidate: &Attributes,
    name: &str,
    expected: &str,
    ok: impl Fn(&AttrValue) -> bool,
) -> Result<()> {
    match candidate.get(name) {
        Some(value) if !value.is_null() && !ok(value) => Err(TodozError::Validation(format!(
            "{} must be {}, got {}",
            name,
            expected,
            value.type_name()
        ))),
        _ => Ok(()),
    }
}

/// Typed handle over a todo record.
#[derive(Debug, Clone)]
pub struct Todo(Record);

impl Todo {
    pub fn new(record: Record) -> Self {
        Self(record)
    }

    pub fn record(&self) -> &Record {
        &self.0
    }

    pub fn cid(&self) -> Uuid {
        self.0.cid()
    }

    pub fn id(&self) -> Option<Uuid> {
        self.0.id()
    }

    pub fn text(&self) -> String {
        self.0
            .get(TEXT)
            .and_then(|v| v.as_text().map(str::to_string))
            .unwrap_or_default()
    }

    pub fn done(&self) -> bool {
        self.0.get(DONE).and_then(|v| v.as_bool()).unwrap_or(false)
    }

    pub fn order(&self) -> Option<i64> {
        self.0.get(ORDER).and_then(|v| v.as_int())
    }

    pub fn toggle(&self) -> Result<()> {
        self.0.toggle(DONE)
    }

    /// Save new text. The text is trimmed first.
    pub fn set_text(&self, text: &str) -> Result<()> {
        self.0.save(Patch::new().set(TEXT, text.trim()))
    }

    pub fn destroy(&self) -> Result<()> {
        self.0.destroy()
    }
}

impl From<Record> for Todo {
    fn from(record: Record) -> Self {
        Self(record)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub total: usize,
    pub done: usize,
    pub remaining: usize,
}

/// The ordered list of todos in one namespace.
#[derive(Debug, Clone)]
pub struct TodoList {
    collection: Collection,
}

impl TodoList {
    pub fn new(adapter: Rc<dyn PersistenceAdapter>) -> Self {
        Self {
            collection: Collection::new(adapter, Rc::new(TodoSchema), by_attribute(ORDER)),
        }
    }

    pub fn collection(&self) -> &Collection {
        &self.collection
    }

    /// Create and persist a todo at the end of the list.
    pub fn create(&self, text: &str) -> Result<Todo> {
        self.collection
            .create(Patch::new().set(TEXT, text.trim()))
            .map(Todo)
    }

    pub fn fetch(&self) -> Result<()> {
        self.collection.fetch()
    }

    pub fn len(&self) -> usize {
        self.collection.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collection.is_empty()
    }

    pub fn todos(&self) -> Vec<Todo> {
        wrap(self.collection.records())
    }

    pub fn at(&self, index: usize) -> Option<Todo> {
        self.collection.at(index).map(Todo)
    }

    pub fn done(&self) -> Vec<Todo> {
        wrap(self.collection.done())
    }

    pub fn remaining(&self) -> Vec<Todo> {
        wrap(self.collection.remaining())
    }

    pub fn stats(&self) -> Stats {
        let total = self.collection.len();
        let done = self.collection.done().len();
        Stats {
            total,
            done,
            remaining: total - done,
        }
    }

    pub fn clear_completed(&self) -> Result<usize> {
        self.collection.clear_completed()
    }
}

fn wrap(records: Vec<Record>) -> Vec<Todo> {
    records.into_iter().map(Todo).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::fixtures::StoreFixture;
    use crate::store::memory::InMemoryAdapter;

    fn list() -> TodoList {
        TodoList::new(Rc::new(InMemoryAdapter::new("todos")))
    }

    fn attrs(pairs: &[(&str, AttrValue)]) -> Attributes {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn schema_rejects_blank_text() {
        let schema = TodoSchema;
        for text in ["", "   "] {
            let candidate = attrs(&[(TEXT, text.into())]);
            assert!(matches!(
                schema.validate(&candidate),
                Err(TodozError::Validation(_))
            ));
        }
        assert!(schema.validate(&Attributes::new()).is_err());
    }

    #[test]
    fn schema_checks_types() {
        let schema = TodoSchema;
        let bad_done = attrs(&[(TEXT, "x".into()), (DONE, 1.into())]);
        let bad_order = attrs(&[(TEXT, "x".into()), (ORDER, "1".into())]);
        let bad_text = attrs(&[(TEXT, true.into())]);
        assert!(schema.validate(&bad_done).is_err());
        assert!(schema.validate(&bad_order).is_err());
        assert!(schema.validate(&bad_text).is_err());

        let good = attrs(&[(TEXT, "x".into()), (DONE, false.into()), (ORDER, 3.into())]);
        assert!(schema.validate(&good).is_ok());
    }

    #[test]
    fn create_trims_and_defaults() {
        let list = list();
        let todo = list.create("  buy milk ").unwrap();
        assert_eq!(todo.text(), "buy milk");
        assert!(!todo.done());
        assert_eq!(todo.order(), Some(1));
        assert!(todo.id().is_some());
    }

    #[test]
    fn create_empty_fails_without_adding() {
        let list = list();
        assert!(matches!(list.create("  "), Err(TodozError::Validation(_))));
        assert!(list.is_empty());
    }

    #[test]
    fn stats_count_done_and_remaining() {
        let list = list();
        list.create("a").unwrap();
        list.create("b").unwrap().toggle().unwrap();
        list.create("c").unwrap();

        assert_eq!(
            list.stats(),
            Stats {
                total: 3,
                done: 1,
                remaining: 2
            }
        );
        let done: Vec<_> = list.done().iter().map(Todo::text).collect();
        assert_eq!(done, vec!["b"]);
    }

    #[test]
    fn set_text_rejects_blank_and_keeps_old() {
        let list = list();
        let todo = list.create("keep").unwrap();
        assert!(todo.set_text(" ").is_err());
        assert_eq!(todo.text(), "keep");
    }

    #[test]
    fn fetch_loads_fixture_in_order() {
        let adapter = StoreFixture::new()
            .with_todo("one")
            .with_done_todo("two")
            .store;
        let list = TodoList::new(Rc::new(adapter));
        list.fetch().unwrap();

        let texts: Vec<_> = list.todos().iter().map(Todo::text).collect();
        assert_eq!(texts, vec!["one", "two"]);
        assert_eq!(list.stats().done, 1);
    }
}
