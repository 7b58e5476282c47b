//! # Records
//!
//! A [`Record`] is a single mutable entity: an attribute map, an optional
//! persistence id, and an [`EventBus`] broadcasting its changes. Concrete
//! record types (see [`crate::model::Todo`]) wrap a `Record` and supply a
//! [`Schema`] rather than extending it.
//!
//! ## Lifecycle
//!
//! ```text
//! new (no id) --save--> saved (id assigned) --save*--> ... --destroy--> destroyed
//!       \________________________destroy____________________________/
//! ```
//!
//! - `id` is assigned by the first successful create and never changes.
//! - `destroy` emits [`RecordEvent::Destroy`] exactly once; later calls are
//!   no-ops.
//!
//! ## Change Notification
//!
//! `set` compares every supplied key with its current value. For each key
//! whose value differs it emits `ChangeAttr` (in the order the keys were
//! supplied), then one trailing `Change`. If nothing differs nothing fires.
//!
//! ## Optimistic Saves
//!
//! `save` applies and broadcasts the change before calling the adapter. If
//! the adapter fails the error is returned but the in-memory change stays:
//! observers have already seen it, and rolling back would emit a second,
//! contradicting change.

use crate::attributes::{AttrValue, Attributes, Patch};
use crate::error::{Result, TodozError};
use crate::events::{Event, EventBus, Subscription, SubscriptionId, Topic};
use crate::store::PersistenceAdapter;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use uuid::Uuid;

/// Defaults and validation policy for a concrete record type.
pub trait Schema {
    /// Attributes merged *under* the caller's attributes at construction.
    fn defaults(&self) -> Attributes {
        Attributes::new()
    }

    /// Check a candidate attribute map before it replaces the current one.
    fn validate(&self, _candidate: &Attributes) -> Result<()> {
        Ok(())
    }
}

/// Schema accepting anything, with no defaults.
#[derive(Debug, Clone, Copy, Default)]
pub struct Schemaless;

impl Schema for Schemaless {}

/// Events emitted by a [`Record`].
#[derive(Clone)]
pub enum RecordEvent {
    /// `change:<name>`: one attribute took a new value.
    ChangeAttr {
        record: Record,
        name: String,
        value: AttrValue,
    },
    /// `change`: summary after all `ChangeAttr` events of one `set`.
    Change {
        record: Record,
        attributes: Attributes,
    },
    /// `destroy`: the record was deleted.
    Destroy { record: Record },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RecordEventKind {
    ChangeAttr(String),
    Change,
    Destroy,
}

impl RecordEvent {
    pub fn record(&self) -> &Record {
        match self {
            RecordEvent::ChangeAttr { record, .. }
            | RecordEvent::Change { record, .. }
            | RecordEvent::Destroy { record } => record,
        }
    }
}

impl Event for RecordEvent {
    type Kind = RecordEventKind;

    fn kind(&self) -> RecordEventKind {
        match self {
            RecordEvent::ChangeAttr { name, .. } => RecordEventKind::ChangeAttr(name.clone()),
            RecordEvent::Change { .. } => RecordEventKind::Change,
            RecordEvent::Destroy { .. } => RecordEventKind::Destroy,
        }
    }
}

impl fmt::Debug for RecordEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordEvent::ChangeAttr {
                record,
                name,
                value,
            } => f
                .debug_struct("ChangeAttr")
                .field("cid", &record.cid())
                .field("name", name)
                .field("value", value)
                .finish(),
            RecordEvent::Change { record, .. } => f
                .debug_struct("Change")
                .field("cid", &record.cid())
                .finish(),
            RecordEvent::Destroy { record } => f
                .debug_struct("Destroy")
                .field("cid", &record.cid())
                .finish(),
        }
    }
}

struct RecordInner {
    cid: Uuid,
    id: Cell<Option<Uuid>>,
    attributes: RefCell<Attributes>,
    previous: RefCell<Attributes>,
    changed: RefCell<Patch>,
    destroyed: Cell<bool>,
    schema: Rc<dyn Schema>,
    adapter: Rc<dyn PersistenceAdapter>,
    events: EventBus<RecordEvent>,
}

/// Shared handle to one record. Clones refer to the same record.
#[derive(Clone)]
pub struct Record {
    inner: Rc<RecordInner>,
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("cid", &self.inner.cid)
            .field("id", &self.inner.id.get())
            .field("attributes", &*self.inner.attributes.borrow())
            .field("destroyed", &self.inner.destroyed.get())
            .finish()
    }
}

impl Record {
    /// Build an unsaved record: schema defaults with `attrs` applied on top.
    pub fn new(
        attrs: Patch,
        schema: Rc<dyn Schema>,
        adapter: Rc<dyn PersistenceAdapter>,
    ) -> Self {
        let attributes = attrs.merged_over(&schema.defaults());
        Self::build(None, attributes, schema, adapter)
    }

    /// Rehydrate a record that already exists in storage.
    pub fn from_stored(
        id: Uuid,
        attributes: Attributes,
        schema: Rc<dyn Schema>,
        adapter: Rc<dyn PersistenceAdapter>,
    ) -> Self {
        let attributes = Patch::from(&attributes).merged_over(&schema.defaults());
        Self::build(Some(id), attributes, schema, adapter)
    }

    fn build(
        id: Option<Uuid>,
        attributes: Attributes,
        schema: Rc<dyn Schema>,
        adapter: Rc<dyn PersistenceAdapter>,
    ) -> Self {
        Self {
            inner: Rc::new(RecordInner {
                cid: Uuid::new_v4(),
                id: Cell::new(id),
                previous: RefCell::new(attributes.clone()),
                attributes: RefCell::new(attributes),
                changed: RefCell::new(Patch::new()),
                destroyed: Cell::new(false),
                schema,
                adapter,
                events: EventBus::new(),
            }),
        }
    }

    /// Client-side key, stable from construction. Identity of unsaved records.
    pub fn cid(&self) -> Uuid {
        self.inner.cid
    }

    /// Persistence id, absent until the first successful save.
    pub fn id(&self) -> Option<Uuid> {
        self.inner.id.get()
    }

    pub fn is_new(&self) -> bool {
        self.inner.id.get().is_none()
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.get()
    }

    /// Same record: equal ids once saved, same handle otherwise.
    pub fn same_as(&self, other: &Record) -> bool {
        match (self.id(), other.id()) {
            (Some(a), Some(b)) => a == b,
            _ => Rc::ptr_eq(&self.inner, &other.inner),
        }
    }

    pub fn get(&self, name: &str) -> Option<AttrValue> {
        self.inner.attributes.borrow().get(name).cloned()
    }

    pub fn has(&self, name: &str) -> bool {
        self.inner
            .attributes
            .borrow()
            .get(name)
            .is_some_and(|v| !v.is_null())
    }

    /// Snapshot of the current attributes.
    pub fn attributes(&self) -> Attributes {
        self.inner.attributes.borrow().clone()
    }

    /// Value of `name` before the last effective `set`.
    pub fn previous(&self, name: &str) -> Option<AttrValue> {
        self.inner.previous.borrow().get(name).cloned()
    }

    /// Keys changed by the last effective `set`, with their new values.
    pub fn changed(&self) -> Patch {
        self.inner.changed.borrow().clone()
    }

    pub fn adapter(&self) -> &Rc<dyn PersistenceAdapter> {
        &self.inner.adapter
    }

    /// Merge `patch` into the attributes and broadcast what changed.
    ///
    /// Returns whether anything changed. Fails with `Validation` (attributes
    /// untouched, nothing emitted) if the schema rejects the result.
    pub fn set(&self, patch: Patch) -> Result<bool> {
        if self.is_destroyed() {
            return Err(TodozError::Destroyed);
        }

        let changes: Vec<(String, AttrValue)> = {
            let current = self.inner.attributes.borrow();
            let candidate = patch.merged_over(&current);
            self.inner.schema.validate(&candidate)?;

            let changes: Vec<_> = patch
                .iter()
                .filter(|(name, value)| current.get(*name) != Some(*value))
                .map(|(name, value)| (name.to_string(), value.clone()))
                .collect();
            if changes.is_empty() {
                return Ok(false);
            }

            *self.inner.previous.borrow_mut() = current.clone();
            drop(current);
            *self.inner.attributes.borrow_mut() = candidate;
            changes
        };
        *self.inner.changed.borrow_mut() = changes.iter().cloned().collect();

        tracing::trace!(cid = %self.cid(), changed = changes.len(), "attributes changed");

        for (name, value) in changes {
            self.inner.events.emit(&RecordEvent::ChangeAttr {
                record: self.clone(),
                name,
                value,
            })?;
        }
        self.inner.events.emit(&RecordEvent::Change {
            record: self.clone(),
            attributes: self.attributes(),
        })?;
        Ok(true)
    }

    /// Apply `patch` (optimistically) and persist the record.
    ///
    /// Creates the record in storage if it has no id yet, updates it
    /// otherwise. Adapter errors are returned without undoing the change.
    pub fn save(&self, patch: Patch) -> Result<()> {
        self.set(patch)?;
        let attributes = self.attributes();
        let adapter = &self.inner.adapter;

        match self.id() {
            None => {
                let id = adapter.create(&attributes).inspect_err(|e| {
                    tracing::warn!(cid = %self.cid(), error = %e, "create failed");
                })?;
                self.inner.id.set(Some(id));
                tracing::debug!(namespace = adapter.namespace(), %id, "record created");
            }
            Some(id) => {
                adapter.update(&id, &attributes).inspect_err(|e| {
                    tracing::warn!(%id, error = %e, "update failed");
                })?;
                tracing::debug!(namespace = adapter.namespace(), %id, "record updated");
            }
        }
        Ok(())
    }

    /// Reload attributes from storage, broadcasting any differences.
    pub fn fetch(&self) -> Result<bool> {
        let id = self
            .id()
            .ok_or_else(|| TodozError::Api("cannot fetch a record that was never saved".into()))?;
        let stored = self.inner.adapter.read(&id)?;
        self.set(Patch::from(&stored))
    }

    /// Delete from storage, then emit `Destroy`. Idempotent.
    ///
    /// A record that was never saved skips the adapter. If the adapter fails
    /// (e.g. `NotFound`) the record is left alive and no event fires.
    pub fn destroy(&self) -> Result<()> {
        if self.is_destroyed() {
            return Ok(());
        }
        if let Some(id) = self.id() {
            self.inner.adapter.delete(&id).inspect_err(|e| {
                tracing::warn!(%id, error = %e, "delete failed");
            })?;
            tracing::debug!(namespace = self.inner.adapter.namespace(), %id, "record deleted");
        }
        self.inner.destroyed.set(true);
        self.inner
            .events
            .emit(&RecordEvent::Destroy {
                record: self.clone(),
            })
    }

    /// Save the negation of a boolean attribute (unset counts as false).
    pub fn toggle(&self, name: &str) -> Result<()> {
        let current = self.get(name).and_then(|v| v.as_bool()).unwrap_or(false);
        self.save(Patch::new().set(name, !current))
    }

    pub fn events(&self) -> &EventBus<RecordEvent> {
        &self.inner.events
    }

    pub fn on(
        &self,
        topic: Topic<RecordEventKind>,
        handler: impl Fn(&RecordEvent) -> Result<()> + 'static,
    ) -> SubscriptionId {
        self.inner.events.on(topic, handler)
    }

    #[must_use = "dropping the Subscription unsubscribes immediately"]
    pub fn subscribe(
        &self,
        topic: Topic<RecordEventKind>,
        handler: impl Fn(&RecordEvent) -> Result<()> + 'static,
    ) -> Subscription {
        self.inner.events.subscribe(topic, handler)
    }

    pub fn off(&self, id: SubscriptionId) -> bool {
        self.inner.events.off(id)
    }

    /// JSON view: the attributes plus `id` when saved.
    pub fn to_json(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        if let Some(id) = self.id() {
            map.insert("id".into(), serde_json::Value::String(id.to_string()));
        }
        for (name, value) in self.inner.attributes.borrow().iter() {
            let value = serde_json::to_value(value).unwrap_or(serde_json::Value::Null);
            map.insert(name.clone(), value);
        }
        serde_json::Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::{DONE, TEXT};
    use crate::store::memory::InMemoryAdapter;

    struct RequireText;

    impl Schema for RequireText {
        fn defaults(&self) -> Attributes {
            let mut d = Attributes::new();
            d.insert(DONE.into(), false.into());
            d
        }

        fn validate(&self, candidate: &Attributes) -> Result<()> {
            match candidate.get(TEXT) {
                Some(AttrValue::Text(t)) if !t.is_empty() => Ok(()),
                _ => Err(TodozError::Validation("text is required".into())),
            }
        }
    }

    fn setup() -> (Rc<InMemoryAdapter>, Record) {
        let adapter = Rc::new(InMemoryAdapter::new("todos"));
        let record = Record::new(
            Patch::new().set(TEXT, "first"),
            Rc::new(RequireText),
            adapter.clone(),
        );
        (adapter, record)
    }

    fn recorder(record: &Record) -> Rc<RefCell<Vec<RecordEventKind>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        record.on(Topic::All, move |e| {
            s.borrow_mut().push(e.kind());
            Ok(())
        });
        seen
    }

    #[test]
    fn defaults_are_merged_under_caller_attributes() {
        let (_, record) = setup();
        assert_eq!(record.get(DONE), Some(AttrValue::Bool(false)));
        assert_eq!(record.get(TEXT), Some(AttrValue::Text("first".into())));
        assert!(record.is_new());
    }

    #[test]
    fn set_emits_per_key_then_change() {
        let (_, record) = setup();
        let seen = recorder(&record);

        let changed = record
            .set(Patch::new().set(DONE, true).set(TEXT, "second"))
            .unwrap();

        assert!(changed);
        assert_eq!(
            *seen.borrow(),
            vec![
                RecordEventKind::ChangeAttr(DONE.into()),
                RecordEventKind::ChangeAttr(TEXT.into()),
                RecordEventKind::Change,
            ]
        );
        assert_eq!(record.previous(TEXT), Some(AttrValue::Text("first".into())));
        assert_eq!(record.changed().len(), 2);
    }

    #[test]
    fn set_with_equal_values_is_silent() {
        let (_, record) = setup();
        let seen = recorder(&record);

        let changed = record.set(Patch::new().set(TEXT, "first")).unwrap();

        assert!(!changed);
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn only_changed_keys_fire_attribute_events() {
        let (_, record) = setup();
        let seen = recorder(&record);

        record
            .set(Patch::new().set(TEXT, "first").set(DONE, true))
            .unwrap();

        assert_eq!(
            *seen.borrow(),
            vec![RecordEventKind::ChangeAttr(DONE.into()), RecordEventKind::Change]
        );
    }

    #[test]
    fn invalid_save_leaves_record_untouched() {
        let (adapter, record) = setup();
        let seen = recorder(&record);

        let err = record.save(Patch::new().set(TEXT, "")).unwrap_err();

        assert!(matches!(err, TodozError::Validation(_)));
        assert_eq!(record.get(TEXT), Some(AttrValue::Text("first".into())));
        assert!(seen.borrow().is_empty());
        assert!(adapter.is_empty());
    }

    #[test]
    fn first_save_assigns_id_once() {
        let (adapter, record) = setup();
        record.save(Patch::new()).unwrap();
        let id = record.id().unwrap();
        assert!(adapter.contains(&id));

        record.save(Patch::new().set(TEXT, "again")).unwrap();
        assert_eq!(record.id(), Some(id));
        assert_eq!(
            adapter.read(&id).unwrap()[TEXT],
            AttrValue::Text("again".into())
        );
    }

    #[test]
    fn failed_persistence_keeps_optimistic_change() {
        let (adapter, record) = setup();
        record.save(Patch::new()).unwrap();
        let seen = recorder(&record);

        adapter.set_simulate_write_error(true);
        let err = record.save(Patch::new().set(TEXT, "unsynced")).unwrap_err();

        assert!(err.is_persistence());
        assert_eq!(record.get(TEXT), Some(AttrValue::Text("unsynced".into())));
        assert!(seen.borrow().contains(&RecordEventKind::Change));
    }

    #[test]
    fn destroy_fires_once() {
        let (adapter, record) = setup();
        record.save(Patch::new()).unwrap();
        let seen = recorder(&record);

        record.destroy().unwrap();
        record.destroy().unwrap();

        assert_eq!(*seen.borrow(), vec![RecordEventKind::Destroy]);
        assert!(adapter.is_empty());
        assert!(record.is_destroyed());
    }

    #[test]
    fn destroy_of_unsaved_record_skips_adapter() {
        let (adapter, record) = setup();
        adapter.set_simulate_write_error(true);
        record.destroy().unwrap();
        assert!(record.is_destroyed());
    }

    #[test]
    fn destroy_not_found_is_reported_and_record_survives() {
        let (adapter, record) = setup();
        record.save(Patch::new()).unwrap();
        adapter.delete(&record.id().unwrap()).unwrap();
        let seen = recorder(&record);

        let err = record.destroy().unwrap_err();

        assert!(matches!(err, TodozError::NotFound(_)));
        assert!(!record.is_destroyed());
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn mutations_after_destroy_fail() {
        let (_, record) = setup();
        record.destroy().unwrap();
        assert!(matches!(
            record.set(Patch::new().set(TEXT, "zombie")),
            Err(TodozError::Destroyed)
        ));
        assert!(matches!(record.toggle(DONE), Err(TodozError::Destroyed)));
    }

    #[test]
    fn toggle_twice_restores_attributes() {
        let (_, record) = setup();
        record.save(Patch::new()).unwrap();
        let before = record.attributes();

        record.toggle(DONE).unwrap();
        assert_eq!(record.get(DONE), Some(AttrValue::Bool(true)));
        record.toggle(DONE).unwrap();

        assert_eq!(record.attributes(), before);
    }

    #[test]
    fn fetch_pulls_stored_changes() {
        let (adapter, record) = setup();
        record.save(Patch::new()).unwrap();
        let id = record.id().unwrap();

        let mut stored = adapter.read(&id).unwrap();
        stored.insert(TEXT.into(), "from elsewhere".into());
        adapter.update(&id, &stored).unwrap();

        assert!(record.fetch().unwrap());
        assert_eq!(
            record.get(TEXT),
            Some(AttrValue::Text("from elsewhere".into()))
        );
    }

    #[test]
    fn handler_error_propagates_from_save() {
        let (adapter, record) = setup();
        record.on(Topic::Kind(RecordEventKind::Change), |_| {
            Err(TodozError::Api("render failed".into()))
        });

        let err = record.save(Patch::new().set(TEXT, "x")).unwrap_err();

        assert!(matches!(err, TodozError::Api(_)));
        assert!(adapter.is_empty());
    }

    #[test]
    fn same_as_uses_id_once_saved() {
        let (adapter, record) = setup();
        record.save(Patch::new()).unwrap();
        let twin = Record::from_stored(
            record.id().unwrap(),
            record.attributes(),
            Rc::new(Schemaless),
            adapter,
        );
        assert!(record.same_as(&twin));
        assert_ne!(record.cid(), twin.cid());
    }

    #[test]
    fn to_json_includes_id_after_save() {
        let (_, record) = setup();
        assert!(record.to_json().get("id").is_none());
        record.save(Patch::new()).unwrap();
        let json = record.to_json();
        assert_eq!(json["text"], "first");
        assert!(json["id"].is_string());
    }
}
