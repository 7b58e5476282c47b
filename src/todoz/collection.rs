//! # Observable Collections
//!
//! A [`Collection`] is an ordered, id-deduplicated set of [`Record`]s backed
//! by one persistence namespace.
//!
//! ## Ordering
//!
//! Iteration order is always the order given by the comparator key, ties
//! broken by insertion order. Adding a record places it by key; every relayed
//! `change:<name>` and `change` from a member re-sorts in place (silently), so
//! listeners of a member event already see the new order.
//!
//! ## Membership Events
//!
//! - `add(record)` emits [`CollectionEvent::Add`] with the insertion index.
//! - `remove(record)` emits [`CollectionEvent::Remove`] with the prior index.
//! - `reset`/`fetch` replace all members and emit a single
//!   [`CollectionEvent::Reset`]; no per-item `Add`/`Remove` fires.
//!
//! ## Member Relay
//!
//! The collection holds one wildcard subscription on every member. It removes
//! a member when that member emits `destroy`, and re-emits every member event
//! as [`CollectionEvent::Member`], so a single listener on the collection sees
//! all state changes. The subscription is dropped when the member leaves.
//!
//! Handlers hold only a `Weak` reference back to the collection, so members
//! never keep a dropped collection alive.

use crate::attributes::{AttrValue, Attributes, Patch, DONE, ORDER};
use crate::error::{Result, TodozError};
use crate::events::{Event, EventBus, Subscription, SubscriptionId, Topic};
use crate::record::{Record, RecordEvent, RecordEventKind, Schema};
use crate::store::PersistenceAdapter;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use uuid::Uuid;

/// Produces the orderable key of a record.
pub type Comparator = Rc<dyn Fn(&Record) -> AttrValue>;

/// Comparator keyed on one attribute (missing attributes sort first).
pub fn by_attribute(name: &'static str) -> Comparator {
    Rc::new(move |record: &Record| record.get(name).unwrap_or(AttrValue::Null))
}

/// Events emitted by a [`Collection`].
#[derive(Clone)]
pub enum CollectionEvent {
    Add {
        record: Record,
        collection: Collection,
        index: usize,
    },
    Remove {
        record: Record,
        collection: Collection,
        index: usize,
    },
    Reset {
        collection: Collection,
    },
    /// A member's own event, relayed.
    Member { record: Record, event: RecordEvent },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CollectionEventKind {
    Add,
    Remove,
    Reset,
    Member(RecordEventKind),
}

impl Event for CollectionEvent {
    type Kind = CollectionEventKind;

    fn kind(&self) -> CollectionEventKind {
        match self {
            CollectionEvent::Add { .. } => CollectionEventKind::Add,
            CollectionEvent::Remove { .. } => CollectionEventKind::Remove,
            CollectionEvent::Reset { .. } => CollectionEventKind::Reset,
            CollectionEvent::Member { event, .. } => CollectionEventKind::Member(event.kind()),
        }
    }
}

impl fmt::Debug for CollectionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollectionEvent::Add { record, index, .. } => f
                .debug_struct("Add")
                .field("cid", &record.cid())
                .field("index", index)
                .finish(),
            CollectionEvent::Remove { record, index, .. } => f
                .debug_struct("Remove")
                .field("cid", &record.cid())
                .field("index", index)
                .finish(),
            CollectionEvent::Reset { .. } => f.write_str("Reset"),
            CollectionEvent::Member { event, .. } => {
                f.debug_tuple("Member").field(event).finish()
            }
        }
    }
}

struct Member {
    record: Record,
    seq: u64,
    relay: SubscriptionId,
}

struct CollectionInner {
    adapter: Rc<dyn PersistenceAdapter>,
    schema: Rc<dyn Schema>,
    comparator: Comparator,
    members: RefCell<Vec<Member>>,
    next_seq: Cell<u64>,
    events: EventBus<CollectionEvent>,
}

impl Drop for CollectionInner {
    fn drop(&mut self) {
        for member in self.members.get_mut().drain(..) {
            member.record.off(member.relay);
        }
    }
}

/// Shared handle to an ordered record set. Clones refer to the same set.
#[derive(Clone)]
pub struct Collection {
    inner: Rc<CollectionInner>,
}

impl fmt::Debug for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection")
            .field("namespace", &self.namespace())
            .field("len", &self.len())
            .finish()
    }
}

impl Collection {
    pub fn new(
        adapter: Rc<dyn PersistenceAdapter>,
        schema: Rc<dyn Schema>,
        comparator: Comparator,
    ) -> Self {
        Self {
            inner: Rc::new(CollectionInner {
                adapter,
                schema,
                comparator,
                members: RefCell::new(Vec::new()),
                next_seq: Cell::new(0),
                events: EventBus::new(),
            }),
        }
    }

    pub fn namespace(&self) -> &str {
        self.inner.adapter.namespace()
    }

    pub fn adapter(&self) -> &Rc<dyn PersistenceAdapter> {
        &self.inner.adapter
    }

    pub fn same_as(&self, other: &Collection) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    // --- Events ---

    pub fn events(&self) -> &EventBus<CollectionEvent> {
        &self.inner.events
    }

    pub fn on(
        &self,
        topic: Topic<CollectionEventKind>,
        handler: impl Fn(&CollectionEvent) -> Result<()> + 'static,
    ) -> SubscriptionId {
        self.inner.events.on(topic, handler)
    }

    #[must_use = "dropping the Subscription unsubscribes immediately"]
    pub fn subscribe(
        &self,
        topic: Topic<CollectionEventKind>,
        handler: impl Fn(&CollectionEvent) -> Result<()> + 'static,
    ) -> Subscription {
        self.inner.events.subscribe(topic, handler)
    }

    pub fn off(&self, id: SubscriptionId) -> bool {
        self.inner.events.off(id)
    }

    // --- Queries ---

    pub fn len(&self) -> usize {
        self.inner.members.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.members.borrow().is_empty()
    }

    /// Members in iteration order.
    pub fn records(&self) -> Vec<Record> {
        self.inner
            .members
            .borrow()
            .iter()
            .map(|m| m.record.clone())
            .collect()
    }

    pub fn at(&self, index: usize) -> Option<Record> {
        self.inner
            .members
            .borrow()
            .get(index)
            .map(|m| m.record.clone())
    }

    pub fn first(&self) -> Option<Record> {
        self.at(0)
    }

    pub fn last(&self) -> Option<Record> {
        self.inner
            .members
            .borrow()
            .last()
            .map(|m| m.record.clone())
    }

    pub fn get(&self, id: &Uuid) -> Option<Record> {
        self.find(|r| r.id().as_ref() == Some(id))
    }

    pub fn get_by_cid(&self, cid: &Uuid) -> Option<Record> {
        self.find(|r| r.cid() == *cid)
    }

    pub fn index_of(&self, record: &Record) -> Option<usize> {
        self.inner
            .members
            .borrow()
            .iter()
            .position(|m| m.record.same_as(record))
    }

    pub fn contains(&self, record: &Record) -> bool {
        self.index_of(record).is_some()
    }

    pub fn find(&self, predicate: impl Fn(&Record) -> bool) -> Option<Record> {
        self.inner
            .members
            .borrow()
            .iter()
            .find(|m| predicate(&m.record))
            .map(|m| m.record.clone())
    }

    pub fn filter(&self, predicate: impl Fn(&Record) -> bool) -> Vec<Record> {
        self.inner
            .members
            .borrow()
            .iter()
            .filter(|m| predicate(&m.record))
            .map(|m| m.record.clone())
            .collect()
    }

    /// Members whose `done` flag is set.
    pub fn done(&self) -> Vec<Record> {
        self.filter(is_done)
    }

    /// Members whose `done` flag is not set. Together with [`Collection::done`]
    /// this partitions the collection.
    pub fn remaining(&self) -> Vec<Record> {
        self.filter(|r| !is_done(r))
    }

    /// `order` for a new member: one past the last member's, or 1.
    /// Saturates at `i64::MAX`.
    pub fn next_order(&self) -> i64 {
        match self.last() {
            None => 1,
            Some(last) => last
                .get(ORDER)
                .and_then(|v| v.as_int())
                .unwrap_or(0)
                .saturating_add(1),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Array(self.records().iter().map(Record::to_json).collect())
    }

    // --- Mutations ---

    /// Build a record bound to this collection's schema and adapter, without
    /// adding or saving it.
    pub fn build(&self, attrs: Patch) -> Record {
        Record::new(
            attrs,
            Rc::clone(&self.inner.schema),
            Rc::clone(&self.inner.adapter),
        )
    }

    /// Build, save, then add a record. `order` defaults to [`Collection::next_order`].
    ///
    /// Nothing is added if the save fails.
    pub fn create(&self, mut attrs: Patch) -> Result<Record> {
        if !attrs.contains(ORDER) {
            attrs.insert(ORDER, self.next_order());
        }
        let record = self.build(attrs);
        record.save(Patch::new())?;
        self.add(record.clone())?;
        Ok(record)
    }

    /// Insert `record` in comparator order and emit `Add`.
    ///
    /// Returns `false` without emitting anything if the record is already a
    /// member.
    pub fn add(&self, record: Record) -> Result<bool> {
        if record.is_destroyed() {
            return Err(TodozError::Destroyed);
        }
        if self.contains(&record) {
            tracing::trace!(cid = %record.cid(), "add ignored: already a member");
            return Ok(false);
        }

        let relay = self.relay(&record);
        let seq = self.bump_seq();
        let index = {
            let mut members = self.inner.members.borrow_mut();
            members.push(Member {
                record: record.clone(),
                seq,
                relay,
            });
            self.sort_members(&mut members);
            let index = members.iter().position(|m| m.seq == seq).unwrap_or(0);
            index
        };

        tracing::debug!(namespace = self.namespace(), cid = %record.cid(), index, "member added");
        self.inner.events.emit(&CollectionEvent::Add {
            record,
            collection: self.clone(),
            index,
        })?;
        Ok(true)
    }

    /// Remove `record` and emit `Remove`. Returns `false` if it was absent.
    pub fn remove(&self, record: &Record) -> Result<bool> {
        let (index, member) = {
            let mut members = self.inner.members.borrow_mut();
            let Some(index) = members.iter().position(|m| m.record.same_as(record)) else {
                return Ok(false);
            };
            let member = members.remove(index);
            (index, member)
        };
        member.record.off(member.relay);

        tracing::debug!(namespace = self.namespace(), cid = %member.record.cid(), index, "member removed");
        self.inner.events.emit(&CollectionEvent::Remove {
            record: member.record,
            collection: self.clone(),
            index,
        })?;
        Ok(true)
    }

    /// Replace all members and emit a single `Reset`.
    ///
    /// Duplicates and destroyed records in `records` are skipped.
    pub fn reset(&self, records: Vec<Record>) -> Result<()> {
        let old = std::mem::take(&mut *self.inner.members.borrow_mut());
        for member in old {
            member.record.off(member.relay);
        }

        let mut fresh: Vec<Member> = Vec::with_capacity(records.len());
        for record in records {
            if record.is_destroyed() || fresh.iter().any(|m| m.record.same_as(&record)) {
                continue;
            }
            let relay = self.relay(&record);
            let seq = self.bump_seq();
            fresh.push(Member { record, seq, relay });
        }
        self.sort_members(&mut fresh);
        let count = fresh.len();
        *self.inner.members.borrow_mut() = fresh;

        tracing::debug!(namespace = self.namespace(), count, "collection reset");
        self.inner.events.emit(&CollectionEvent::Reset {
            collection: self.clone(),
        })
    }

    /// Load every record of the namespace and [`reset`](Collection::reset) to
    /// them. Membership is untouched if the adapter fails.
    pub fn fetch(&self) -> Result<()> {
        let stored = self.inner.adapter.list().inspect_err(|e| {
            tracing::warn!(namespace = self.namespace(), error = %e, "fetch failed");
        })?;
        let records = stored
            .into_iter()
            .map(|(id, attributes)| self.rehydrate(id, attributes))
            .collect();
        self.reset(records)
    }

    /// Destroy every `done` member. Stops at, and returns, the first failure.
    pub fn clear_completed(&self) -> Result<usize> {
        let done = self.done();
        let count = done.len();
        for record in done {
            record.destroy()?;
        }
        Ok(count)
    }

    /// Re-sort members in place. No event is emitted.
    pub fn sort(&self) {
        let mut members = self.inner.members.borrow_mut();
        self.sort_members(&mut members);
    }

    fn rehydrate(&self, id: Uuid, attributes: Attributes) -> Record {
        Record::from_stored(
            id,
            attributes,
            Rc::clone(&self.inner.schema),
            Rc::clone(&self.inner.adapter),
        )
    }

    fn bump_seq(&self) -> u64 {
        let seq = self.inner.next_seq.get();
        self.inner.next_seq.set(seq + 1);
        seq
    }

    fn sort_members(&self, members: &mut [Member]) {
        let comparator = &self.inner.comparator;
        members.sort_by_cached_key(|m| (comparator(&m.record), m.seq));
    }

    fn relay(&self, record: &Record) -> SubscriptionId {
        let weak: Weak<CollectionInner> = Rc::downgrade(&self.inner);
        record.on(Topic::All, move |event| {
            let Some(inner) = weak.upgrade() else {
                return Ok(());
            };
            let collection = Collection { inner };
            match event {
                RecordEvent::Destroy { record } => {
                    collection.remove(record)?;
                }
                RecordEvent::ChangeAttr { .. } | RecordEvent::Change { .. } => collection.sort(),
            }
            collection.inner.events.emit(&CollectionEvent::Member {
                record: event.record().clone(),
                event: event.clone(),
            })
        })
    }
}

fn is_done(record: &Record) -> bool {
    record
        .get(DONE)
        .and_then(|v| v.as_bool())
        .unwrap_or(false)
}
