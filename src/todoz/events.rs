//! # Event Dispatch
//!
//! [`EventBus`] is the leaf of the runtime: records and collections each own
//! one and every view binding listens through it.
//!
//! Events are closed enums rather than strings. An event type implements
//! [`Event`], which maps each value to a [`Event::Kind`] used for
//! subscription matching. Subscribers pick a [`Topic`]: either one kind, or
//! [`Topic::All`], the wildcard that sees every emission.
//!
//! ## Dispatch Rules
//!
//! 1. `emit` is synchronous; all handlers have run when it returns.
//! 2. Handlers for the specific kind run first, in subscription order, then
//!    the `All` handlers, in subscription order.
//! 3. The handler list is snapshotted when `emit` starts. A handler added
//!    during dispatch is not called for that emission; a handler removed
//!    during dispatch is skipped if it has not been reached yet.
//! 4. No borrow of the bus is held while a handler runs, so handlers may
//!    subscribe, unsubscribe or emit re-entrantly.
//! 5. A handler error stops the emission and is returned from `emit`. The
//!    bus never swallows errors.
//!
//! ## Unsubscribing
//!
//! [`EventBus::on`] returns a plain [`SubscriptionId`] to pass to
//! [`EventBus::off`]. [`EventBus::subscribe`] instead returns a
//! [`Subscription`] guard that unsubscribes when dropped, which is what view
//! bindings collect in a [`crate::binding::BindingScope`].

use crate::error::Result;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

/// A closed set of event variants dispatched through an [`EventBus`].
pub trait Event: Clone + 'static {
    type Kind: Clone + Eq + fmt::Debug + 'static;

    fn kind(&self) -> Self::Kind;
}

/// What a handler subscribes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Topic<K> {
    /// Emissions of one event kind.
    Kind(K),
    /// Every emission, after the kind-specific handlers.
    All,
}

/// Handle identifying one subscription on one bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

type Handler<E> = dyn Fn(&E) -> Result<()>;

struct Listener<E: Event> {
    id: SubscriptionId,
    topic: Topic<E::Kind>,
    handler: Rc<Handler<E>>,
    active: Cell<bool>,
}

struct BusInner<E: Event> {
    next_id: u64,
    listeners: Vec<Rc<Listener<E>>>,
}

impl<E: Event> BusInner<E> {
    fn remove(&mut self, id: SubscriptionId) -> bool {
        match self.listeners.iter().position(|l| l.id == id) {
            Some(pos) => {
                let listener = self.listeners.remove(pos);
                listener.active.set(false);
                true
            }
            None => false,
        }
    }
}

/// Synchronous named-event dispatcher.
///
/// Cloning an `EventBus` yields another handle to the same listener list.
pub struct EventBus<E: Event> {
    inner: Rc<RefCell<BusInner<E>>>,
}

impl<E: Event> Clone for EventBus<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<E: Event> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Event> fmt::Debug for EventBus<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl<E: Event> EventBus<E> {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(BusInner {
                next_id: 0,
                listeners: Vec::new(),
            })),
        }
    }

    /// Register `handler` for `topic`.
    pub fn on(
        &self,
        topic: Topic<E::Kind>,
        handler: impl Fn(&E) -> Result<()> + 'static,
    ) -> SubscriptionId {
        let mut inner = self.inner.borrow_mut();
        let id = SubscriptionId(inner.next_id);
        inner.next_id += 1;
        inner.listeners.push(Rc::new(Listener {
            id,
            topic,
            handler: Rc::new(handler),
            active: Cell::new(true),
        }));
        id
    }

    /// Register `handler` for every emission.
    pub fn on_all(&self, handler: impl Fn(&E) -> Result<()> + 'static) -> SubscriptionId {
        self.on(Topic::All, handler)
    }

    /// Like [`EventBus::on`], but the returned guard unsubscribes on drop.
    #[must_use = "dropping the Subscription unsubscribes immediately"]
    pub fn subscribe(
        &self,
        topic: Topic<E::Kind>,
        handler: impl Fn(&E) -> Result<()> + 'static,
    ) -> Subscription {
        let id = self.on(topic, handler);
        let weak: Weak<RefCell<BusInner<E>>> = Rc::downgrade(&self.inner);
        Subscription {
            release: Some(Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.borrow_mut().remove(id);
                }
            })),
        }
    }

    /// Remove a subscription. Returns false if it was already gone.
    pub fn off(&self, id: SubscriptionId) -> bool {
        self.inner.borrow_mut().remove(id)
    }

    /// Dispatch `event` to the handlers registered at the time of the call.
    pub fn emit(&self, event: &E) -> Result<()> {
        let kind = event.kind();
        let snapshot: Vec<Rc<Listener<E>>> = {
            let inner = self.inner.borrow();
            let specific = inner
                .listeners
                .iter()
                .filter(|l| matches!(&l.topic, Topic::Kind(k) if *k == kind));
            let wildcard = inner
                .listeners
                .iter()
                .filter(|l| matches!(l.topic, Topic::All));
            specific.chain(wildcard).cloned().collect()
        };

        for listener in snapshot {
            if !listener.active.get() {
                continue;
            }
            let handler = Rc::clone(&listener.handler);
            handler(event)?;
        }
        Ok(())
    }

    pub fn listener_count(&self) -> usize {
        self.inner.borrow().listeners.len()
    }

    pub fn has_listeners(&self) -> bool {
        self.listener_count() > 0
    }
}

/// RAII guard for a subscription; dropping it unsubscribes.
///
/// Outliving the bus is fine: release becomes a no-op.
pub struct Subscription {
    release: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    /// Unsubscribe now rather than at drop.
    pub fn release(mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("live", &self.release.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TodozError;

    #[derive(Debug, Clone, PartialEq)]
    enum Ping {
        A(u32),
        B(u32),
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum PingKind {
        A,
        B,
    }

    impl Event for Ping {
        type Kind = PingKind;

        fn kind(&self) -> PingKind {
            match self {
                Ping::A(_) => PingKind::A,
                Ping::B(_) => PingKind::B,
            }
        }
    }

    fn log() -> Rc<RefCell<Vec<String>>> {
        Rc::new(RefCell::new(Vec::new()))
    }

    #[test]
    fn handlers_run_in_subscription_order_then_wildcard() {
        let bus = EventBus::<Ping>::new();
        let seen = log();

        let s = Rc::clone(&seen);
        bus.on_all(move |_| {
            s.borrow_mut().push("all".into());
            Ok(())
        });
        let s = Rc::clone(&seen);
        bus.on(Topic::Kind(PingKind::A), move |_| {
            s.borrow_mut().push("a1".into());
            Ok(())
        });
        let s = Rc::clone(&seen);
        bus.on(Topic::Kind(PingKind::A), move |_| {
            s.borrow_mut().push("a2".into());
            Ok(())
        });
        let s = Rc::clone(&seen);
        bus.on(Topic::Kind(PingKind::B), move |_| {
            s.borrow_mut().push("b".into());
            Ok(())
        });

        bus.emit(&Ping::A(1)).unwrap();
        assert_eq!(*seen.borrow(), vec!["a1", "a2", "all"]);
    }

    #[test]
    fn wildcard_receives_event_with_its_kind() {
        let bus = EventBus::<Ping>::new();
        let kinds = Rc::new(RefCell::new(Vec::new()));
        let k = Rc::clone(&kinds);
        bus.on_all(move |e| {
            k.borrow_mut().push(e.kind());
            Ok(())
        });

        bus.emit(&Ping::A(1)).unwrap();
        bus.emit(&Ping::B(2)).unwrap();
        assert_eq!(*kinds.borrow(), vec![PingKind::A, PingKind::B]);
    }

    #[test]
    fn subscription_added_during_dispatch_waits_for_next_emit() {
        let bus = EventBus::<Ping>::new();
        let count = Rc::new(Cell::new(0));

        let inner_bus = bus.clone();
        let c = Rc::clone(&count);
        bus.on(Topic::Kind(PingKind::A), move |_| {
            let c2 = Rc::clone(&c);
            inner_bus.on(Topic::Kind(PingKind::A), move |_| {
                c2.set(c2.get() + 1);
                Ok(())
            });
            Ok(())
        });

        bus.emit(&Ping::A(1)).unwrap();
        assert_eq!(count.get(), 0);

        bus.emit(&Ping::A(2)).unwrap();
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn subscription_removed_during_dispatch_is_skipped() {
        let bus = EventBus::<Ping>::new();
        let reached = Rc::new(Cell::new(false));
        let victim = Rc::new(Cell::new(None));

        let inner_bus = bus.clone();
        let v = Rc::clone(&victim);
        bus.on(Topic::Kind(PingKind::A), move |_| {
            if let Some(id) = v.get() {
                inner_bus.off(id);
            }
            Ok(())
        });
        let r = Rc::clone(&reached);
        let id = bus.on(Topic::Kind(PingKind::A), move |_| {
            r.set(true);
            Ok(())
        });
        victim.set(Some(id));

        bus.emit(&Ping::A(1)).unwrap();
        assert!(!reached.get());
        assert_eq!(bus.listener_count(), 1);
    }

    #[test]
    fn reentrant_emit_completes_inner_dispatch_first() {
        let bus = EventBus::<Ping>::new();
        let seen = log();

        let inner_bus = bus.clone();
        let s = Rc::clone(&seen);
        bus.on(Topic::Kind(PingKind::A), move |e| {
            s.borrow_mut().push(format!("{:?}", e));
            inner_bus.emit(&Ping::B(9))
        });
        let s = Rc::clone(&seen);
        bus.on(Topic::Kind(PingKind::B), move |e| {
            s.borrow_mut().push(format!("{:?}", e));
            Ok(())
        });

        bus.emit(&Ping::A(1)).unwrap();
        assert_eq!(*seen.borrow(), vec!["A(1)", "B(9)"]);
    }

    #[test]
    fn handler_error_stops_remaining_handlers() {
        let bus = EventBus::<Ping>::new();
        let reached = Rc::new(Cell::new(false));

        bus.on(Topic::Kind(PingKind::A), |_| {
            Err(TodozError::Api("boom".into()))
        });
        let r = Rc::clone(&reached);
        bus.on_all(move |_| {
            r.set(true);
            Ok(())
        });

        let err = bus.emit(&Ping::A(1)).unwrap_err();
        assert!(matches!(err, TodozError::Api(_)));
        assert!(!reached.get());
    }

    #[test]
    fn off_is_idempotent() {
        let bus = EventBus::<Ping>::new();
        let id = bus.on_all(|_| Ok(()));
        assert!(bus.off(id));
        assert!(!bus.off(id));
        assert!(!bus.has_listeners());
    }

    #[test]
    fn dropping_subscription_unsubscribes() {
        let bus = EventBus::<Ping>::new();
        let count = Rc::new(Cell::new(0));
        let c = Rc::clone(&count);
        let sub = bus.subscribe(Topic::All, move |_| {
            c.set(c.get() + 1);
            Ok(())
        });

        bus.emit(&Ping::A(1)).unwrap();
        drop(sub);
        bus.emit(&Ping::A(2)).unwrap();

        assert_eq!(count.get(), 1);
        assert_eq!(bus.listener_count(), 0);
    }

    #[test]
    fn subscription_outliving_bus_is_harmless() {
        let bus = EventBus::<Ping>::new();
        let sub = bus.subscribe(Topic::Kind(PingKind::B), |_| Ok(()));
        drop(bus);
        sub.release();
    }
}
