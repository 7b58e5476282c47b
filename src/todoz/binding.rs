//! # Binding Primitives
//!
//! Building blocks shared by every view binding:
//!
//! - [`ViewBinding`]: the contract a binding fulfils (idempotent render,
//!   explicit disposal).
//! - [`BindingScope`]: owns the [`Subscription`] guards of one binding, so
//!   disposing the binding is a matter of clearing (or dropping) its scope.
//! - [`Debouncer`]: at most one pending delayed action, measured on a
//!   [`Clock`].
//!
//! ## Time
//!
//! The runtime has no event loop of its own. Delayed actions are due at a
//! deadline on a [`Clock`] and run when the host calls [`Debouncer::poll`]
//! (the CLI never waits; tests drive a [`ManualClock`]).

use crate::error::Result;
use crate::events::Subscription;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// A render callback bound to model events.
pub trait ViewBinding {
    /// Push the current model state to the surface. Safe to call repeatedly.
    fn render(&self) -> Result<()>;

    /// Unsubscribe every listener. Idempotent.
    fn dispose(&self);

    fn is_disposed(&self) -> bool;
}

/// Collects the subscriptions of one binding.
///
/// Subscriptions are released in reverse registration order on `clear` and
/// on drop.
#[derive(Default)]
pub struct BindingScope {
    subscriptions: Vec<Subscription>,
}

impl BindingScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hold(&mut self, subscription: Subscription) {
        self.subscriptions.push(subscription);
    }

    /// Release everything now. The scope can be reused afterwards.
    pub fn clear(&mut self) {
        while let Some(subscription) = self.subscriptions.pop() {
            subscription.release();
        }
    }

    pub fn binding_count(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }
}

impl Drop for BindingScope {
    fn drop(&mut self) {
        self.clear();
    }
}

impl fmt::Debug for BindingScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingScope")
            .field("binding_count", &self.subscriptions.len())
            .finish()
    }
}

/// Millisecond time source.
pub trait Clock: fmt::Debug {
    fn now_millis(&self) -> u64;
}

/// Monotonic wall clock, counting from its construction.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<u64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by.as_millis() as u64);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> u64 {
        self.now.get()
    }
}

type Action = Box<dyn FnOnce() -> Result<()>>;

struct Pending {
    due: u64,
    action: Action,
}

/// Holds at most one delayed action.
///
/// Scheduling while an action is pending replaces it and restarts the delay
/// from the new scheduling time.
pub struct Debouncer {
    clock: Rc<dyn Clock>,
    pending: RefCell<Option<Pending>>,
}

impl fmt::Debug for Debouncer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Debouncer")
            .field("due_at", &self.due_at())
            .finish()
    }
}

impl Debouncer {
    pub fn new(clock: Rc<dyn Clock>) -> Self {
        Self {
            clock,
            pending: RefCell::new(None),
        }
    }

    /// Schedule `action` to run `delay` from now. Returns true if a pending
    /// action was cancelled.
    pub fn schedule(&self, delay: Duration, action: impl FnOnce() -> Result<()> + 'static) -> bool {
        let due = self.clock.now_millis() + delay.as_millis() as u64;
        let replaced = self
            .pending
            .borrow_mut()
            .replace(Pending {
                due,
                action: Box::new(action),
            })
            .is_some();
        if replaced {
            tracing::trace!(due, "debounced action rescheduled");
        }
        replaced
    }

    /// Drop the pending action, if any.
    pub fn cancel(&self) -> bool {
        self.pending.borrow_mut().take().is_some()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.borrow().is_some()
    }

    pub fn due_at(&self) -> Option<u64> {
        self.pending.borrow().as_ref().map(|p| p.due)
    }

    /// Run the pending action if its deadline has passed. Returns whether it ran.
    pub fn poll(&self) -> Result<bool> {
        let now = self.clock.now_millis();
        let ready = {
            let mut pending = self.pending.borrow_mut();
            if pending.as_ref().is_some_and(|p| p.due <= now) {
                pending.take()
            } else {
                None
            }
        };
        match ready {
            Some(p) => {
                (p.action)()?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{Event, EventBus, Topic};

    #[derive(Debug, Clone)]
    struct Ping;

    impl Event for Ping {
        type Kind = ();
        fn kind(&self) {}
    }

    fn debouncer() -> (Rc<ManualClock>, Debouncer) {
        let clock = Rc::new(ManualClock::new());
        (clock.clone(), Debouncer::new(clock))
    }

    #[test]
    fn scope_releases_on_clear_and_drop() {
        let bus: EventBus<Ping> = EventBus::new();
        let mut scope = BindingScope::new();
        scope.hold(bus.subscribe(Topic::All, |_| Ok(())));
        scope.hold(bus.subscribe(Topic::Kind(()), |_| Ok(())));
        assert_eq!(scope.binding_count(), 2);
        assert_eq!(bus.listener_count(), 2);

        scope.clear();
        assert!(scope.is_empty());
        assert_eq!(bus.listener_count(), 0);

        scope.hold(bus.subscribe(Topic::All, |_| Ok(())));
        drop(scope);
        assert_eq!(bus.listener_count(), 0);
    }

    #[test]
    fn action_waits_for_deadline() {
        let (clock, debouncer) = debouncer();
        let ran = Rc::new(Cell::new(false));
        let r = Rc::clone(&ran);
        debouncer.schedule(Duration::from_millis(100), move || {
            r.set(true);
            Ok(())
        });

        clock.advance(Duration::from_millis(99));
        assert!(!debouncer.poll().unwrap());
        clock.advance(Duration::from_millis(1));
        assert!(debouncer.poll().unwrap());
        assert!(ran.get());
        assert!(!debouncer.is_pending());
        assert!(!debouncer.poll().unwrap());
    }

    #[test]
    fn rescheduling_replaces_and_restarts() {
        let (clock, debouncer) = debouncer();
        let fired = Rc::new(RefCell::new(Vec::new()));

        let f = Rc::clone(&fired);
        assert!(!debouncer.schedule(Duration::from_millis(100), move || {
            f.borrow_mut().push("first");
            Ok(())
        }));
        clock.advance(Duration::from_millis(60));
        let f = Rc::clone(&fired);
        assert!(debouncer.schedule(Duration::from_millis(100), move || {
            f.borrow_mut().push("second");
            Ok(())
        }));

        clock.advance(Duration::from_millis(60));
        assert!(!debouncer.poll().unwrap());
        assert_eq!(debouncer.due_at(), Some(160));
        clock.advance(Duration::from_millis(40));
        assert!(debouncer.poll().unwrap());

        assert_eq!(*fired.borrow(), vec!["second"]);
    }

    #[test]
    fn cancel_drops_pending_action() {
        let (clock, debouncer) = debouncer();
        debouncer.schedule(Duration::from_millis(10), || {
            panic!("cancelled action ran")
        });
        assert!(debouncer.cancel());
        assert!(!debouncer.cancel());
        clock.advance(Duration::from_secs(1));
        assert!(!debouncer.poll().unwrap());
    }

    #[test]
    fn action_may_reschedule_itself() {
        let (clock, debouncer) = debouncer();
        let debouncer = Rc::new(debouncer);
        let again = Rc::clone(&debouncer);
        debouncer.schedule(Duration::ZERO, move || {
            again.schedule(Duration::from_millis(5), || Ok(()));
            Ok(())
        });

        assert!(debouncer.poll().unwrap());
        assert_eq!(debouncer.due_at(), Some(clock.now_millis() + 5));
    }

    #[test]
    fn system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let a = clock.now_millis();
        let b = clock.now_millis();
        assert!(b >= a);
    }
}
