use super::PersistenceAdapter;
use crate::attributes::Attributes;
use crate::error::{Result, TodozError};
use std::cell::{Cell, RefCell};
use uuid::Uuid;

/// In-memory storage for testing and development.
/// Does NOT persist data.
///
/// Uses `RefCell` for interior mutability since the runtime is
/// single-threaded. Records are kept in creation order so `list()` is
/// deterministic.
#[derive(Debug)]
pub struct InMemoryAdapter {
    namespace: String,
    records: RefCell<Vec<(Uuid, Attributes)>>,
    simulate_write_error: Cell<bool>,
}

impl Default for InMemoryAdapter {
    fn default() -> Self {
        Self::new("todos")
    }
}

impl InMemoryAdapter {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            records: RefCell::new(Vec::new()),
            simulate_write_error: Cell::new(false),
        }
    }

    /// Enable write error simulation for testing error handling.
    pub fn set_simulate_write_error(&self, simulate: bool) {
        self.simulate_write_error.set(simulate);
    }

    pub fn len(&self) -> usize {
        self.records.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.borrow().is_empty()
    }

    pub fn contains(&self, id: &Uuid) -> bool {
        self.records.borrow().iter().any(|(k, _)| k == id)
    }

    fn check_writable(&self) -> Result<()> {
        if self.simulate_write_error.get() {
            return Err(TodozError::Store("Simulated write error".to_string()));
        }
        Ok(())
    }
}

impl PersistenceAdapter for InMemoryAdapter {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    fn create(&self, attributes: &Attributes) -> Result<Uuid> {
        self.check_writable()?;
        let id = Uuid::new_v4();
        self.records.borrow_mut().push((id, attributes.clone()));
        Ok(id)
    }

    fn read(&self, id: &Uuid) -> Result<Attributes> {
        self.records
            .borrow()
            .iter()
            .find(|(k, _)| k == id)
            .map(|(_, attrs)| attrs.clone())
            .ok_or(TodozError::NotFound(*id))
    }

    fn update(&self, id: &Uuid, attributes: &Attributes) -> Result<()> {
        self.check_writable()?;
        let mut records = self.records.borrow_mut();
        let entry = records
            .iter_mut()
            .find(|(k, _)| k == id)
            .ok_or(TodozError::NotFound(*id))?;
        entry.1 = attributes.clone();
        Ok(())
    }

    fn delete(&self, id: &Uuid) -> Result<()> {
        self.check_writable()?;
        let mut records = self.records.borrow_mut();
        let pos = records
            .iter()
            .position(|(k, _)| k == id)
            .ok_or(TodozError::NotFound(*id))?;
        records.remove(pos);
        Ok(())
    }

    fn list(&self) -> Result<Vec<(Uuid, Attributes)>> {
        Ok(self.records.borrow().clone())
    }
}

// --- Test Fixtures ---

#[cfg(any(test, feature = "test_utils"))]
pub mod fixtures {
    use super::*;
    use crate::attributes::{DONE, ORDER, TEXT};

    pub struct StoreFixture {
        pub store: InMemoryAdapter,
    }

    impl Default for StoreFixture {
        fn default() -> Self {
            Self::new()
        }
    }

    impl StoreFixture {
        pub fn new() -> Self {
            Self {
                store: InMemoryAdapter::new("todos"),
            }
        }

        fn next_order(&self) -> i64 {
            self.store.len() as i64 + 1
        }

        pub fn with_todos(self, count: usize) -> Self {
            for i in 0..count {
                let title = format!("Test todo {}", i + 1);
                self.push(&title, false);
            }
            self
        }

        pub fn with_todo(self, text: &str) -> Self {
            self.push(text, false);
            self
        }

        pub fn with_done_todo(self, text: &str) -> Self {
            self.push(text, true);
            self
        }

        fn push(&self, text: &str, done: bool) {
            let mut attrs = Attributes::new();
            attrs.insert(TEXT.into(), text.into());
            attrs.insert(DONE.into(), done.into());
            attrs.insert(ORDER.into(), self.next_order().into());
            self.store.create(&attrs).unwrap();
        }
    }
}
