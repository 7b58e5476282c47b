//! # Storage Layer
//!
//! This module defines the persistence contract for records. The
//! [`PersistenceAdapter`] trait lets records and collections work against
//! different storage backends without knowing how data is kept.
//!
//! ## Design Rationale
//!
//! Storage is abstracted behind a trait to:
//! - Enable **testing** with [`memory::InMemoryAdapter`] (no filesystem needed)
//! - Allow **other backends** (database, browser storage, ...) without changing the core
//! - Keep the binding runtime **decoupled** from persistence details
//!
//! ## Implementations
//!
//! - [`fs::FileAdapter`]: Production file-based storage
//!   - One JSON document per namespace: `{namespace}.json`
//!   - Writes are atomic (temp file + rename)
//!
//! - [`memory::InMemoryAdapter`]: In-memory storage for testing
//!   - No persistence
//!   - Can simulate write failures
//!
//! ## Namespaces
//!
//! An adapter instance serves exactly one namespace, an opaque string naming
//! the logical bucket (one bucket per collection in practice).
//!
//! ## Completion
//!
//! Every operation returns once it has completed. The runtime is
//! single-threaded, so a backend with real latency blocks the caller; what
//! matters to the core is that success or failure is known before the
//! dependent `save`/`destroy`/`fetch` returns.

use crate::attributes::Attributes;
use crate::error::Result;
use uuid::Uuid;

pub mod fs;
pub mod memory;

/// Durable storage of records under a namespace.
///
/// Methods take `&self`: records share one adapter through an `Rc`, and
/// implementations use interior mutability where they need it.
pub trait PersistenceAdapter {
    /// The namespace this adapter stores records under.
    fn namespace(&self) -> &str;

    /// Store a new record and return its freshly assigned id.
    fn create(&self, attributes: &Attributes) -> Result<Uuid>;

    /// Fetch a record's attributes. `NotFound` if absent.
    fn read(&self, id: &Uuid) -> Result<Attributes>;

    /// Replace a record's attributes. `NotFound` if absent.
    fn update(&self, id: &Uuid, attributes: &Attributes) -> Result<()>;

    /// Remove a record. `NotFound` if absent.
    fn delete(&self, id: &Uuid) -> Result<()>;

    /// All records in the namespace. Order is implementation-defined.
    fn list(&self) -> Result<Vec<(Uuid, Attributes)>>;
}
