//! # Todoz Architecture
//!
//! Todoz is a **UI-agnostic task-list library** built on a small reactive
//! runtime: records broadcast their changes, an ordered collection re-sorts
//! and re-broadcasts them, and view bindings re-render in response. The CLI is
//! one client of it.
//!
//! ## Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  CLI Layer (cli/, wired by main.rs)                         │
//! │  - Parses arguments, prints the surface, handles exit codes │
//! │  - The ONLY place that knows about stdout/stderr            │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  API Layer (api.rs)                                         │
//! │  - TodoApp: the application context, built once            │
//! │  - Resolves 1-based positions, returns CmdResult            │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  View Layer (view.rs, binding.rs)                           │
//! │  - TodoView / AppView bind model events to a Surface        │
//! │  - Subscriptions scoped and released on teardown            │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Core (events.rs, record.rs, collection.rs, model.rs)       │
//! │  - EventBus, Record, Collection, Todo/TodoList              │
//! │  - Ordering, validation, optimistic saves                   │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Storage Layer (store/)                                     │
//! │  - PersistenceAdapter trait                                 │
//! │  - FileAdapter (production), InMemoryAdapter (testing)      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Execution Model
//!
//! Everything is single-threaded and synchronous. Shared state lives behind
//! `Rc` + `RefCell`/`Cell`; no borrow is ever held across an `emit`, so any
//! handler may call back into the record or collection that notified it.
//! Every operation that can fail returns [`error::Result`], including event
//! dispatch: a handler error stops the emission and reaches the caller of
//! the mutation.
//!
//! ## Key Principle: No I/O Assumptions in Core
//!
//! From `api.rs` inward, code never writes to stdout/stderr and never
//! calls `std::process::exit`. Rendering goes through the [`view::Surface`]
//! trait; time goes through [`binding::Clock`].
//!
//! ## Testing Strategy
//!
//! 1. **Core** (`events`, `record`, `collection`, `model`): thorough unit
//!    tests against [`store::memory::InMemoryAdapter`].
//! 2. **Views and API**: driven with a [`view::MemorySurface`] and a
//!    [`binding::ManualClock`].
//! 3. **CLI** (`tests/cli.rs`): the binary run against a temporary data dir.
//!
//! ## Module Overview
//!
//! - [`api`]: The application context and facade
//! - [`view`]: Item and app bindings, the `Surface` seam
//! - [`binding`]: Binding scopes, clocks, debouncing
//! - [`model`]: `Todo`, `TodoList`, `TodoSchema`
//! - [`collection`]: Ordered observable collections
//! - [`record`]: Observable records and schemas
//! - [`events`]: Typed synchronous event dispatch
//! - [`attributes`]: Attribute values, maps and patches
//! - [`store`]: Persistence adapters
//! - [`config`]: Configuration management
//! - [`error`]: Error types
//! - `cli`: Argument parsing and printing for the binary (not part of the lib API)

pub mod api;
pub mod attributes;
pub mod binding;
pub mod collection;
pub mod config;
pub mod error;
pub mod events;
pub mod model;
pub mod record;
pub mod store;
pub mod view;
