//! Durable progress state for the Sampo step-progression engine.
//!
//! The engines never touch a backend directly. They go through
//! [`ProgressStore`], which gives each engine a typed view over its own key
//! namespace and sequences the one operation that spans namespaces, the
//! compound progress reset.
//!
//! # Architecture
//!
//! ```text
//! ProgressStore<S: KeyValueStore>
//!     |
//!     +-- MemoryStore      (tests, headless runs)
//!     +-- DragonflyStore   (Redis-compatible, shared or remote)
//! ```
//!
//! # Modules
//!
//! - [`kv`] -- The [`KeyValueStore`] collaborator and [`MemoryStore`]
//! - [`dragonfly`] -- `Dragonfly` backend
//! - [`progress_store`] -- Namespaced typed state and the journaled reset
//! - [`error`] -- Shared error types

pub mod dragonfly;
pub mod error;
pub mod kv;
pub mod progress_store;

// Re-export primary types for convenience.
pub use dragonfly::DragonflyStore;
pub use error::StoreError;
pub use kv::{KeyValueStore, MemoryStore};
pub use progress_store::{Persistence, ProgressStore, keys};
