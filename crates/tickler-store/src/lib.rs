//! # tickler-store
//!
//! Persistence for Tickler.  Task collections are ordered lists of opaque
//! JSON records scoped by profile id; profiles and other small values live
//! in a flat key/value table.  The typed layer above owns record encoding.
//!
//! [`TaskRepository`] is the seam the server depends on.  It is implemented
//! by [`SqliteRepository`] (production), [`InMemoryRepository`] (tests) and
//! [`CachedRepository`], a process-local read-through cache over either.

pub mod cache;
pub mod database;
pub mod kv;
pub mod memory;
pub mod migrations;
pub mod repository;
pub mod tasks;

mod error;

pub use cache::CachedRepository;
pub use database::Database;
pub use error::{Result, StoreError};
pub use memory::InMemoryRepository;
pub use repository::{SqliteRepository, TaskRepository};
