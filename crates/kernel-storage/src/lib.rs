//! Persistence traits for the posting kernel's ambient stack: events
//! (C10), economic events (C11), journal entries (C12), and
//! interpretation outcomes (C14/C16). An in-memory adapter backs tests;
//! an optional `postgres` feature adds a `sqlx`-backed transactional
//! adapter.

#![deny(unsafe_code)]

mod error;
pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;
mod traits;

pub use error::{StorageError, StorageResult};
pub use traits::{EconomicEventStore, EventInsertOutcome, EventStore, JournalStore, OutcomeStore};
