//! Append-only event log.
//!
//! Components emit [`OrderEvent`]s through a cloneable [`EventHandle`]; a single
//! [`EventWriter`] task drains the channel in batches into an [`EventStore`].
//! Entries are never updated or deleted.

mod handle;
mod sqlite;
mod types;
mod writer;

pub use handle::*;
pub use sqlite::*;
pub use types::*;
pub use writer::*;
