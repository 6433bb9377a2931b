//! Trade ledger persistence.

mod schema;
mod sqlite;

pub use sqlite::SqliteLedger;
