//! Relay Engine
//!
//! The durable ledger behind the sales relay. It records three things and nothing else:
//! 1. Raw delivery fingerprints, so that a physically re-sent notification can be recognised and dropped.
//! 2. Short-lived per-order claims, so that at most one in-flight request is ever resolving a given order.
//! 3. The last status key that was successfully forwarded for each order, so that the same state is never forwarded
//!    twice.
//!
//! All cross-request coordination in the relay happens through the atomic insert operations defined here. The
//! uniqueness guarantees are enforced by the storage layer's constraints, never by in-process locks, so multiple
//! relay instances can safely share one backing database.
//!
//! Currently SQLite (via `sqlx`) is the only supported backend. Use the public API ([`LedgerApi`]) rather than the
//! low-level database functions.

pub mod db_types;
mod ledger_api;
pub mod traits;

#[cfg(feature = "sqlite")]
mod sqlite;

pub use ledger_api::LedgerApi;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteLedger;
pub use traits::{ClaimResult, InsertDeliveryResult, LedgerError, RelayLedger};
