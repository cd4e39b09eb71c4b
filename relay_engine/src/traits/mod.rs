//! Behaviour definitions for ledger backends.
//!
//! A backend that implements [`RelayLedger`] can act as the durable store for the relay. The contract is deliberately
//! small: two atomic insert-or-reject operations (delivery fingerprints and order claims), an idempotent claim
//! release, and the per-order forwarded-state record.

mod ledger;

pub use ledger::{ClaimResult, InsertDeliveryResult, LedgerError, RelayLedger};
