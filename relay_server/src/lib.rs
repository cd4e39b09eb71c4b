//! # Sales relay server
//! This module hosts the server code for the Mercado Libre sales relay. It is responsible for:
//! Listening for incoming "order changed" webhook notifications from the marketplace.
//! Deduplicating raw deliveries and claiming the order so concurrent redeliveries are serialized.
//! Resolving the authoritative order snapshot and deciding whether it crossed into a paid state.
//! Forwarding a normalized sale event to the downstream automation endpoint exactly once per state.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `/healthz`: A liveness probe that returns `{"ok": true}`.
//! * `/webhook`: The marketplace notification endpoint. It always acknowledges with HTTP 200 and decides internally.
//! * `/sales`: A read-through proxy listing the most recent paid orders.

pub mod cli;
pub mod config;
pub mod data_objects;
pub mod decision;
pub mod errors;
pub mod forwarder;
pub mod helpers;
pub mod retention_worker;
pub mod routes;
pub mod server;
pub mod webhook_routes;

#[cfg(test)]
mod endpoint_tests;
