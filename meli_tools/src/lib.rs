//! A client library for the small slice of the Mercado Libre API that the sales relay needs: refreshing an OAuth
//! access token from a long-lived refresh token, fetching a single order with its payments embedded, and the
//! read-only order search behind the sales listing proxy.
//!
//! The [`TokenCache`] is the interesting part: it holds the `(token, expiry)` pair behind an async mutex so that
//! concurrent callers during a refresh wait for the in-flight refresh instead of each hitting the OAuth endpoint.

pub mod api;
pub mod config;
pub mod data_objects;
mod error;
pub mod helpers;
mod token;

pub use api::{MeliApi, OrderSource};
pub use config::MeliConfig;
pub use data_objects::{OrderPayment, OrderSnapshot, Party, SaleSummary, TokenResponse};
pub use error::MeliApiError;
pub use token::TokenCache;
