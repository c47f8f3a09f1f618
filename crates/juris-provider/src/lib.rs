//! # juris-provider
//!
//! Stateless HTTP client for the external legal-tracking provider.
//!
//! Provides:
//! - [`ProviderClient`], a reqwest-backed implementation of the
//!   [`ProviderApi`] trait with exponential-backoff retries on transient
//!   failures (429 and 5xx)
//! - [`poll_until_terminal`], a fixed-interval polling helper bounded by an
//!   attempt budget
//! - Tolerant wire types for the provider's inconsistently shaped payloads

pub mod client;
pub mod config;
pub mod error;
pub mod poll;
pub mod types;

pub use client::{fetch_all_results, ProviderApi, ProviderClient};
pub use config::ProviderConfig;
pub use error::{ProviderError, ProviderResult};
pub use poll::poll_until_terminal;
pub use types::{RequestInfo, RequestStatus, ResponseEntry, ResponsePage, TrackingInfo};
