//! # juris-db
//!
//! Database layer for the juris legal-process synchronization engine.
//!
//! Provides:
//! - Tenant-scoped sqlx models for cases, sync attempts, raw provider
//!   deliveries, audit events, the normalized case dataset, integration
//!   credentials and tenant plans
//! - Embedded SQL migrations with a typed [`DbError`]

pub mod error;
pub mod migrations;
pub mod models;

pub use error::DbError;
pub use migrations::run_migrations;
