//! HTTP handlers for the sync API.

pub mod sync;
pub mod webhook;
