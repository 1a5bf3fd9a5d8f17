//! Run-Log Dashboard Backend Library
//!
//! Exposes the aggregation core and its collaborators for use by the
//! binaries and integration tests.

pub mod aggregate;
pub mod api;
pub mod middleware;
pub mod models;
pub mod state;
pub mod store;
