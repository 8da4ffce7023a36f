//! HTTP route handlers.
//!
//! Each handler parses its input, calls one core manager and shapes the
//! response. Failures go through [`crate::error::ApiError`].

pub mod artifacts;
pub mod compile;
pub mod health;
pub mod share;
