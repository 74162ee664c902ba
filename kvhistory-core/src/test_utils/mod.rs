//! Test utilities and helpers for kvhistory
//!
//! Fixtures that build populated in-memory stores and helpers for asserting
//! on asynchronous completion, shared by unit and integration tests.

pub mod async_helpers;
pub mod fixtures;

pub use async_helpers::*;
pub use fixtures::*;
