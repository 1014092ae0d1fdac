//! Shared fixtures for unit tests: an in-memory tunnel standing in for the
//! core, test payload types and a tracing initializer.
mod common;
mod mock_tunnel;

pub use common::*;
pub use mock_tunnel::*;
