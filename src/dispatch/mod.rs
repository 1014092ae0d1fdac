//! Inbound routing: the handler registry and the dispatcher that fans every
//! inbound envelope out to the matching handlers on independent tasks.
mod dispatcher;
mod handler;
mod registry;
pub use dispatcher::*;
pub use handler::*;
pub use registry::*;

#[cfg(test)]
mod registry_test;
