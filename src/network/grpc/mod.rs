//! gRPC implementation of the tunnel transport.
//!
//! Connection establishment is retried with exponential backoff according
//! to `retry.connect`; once the `Connect` stream is open no reconnect is
//! attempted at this layer.

mod grpc_transport;
pub use grpc_transport::*;
