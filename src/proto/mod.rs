//! Protocol Buffer definitions for the agent <-> core tunnel, generated from
//! `proto/tunnel.proto` by `build.rs`.
//!
//! Every message implements [`prost::Name`] with a
//! `type.googleapis.com/poddeck.<Message>` type URL.

tonic::include_proto!("poddeck");

pub(crate) const PACKAGE: &str = "poddeck";
pub(crate) const TYPE_URL_PREFIX: &str = "type.googleapis.com/";
