//! Envelope codec: the unit exchanged over the tunnel.
//!
//! An [`Envelope`] pairs a type-tagged payload ([`prost_types::Any`]) with an
//! optional correlation id. The [`TypeTag`] of a payload is read from
//! `Any::type_url` alone, so routing never decodes the payload body.

mod type_tag;
pub use type_tag::*;


use prost::Message;
use prost::Name;
use prost_types::Any;

use crate::proto::TunnelMessage;
use crate::CodecError;
use crate::Result;

#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub payload: Any,
    /// Present only on request/response pairs.
    pub correlation_id: Option<String>,
}

impl Envelope {
    /// Packs `message` into an unsolicited envelope.
    pub fn unsolicited<M: Name>(message: &M) -> Result<Self> {
        Ok(Self {
            payload: pack(message)?,
            correlation_id: None,
        })
    }

    /// Packs `message` as the reply to `correlation_id`. An empty id
    /// produces an unsolicited envelope.
    pub fn reply<M: Name>(
        correlation_id: &str,
        message: &M,
    ) -> Result<Self> {
        Ok(Self::from_any(correlation_id, pack(message)?))
    }

    pub fn from_any(
        correlation_id: &str,
        payload: Any,
    ) -> Self {
        Self {
            payload,
            correlation_id: (!correlation_id.is_empty()).then(|| correlation_id.to_string()),
        }
    }

    pub fn type_url(&self) -> &str {
        &self.payload.type_url
    }

    /// Correlation id as handed to handlers: empty string when absent.
    pub fn correlation_id_or_empty(&self) -> &str {
        self.correlation_id.as_deref().unwrap_or("")
    }

    /// Decodes the payload body as `M`.
    pub fn decode<M: Name + Default>(&self) -> Result<M> {
        unpack(&self.payload)
    }
}

impl From<Envelope> for TunnelMessage {
    fn from(envelope: Envelope) -> Self {
        TunnelMessage {
            payload: Some(envelope.payload),
            request_id: envelope.correlation_id.unwrap_or_default(),
        }
    }
}

impl TryFrom<TunnelMessage> for Envelope {
    type Error = crate::Error;

    fn try_from(message: TunnelMessage) -> Result<Self> {
        let payload = message.payload.ok_or(CodecError::MissingPayload)?;
        Ok(Envelope::from_any(&message.request_id, payload))
    }
}

/// Packs a message into an [`Any`] with its fully qualified type URL.
pub fn pack<M: Name>(message: &M) -> Result<Any> {
    let mut value = Vec::with_capacity(message.encoded_len());
    message.encode(&mut value)?;
    Ok(Any {
        type_url: M::type_url(),
        value,
    })
}

/// Decodes the body of `payload` as `M` without re-checking the type URL;
/// callers route by [`TypeTag`] first.
pub fn unpack<M: Name + Default>(payload: &Any) -> Result<M> {
    M::decode(payload.value.as_slice()).map_err(|source| {
        CodecError::Decode {
            type_url: payload.type_url.clone(),
            source,
        }
        .into()
    })
}
