use serde::Serialize;
use serde_json::Value;

use crate::error::EnvelopeError;

/// Protocol marker written on every outbound envelope.
pub const JSONRPC_VERSION: &str = "2.0";

/// The unit of wire communication between the two contexts.
///
/// Wire shape:
/// `{ "jsonrpc": "2.0", "method": string, "params": array|omitted, "id": string|omitted }`
///
/// For a call, `method` names the handler to run. For a reply, `method`
/// carries the correlation id of the call being answered and `params` holds
/// exactly one element, the result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope {
    pub jsonrpc: String,
    pub method: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<Value>,
    /// Present when the sender expects a reply tagged with this id.
    /// An empty id is never written.
    #[serde(skip_serializing_if = "id_is_absent")]
    pub id: Option<String>,
}

fn id_is_absent(id: &Option<String>) -> bool {
    id.as_deref().is_none_or(str::is_empty)
}

impl Envelope {
    /// A call that expects a reply tagged with `id`.
    ///
    /// An empty `id` cannot be answered, so it yields a notification.
    pub fn call(method: impl Into<String>, params: Vec<Value>, id: impl Into<String>) -> Self {
        let id: String = id.into();
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
            id: (!id.is_empty()).then_some(id),
        }
    }

    /// A fire-and-forget call.
    pub fn notification(method: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
            id: None,
        }
    }

    /// A reply to the call tagged `id`, carrying its single result.
    pub fn reply(id: impl Into<String>, result: Value) -> Self {
        Self::notification(id, vec![result])
    }

    /// Whether the sender waits for a reply.
    pub fn expects_reply(&self) -> bool {
        self.id.is_some()
    }

    /// Serialize to JSON bytes.
    pub fn encode(&self) -> Result<Vec<u8>, EnvelopeError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Parse raw JSON bytes. Only `method` is required.
    pub fn decode(raw: &[u8]) -> Result<Self, EnvelopeError> {
        let value: Value = serde_json::from_slice(raw)?;
        Self::from_value(value)
    }

    /// Parse raw JSON bytes, refusing anything larger than `max_size`.
    pub fn decode_bounded(raw: &[u8], max_size: usize) -> Result<Self, EnvelopeError> {
        if raw.len() > max_size {
            return Err(EnvelopeError::TooLarge {
                size: raw.len(),
                max: max_size,
            });
        }
        Self::decode(raw)
    }

    /// Build an envelope from an already parsed JSON value.
    ///
    /// The structure is checked loosely: `params` may be absent or `null`
    /// (no arguments) or a bare value (one argument); an `id` that is not a
    /// non-empty string means no reply is expected.
    pub fn from_value(value: Value) -> Result<Self, EnvelopeError> {
        let Value::Object(mut map) = value else {
            return Err(EnvelopeError::NotAnObject);
        };

        let method = match map.remove("method") {
            Some(Value::String(method)) => method,
            _ => return Err(EnvelopeError::MissingMethod),
        };

        let params = match map.remove("params") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items,
            Some(other) => vec![other],
        };

        let id = match map.remove("id") {
            Some(Value::String(id)) if !id.is_empty() => Some(id),
            _ => None,
        };

        let jsonrpc = match map.remove("jsonrpc") {
            Some(Value::String(version)) => version,
            _ => JSONRPC_VERSION.to_string(),
        };

        Ok(Self {
            jsonrpc,
            method,
            params,
            id,
        })
    }
}
