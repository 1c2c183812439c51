//! Wire format of the chat websocket.
//!
//! Both the `chatroom` server and the browser `client` speak [`Frame`]s:
//! a request from the client is answered by zero or more `Item` frames and
//! one terminal `Done` or `Error` frame carrying the request id as
//! `parent_id`. Payloads are JSON values, carried inside a protobuf envelope
//! as `google.protobuf.Value`.
//!
//! Protobuf has a single number kind (double), so every integer in `data`
//! (message timestamps, `last_seen`) is decoded as a JSON float. Read such
//! fields with [`i64_from_number`].

use prost::Message;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use prost_types::value::Kind;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("malformed frame: {0}")]
    Decode(#[from] prost::DecodeError),
    #[error("unknown frame status {0}")]
    UnknownStatus(i32),
}

/// Position of a frame in a request exchange.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(i32)]
pub enum Status {
    Request = 0,
    Item = 1,
    Done = 2,
    Error = 3,
}

impl TryFrom<i32> for Status {
    type Error = CodecError;

    fn try_from(raw: i32) -> Result<Self, CodecError> {
        [Status::Request, Status::Item, Status::Done, Status::Error]
            .into_iter()
            .find(|s| *s as i32 == raw)
            .ok_or(CodecError::UnknownStatus(raw))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// UUID string.
    pub id: String,
    /// Id of the request this frame answers.
    pub parent_id: Option<String>,
    /// Epoch milliseconds at creation.
    pub ts: i64,
    /// Conversation the frame is about, as a UUID string.
    pub conversation_id: Option<String>,
    /// Sender handle, stamped by the server.
    pub from: Option<String>,
    /// `prefix:operation`, e.g. `"chat:subscribe"`.
    pub syscall: String,
    pub status: Status,
    pub data: Value,
}

/// Serialize a frame to protobuf bytes.
#[must_use]
pub fn encode_frame(frame: &Frame) -> Vec<u8> {
    <Envelope as From<&Frame>>::from(frame).encode_to_vec()
}

/// Parse protobuf bytes into a frame.
///
/// # Errors
///
/// [`CodecError::Decode`] when the bytes are not an envelope and
/// [`CodecError::UnknownStatus`] when the status tag is out of range.
pub fn decode_frame(bytes: &[u8]) -> Result<Frame, CodecError> {
    Frame::try_from(Envelope::decode(bytes)?)
}

/// Integer value of a JSON number that may have crossed the wire as a
/// double. `None` for fractions, non-finite and out-of-range values.
#[must_use]
pub fn i64_from_number(value: &Value) -> Option<i64> {
    let Value::Number(number) = value else {
        return None;
    };
    if let Some(int) = number.as_i64() {
        return Some(int);
    }
    let float = number.as_f64()?;
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    if float.is_finite() && float.fract() == 0.0 && float >= i64::MIN as f64 && float <= i64::MAX as f64 {
        return Some(float as i64);
    }
    None
}

// =============================================================================
// ENVELOPE
// =============================================================================

#[derive(Clone, PartialEq, Message)]
struct Envelope {
    #[prost(string, tag = "1")]
    id: String,
    #[prost(string, optional, tag = "2")]
    parent_id: Option<String>,
    #[prost(int64, tag = "3")]
    ts: i64,
    #[prost(string, optional, tag = "4")]
    conversation_id: Option<String>,
    #[prost(string, optional, tag = "5")]
    from: Option<String>,
    #[prost(string, tag = "6")]
    syscall: String,
    #[prost(int32, tag = "7")]
    status: i32,
    #[prost(message, optional, tag = "8")]
    data: Option<prost_types::Value>,
}

impl From<&Frame> for Envelope {
    fn from(frame: &Frame) -> Self {
        Self {
            id: frame.id.clone(),
            parent_id: frame.parent_id.clone(),
            ts: frame.ts,
            conversation_id: frame.conversation_id.clone(),
            from: frame.from.clone(),
            syscall: frame.syscall.clone(),
            status: frame.status as i32,
            data: Some(to_proto(&frame.data)),
        }
    }
}

impl TryFrom<Envelope> for Frame {
    type Error = CodecError;

    fn try_from(env: Envelope) -> Result<Self, CodecError> {
        Ok(Self {
            status: Status::try_from(env.status)?,
            data: env.data.as_ref().map_or_else(|| Value::Object(Map::new()), from_proto),
            id: env.id,
            parent_id: env.parent_id,
            ts: env.ts,
            conversation_id: env.conversation_id,
            from: env.from,
            syscall: env.syscall,
        })
    }
}

fn to_proto(value: &Value) -> prost_types::Value {
    let kind = match value {
        Value::Null => Kind::NullValue(0),
        Value::Bool(b) => Kind::BoolValue(*b),
        Value::Number(n) => Kind::NumberValue(n.as_f64().unwrap_or_default()),
        Value::String(s) => Kind::StringValue(s.clone()),
        Value::Array(items) => Kind::ListValue(prost_types::ListValue { values: items.iter().map(to_proto).collect() }),
        Value::Object(fields) => Kind::StructValue(prost_types::Struct {
            fields: fields.iter().map(|(k, v)| (k.clone(), to_proto(v))).collect(),
        }),
    };
    prost_types::Value { kind: Some(kind) }
}

fn from_proto(value: &prost_types::Value) -> Value {
    match &value.kind {
        None | Some(Kind::NullValue(_)) => Value::Null,
        Some(Kind::BoolValue(b)) => Value::Bool(*b),
        Some(Kind::NumberValue(n)) => Number::from_f64(*n).map_or(Value::Null, Value::Number),
        Some(Kind::StringValue(s)) => Value::String(s.clone()),
        Some(Kind::ListValue(list)) => Value::Array(list.values.iter().map(from_proto).collect()),
        Some(Kind::StructValue(st)) => Value::Object(st.fields.iter().map(|(k, v)| (k.clone(), from_proto(v))).collect()),
    }
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;
