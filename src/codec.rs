//! Conversions between message payloads and the bytes that travel on the wire.
//!
//! Payloads are JSON text. Decoding never fails: content that is not valid JSON is wrapped as
//! `{"text": <raw content>}`.
use crate::EncodingError;
use serde::Serialize;
use serde_json::{json, Value};

/// Turn the content of a delivery into a structured payload.
///
/// Invalid UTF-8 sequences are replaced with `U+FFFD` before parsing.
pub fn decode(content: &[u8]) -> Value {
    let text = String::from_utf8_lossy(content);
    serde_json::from_str(&text).unwrap_or_else(|_| json!({ "text": text }))
}

/// Turn a payload into the bytes to send to the broker.
pub fn encode<T: Serialize + ?Sized>(payload: &T) -> Result<Vec<u8>, EncodingError> {
    Ok(serde_json::to_vec(payload)?)
}
