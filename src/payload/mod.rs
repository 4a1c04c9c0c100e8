//! Raw payload normalization
//!
//! Turns a (possibly compressed) byte payload into one of the five typed raw
//! shapes, validating it eagerly so the calculators only ever see
//! well-formed data.

mod decode;
mod raw;

pub use decode::*;
pub use raw::*;

use serde::de::DeserializeOwned;

use crate::error::ComputeError;

/// Decode and validate a payload of the given kind.
pub fn parse_payload(kind: PayloadKind, bytes: &[u8]) -> Result<RawPayload, ComputeError> {
    let decoded = normalize(bytes);

    let payload = match kind {
        PayloadKind::Pointer => RawPayload::Pointer(parse_json(kind, &decoded)?),
        PayloadKind::Keyboard => RawPayload::Keyboard(parse_json(kind, &decoded)?),
        PayloadKind::SustainedAttention => {
            RawPayload::SustainedAttention(parse_json(kind, &decoded)?)
        }
        PayloadKind::GraphTest => RawPayload::GraphTest(parse_json(kind, &decoded)?),
        PayloadKind::SpanTest => RawPayload::SpanTest(parse_json(kind, &decoded)?),
    };

    payload.validate()?;
    Ok(payload)
}

/// Parse an uncompressed JSON payload of the given kind.
pub fn parse_payload_str(kind: PayloadKind, json: &str) -> Result<RawPayload, ComputeError> {
    parse_payload(kind, json.as_bytes())
}

fn parse_json<T: DeserializeOwned>(kind: PayloadKind, bytes: &[u8]) -> Result<T, ComputeError> {
    serde_json::from_slice(bytes)
        .map_err(|e| ComputeError::ParseError(format!("Failed to parse {kind} payload: {e}")))
}
