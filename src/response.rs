//! Response decoding and per-attempt outcomes.
//!
//! A reply datagram is one of:
//!
//! | Shape | Outcome |
//! |-------|---------|
//! | `{"id":1,"src":"VenusE-xx","result":{...}}` | [`AttemptOutcome::Success`] |
//! | `{"id":1,"src":"VenusE-xx","error":{"code":-32700,"message":"..."}}` | [`AttemptOutcome::ProtocolError`] |
//! | valid envelope with both, neither, or a non-object `result` | [`AttemptOutcome::UnexpectedShape`] |
//! | anything that is not a JSON object | [`AttemptOutcome::DecodeFailure`] |
//!
//! The `result` payload is returned untouched; turning it into named values
//! is the job of [`ProtocolSchema`](crate::ProtocolSchema).
//!
//! # Example
//!
//! ```
//! use venus_udp::{decode, AttemptOutcome};
//!
//! let outcome = decode(br#"{"id":1,"src":"VenusE-1","result":{"soc":55}}"#);
//! match outcome {
//!     AttemptOutcome::Success(result) => assert_eq!(result["soc"], 55),
//!     other => panic!("unexpected {other:?}"),
//! }
//! ```

use std::io;

use serde_json::{Map, Value};

use crate::error::{error_code_description, Result, VenusError};

/// Outcome of a single transport round trip.
#[derive(Debug)]
pub enum AttemptOutcome {
    /// The device answered with a `result` object.
    Success(Map<String, Value>),
    /// The device answered with an `error` object.
    ProtocolError {
        /// JSON-RPC error code.
        code: i64,
        /// Message supplied by the device.
        message: String,
    },
    /// The reply parsed as an envelope but had no usable `result` or `error`.
    UnexpectedShape(String),
    /// The reply was not a JSON envelope.
    DecodeFailure(String),
    /// No reply arrived in time.
    TransportTimeout,
    /// The socket failed.
    TransportError(io::Error),
}

impl AttemptOutcome {
    /// Builds the outcome of a transport exchange, decoding the reply if one arrived.
    pub fn from_exchange(exchange: Result<Vec<u8>>) -> Self {
        match exchange {
            Ok(bytes) => decode(&bytes),
            Err(VenusError::Timeout) => Self::TransportTimeout,
            Err(VenusError::Io(e)) => Self::TransportError(e),
            Err(other) => Self::TransportError(io::Error::other(other)),
        }
    }

    /// Converts the outcome into the payload or the matching error.
    pub fn into_result(self) -> Result<Map<String, Value>> {
        match self {
            Self::Success(result) => Ok(result),
            Self::ProtocolError { code, message } => Err(VenusError::protocol(code, message)),
            Self::UnexpectedShape(reason) => Err(VenusError::unexpected_response(reason)),
            Self::DecodeFailure(reason) => Err(VenusError::decode(reason)),
            Self::TransportTimeout => Err(VenusError::Timeout),
            Self::TransportError(e) => Err(VenusError::Io(e)),
        }
    }
}

/// Decodes a reply datagram.
pub fn decode(bytes: &[u8]) -> AttemptOutcome {
    let mut envelope = match serde_json::from_slice::<Value>(bytes) {
        Ok(Value::Object(envelope)) => envelope,
        Ok(_) => return AttemptOutcome::DecodeFailure("reply is not a JSON object".into()),
        Err(e) => return AttemptOutcome::DecodeFailure(e.to_string()),
    };

    tracing::trace!(id = ?envelope.get("id"), src = ?envelope.get("src"), "decoded reply envelope");

    let result = envelope.remove("result").filter(|v| !v.is_null());
    let error = envelope.remove("error").filter(|v| !v.is_null());
    match (result, error) {
        (Some(Value::Object(result)), None) => AttemptOutcome::Success(result),
        (Some(_), None) => AttemptOutcome::UnexpectedShape("result is not an object".into()),
        (None, Some(error)) => decode_error_object(&error),
        (Some(_), Some(_)) => {
            AttemptOutcome::UnexpectedShape("both result and error present".into())
        }
        (None, None) => AttemptOutcome::UnexpectedShape("neither result nor error present".into()),
    }
}

fn decode_error_object(error: &Value) -> AttemptOutcome {
    let Some(code) = error.get("code").and_then(Value::as_i64) else {
        return AttemptOutcome::UnexpectedShape("error object without integer code".into());
    };
    let message = error
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or_else(|| error_code_description(code))
        .to_owned();
    AttemptOutcome::ProtocolError { code, message }
}
