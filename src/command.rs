//! Request commands and their wire encoding.
//!
//! Every request is a single compact JSON object:
//!
//! ```text
//! {"id":1,"method":"ES.GetMode","params":{"id":0}}
//! ```
//!
//! The device has a small receive buffer and a simple parser, so the
//! encoding never contains insignificant whitespace.
//!
//! # Example
//!
//! ```
//! use venus_udp::{Command, ES_GET_MODE};
//!
//! let cmd = Command::query(7, ES_GET_MODE);
//! assert_eq!(
//!     cmd.to_bytes(),
//!     br#"{"id":7,"method":"ES.GetMode","params":{"id":0}}"#.to_vec()
//! );
//! ```

use serde::Serialize;
use serde_json::{Map, Value};

/// Query for operating mode and power flows.
pub const ES_GET_MODE: &str = "ES.GetMode";
/// Query for battery status (legacy firmware only).
pub const BAT_GET_STATUS: &str = "Bat.GetStatus";
/// Control command that changes the operating mode.
pub const ES_SET_MODE: &str = "ES.SetMode";

/// A single request to the device.
///
/// Commands are immutable. A new one is built for each invocation and its
/// encoded bytes are reused verbatim for every retry of that invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Command {
    id: u32,
    method: String,
    params: Map<String, Value>,
}

impl Command {
    /// Creates a command with explicit parameters.
    pub fn new(id: u32, method: impl Into<String>, params: Map<String, Value>) -> Self {
        Self {
            id,
            method: method.into(),
            params,
        }
    }

    /// Creates a read-only query, whose parameters are always `{"id":0}`.
    pub fn query(id: u32, method: impl Into<String>) -> Self {
        let mut params = Map::new();
        params.insert("id".into(), Value::from(0));
        Self::new(id, method, params)
    }

    /// Request identifier.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Method name, e.g. `ES.GetMode`.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Parameter object.
    pub fn params(&self) -> &Map<String, Value> {
        &self.params
    }

    /// Serializes the command to compact JSON bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        // A map of JSON values with string keys always serializes.
        serde_json::to_vec(self).unwrap_or_default()
    }
}
