//! Error types for the Venus UDP protocol.

use std::io;
use thiserror::Error;

/// Result type alias for Venus operations.
pub type Result<T> = std::result::Result<T, VenusError>;

/// JSON-RPC error code reported when the device could not parse a request.
///
/// This is the only device-reported code that is worth retrying: the device
/// firmware occasionally drops bytes from incoming datagrams.
pub const PARSE_ERROR_CODE: i64 = -32700;

/// Errors that can occur while talking to a Venus battery.
#[derive(Debug, Error)]
pub enum VenusError {
    /// A mode intent or configuration value was rejected before any I/O.
    #[error("Invalid parameter '{parameter}': {reason}")]
    Validation {
        /// Name of the invalid parameter.
        parameter: String,
        /// Description of why the parameter is invalid.
        reason: String,
    },

    /// No reply arrived within the attempt's timeout.
    #[error("Communication timeout")]
    Timeout,

    /// Socket-level failure (bind, send, receive, resolve).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The datagram was not a JSON envelope.
    #[error("Decode failure: {reason}")]
    Decode {
        /// Description of the decode failure.
        reason: String,
    },

    /// The envelope parsed but carried neither a usable `result` nor `error`.
    #[error("Unexpected response: {reason}")]
    UnexpectedResponse {
        /// Description of the unexpected shape.
        reason: String,
    },

    /// Error object returned by the device.
    #[error("Device error {code}: {message}")]
    Protocol {
        /// JSON-RPC error code.
        code: i64,
        /// Message supplied by the device.
        message: String,
    },

    /// Every attempt of a command failed.
    #[error("Command {method} failed after {attempts} attempts")]
    Exhausted {
        /// Method name of the command.
        method: String,
        /// Number of attempts made.
        attempts: u32,
        /// Failure of the final attempt.
        #[source]
        last: Box<VenusError>,
    },

    /// Configuration could not be loaded.
    #[error("Invalid configuration: {reason}")]
    Config {
        /// Description of the configuration error.
        reason: String,
    },

    /// No client is registered under the given device id.
    #[error("Unknown device '{device_id}'")]
    UnknownDevice {
        /// The device id that was looked up.
        device_id: String,
    },
}

impl VenusError {
    /// Creates a new `Validation` error.
    ///
    /// # Example
    ///
    /// ```
    /// use venus_udp::VenusError;
    ///
    /// let err = VenusError::validation("time_num", "must be 0-9");
    /// assert_eq!(err.to_string(), "Invalid parameter 'time_num': must be 0-9");
    /// ```
    pub fn validation(parameter: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            parameter: parameter.into(),
            reason: reason.into(),
        }
    }

    /// Creates a new `Decode` error.
    pub fn decode(reason: impl Into<String>) -> Self {
        Self::Decode {
            reason: reason.into(),
        }
    }

    /// Creates a new `UnexpectedResponse` error.
    pub fn unexpected_response(reason: impl Into<String>) -> Self {
        Self::UnexpectedResponse {
            reason: reason.into(),
        }
    }

    /// Creates a new `Protocol` error.
    ///
    /// # Example
    ///
    /// ```
    /// use venus_udp::{VenusError, PARSE_ERROR_CODE};
    ///
    /// let err = VenusError::protocol(PARSE_ERROR_CODE, "Parse error");
    /// assert!(err.is_retryable());
    /// ```
    pub fn protocol(code: i64, message: impl Into<String>) -> Self {
        Self::Protocol {
            code,
            message: message.into(),
        }
    }

    /// Creates a new `Config` error.
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }

    /// Returns whether another attempt of the same command may succeed.
    ///
    /// Transport faults, undecodable or oddly shaped replies and the parse
    /// error code are transient. Any other device error means the device
    /// rejected the request outright.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout
            | Self::Io(_)
            | Self::Decode { .. }
            | Self::UnexpectedResponse { .. } => true,
            Self::Protocol { code, .. } => *code == PARSE_ERROR_CODE,
            Self::Validation { .. }
            | Self::Exhausted { .. }
            | Self::Config { .. }
            | Self::UnknownDevice { .. } => false,
        }
    }

    /// Formats the error followed by each of its causes, separated by `: `.
    pub fn report(&self) -> String {
        let mut report = self.to_string();
        let mut cause = std::error::Error::source(self);
        while let Some(err) = cause {
            report.push_str(": ");
            report.push_str(&err.to_string());
            cause = err.source();
        }
        report
    }
}

/// Returns a human-readable description of a JSON-RPC error code.
///
/// # Example
///
/// ```
/// use venus_udp::error_code_description;
///
/// assert_eq!(error_code_description(-32700), "Parse error");
/// assert_eq!(error_code_description(-32601), "Method not found");
/// ```
pub fn error_code_description(code: i64) -> &'static str {
    match code {
        PARSE_ERROR_CODE => "Parse error",
        -32600 => "Invalid request",
        -32601 => "Method not found",
        -32602 => "Invalid params",
        -32603 => "Internal error",
        -32099..=-32000 => "Server error",
        _ => "Unknown error",
    }
}
