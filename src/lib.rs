//! # Venus UDP Client Library
//!
//! A Rust library for talking to Marstek Venus home batteries over their
//! local JSON-over-UDP API.
//!
//! The device answers one small JSON request per datagram and tends to drop
//! packets, garble replies and report transient parse errors. This library
//! turns that into a well-typed result or a definitive failure within a
//! bounded time.
//!
//! ## Features
//!
//! - **Resilient** - escalating per-attempt timeouts, exponential backoff,
//!   retry only where a retry can help
//! - **Bounded** - every command finishes within a known worst case
//! - **Schema driven** - firmware differences live in a [`ProtocolSchema`]
//!   table, not in branches
//! - **Validated control** - mode changes are checked before anything is sent
//! - **No panics** - all errors returned as `Result<T, VenusError>`
//!
//! ## Quick Start
//!
//! ```no_run
//! use venus_udp::{Client, ClientConfig};
//!
//! #[tokio::main]
//! async fn main() -> venus_udp::Result<()> {
//!     let client = Client::new(ClientConfig::new("192.168.1.50"))?;
//!
//!     let snapshot = client.fetch_snapshot().await?;
//!     for (name, value) in snapshot.iter() {
//!         println!("{name} = {value}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Wire Protocol
//!
//! | Direction | Shape |
//! |-----------|-------|
//! | request | `{"id":1,"method":"ES.GetMode","params":{"id":0}}` |
//! | success | `{"id":1,"src":"VenusE-1","result":{...}}` |
//! | failure | `{"id":1,"src":"VenusE-1","error":{"code":-32700,"message":"Parse error"}}` |
//!
//! Requests are encoded by [`Command`] and replies decoded by [`decode`]
//! into an [`AttemptOutcome`]:
//!
//! ```
//! use venus_udp::{decode, AttemptOutcome, Command, ES_GET_MODE};
//!
//! let request = Command::query(7, ES_GET_MODE).to_bytes();
//! assert_eq!(request, br#"{"id":7,"method":"ES.GetMode","params":{"id":0}}"#);
//!
//! match decode(br#"{"id":7,"src":"VenusE-1","result":{"mode":"Auto"}}"#) {
//!     AttemptOutcome::Success(result) => assert_eq!(result["mode"], "Auto"),
//!     other => panic!("unexpected outcome: {other:?}"),
//! }
//! ```
//!
//! ## Retries
//!
//! Attempt `n` waits `timeout + (n - 1) * timeout_step`. Timeouts, socket
//! errors, unreadable replies and the device's `-32700` parse error are
//! retried after `backoff_unit * 2^n`. Any other device error is final.
//! See [`RetryPolicy`].
//!
//! ## Polling
//!
//! A [`Poller`] keeps the last good [`Snapshot`] and publishes it through a
//! `tokio::sync::watch` channel. A failed refresh keeps the previous
//! snapshot.
//!
//! ## Mode Control
//!
//! ```no_run
//! use venus_udp::{Client, ClientConfig, ManualSlot, ModeIntent, TimeOfDay, Weekday};
//!
//! # async fn run() -> venus_udp::Result<()> {
//! let client = Client::new(ClientConfig::new("192.168.1.50"))?;
//!
//! // Charge at 2.5 kW on weekday nights
//! let slot = ManualSlot::new(0)
//!     .window("01:00".parse()?, TimeOfDay::new(5, 0)?)
//!     .days(vec![Weekday::Monday, Weekday::Tuesday, Weekday::Wednesday])
//!     .power(-2500);
//! let accepted = client.set_mode(&ModeIntent::Manual(slot)).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! ```no_run
//! use venus_udp::{Client, ClientConfig, VenusError, ES_GET_MODE};
//!
//! # async fn run() -> venus_udp::Result<()> {
//! let client = Client::new(ClientConfig::new("192.168.1.50"))?;
//!
//! match client.query(ES_GET_MODE).await {
//!     Ok(result) => println!("Result: {result:?}"),
//!     Err(VenusError::Protocol { code, message }) => {
//!         println!("Device rejected the query: {code} {message}");
//!     }
//!     Err(VenusError::Exhausted { attempts, last, .. }) => {
//!         println!("No answer after {attempts} attempts: {last}");
//!     }
//!     Err(e) => println!("Error: {e}"),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Logging
//!
//! The library emits [`tracing`](https://docs.rs/tracing) events: `debug`
//! per attempt and snapshot, `warn` on retries and failed refreshes. Install
//! any subscriber to see them.

#![warn(clippy::all)]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

mod client;
mod command;
mod directory;
mod error;
mod mode;
mod poller;
mod response;
mod retry;
mod schema;
#[cfg(test)]
mod testing;
mod transport;
pub mod utils;

// Public re-exports
pub use client::{Client, ClientConfig, DEFAULT_SCAN_INTERVAL};
pub use command::{Command, BAT_GET_STATUS, ES_GET_MODE, ES_SET_MODE};
pub use directory::DeviceDirectory;
pub use error::{error_code_description, Result, VenusError, PARSE_ERROR_CODE};
pub use mode::{
    build_set_mode, ManualSlot, ModeIntent, OperatingMode, PassiveSetpoint, SetModeRequest,
    TimeOfDay, Weekday, DEFAULT_PASSIVE_DURATION, MAX_TIME_SLOT,
};
pub use poller::{PollState, Poller};
pub use response::{decode, AttemptOutcome};
pub use retry::{
    RetryEngine, RetryPolicy, DEFAULT_BASE_TIMEOUT, DEFAULT_MAX_ATTEMPTS, MAX_ATTEMPTS_LIMIT,
};
pub use schema::{
    FieldKind, FieldSpec, FieldValue, ProtocolSchema, ProtocolVariant, QuerySpec, Snapshot,
    BAT_CURRENT, BAT_POWER, BAT_TEMP, BAT_VOLTAGE, CHARGE_POWER, DISCHARGE_POWER, ES_MODE,
    LOAD_POWER, ONGRID_POWER, PV_POWER, SOC,
};
pub use transport::{Transport, UdpTransport, DEFAULT_PORT, MAX_DATAGRAM_SIZE};
