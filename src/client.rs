//! High-level client for one Venus battery.
//!
//! This module provides [`ClientConfig`] and [`Client`], the entry point for
//! queries and control commands.
//!
//! # Overview
//!
//! The client handles:
//! - Request id allocation
//! - One outstanding command at a time
//! - Retries through the [`RetryEngine`]
//! - Mapping query replies into a [`Snapshot`] with the configured schema
//! - Building and confirming `ES.SetMode`
//!
//! # Example
//!
//! ```no_run
//! use venus_udp::{Client, ClientConfig, ModeIntent, PassiveSetpoint};
//!
//! # async fn run() -> venus_udp::Result<()> {
//! let client = Client::new(ClientConfig::new("192.168.1.50"))?;
//!
//! let snapshot = client.fetch_snapshot().await?;
//! println!("SoC: {:?}", snapshot.get_f64("soc"));
//!
//! let accepted = client
//!     .set_mode(&ModeIntent::Passive(PassiveSetpoint { power: -1500, cd_time: Some(600) }))
//!     .await?;
//! println!("accepted: {accepted}");
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration
//!
//! [`ClientConfig`] is built in code with `with_*` methods or loaded from
//! JSON. Durations in JSON are seconds and may be fractional:
//!
//! ```
//! use std::time::Duration;
//! use venus_udp::{ClientConfig, ProtocolVariant};
//!
//! let config = ClientConfig::from_json(
//!     r#"{"host":"192.168.1.50","timeout":2.5,"variant":"unified"}"#,
//! )?;
//! assert_eq!(config.port, 30000);
//! assert_eq!(config.timeout, Duration::from_millis(2500));
//! assert_eq!(config.variant, ProtocolVariant::Unified);
//! # Ok::<(), venus_udp::VenusError>(())
//! ```
//!
//! # Concurrency
//!
//! A `Client` is `Send + Sync` and is meant to be shared behind an `Arc`
//! by a poller and control callers. Commands from different tasks queue on
//! an async mutex; they never interleave on the wire.

use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::command::Command;
use crate::error::{Result, VenusError};
use crate::mode::{build_set_mode, ModeIntent};
use crate::retry::{RetryEngine, RetryPolicy, DEFAULT_BASE_TIMEOUT, DEFAULT_MAX_ATTEMPTS};
use crate::schema::{ProtocolSchema, ProtocolVariant, Snapshot};
use crate::transport::{Transport, UdpTransport, DEFAULT_PORT};

/// Default time between polls.
pub const DEFAULT_SCAN_INTERVAL: Duration = Duration::from_secs(60);

/// Configuration for creating a [`Client`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Device host name or IP address.
    pub host: String,
    /// Device UDP port.
    pub port: u16,
    /// Time between polls.
    #[serde(with = "duration_secs")]
    pub scan_interval: Duration,
    /// Timeout of the first attempt of each command.
    #[serde(with = "duration_secs")]
    pub timeout: Duration,
    /// Attempts per command.
    pub max_attempts: u32,
    /// Firmware schema.
    pub variant: ProtocolVariant,
    /// Backoff after attempt `n` is `backoff_unit * 2^n`.
    #[serde(with = "duration_secs")]
    pub backoff_unit: Duration,
    /// Added to the timeout for each further attempt.
    #[serde(with = "duration_secs")]
    pub timeout_step: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            host: String::new(),
            port: DEFAULT_PORT,
            scan_interval: DEFAULT_SCAN_INTERVAL,
            timeout: DEFAULT_BASE_TIMEOUT,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            variant: ProtocolVariant::default(),
            backoff_unit: policy.backoff_unit,
            timeout_step: policy.timeout_step,
        }
    }
}

impl ClientConfig {
    /// Creates a configuration with default settings for the device at `host`.
    ///
    /// # Example
    ///
    /// ```
    /// use venus_udp::ClientConfig;
    ///
    /// let config = ClientConfig::new("192.168.1.50");
    /// assert_eq!(config.port, 30000);
    /// assert_eq!(config.max_attempts, 3);
    /// ```
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Self::default()
        }
    }

    /// Sets a custom device port (default is 30000).
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the time between polls (default is 60 seconds).
    pub fn with_scan_interval(mut self, interval: Duration) -> Self {
        self.scan_interval = interval;
        self
    }

    /// Sets the first-attempt timeout (default is 2 seconds).
    ///
    /// # Example
    ///
    /// ```
    /// use std::time::Duration;
    /// use venus_udp::ClientConfig;
    ///
    /// let config = ClientConfig::new("192.168.1.50")
    ///     .with_timeout(Duration::from_secs(5))
    ///     .with_max_attempts(5);
    /// assert_eq!(config.retry_policy().attempt_timeout(2), Duration::from_secs(6));
    /// ```
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the number of attempts per command (default is 3).
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Selects the firmware schema (default is legacy).
    pub fn with_variant(mut self, variant: ProtocolVariant) -> Self {
        self.variant = variant;
        self
    }

    /// Sets the backoff unit (default is 1 second).
    pub fn with_backoff_unit(mut self, unit: Duration) -> Self {
        self.backoff_unit = unit;
        self
    }

    /// Sets the per-attempt timeout increase (default is 1 second).
    pub fn with_timeout_step(mut self, step: Duration) -> Self {
        self.timeout_step = step;
        self
    }

    /// The retry schedule described by this configuration.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_timeout: self.timeout,
            timeout_step: self.timeout_step,
            backoff_unit: self.backoff_unit,
        }
    }

    /// Checks the configuration without touching the network.
    ///
    /// # Errors
    ///
    /// Returns `VenusError::Validation` for an empty host, port 0, a zero
    /// scan interval, or a retry schedule that cannot run.
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(VenusError::validation("host", "must not be empty"));
        }
        if self.port == 0 {
            return Err(VenusError::validation("port", "must not be 0"));
        }
        if self.scan_interval.is_zero() {
            return Err(VenusError::validation("scan_interval", "must be greater than 0"));
        }
        self.retry_policy().validate()
    }

    /// Parses and validates a JSON configuration.
    ///
    /// Missing keys take their defaults; `host` is required.
    ///
    /// # Errors
    ///
    /// Returns `VenusError::Config` for malformed JSON or values of the wrong
    /// type, and `VenusError::Validation` if the result fails [`validate`].
    ///
    /// [`validate`]: ClientConfig::validate
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| VenusError::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a JSON configuration file.
    ///
    /// # Errors
    ///
    /// As [`from_json`](ClientConfig::from_json), plus `VenusError::Config`
    /// if the file cannot be read.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| VenusError::config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_json(&json)
    }
}

/// Durations as (fractional) seconds.
mod duration_secs {
    use std::time::Duration;

    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(
        duration: &Duration,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_f64(duration.as_secs_f64())
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs)
            .map_err(|e| D::Error::custom(format!("invalid duration {secs}: {e}")))
    }
}

/// Client for one Venus battery.
///
/// Every command goes through the retry engine. At most one command is on
/// the wire at a time; concurrent callers wait their turn.
///
/// # Example
///
/// ```no_run
/// use venus_udp::{Client, ClientConfig, ES_GET_MODE};
///
/// # async fn run() -> venus_udp::Result<()> {
/// let client = Client::new(ClientConfig::new("192.168.1.50"))?;
/// let result = client.query(ES_GET_MODE).await?;
/// println!("{result:?}");
/// # Ok(())
/// # }
/// ```
pub struct Client<T = UdpTransport> {
    engine: RetryEngine<T>,
    config: ClientConfig,
    schema: ProtocolSchema,
    next_id: AtomicU32,
    gate: Mutex<()>,
}

impl Client<UdpTransport> {
    /// Creates a client that talks UDP to `config.host:config.port`.
    ///
    /// No socket is opened until the first command.
    ///
    /// # Errors
    ///
    /// Returns `VenusError::Validation` if the configuration is invalid.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let transport = UdpTransport::new(config.host.clone(), config.port);
        Self::with_transport(transport, config)
    }
}

impl<T: Transport> Client<T> {
    /// Creates a client over any transport, with the schema of
    /// `config.variant`.
    ///
    /// # Errors
    ///
    /// Returns `VenusError::Validation` if the configuration is invalid.
    pub fn with_transport(transport: T, config: ClientConfig) -> Result<Self> {
        let schema = config.variant.schema();
        Self::with_schema(transport, config, schema)
    }

    /// Creates a client with a custom field mapping.
    ///
    /// # Errors
    ///
    /// Returns `VenusError::Validation` if the configuration is invalid.
    pub fn with_schema(transport: T, config: ClientConfig, schema: ProtocolSchema) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            engine: RetryEngine::new(transport, config.retry_policy()),
            config,
            schema,
            next_id: AtomicU32::new(1),
            gate: Mutex::new(()),
        })
    }

    /// Allocates the next request id. Ids wrap and skip 0.
    fn next_id(&self) -> u32 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        if id != 0 {
            return id;
        }
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    async fn execute(&self, command: Command) -> Result<Map<String, Value>> {
        let _turn = self.gate.lock().await;
        self.engine.execute(&command).await
    }

    /// Sends a parameterless query (`params: {"id":0}`) and returns the raw
    /// `result` object.
    ///
    /// # Errors
    ///
    /// Returns `VenusError::Protocol` if the device rejects the query and
    /// `VenusError::Exhausted` if no attempt succeeded.
    pub async fn query(&self, method: &str) -> Result<Map<String, Value>> {
        self.execute(Command::query(self.next_id(), method)).await
    }

    /// Runs every query of the schema in order and maps the replies into a
    /// new snapshot.
    ///
    /// # Errors
    ///
    /// Fails as soon as any query fails; no partial snapshot is returned.
    pub async fn fetch_snapshot(&self) -> Result<Snapshot> {
        let mut snapshot = Snapshot::default();
        for query in self.schema.queries() {
            let payload = self.query(&query.method).await?;
            query.extract(&payload, &mut snapshot);
        }
        debug!(host = %self.config.host, fields = snapshot.len(), "snapshot fetched");
        Ok(snapshot)
    }

    /// Switches the operating mode.
    ///
    /// Returns `Ok(true)` only if the device confirms with `"success": true`
    /// (or `1`). A reply without that flag is `Ok(false)`.
    ///
    /// # Errors
    ///
    /// - `VenusError::Validation` if the intent is invalid; nothing is sent
    /// - `VenusError::Protocol` if the device rejects the command
    /// - `VenusError::Exhausted` if no attempt succeeded
    ///
    /// # Example
    ///
    /// ```no_run
    /// use venus_udp::{Client, ClientConfig, ManualSlot, ModeIntent, TimeOfDay, Weekday};
    ///
    /// # async fn run() -> venus_udp::Result<()> {
    /// let client = Client::new(ClientConfig::new("192.168.1.50"))?;
    /// let slot = ManualSlot::new(1)
    ///     .window(TimeOfDay::new(17, 0)?, TimeOfDay::new(22, 0)?)
    ///     .days(vec![Weekday::Monday, Weekday::Friday])
    ///     .power(2000);
    /// client.set_mode(&ModeIntent::Manual(slot)).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn set_mode(&self, intent: &ModeIntent) -> Result<bool> {
        let command = build_set_mode(self.next_id(), intent)?;
        let result = self.execute(command).await?;

        let accepted = success_flag(&result);
        if accepted {
            debug!(host = %self.config.host, mode = %intent.mode(), "mode change accepted");
        } else {
            warn!(host = %self.config.host, mode = %intent.mode(), ?result, "mode change not confirmed");
        }
        Ok(accepted)
    }

    /// The configuration this client was built from.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The active field mapping.
    pub fn schema(&self) -> &ProtocolSchema {
        &self.schema
    }

    /// The retry schedule.
    pub fn policy(&self) -> &RetryPolicy {
        self.engine.policy()
    }

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        self.engine.transport()
    }
}

fn success_flag(result: &Map<String, Value>) -> bool {
    match result.get("success") {
        Some(Value::Bool(flag)) => *flag,
        Some(Value::Number(n)) => n.as_i64() == Some(1),
        _ => false,
    }
}

impl<T> fmt::Debug for Client<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("host", &self.config.host)
            .field("port", &self.config.port)
            .field("variant", &self.config.variant)
            .field("next_id", &self.next_id.load(Ordering::Relaxed))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{BAT_GET_STATUS, ES_GET_MODE, ES_SET_MODE};
    use crate::mode::{ManualSlot, PassiveSetpoint, TimeOfDay};
    use crate::retry::MAX_ATTEMPTS_LIMIT;
    use crate::testing::{ScriptedTransport, Step};
    use serde_json::json;
    use std::sync::Arc;

    fn client(steps: Vec<Step>, config: ClientConfig) -> (Client<ScriptedTransport>, ScriptedTransport) {
        let transport = ScriptedTransport::new(steps);
        let client = Client::with_transport(transport.clone(), config).unwrap();
        (client, transport)
    }

    fn sent(transport: &ScriptedTransport) -> Vec<Value> {
        transport
            .requests()
            .iter()
            .map(|r| serde_json::from_slice(r).unwrap())
            .collect()
    }

    #[test]
    fn test_client_config_new() {
        let config = ClientConfig::new("192.168.1.50");

        assert_eq!(config.host, "192.168.1.50");
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.scan_interval, Duration::from_secs(60));
        assert_eq!(config.timeout, Duration::from_secs(2));
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.variant, ProtocolVariant::Legacy);
        assert_eq!(config.retry_policy(), RetryPolicy::default());
    }

    #[test]
    fn test_client_config_builders() {
        let config = ClientConfig::new("venus.local")
            .with_port(30001)
            .with_scan_interval(Duration::from_secs(30))
            .with_timeout(Duration::from_millis(1500))
            .with_max_attempts(5)
            .with_variant(ProtocolVariant::Unified)
            .with_backoff_unit(Duration::from_millis(500))
            .with_timeout_step(Duration::from_millis(250));

        assert_eq!(config.port, 30001);
        assert_eq!(config.scan_interval, Duration::from_secs(30));
        assert_eq!(config.variant, ProtocolVariant::Unified);
        let policy = config.retry_policy();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.attempt_timeout(3), Duration::from_millis(2000));
        assert_eq!(policy.backoff(1), Duration::from_secs(1));
    }

    #[test]
    fn test_client_config_validate() {
        assert!(ClientConfig::new("10.0.0.2").validate().is_ok());
        assert!(matches!(
            ClientConfig::new("  ").validate(),
            Err(VenusError::Validation { ref parameter, .. }) if parameter == "host"
        ));
        assert!(ClientConfig::new("10.0.0.2").with_port(0).validate().is_err());
        assert!(ClientConfig::new("10.0.0.2")
            .with_max_attempts(0)
            .validate()
            .is_err());
        assert!(ClientConfig::new("10.0.0.2")
            .with_scan_interval(Duration::ZERO)
            .validate()
            .is_err());
    }

    #[test]
    fn test_client_config_from_json() {
        let config = ClientConfig::from_json(
            r#"{
                "host": "192.168.1.50",
                "port": 30002,
                "scan_interval": 15,
                "timeout": 0.5,
                "max_attempts": 4,
                "variant": "unified",
                "backoff_unit": 0.25,
                "timeout_step": 2
            }"#,
        )
        .unwrap();

        assert_eq!(config.port, 30002);
        assert_eq!(config.scan_interval, Duration::from_secs(15));
        assert_eq!(config.timeout, Duration::from_millis(500));
        assert_eq!(config.max_attempts, 4);
        assert_eq!(config.variant, ProtocolVariant::Unified);
        assert_eq!(config.backoff_unit, Duration::from_millis(250));
        assert_eq!(config.timeout_step, Duration::from_secs(2));
    }

    #[test]
    fn test_client_config_rejects_runaway_attempts() {
        let err =
            ClientConfig::from_json(r#"{"host":"h","max_attempts":4000000000}"#).unwrap_err();
        assert!(matches!(
            err,
            VenusError::Validation { ref parameter, .. } if parameter == "max_attempts"
        ));
        assert!(ClientConfig::new("h")
            .with_max_attempts(MAX_ATTEMPTS_LIMIT + 1)
            .validate()
            .is_err());
        let at_limit = ClientConfig::new("h").with_max_attempts(MAX_ATTEMPTS_LIMIT);
        assert!(Client::new(at_limit).is_ok());
    }

    #[test]
    fn test_client_config_from_json_defaults() {
        let config = ClientConfig::from_json(r#"{"host":"venus.local"}"#).unwrap();
        assert_eq!(config, ClientConfig::new("venus.local"));
    }

    #[test]
    fn test_client_config_from_json_errors() {
        assert!(matches!(
            ClientConfig::from_json("{not json"),
            Err(VenusError::Config { .. })
        ));
        assert!(matches!(
            ClientConfig::from_json(r#"{"host":"h","timeout":-1}"#),
            Err(VenusError::Config { .. })
        ));
        assert!(matches!(
            ClientConfig::from_json(r#"{"host":"h","variant":"v3"}"#),
            Err(VenusError::Config { .. })
        ));
        assert!(matches!(
            ClientConfig::from_json(r#"{"port":30000}"#),
            Err(VenusError::Validation { .. })
        ));
        assert!(matches!(
            ClientConfig::from_json(r#"{"host":"h","max_attempts":0}"#),
            Err(VenusError::Validation { .. })
        ));
    }

    #[test]
    fn test_client_config_from_missing_file() {
        let err = ClientConfig::from_file("/nonexistent/venus.json").unwrap_err();
        assert!(matches!(err, VenusError::Config { .. }));
    }

    #[test]
    fn test_client_config_json_round_trip() {
        let config = ClientConfig::new("venus.local").with_timeout(Duration::from_millis(2500));
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(ClientConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn test_client_creation_rejects_bad_config() {
        assert!(Client::new(ClientConfig::new("")).is_err());
        assert!(Client::new(ClientConfig::new("127.0.0.1")).is_ok());
    }

    #[test]
    fn test_client_id_increment() {
        let client = Client::new(ClientConfig::new("127.0.0.1")).unwrap();

        assert_eq!(client.next_id(), 1);
        assert_eq!(client.next_id(), 2);
        assert_eq!(client.next_id(), 3);
    }

    #[test]
    fn test_client_id_wraps_past_zero() {
        let client = Client::new(ClientConfig::new("127.0.0.1")).unwrap();
        client.next_id.store(u32::MAX, Ordering::Relaxed);

        assert_eq!(client.next_id(), u32::MAX);
        assert_eq!(client.next_id(), 1);
    }

    #[test]
    fn test_client_debug() {
        let client = Client::new(ClientConfig::new("127.0.0.1")).unwrap();
        let debug_str = format!("{:?}", client);
        assert!(debug_str.contains("Client"));
        assert!(debug_str.contains("127.0.0.1"));
    }

    #[test]
    fn test_success_flag() {
        let flag = |v: Value| success_flag(v.as_object().unwrap());
        assert!(flag(json!({"success": true})));
        assert!(flag(json!({"success": 1})));
        assert!(!flag(json!({"success": false})));
        assert!(!flag(json!({"success": 0})));
        assert!(!flag(json!({"success": "true"})));
        assert!(!flag(json!({})));
    }

    #[tokio::test(start_paused = true)]
    async fn test_query_sends_id_param() {
        let (client, transport) = client(
            vec![Step::reply(r#"{"id":1,"src":"VenusE-1","result":{"mode":0}}"#)],
            ClientConfig::new("127.0.0.1"),
        );

        let result = client.query(ES_GET_MODE).await.unwrap();

        assert_eq!(result["mode"], 0);
        assert_eq!(
            sent(&transport),
            vec![json!({"id":1,"method":"ES.GetMode","params":{"id":0}})]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_snapshot_legacy_runs_both_queries() {
        let (client, transport) = client(
            vec![
                Step::reply(r#"{"id":1,"src":"v","result":{"mode":2,"ongridPower":-120,"pvPower":0}}"#),
                Step::reply(r#"{"id":2,"src":"v","result":{"soc":64,"temp":23.5,"voltage":5312,"current":210}}"#),
            ],
            ClientConfig::new("127.0.0.1"),
        );

        let snapshot = client.fetch_snapshot().await.unwrap();

        let methods: Vec<_> = sent(&transport)
            .iter()
            .map(|r| r["method"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(methods, vec![ES_GET_MODE, BAT_GET_STATUS]);
        assert_eq!(snapshot.get_str("es_mode"), Some("Manual"));
        assert_eq!(snapshot.get_i64("ongrid_power"), Some(-120));
        assert_eq!(snapshot.get_i64("soc"), Some(64));
        assert_eq!(snapshot.get_f64("bat_voltage"), Some(53.12));
        assert_eq!(snapshot.get_f64("bat_current"), Some(2.10));
        assert!(snapshot.get("load_power").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_snapshot_fails_whole_on_any_query() {
        let (client, transport) = client(
            vec![
                Step::reply(r#"{"id":1,"src":"v","result":{"mode":0}}"#),
                Step::reply(r#"{"id":2,"src":"v","error":{"code":-32601,"message":"Method not found"}}"#),
            ],
            ClientConfig::new("127.0.0.1"),
        );

        let err = client.fetch_snapshot().await.unwrap_err();
        assert!(matches!(err, VenusError::Protocol { code: -32601, .. }));
        assert_eq!(transport.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_snapshot_unified_after_timeouts() {
        let (client, transport) = client(
            vec![
                Step::Silent,
                Step::Silent,
                Step::reply(r#"{"id":1,"src":"VenusE-1","result":{"bat_soc":81,"mode":"Auto"}}"#),
            ],
            ClientConfig::new("127.0.0.1").with_variant(ProtocolVariant::Unified),
        );
        let start = tokio::time::Instant::now();

        let snapshot = client.fetch_snapshot().await.unwrap();

        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(11) && elapsed < Duration::from_millis(11_050));
        assert_eq!(snapshot.get_i64("soc"), Some(81));
        assert_eq!(snapshot.get_str("es_mode"), Some("Auto"));
        assert_eq!(transport.call_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_mode_confirmed() {
        let (client, transport) = client(
            vec![Step::reply(r#"{"id":1,"src":"v","result":{"id":0,"set_result":true,"success":true}}"#)],
            ClientConfig::new("127.0.0.1"),
        );

        assert!(client.set_mode(&ModeIntent::Auto).await.unwrap());
        assert_eq!(
            sent(&transport),
            vec![json!({"id":1,"method":ES_SET_MODE,"params":{"id":0,"mode":0}})]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_mode_success_as_integer() {
        let (client, _) = client(
            vec![Step::reply(r#"{"id":1,"src":"v","result":{"success":1}}"#)],
            ClientConfig::new("127.0.0.1"),
        );
        let intent = ModeIntent::Passive(PassiveSetpoint {
            power: -800,
            cd_time: None,
        });
        assert!(client.set_mode(&intent).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_mode_without_success_flag_is_false() {
        let (client, _) = client(
            vec![Step::reply(r#"{"id":1,"src":"v","result":{"id":0}}"#)],
            ClientConfig::new("127.0.0.1"),
        );
        assert!(!client.set_mode(&ModeIntent::Ai).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_mode_invalid_intent_sends_nothing() {
        let (client, transport) = client(vec![], ClientConfig::new("127.0.0.1"));
        let intent = ModeIntent::Manual(ManualSlot::new(1).power(2000));

        let err = client.set_mode(&intent).await.unwrap_err();

        assert!(matches!(err, VenusError::Validation { .. }));
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_mode_manual_payload() {
        let (client, transport) = client(
            vec![Step::reply(r#"{"id":1,"src":"v","result":{"success":true}}"#)],
            ClientConfig::new("127.0.0.1"),
        );
        let slot = ManualSlot::new(2)
            .window(TimeOfDay::new(8, 30).unwrap(), TimeOfDay::new(16, 0).unwrap())
            .power(-2500);

        client.set_mode(&ModeIntent::Manual(slot)).await.unwrap();

        let request = &sent(&transport)[0];
        assert_eq!(
            request["params"]["config"]["manual_cfg"],
            json!({
                "time_num": 2,
                "start_time": "08:30",
                "end_time": "16:00",
                "week_set": 127,
                "power": -2500,
                "enable": 1
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_commands_do_not_interleave() {
        let (client, transport) = client(
            vec![
                Step::Silent,
                Step::reply(r#"{"id":1,"src":"v","result":{"mode":0}}"#),
                Step::reply(r#"{"id":2,"src":"v","result":{"success":true}}"#),
            ],
            ClientConfig::new("127.0.0.1"),
        );
        let client = Arc::new(client);

        let (query, set) = tokio::join!(client.query(ES_GET_MODE), client.set_mode(&ModeIntent::Auto));

        query.unwrap();
        assert!(set.unwrap());
        let ids: Vec<_> = sent(&transport).iter().map(|r| r["id"].as_u64().unwrap()).collect();
        assert_eq!(ids, vec![1, 1, 2]);
    }
}
