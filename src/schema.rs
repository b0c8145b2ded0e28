//! Field mapping from device payloads to snapshot values.
//!
//! Two firmware generations report the same quantities in different shapes:
//!
//! | | Legacy | Unified |
//! |---|---|---|
//! | Queries | `ES.GetMode` + `Bat.GetStatus` | `ES.GetMode` |
//! | Field names | camelCase / short (`ongridPower`, `soc`) | snake_case (`ongrid_power`, `bat_soc`) |
//! | Voltage, current | raw, hundredths (`5312` = 53.12 V) | pre-scaled |
//! | Mode | integer code | string |
//!
//! Rather than branching on firmware, a [`ProtocolSchema`] lists the queries
//! to run and, for each, which payload field lands in which snapshot field
//! and how it is converted. The table is plain data and can be loaded from
//! JSON for firmware not covered by the presets.
//!
//! # Example
//!
//! ```
//! use serde_json::json;
//! use venus_udp::{ProtocolSchema, Snapshot, FieldValue};
//!
//! let schema = ProtocolSchema::legacy();
//! let status = &schema.queries()[1];
//!
//! let payload = json!({"soc": 76, "voltage": 5312, "current": 210});
//! let mut snapshot = Snapshot::default();
//! status.extract(payload.as_object().unwrap(), &mut snapshot);
//!
//! assert_eq!(snapshot.get("soc"), Some(&FieldValue::Integer(76)));
//! assert_eq!(snapshot.get_f64("bat_voltage"), Some(53.12));
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::command::{BAT_GET_STATUS, ES_GET_MODE};
use crate::mode::OperatingMode;

/// Snapshot field: state of charge, percent.
pub const SOC: &str = "soc";
/// Snapshot field: battery temperature, °C.
pub const BAT_TEMP: &str = "bat_temp";
/// Snapshot field: battery voltage, V.
pub const BAT_VOLTAGE: &str = "bat_voltage";
/// Snapshot field: battery current, A.
pub const BAT_CURRENT: &str = "bat_current";
/// Snapshot field: battery power, W.
pub const BAT_POWER: &str = "bat_power";
/// Snapshot field: grid power, W.
pub const ONGRID_POWER: &str = "ongrid_power";
/// Snapshot field: household load, W.
pub const LOAD_POWER: &str = "load_power";
/// Snapshot field: PV input, W.
pub const PV_POWER: &str = "pv_power";
/// Snapshot field: charge power, W.
pub const CHARGE_POWER: &str = "charge_power";
/// Snapshot field: discharge power, W.
pub const DISCHARGE_POWER: &str = "discharge_power";
/// Snapshot field: operating mode name.
pub const ES_MODE: &str = "es_mode";

/// A typed snapshot value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Whole number.
    Integer(i64),
    /// Real number.
    Float(f64),
    /// Enumerated or free text.
    Text(String),
}

impl FieldValue {
    /// Returns the value as `f64` if it is numeric.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Integer(v) => Some(*v as f64),
            FieldValue::Float(v) => Some(*v),
            FieldValue::Text(_) => None,
        }
    }

    /// Returns the value as `i64` if it is an integer.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the value as text if it is text.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Integer(v) => write!(f, "{v}"),
            FieldValue::Float(v) => write!(f, "{v}"),
            FieldValue::Text(v) => f.write_str(v),
        }
    }
}

/// Last-known device state: named fields with typed values.
///
/// A snapshot is built whole from one successful refresh and never updated
/// in place afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Snapshot {
    fields: BTreeMap<String, FieldValue>,
}

impl Snapshot {
    /// Returns a field.
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Returns a numeric field as `f64`.
    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(FieldValue::as_f64)
    }

    /// Returns an integer field.
    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(FieldValue::as_i64)
    }

    /// Returns a text field.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(FieldValue::as_str)
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the snapshot has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterates over fields in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub(crate) fn insert(&mut self, name: impl Into<String>, value: FieldValue) {
        self.fields.insert(name.into(), value);
    }
}

/// How a payload value is converted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Whole number, copied as is.
    Integer,
    /// Real number, copied as is.
    Float,
    /// Number divided by the given divisor, stored as a real number.
    Scaled(f64),
    /// Integer mode code, stored as the mode name (`"Unknown"` if unrecognised).
    ModeCode,
    /// String, copied as is.
    Text,
}

impl FieldKind {
    /// Converts a payload value, or returns `None` if it has the wrong type.
    pub fn convert(self, value: &Value) -> Option<FieldValue> {
        match self {
            FieldKind::Integer => value
                .as_i64()
                .or_else(|| value.as_f64().filter(|v| v.fract() == 0.0).map(|v| v as i64))
                .map(FieldValue::Integer),
            FieldKind::Float => value.as_f64().map(FieldValue::Float),
            FieldKind::Scaled(divisor) => value.as_f64().map(|v| FieldValue::Float(v / divisor)),
            FieldKind::ModeCode => match value {
                Value::String(name) => Some(FieldValue::Text(name.clone())),
                other => {
                    let name = other
                        .as_i64()
                        .and_then(OperatingMode::from_code)
                        .map_or("Unknown", OperatingMode::name);
                    Some(FieldValue::Text(name.to_string()))
                }
            },
            FieldKind::Text => value.as_str().map(|s| FieldValue::Text(s.to_string())),
        }
    }
}

/// Maps one payload field to one snapshot field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Key in the device's `result` object.
    pub source: String,
    /// Snapshot field name.
    pub target: String,
    /// Conversion.
    pub kind: FieldKind,
}

impl FieldSpec {
    /// Creates a field mapping.
    pub fn new(source: impl Into<String>, target: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            kind,
        }
    }
}

/// One query and the fields it contributes to a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuerySpec {
    /// Method to call, e.g. `ES.GetMode`.
    pub method: String,
    /// Field mappings for the reply.
    pub fields: Vec<FieldSpec>,
}

impl QuerySpec {
    /// Creates a query mapping.
    pub fn new(method: impl Into<String>, fields: Vec<FieldSpec>) -> Self {
        Self {
            method: method.into(),
            fields,
        }
    }

    /// Copies every mapped field present in `payload` into `snapshot`.
    ///
    /// Fields that are missing or have the wrong type are skipped.
    pub fn extract(&self, payload: &Map<String, Value>, snapshot: &mut Snapshot) {
        for field in &self.fields {
            match payload.get(&field.source).and_then(|v| field.kind.convert(v)) {
                Some(value) => snapshot.insert(field.target.clone(), value),
                None => tracing::debug!(
                    method = %self.method,
                    field = %field.source,
                    "field missing or mistyped in reply"
                ),
            }
        }
    }
}

/// Preset schemas for known firmware generations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolVariant {
    /// Two queries, raw hundredths, integer mode code.
    #[default]
    Legacy,
    /// One query, pre-scaled snake_case fields, string mode.
    Unified,
}

impl ProtocolVariant {
    /// Returns the preset schema for this variant.
    pub fn schema(self) -> ProtocolSchema {
        match self {
            ProtocolVariant::Legacy => ProtocolSchema::legacy(),
            ProtocolVariant::Unified => ProtocolSchema::unified(),
        }
    }
}

/// The queries that make up one refresh and how their replies are mapped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolSchema {
    queries: Vec<QuerySpec>,
}

impl ProtocolSchema {
    /// Creates a schema from query mappings, run in the given order.
    pub fn new(queries: Vec<QuerySpec>) -> Self {
        Self { queries }
    }

    /// Schema of the original firmware: `ES.GetMode` then `Bat.GetStatus`.
    pub fn legacy() -> Self {
        use FieldKind::*;
        Self::new(vec![
            QuerySpec::new(
                ES_GET_MODE,
                vec![
                    FieldSpec::new("mode", ES_MODE, ModeCode),
                    FieldSpec::new("ongridPower", ONGRID_POWER, Integer),
                    FieldSpec::new("loadPower", LOAD_POWER, Integer),
                    FieldSpec::new("pvPower", PV_POWER, Integer),
                    FieldSpec::new("chargePower", CHARGE_POWER, Integer),
                    FieldSpec::new("dischargePower", DISCHARGE_POWER, Integer),
                ],
            ),
            QuerySpec::new(
                BAT_GET_STATUS,
                vec![
                    FieldSpec::new("soc", SOC, Integer),
                    FieldSpec::new("temp", BAT_TEMP, Float),
                    FieldSpec::new("voltage", BAT_VOLTAGE, Scaled(100.0)),
                    FieldSpec::new("current", BAT_CURRENT, Scaled(100.0)),
                    FieldSpec::new("power", BAT_POWER, Integer),
                ],
            ),
        ])
    }

    /// Schema of newer firmware: everything from one `ES.GetMode`.
    pub fn unified() -> Self {
        use FieldKind::*;
        Self::new(vec![QuerySpec::new(
            ES_GET_MODE,
            vec![
                FieldSpec::new("mode", ES_MODE, Text),
                FieldSpec::new("bat_soc", SOC, Integer),
                FieldSpec::new("bat_temp", BAT_TEMP, Float),
                FieldSpec::new("bat_voltage", BAT_VOLTAGE, Float),
                FieldSpec::new("bat_current", BAT_CURRENT, Float),
                FieldSpec::new("bat_power", BAT_POWER, Integer),
                FieldSpec::new("ongrid_power", ONGRID_POWER, Integer),
                FieldSpec::new("load_power", LOAD_POWER, Integer),
                FieldSpec::new("pv_power", PV_POWER, Integer),
                FieldSpec::new("charge_power", CHARGE_POWER, Integer),
                FieldSpec::new("discharge_power", DISCHARGE_POWER, Integer),
            ],
        )])
    }

    /// Queries in execution order.
    pub fn queries(&self) -> &[QuerySpec] {
        &self.queries
    }
}

impl Default for ProtocolSchema {
    fn default() -> Self {
        Self::legacy()
    }
}
