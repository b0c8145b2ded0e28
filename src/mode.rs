//! Operating modes and the `ES.SetMode` command builder.
//!
//! The battery runs in one of four modes:
//!
//! | Mode | Code | Extra configuration |
//! |------|:----:|---------------------|
//! | Auto | 0 | none |
//! | AI | 1 | none |
//! | Manual | 2 | one of ten time slots: window, days, power, enable |
//! | Passive | 3 | power setpoint held for a number of seconds |
//!
//! A [`ModeIntent`] is validated and translated into the exact parameter
//! shape the device expects by [`build_set_mode`]. Nothing here performs I/O,
//! so a rejected intent never reaches the network.
//!
//! # Example
//!
//! ```
//! use venus_udp::{build_set_mode, ManualSlot, ModeIntent, Weekday};
//!
//! let slot = ManualSlot::new(0)
//!     .window("08:00".parse()?, "12:00".parse()?)
//!     .days(vec![Weekday::Monday, Weekday::Friday])
//!     .power(-1000);
//!
//! let cmd = build_set_mode(1, &ModeIntent::Manual(slot))?;
//! assert_eq!(cmd.params()["config"]["manual_cfg"]["week_set"], 17);
//! # Ok::<(), venus_udp::VenusError>(())
//! ```

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::command::{Command, ES_SET_MODE};
use crate::error::{Result, VenusError};
use crate::utils::{week_set_from_days, ALL_DAYS};

/// Highest manual time slot index.
pub const MAX_TIME_SLOT: u8 = 9;

/// Passive mode duration used when none is given, in seconds.
pub const DEFAULT_PASSIVE_DURATION: u32 = 300;

/// Operating modes understood by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperatingMode {
    /// Self-consumption managed by the device.
    Auto,
    /// Forecast-driven scheduling.
    Ai,
    /// User-defined time slots.
    Manual,
    /// Externally commanded setpoint.
    Passive,
}

impl OperatingMode {
    /// Returns the integer code used by the legacy protocol.
    pub fn code(self) -> u8 {
        match self {
            OperatingMode::Auto => 0,
            OperatingMode::Ai => 1,
            OperatingMode::Manual => 2,
            OperatingMode::Passive => 3,
        }
    }

    /// Looks up a mode from its integer code.
    ///
    /// # Example
    ///
    /// ```
    /// use venus_udp::OperatingMode;
    ///
    /// assert_eq!(OperatingMode::from_code(3), Some(OperatingMode::Passive));
    /// assert_eq!(OperatingMode::from_code(9), None);
    /// ```
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(OperatingMode::Auto),
            1 => Some(OperatingMode::Ai),
            2 => Some(OperatingMode::Manual),
            3 => Some(OperatingMode::Passive),
            _ => None,
        }
    }

    /// Returns the name the device uses on the wire.
    pub fn name(self) -> &'static str {
        match self {
            OperatingMode::Auto => "Auto",
            OperatingMode::Ai => "AI",
            OperatingMode::Manual => "Manual",
            OperatingMode::Passive => "Passive",
        }
    }
}

impl fmt::Display for OperatingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for OperatingMode {
    type Err = VenusError;

    /// Accepts a mode name (any case) or its decimal code.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Ok(code) = s.parse::<i64>() {
            return Self::from_code(code)
                .ok_or_else(|| VenusError::validation("mode", format!("unknown mode code {code}")));
        }
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(OperatingMode::Auto),
            "ai" => Ok(OperatingMode::Ai),
            "manual" => Ok(OperatingMode::Manual),
            "passive" => Ok(OperatingMode::Passive),
            _ => Err(VenusError::validation("mode", format!("unknown mode '{s}'"))),
        }
    }
}

/// Day of the week; the index is the bit position in `week_set`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Weekday {
    /// Bit 0.
    Monday,
    /// Bit 1.
    Tuesday,
    /// Bit 2.
    Wednesday,
    /// Bit 3.
    Thursday,
    /// Bit 4.
    Friday,
    /// Bit 5.
    Saturday,
    /// Bit 6.
    Sunday,
}

impl Weekday {
    /// All days, Monday first.
    pub const ALL: [Weekday; 7] = [
        Weekday::Monday,
        Weekday::Tuesday,
        Weekday::Wednesday,
        Weekday::Thursday,
        Weekday::Friday,
        Weekday::Saturday,
        Weekday::Sunday,
    ];

    /// Bit index of this day (Monday = 0).
    pub fn index(self) -> u8 {
        self as u8
    }

    /// Day for a bit index, if it is 0-6.
    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.get(usize::from(index)).copied()
    }
}

impl FromStr for Weekday {
    type Err = VenusError;

    /// Parses English day names, full or three-letter, in any case.
    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|day| {
                let name = day.to_string().to_ascii_lowercase();
                lower == name || lower == name[..3]
            })
            .ok_or_else(|| VenusError::validation("days", format!("unknown day '{s}'")))
    }
}

impl fmt::Display for Weekday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Weekday::Monday => "Monday",
            Weekday::Tuesday => "Tuesday",
            Weekday::Wednesday => "Wednesday",
            Weekday::Thursday => "Thursday",
            Weekday::Friday => "Friday",
            Weekday::Saturday => "Saturday",
            Weekday::Sunday => "Sunday",
        };
        f.write_str(name)
    }
}

/// Wall-clock time of day with minute resolution, written `HH:MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeOfDay {
    hour: u8,
    minute: u8,
}

impl TimeOfDay {
    /// Creates a time of day.
    ///
    /// # Errors
    ///
    /// Returns `VenusError::Validation` if hour > 23 or minute > 59.
    pub fn new(hour: u8, minute: u8) -> Result<Self> {
        if hour > 23 {
            return Err(VenusError::validation("hour", "must be 0-23"));
        }
        if minute > 59 {
            return Err(VenusError::validation("minute", "must be 0-59"));
        }
        Ok(Self { hour, minute })
    }

    /// Hour, 0-23.
    pub fn hour(self) -> u8 {
        self.hour
    }

    /// Minute, 0-59.
    pub fn minute(self) -> u8 {
        self.minute
    }
}

impl FromStr for TimeOfDay {
    type Err = VenusError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || VenusError::validation("time", format!("expected HH:MM, got '{s}'"));
        let (hour, minute) = s.trim().split_once(':').ok_or_else(invalid)?;
        if hour.is_empty() || hour.len() > 2 || minute.len() != 2 {
            return Err(invalid());
        }
        let hour = hour.parse::<u8>().map_err(|_| invalid())?;
        let minute = minute.parse::<u8>().map_err(|_| invalid())?;
        Self::new(hour, minute)
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// Configuration of one manual-mode time slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManualSlot {
    /// Slot index, 0-9.
    pub time_num: u8,
    /// Start of the window. Required.
    pub start_time: Option<TimeOfDay>,
    /// End of the window. Required.
    pub end_time: Option<TimeOfDay>,
    /// Explicit day bitmask (bit 0 = Monday). Ignored when `days` is set.
    pub week_set: Option<u8>,
    /// Days the slot is active on. Takes precedence over `week_set`.
    pub days: Option<Vec<Weekday>>,
    /// Power in watts: negative charges, positive discharges.
    pub power: i32,
    /// Whether the slot is active.
    pub enable: bool,
}

impl ManualSlot {
    /// Creates an enabled slot with no window, every day, zero power.
    pub fn new(time_num: u8) -> Self {
        Self {
            time_num,
            start_time: None,
            end_time: None,
            week_set: None,
            days: None,
            power: 0,
            enable: true,
        }
    }

    /// Sets the start and end of the window.
    pub fn window(mut self, start: TimeOfDay, end: TimeOfDay) -> Self {
        self.start_time = Some(start);
        self.end_time = Some(end);
        self
    }

    /// Sets the active days.
    pub fn days(mut self, days: Vec<Weekday>) -> Self {
        self.days = Some(days);
        self
    }

    /// Sets an explicit day bitmask.
    pub fn week_set(mut self, week_set: u8) -> Self {
        self.week_set = Some(week_set);
        self
    }

    /// Sets the power setpoint in watts.
    pub fn power(mut self, power: i32) -> Self {
        self.power = power;
        self
    }

    /// Enables or disables the slot.
    pub fn enabled(mut self, enable: bool) -> Self {
        self.enable = enable;
        self
    }

    /// Resolves the effective day bitmask: `days` if given, else
    /// `week_set`, else every day.
    ///
    /// # Errors
    ///
    /// Returns `VenusError::Validation` for an empty day list or a bitmask
    /// above 127.
    pub fn resolved_week_set(&self) -> Result<u8> {
        match (&self.days, self.week_set) {
            (Some(days), _) if days.is_empty() => {
                Err(VenusError::validation("days", "must name at least one day"))
            }
            (Some(days), _) => Ok(week_set_from_days(days)),
            (None, Some(mask)) if mask > ALL_DAYS => Err(VenusError::validation(
                "week_set",
                format!("must not exceed {ALL_DAYS}"),
            )),
            (None, Some(mask)) => Ok(mask),
            (None, None) => Ok(ALL_DAYS),
        }
    }
}

/// Passive mode setpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassiveSetpoint {
    /// Power in watts: negative charges, positive discharges.
    pub power: i32,
    /// How long to hold the setpoint, in seconds. Defaults to 300.
    pub cd_time: Option<u32>,
}

/// A desired operating mode with its mode-specific configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModeIntent {
    /// Switch to Auto.
    Auto,
    /// Switch to AI.
    Ai,
    /// Configure a manual time slot and switch to Manual.
    Manual(ManualSlot),
    /// Switch to Passive with a setpoint.
    Passive(PassiveSetpoint),
}

impl ModeIntent {
    /// The mode this intent selects.
    pub fn mode(&self) -> OperatingMode {
        match self {
            ModeIntent::Auto => OperatingMode::Auto,
            ModeIntent::Ai => OperatingMode::Ai,
            ModeIntent::Manual(_) => OperatingMode::Manual,
            ModeIntent::Passive(_) => OperatingMode::Passive,
        }
    }
}

/// Builds the `ES.SetMode` command for an intent.
///
/// # Errors
///
/// Returns `VenusError::Validation` if a Manual intent lacks its start or end
/// time, names a slot above 9, has an empty day list or a bitmask above 127.
pub fn build_set_mode(id: u32, intent: &ModeIntent) -> Result<Command> {
    Ok(Command::new(id, ES_SET_MODE, set_mode_params(intent)?))
}

fn set_mode_params(intent: &ModeIntent) -> Result<Map<String, Value>> {
    let mut params = Map::new();
    params.insert("id".into(), Value::from(0));
    match intent {
        ModeIntent::Auto | ModeIntent::Ai => {
            params.insert("mode".into(), Value::from(intent.mode().code()));
        }
        ModeIntent::Manual(slot) => {
            let start = slot
                .start_time
                .ok_or_else(|| VenusError::validation("start_time", "required for Manual mode"))?;
            let end = slot
                .end_time
                .ok_or_else(|| VenusError::validation("end_time", "required for Manual mode"))?;
            if slot.time_num > MAX_TIME_SLOT {
                return Err(VenusError::validation(
                    "time_num",
                    format!("must be 0-{MAX_TIME_SLOT}"),
                ));
            }
            let config = json!({
                "mode": OperatingMode::Manual.name(),
                "manual_cfg": {
                    "time_num": slot.time_num,
                    "start_time": start.to_string(),
                    "end_time": end.to_string(),
                    "week_set": slot.resolved_week_set()?,
                    "power": slot.power,
                    "enable": u8::from(slot.enable),
                }
            });
            params.insert("config".into(), config);
        }
        ModeIntent::Passive(setpoint) => {
            let config = json!({
                "mode": OperatingMode::Passive.name(),
                "passive_cfg": {
                    "power": setpoint.power,
                    "cd_time": setpoint.cd_time.unwrap_or(DEFAULT_PASSIVE_DURATION),
                }
            });
            params.insert("config".into(), config);
        }
    }
    Ok(params)
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawMode {
    Code(i64),
    Name(String),
}

/// Loosely typed set-mode request, as received from a service call or a
/// JSON file.
///
/// `mode` may be a code (`2`, `"2"`) or a name (`"Manual"`). Times are
/// `HH:MM` strings and days are English day names.
///
/// # Example
///
/// ```
/// use venus_udp::{ModeIntent, SetModeRequest};
///
/// let request: SetModeRequest = serde_json::from_str(
///     r#"{"mode":"2","time_num":1,"start_time":"17:00","end_time":"22:00","power":2000}"#,
/// )?;
/// let intent = ModeIntent::try_from(request)?;
/// assert!(matches!(intent, ModeIntent::Manual(_)));
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Deserialize)]
pub struct SetModeRequest {
    mode: RawMode,
    #[serde(default)]
    time_num: Option<u8>,
    #[serde(default)]
    start_time: Option<String>,
    #[serde(default)]
    end_time: Option<String>,
    #[serde(default)]
    week_set: Option<u8>,
    #[serde(default)]
    days: Option<Vec<String>>,
    #[serde(default)]
    power: Option<i32>,
    #[serde(default)]
    enable: Option<u8>,
    #[serde(default)]
    cd_time: Option<u32>,
}

impl TryFrom<SetModeRequest> for ModeIntent {
    type Error = VenusError;

    fn try_from(request: SetModeRequest) -> Result<Self> {
        let mode = match request.mode {
            RawMode::Code(code) => OperatingMode::from_code(code)
                .ok_or_else(|| VenusError::validation("mode", format!("unknown mode code {code}")))?,
            RawMode::Name(name) => name.parse()?,
        };

        let intent = match mode {
            OperatingMode::Auto => ModeIntent::Auto,
            OperatingMode::Ai => ModeIntent::Ai,
            OperatingMode::Manual => {
                let days = request
                    .days
                    .map(|days| days.iter().map(|d| d.parse::<Weekday>()).collect::<Result<Vec<_>>>())
                    .transpose()?;
                let enable = match request.enable.unwrap_or(1) {
                    0 => false,
                    1 => true,
                    other => {
                        return Err(VenusError::validation(
                            "enable",
                            format!("must be 0 or 1, got {other}"),
                        ))
                    }
                };
                ModeIntent::Manual(ManualSlot {
                    time_num: request.time_num.unwrap_or(1),
                    start_time: request.start_time.as_deref().map(str::parse::<TimeOfDay>).transpose()?,
                    end_time: request.end_time.as_deref().map(str::parse::<TimeOfDay>).transpose()?,
                    week_set: request.week_set,
                    days,
                    power: request.power.unwrap_or(0),
                    enable,
                })
            }
            OperatingMode::Passive => ModeIntent::Passive(PassiveSetpoint {
                power: request.power.unwrap_or(0),
                cd_time: request.cd_time,
            }),
        };
        Ok(intent)
    }
}
