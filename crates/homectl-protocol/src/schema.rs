//! Status dump schema and the decoded status record.
//!
//! The `@` command returns a fixed number of comma-delimited fields in a
//! fixed order. The order is the wire contract: a field is identified only by
//! its position, so the schema is a static ordered list of names. Values are
//! kept as the raw text the controller sent; interpreting them is left to
//! whoever displays them.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::door::DoorState;

/// Field names as they appear in status records.
pub mod names {
    pub const DATE_TIME: &str = "dateTime";
    pub const UPTIME_SECONDS: &str = "uptimeSeconds";
    pub const FURNACE_RUNTIME_NOW: &str = "furnaceRuntimeNow";
    pub const FURNACE_RUNTIME_TODAY: &str = "furnaceRuntimeToday";
    pub const FURNACE_RUNTIME_SINCE_REBOOT: &str = "furnaceRuntimeSinceReboot";
    pub const GARAGE_DOOR_STATUS: &str = "garageDoorStatus";
    pub const MAIN_FLOOR_AVG_TEMP: &str = "mainFloorAvgTemp";
    pub const LIVING_ROOM_TEMPERATURE: &str = "livingRoomTemperature";
    pub const TEMP_SET_POINT: &str = "tempSetPoint";
    pub const MAINTAIN_TEMPERATURE: &str = "maintainTemperature";
    pub const PROGRAMMABLE_THERMOSTAT_ENABLED: &str = "programmableThermostatEnabled";
    pub const FURNACE_STATUS: &str = "furnaceStatus";
    pub const VENT_FAN_FORCE_ON: &str = "ventFanForceOn";
    pub const VENT_FAN_AUTO_ENABLED: &str = "ventFanAutoEnabled";
    pub const VENT_FAN_STATUS: &str = "ventFanStatus";
    pub const BACK_BEDROOM_TEMPERATURE: &str = "backBedroomTemperature";
    pub const MASTER_BEDROOM_TEMPERATURE: &str = "masterBedroomTemperature";
    pub const MASTER_BEDROOM_TEMPERATURE_SET_POINT: &str = "masterBedroomTemperatureSetPoint";
    pub const BEDROOM_MAINTAIN_TEMP: &str = "bedroomMaintainTemp";
    pub const BEDROOM_HEATER_STATUS: &str = "bedroomHeaterStatus";
    pub const BEDROOM_HEATER_AUTO_OFF_HOUR: &str = "bedroomHeaterAutoOffHour";
    pub const BASEMENT_TEMP_AMBIENT: &str = "basementTempAmbient";
    pub const CONTROLLER_TEMPERATURE: &str = "controllerTemperature";
    pub const GARAGE_TEMP_AMBIENT: &str = "garageTempAmbient";
    pub const GARAGE_TEMP_OUTDOOR: &str = "garageTempOutdoor";
    pub const BLOCK_HEATER_ENABLED: &str = "blockHeaterEnabled";
    pub const BLOCK_HEATER_STATUS: &str = "blockHeaterStatus";
    pub const BLOCK_HEATER_OFF_HOUR: &str = "blockHeaterOffHour";
    pub const BLOCK_HEATER_ON_HOUR: &str = "blockHeaterOnHour";
    pub const BLOCK_HEATER_MAX_TEMP: &str = "blockHeaterMaxTemp";
    pub const VALID_PASSWORD: &str = "validPassword";
}

use names::*;

/// The 29-field status dump, in wire order.
pub const STANDARD_FIELDS: [&str; 29] = [
    DATE_TIME,
    UPTIME_SECONDS,
    FURNACE_RUNTIME_NOW,
    FURNACE_RUNTIME_TODAY,
    FURNACE_RUNTIME_SINCE_REBOOT,
    GARAGE_DOOR_STATUS,
    MAIN_FLOOR_AVG_TEMP,
    LIVING_ROOM_TEMPERATURE,
    TEMP_SET_POINT,
    MAINTAIN_TEMPERATURE,
    PROGRAMMABLE_THERMOSTAT_ENABLED,
    FURNACE_STATUS,
    VENT_FAN_FORCE_ON,
    VENT_FAN_AUTO_ENABLED,
    VENT_FAN_STATUS,
    BACK_BEDROOM_TEMPERATURE,
    MASTER_BEDROOM_TEMPERATURE,
    MASTER_BEDROOM_TEMPERATURE_SET_POINT,
    BEDROOM_MAINTAIN_TEMP,
    BEDROOM_HEATER_STATUS,
    BEDROOM_HEATER_AUTO_OFF_HOUR,
    BASEMENT_TEMP_AMBIENT,
    GARAGE_TEMP_AMBIENT,
    GARAGE_TEMP_OUTDOOR,
    BLOCK_HEATER_ENABLED,
    BLOCK_HEATER_STATUS,
    BLOCK_HEATER_OFF_HOUR,
    BLOCK_HEATER_ON_HOUR,
    VALID_PASSWORD,
];

/// Standard dump plus the block heater temperature cut-off.
pub const MAX_TEMP_FIELDS: [&str; 30] = with_field(STANDARD_FIELDS, 28, BLOCK_HEATER_MAX_TEMP);

/// Max-temp dump plus the controller board temperature.
pub const EXTENDED_FIELDS: [&str; 31] = with_field(MAX_TEMP_FIELDS, 22, CONTROLLER_TEMPERATURE);

/// `base` with `name` inserted at position `at`.
const fn with_field<const N: usize, const M: usize>(
    base: [&'static str; N],
    at: usize,
    name: &'static str,
) -> [&'static str; M] {
    assert!(M == N + 1 && at <= N);
    let mut out = [""; M];
    let mut i = 0;
    while i < M {
        out[i] = if i < at {
            base[i]
        } else if i == at {
            name
        } else {
            base[i - 1]
        };
        i += 1;
    }
    out
}

/// Which status dump layout the controller firmware sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StatusSchema {
    /// 29 fields.
    #[default]
    Standard,
    /// 30 fields, adds `blockHeaterMaxTemp`.
    MaxTemp,
    /// 31 fields, adds `blockHeaterMaxTemp` and `controllerTemperature`.
    Extended,
}

impl StatusSchema {
    /// Field names in wire order.
    pub fn fields(&self) -> &'static [&'static str] {
        match self {
            StatusSchema::Standard => &STANDARD_FIELDS,
            StatusSchema::MaxTemp => &MAX_TEMP_FIELDS,
            StatusSchema::Extended => &EXTENDED_FIELDS,
        }
    }

    /// Number of fields in a complete dump.
    pub fn len(&self) -> usize {
        self.fields().len()
    }

    /// Always false; every schema has fields. Present for API symmetry.
    pub fn is_empty(&self) -> bool {
        self.fields().is_empty()
    }

    /// Wire position of the named field.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.fields().iter().position(|field| *field == name)
    }

    /// Whether the schema carries the named field.
    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }
}

/// A complete status dump.
///
/// Constructed only when every schema field was received, so every schema
/// name resolves to a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusRecord {
    schema: StatusSchema,
    values: Vec<String>,
}

impl StatusRecord {
    /// Build a record from values in wire order. Returns `None` unless the
    /// count matches the schema exactly.
    pub fn new(schema: StatusSchema, values: Vec<String>) -> Option<Self> {
        if values.len() == schema.len() {
            Some(StatusRecord { schema, values })
        } else {
            None
        }
    }

    /// Schema the record was decoded with.
    pub fn schema(&self) -> StatusSchema {
        self.schema
    }

    /// Raw value of the named field.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.schema
            .position(name)
            .and_then(|i| self.values.get(i))
            .map(String::as_str)
    }

    /// Raw value at a wire position.
    pub fn value_at(&self, index: usize) -> Option<&str> {
        self.values.get(index).map(String::as_str)
    }

    /// `(name, value)` pairs in wire order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> + '_ {
        self.schema
            .fields()
            .iter()
            .zip(&self.values)
            .map(|(name, value)| (*name, value.as_str()))
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the record has no fields.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Controller timestamp.
    pub fn timestamp(&self) -> &str {
        self.get(names::DATE_TIME).unwrap_or_default()
    }

    /// Garage door state, if the door code is one the controller defines.
    pub fn door_state(&self) -> Option<DoorState> {
        self.get(names::GARAGE_DOOR_STATUS).and_then(DoorState::from_code)
    }
}

impl Serialize for StatusRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (name, value) in self.iter() {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}
