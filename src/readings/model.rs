use std::{fmt, str::FromStr};

use chrono::{DateTime, FixedOffset};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Wire keys of a device payload.
pub mod fields {
    pub const DEVICE: &str = "dispositivo";
    pub const TEMPERATURE: &str = "temperatura";
    pub const HUMIDITY: &str = "humedad";
    pub const LIGHT: &str = "luz";
    pub const MOTION: &str = "movimiento";
}

/// Accepted ranges for pushed temperature and humidity, inclusive. The
/// defaults are the physical limits of the deployed sensors; a deployment
/// with a narrower humidity scale configures its own.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorLimits {
    pub temperature: (f64, f64),
    pub humidity: (f64, f64),
}

impl SensorLimits {
    pub fn new(temperature: (f64, f64), humidity: (f64, f64)) -> anyhow::Result<Self> {
        for (name, (min, max)) in [("temperature", temperature), ("humidity", humidity)] {
            anyhow::ensure!(
                min.is_finite() && max.is_finite() && min <= max,
                "invalid {name} limits: [{min}, {max}]"
            );
        }
        Ok(Self {
            temperature,
            humidity,
        })
    }
}

impl Default for SensorLimits {
    fn default() -> Self {
        Self {
            temperature: (-40.0, 85.0),
            humidity: (0.0, 100.0),
        }
    }
}

/// One sensor observation. Never mutated after creation.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub id: Uuid,
    pub device_id: String,
    /// Degrees Celsius
    pub temperature: f64,
    /// Relative humidity percentage
    pub humidity: f64,
    /// Lux, non-negative. Absent for readings pushed under the minimal schema.
    pub light: Option<i64>,
    pub motion: Option<bool>,
    pub timestamp: DateTime<FixedOffset>,
}

/// A validated payload that has not yet been stamped with an id and time.
#[derive(Debug, Clone, PartialEq)]
pub struct NewReading {
    pub device_id: String,
    pub temperature: f64,
    pub humidity: f64,
    pub light: Option<i64>,
    pub motion: Option<bool>,
}

impl NewReading {
    pub fn into_reading(self, id: Uuid, timestamp: DateTime<FixedOffset>) -> Reading {
        Reading {
            id,
            device_id: self.device_id,
            temperature: self.temperature,
            humidity: self.humidity,
            light: self.light,
            motion: self.motion,
            timestamp,
        }
    }
}

/// Which keys a payload must carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Schema {
    /// `dispositivo`, `temperatura`, `humedad`. `luz` and `movimiento` are
    /// accepted and checked when present.
    #[default]
    Minimal,
    /// All five keys are required.
    Extended,
}

impl Schema {
    pub fn required_fields(self) -> &'static [&'static str] {
        match self {
            Schema::Minimal => &[fields::DEVICE, fields::TEMPERATURE, fields::HUMIDITY],
            Schema::Extended => &[
                fields::DEVICE,
                fields::TEMPERATURE,
                fields::HUMIDITY,
                fields::LIGHT,
                fields::MOTION,
            ],
        }
    }
}

impl FromStr for Schema {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "minimal" => Ok(Self::Minimal),
            "extended" => Ok(Self::Extended),
            other => Err(anyhow::anyhow!("unknown ingestion schema: {other:?}")),
        }
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Schema::Minimal => "minimal",
            Schema::Extended => "extended",
        })
    }
}

/// A field that was present but unusable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidField {
    pub field: String,
    pub reason: &'static str,
}

/// Everything wrong with a payload, collected in one pass.
#[derive(Debug, Clone, PartialEq, Eq, Default, thiserror::Error)]
#[error("{}", self.describe())]
pub struct ValidationError {
    pub missing: Vec<String>,
    pub invalid: Vec<InvalidField>,
    /// Set when the payload is not a JSON object at all.
    pub not_an_object: bool,
}

impl ValidationError {
    fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.invalid.is_empty() && !self.not_an_object
    }

    fn describe(&self) -> String {
        if self.not_an_object {
            return "payload must be a JSON object".to_owned();
        }
        let mut parts = Vec::new();
        if !self.missing.is_empty() {
            parts.push(format!("missing fields: {}", self.missing.join(", ")));
        }
        if !self.invalid.is_empty() {
            let invalid = self
                .invalid
                .iter()
                .map(|i| format!("{} ({})", i.field, i.reason))
                .collect::<Vec<_>>()
                .join(", ");
            parts.push(format!("invalid fields: {invalid}"));
        }
        parts.join("; ")
    }
}

/// Check `payload` against `schema` and coerce it into a [`NewReading`].
///
/// Temperature and humidity accept any JSON number within `limits` and
/// become `f64`. Light must be a non-negative integer and motion the
/// integer 0 or 1. Every missing or unusable field is reported, not just
/// the first.
pub fn validate(
    payload: &Value,
    schema: Schema,
    limits: &SensorLimits,
) -> Result<NewReading, ValidationError> {
    let Some(obj) = payload.as_object() else {
        return Err(ValidationError {
            not_an_object: true,
            ..Default::default()
        });
    };

    let mut err = ValidationError {
        missing: schema
            .required_fields()
            .iter()
            .filter(|k| !obj.contains_key(**k))
            .map(|k| (*k).to_owned())
            .collect(),
        ..Default::default()
    };

    let device_id = match obj.get(fields::DEVICE) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
        Some(Value::String(_)) => {
            err.invalid.push(invalid(fields::DEVICE, "must not be empty"));
            None
        }
        Some(_) => {
            err.invalid.push(invalid(fields::DEVICE, "expected a string"));
            None
        }
        None => None,
    };
    let temperature = bounded_number(obj, fields::TEMPERATURE, limits.temperature, &mut err);
    let humidity = bounded_number(obj, fields::HUMIDITY, limits.humidity, &mut err);

    let light = match obj.get(fields::LIGHT) {
        None | Some(Value::Null) => None,
        Some(v) => match v.as_i64() {
            Some(n) if n >= 0 => Some(n),
            Some(_) => {
                err.invalid.push(invalid(fields::LIGHT, "must be non-negative"));
                None
            }
            None => {
                err.invalid.push(invalid(fields::LIGHT, "expected an integer"));
                None
            }
        },
    };

    let motion = match obj.get(fields::MOTION) {
        None | Some(Value::Null) => None,
        Some(v) => match v.as_i64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            Some(_) => {
                err.invalid.push(invalid(fields::MOTION, "must be 0 or 1"));
                None
            }
            None => {
                err.invalid.push(invalid(fields::MOTION, "expected an integer"));
                None
            }
        },
    };

    // Under the extended schema an explicit null counts as missing.
    if schema == Schema::Extended {
        for key in [fields::LIGHT, fields::MOTION] {
            if obj.get(key).is_some_and(Value::is_null) {
                err.missing.push(key.to_owned());
            }
        }
    }

    match (device_id, temperature, humidity) {
        (Some(device_id), Some(temperature), Some(humidity)) if err.is_empty() => Ok(NewReading {
            device_id,
            temperature,
            humidity,
            light,
            motion,
        }),
        _ => Err(err),
    }
}

fn bounded_number(
    obj: &Map<String, Value>,
    key: &str,
    (min, max): (f64, f64),
    err: &mut ValidationError,
) -> Option<f64> {
    let value = obj.get(key)?;
    match value.as_f64() {
        Some(n) if !n.is_finite() => {
            err.invalid.push(invalid(key, "must be finite"));
            None
        }
        Some(n) if n < min || n > max => {
            err.invalid.push(invalid(key, "outside accepted range"));
            None
        }
        Some(n) => Some(n),
        None => {
            err.invalid.push(invalid(key, "expected a number"));
            None
        }
    }
}

fn invalid(field: &str, reason: &'static str) -> InvalidField {
    InvalidField {
        field: field.to_owned(),
        reason,
    }
}
