//! ==============================================================================
//! ingest.rs - strict schema validation for incoming sensor payloads
//! ==============================================================================
//!
//! purpose:
//!     turns raw request bytes into a `Reading` or a typed rejection before
//!     any field is trusted. nothing is coerced: a channel that is present
//!     must be a finite json number, and every required channel must be
//!     present. the first violation rejects the whole payload.
//!
//! relationships:
//!     - used by: handlers.rs (POST /api/sensor-update)
//!     - produces: domain.rs (Reading)
//!
//! ==============================================================================

use serde_json::{Map, Value};
use thiserror::Error;

use crate::domain::{Channel, Reading};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid JSON")]
    InvalidJson,

    /// the channel is kept for logging, the wire message stays fixed
    #[error("Invalid data format")]
    InvalidFormat { channel: Option<Channel> },
}

/// the channel set a deployment insists on
#[derive(Clone, Debug)]
pub struct IngestSchema {
    required: Vec<Channel>,
}

impl IngestSchema {
    /// temp and humidity are always part of the required set
    pub fn new(extra_required: &[Channel]) -> Self {
        let mut required = Channel::ALWAYS_REQUIRED.to_vec();
        for c in extra_required {
            if !required.contains(c) {
                required.push(*c);
            }
        }
        Self { required }
    }

    pub fn required(&self) -> &[Channel] {
        &self.required
    }

    pub fn parse(&self, body: &[u8]) -> Result<Reading, ValidationError> {
        let value: Value =
            serde_json::from_slice(body).map_err(|_| ValidationError::InvalidJson)?;
        let Value::Object(fields) = value else {
            return Err(ValidationError::InvalidFormat { channel: None });
        };

        for channel in &self.required {
            if !fields.contains_key(channel.as_str()) {
                return Err(ValidationError::InvalidFormat {
                    channel: Some(*channel),
                });
            }
        }

        let mut values = [None; 7];
        for (slot, channel) in values.iter_mut().zip(Channel::ALL) {
            *slot = number(&fields, channel)?;
        }
        let [temp, humidity, lpg, co, smoke, pressure, alt] = values;

        // both present: they are in the required set
        let invalid = |channel| ValidationError::InvalidFormat {
            channel: Some(channel),
        };
        Ok(Reading {
            temp: temp.ok_or_else(|| invalid(Channel::Temp))?,
            humidity: humidity.ok_or_else(|| invalid(Channel::Humidity))?,
            lpg,
            co,
            smoke,
            pressure,
            alt,
            observed_at: None,
        })
    }
}

impl Default for IngestSchema {
    fn default() -> Self {
        Self::new(&[])
    }
}

fn number(fields: &Map<String, Value>, channel: Channel) -> Result<Option<f64>, ValidationError> {
    match fields.get(channel.as_str()) {
        None => Ok(None),
        Some(Value::Number(n)) => match n.as_f64() {
            Some(v) if v.is_finite() => Ok(Some(v)),
            _ => Err(ValidationError::InvalidFormat {
                channel: Some(channel),
            }),
        },
        Some(_) => Err(ValidationError::InvalidFormat {
            channel: Some(channel),
        }),
    }
}
