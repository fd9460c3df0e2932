//! ==============================================================================
//! domain.rs - sensor reading data model
//! ==============================================================================
//!
//! purpose:
//!     the shape of one sensor observation as it travels over the wire,
//!     lives in the latest-value cache and is persisted by the store.
//!     also holds the derived window aggregate served by /api/stats.
//!
//! relationships:
//!     - built by: ingest.rs (validated request bodies)
//!     - stored by: store/*.rs
//!     - cached by: cache.rs
//!
//! ==============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// one sensor observation
///
/// `temp` and `humidity` are always present. the gas/pressure channels are
/// only reported by some device builds and are omitted from json when absent.
/// `Reading::default()` is the sentinel served before anything was ingested.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// temperature in celsius
    pub temp: f64,
    /// relative humidity (0-100%)
    pub humidity: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lpg: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub co: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub smoke: Option<f64>,
    /// pressure in hPa
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pressure: Option<f64>,
    /// altitude in meters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt: Option<f64>,
    /// assigned by the store on insert, never by the device
    #[serde(
        rename = "observedAt",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub observed_at: Option<DateTime<Utc>>,
}

impl Reading {
    pub fn new(temp: f64, humidity: f64) -> Self {
        Self {
            temp,
            humidity,
            ..Self::default()
        }
    }

    /// copy of this reading stamped with the store-assigned time
    pub fn observed(self, at: DateTime<Utc>) -> Self {
        Self {
            observed_at: Some(at),
            ..self
        }
    }
}

/// one numeric channel of a reading, named as on the wire
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Temp,
    Humidity,
    Lpg,
    Co,
    Smoke,
    Pressure,
    Alt,
}

impl Channel {
    pub const ALL: [Channel; 7] = [
        Channel::Temp,
        Channel::Humidity,
        Channel::Lpg,
        Channel::Co,
        Channel::Smoke,
        Channel::Pressure,
        Channel::Alt,
    ];

    /// channels every reading carries regardless of deployment
    pub const ALWAYS_REQUIRED: [Channel; 2] = [Channel::Temp, Channel::Humidity];

    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Temp => "temp",
            Channel::Humidity => "humidity",
            Channel::Lpg => "lpg",
            Channel::Co => "co",
            Channel::Smoke => "smoke",
            Channel::Pressure => "pressure",
            Channel::Alt => "alt",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// min/max/average over a trailing time window
///
/// never persisted, recomputed per request. over an empty window the
/// temperature and humidity metrics are zero and `count` is 0.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Aggregate {
    #[serde(rename = "readings24h")]
    pub count: u64,
    #[serde(rename = "maxTemp24h")]
    pub max_temp: f64,
    #[serde(rename = "minTemp24h")]
    pub min_temp: f64,
    #[serde(rename = "avgTemp24h")]
    pub avg_temp: f64,
    #[serde(rename = "maxHum24h")]
    pub max_hum: f64,
    #[serde(rename = "minHum24h")]
    pub min_hum: f64,
    #[serde(rename = "avgHum24h")]
    pub avg_hum: f64,
    /// null when no row in the window carries pressure
    #[serde(rename = "maxPressure24h")]
    pub max_pressure: Option<f64>,
}

impl Aggregate {
    /// fold a set of in-window readings; the memory store uses this, the
    /// postgres store computes the same thing in sql
    pub fn from_readings<'a>(readings: impl IntoIterator<Item = &'a Reading>) -> Self {
        let mut agg = Aggregate::default();
        let (mut temp_sum, mut hum_sum) = (0.0, 0.0);

        for r in readings {
            if agg.count == 0 {
                agg.max_temp = r.temp;
                agg.min_temp = r.temp;
                agg.max_hum = r.humidity;
                agg.min_hum = r.humidity;
            } else {
                agg.max_temp = agg.max_temp.max(r.temp);
                agg.min_temp = agg.min_temp.min(r.temp);
                agg.max_hum = agg.max_hum.max(r.humidity);
                agg.min_hum = agg.min_hum.min(r.humidity);
            }
            if let Some(p) = r.pressure {
                agg.max_pressure = Some(agg.max_pressure.map_or(p, |m| m.max(p)));
            }
            temp_sum += r.temp;
            hum_sum += r.humidity;
            agg.count += 1;
        }

        if agg.count > 0 {
            agg.avg_temp = temp_sum / agg.count as f64;
            agg.avg_hum = hum_sum / agg.count as f64;
        }
        agg
    }
}
