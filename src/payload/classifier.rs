/// Threshold checks that turn a decoded reading into alert labels
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::payload::decoder::{DecodedReading, BATTERY_SCALE, HUMIDITY_SCALE, TEMPERATURE_SCALE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AlertLabel {
    TemperatureLow,
    TemperatureHigh,
    HumidityLow,
    HumidityHigh,
    BatteryLow,
}

impl AlertLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertLabel::TemperatureLow => "temperature-low",
            AlertLabel::TemperatureHigh => "temperature-high",
            AlertLabel::HumidityLow => "humidity-low",
            AlertLabel::HumidityHigh => "humidity-high",
            AlertLabel::BatteryLow => "battery-low",
        }
    }
}

impl fmt::Display for AlertLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "temperature-low" => Ok(AlertLabel::TemperatureLow),
            "temperature-high" => Ok(AlertLabel::TemperatureHigh),
            "humidity-low" => Ok(AlertLabel::HumidityLow),
            "humidity-high" => Ok(AlertLabel::HumidityHigh),
            "battery-low" => Ok(AlertLabel::BatteryLow),
            other => Err(format!("Unknown alert label: {}", other)),
        }
    }
}

/// Alert limits in raw device units.
///
/// Temperature and humidity are in tenths, battery in thousandths, the
/// same integers the device transmits. A value exactly on a limit is normal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    pub temperature_low: i64,
    pub temperature_high: i64,
    pub humidity_low: i64,
    pub humidity_high: i64,
    pub battery_low: i64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Thresholds {
            temperature_low: 1650,
            temperature_high: 1700,
            humidity_low: 1200,
            humidity_high: 2200,
            battery_low: 50,
        }
    }
}

/// Classify a decoded reading against the configured thresholds
///
/// Each field is checked only when present and yields at most one label.
/// Labels come out in field order: temperature, humidity, battery.
pub fn classify(reading: &DecodedReading, thresholds: &Thresholds) -> Vec<AlertLabel> {
    let mut alerts = Vec::new();

    if let Some(temperature) = reading.temperature.map(|v| to_raw(v, TEMPERATURE_SCALE)) {
        if temperature < thresholds.temperature_low {
            alerts.push(AlertLabel::TemperatureLow);
        } else if temperature > thresholds.temperature_high {
            alerts.push(AlertLabel::TemperatureHigh);
        }
    }

    if let Some(humidity) = reading.humidity.map(|v| to_raw(v, HUMIDITY_SCALE)) {
        if humidity < thresholds.humidity_low {
            alerts.push(AlertLabel::HumidityLow);
        } else if humidity > thresholds.humidity_high {
            alerts.push(AlertLabel::HumidityHigh);
        }
    }

    if let Some(battery) = reading.battery.map(|v| to_raw(v, BATTERY_SCALE)) {
        if battery < thresholds.battery_low {
            alerts.push(AlertLabel::BatteryLow);
        }
    }

    alerts
}

// Rounding absorbs the float error of value * scale (164.9 * 10 != 1649.0)
fn to_raw(value: f64, scale: f64) -> i64 {
    (value * scale).round() as i64
}
