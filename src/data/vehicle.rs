//! Vehicle and tire data structures.

use std::collections::BTreeMap;

use crate::data::axle::AxleType;
use crate::error::{Error, Result};
use crate::utils::celsius_to_fahrenheit;

/// Latest pressure and temperature stored for one tire.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TireSample {
    /// Pressure in PSI.
    pub psi: f64,
    /// Temperature in degrees Celsius.
    pub temp: f64,
}

impl TireSample {
    /// Placeholder written for freshly paired tires until the sensor reports.
    pub const SEED: Self = Self {
        psi: 30.0,
        temp: 20.0,
    };

    /// Create a new sample.
    pub fn new(psi: f64, temp: f64) -> Self {
        Self { psi, temp }
    }
}

/// Alert thresholds for a vehicle.
///
/// Pressures are in PSI. `temperature_high` is in degrees Fahrenheit.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Thresholds {
    /// Below this pressure a tire is critical.
    pub pressure_low: f64,
    /// Below this pressure a tire needs attention.
    pub pressure_warning: f64,
    /// Above this temperature (°F) a tire is critical.
    pub temperature_high: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            pressure_low: 28.0,
            pressure_warning: 32.0,
            temperature_high: 160.0,
        }
    }
}

impl Thresholds {
    /// Classify a tire sample against these thresholds.
    pub fn classify(&self, sample: &TireSample) -> TireStatus {
        if sample.psi < self.pressure_low
            || celsius_to_fahrenheit(sample.temp) > self.temperature_high
        {
            TireStatus::Critical
        } else if sample.psi < self.pressure_warning {
            TireStatus::Warning
        } else {
            TireStatus::Normal
        }
    }
}

/// Health of a single tire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TireStatus {
    /// Within thresholds.
    Normal,
    /// Pressure under the warning threshold.
    Warning,
    /// Pressure under the low threshold or temperature over the high threshold.
    Critical,
}

impl std::fmt::Display for TireStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Normal => write!(f, "Normal"),
            Self::Warning => write!(f, "Warning"),
            Self::Critical => write!(f, "Critical"),
        }
    }
}

/// A registered vehicle (power unit or towable) and its tire readings.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Vehicle {
    /// Unique vehicle id, e.g. `main-vehicle` or `towable-0`.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Axle string as registered, e.g. `"2 Axles w/Dually"`.
    pub axle_type: String,
    /// Towing type as registered, e.g. `"towable"` or `"Fifth Wheels"`.
    pub towing_type: String,
    /// Latest sample per tire position.
    pub tire_data: BTreeMap<String, TireSample>,
    /// Alert thresholds, if configured.
    pub thresholds: Option<Thresholds>,
    /// Whether every tire has been paired with a sensor.
    pub synced: bool,
}

impl Vehicle {
    /// Create a vehicle with no tire data.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        axle_type: impl Into<String>,
        towing_type: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            axle_type: axle_type.into(),
            towing_type: towing_type.into(),
            ..Default::default()
        }
    }

    /// Create a new towable with default thresholds.
    ///
    /// The id is derived from the current time, matching how towables are
    /// added after registration.
    pub fn towable(name: &str, towable_type: &str, axle_type: &str) -> Result<Self> {
        if name.trim().is_empty() || towable_type.trim().is_empty() || axle_type.trim().is_empty() {
            return Err(Error::validation(
                "towable",
                "Please fill in all towable fields",
            ));
        }

        let id = format!("towable-{}", chrono::Utc::now().timestamp_millis());
        let mut vehicle = Self::new(id, name.trim(), axle_type.trim(), "towable");
        vehicle.thresholds = Some(Thresholds::default());
        Ok(vehicle)
    }

    /// Parsed axle layout (unknown strings fall back to two axles).
    pub fn axle(&self) -> AxleType {
        AxleType::from_label_or_default(&self.axle_type)
    }

    /// Number of tires implied by the axle layout.
    pub fn expected_tire_count(&self) -> usize {
        self.axle().tire_count()
    }

    /// Tire position keys implied by the axle layout.
    pub fn expected_positions(&self) -> Vec<String> {
        self.axle().tire_positions()
    }

    /// Tire data keys that do not belong to the axle layout.
    ///
    /// The store accepts any key, so this is how callers spot mismatches.
    pub fn unexpected_tire_keys(&self) -> Vec<String> {
        let axle = self.axle();
        self.tire_data
            .keys()
            .filter(|key| !axle.has_position(key))
            .cloned()
            .collect()
    }

    /// Status of one tire, using the vehicle thresholds or the defaults.
    pub fn tire_status(&self, tire_id: &str) -> Option<TireStatus> {
        let sample = self.tire_data.get(tire_id)?;
        Some(self.thresholds.unwrap_or_default().classify(sample))
    }

    /// Worst status across all tires with data.
    pub fn worst_status(&self) -> Option<TireStatus> {
        let thresholds = self.thresholds.unwrap_or_default();
        self.tire_data
            .values()
            .map(|sample| thresholds.classify(sample))
            .max_by_key(|status| match status {
                TireStatus::Normal => 0,
                TireStatus::Warning => 1,
                TireStatus::Critical => 2,
            })
    }
}
