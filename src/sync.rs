//! Tire-sync workflow.
//!
//! Pairs every tire position of a vehicle with a sensor id, either decoded
//! from the sensor's QR code or typed in by hand. Once every position is
//! paired the session completes exactly once and the result is written to
//! the store in a single action.

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::{DuplicateSensorPolicy, SyncConfig};
use crate::data::{AxleType, Thresholds, Vehicle};
use crate::error::{Error, Result};
use crate::store::{Action, AppState, StoreHandle};

/// How a sensor id was entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SyncMethod {
    /// Decoded from a QR code.
    QrCode,
    /// Typed in.
    Manual,
}

impl std::fmt::Display for SyncMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::QrCode => write!(f, "QR code"),
            Self::Manual => write!(f, "manual entry"),
        }
    }
}

/// Result of pairing one tire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncProgress {
    /// The tire that was paired.
    pub tire_id: String,
    /// The sensor it was paired with.
    pub sensor_id: String,
    /// How the sensor id was entered.
    pub method: SyncMethod,
    /// Tires paired so far.
    pub synced: usize,
    /// Tires the axle layout expects.
    pub expected: usize,
    /// Whether the session can be completed.
    pub ready: bool,
}

/// A finished sync, ready to be written to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CompletedSync {
    /// The synced vehicle.
    pub vehicle_id: String,
    /// Sensor id by tire position.
    pub sensor_ids: BTreeMap<String, String>,
}

/// Pairing state for one vehicle.
#[derive(Debug, Clone)]
pub struct TireSyncSession {
    vehicle_id: String,
    vehicle_name: String,
    axle: AxleType,
    config: SyncConfig,
    synced: BTreeMap<String, String>,
    selected: Option<String>,
    closed: bool,
}

impl TireSyncSession {
    /// Start a session. Unknown axle strings use the two-axle layout.
    pub fn new(
        vehicle_id: impl Into<String>,
        vehicle_name: impl Into<String>,
        axle_type: &str,
        config: SyncConfig,
    ) -> Self {
        Self {
            vehicle_id: vehicle_id.into(),
            vehicle_name: vehicle_name.into(),
            axle: AxleType::from_label_or_default(axle_type),
            config,
            synced: BTreeMap::new(),
            selected: None,
            closed: false,
        }
    }

    /// Start a session for a store vehicle.
    pub fn for_vehicle(vehicle: &Vehicle, config: SyncConfig) -> Self {
        Self::new(
            vehicle.id.clone(),
            vehicle.name.clone(),
            &vehicle.axle_type,
            config,
        )
    }

    /// Clear all pairings and the selection and reopen the session.
    pub fn reset(&mut self) {
        debug!("Resetting tire sync for {}", self.vehicle_id);
        self.synced.clear();
        self.selected = None;
        self.closed = false;
    }

    /// The vehicle being synced.
    pub fn vehicle_id(&self) -> &str {
        &self.vehicle_id
    }

    /// Display name of the vehicle being synced.
    pub fn vehicle_name(&self) -> &str {
        &self.vehicle_name
    }

    /// Axle layout of the vehicle.
    pub fn axle(&self) -> AxleType {
        self.axle
    }

    /// Number of tires to pair.
    pub fn expected_tire_count(&self) -> usize {
        self.axle.tire_count()
    }

    /// Tire positions to pair.
    pub fn expected_positions(&self) -> Vec<String> {
        self.axle.tire_positions()
    }

    /// Pairings so far.
    pub fn synced_tires(&self) -> &BTreeMap<String, String> {
        &self.synced
    }

    /// Number of paired tires.
    pub fn synced_count(&self) -> usize {
        self.synced.len()
    }

    /// Whether every tire is paired.
    pub fn is_ready(&self) -> bool {
        self.synced_count() == self.expected_tire_count()
    }

    /// Whether the session already completed.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Select the tire the next sensor id will be paired with.
    pub fn select_tire(&mut self, tire_id: &str) -> Result<()> {
        if !self.axle.has_position(tire_id) {
            return Err(Error::UnknownTirePosition {
                tire_id: tire_id.to_string(),
                axle_type: self.axle.label().to_string(),
            });
        }
        debug!("Selected tire {} on {}", tire_id, self.vehicle_id);
        self.selected = Some(tire_id.to_string());
        Ok(())
    }

    /// Drop the current selection.
    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    /// The currently selected tire.
    pub fn selected_tire(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// Pair the selected tire with a sensor id decoded from a QR code.
    pub fn record_scan(&mut self, decoded: &str) -> Result<SyncProgress> {
        self.record(decoded, SyncMethod::QrCode)
    }

    /// Pair the selected tire with a typed-in sensor id.
    pub fn record_manual(&mut self, input: &str) -> Result<SyncProgress> {
        self.record(input, SyncMethod::Manual)
    }

    fn record(&mut self, input: &str, method: SyncMethod) -> Result<SyncProgress> {
        if self.closed {
            return Err(Error::SyncClosed);
        }

        let sensor_id = input.trim();
        if sensor_id.is_empty() {
            return Err(Error::validation("sensor_id", "Sensor ID is required"));
        }

        let Some(tire_id) = self.selected.clone() else {
            return Err(Error::validation(
                "tire",
                "Select a tire before pairing a sensor",
            ));
        };

        if self.config.duplicate_policy == DuplicateSensorPolicy::Reject {
            if let Some((other, _)) = self
                .synced
                .iter()
                .find(|(tire, sensor)| sensor.as_str() == sensor_id && **tire != tire_id)
            {
                return Err(Error::DuplicateSensor {
                    sensor_id: sensor_id.to_string(),
                    tire_id: other.clone(),
                });
            }
        }

        self.synced.insert(tire_id.clone(), sensor_id.to_string());
        self.selected = None;

        let progress = SyncProgress {
            tire_id,
            sensor_id: sensor_id.to_string(),
            method,
            synced: self.synced_count(),
            expected: self.expected_tire_count(),
            ready: self.is_ready(),
        };

        info!(
            "Paired {} with sensor {} via {} ({}/{})",
            progress.tire_id, progress.sensor_id, method, progress.synced, progress.expected
        );

        Ok(progress)
    }

    /// Finish the session.
    ///
    /// Fails until every tire is paired. Succeeds once; afterwards the
    /// session is closed until [`reset`](Self::reset).
    pub fn complete(&mut self) -> Result<CompletedSync> {
        if self.closed {
            return Err(Error::SyncClosed);
        }

        if !self.is_ready() {
            return Err(Error::SyncIncomplete {
                synced: self.synced_count(),
                expected: self.expected_tire_count(),
            });
        }

        self.closed = true;
        info!(
            "All {} tires of {} synced",
            self.expected_tire_count(),
            self.vehicle_id
        );

        Ok(CompletedSync {
            vehicle_id: self.vehicle_id.clone(),
            sensor_ids: self.synced.clone(),
        })
    }
}

/// Write a completed sync to the store.
///
/// Seeds every paired tire with the configured sample, applies `thresholds`
/// (or the configured defaults), marks the vehicle synced and records the
/// sensor ids in the registration. Returns the resulting state.
pub async fn apply_vehicle_sync(
    store: &StoreHandle,
    completed: &CompletedSync,
    thresholds: Option<Thresholds>,
    config: &SyncConfig,
) -> Result<Arc<AppState>> {
    store
        .apply(Action::CompleteVehicleSync {
            vehicle_id: completed.vehicle_id.clone(),
            sensor_ids: completed.sensor_ids.clone(),
            thresholds: thresholds.unwrap_or(config.default_thresholds),
            seed: config.seed,
        })
        .await
}
