//! Registration data captured during onboarding.
//!
//! Created once when registration completes and later patched by sync
//! completion. There is no deletion path other than clearing the store.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use crate::data::axle::expected_tire_count;
use crate::data::vehicle::{Thresholds, Vehicle};

/// Id given to the registered power unit.
pub const MAIN_VEHICLE_ID: &str = "main-vehicle";

/// How the user operates their vehicles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum UserRole {
    /// A single power unit.
    #[default]
    PowerUnit,
    /// A power unit with one or more towables.
    MultipleUnits,
}

/// Registered user.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UserInfo {
    /// Full name.
    pub name: String,
    /// Email address.
    pub email: String,
    /// Operating role.
    pub role: UserRole,
    /// When the user registered.
    pub registration_date: DateTime<Utc>,
}

/// The main vehicle entered during registration.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VehicleDescriptor {
    /// Display name.
    pub name: String,
    /// Vehicle type, e.g. `"Power Unit"`.
    pub vehicle_type: String,
    /// Axle string.
    pub axle_type: String,
    /// Operating role.
    pub role: UserRole,
}

/// A towable entered during registration.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Towable {
    /// Towable id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Towable type, e.g. `"Fifth Wheels"`.
    pub towable_type: String,
    /// Axle string.
    pub axle: String,
    /// Number of tires.
    pub tire_count: usize,
}

impl Towable {
    /// Create a towable, deriving the tire count from the axle string.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        towable_type: impl Into<String>,
        axle: impl Into<String>,
    ) -> Self {
        let axle = axle.into();
        Self {
            id: id.into(),
            name: name.into(),
            towable_type: towable_type.into(),
            tire_count: expected_tire_count(&axle),
            axle,
        }
    }
}

/// Aggregate sync progress across all vehicles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SyncStatus {
    /// Number of vehicles tracked.
    pub total_vehicles: usize,
    /// Number of vehicles marked synced.
    pub synced_count: usize,
    /// True when every tracked vehicle is synced (vacuously true when empty).
    pub all_synced: bool,
}

impl SyncStatus {
    /// Derive the status from a synced-vehicles map.
    pub fn from_synced(synced_vehicles: &BTreeMap<String, bool>) -> Self {
        Self {
            total_vehicles: synced_vehicles.len(),
            synced_count: synced_vehicles.values().filter(|synced| **synced).count(),
            all_synced: synced_vehicles.values().all(|synced| *synced),
        }
    }
}

/// Bookkeeping about the registration flow.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RegistrationMetadata {
    /// Last completed step.
    pub registration_step: String,
    /// When the data was captured.
    pub timestamp: DateTime<Utc>,
    /// Data format version.
    pub version: String,
}

impl Default for RegistrationMetadata {
    fn default() -> Self {
        Self {
            registration_step: "complete".to_string(),
            timestamp: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Everything captured when a user registers.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RegistrationData {
    /// The user.
    pub user: UserInfo,
    /// The main vehicle.
    pub vehicle: VehicleDescriptor,
    /// Registered towables.
    pub towables: Vec<Towable>,
    /// Sync flag per vehicle id.
    pub synced_vehicles: BTreeMap<String, bool>,
    /// Paired sensor ids: vehicle id → tire position → sensor id.
    pub vehicle_sensor_ids: BTreeMap<String, BTreeMap<String, String>>,
    /// Derived from `synced_vehicles`.
    pub sync_status: SyncStatus,
    /// Flow bookkeeping.
    pub metadata: RegistrationMetadata,
}

impl RegistrationData {
    /// Create registration data with nothing synced yet.
    pub fn new(user: UserInfo, vehicle: VehicleDescriptor, towables: Vec<Towable>) -> Self {
        let mut data = Self {
            user,
            vehicle,
            towables,
            synced_vehicles: BTreeMap::new(),
            vehicle_sensor_ids: BTreeMap::new(),
            sync_status: SyncStatus::default(),
            metadata: RegistrationMetadata::default(),
        };

        for id in data.vehicle_ids() {
            data.synced_vehicles.insert(id, false);
        }
        data.refresh_sync_status();
        data
    }

    /// Ids of the main vehicle followed by every towable.
    pub fn vehicle_ids(&self) -> Vec<String> {
        std::iter::once(MAIN_VEHICLE_ID.to_string())
            .chain(self.towables.iter().map(|t| t.id.clone()))
            .collect()
    }

    /// Expand the registration into store vehicles.
    pub fn vehicles(&self) -> Vec<Vehicle> {
        let mut main = Vehicle::new(
            MAIN_VEHICLE_ID,
            if self.vehicle.name.is_empty() {
                "Main Vehicle"
            } else {
                self.vehicle.name.as_str()
            },
            self.vehicle.axle_type.clone(),
            self.vehicle.vehicle_type.clone(),
        );
        main.thresholds = Some(Thresholds::default());

        std::iter::once(main)
            .chain(self.towables.iter().map(|towable| {
                let mut vehicle = Vehicle::new(
                    towable.id.clone(),
                    towable.name.clone(),
                    towable.axle.clone(),
                    towable.towable_type.clone(),
                );
                vehicle.thresholds = Some(Thresholds::default());
                vehicle
            }))
            .map(|mut vehicle| {
                vehicle.synced = self.synced_vehicles.get(&vehicle.id).copied().unwrap_or(false);
                vehicle
            })
            .collect()
    }

    /// Total tires across the main vehicle and all towables.
    pub fn total_tires(&self) -> usize {
        expected_tire_count(&self.vehicle.axle_type)
            + self.towables.iter().map(|t| t.tire_count).sum::<usize>()
    }

    /// Recompute `sync_status` from `synced_vehicles`.
    pub fn refresh_sync_status(&mut self) {
        self.sync_status = SyncStatus::from_synced(&self.synced_vehicles);
    }
}
