//! Application state, actions and the reducer.

use std::collections::BTreeMap;

use crate::data::{RegistrationData, Thresholds, TireSample, Vehicle};
use crate::utils::UnitSystem;

/// Everything the application shares between screens.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AppState {
    /// Registration captured during onboarding.
    pub registration_data: Option<RegistrationData>,
    /// Main vehicle and towables with their tire data.
    pub vehicles: Vec<Vehicle>,
    /// Vehicle shown on the dashboard.
    pub selected_vehicle_id: Option<String>,
    /// Display units.
    pub units: UnitSystem,
    /// Whether the session is a demo session.
    pub is_demo_user: bool,
    /// Whether a long-running operation is in flight.
    pub is_loading: bool,
    /// Dark mode preference.
    pub is_dark_mode: bool,
}

/// A state transition request.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Action {
    /// Replace the registration data.
    SetRegistrationData(Option<RegistrationData>),
    /// Mark the session as demo or not.
    SetDemoUser(bool),
    /// Replace the vehicle list.
    SetVehiclesData(Vec<Vehicle>),
    /// Select a vehicle (or none).
    SetSelectedVehicle(Option<String>),
    /// Toggle the loading flag.
    SetLoading(bool),
    /// Reset everything to defaults.
    ClearAllData,
    /// Replace the per-vehicle sync flags of the registration.
    UpdateSyncedVehicles(BTreeMap<String, bool>),
    /// Toggle dark mode.
    SetDarkMode(bool),
    /// Switch display units.
    SetUnits(UnitSystem),
    /// Merge tire samples into one vehicle.
    UpdateVehicleTireData {
        /// Target vehicle.
        vehicle_id: String,
        /// Samples by tire position.
        tire_data: BTreeMap<String, TireSample>,
    },
    /// Replace one vehicle's thresholds.
    UpdateVehicleThresholds {
        /// Target vehicle.
        vehicle_id: String,
        /// New thresholds.
        thresholds: Thresholds,
    },
    /// Record a finished tire sync in one step.
    CompleteVehicleSync {
        /// Target vehicle.
        vehicle_id: String,
        /// Sensor id by tire position.
        sensor_ids: BTreeMap<String, String>,
        /// Thresholds to apply.
        thresholds: Thresholds,
        /// Sample written for every paired tire.
        seed: TireSample,
    },
}

impl Action {
    /// Tag used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::SetRegistrationData(_) => "SET_REGISTRATION_DATA",
            Self::SetDemoUser(_) => "SET_DEMO_USER",
            Self::SetVehiclesData(_) => "SET_VEHICLES_DATA",
            Self::SetSelectedVehicle(_) => "SET_SELECTED_VEHICLE",
            Self::SetLoading(_) => "SET_LOADING",
            Self::ClearAllData => "CLEAR_ALL_DATA",
            Self::UpdateSyncedVehicles(_) => "UPDATE_SYNCED_VEHICLES",
            Self::SetDarkMode(_) => "SET_DARK_MODE",
            Self::SetUnits(_) => "SET_UNITS",
            Self::UpdateVehicleTireData { .. } => "UPDATE_VEHICLE_TIRE_DATA",
            Self::UpdateVehicleThresholds { .. } => "UPDATE_VEHICLE_THRESHOLDS",
            Self::CompleteVehicleSync { .. } => "COMPLETE_VEHICLE_SYNC",
        }
    }
}

/// Apply an action to a state, producing the next state.
///
/// Pure: the input is never modified. Actions that target an unknown vehicle
/// leave the state as it was.
pub fn reduce(state: &AppState, action: Action) -> AppState {
    let mut next = state.clone();

    match action {
        Action::SetRegistrationData(data) => next.registration_data = data,
        Action::SetDemoUser(is_demo) => next.is_demo_user = is_demo,
        Action::SetVehiclesData(vehicles) => next.vehicles = vehicles,
        Action::SetSelectedVehicle(id) => next.selected_vehicle_id = id,
        Action::SetLoading(is_loading) => next.is_loading = is_loading,
        Action::ClearAllData => return AppState::default(),
        Action::UpdateSyncedVehicles(synced) => {
            if let Some(registration) = next.registration_data.as_mut() {
                registration.synced_vehicles = synced;
                registration.refresh_sync_status();
            }
        }
        Action::SetDarkMode(is_dark) => next.is_dark_mode = is_dark,
        Action::SetUnits(units) => next.units = units,
        Action::UpdateVehicleTireData {
            vehicle_id,
            tire_data,
        } => {
            if let Some(vehicle) = find_vehicle(&mut next, &vehicle_id) {
                vehicle.tire_data.extend(tire_data);
            }
        }
        Action::UpdateVehicleThresholds {
            vehicle_id,
            thresholds,
        } => {
            if let Some(vehicle) = find_vehicle(&mut next, &vehicle_id) {
                vehicle.thresholds = Some(thresholds);
            }
        }
        Action::CompleteVehicleSync {
            vehicle_id,
            sensor_ids,
            thresholds,
            seed,
        } => {
            let Some(vehicle) = find_vehicle(&mut next, &vehicle_id) else {
                return next;
            };
            vehicle.tire_data = sensor_ids.keys().map(|tire| (tire.clone(), seed)).collect();
            vehicle.thresholds = Some(thresholds);
            vehicle.synced = true;

            if let Some(registration) = next.registration_data.as_mut() {
                registration
                    .vehicle_sensor_ids
                    .insert(vehicle_id.clone(), sensor_ids);
                registration.synced_vehicles.insert(vehicle_id, true);
                registration.refresh_sync_status();
            }
        }
    }

    next
}

fn find_vehicle<'a>(state: &'a mut AppState, vehicle_id: &str) -> Option<&'a mut Vehicle> {
    state.vehicles.iter_mut().find(|v| v.id == vehicle_id)
}
