//! Read helpers over a state snapshot.

use std::collections::BTreeMap;
use tracing::debug;

use crate::data::{TireSample, Vehicle};
use crate::store::state::AppState;

/// Look up a vehicle by id.
pub fn vehicle<'a>(state: &'a AppState, vehicle_id: &str) -> Option<&'a Vehicle> {
    state.vehicles.iter().find(|v| v.id == vehicle_id)
}

/// The currently selected vehicle, if any.
pub fn selected_vehicle(state: &AppState) -> Option<&Vehicle> {
    state
        .selected_vehicle_id
        .as_deref()
        .and_then(|id| vehicle(state, id))
}

/// Latest sample for one tire.
///
/// Returns `None` when no vehicle id is given, the vehicle is unknown or the
/// tire has no data yet.
pub fn tire_data(state: &AppState, vehicle_id: Option<&str>, tire_id: &str) -> Option<TireSample> {
    let Some(vehicle_id) = vehicle_id else {
        debug!("tire_data: no vehicle id for tire {}", tire_id);
        return None;
    };

    let Some(found) = vehicle(state, vehicle_id) else {
        debug!("tire_data: vehicle {} not found", vehicle_id);
        return None;
    };

    let sample = found.tire_data.get(tire_id).copied();
    if sample.is_none() {
        debug!(
            "tire_data: no data for tire {} on vehicle {}",
            tire_id, vehicle_id
        );
    }
    sample
}

/// All tire samples of one vehicle.
pub fn all_tire_data<'a>(
    state: &'a AppState,
    vehicle_id: &str,
) -> Option<&'a BTreeMap<String, TireSample>> {
    vehicle(state, vehicle_id).map(|v| &v.tire_data)
}
