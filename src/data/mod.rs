//! Data structures for vehicles, tires and registration.
//!
//! This module contains the core types the store holds: vehicles and their
//! per-tire samples, axle layouts, alert thresholds and registration data.

pub mod axle;
pub mod registration;
pub mod vehicle;

pub use axle::{expected_tire_count, AxleType};
pub use registration::{
    RegistrationData, RegistrationMetadata, SyncStatus, Towable, UserInfo, UserRole,
    VehicleDescriptor, MAIN_VEHICLE_ID,
};
pub use vehicle::{Thresholds, TireSample, TireStatus, Vehicle};
