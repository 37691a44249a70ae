// Allow unusual byte groupings for UUIDs which have standard format
#![allow(clippy::unusual_byte_groupings)]

//! # smarttire-ble
//!
//! Core library for a commercial-vehicle tire pressure and temperature
//! monitoring system. Tire sensors report over Bluetooth Low Energy; this
//! crate discovers them, pairs them with the tire positions of registered
//! vehicles and keeps a single shared application state up to date.
//!
//! ## Features
//!
//! - **Sensor Discovery**: Time-boxed scans with pluggable sensor classification
//! - **Live Readings**: Pressure, temperature and battery decoded from notifications
//! - **Vehicle Model**: Axle layouts from one axle up to six, including dually
//! - **Tire Sync**: Pair every tire position with a sensor by QR code or by hand
//! - **Shared State**: Single-writer store actor with snapshot subscriptions
//! - **Units**: Imperial and metric conversion and formatting
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use smarttire_ble::{Store, TireSensorManager, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let store = Store::spawn();
//!     let manager = TireSensorManager::new().await?;
//!     manager.set_store(store.handle());
//!     manager.initialize().await?;
//!
//!     let tires: Vec<String> = ["front-left", "front-right", "rear-left", "rear-right"]
//!         .map(String::from)
//!         .to_vec();
//!     let found = manager.scan_for_sensors("main-vehicle", &tires).await?;
//!     println!("Found {} sensors", found.len());
//!
//!     manager
//!         .subscribe_to_vehicle_sensors("main-vehicle", |update| {
//!             println!("{}: {:.1} PSI", update.tire_id, update.reading.pressure_psi);
//!         })
//!         .await;
//!
//!     tokio::time::sleep(std::time::Duration::from_secs(30)).await;
//!     manager.cleanup().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Platform Notes
//!
//! ### macOS
//! Requires Bluetooth permission. Add `NSBluetoothAlwaysUsageDescription`
//! to your Info.plist for bundled apps.
//!
//! ### Linux
//! Requires BlueZ. User may need to be in the `bluetooth` group.
//!
//! ### Windows
//! Requires Windows 10 or later with Bluetooth LE support.
//!
//! ## Feature Flags
//!
//! - `serde`: Enable serialization/deserialization for data types

// Public modules
pub mod ble;
pub mod config;
pub mod data;
pub mod error;
pub mod protocol;
pub mod sensor_manager;
pub mod store;
pub mod sync;
pub mod utils;

// Re-exports for convenience
pub use config::{DuplicateSensorPolicy, ManagerConfig, SyncConfig};
pub use error::{Error, Result};
pub use sensor_manager::{CallbackHandle, SensorReading, TireSensor, TireSensorManager};
pub use store::{Action, AppState, Store, StoreHandle};
pub use sync::{apply_vehicle_sync, CompletedSync, SyncMethod, SyncProgress, TireSyncSession};
pub use utils::{
    celsius_to_fahrenheit, convert_pressure, convert_temperature, fahrenheit_to_celsius,
    format_pressure, format_temperature, UnitSystem,
};

// Re-export commonly used types from submodules
pub use ble::connection::ConnectionState;
pub use ble::classifier::{NamePatternClassifier, SensorClassifier, ServiceUuidClassifier};
pub use data::{
    expected_tire_count, AxleType, RegistrationData, Thresholds, TireSample, TireStatus, Vehicle,
};
pub use protocol::{PayloadSchema, TireReading};
