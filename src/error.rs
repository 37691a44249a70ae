//! Error types for the smarttire-ble crate.

use thiserror::Error;

/// The main error type for this crate.
#[derive(Error, Debug)]
pub enum Error {
    /// Bluetooth-related error from the underlying BLE library.
    #[error("Bluetooth error: {0}")]
    Bluetooth(#[from] btleplug::Error),

    /// Bluetooth is not available or is disabled on this system.
    #[error("Bluetooth not available or disabled")]
    BluetoothUnavailable,

    /// The specified sensor was not found.
    #[error("Sensor not found: {identifier}")]
    SensorNotFound {
        /// The identifier that was searched for.
        identifier: String,
    },

    /// Failed to establish a connection to the sensor.
    #[error("Connection failed: {reason}")]
    ConnectionFailed {
        /// Description of why the connection failed.
        reason: String,
    },

    /// Characteristic not found on the device.
    #[error("Characteristic not found: {uuid}")]
    CharacteristicNotFound {
        /// The UUID of the characteristic that was not found.
        uuid: String,
    },

    /// An invalid parameter was provided.
    #[error("Invalid parameter: {name} = {value}")]
    InvalidParameter {
        /// The name of the parameter.
        name: String,
        /// The invalid value that was provided.
        value: String,
    },

    /// User supplied input was rejected.
    #[error("{field}: {message}")]
    Validation {
        /// The input field that failed validation.
        field: String,
        /// Human readable reason.
        message: String,
    },

    /// The tire position does not exist on the vehicle's axle layout.
    #[error("Tire position {tire_id} is not part of a {axle_type} layout")]
    UnknownTirePosition {
        /// The rejected tire position.
        tire_id: String,
        /// The axle type of the vehicle.
        axle_type: String,
    },

    /// The sensor id is already paired with another tire position.
    #[error("Sensor {sensor_id} is already paired with {tire_id}")]
    DuplicateSensor {
        /// The sensor id that was entered twice.
        sensor_id: String,
        /// The tire position already holding it.
        tire_id: String,
    },

    /// Vehicle sync was completed before every tire was paired.
    #[error("Vehicle sync incomplete: {synced} of {expected} tires paired")]
    SyncIncomplete {
        /// Number of paired tires.
        synced: usize,
        /// Number of tires the axle layout expects.
        expected: usize,
    },

    /// The sync session already completed.
    #[error("Sync session already completed")]
    SyncClosed,

    /// The store actor is no longer running.
    #[error("Store is closed")]
    StoreClosed,

    /// An internal error occurred.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Shorthand for a [`Error::Validation`] error.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// A specialized Result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
