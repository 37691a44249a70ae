//! BLE communication module.
//!
//! This module provides low-level Bluetooth Low Energy functionality
//! for discovering, classifying and talking to tire sensors.

pub mod classifier;
pub mod connection;
pub mod link;
pub mod scanner;
pub mod uuids;

pub use classifier::{
    ClassifyContext, NamePatternClassifier, PeripheralInfo, SensorClassifier,
    ServiceUuidClassifier,
};
pub use connection::{ConnectionEvent, ConnectionState};
pub use link::{NotificationEvent, NotificationStream, PeripheralLink, SensorLink};
pub use scanner::{BleScanner, Discovery, DiscoveryStream, SensorRadio};
pub use uuids::*;
