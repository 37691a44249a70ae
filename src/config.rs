//! Runtime configuration for the sensor manager and the tire-sync workflow.

use std::time::Duration;
use uuid::Uuid;

use crate::ble::uuids::{TIRE_DATA_CHARACTERISTIC_UUID, TIRE_SERVICE_UUID};
use crate::data::{Thresholds, TireSample};
use crate::protocol::PayloadSchema;

/// Default scan window.
pub const DEFAULT_SCAN_WINDOW: Duration = Duration::from_secs(10);

/// Default capacity of the sensor-found and reading broadcast channels.
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Sensor manager configuration.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ManagerConfig {
    /// How long one scan stays open.
    pub scan_window: Duration,
    /// Service carrying tire data.
    pub service_uuid: Uuid,
    /// Characteristic that notifies tire data.
    pub characteristic_uuid: Uuid,
    /// Payload layout for notifications.
    pub schema: PayloadSchema,
    /// Broadcast channel capacity.
    pub event_capacity: usize,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            scan_window: DEFAULT_SCAN_WINDOW,
            service_uuid: TIRE_SERVICE_UUID,
            characteristic_uuid: TIRE_DATA_CHARACTERISTIC_UUID,
            schema: PayloadSchema::V1,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl ManagerConfig {
    /// Set the scan window.
    pub fn with_scan_window(mut self, scan_window: Duration) -> Self {
        self.scan_window = scan_window;
        self
    }

    /// Set the tire service and characteristic UUIDs.
    pub fn with_uuids(mut self, service_uuid: Uuid, characteristic_uuid: Uuid) -> Self {
        self.service_uuid = service_uuid;
        self.characteristic_uuid = characteristic_uuid;
        self
    }

    /// Set the payload schema.
    pub fn with_schema(mut self, schema: PayloadSchema) -> Self {
        self.schema = schema;
        self
    }

    /// Set the broadcast channel capacity (at least 1).
    pub fn with_event_capacity(mut self, event_capacity: usize) -> Self {
        self.event_capacity = event_capacity.max(1);
        self
    }
}

/// What to do when the same sensor id is entered for two tire positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DuplicateSensorPolicy {
    /// Refuse the second pairing.
    #[default]
    Reject,
    /// Accept it.
    Allow,
}

/// Tire-sync workflow configuration.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SyncConfig {
    /// Duplicate sensor handling.
    pub duplicate_policy: DuplicateSensorPolicy,
    /// Sample written for every paired tire when a sync completes.
    pub seed: TireSample,
    /// Thresholds applied when the caller supplies none.
    pub default_thresholds: Thresholds,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            duplicate_policy: DuplicateSensorPolicy::default(),
            seed: TireSample::SEED,
            default_thresholds: Thresholds::default(),
        }
    }
}

impl SyncConfig {
    /// Set the duplicate sensor policy.
    pub fn with_duplicate_policy(mut self, policy: DuplicateSensorPolicy) -> Self {
        self.duplicate_policy = policy;
        self
    }
}
