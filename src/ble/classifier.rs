//! Tire sensor classification.
//!
//! Decides whether a discovered peripheral is a tire sensor and which tire
//! position it belongs to. The discovery loop only talks to the
//! [`SensorClassifier`] trait, so the name heuristic can be swapped for a
//! service UUID filter without touching it.

use std::collections::HashSet;
use uuid::Uuid;

use crate::ble::uuids::TIRE_SERVICE_UUID;

/// What the radio tells us about a discovered peripheral.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PeripheralInfo {
    /// Platform peripheral identifier.
    pub id: String,
    /// Device name.
    pub name: Option<String>,
    /// Advertised local name.
    pub local_name: Option<String>,
    /// Advertised service UUIDs.
    pub services: Vec<Uuid>,
    /// Signal strength in dBm.
    pub rssi: Option<i16>,
}

impl PeripheralInfo {
    /// Best available display name (device name, then advertised local name).
    pub fn display_name(&self) -> Option<&str> {
        self.name.as_deref().or(self.local_name.as_deref())
    }
}

/// Tire positions the scan is looking for and the ones already taken.
#[derive(Debug, Clone, Copy)]
pub struct ClassifyContext<'a> {
    /// Expected tire positions of the vehicle, in priority order.
    pub expected: &'a [String],
    /// Positions already bound to a sensor on this vehicle.
    pub assigned: &'a HashSet<String>,
}

impl<'a> ClassifyContext<'a> {
    /// First expected position that has no sensor yet.
    pub fn first_unassigned(&self) -> Option<String> {
        self.expected
            .iter()
            .find(|tire| !self.assigned.contains(*tire))
            .cloned()
    }
}

/// Decides candidacy and tire position for discovered peripherals.
pub trait SensorClassifier: Send + Sync {
    /// Whether the peripheral looks like a tire sensor at all.
    fn is_candidate(&self, peripheral: &PeripheralInfo) -> bool;

    /// Tire position for a candidate, or `None` when nothing fits.
    fn classify(&self, peripheral: &PeripheralInfo, context: &ClassifyContext<'_>)
        -> Option<String>;
}

/// Find the expected tire whose id appears in the peripheral name.
///
/// Each id is tried as-is, with its first `-` turned into a space and with
/// its first `-` removed, case-insensitively.
pub fn match_position_by_name(name: &str, expected: &[String]) -> Option<String> {
    let name = name.to_lowercase();

    expected
        .iter()
        .find(|tire_id| {
            let tire_id = tire_id.to_lowercase();
            [
                tire_id.replacen('-', " ", 1),
                tire_id.clone(),
                tire_id.replacen('-', "", 1),
            ]
            .iter()
            .any(|pattern| name.contains(pattern.as_str()))
        })
        .cloned()
}

/// Name-based tire sensor heuristic.
#[derive(Debug, Clone)]
pub struct NamePatternClassifier {
    /// Substrings of the device name that mark a tire sensor.
    pub name_contains: Vec<String>,
    /// Prefixes of the device name that mark a tire sensor.
    pub name_prefixes: Vec<String>,
    /// Substrings of the advertised local name that mark a tire sensor.
    pub local_name_contains: Vec<String>,
}

impl Default for NamePatternClassifier {
    fn default() -> Self {
        Self {
            name_contains: vec!["Tire".to_string(), "TPMS".to_string()],
            name_prefixes: vec!["TIRE-".to_string()],
            local_name_contains: vec!["Tire".to_string()],
        }
    }
}

impl SensorClassifier for NamePatternClassifier {
    fn is_candidate(&self, peripheral: &PeripheralInfo) -> bool {
        let name_match = peripheral.name.as_deref().is_some_and(|name| {
            self.name_contains.iter().any(|p| name.contains(p.as_str()))
                || self.name_prefixes.iter().any(|p| name.starts_with(p.as_str()))
        });

        let local_name_match = peripheral.local_name.as_deref().is_some_and(|name| {
            self.local_name_contains
                .iter()
                .any(|p| name.contains(p.as_str()))
        });

        name_match || local_name_match
    }

    fn classify(
        &self,
        peripheral: &PeripheralInfo,
        context: &ClassifyContext<'_>,
    ) -> Option<String> {
        peripheral
            .display_name()
            .and_then(|name| match_position_by_name(name, context.expected))
            .or_else(|| context.first_unassigned())
    }
}

/// Service UUID based classifier for hardware that advertises its service.
#[derive(Debug, Clone)]
pub struct ServiceUuidClassifier {
    /// Service UUID that marks a tire sensor.
    pub service_uuid: Uuid,
}

impl Default for ServiceUuidClassifier {
    fn default() -> Self {
        Self {
            service_uuid: TIRE_SERVICE_UUID,
        }
    }
}

impl SensorClassifier for ServiceUuidClassifier {
    fn is_candidate(&self, peripheral: &PeripheralInfo) -> bool {
        peripheral.services.contains(&self.service_uuid)
    }

    fn classify(
        &self,
        peripheral: &PeripheralInfo,
        context: &ClassifyContext<'_>,
    ) -> Option<String> {
        peripheral
            .display_name()
            .and_then(|name| match_position_by_name(name, context.expected))
            .or_else(|| context.first_unassigned())
    }
}
