//! GATT link to a single tire sensor.
//!
//! [`SensorLink`] is the seam between the sensor manager and the radio: the
//! btleplug-backed [`PeripheralLink`] talks to real hardware, tests use the
//! generated `MockSensorLink`.

use async_trait::async_trait;
use btleplug::api::Peripheral as _;
use btleplug::platform::Peripheral;
use futures::stream::{Stream, StreamExt};
use std::pin::Pin;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Notification event from a characteristic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationEvent {
    /// UUID of the characteristic that sent the notification.
    pub characteristic_uuid: Uuid,
    /// The notification data.
    pub data: Vec<u8>,
}

/// Stream of notifications from a connected sensor.
pub type NotificationStream = Pin<Box<dyn Stream<Item = NotificationEvent> + Send>>;

/// Operations the sensor manager needs from a connected peripheral.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SensorLink: Send + Sync {
    /// Open the link.
    async fn connect(&self) -> Result<()>;

    /// Discover services and characteristics.
    async fn discover_services(&self) -> Result<()>;

    /// Enable notifications on a characteristic of a service.
    async fn subscribe(&self, service: Uuid, characteristic: Uuid) -> Result<()>;

    /// Notification stream for this peripheral.
    async fn notifications(&self) -> Result<NotificationStream>;

    /// Close the link.
    async fn disconnect(&self) -> Result<()>;
}

/// [`SensorLink`] over a btleplug peripheral.
#[derive(Debug, Clone)]
pub struct PeripheralLink {
    peripheral: Peripheral,
}

impl PeripheralLink {
    /// Wrap a peripheral.
    pub fn new(peripheral: Peripheral) -> Self {
        Self { peripheral }
    }

    /// Get the underlying peripheral.
    pub fn peripheral(&self) -> &Peripheral {
        &self.peripheral
    }

    fn id(&self) -> String {
        self.peripheral.id().to_string()
    }
}

#[async_trait]
impl SensorLink for PeripheralLink {
    async fn connect(&self) -> Result<()> {
        if self.peripheral.is_connected().await.unwrap_or(false) {
            debug!("Peripheral {} already connected at BLE level", self.id());
            return Ok(());
        }

        self.peripheral
            .connect()
            .await
            .map_err(|e| Error::ConnectionFailed {
                reason: e.to_string(),
            })
    }

    async fn discover_services(&self) -> Result<()> {
        self.peripheral.discover_services().await?;

        for service in self.peripheral.services() {
            for characteristic in &service.characteristics {
                trace!(
                    "Found characteristic: {} in service {}",
                    characteristic.uuid,
                    service.uuid
                );
            }
        }

        Ok(())
    }

    async fn subscribe(&self, service: Uuid, characteristic: Uuid) -> Result<()> {
        let target = self
            .peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == characteristic && c.service_uuid == service)
            .ok_or_else(|| {
                debug!(
                    "Characteristic {} not found in service {} on {}",
                    characteristic,
                    service,
                    self.id()
                );
                Error::CharacteristicNotFound {
                    uuid: characteristic.to_string(),
                }
            })?;

        debug!(
            "Subscribing to {}, properties: {:?}",
            characteristic, target.properties
        );

        self.peripheral.subscribe(&target).await?;
        Ok(())
    }

    async fn notifications(&self) -> Result<NotificationStream> {
        let stream = self.peripheral.notifications().await?;

        Ok(Box::pin(stream.map(|notification| {
            trace!(
                "Notification from {}: {:02X?}",
                notification.uuid,
                notification.value
            );
            NotificationEvent {
                characteristic_uuid: notification.uuid,
                data: notification.value,
            }
        })))
    }

    async fn disconnect(&self) -> Result<()> {
        self.peripheral.disconnect().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ble::uuids::{TIRE_DATA_CHARACTERISTIC_UUID, TIRE_SERVICE_UUID};

    #[test]
    fn test_notification_event_clone() {
        let event = NotificationEvent {
            characteristic_uuid: TIRE_DATA_CHARACTERISTIC_UUID,
            data: vec![1, 2, 3],
        };
        assert_eq!(event.clone(), event);
    }

    #[tokio::test]
    async fn test_mock_link_reports_missing_characteristic() {
        let mut link = MockSensorLink::new();
        link.expect_subscribe()
            .withf(|service, _| *service == TIRE_SERVICE_UUID)
            .returning(|_, characteristic| {
                Err(Error::CharacteristicNotFound {
                    uuid: characteristic.to_string(),
                })
            });

        let err = link
            .subscribe(TIRE_SERVICE_UUID, TIRE_DATA_CHARACTERISTIC_UUID)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::CharacteristicNotFound { .. }));
    }
}
