//! BLE scanning functionality.
//!
//! [`SensorRadio`] abstracts the adapter so the sensor manager can be driven
//! by a scripted radio in tests. [`BleScanner`] is the btleplug radio.

use async_trait::async_trait;
use btleplug::api::{Central, CentralEvent, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, PeripheralId};
use futures::stream::{Stream, StreamExt};
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, info, trace};

use crate::ble::classifier::PeripheralInfo;
use crate::ble::link::{PeripheralLink, SensorLink};
use crate::error::{Error, Result};

/// A peripheral seen during a scan together with a link to it.
#[derive(Clone)]
pub struct Discovery {
    /// Advertised information.
    pub info: PeripheralInfo,
    /// Link used to connect and subscribe later.
    pub link: Arc<dyn SensorLink>,
}

impl fmt::Debug for Discovery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Discovery")
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}

/// Stream of discoveries for one scan.
pub type DiscoveryStream = Pin<Box<dyn Stream<Item = Discovery> + Send>>;

/// Radio operations used by the sensor manager.
#[async_trait]
pub trait SensorRadio: Send + Sync {
    /// Make sure the radio is present and powered.
    async fn enable(&self) -> Result<()>;

    /// Start scanning and return the discovery stream.
    async fn start_scan(&self) -> Result<DiscoveryStream>;

    /// Stop scanning.
    async fn stop_scan(&self) -> Result<()>;
}

/// BLE scanner backed by the first btleplug adapter.
#[derive(Debug, Clone)]
pub struct BleScanner {
    adapter: Adapter,
}

impl BleScanner {
    /// Create a new BLE scanner on the first available adapter.
    ///
    /// # Errors
    ///
    /// Returns an error if Bluetooth is not available.
    pub async fn new() -> Result<Self> {
        let manager = Manager::new()
            .await
            .map_err(|_e| Error::BluetoothUnavailable)?;

        let adapter = manager
            .adapters()
            .await?
            .into_iter()
            .next()
            .ok_or(Error::BluetoothUnavailable)?;

        Ok(Self { adapter })
    }

    /// Create a new BLE scanner with a specific adapter.
    pub fn with_adapter(adapter: Adapter) -> Self {
        Self { adapter }
    }

    /// Get the underlying adapter.
    pub fn adapter(&self) -> &Adapter {
        &self.adapter
    }

    /// Turn a discovered or updated peripheral into a [`Discovery`].
    async fn process_peripheral(adapter: &Adapter, id: PeripheralId) -> Option<Discovery> {
        let peripheral = match adapter.peripheral(&id).await {
            Ok(p) => p,
            Err(e) => {
                trace!("Failed to get peripheral: {}", e);
                return None;
            }
        };

        let properties = match peripheral.properties().await {
            Ok(Some(p)) => p,
            _ => return None,
        };

        let info = PeripheralInfo {
            id: id.to_string(),
            name: properties.local_name.clone(),
            local_name: properties.local_name,
            services: properties.services,
            rssi: properties.rssi,
        };

        Some(Discovery {
            info,
            link: Arc::new(PeripheralLink::new(peripheral)),
        })
    }
}

#[async_trait]
impl SensorRadio for BleScanner {
    async fn enable(&self) -> Result<()> {
        let info = self
            .adapter
            .adapter_info()
            .await
            .map_err(|_e| Error::BluetoothUnavailable)?;
        info!("Using Bluetooth adapter: {}", info);
        Ok(())
    }

    async fn start_scan(&self) -> Result<DiscoveryStream> {
        info!("Starting BLE scan for tire sensors");

        let events = self.adapter.events().await?;
        self.adapter.start_scan(ScanFilter::default()).await?;

        let adapter = self.adapter.clone();
        let stream = events.filter_map(move |event| {
            let adapter = adapter.clone();
            async move {
                match event {
                    CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => {
                        trace!("Device discovered or updated: {:?}", id);
                        Self::process_peripheral(&adapter, id).await
                    }
                    CentralEvent::DeviceDisconnected(id) => {
                        debug!("Device disconnected: {:?}", id);
                        None
                    }
                    _ => None,
                }
            }
        });

        Ok(Box::pin(stream))
    }

    async fn stop_scan(&self) -> Result<()> {
        info!("Stopping BLE scan");
        self.adapter.stop_scan().await?;
        Ok(())
    }
}
