//! Tire sensor manager.
//!
//! Discovers tire sensors over BLE, binds each one to a tire position of a
//! vehicle, connects, subscribes to tire data notifications and feeds every
//! decoded reading into the store.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use futures::stream::StreamExt;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::futures::Notified;
use tokio::sync::{broadcast, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use crate::ble::classifier::{
    ClassifyContext, NamePatternClassifier, PeripheralInfo, SensorClassifier,
};
use crate::ble::connection::{ConnectionEvent, ConnectionState};
use crate::ble::link::{NotificationStream, SensorLink};
use crate::ble::scanner::{BleScanner, Discovery, SensorRadio};
use crate::config::ManagerConfig;
use crate::data::TireSample;
use crate::error::{Error, Result};
use crate::protocol::{PayloadSchema, TireReading};
use crate::store::{Action, StoreHandle};

/// Callback handle for unregistering callbacks.
///
/// The callback is unregistered when the handle is dropped.
pub struct CallbackHandle {
    id: u64,
    unregister_fn: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl CallbackHandle {
    pub(crate) fn new(id: u64, unregister_fn: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            id,
            unregister_fn: Some(Box::new(unregister_fn)),
        }
    }

    /// Unregister this callback.
    pub fn unregister(mut self) {
        if let Some(f) = self.unregister_fn.take() {
            f();
        }
    }

    /// Get the callback ID.
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for CallbackHandle {
    fn drop(&mut self) {
        if let Some(f) = self.unregister_fn.take() {
            f();
        }
    }
}

/// A discovered tire sensor.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TireSensor {
    /// Peripheral identifier.
    pub id: String,
    /// Vehicle the sensor belongs to.
    pub vehicle_id: String,
    /// Tire position on that vehicle.
    pub tire_id: String,
    /// What the radio reported at discovery.
    pub info: PeripheralInfo,
    /// Connection state.
    pub state: ConnectionState,
    /// Time of the last decoded reading.
    pub last_update: Option<DateTime<Utc>>,
}

impl TireSensor {
    /// Check if the link is up.
    pub fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    /// Display name, falling back to the peripheral id.
    pub fn name(&self) -> &str {
        self.info.display_name().unwrap_or(&self.id)
    }
}

/// A decoded reading attributed to a sensor and tire.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorReading {
    /// Peripheral identifier.
    pub sensor_id: String,
    /// Vehicle the tire belongs to.
    pub vehicle_id: String,
    /// Tire position.
    pub tire_id: String,
    /// The reading.
    pub reading: TireReading,
}

struct SensorEntry {
    sensor: TireSensor,
    link: Arc<dyn SensorLink>,
    listener: Option<JoinHandle<()>>,
}

type SensorMap = Arc<RwLock<HashMap<String, SensorEntry>>>;

/// Set a sensor's state and emit an event when it changed.
fn update_state(
    sensors: &SensorMap,
    connection_tx: &broadcast::Sender<ConnectionEvent>,
    sensor_id: &str,
    new_state: ConnectionState,
) {
    let old_state = {
        let mut sensors = sensors.write();
        let Some(entry) = sensors.get_mut(sensor_id) else {
            return;
        };
        std::mem::replace(&mut entry.sensor.state, new_state)
    };

    if old_state != new_state {
        debug!(
            "Sensor {} state changed: {} -> {}",
            sensor_id, old_state, new_state
        );
        let _ = connection_tx.send(ConnectionEvent {
            sensor_id: sensor_id.to_string(),
            state: new_state,
        });
    }
}

/// Everything a notification listener task needs.
struct Listener<F> {
    sensor_id: String,
    sensors: SensorMap,
    store: Arc<RwLock<Option<StoreHandle>>>,
    reading_tx: broadcast::Sender<SensorReading>,
    connection_tx: broadcast::Sender<ConnectionEvent>,
    characteristic_uuid: Uuid,
    schema: PayloadSchema,
    on_update: F,
}

impl<F> Listener<F>
where
    F: Fn(&SensorReading) + Send + Sync + 'static,
{
    async fn run(self, mut notifications: NotificationStream) {
        debug!("Notification listener for {} started", self.sensor_id);

        while let Some(event) = notifications.next().await {
            if event.characteristic_uuid != self.characteristic_uuid {
                trace!(
                    "Ignoring notification from {} on {}",
                    self.sensor_id,
                    event.characteristic_uuid
                );
                continue;
            }

            let Some(reading) = self.schema.decode(&event.data) else {
                debug!(
                    "Dropping malformed payload from {}: {:02X?}",
                    self.sensor_id, event.data
                );
                continue;
            };

            // Read the binding on every reading so position remaps apply live.
            let binding = {
                let mut sensors = self.sensors.write();
                sensors.get_mut(&self.sensor_id).map(|entry| {
                    entry.sensor.last_update = Some(reading.timestamp);
                    (entry.sensor.vehicle_id.clone(), entry.sensor.tire_id.clone())
                })
            };
            let Some((vehicle_id, tire_id)) = binding else {
                break;
            };

            self.store_reading(&vehicle_id, &tire_id, &reading);

            let update = SensorReading {
                sensor_id: self.sensor_id.clone(),
                vehicle_id,
                tire_id,
                reading,
            };
            (self.on_update)(&update);
            let _ = self.reading_tx.send(update);
        }

        info!("Notification stream for {} ended", self.sensor_id);
        update_state(
            &self.sensors,
            &self.connection_tx,
            &self.sensor_id,
            ConnectionState::Disconnected,
        );
    }

    fn store_reading(&self, vehicle_id: &str, tire_id: &str, reading: &TireReading) {
        let store = self.store.read().clone();
        let Some(store) = store else {
            warn!(
                "No store set, reading from {} for {} not stored",
                self.sensor_id, tire_id
            );
            return;
        };

        let mut tire_data = BTreeMap::new();
        tire_data.insert(
            tire_id.to_string(),
            TireSample::new(reading.pressure_psi, reading.temperature_celsius),
        );

        if let Err(e) = store.dispatch(Action::UpdateVehicleTireData {
            vehicle_id: vehicle_id.to_string(),
            tire_data,
        }) {
            warn!("Failed to store reading from {}: {}", self.sensor_id, e);
        }
    }
}

/// Central manager for tire sensors.
pub struct TireSensorManager {
    /// Radio used for scanning.
    radio: Arc<dyn SensorRadio>,
    /// Decides candidacy and tire positions.
    classifier: Arc<dyn SensorClassifier>,
    /// Configuration.
    config: ManagerConfig,
    /// Known sensors by peripheral id.
    sensors: SensorMap,
    /// Store readings are dispatched to.
    store: Arc<RwLock<Option<StoreHandle>>>,
    /// Token of the scan that owns the radio, 0 when idle.
    scan_owner: AtomicU64,
    /// Source of scan tokens.
    scan_seq: AtomicU64,
    /// Wakes a pending scan on cleanup.
    scan_cancel: Notify,
    /// Sensor found channel.
    sensor_found_tx: broadcast::Sender<TireSensor>,
    /// Reading channel.
    reading_tx: broadcast::Sender<SensorReading>,
    /// Connection state channel.
    connection_tx: broadcast::Sender<ConnectionEvent>,
    /// Callback ID counter.
    callback_counter: AtomicU64,
}

impl TireSensorManager {
    /// Create a manager on the first Bluetooth adapter with default settings.
    ///
    /// # Errors
    ///
    /// Returns an error if Bluetooth is not available.
    pub async fn new() -> Result<Self> {
        Self::with_config(ManagerConfig::default()).await
    }

    /// Create a manager on the first Bluetooth adapter.
    pub async fn with_config(config: ManagerConfig) -> Result<Self> {
        let scanner = BleScanner::new().await?;
        Ok(Self::with_radio(
            Arc::new(scanner),
            Arc::new(NamePatternClassifier::default()),
            config,
        ))
    }

    /// Create a manager over any radio and classifier.
    pub fn with_radio(
        radio: Arc<dyn SensorRadio>,
        classifier: Arc<dyn SensorClassifier>,
        config: ManagerConfig,
    ) -> Self {
        let capacity = config.event_capacity.max(1);
        let (sensor_found_tx, _) = broadcast::channel(capacity);
        let (reading_tx, _) = broadcast::channel(capacity);
        let (connection_tx, _) = broadcast::channel(capacity);

        Self {
            radio,
            classifier,
            config,
            sensors: Arc::new(RwLock::new(HashMap::new())),
            store: Arc::new(RwLock::new(None)),
            scan_owner: AtomicU64::new(0),
            scan_seq: AtomicU64::new(0),
            scan_cancel: Notify::new(),
            sensor_found_tx,
            reading_tx,
            connection_tx,
            callback_counter: AtomicU64::new(0),
        }
    }

    /// Set the store readings are dispatched to.
    pub fn set_store(&self, store: StoreHandle) {
        *self.store.write() = Some(store);
    }

    /// Get the configuration.
    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Make sure Bluetooth is available.
    pub async fn initialize(&self) -> Result<()> {
        self.radio.enable().await?;
        info!("Tire sensor manager initialized");
        Ok(())
    }

    // === Discovery ===

    /// Scan for the sensors of a vehicle.
    ///
    /// See [`scan_for_sensors_with`](Self::scan_for_sensors_with).
    pub async fn scan_for_sensors(
        &self,
        vehicle_id: &str,
        expected_tires: &[String],
    ) -> Result<Vec<TireSensor>> {
        self.scan_for_sensors_with(vehicle_id, expected_tires, |_| {})
            .await
    }

    /// Scan for the sensors of a vehicle, calling `on_found` for each new one.
    ///
    /// The scan stays open for the configured window and returns the sensors
    /// found during it. It ends early when the radio stops yielding or
    /// [`cleanup`](Self::cleanup) runs. A call while another scan is running
    /// returns an empty list right away.
    pub async fn scan_for_sensors_with<F>(
        &self,
        vehicle_id: &str,
        expected_tires: &[String],
        on_found: F,
    ) -> Result<Vec<TireSensor>>
    where
        F: FnMut(&TireSensor) + Send,
    {
        let cancelled = self.scan_cancel.notified();
        let token = self.scan_seq.fetch_add(1, Ordering::SeqCst) + 1;
        if self
            .scan_owner
            .compare_exchange(0, token, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Scan already in progress, ignoring request");
            return Ok(Vec::new());
        }

        let result = self
            .run_scan(vehicle_id, expected_tires, cancelled, on_found)
            .await;

        // A cleanup may have released the radio to a newer scan already.
        let _ = self
            .scan_owner
            .compare_exchange(token, 0, Ordering::SeqCst, Ordering::SeqCst);
        result
    }

    async fn run_scan<F>(
        &self,
        vehicle_id: &str,
        expected_tires: &[String],
        cancelled: Notified<'_>,
        mut on_found: F,
    ) -> Result<Vec<TireSensor>>
    where
        F: FnMut(&TireSensor) + Send,
    {
        tokio::pin!(cancelled);

        info!(
            "Scanning {:?} for sensors of {} ({} tires)",
            self.config.scan_window,
            vehicle_id,
            expected_tires.len()
        );

        let mut discoveries = self.radio.start_scan().await?;
        let deadline = tokio::time::sleep(self.config.scan_window);
        tokio::pin!(deadline);

        let mut found = Vec::new();

        loop {
            tokio::select! {
                _ = &mut deadline => {
                    debug!("Scan window closed");
                    break;
                }
                _ = &mut cancelled => {
                    debug!("Scan cancelled");
                    break;
                }
                next = discoveries.next() => match next {
                    Some(discovery) => {
                        if let Some(sensor) =
                            self.handle_discovery(vehicle_id, expected_tires, discovery)
                        {
                            on_found(&sensor);
                            let _ = self.sensor_found_tx.send(sensor.clone());
                            found.push(sensor);
                        }
                    }
                    None => {
                        debug!("Discovery stream ended");
                        break;
                    }
                },
            }
        }

        if let Err(e) = self.radio.stop_scan().await {
            warn!("Failed to stop scan: {}", e);
        }

        info!("Scan finished with {} new sensors", found.len());
        Ok(found)
    }

    /// Record a discovery as a sensor if it is a new candidate with a free position.
    fn handle_discovery(
        &self,
        vehicle_id: &str,
        expected_tires: &[String],
        discovery: Discovery,
    ) -> Option<TireSensor> {
        if !self.classifier.is_candidate(&discovery.info) {
            trace!("Ignoring non-sensor device {}", discovery.info.id);
            return None;
        }

        let mut sensors = self.sensors.write();
        if sensors.contains_key(&discovery.info.id) {
            trace!("Sensor {} already known", discovery.info.id);
            return None;
        }

        let assigned: HashSet<String> = sensors
            .values()
            .filter(|entry| entry.sensor.vehicle_id == vehicle_id)
            .map(|entry| entry.sensor.tire_id.clone())
            .collect();
        let context = ClassifyContext {
            expected: expected_tires,
            assigned: &assigned,
        };

        let Some(tire_id) = self.classifier.classify(&discovery.info, &context) else {
            debug!(
                "No free tire position for {} on {}",
                discovery.info.id, vehicle_id
            );
            return None;
        };

        let sensor = TireSensor {
            id: discovery.info.id.clone(),
            vehicle_id: vehicle_id.to_string(),
            tire_id,
            info: discovery.info,
            state: ConnectionState::Discovered,
            last_update: None,
        };

        info!(
            "Found tire sensor {} ({}) for {} / {}",
            sensor.name(),
            sensor.id,
            sensor.vehicle_id,
            sensor.tire_id
        );

        sensors.insert(
            sensor.id.clone(),
            SensorEntry {
                sensor: sensor.clone(),
                link: discovery.link,
                listener: None,
            },
        );

        Some(sensor)
    }

    /// Bind a sensor to another tire position.
    pub fn assign_tire_position(&self, sensor_id: &str, tire_id: &str) -> Result<()> {
        if tire_id.trim().is_empty() {
            return Err(Error::InvalidParameter {
                name: "tire_id".to_string(),
                value: tire_id.to_string(),
            });
        }

        let mut sensors = self.sensors.write();
        let entry = sensors
            .get_mut(sensor_id)
            .ok_or_else(|| Error::SensorNotFound {
                identifier: sensor_id.to_string(),
            })?;

        info!(
            "Assigning sensor {} to {} (was {})",
            sensor_id, tire_id, entry.sensor.tire_id
        );
        entry.sensor.tire_id = tire_id.to_string();
        Ok(())
    }

    // === Connection ===

    fn link(&self, sensor_id: &str) -> Result<Arc<dyn SensorLink>> {
        self.sensors
            .read()
            .get(sensor_id)
            .map(|entry| entry.link.clone())
            .ok_or_else(|| Error::SensorNotFound {
                identifier: sensor_id.to_string(),
            })
    }

    fn set_state(&self, sensor_id: &str, state: ConnectionState) {
        update_state(&self.sensors, &self.connection_tx, sensor_id, state);
    }

    /// Connect to a sensor and discover its services.
    ///
    /// On failure the sensor is marked disconnected and the error returned.
    pub async fn connect_to_sensor(&self, sensor_id: &str) -> Result<()> {
        let link = self.link(sensor_id)?;

        if self
            .get_sensor(sensor_id)
            .is_some_and(|sensor| sensor.is_connected())
        {
            debug!("Sensor {} already connected", sensor_id);
            return Ok(());
        }

        info!("Connecting to sensor {}", sensor_id);
        self.set_state(sensor_id, ConnectionState::Connecting);

        let result = async {
            link.connect().await?;
            link.discover_services().await
        }
        .await;

        match result {
            Ok(()) => {
                info!("Connected to sensor {}", sensor_id);
                self.set_state(sensor_id, ConnectionState::Connected);
                Ok(())
            }
            Err(e) => {
                warn!("Failed to connect to sensor {}: {}", sensor_id, e);
                self.set_state(sensor_id, ConnectionState::Disconnected);
                Err(e)
            }
        }
    }

    /// Subscribe to tire data notifications of a sensor.
    ///
    /// Connects first when needed. Every decoded reading is dispatched to the
    /// store, broadcast to reading subscribers and passed to `on_update`.
    /// Subscribing again replaces the previous listener.
    pub async fn subscribe_to_tire_data<F>(&self, sensor_id: &str, on_update: F) -> Result<()>
    where
        F: Fn(&SensorReading) + Send + Sync + 'static,
    {
        let sensor = self
            .get_sensor(sensor_id)
            .ok_or_else(|| Error::SensorNotFound {
                identifier: sensor_id.to_string(),
            })?;

        if !sensor.is_connected() {
            self.connect_to_sensor(sensor_id).await?;
        }

        let link = self.link(sensor_id)?;
        let notifications = link.notifications().await?;
        link.subscribe(self.config.service_uuid, self.config.characteristic_uuid)
            .await?;

        let listener = Listener {
            sensor_id: sensor_id.to_string(),
            sensors: self.sensors.clone(),
            store: self.store.clone(),
            reading_tx: self.reading_tx.clone(),
            connection_tx: self.connection_tx.clone(),
            characteristic_uuid: self.config.characteristic_uuid,
            schema: self.config.schema,
            on_update,
        };

        // Subscribed must be in place before the listener can report a
        // closed stream.
        self.set_state(sensor_id, ConnectionState::Subscribed);
        let handle = tokio::spawn(listener.run(notifications));

        let installed = {
            let mut sensors = self.sensors.write();
            match sensors.get_mut(sensor_id) {
                Some(entry) => Ok(entry.listener.replace(handle)),
                None => Err(handle),
            }
        };

        match installed {
            Ok(previous) => {
                if let Some(previous) = previous {
                    previous.abort();
                }
                info!("Subscribed to tire data from {}", sensor_id);
                Ok(())
            }
            Err(orphan) => {
                debug!("Sensor {} removed while subscribing", sensor_id);
                orphan.abort();
                if let Err(e) = link.disconnect().await {
                    warn!("Error disconnecting sensor {}: {}", sensor_id, e);
                }
                Err(Error::SensorNotFound {
                    identifier: sensor_id.to_string(),
                })
            }
        }
    }

    fn vehicle_sensor_ids(&self, vehicle_id: &str) -> Vec<String> {
        self.sensors
            .read()
            .values()
            .filter(|entry| entry.sensor.vehicle_id == vehicle_id)
            .map(|entry| entry.sensor.id.clone())
            .collect()
    }

    /// Connect to every sensor of a vehicle in parallel.
    ///
    /// Individual failures are logged and do not stop the others.
    pub async fn connect_to_vehicle_sensors(&self, vehicle_id: &str) {
        let ids = self.vehicle_sensor_ids(vehicle_id);
        debug!("Connecting to {} sensors of {}", ids.len(), vehicle_id);

        join_all(ids.iter().map(|id| async move {
            if let Err(e) = self.connect_to_sensor(id).await {
                warn!("Sensor {} of {} failed to connect: {}", id, vehicle_id, e);
            }
        }))
        .await;
    }

    /// Subscribe to every sensor of a vehicle in parallel.
    ///
    /// Individual failures are logged and do not stop the others.
    pub async fn subscribe_to_vehicle_sensors<F>(&self, vehicle_id: &str, on_update: F)
    where
        F: Fn(&SensorReading) + Send + Sync + 'static,
    {
        let ids = self.vehicle_sensor_ids(vehicle_id);
        let on_update = Arc::new(on_update);
        debug!("Subscribing to {} sensors of {}", ids.len(), vehicle_id);

        join_all(ids.iter().map(|id| {
            let on_update = on_update.clone();
            async move {
                let result = self
                    .subscribe_to_tire_data(id, move |reading| (*on_update)(reading))
                    .await;
                if let Err(e) = result {
                    warn!("Sensor {} of {} failed to subscribe: {}", id, vehicle_id, e);
                }
            }
        }))
        .await;
    }

    /// Disconnect from a sensor.
    ///
    /// Unknown ids are ignored. The sensor ends up disconnected even when
    /// the radio reports an error, which is then returned.
    pub async fn disconnect_from_sensor(&self, sensor_id: &str) -> Result<()> {
        let (link, listener) = {
            let mut sensors = self.sensors.write();
            match sensors.get_mut(sensor_id) {
                Some(entry) => (entry.link.clone(), entry.listener.take()),
                None => {
                    debug!("Disconnect requested for unknown sensor {}", sensor_id);
                    return Ok(());
                }
            }
        };

        if let Some(listener) = listener {
            listener.abort();
        }

        let result = link.disconnect().await;
        self.set_state(sensor_id, ConnectionState::Disconnected);

        match &result {
            Ok(()) => info!("Disconnected from sensor {}", sensor_id),
            Err(e) => warn!("Error disconnecting sensor {}: {}", sensor_id, e),
        }
        result
    }

    // === Queries ===

    /// Connected sensors, optionally limited to one vehicle.
    pub fn connected_sensors(&self, vehicle_id: Option<&str>) -> Vec<TireSensor> {
        self.sensors
            .read()
            .values()
            .map(|entry| &entry.sensor)
            .filter(|sensor| sensor.is_connected())
            .filter(|sensor| vehicle_id.map_or(true, |id| sensor.vehicle_id == id))
            .cloned()
            .collect()
    }

    /// All known sensors.
    pub fn sensors(&self) -> Vec<TireSensor> {
        self.sensors
            .read()
            .values()
            .map(|entry| entry.sensor.clone())
            .collect()
    }

    /// Get a sensor by peripheral id.
    pub fn get_sensor(&self, sensor_id: &str) -> Option<TireSensor> {
        self.sensors
            .read()
            .get(sensor_id)
            .map(|entry| entry.sensor.clone())
    }

    /// Get the number of known sensors.
    pub fn sensor_count(&self) -> usize {
        self.sensors.read().len()
    }

    /// Check if a scan is running.
    pub fn is_scanning(&self) -> bool {
        self.scan_owner.load(Ordering::SeqCst) != 0
    }

    // === Events ===

    /// Subscribe to sensor discovery events.
    pub fn subscribe_sensor_found(&self) -> broadcast::Receiver<TireSensor> {
        self.sensor_found_tx.subscribe()
    }

    /// Register a callback for discovered sensors.
    pub fn on_sensor_found<F>(&self, callback: F) -> CallbackHandle
    where
        F: Fn(TireSensor) + Send + Sync + 'static,
    {
        let callback_id = self.callback_counter.fetch_add(1, Ordering::SeqCst);
        let mut rx = self.sensor_found_tx.subscribe();

        let handle = tokio::spawn(async move {
            while let Ok(sensor) = rx.recv().await {
                callback(sensor);
            }
        });

        CallbackHandle::new(callback_id, move || {
            handle.abort();
        })
    }

    /// Subscribe to decoded readings from every sensor.
    pub fn subscribe_readings(&self) -> broadcast::Receiver<SensorReading> {
        self.reading_tx.subscribe()
    }

    /// Register a callback for decoded readings.
    pub fn on_reading<F>(&self, callback: F) -> CallbackHandle
    where
        F: Fn(SensorReading) + Send + Sync + 'static,
    {
        let callback_id = self.callback_counter.fetch_add(1, Ordering::SeqCst);
        let mut rx = self.reading_tx.subscribe();

        let handle = tokio::spawn(async move {
            while let Ok(reading) = rx.recv().await {
                callback(reading);
            }
        });

        CallbackHandle::new(callback_id, move || {
            handle.abort();
        })
    }

    /// Subscribe to connection state changes.
    pub fn subscribe_connection_events(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.connection_tx.subscribe()
    }

    // === Teardown ===

    /// Stop everything and forget all sensors.
    ///
    /// Cancels a running scan, stops every listener and disconnects every
    /// connected sensor on a best-effort basis.
    pub async fn cleanup(&self) {
        info!("Cleaning up tire sensor manager");

        self.scan_cancel.notify_waiters();
        self.scan_owner.store(0, Ordering::SeqCst);

        let entries: Vec<SensorEntry> = self.sensors.write().drain().map(|(_, e)| e).collect();

        join_all(entries.into_iter().map(|mut entry| async move {
            if let Some(listener) = entry.listener.take() {
                listener.abort();
            }
            if entry.sensor.is_connected() {
                if let Err(e) = entry.link.disconnect().await {
                    warn!("Error disconnecting sensor {}: {}", entry.sensor.id, e);
                }
            }
        }))
        .await;
    }
}

impl Drop for TireSensorManager {
    fn drop(&mut self) {
        for entry in self.sensors.write().values_mut() {
            if let Some(listener) = entry.listener.take() {
                listener.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ble::link::{MockSensorLink, NotificationEvent};
    use crate::ble::scanner::DiscoveryStream;
    use crate::ble::uuids::TIRE_DATA_CHARACTERISTIC_UUID;
    use crate::data::Vehicle;
    use crate::store::{AppState, Store};
    use async_trait::async_trait;
    use futures::channel::mpsc as fmpsc;
    use futures::stream;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    /// Radio that yields a fixed set of discoveries.
    struct FakeRadio {
        discoveries: parking_lot::Mutex<Vec<Discovery>>,
        hold_open: bool,
        starts: AtomicUsize,
        stops: AtomicUsize,
    }

    impl FakeRadio {
        fn new(discoveries: Vec<Discovery>, hold_open: bool) -> Arc<Self> {
            Arc::new(Self {
                discoveries: parking_lot::Mutex::new(discoveries),
                hold_open,
                starts: AtomicUsize::new(0),
                stops: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl SensorRadio for FakeRadio {
        async fn enable(&self) -> Result<()> {
            Ok(())
        }

        async fn start_scan(&self) -> Result<DiscoveryStream> {
            self.starts.fetch_add(1, Ordering::SeqCst);
            let items = std::mem::take(&mut *self.discoveries.lock());
            if self.hold_open {
                Ok(Box::pin(stream::iter(items).chain(stream::pending())))
            } else {
                Ok(Box::pin(stream::iter(items)))
            }
        }

        async fn stop_scan(&self) -> Result<()> {
            self.stops.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn discovery(id: &str, name: &str, link: MockSensorLink) -> Discovery {
        Discovery {
            info: PeripheralInfo {
                id: id.to_string(),
                name: Some(name.to_string()),
                ..Default::default()
            },
            link: Arc::new(link),
        }
    }

    fn positions() -> Vec<String> {
        ["front-left", "front-right", "rear-left", "rear-right"]
            .map(String::from)
            .to_vec()
    }

    fn manager(radio: Arc<FakeRadio>) -> TireSensorManager {
        TireSensorManager::with_radio(
            radio,
            Arc::new(NamePatternClassifier::default()),
            ManagerConfig::default(),
        )
    }

    fn connectable_link() -> MockSensorLink {
        let mut link = MockSensorLink::new();
        link.expect_connect().returning(|| Ok(()));
        link.expect_discover_services().returning(|| Ok(()));
        link
    }

    fn notify(data: &[u8]) -> NotificationEvent {
        NotificationEvent {
            characteristic_uuid: TIRE_DATA_CHARACTERISTIC_UUID,
            data: data.to_vec(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_scan_classifies_candidates() {
        let radio = FakeRadio::new(
            vec![
                discovery("AA", "TPMS Rear Left", MockSensorLink::new()),
                discovery("BB", "JBL Flip 5", MockSensorLink::new()),
                discovery("CC", "TPMS 0042", MockSensorLink::new()),
                discovery("AA", "TPMS Rear Left", MockSensorLink::new()),
            ],
            true,
        );
        let manager = manager(radio.clone());
        let mut found_rx = manager.subscribe_sensor_found();

        let mut seen = Vec::new();
        let found = manager
            .scan_for_sensors_with("main-vehicle", &positions(), |s| seen.push(s.id.clone()))
            .await
            .unwrap();

        assert_eq!(found.len(), 2);
        assert_eq!(seen, vec!["AA".to_string(), "CC".to_string()]);
        assert_eq!(manager.get_sensor("AA").unwrap().tire_id, "rear-left");
        assert_eq!(manager.get_sensor("CC").unwrap().tire_id, "front-left");
        assert_eq!(
            manager.get_sensor("CC").unwrap().state,
            ConnectionState::Discovered
        );
        assert_eq!(found_rx.recv().await.unwrap().id, "AA");
        assert!(!manager.is_scanning());
        assert_eq!(radio.stops.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scan_window_is_time_boxed() {
        let manager = manager(FakeRadio::new(Vec::new(), true));
        let started = tokio::time::Instant::now();

        let found = manager
            .scan_for_sensors("main-vehicle", &positions())
            .await
            .unwrap();

        assert!(found.is_empty());
        assert!(started.elapsed() >= Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_scan_returns_empty() {
        let radio = FakeRadio::new(
            vec![discovery("AA", "TPMS FL", MockSensorLink::new())],
            true,
        );
        let manager = manager(radio.clone());
        let positions = positions();

        let (first, (second, waited)) = tokio::join!(
            manager.scan_for_sensors("main-vehicle", &positions),
            async {
                let started = tokio::time::Instant::now();
                let found = manager.scan_for_sensors("main-vehicle", &positions).await;
                (found, started.elapsed())
            },
        );

        assert_eq!(first.unwrap().len(), 1);
        assert!(second.unwrap().is_empty());
        assert_eq!(waited, Duration::ZERO);
        assert_eq!(radio.starts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scan_after_cleanup_keeps_ownership() {
        let radio = FakeRadio::new(Vec::new(), true);
        let manager = manager(radio.clone());
        let positions = positions();

        let (first, (second, during, third)) = tokio::join!(
            manager.scan_for_sensors("main-vehicle", &positions),
            async {
                tokio::task::yield_now().await;
                manager.cleanup().await;

                let (second, (during, third)) = tokio::join!(
                    manager.scan_for_sensors("main-vehicle", &positions),
                    async {
                        // let the cancelled scan unwind
                        for _ in 0..5 {
                            tokio::task::yield_now().await;
                        }
                        let during = manager.is_scanning();
                        let third = manager.scan_for_sensors("main-vehicle", &positions).await;
                        (during, third)
                    },
                );
                (second, during, third)
            },
        );

        assert!(first.unwrap().is_empty());
        assert!(second.unwrap().is_empty());
        assert!(during);
        assert!(third.unwrap().is_empty());
        assert_eq!(radio.starts.load(Ordering::SeqCst), 2);
        assert_eq!(radio.stops.load(Ordering::SeqCst), 2);
        assert!(!manager.is_scanning());
    }

    #[tokio::test]
    async fn test_scan_ends_with_stream() {
        let manager = manager(FakeRadio::new(
            vec![discovery("AA", "TPMS FL", MockSensorLink::new())],
            false,
        ));
        let found = manager
            .scan_for_sensors("main-vehicle", &positions())
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_cancels_scan() {
        let manager = manager(FakeRadio::new(Vec::new(), true));
        let positions = positions();
        let started = tokio::time::Instant::now();

        let (found, ()) = tokio::join!(manager.scan_for_sensors("main-vehicle", &positions), async {
            tokio::task::yield_now().await;
            manager.cleanup().await;
        });

        assert!(found.unwrap().is_empty());
        assert!(started.elapsed() < Duration::from_secs(10));
        assert!(!manager.is_scanning());
    }

    #[tokio::test]
    async fn test_connect_failure_marks_disconnected() {
        let mut link = MockSensorLink::new();
        link.expect_connect().returning(|| {
            Err(Error::ConnectionFailed {
                reason: "out of range".into(),
            })
        });
        let manager = manager(FakeRadio::new(vec![discovery("AA", "TPMS FL", link)], false));
        manager
            .scan_for_sensors("main-vehicle", &positions())
            .await
            .unwrap();
        let mut events = manager.subscribe_connection_events();

        let err = manager.connect_to_sensor("AA").await.unwrap_err();
        assert!(matches!(err, Error::ConnectionFailed { .. }));
        assert_eq!(
            manager.get_sensor("AA").unwrap().state,
            ConnectionState::Disconnected
        );
        assert_eq!(events.recv().await.unwrap().state, ConnectionState::Connecting);
        assert_eq!(events.recv().await.unwrap().state, ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_connect_unknown_sensor() {
        let manager = manager(FakeRadio::new(Vec::new(), false));
        assert!(matches!(
            manager.connect_to_sensor("nope").await,
            Err(Error::SensorNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_subscribe_dispatches_readings_to_store() {
        let store = Store::spawn_with(AppState {
            vehicles: vec![Vehicle::new("main-vehicle", "Truck", "2 Axles", "Power Unit")],
            ..Default::default()
        });

        let (tx, rx) = fmpsc::unbounded();
        let mut link = connectable_link();
        link.expect_notifications()
            .return_once(move || Ok(Box::pin(rx) as NotificationStream));
        link.expect_subscribe().returning(|_, _| Ok(()));

        let manager = manager(FakeRadio::new(
            vec![discovery("AA", "TPMS front left", link)],
            false,
        ));
        manager.set_store(store.handle());
        manager
            .scan_for_sensors("main-vehicle", &positions())
            .await
            .unwrap();

        let callback_hits = Arc::new(AtomicUsize::new(0));
        let hits = callback_hits.clone();
        let mut readings = manager.subscribe_readings();
        manager
            .subscribe_to_tire_data("AA", move |_| {
                hits.fetch_add(1, Ordering::SeqCst);
            })
            .await
            .unwrap();
        assert_eq!(
            manager.get_sensor("AA").unwrap().state,
            ConnectionState::Subscribed
        );

        // malformed, then another characteristic, then a real reading
        tx.unbounded_send(notify(&[0x01])).unwrap();
        tx.unbounded_send(NotificationEvent {
            characteristic_uuid: Uuid::nil(),
            data: vec![0x2C, 0x01, 0xC8, 0x00],
        })
        .unwrap();
        tx.unbounded_send(notify(&[0x45, 0x01, 0xD2, 0x00])).unwrap();

        let update = readings.recv().await.unwrap();
        assert_eq!(update.tire_id, "front-left");
        assert!((update.reading.pressure_psi - 32.5).abs() < 1e-9);
        assert_eq!(callback_hits.load(Ordering::SeqCst), 1);
        assert!(manager.get_sensor("AA").unwrap().last_update.is_some());

        let state = store.handle().apply(Action::SetLoading(false)).await.unwrap();
        let sample = state.vehicles[0].tire_data["front-left"];
        assert!((sample.psi - 32.5).abs() < 1e-9);
        assert!((sample.temp - 21.0).abs() < 1e-9);
        assert_eq!(state.vehicles[0].tire_data.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_closed_stream_leaves_sensor_disconnected() {
        let mut link = connectable_link();
        link.expect_notifications().return_once(|| {
            Ok(Box::pin(stream::empty::<NotificationEvent>()) as NotificationStream)
        });
        link.expect_subscribe().returning(|_, _| Ok(()));

        let manager = manager(FakeRadio::new(
            vec![discovery("AA", "TPMS front left", link)],
            false,
        ));
        manager
            .scan_for_sensors("main-vehicle", &positions())
            .await
            .unwrap();

        let mut events = manager.subscribe_connection_events();
        manager.subscribe_to_tire_data("AA", |_| {}).await.unwrap();

        let closed = tokio::time::timeout(Duration::from_secs(5), async {
            while let Ok(event) = events.recv().await {
                if event.state == ConnectionState::Disconnected {
                    break;
                }
            }
        })
        .await;

        assert!(closed.is_ok());
        assert_eq!(
            manager.get_sensor("AA").unwrap().state,
            ConnectionState::Disconnected
        );
    }

    #[tokio::test]
    async fn test_subscribe_to_removed_sensor_disconnects_link() {
        let slot: Arc<parking_lot::Mutex<Option<SensorMap>>> = Arc::default();
        let evict = slot.clone();

        let mut link = connectable_link();
        link.expect_notifications().return_once(|| {
            Ok(Box::pin(stream::pending::<NotificationEvent>()) as NotificationStream)
        });
        // cleanup lands while notifications are being enabled
        link.expect_subscribe().return_once(move |_, _| {
            if let Some(sensors) = evict.lock().take() {
                sensors.write().remove("AA");
            }
            Ok(())
        });
        link.expect_disconnect().times(1).returning(|| Ok(()));

        let manager = manager(FakeRadio::new(
            vec![discovery("AA", "TPMS front left", link)],
            false,
        ));
        *slot.lock() = Some(manager.sensors.clone());
        manager
            .scan_for_sensors("main-vehicle", &positions())
            .await
            .unwrap();

        let result = manager.subscribe_to_tire_data("AA", |_| {}).await;

        assert!(matches!(result, Err(Error::SensorNotFound { .. })));
        assert_eq!(manager.sensor_count(), 0);
    }

    #[tokio::test]
    async fn test_vehicle_fan_out_survives_failure() {
        let mut failing = MockSensorLink::new();
        failing.expect_connect().returning(|| {
            Err(Error::ConnectionFailed {
                reason: "timeout".into(),
            })
        });

        let manager = manager(FakeRadio::new(
            vec![
                discovery("AA", "TPMS front left", connectable_link()),
                discovery("BB", "TPMS front right", failing),
                discovery("CC", "TPMS rear left", connectable_link()),
            ],
            false,
        ));
        manager
            .scan_for_sensors("main-vehicle", &positions())
            .await
            .unwrap();

        manager.connect_to_vehicle_sensors("main-vehicle").await;

        let mut connected: Vec<String> = manager
            .connected_sensors(Some("main-vehicle"))
            .into_iter()
            .map(|s| s.id)
            .collect();
        connected.sort();
        assert_eq!(connected, vec!["AA".to_string(), "CC".to_string()]);
        assert!(manager.connected_sensors(Some("towable-0")).is_empty());
        assert_eq!(
            manager.get_sensor("BB").unwrap().state,
            ConnectionState::Disconnected
        );
    }

    #[tokio::test]
    async fn test_disconnect() {
        let mut link = connectable_link();
        link.expect_disconnect().returning(|| {
            Err(Error::Internal("radio busy".into()))
        });
        let manager = manager(FakeRadio::new(vec![discovery("AA", "TPMS FL", link)], false));
        manager
            .scan_for_sensors("main-vehicle", &positions())
            .await
            .unwrap();

        assert!(manager.disconnect_from_sensor("unknown").await.is_ok());

        manager.connect_to_sensor("AA").await.unwrap();
        assert!(manager.disconnect_from_sensor("AA").await.is_err());
        assert_eq!(
            manager.get_sensor("AA").unwrap().state,
            ConnectionState::Disconnected
        );
    }

    #[tokio::test]
    async fn test_cleanup_clears_sensors() {
        let mut connected = connectable_link();
        connected.expect_disconnect().times(1).returning(|| Ok(()));
        // never connected, so never disconnected
        let idle = MockSensorLink::new();

        let manager = manager(FakeRadio::new(
            vec![
                discovery("AA", "TPMS FL", connected),
                discovery("BB", "TPMS FR", idle),
            ],
            false,
        ));
        manager
            .scan_for_sensors("main-vehicle", &positions())
            .await
            .unwrap();
        manager.connect_to_sensor("AA").await.unwrap();

        manager.cleanup().await;

        assert_eq!(manager.sensor_count(), 0);
        assert!(manager.sensors().is_empty());
        assert!(!manager.is_scanning());
    }

    #[tokio::test]
    async fn test_assign_tire_position() {
        let manager = manager(FakeRadio::new(
            vec![discovery("AA", "TPMS 1", MockSensorLink::new())],
            false,
        ));
        manager
            .scan_for_sensors("main-vehicle", &positions())
            .await
            .unwrap();

        manager.assign_tire_position("AA", "rear-right").unwrap();
        assert_eq!(manager.get_sensor("AA").unwrap().tire_id, "rear-right");
        assert!(matches!(
            manager.assign_tire_position("ZZ", "rear-right"),
            Err(Error::SensorNotFound { .. })
        ));
        assert!(matches!(
            manager.assign_tire_position("AA", " "),
            Err(Error::InvalidParameter { .. })
        ));
    }

    #[tokio::test]
    async fn test_callback_handle_unregister() {
        let manager = manager(FakeRadio::new(Vec::new(), false));
        let first = manager.on_reading(|_| {});
        let second = manager.on_sensor_found(|_| {});
        assert_ne!(first.id(), second.id());
        first.unregister();
        drop(second);
    }
}
