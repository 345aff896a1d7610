//! # fitbridge-adapter-ble
//!
//! Live FTMS device source over BLE.
//!
//! ## How it works
//!
//! Fitness machines expose the Fitness Machine Service (0x1826) and
//! broadcast telemetry as notifications on the Indoor Bike Data (0x2AD2)
//! and Rower Data (0x2AD1) characteristics. This adapter scans for such
//! peers, connects on request, subscribes to whichever telemetry
//! characteristics the peer exposes, and decodes each (possibly
//! fragmented) record into a normalized sample.
//!
//! The transport never parses beyond the FTMS record layer and never
//! reconnects on its own — on an unexpected GATT drop it emits
//! `disconnected(transport)` and leaves the reconnect policy to the
//! source facade.
//!
//! ## Dependency rule
//!
//! Depends on `fitbridge-app` (port traits) and `fitbridge-domain` only.

pub mod codec;
pub mod fragment;

mod config;
mod error;

pub use config::BleConfig;
pub use error::BleError;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use btleplug::api::{
    Central, CentralEvent, Characteristic, Manager as _, Peripheral as _, PeripheralProperties,
    ScanFilter,
};
use btleplug::platform::{Manager, Peripheral};
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio_stream::StreamExt as _;

use fitbridge_app::ports::source::{DeviceSource, SourceEvent};
use fitbridge_domain::device::{
    ConnectionState, DeviceDescriptor, DisconnectReason, EquipmentKind, SourceOrigin,
};
use fitbridge_domain::error::FitBridgeError;

use crate::fragment::FragmentBuffer;

/// Event fan-out capacity towards the facade pump.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Build a descriptor from advertisement properties, or `None` when the
/// peer is not a fitness machine.
///
/// A peer qualifies when it advertises the FTMS service (service list or
/// service data) or when its name carries a bike/rower token — some
/// machines advertise sparsely between full advertisements.
fn descriptor_from_advertisement(props: &PeripheralProperties) -> Option<DeviceDescriptor> {
    let address = props.address.to_string();
    let name = props.local_name.clone().unwrap_or_default();

    let advertises_ftms = props.services.contains(&codec::SERVICE_FTMS)
        || props.service_data.contains_key(&codec::SERVICE_FTMS);
    let name_kind = EquipmentKind::from_name(&name);
    if !advertises_ftms && name_kind == EquipmentKind::Unknown {
        return None;
    }

    // The FTMS advertisement service data is flags (1 byte) followed by
    // the fitness machine type bit field (2 bytes LE).
    let advertised_kind = props
        .service_data
        .get(&codec::SERVICE_FTMS)
        .filter(|data| data.len() >= 3)
        .map(|data| EquipmentKind::from_machine_type(u16::from_le_bytes([data[1], data[2]])));

    let kind = match advertised_kind {
        Some(kind) if kind != EquipmentKind::Unknown => kind,
        _ => name_kind,
    };

    let mut builder = DeviceDescriptor::builder()
        .address(address)
        .name(if name.is_empty() {
            "(unknown)".to_string()
        } else {
            name
        })
        .kind(kind)
        .origin(SourceOrigin::Live);
    if let Some(rssi) = props.rssi {
        builder = builder.rssi(rssi);
    }
    builder.build().ok()
}

/// The telemetry characteristics a connected peer exposes.
fn telemetry_characteristics(
    characteristics: impl IntoIterator<Item = Characteristic>,
) -> Vec<Characteristic> {
    characteristics
        .into_iter()
        .filter(|c| {
            c.uuid == codec::CHAR_INDOOR_BIKE_DATA || c.uuid == codec::CHAR_ROWER_DATA
        })
        .collect()
}

struct ConnectedPeer {
    address: String,
    peripheral: Peripheral,
    notify_task: JoinHandle<()>,
    requested_stop: Arc<AtomicBool>,
}

#[derive(Default)]
struct Inner {
    discovered: HashMap<String, Peripheral>,
    connected: Option<ConnectedPeer>,
}

/// Live FTMS source backed by btleplug.
pub struct FtmsSource {
    config: BleConfig,
    events: broadcast::Sender<SourceEvent>,
    inner: Mutex<Inner>,
    malformed_records: Arc<AtomicU64>,
}

impl FtmsSource {
    /// Create a new source with the given configuration.
    #[must_use]
    pub fn new(config: BleConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            config,
            events,
            inner: Mutex::new(Inner::default()),
            malformed_records: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Records that failed to reassemble or decode since startup.
    #[must_use]
    pub fn malformed_records(&self) -> u64 {
        self.malformed_records.load(Ordering::Relaxed)
    }

    fn emit(&self, event: SourceEvent) {
        let _ = self.events.send(event);
    }

    async fn run_scan(
        &self,
        inner: &mut Inner,
        duration: Duration,
    ) -> Result<Vec<DeviceDescriptor>, BleError> {
        let manager = Manager::new().await?;
        let adapters = manager.adapters().await?;
        let central = adapters.into_iter().next().ok_or(BleError::NotAvailable)?;

        let mut events = central.events().await?;
        central.start_scan(ScanFilter::default()).await?;
        tracing::info!(duration_secs = duration.as_secs(), "FTMS scan started");

        let deadline = tokio::time::Instant::now() + duration;
        let mut found: HashMap<String, DeviceDescriptor> = HashMap::new();

        while tokio::time::Instant::now() < deadline {
            let remaining = deadline - tokio::time::Instant::now();
            match tokio::time::timeout(remaining, events.next()).await {
                Ok(Some(CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id))) => {
                    let Ok(peripheral) = central.peripheral(&id).await else {
                        continue;
                    };
                    let Ok(Some(props)) = peripheral.properties().await else {
                        continue;
                    };
                    if let Some(descriptor) = descriptor_from_advertisement(&props) {
                        let is_new = !found.contains_key(&descriptor.address);
                        inner
                            .discovered
                            .insert(descriptor.address.clone(), peripheral);
                        if is_new {
                            tracing::info!(
                                address = %descriptor.address,
                                name = %descriptor.name,
                                kind = %descriptor.kind,
                                "discovered fitness machine"
                            );
                        }
                        found.insert(descriptor.address.clone(), descriptor);
                    }
                }
                Ok(Some(_)) => {}
                Ok(None) | Err(_) => break,
            }
        }

        central.stop_scan().await?;
        tracing::info!(count = found.len(), "FTMS discovery complete");

        Ok(found.into_values().collect())
    }

    async fn open_connection(&self, inner: &mut Inner, address: &str) -> Result<(), BleError> {
        let peripheral = inner
            .discovered
            .get(address)
            .cloned()
            .ok_or_else(|| BleError::NotFound {
                address: address.to_string(),
            })?;

        self.emit(SourceEvent::State(ConnectionState::Connecting {
            address: address.to_string(),
        }));

        let timeout = Duration::from_secs(u64::from(self.config.connect_timeout_secs));
        tokio::time::timeout(timeout, peripheral.connect())
            .await
            .map_err(|_| BleError::ConnectTimeout {
                address: address.to_string(),
            })??;

        let subscribed = self.subscribe_telemetry(&peripheral, address).await;
        let characteristics = match subscribed {
            Ok(characteristics) => characteristics,
            Err(err) => {
                if let Err(disconnect_err) = peripheral.disconnect().await {
                    tracing::warn!(%disconnect_err, "cleanup disconnect failed");
                }
                return Err(err);
            }
        };

        let requested_stop = Arc::new(AtomicBool::new(false));
        let notify_task = match self
            .spawn_notify_task(&peripheral, Arc::clone(&requested_stop))
            .await
        {
            Ok(task) => task,
            Err(err) => {
                if let Err(disconnect_err) = peripheral.disconnect().await {
                    tracing::warn!(%disconnect_err, "cleanup disconnect failed");
                }
                return Err(err);
            }
        };

        tracing::info!(
            %address,
            characteristics = characteristics.len(),
            "connected to fitness machine"
        );
        inner.connected = Some(ConnectedPeer {
            address: address.to_string(),
            peripheral,
            notify_task,
            requested_stop,
        });
        self.emit(SourceEvent::State(ConnectionState::Connected {
            address: address.to_string(),
        }));
        Ok(())
    }

    async fn subscribe_telemetry(
        &self,
        peripheral: &Peripheral,
        address: &str,
    ) -> Result<Vec<Characteristic>, BleError> {
        peripheral.discover_services().await?;

        let has_ftms = peripheral
            .services()
            .iter()
            .any(|s| s.uuid == codec::SERVICE_FTMS);
        let telemetry = telemetry_characteristics(peripheral.characteristics());
        if !has_ftms || telemetry.is_empty() {
            return Err(BleError::Unsupported {
                address: address.to_string(),
            });
        }

        for characteristic in &telemetry {
            peripheral.subscribe(characteristic).await?;
            tracing::debug!(uuid = %characteristic.uuid, "subscribed to telemetry characteristic");
        }
        Ok(telemetry)
    }

    async fn spawn_notify_task(
        &self,
        peripheral: &Peripheral,
        requested_stop: Arc<AtomicBool>,
    ) -> Result<JoinHandle<()>, BleError> {
        let mut notifications = peripheral.notifications().await?;
        let events = self.events.clone();
        let malformed = Arc::clone(&self.malformed_records);

        Ok(tokio::spawn(async move {
            // Fragmentation state is per characteristic.
            let mut ibd_buffer = FragmentBuffer::new();
            let mut rd_buffer = FragmentBuffer::new();

            while let Some(notification) = notifications.next().await {
                let buffer = match notification.uuid {
                    codec::CHAR_INDOOR_BIKE_DATA => &mut ibd_buffer,
                    codec::CHAR_ROWER_DATA => &mut rd_buffer,
                    _ => continue,
                };
                let discarded_before = buffer.discarded();
                let record = match buffer.push(&notification.value) {
                    Ok(Some(record)) => record,
                    Ok(None) => {
                        if buffer.discarded() > discarded_before {
                            malformed.fetch_add(1, Ordering::Relaxed);
                        }
                        continue;
                    }
                    Err(err) => {
                        malformed.fetch_add(1, Ordering::Relaxed);
                        tracing::warn!(%err, uuid = %notification.uuid, "dropped malformed fragment");
                        continue;
                    }
                };

                match codec::decode(notification.uuid, &record) {
                    Ok(sample) => {
                        let _ = events.send(SourceEvent::Sample(sample));
                    }
                    Err(err) => {
                        malformed.fetch_add(1, Ordering::Relaxed);
                        tracing::warn!(%err, uuid = %notification.uuid, "dropped malformed record");
                    }
                }
            }

            // Stream end without an operator disconnect is a transport drop.
            if !requested_stop.load(Ordering::SeqCst) {
                tracing::warn!("notification stream ended unexpectedly");
                let _ = events.send(SourceEvent::State(ConnectionState::Disconnected {
                    reason: DisconnectReason::Transport,
                }));
            }
        }))
    }
}

impl DeviceSource for FtmsSource {
    fn name(&self) -> &'static str {
        "ble"
    }

    async fn discover(&self, duration: Duration) -> Result<Vec<DeviceDescriptor>, FitBridgeError> {
        let cap = Duration::from_secs(u64::from(self.config.scan_duration_secs));
        let mut inner = self.inner.lock().await;
        let devices = self.run_scan(&mut inner, duration.min(cap)).await?;
        Ok(devices)
    }

    async fn owns(&self, address: &str) -> bool {
        self.inner.lock().await.discovered.contains_key(address)
    }

    async fn connect(&self, address: &str) -> Result<(), FitBridgeError> {
        let mut inner = self.inner.lock().await;

        if let Some(connected) = inner.connected.take() {
            if connected.address == address {
                tracing::debug!(%address, "already connected, connect is a no-op");
                inner.connected = Some(connected);
                return Ok(());
            }
            // Single-peer transport: drop the old connection first.
            close_peer(connected).await;
        }

        self.open_connection(&mut inner, address).await?;
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), FitBridgeError> {
        let mut inner = self.inner.lock().await;
        let Some(connected) = inner.connected.take() else {
            return Ok(());
        };
        let address = connected.address.clone();
        close_peer(connected).await;
        tracing::info!(%address, "disconnected from fitness machine");
        self.emit(SourceEvent::State(ConnectionState::Disconnected {
            reason: DisconnectReason::Requested,
        }));
        Ok(())
    }

    async fn begin_workout(&self) -> Result<(), FitBridgeError> {
        // FTMS machines broadcast continuously; persistence is gated by
        // the manager, not the protocol.
        tracing::debug!("workout begin signalled (no-op for live FTMS)");
        Ok(())
    }

    async fn end_workout(&self) -> Result<(), FitBridgeError> {
        tracing::debug!("workout end signalled (no-op for live FTMS)");
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<SourceEvent> {
        self.events.subscribe()
    }
}

/// Stop the notification task and close the GATT link.
async fn close_peer(peer: ConnectedPeer) {
    peer.requested_stop.store(true, Ordering::SeqCst);
    if let Err(err) = peer.peripheral.disconnect().await {
        tracing::warn!(%err, "peripheral disconnect failed");
    }
    peer.notify_task.abort();
}

#[cfg(test)]
mod tests {
    use super::*;
    use btleplug::api::{BDAddr, CharPropFlags};
    use std::collections::BTreeMap;

    fn props(
        name: Option<&str>,
        services: Vec<uuid::Uuid>,
        service_data: BTreeMap<uuid::Uuid, Vec<u8>>,
    ) -> PeripheralProperties {
        PeripheralProperties {
            address: BDAddr::from([0xA4, 0xC1, 0x38, 0x5B, 0x0E, 0xDF]),
            local_name: name.map(ToString::to_string),
            rssi: Some(-58),
            services,
            service_data: service_data.into_iter().collect(),
            ..PeripheralProperties::default()
        }
    }

    #[test]
    fn should_build_descriptor_for_ftms_advertiser() {
        let descriptor = descriptor_from_advertisement(&props(
            Some("Echo Bike V3"),
            vec![codec::SERVICE_FTMS],
            BTreeMap::new(),
        ))
        .unwrap();

        assert_eq!(descriptor.address, "A4:C1:38:5B:0E:DF");
        assert_eq!(descriptor.name, "Echo Bike V3");
        assert_eq!(descriptor.kind, EquipmentKind::Bike);
        assert_eq!(descriptor.origin, SourceOrigin::Live);
        assert_eq!(descriptor.rssi, Some(-58));
    }

    #[test]
    fn should_accept_named_machine_without_ftms_advertisement() {
        let descriptor =
            descriptor_from_advertisement(&props(Some("Echo Rower"), vec![], BTreeMap::new()))
                .unwrap();
        assert_eq!(descriptor.kind, EquipmentKind::Rower);
    }

    #[test]
    fn should_skip_unrelated_peripheral() {
        let result =
            descriptor_from_advertisement(&props(Some("Headphones"), vec![], BTreeMap::new()));
        assert!(result.is_none());
    }

    #[test]
    fn should_prefer_advertised_machine_type_over_name() {
        // Machine-type bit 4 = rower, despite the "bike" token.
        let mut service_data = BTreeMap::new();
        service_data.insert(codec::SERVICE_FTMS, vec![0x01, 0x10, 0x00]);
        let descriptor =
            descriptor_from_advertisement(&props(Some("bike shed"), vec![], service_data))
                .unwrap();
        assert_eq!(descriptor.kind, EquipmentKind::Rower);
    }

    #[test]
    fn should_name_unknown_advertiser_placeholder() {
        let descriptor =
            descriptor_from_advertisement(&props(None, vec![codec::SERVICE_FTMS], BTreeMap::new()))
                .unwrap();
        assert_eq!(descriptor.name, "(unknown)");
        assert_eq!(descriptor.kind, EquipmentKind::Unknown);
    }

    #[test]
    fn should_filter_telemetry_characteristics() {
        let telemetry = Characteristic {
            uuid: codec::CHAR_INDOOR_BIKE_DATA,
            service_uuid: codec::SERVICE_FTMS,
            properties: CharPropFlags::NOTIFY,
            descriptors: Default::default(),
        };
        let other = Characteristic {
            uuid: btleplug::api::bleuuid::uuid_from_u16(0x2AD3),
            service_uuid: codec::SERVICE_FTMS,
            properties: CharPropFlags::NOTIFY,
            descriptors: Default::default(),
        };

        let found = telemetry_characteristics(vec![telemetry.clone(), other]);
        assert_eq!(found, vec![telemetry]);
    }

    #[tokio::test]
    async fn should_not_own_unscanned_address() {
        let source = FtmsSource::new(BleConfig::default());
        assert!(!source.owns("A4:C1:38:5B:0E:DF").await);
    }

    #[tokio::test]
    async fn should_treat_disconnect_when_idle_as_noop() {
        let source = FtmsSource::new(BleConfig::default());
        assert!(source.disconnect().await.is_ok());
    }

    #[tokio::test]
    async fn should_start_with_zero_malformed_records() {
        let source = FtmsSource::new(BleConfig::default());
        assert_eq!(source.malformed_records(), 0);
    }
}
