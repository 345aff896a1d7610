//! Source port — the capability set of a fitness-machine backend.
//!
//! A device source bridges one transport (live BLE or the simulator) into
//! the bridge. The facade selects a backend at construction time and
//! consumes this trait only; the workout manager never sees a backend
//! directly.

use std::future::Future;
use std::time::Duration;

use tokio::sync::broadcast;

use fitbridge_domain::device::{ConnectionState, DeviceDescriptor};
use fitbridge_domain::error::FitBridgeError;
use fitbridge_domain::sample::Sample;

/// One item on a source's event stream.
#[derive(Debug, Clone)]
pub enum SourceEvent {
    /// A decoded telemetry sample. `t` is stamped by the facade, not here.
    Sample(Sample),
    /// A connection-state change.
    State(ConnectionState),
}

/// A pluggable fitness-machine backend.
///
/// Implementations live in adapter crates (`adapter_ble`,
/// `adapter_simulator`). All methods take `&self`; implementations manage
/// their own interior state.
pub trait DeviceSource {
    /// Unique name identifying this backend (e.g. `"ble"`, `"simulator"`).
    fn name(&self) -> &'static str;

    /// Scan for devices for at most `duration`.
    ///
    /// May be called while a connection is active.
    fn discover(
        &self,
        duration: Duration,
    ) -> impl Future<Output = Result<Vec<DeviceDescriptor>, FitBridgeError>> + Send;

    /// Whether this backend can connect to the given address.
    fn owns(&self, address: &str) -> impl Future<Output = bool> + Send;

    /// Connect to a device. Connecting to the already-connected address is
    /// a no-op.
    fn connect(&self, address: &str) -> impl Future<Output = Result<(), FitBridgeError>> + Send;

    /// Tear down the connection and all subscriptions. Idempotent.
    fn disconnect(&self) -> impl Future<Output = Result<(), FitBridgeError>> + Send;

    /// Signal workout start. A no-op for live FTMS (machines broadcast
    /// continuously); gates sample generation for the simulator.
    fn begin_workout(&self) -> impl Future<Output = Result<(), FitBridgeError>> + Send;

    /// Signal workout end. The simulator emits one final totals sample,
    /// then ceases.
    fn end_workout(&self) -> impl Future<Output = Result<(), FitBridgeError>> + Send;

    /// Subscribe to this backend's event stream.
    fn subscribe(&self) -> broadcast::Receiver<SourceEvent>;
}
