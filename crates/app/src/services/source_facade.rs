//! Source facade — one device stream in front of live and simulated backends.
//!
//! The facade unions discovery across backends, dispatches connect/disconnect
//! to whichever backend owns the address, re-stamps every sample with the
//! monotonic rule, and owns the reconnect policy for transport drops during
//! an active workout. Consumers (the workout manager and the control API)
//! never talk to a backend directly.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::broadcast;

use fitbridge_domain::device::{ConnectionState, DeviceDescriptor, DisconnectReason};
use fitbridge_domain::error::{FitBridgeError, LifecycleError, NotFoundError};
use fitbridge_domain::time::{self, MonotonicStamper};

use crate::ports::source::{DeviceSource, SourceEvent};

/// Bounded fan-out capacity between the event sources and the ingest lane.
/// Overflow drops the oldest events; receivers observe the drop count via
/// `RecvError::Lagged`.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Total time budget for reconnect attempts after a transport drop.
const RECONNECT_BUDGET: Duration = Duration::from_secs(120);

/// Backoff ceiling between reconnect attempts.
const RECONNECT_DELAY_CAP: Duration = Duration::from_secs(30);

/// Which backend a connection went through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BackendKind {
    Live,
    Simulated,
}

#[derive(Debug)]
struct Connection {
    state: ConnectionState,
    backend: Option<BackendKind>,
    /// Address of the current (or, during reconnect, most recent)
    /// connection. Cleared only by an operator disconnect.
    address: Option<String>,
    device: Option<DeviceDescriptor>,
}

impl Default for Connection {
    fn default() -> Self {
        Self {
            state: ConnectionState::Idle,
            backend: None,
            address: None,
            device: None,
        }
    }
}

/// Unified device source in front of the live and simulated backends.
///
/// Construct with [`SourceFacade::start`], which spawns one pump task per
/// present backend. All samples re-emitted by the facade carry a strictly
/// monotonic `t`.
pub struct SourceFacade<L, S> {
    live: Option<Arc<L>>,
    simulated: Option<Arc<S>>,
    events: broadcast::Sender<SourceEvent>,
    stamper: Mutex<MonotonicStamper>,
    connection: Mutex<Connection>,
    /// Descriptors seen by the most recent discoveries, by address.
    discovered: Mutex<HashMap<String, DeviceDescriptor>>,
    workout_active: AtomicBool,
    /// Bumped on every operator-initiated connect/disconnect; a running
    /// reconnect loop gives up when its snapshot goes stale.
    generation: AtomicU64,
    scan_duration: Duration,
}

impl<L, S> SourceFacade<L, S>
where
    L: DeviceSource + Send + Sync + 'static,
    S: DeviceSource + Send + Sync + 'static,
{
    /// Wire the facade in front of the given backends and start the pump
    /// tasks.
    pub fn start(live: Option<L>, simulated: Option<S>, scan_duration: Duration) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let facade = Arc::new(Self {
            live: live.map(Arc::new),
            simulated: simulated.map(Arc::new),
            events,
            stamper: Mutex::new(MonotonicStamper::new()),
            connection: Mutex::new(Connection::default()),
            discovered: Mutex::new(HashMap::new()),
            workout_active: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            scan_duration,
        });

        if let Some(backend) = facade.live.clone() {
            Self::spawn_pump(Arc::clone(&facade), backend, BackendKind::Live);
        }
        if let Some(backend) = facade.simulated.clone() {
            Self::spawn_pump(Arc::clone(&facade), backend, BackendKind::Simulated);
        }

        facade
    }

    /// Subscribe to the normalized event stream (stamped samples plus
    /// connection-state changes).
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SourceEvent> {
        self.events.subscribe()
    }

    /// Current connection state.
    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        self.connection.lock().unwrap().state.clone()
    }

    /// Descriptor of the currently connected device, if any.
    #[must_use]
    pub fn connected_device(&self) -> Option<DeviceDescriptor> {
        self.connection.lock().unwrap().device.clone()
    }

    /// Union a live scan and the simulated entries.
    ///
    /// One failing backend degrades to a warning as long as the other
    /// succeeds; the error propagates only when every backend fails.
    ///
    /// # Errors
    ///
    /// Returns [`FitBridgeError::Transport`] when no backend produced a
    /// device list.
    pub async fn discover(
        &self,
        duration: Option<Duration>,
    ) -> Result<Vec<DeviceDescriptor>, FitBridgeError> {
        let duration = duration.unwrap_or(self.scan_duration);
        let mut found = Vec::new();
        let mut first_error = None;
        let mut any_succeeded = false;

        if let Some(live) = &self.live {
            match live.discover(duration).await {
                Ok(devices) => {
                    any_succeeded = true;
                    found.extend(devices);
                }
                Err(err) => {
                    tracing::warn!(%err, backend = live.name(), "discovery failed");
                    first_error = Some(err);
                }
            }
        }
        if let Some(simulated) = &self.simulated {
            match simulated.discover(duration).await {
                Ok(devices) => {
                    any_succeeded = true;
                    found.extend(devices);
                }
                Err(err) => {
                    tracing::warn!(%err, backend = simulated.name(), "discovery failed");
                    first_error = Some(err);
                }
            }
        }

        if !any_succeeded {
            if let Some(err) = first_error {
                return Err(err);
            }
        }

        let mut discovered = self.discovered.lock().unwrap();
        for device in &found {
            discovered.insert(device.address.clone(), device.clone());
        }

        Ok(found)
    }

    /// Connect to the backend that owns `address`.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::AlreadyConnected`] when any device is
    /// connected, [`FitBridgeError::NotFound`] when no backend owns the
    /// address, and the backend's own error otherwise.
    pub async fn connect(&self, address: &str) -> Result<(), FitBridgeError> {
        {
            let mut connection = self.connection.lock().unwrap();
            if connection.backend.is_some() {
                return Err(LifecycleError::AlreadyConnected.into());
            }
            connection.state = ConnectionState::Connecting {
                address: address.to_string(),
            };
        }
        self.generation.fetch_add(1, Ordering::SeqCst);

        let result = self.dispatch_connect(address).await;

        let mut connection = self.connection.lock().unwrap();
        match result {
            Ok(kind) => {
                connection.state = ConnectionState::Connected {
                    address: address.to_string(),
                };
                connection.backend = Some(kind);
                connection.address = Some(address.to_string());
                connection.device = self.lookup_descriptor(address);
                Ok(())
            }
            Err(err) => {
                connection.state = ConnectionState::Idle;
                connection.backend = None;
                connection.address = None;
                connection.device = None;
                Err(err)
            }
        }
    }

    async fn dispatch_connect(&self, address: &str) -> Result<BackendKind, FitBridgeError> {
        if let Some(simulated) = &self.simulated {
            if simulated.owns(address).await {
                simulated.connect(address).await?;
                return Ok(BackendKind::Simulated);
            }
        }
        if let Some(live) = &self.live {
            if live.owns(address).await {
                live.connect(address).await?;
                return Ok(BackendKind::Live);
            }
        }
        Err(NotFoundError {
            entity: "Device",
            id: address.to_string(),
        }
        .into())
    }

    /// Tear down the current connection. Idempotent — disconnecting while
    /// idle is a no-op.
    ///
    /// # Errors
    ///
    /// Propagates the backend's transport error, if any.
    pub async fn disconnect(&self) -> Result<(), FitBridgeError> {
        self.generation.fetch_add(1, Ordering::SeqCst);
        let backend = {
            let mut connection = self.connection.lock().unwrap();
            let backend = connection.backend.take();
            connection.address = None;
            connection.device = None;
            connection.state = ConnectionState::Disconnected {
                reason: DisconnectReason::Requested,
            };
            backend
        };

        match backend {
            Some(BackendKind::Live) => match &self.live {
                Some(live) => live.disconnect().await,
                None => Ok(()),
            },
            Some(BackendKind::Simulated) => match &self.simulated {
                Some(simulated) => simulated.disconnect().await,
                None => Ok(()),
            },
            None => Ok(()),
        }
    }

    /// Gate sample persistence open and notify the connected backend.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::NotConnected`] when no device is connected.
    pub async fn begin_workout(&self) -> Result<(), FitBridgeError> {
        let backend = self.connected_backend()?;
        self.workout_active.store(true, Ordering::SeqCst);
        let result = match backend {
            BackendKind::Live => match &self.live {
                Some(live) => live.begin_workout().await,
                None => Ok(()),
            },
            BackendKind::Simulated => match &self.simulated {
                Some(simulated) => simulated.begin_workout().await,
                None => Ok(()),
            },
        };
        if result.is_err() {
            self.workout_active.store(false, Ordering::SeqCst);
        }
        result
    }

    /// Gate sample persistence closed and notify the connected backend.
    ///
    /// # Errors
    ///
    /// Propagates the backend's error; the gate closes regardless.
    pub async fn end_workout(&self) -> Result<(), FitBridgeError> {
        self.workout_active.store(false, Ordering::SeqCst);
        match self.connected_backend() {
            Ok(BackendKind::Live) => match &self.live {
                Some(live) => live.end_workout().await,
                None => Ok(()),
            },
            Ok(BackendKind::Simulated) => match &self.simulated {
                Some(simulated) => simulated.end_workout().await,
                None => Ok(()),
            },
            // Transport already gone — nothing to signal.
            Err(_) => Ok(()),
        }
    }

    fn connected_backend(&self) -> Result<BackendKind, FitBridgeError> {
        self.connection
            .lock()
            .unwrap()
            .backend
            .ok_or_else(|| LifecycleError::NotConnected.into())
    }

    fn lookup_descriptor(&self, address: &str) -> Option<DeviceDescriptor> {
        self.discovered.lock().unwrap().get(address).cloned()
    }

    fn emit(&self, event: SourceEvent) {
        // Send fails only with zero receivers, which is fine.
        let _ = self.events.send(event);
    }

    fn spawn_pump<B>(facade: Arc<Self>, backend: Arc<B>, kind: BackendKind)
    where
        B: DeviceSource + Send + Sync + 'static,
    {
        let mut rx = backend.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(SourceEvent::Sample(mut sample)) => {
                        sample.t = facade.stamper.lock().unwrap().stamp(time::now_micros());
                        facade.emit(SourceEvent::Sample(sample));
                    }
                    Ok(SourceEvent::State(state)) => {
                        facade.handle_backend_state(&backend, kind, state).await;
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        tracing::warn!(
                            missed,
                            backend = backend.name(),
                            "event pump lagged, oldest events dropped"
                        );
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            tracing::debug!(backend = backend.name(), "event pump stopped");
        });
    }

    async fn handle_backend_state<B>(
        &self,
        backend: &Arc<B>,
        kind: BackendKind,
        state: ConnectionState,
    ) where
        B: DeviceSource + Send + Sync + 'static,
    {
        let transport_drop = matches!(
            state,
            ConnectionState::Disconnected {
                reason: DisconnectReason::Transport
            }
        );

        {
            let mut connection = self.connection.lock().unwrap();
            // Only the connected backend may change the facade's view.
            if connection.backend == Some(kind) || connection.backend.is_none() {
                connection.state = state.clone();
                if transport_drop {
                    connection.backend = None;
                }
            }
        }
        self.emit(SourceEvent::State(state));

        if transport_drop && self.workout_active.load(Ordering::SeqCst) {
            self.reconnect(backend, kind).await;
        }
    }

    /// Reconnect with exponential backoff (1, 2, 4, 8, 16, 30, 30, … s)
    /// until the budget runs out, then emit the terminal `GaveUp` state.
    async fn reconnect<B>(&self, backend: &Arc<B>, kind: BackendKind)
    where
        B: DeviceSource + Send + Sync + 'static,
    {
        let Some(address) = self.connection.lock().unwrap().address.clone() else {
            return;
        };
        let generation = self.generation.load(Ordering::SeqCst);
        let started = tokio::time::Instant::now();
        let mut delay = Duration::from_secs(1);
        let mut attempt: u32 = 0;

        loop {
            let elapsed = started.elapsed();
            if elapsed >= RECONNECT_BUDGET {
                break;
            }
            // The final sleep is clamped so the last attempt lands on the
            // budget boundary rather than overshooting it.
            tokio::time::sleep(delay.min(RECONNECT_BUDGET - elapsed)).await;

            if self.generation.load(Ordering::SeqCst) != generation {
                tracing::debug!("reconnect cancelled by operator action");
                return;
            }

            attempt += 1;
            self.emit(SourceEvent::State(ConnectionState::Reconnecting {
                address: address.clone(),
                attempt,
            }));
            tracing::info!(%address, attempt, "attempting reconnect");

            match backend.connect(&address).await {
                Ok(()) => {
                    {
                        let mut connection = self.connection.lock().unwrap();
                        connection.state = ConnectionState::Connected {
                            address: address.clone(),
                        };
                        connection.backend = Some(kind);
                        connection.device = self.lookup_descriptor(&address);
                    }
                    self.emit(SourceEvent::State(ConnectionState::Connected {
                        address: address.clone(),
                    }));
                    if self.workout_active.load(Ordering::SeqCst) {
                        if let Err(err) = backend.begin_workout().await {
                            tracing::warn!(%err, "failed to resume workout after reconnect");
                        }
                    }
                    tracing::info!(%address, attempt, "reconnected");
                    return;
                }
                Err(err) => {
                    tracing::warn!(%err, %address, attempt, "reconnect attempt failed");
                    delay = (delay * 2).min(RECONNECT_DELAY_CAP);
                }
            }
        }

        tracing::warn!(%address, "reconnect budget exhausted, giving up");
        {
            let mut connection = self.connection.lock().unwrap();
            connection.state = ConnectionState::Disconnected {
                reason: DisconnectReason::GaveUp,
            };
            connection.backend = None;
            connection.address = None;
            connection.device = None;
        }
        self.workout_active.store(false, Ordering::SeqCst);
        self.emit(SourceEvent::State(ConnectionState::Disconnected {
            reason: DisconnectReason::GaveUp,
        }));
    }
}
