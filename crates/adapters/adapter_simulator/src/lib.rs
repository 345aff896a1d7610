//! # fitbridge-adapter-simulator
//!
//! Deterministic fitness-machine source for development and tests.
//!
//! ## Provided devices
//!
//! | Device | Address | Behaviour |
//! |--------|---------|-----------|
//! | Simulated Indoor Bike | `00:11:22:33:44:01` | ~150 W, ~80 rpm, ~25 km/h |
//! | Simulated Rower | `00:11:22:33:44:02` | ~180 W, ~25 spm, ~18 km/h |
//!
//! Samples are produced only between `begin_workout` and `end_workout`,
//! one per tick, each tick advancing one logical second of workout time.
//! On `end_workout` one final sample carrying the accumulated totals is
//! emitted, then generation ceases. A fixed RNG seed makes runs
//! reproducible.
//!
//! ## Dependency rule
//!
//! Depends on `fitbridge-app` (port traits) and `fitbridge-domain` only.

mod config;

pub use config::SimulatorConfig;

use std::sync::Mutex as StdMutex;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use fitbridge_app::ports::source::{DeviceSource, SourceEvent};
use fitbridge_domain::device::{
    ConnectionState, DeviceDescriptor, DisconnectReason, EquipmentKind, SourceOrigin,
};
use fitbridge_domain::error::{FitBridgeError, LifecycleError, NotFoundError};
use fitbridge_domain::sample::Sample;

/// Address of the simulated indoor bike.
pub const SIM_BIKE_ADDRESS: &str = "00:11:22:33:44:01";

/// Address of the simulated rower.
pub const SIM_ROWER_ADDRESS: &str = "00:11:22:33:44:02";

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Rough multiplier from mechanical work to metabolic energy burned.
const METABOLIC_FACTOR: f64 = 4.0;

const JOULES_PER_KCAL: f64 = 4_184.0;

/// Per-tick telemetry generator with bounded noise around fixed means.
struct Generator {
    kind: EquipmentKind,
    rng: StdRng,
    elapsed_s: u16,
    distance_m: f64,
    energy_j: f64,
}

impl Generator {
    fn new(kind: EquipmentKind, seed: u64) -> Self {
        Self {
            kind,
            rng: StdRng::seed_from_u64(seed),
            elapsed_s: 0,
            distance_m: 0.0,
            energy_j: 0.0,
        }
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn next_sample(&mut self) -> Sample {
        self.elapsed_s = self.elapsed_s.saturating_add(1);

        let (power, speed_kph) = match self.kind {
            EquipmentKind::Rower => (
                180 + self.rng.gen_range(-20..=20i16),
                18.0 + self.rng.gen_range(-2.0..=2.0),
            ),
            _ => (
                150 + self.rng.gen_range(-20..=20i16),
                25.0 + self.rng.gen_range(-3.0..=3.0),
            ),
        };

        // One logical second per tick.
        self.distance_m += speed_kph / 3.6;
        self.energy_j += f64::from(power);

        let heart_rate = (80.0 + 0.5 * f64::from(power)).clamp(60.0, 200.0)
            + f64::from(self.rng.gen_range(-2..=2i8));

        let mut sample = Sample::empty(0, self.kind);
        sample.instant_power_w = Some(power);
        sample.instant_speed_kph = Some(speed_kph);
        sample.heart_rate_bpm = Some(heart_rate.clamp(1.0, 255.0) as u8);
        sample.total_distance_m = Some(self.distance_m as u32);
        sample.total_energy_kcal = Some(self.total_kcal());
        sample.elapsed_s = Some(self.elapsed_s);
        match self.kind {
            EquipmentKind::Rower => {
                // 0.5 spm resolution, like the wire format.
                sample.stroke_rate_spm = Some(f64::from(50 + self.rng.gen_range(-6..=6i8)) * 0.5);
            }
            _ => {
                sample.cadence_rpm = Some(f64::from(160 + self.rng.gen_range(-10..=10i16)) * 0.5);
            }
        }
        sample
    }

    /// The closing sample: accumulated totals only, no instantaneous
    /// readings.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn final_sample(&self) -> Sample {
        let mut sample = Sample::empty(0, self.kind);
        sample.total_distance_m = Some(self.distance_m as u32);
        sample.total_energy_kcal = Some(self.total_kcal());
        sample.elapsed_s = Some(self.elapsed_s);
        sample
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn total_kcal(&self) -> u16 {
        (self.energy_j / JOULES_PER_KCAL * METABOLIC_FACTOR) as u16
    }
}

struct ActiveRun {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

#[derive(Default)]
struct Inner {
    connected: Option<DeviceDescriptor>,
    run: Option<ActiveRun>,
}

/// Simulated source honoring the same contract as the live BLE source.
pub struct SimulatedSource {
    config: SimulatorConfig,
    events: broadcast::Sender<SourceEvent>,
    inner: StdMutex<Inner>,
}

impl SimulatedSource {
    /// Create a new simulated source with the given configuration.
    #[must_use]
    pub fn new(config: SimulatorConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            config,
            events,
            inner: StdMutex::new(Inner::default()),
        }
    }

    fn descriptors(&self) -> Vec<DeviceDescriptor> {
        let mut devices = Vec::new();
        if self.config.bike {
            devices.push(
                DeviceDescriptor::builder()
                    .address(SIM_BIKE_ADDRESS)
                    .name("Simulated Indoor Bike")
                    .kind(EquipmentKind::Bike)
                    .rssi(-60)
                    .origin(SourceOrigin::Simulated)
                    .build()
                    .expect("static descriptor is valid"),
            );
        }
        if self.config.rower {
            devices.push(
                DeviceDescriptor::builder()
                    .address(SIM_ROWER_ADDRESS)
                    .name("Simulated Rower")
                    .kind(EquipmentKind::Rower)
                    .rssi(-60)
                    .origin(SourceOrigin::Simulated)
                    .build()
                    .expect("static descriptor is valid"),
            );
        }
        devices
    }

    fn emit(&self, event: SourceEvent) {
        let _ = self.events.send(event);
    }

    fn stop_run(&self) -> Option<ActiveRun> {
        self.inner.lock().unwrap().run.take()
    }
}

impl DeviceSource for SimulatedSource {
    fn name(&self) -> &'static str {
        "simulator"
    }

    async fn discover(&self, _duration: Duration) -> Result<Vec<DeviceDescriptor>, FitBridgeError> {
        Ok(self.descriptors())
    }

    async fn owns(&self, address: &str) -> bool {
        self.descriptors().iter().any(|d| d.address == address)
    }

    async fn connect(&self, address: &str) -> Result<(), FitBridgeError> {
        let descriptor = self
            .descriptors()
            .into_iter()
            .find(|d| d.address == address)
            .ok_or_else(|| NotFoundError {
                entity: "Device",
                id: address.to_string(),
            })?;

        {
            let mut inner = self.inner.lock().unwrap();
            if let Some(connected) = &inner.connected {
                if connected.address == address {
                    tracing::debug!(%address, "already connected, connect is a no-op");
                    return Ok(());
                }
            }
            inner.connected = Some(descriptor.clone());
        }

        self.emit(SourceEvent::State(ConnectionState::Connecting {
            address: address.to_string(),
        }));
        self.emit(SourceEvent::State(ConnectionState::Connected {
            address: address.to_string(),
        }));
        tracing::info!(%address, name = %descriptor.name, "simulator connected");
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), FitBridgeError> {
        let run = {
            let mut inner = self.inner.lock().unwrap();
            if inner.connected.take().is_none() {
                return Ok(());
            }
            inner.run.take()
        };
        if let Some(run) = run {
            run.task.abort();
        }
        self.emit(SourceEvent::State(ConnectionState::Disconnected {
            reason: DisconnectReason::Requested,
        }));
        tracing::info!("simulator disconnected");
        Ok(())
    }

    async fn begin_workout(&self) -> Result<(), FitBridgeError> {
        let kind = {
            let inner = self.inner.lock().unwrap();
            let connected = inner
                .connected
                .as_ref()
                .ok_or(LifecycleError::NotConnected)?;
            if inner.run.is_some() {
                tracing::debug!("workout already running in simulator");
                return Ok(());
            }
            connected.kind
        };

        let (stop, mut stop_rx) = watch::channel(false);
        let events = self.events.clone();
        let tick = Duration::from_millis(self.config.tick_ms);
        let mut generator = Generator::new(kind, self.config.seed);

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick);
            // The first tick of a tokio interval fires immediately.
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let _ = events.send(SourceEvent::Sample(generator.next_sample()));
                    }
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            let _ = events.send(SourceEvent::Sample(generator.final_sample()));
                            break;
                        }
                    }
                }
            }
            tracing::debug!("simulator workout loop stopped");
        });

        self.inner.lock().unwrap().run = Some(ActiveRun { stop, task });
        tracing::info!(kind = %kind, "simulator workout started");
        Ok(())
    }

    async fn end_workout(&self) -> Result<(), FitBridgeError> {
        let Some(run) = self.stop_run() else {
            return Ok(());
        };
        let _ = run.stop.send(true);
        if let Err(err) = run.task.await {
            if !err.is_cancelled() {
                tracing::warn!(%err, "simulator workout task failed");
            }
        }
        tracing::info!("simulator workout ended");
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<SourceEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_config() -> SimulatorConfig {
        SimulatorConfig {
            bike: true,
            rower: true,
            tick_ms: 5,
            seed: 42,
        }
    }

    async fn collect_samples(
        rx: &mut broadcast::Receiver<SourceEvent>,
        deadline: Duration,
    ) -> Vec<Sample> {
        let mut samples = Vec::new();
        let end = tokio::time::Instant::now() + deadline;
        while tokio::time::Instant::now() < end {
            let remaining = end - tokio::time::Instant::now();
            match tokio::time::timeout(remaining, rx.recv()).await {
                Ok(Ok(SourceEvent::Sample(sample))) => samples.push(sample),
                Ok(Ok(SourceEvent::State(_))) => {}
                _ => break,
            }
        }
        samples
    }

    #[tokio::test]
    async fn should_discover_enabled_devices() {
        let source = SimulatedSource::new(fast_config());
        let devices = source.discover(Duration::from_secs(1)).await.unwrap();
        assert_eq!(devices.len(), 2);
        assert!(devices.iter().all(|d| d.origin == SourceOrigin::Simulated));
    }

    #[tokio::test]
    async fn should_discover_only_bike_when_rower_disabled() {
        let source = SimulatedSource::new(SimulatorConfig {
            rower: false,
            ..fast_config()
        });
        let devices = source.discover(Duration::from_secs(1)).await.unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].kind, EquipmentKind::Bike);
    }

    #[tokio::test]
    async fn should_not_emit_samples_before_begin_workout() {
        let source = SimulatedSource::new(fast_config());
        let mut rx = source.subscribe();
        source.connect(SIM_BIKE_ADDRESS).await.unwrap();

        let samples = collect_samples(&mut rx, Duration::from_millis(50)).await;
        assert!(samples.is_empty());
    }

    #[tokio::test]
    async fn should_reject_begin_workout_when_not_connected() {
        let source = SimulatedSource::new(fast_config());
        let result = source.begin_workout().await;
        assert!(matches!(
            result,
            Err(FitBridgeError::Lifecycle(LifecycleError::NotConnected))
        ));
    }

    #[tokio::test]
    async fn should_emit_bike_samples_within_expected_bounds() {
        let source = SimulatedSource::new(fast_config());
        let mut rx = source.subscribe();
        source.connect(SIM_BIKE_ADDRESS).await.unwrap();
        source.begin_workout().await.unwrap();

        let samples = collect_samples(&mut rx, Duration::from_millis(120)).await;
        source.end_workout().await.unwrap();
        assert!(samples.len() >= 5, "got {} samples", samples.len());

        for sample in &samples {
            assert_eq!(sample.kind, EquipmentKind::Bike);
            let power = sample.instant_power_w.unwrap();
            assert!((130..=170).contains(&power), "power {power}");
            let cadence = sample.cadence_rpm.unwrap();
            assert!((75.0..=85.0).contains(&cadence), "cadence {cadence}");
            let speed = sample.instant_speed_kph.unwrap();
            assert!((22.0..=28.0).contains(&speed), "speed {speed}");
            let hr = sample.heart_rate_bpm.unwrap();
            assert!((58..=202).contains(&hr), "heart rate {hr}");
        }
    }

    #[tokio::test]
    async fn should_accumulate_monotonic_totals() {
        let source = SimulatedSource::new(fast_config());
        let mut rx = source.subscribe();
        source.connect(SIM_BIKE_ADDRESS).await.unwrap();
        source.begin_workout().await.unwrap();

        let samples = collect_samples(&mut rx, Duration::from_millis(120)).await;
        source.end_workout().await.unwrap();

        for pair in samples.windows(2) {
            assert!(pair[1].total_distance_m >= pair[0].total_distance_m);
            assert!(pair[1].total_energy_kcal >= pair[0].total_energy_kcal);
            assert!(pair[1].elapsed_s > pair[0].elapsed_s);
        }
    }

    #[tokio::test]
    async fn should_emit_final_totals_sample_on_end() {
        let source = SimulatedSource::new(fast_config());
        let mut rx = source.subscribe();
        source.connect(SIM_ROWER_ADDRESS).await.unwrap();
        source.begin_workout().await.unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;
        source.end_workout().await.unwrap();

        let samples = collect_samples(&mut rx, Duration::from_millis(50)).await;
        let last = samples.last().unwrap();
        // The closing sample carries totals only.
        assert!(last.instant_power_w.is_none());
        assert!(last.total_distance_m.is_some());
        assert!(last.elapsed_s.is_some());

        // And nothing further arrives.
        let after = collect_samples(&mut rx, Duration::from_millis(40)).await;
        assert!(after.is_empty());
    }

    #[tokio::test]
    async fn should_produce_identical_streams_for_same_seed() {
        let mut a = Generator::new(EquipmentKind::Bike, 7);
        let mut b = Generator::new(EquipmentKind::Bike, 7);
        for _ in 0..32 {
            assert_eq!(a.next_sample(), b.next_sample());
        }
    }

    #[tokio::test]
    async fn should_produce_rower_channels_for_rower() {
        let mut generator = Generator::new(EquipmentKind::Rower, 42);
        let sample = generator.next_sample();
        assert!(sample.stroke_rate_spm.is_some());
        assert!(sample.cadence_rpm.is_none());
        let spm = sample.stroke_rate_spm.unwrap();
        assert!((22.0..=28.0).contains(&spm), "stroke rate {spm}");
    }

    #[tokio::test]
    async fn should_treat_end_workout_without_run_as_noop() {
        let source = SimulatedSource::new(fast_config());
        assert!(source.end_workout().await.is_ok());
    }
}
