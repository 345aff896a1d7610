//! Simulator configuration.

use serde::Deserialize;

/// Configuration for the simulated source.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Offer a simulated indoor bike.
    pub bike: bool,
    /// Offer a simulated rower.
    pub rower: bool,
    /// Milliseconds between samples. 1000 mimics real FTMS machines;
    /// tests dial it down.
    pub tick_ms: u64,
    /// RNG seed — a fixed seed keeps runs reproducible.
    pub seed: u64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            bike: true,
            rower: true,
            tick_ms: 1_000,
            seed: 42,
        }
    }
}
