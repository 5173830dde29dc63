//! Response latency with jitter

use std::time::Duration;

use ep_core::config::SimulatorConfig;

/// Delay applied before each simulated callback or event
#[derive(Debug, Clone, Copy)]
pub struct LatencyModel {
    /// Base delay
    base: Duration,
    /// Jitter factor (0.0 to 1.0)
    jitter: f64,
}

impl LatencyModel {
    /// Create a latency model from configuration
    pub fn from_config(config: &SimulatorConfig) -> Self {
        Self::new(config.latency, config.latency_jitter)
    }

    /// Create a latency model with custom parameters
    pub fn new(base: Duration, jitter: f64) -> Self {
        Self {
            base,
            jitter: jitter.clamp(0.0, 1.0),
        }
    }

    /// Get the next delay
    pub fn next_delay(&self) -> Duration {
        if self.jitter == 0.0 {
            return self.base;
        }
        let jitter_amount = self.base.as_secs_f64() * self.jitter * rand::random::<f64>();
        self.base + Duration::from_secs_f64(jitter_amount)
    }
}
