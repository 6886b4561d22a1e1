/*!
 * Traffic Configuration
 *
 * Wakeup strategy selection for the intersection and tunables for the
 * simulation driver.
 */

use crate::core::errors::ConfigError;
use crate::core::limits::{
    DEFAULT_MAX_ARRIVAL_DELAY, DEFAULT_MAX_CROSSING_TIME, DEFAULT_SIM_SEED, DEFAULT_SIM_THREADS,
    DEFAULT_VEHICLES_PER_THREAD, MAX_SIM_THREADS,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// How blocked vehicles are parked and woken
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WakeupStrategy {
    /// One condition variable for every waiter; a departure broadcasts once
    /// if anybody became eligible
    #[default]
    Shared,
    /// One condition variable per approach; a departure broadcasts on each
    /// approach holding an eligible waiter
    PerOrigin,
}

impl FromStr for WakeupStrategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "shared" => Ok(WakeupStrategy::Shared),
            "per_origin" | "per-origin" | "perorigin" => Ok(WakeupStrategy::PerOrigin),
            _ => Err(ConfigError::InvalidValue {
                key: "strategy".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Intersection configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntersectionConfig {
    pub strategy: WakeupStrategy,
}

impl IntersectionConfig {
    #[inline]
    #[must_use]
    pub const fn with_strategy(strategy: WakeupStrategy) -> Self {
        Self { strategy }
    }
}

/// Simulation driver configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Concurrent vehicle-generating threads
    pub threads: usize,
    /// Vehicles each thread sends through
    pub vehicles_per_thread: usize,
    /// Upper bound on time spent inside the intersection
    #[serde(with = "millis")]
    pub max_crossing_time: Duration,
    /// Upper bound on the pause between a thread's consecutive vehicles
    #[serde(with = "millis")]
    pub max_arrival_delay: Duration,
    /// Seed for the traffic generator; thread `i` uses `seed + i`
    pub seed: u64,
    pub strategy: WakeupStrategy,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            threads: DEFAULT_SIM_THREADS,
            vehicles_per_thread: DEFAULT_VEHICLES_PER_THREAD,
            max_crossing_time: DEFAULT_MAX_CROSSING_TIME,
            max_arrival_delay: DEFAULT_MAX_ARRIVAL_DELAY,
            seed: DEFAULT_SIM_SEED,
            strategy: WakeupStrategy::default(),
        }
    }
}

impl SimulationConfig {
    /// Load from a JSON file; missing fields take their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Unreadable {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let config: SimulationConfig =
            serde_json::from_str(&raw).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()
    }

    /// Defaults overridden by `SYNCH_SIM_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env_overrides()
    }

    /// Apply `SYNCH_SIM_*` environment overrides on top of `self`
    pub fn with_env_overrides(mut self) -> Result<Self, ConfigError> {
        if let Some(threads) = env_parse::<usize>("SYNCH_SIM_THREADS")? {
            self.threads = threads;
        }
        if let Some(vehicles) = env_parse::<usize>("SYNCH_SIM_VEHICLES")? {
            self.vehicles_per_thread = vehicles;
        }
        if let Some(ms) = env_parse::<u64>("SYNCH_SIM_CROSSING_MS")? {
            self.max_crossing_time = Duration::from_millis(ms);
        }
        if let Some(ms) = env_parse::<u64>("SYNCH_SIM_ARRIVAL_MS")? {
            self.max_arrival_delay = Duration::from_millis(ms);
        }
        if let Some(seed) = env_parse::<u64>("SYNCH_SIM_SEED")? {
            self.seed = seed;
        }
        if let Ok(strategy) = std::env::var("SYNCH_SIM_STRATEGY") {
            self.strategy = strategy.parse()?;
        }
        self.validate()
    }

    /// Reject configurations the driver cannot run
    pub fn validate(self) -> Result<Self, ConfigError> {
        if self.threads == 0 || self.threads > MAX_SIM_THREADS {
            return Err(ConfigError::InvalidValue {
                key: "threads".to_string(),
                value: self.threads.to_string(),
            });
        }
        Ok(self)
    }

    #[inline]
    #[must_use]
    pub fn total_vehicles(&self) -> usize {
        self.threads * self.vehicles_per_thread
    }
}

fn env_parse<T: FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    match std::env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value,
            }),
        Err(_) => Ok(None),
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
