//! Process configuration
//!
//! Read once from the environment at startup and never changed afterwards.

use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;
use crate::simulation::{max_particles, BufferingMode, SimulationParams};
use crate::telemetry::publish::{BrokerEndpoint, DEFAULT_BROKER_URL};

pub const DEFAULT_PARTICLES: u32 = 1024;
pub const DEFAULT_SEED: u64 = 42;
pub const DEFAULT_STAGING_SLOTS: usize = 15;

/// Log targets that `WGPU_LOG_LEVEL` applies to.
pub const WGPU_LOG_TARGETS: [&str; 3] = ["wgpu_core", "wgpu_hal", "naga"];

/// Which reference encoder the sink thread runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SinkKind {
    #[default]
    Columnar,
    PerAxis,
}

impl FromStr for SinkKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "columnar" | "batch" => Ok(SinkKind::Columnar),
            "per-axis" | "per_axis" | "axis" => Ok(SinkKind::PerAxis),
            _ => Err("expected `columnar` or `per-axis`".to_string()),
        }
    }
}

impl fmt::Display for SinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkKind::Columnar => f.write_str("columnar"),
            SinkKind::PerAxis => f.write_str("per-axis"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub force_fallback_adapter: bool,
    /// Verbosity of the wgpu log targets, `None` to leave them to `RUST_LOG`.
    pub wgpu_log_level: Option<log::LevelFilter>,
    /// An unrecognised `WGPU_LOG_LEVEL`, reported once logging is up.
    pub ignored_wgpu_log_level: Option<String>,
    pub broker: BrokerEndpoint,
    pub particle_count: u32,
    pub seed: u64,
    pub staging_slots: usize,
    pub buffering: BufferingMode,
    pub sink: SinkKind,
    pub readback_interval: u64,
    pub params: SimulationParams,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            force_fallback_adapter: false,
            wgpu_log_level: None,
            ignored_wgpu_log_level: None,
            broker: BrokerEndpoint::default(),
            particle_count: DEFAULT_PARTICLES,
            seed: DEFAULT_SEED,
            staging_slots: DEFAULT_STAGING_SLOTS,
            buffering: BufferingMode::default(),
            sink: SinkKind::default(),
            readback_interval: 1,
            params: SimulationParams::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key/value source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Config {
            force_fallback_adapter: lookup("WGPU_FORCE_FALLBACK_ADAPTER").as_deref() == Some("1"),
            ..Config::default()
        };

        if let Some(level) = lookup("WGPU_LOG_LEVEL") {
            match parse_log_level(&level) {
                Some(filter) => config.wgpu_log_level = Some(filter),
                None => config.ignored_wgpu_log_level = Some(level),
            }
        }

        let url = lookup("NATS_URL")
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| DEFAULT_BROKER_URL.to_string());
        config.broker = BrokerEndpoint::new(url, lookup("NATS_PASSWORD"));

        if let Some(count) = parse_var::<u32>(&lookup, "BOIDCAST_PARTICLES")? {
            config.particle_count = positive("BOIDCAST_PARTICLES", count)?;
            if count > max_portable_particles() {
                return Err(ConfigError::Invalid {
                    key: "BOIDCAST_PARTICLES",
                    value: count.to_string(),
                    reason: format!(
                        "at most {} particles fit in one dispatch",
                        max_portable_particles()
                    ),
                });
            }
        }
        if let Some(seed) = parse_var::<u64>(&lookup, "BOIDCAST_SEED")? {
            config.seed = seed;
        }
        if let Some(slots) = parse_var::<usize>(&lookup, "BOIDCAST_STAGING_SLOTS")? {
            config.staging_slots = positive("BOIDCAST_STAGING_SLOTS", slots)?;
        }
        if let Some(buffering) = parse_var::<BufferingMode>(&lookup, "BOIDCAST_BUFFERING")? {
            config.buffering = buffering;
        }
        if let Some(sink) = parse_var::<SinkKind>(&lookup, "BOIDCAST_SINK")? {
            config.sink = sink;
        }
        if let Some(interval) = parse_var::<u64>(&lookup, "BOIDCAST_READBACK_INTERVAL")? {
            config.readback_interval = positive("BOIDCAST_READBACK_INTERVAL", interval)?;
        }

        Ok(config)
    }

    /// Logs the effective configuration. The broker password is never printed.
    pub fn log_summary(&self) {
        log::info!(
            "{} particles (seed {}), {} buffering, {} staging slots, readback every {} frame(s)",
            self.particle_count,
            self.seed,
            self.buffering,
            self.staging_slots,
            self.readback_interval
        );
        log::info!("{} sink towards {}", self.sink, self.broker);
        if self.force_fallback_adapter {
            log::info!("Fallback adapter forced");
        }
        if let Some(level) = &self.ignored_wgpu_log_level {
            log::warn!("Ignoring unknown WGPU_LOG_LEVEL {level:?}");
        }
    }
}

/// Largest flock any adapter can step in a single dispatch.
pub fn max_portable_particles() -> u32 {
    max_particles(wgpu::Limits::downlevel_defaults().max_compute_workgroups_per_dimension)
}

/// Maps `OFF`/`ERROR`/`WARN`/`INFO`/`DEBUG`/`TRACE` (any case) to a filter.
pub fn parse_log_level(value: &str) -> Option<log::LevelFilter> {
    match value.trim().to_ascii_uppercase().as_str() {
        "OFF" => Some(log::LevelFilter::Off),
        "ERROR" => Some(log::LevelFilter::Error),
        "WARN" => Some(log::LevelFilter::Warn),
        "INFO" => Some(log::LevelFilter::Info),
        "DEBUG" => Some(log::LevelFilter::Debug),
        "TRACE" => Some(log::LevelFilter::Trace),
        _ => None,
    }
}

fn parse_var<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    let Some(value) = lookup(key) else {
        return Ok(None);
    };
    value
        .trim()
        .parse()
        .map(Some)
        .map_err(|error: T::Err| ConfigError::Invalid {
            key,
            value: value.clone(),
            reason: error.to_string(),
        })
}

fn positive<T>(key: &'static str, value: T) -> Result<T, ConfigError>
where
    T: PartialOrd + Default + fmt::Display,
{
    if value > T::default() {
        Ok(value)
    } else {
        Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
            reason: "must be greater than zero".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert!(!config.force_fallback_adapter);
        assert_eq!(config.particle_count, 1024);
        assert_eq!(config.seed, 42);
        assert_eq!(config.staging_slots, 15);
        assert_eq!(config.buffering, BufferingMode::PingPong);
        assert_eq!(config.sink, SinkKind::Columnar);
        assert_eq!(config.broker.url, "nats://127.0.0.1:4222");
        assert!(config.wgpu_log_level.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("WGPU_FORCE_FALLBACK_ADAPTER", "1"),
            ("WGPU_LOG_LEVEL", "warn"),
            ("NATS_URL", "nats://broker:4222"),
            ("NATS_PASSWORD", "secret"),
            ("BOIDCAST_PARTICLES", "4096"),
            ("BOIDCAST_STAGING_SLOTS", "3"),
            ("BOIDCAST_BUFFERING", "in-place"),
            ("BOIDCAST_SINK", "per-axis"),
            ("BOIDCAST_READBACK_INTERVAL", "10"),
        ])
        .unwrap();
        assert!(config.force_fallback_adapter);
        assert_eq!(config.wgpu_log_level, Some(log::LevelFilter::Warn));
        assert_eq!(config.broker.url, "nats://broker:4222");
        assert!(config.broker.has_password());
        assert_eq!(config.particle_count, 4096);
        assert_eq!(config.staging_slots, 3);
        assert_eq!(config.buffering, BufferingMode::InPlace);
        assert_eq!(config.sink, SinkKind::PerAxis);
        assert_eq!(config.readback_interval, 10);
    }

    #[test]
    fn test_fallback_flag_needs_exactly_one() {
        let config = config_from(&[("WGPU_FORCE_FALLBACK_ADAPTER", "true")]).unwrap();
        assert!(!config.force_fallback_adapter);
    }

    #[test]
    fn test_unknown_wgpu_level_is_ignored() {
        let config = config_from(&[("WGPU_LOG_LEVEL", "LOUD")]).unwrap();
        assert!(config.wgpu_log_level.is_none());
        assert_eq!(config.ignored_wgpu_log_level.as_deref(), Some("LOUD"));
    }

    #[test]
    fn test_invalid_values_are_errors() {
        assert!(matches!(
            config_from(&[("BOIDCAST_PARTICLES", "lots")]),
            Err(ConfigError::Invalid { key: "BOIDCAST_PARTICLES", .. })
        ));
        assert!(config_from(&[("BOIDCAST_PARTICLES", "0")]).is_err());
        assert!(config_from(&[("BOIDCAST_STAGING_SLOTS", "0")]).is_err());
        assert!(config_from(&[("BOIDCAST_BUFFERING", "triple")]).is_err());
        assert!(config_from(&[("BOIDCAST_SINK", "avro")]).is_err());
    }

    #[test]
    fn test_particle_count_limited_by_dispatch_size() {
        assert_eq!(max_portable_particles(), 65535 * 64);
        let largest = config_from(&[("BOIDCAST_PARTICLES", "4194240")]).unwrap();
        assert_eq!(largest.particle_count, 4_194_240);
        assert!(matches!(
            config_from(&[("BOIDCAST_PARTICLES", "4194241")]),
            Err(ConfigError::Invalid { key: "BOIDCAST_PARTICLES", .. })
        ));
    }

    #[test]
    fn test_parse_log_level() {
        assert_eq!(parse_log_level("TRACE"), Some(log::LevelFilter::Trace));
        assert_eq!(parse_log_level("off"), Some(log::LevelFilter::Off));
        assert_eq!(parse_log_level(""), None);
    }
}
