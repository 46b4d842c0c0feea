// src/lib.rs
//! Boidcast
//!
//! A GPU boid flock built on wgpu and winit that renders every frame and
//! exports particle snapshots to a telemetry sink without stalling the render
//! loop.

pub mod app;
pub mod config;
pub mod error;
pub mod frame;
pub mod gfx;
pub mod performance;
pub mod prelude;
pub mod readback;
pub mod simulation;
pub mod telemetry;
pub mod wgpu_utils;

// Re-export main types for convenience
pub use app::BoidcastApp;
pub use config::Config;
pub use error::{AppError, ConfigError, FrameError, GpuError};

/// Sets up `env_logger` with an `info` default, the `WGPU_LOG_LEVEL` override
/// for the wgpu targets, and `RUST_LOG` on top.
pub fn init_logging(config: &Config) {
    let mut builder = env_logger::Builder::new();
    builder.filter_level(log::LevelFilter::Info);
    // wgpu is chatty at info
    for target in config::WGPU_LOG_TARGETS {
        builder.filter_module(target, log::LevelFilter::Warn);
    }
    builder.parse_default_env();
    if let Some(level) = config.wgpu_log_level {
        for target in config::WGPU_LOG_TARGETS {
            builder.filter_module(target, level);
        }
    }
    // a second init (tests, embedding) keeps the first logger
    let _ = builder.try_init();
}
