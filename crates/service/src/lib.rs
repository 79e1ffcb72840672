//! Runtime wiring for the order service.
//!
//! Loads configuration from the environment, sets up structured logging and
//! Prometheus metrics, and owns the shared store client through [`App`].

pub mod app;
pub mod config;
pub mod error;
pub mod telemetry;

pub use app::App;
pub use config::{Config, LogFormat};
pub use error::{Result, ServiceError};
pub use telemetry::{init_tracing, install_metrics_recorder};
