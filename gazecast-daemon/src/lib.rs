//! Gazecast daemon library
//!
//! Configuration, producer wiring and process lifecycle for the
//! `gazecast-daemon` binary, plus the client behind `gazecast-tail`.

pub mod config;
pub mod daemon;
pub mod logging;
pub mod setup;
pub mod tail;

pub use config::{CliArgs, DaemonConfig, SourceKind};
pub use daemon::{shutdown_signal, Daemon};
pub use setup::build_producer;
