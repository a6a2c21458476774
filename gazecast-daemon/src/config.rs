//! Configuration management

use anyhow::{bail, Context, Result};
use clap::Parser;
use gazecast_broadcaster::{BroadcasterSettings, DEFAULT_QUEUE_CAPACITY, DEFAULT_TICK_RATE};
use gazecast_pipeline::{PipelineError, ScreenSize, SmootherKind};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Where frames come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Generated gaze path, runs forever
    #[default]
    Synthetic,
    /// Recorded newline-delimited JSON trace
    Trace,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Synthetic => "synthetic",
            Self::Trace => "trace",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = PipelineError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "synthetic" => Ok(Self::Synthetic),
            "trace" => Ok(Self::Trace),
            other => Err(PipelineError::invalid_config(format!(
                "unknown source '{}' (expected synthetic or trace)",
                other
            ))),
        }
    }
}

/// Command-line overrides. Every flag also reads a `GAZECAST_*` variable.
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "gazecast-daemon", version, about = "Real-time gaze broadcast server")]
pub struct CliArgs {
    /// Configuration file (default: <config dir>/gazecast/config.toml)
    #[arg(long, env = "GAZECAST_CONFIG")]
    pub config: Option<PathBuf>,

    /// Address to bind
    #[arg(long, env = "GAZECAST_HOST")]
    pub host: Option<String>,

    /// Port to listen on
    #[arg(long, env = "GAZECAST_PORT")]
    pub port: Option<u16>,

    /// Samples per second
    #[arg(long, env = "GAZECAST_TICK_RATE")]
    pub tick_rate: Option<u32>,

    /// Screen width in pixels
    #[arg(long, env = "GAZECAST_SCREEN_WIDTH")]
    pub screen_width: Option<u32>,

    /// Screen height in pixels
    #[arg(long, env = "GAZECAST_SCREEN_HEIGHT")]
    pub screen_height: Option<u32>,

    /// Frame source: synthetic or trace
    #[arg(long, env = "GAZECAST_SOURCE")]
    pub source: Option<SourceKind>,

    /// Trace file to replay (implies --source trace)
    #[arg(long, env = "GAZECAST_TRACE")]
    pub trace: Option<PathBuf>,

    /// Smoother: kalman, ema or none
    #[arg(long, env = "GAZECAST_SMOOTHER")]
    pub smoother: Option<SmootherKind>,
}

/// Daemon configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Path to configuration file
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Bind address
    pub host: String,

    /// Listen port
    pub port: u16,

    /// Samples per second
    pub tick_rate: u32,

    /// Screen width used to normalize x
    pub screen_width: u32,

    /// Screen height used to normalize y
    pub screen_height: u32,

    pub source: SourceKind,

    /// Required when `source = "trace"`
    pub trace_path: Option<PathBuf>,

    pub smoother: SmootherKind,

    /// EMA factor in [0, 1]; only used by the `ema` smoother
    pub ema_alpha: f64,

    /// Synthetic blink period in frames (0 = never)
    pub blink_every: u64,

    /// Outbound queue capacity per subscriber, in messages
    pub subscriber_queue: usize,

    /// Default tracing filter when RUST_LOG is unset
    pub log_level: String,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        let screen = ScreenSize::default();
        Self {
            config_path: Self::default_config_path(),
            host: "localhost".to_string(),
            port: 8001,
            tick_rate: DEFAULT_TICK_RATE,
            screen_width: screen.width,
            screen_height: screen.height,
            source: SourceKind::Synthetic,
            trace_path: None,
            smoother: SmootherKind::Kalman,
            ema_alpha: 0.3,
            blink_every: 0,
            subscriber_queue: DEFAULT_QUEUE_CAPACITY,
            log_level: "info".to_string(),
        }
    }
}

impl DaemonConfig {
    /// Load configuration from the default location, or create it
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_config_path())
    }

    /// Load configuration from `path`; a missing file is created with defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;

            let mut config: DaemonConfig = toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))?;

            config.config_path = path.to_path_buf();
            Ok(config)
        } else {
            let config = Self {
                config_path: path.to_path_buf(),
                ..Self::default()
            };
            config.save().context("Failed to save default config")?;
            Ok(config)
        }
    }

    /// Resolve the effective configuration: file (or defaults), then CLI/env
    /// overrides, then validation.
    pub fn from_args(args: &CliArgs) -> Result<Self> {
        let mut config = match &args.config {
            Some(path) => Self::load_from(path)?,
            None => Self::load()?,
        };
        config.apply_overrides(args);
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(&self.config_path, contents).context("Failed to write config file")?;

        Ok(())
    }

    /// CLI values win over file values
    pub fn apply_overrides(&mut self, args: &CliArgs) {
        if let Some(host) = &args.host {
            self.host = host.clone();
        }
        if let Some(port) = args.port {
            self.port = port;
        }
        if let Some(rate) = args.tick_rate {
            self.tick_rate = rate;
        }
        if let Some(width) = args.screen_width {
            self.screen_width = width;
        }
        if let Some(height) = args.screen_height {
            self.screen_height = height;
        }
        if let Some(trace) = &args.trace {
            self.trace_path = Some(trace.clone());
            self.source = SourceKind::Trace;
        }
        if let Some(source) = args.source {
            self.source = source;
        }
        if let Some(smoother) = args.smoother {
            self.smoother = smoother;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.tick_rate == 0 {
            bail!("tick_rate must be greater than zero");
        }
        if self.screen_width == 0 || self.screen_height == 0 {
            bail!(
                "screen size must be non-zero (got {}x{})",
                self.screen_width,
                self.screen_height
            );
        }
        if self.subscriber_queue == 0 {
            bail!("subscriber_queue must be greater than zero");
        }
        if !(0.0..=1.0).contains(&self.ema_alpha) {
            bail!("ema_alpha must be within [0, 1] (got {})", self.ema_alpha);
        }
        if self.source == SourceKind::Trace && self.trace_path.is_none() {
            bail!("source = \"trace\" requires trace_path");
        }
        if self.host.trim().is_empty() {
            bail!("host must not be empty");
        }
        Ok(())
    }

    pub fn screen(&self) -> ScreenSize {
        ScreenSize {
            width: self.screen_width,
            height: self.screen_height,
        }
    }

    pub fn broadcaster_settings(&self) -> BroadcasterSettings {
        BroadcasterSettings {
            host: self.host.clone(),
            port: self.port,
            queue_capacity: self.subscriber_queue,
            ..BroadcasterSettings::default()
        }
    }

    /// Get default config path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("gazecast")
            .join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = DaemonConfig::default();
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 8001);
        assert_eq!(config.tick_rate, 60);
        assert_eq!((config.screen_width, config.screen_height), (1920, 1080));
        assert_eq!(config.smoother, SmootherKind::Kalman);
        assert_eq!(config.source, SourceKind::Synthetic);
        config.validate().unwrap();
    }

    #[test]
    fn test_default_path_ends_in_gazecast() {
        let path = DaemonConfig::default_config_path();
        assert!(path.ends_with("gazecast/config.toml"));
    }

    #[test]
    fn test_source_kind_parse() {
        assert_eq!("trace".parse::<SourceKind>().unwrap(), SourceKind::Trace);
        assert_eq!(" Synthetic ".parse::<SourceKind>().unwrap(), SourceKind::Synthetic);
        assert!("camera".parse::<SourceKind>().is_err());
    }

    #[test]
    fn test_trace_flag_implies_trace_source() {
        let mut config = DaemonConfig::default();
        config.apply_overrides(&CliArgs {
            trace: Some(PathBuf::from("/tmp/gaze.ndjson")),
            ..CliArgs::default()
        });
        assert_eq!(config.source, SourceKind::Trace);
        config.validate().unwrap();
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let bad = [
            DaemonConfig { tick_rate: 0, ..DaemonConfig::default() },
            DaemonConfig { screen_width: 0, ..DaemonConfig::default() },
            DaemonConfig { screen_height: 0, ..DaemonConfig::default() },
            DaemonConfig { subscriber_queue: 0, ..DaemonConfig::default() },
            DaemonConfig { ema_alpha: 1.5, ..DaemonConfig::default() },
            DaemonConfig { source: SourceKind::Trace, ..DaemonConfig::default() },
        ];
        for config in bad {
            assert!(config.validate().is_err(), "{:?}", config);
        }
    }

    #[test]
    fn test_cli_parses_long_flags() {
        let args = CliArgs::try_parse_from([
            "gazecast-daemon",
            "--port",
            "9100",
            "--smoother",
            "ema",
            "--source",
            "synthetic",
        ])
        .unwrap();
        assert_eq!(args.port, Some(9100));
        assert_eq!(args.smoother, Some(SmootherKind::Ema));
        assert_eq!(args.source, Some(SourceKind::Synthetic));
    }
}
