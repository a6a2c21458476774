//! Wiring configuration into a sample producer

use anyhow::{Context, Result};
use gazecast_pipeline::{
    Estimator, FrameSource, Normalizer, SampleProducer, SyntheticEstimator, SyntheticSource,
    TraceEstimator, TraceSource,
};
use tracing::info;

use crate::config::{DaemonConfig, SourceKind};

/// Build the frame source, estimator, smoother and normalizer named by `config`.
pub fn build_producer(config: &DaemonConfig) -> Result<SampleProducer> {
    let screen = config.screen();
    let normalizer = Normalizer::new(screen).context("Invalid screen size")?;

    let (source, estimator): (Box<dyn FrameSource>, Box<dyn Estimator>) = match config.source {
        SourceKind::Synthetic => (
            Box::new(SyntheticSource::new()),
            Box::new(SyntheticEstimator::new(screen).blink_every(config.blink_every)),
        ),
        SourceKind::Trace => {
            let path = config
                .trace_path
                .as_ref()
                .context("source = \"trace\" requires trace_path")?;
            let source = TraceSource::open(path)
                .with_context(|| format!("Failed to open trace {}", path.display()))?;
            (Box::new(source), Box::new(TraceEstimator))
        }
    };

    info!(
        source = %config.source,
        smoother = %config.smoother,
        width = screen.width,
        height = screen.height,
        "Sample producer ready"
    );

    Ok(SampleProducer::new(
        source,
        estimator,
        config.smoother.build(config.ema_alpha),
        normalizer,
    ))
}
