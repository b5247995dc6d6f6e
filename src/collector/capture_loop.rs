use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::sources::{FrameSource, LabelSource};
use crate::dataset::SampleSink;
use crate::error::{AppError, Result};
use crate::pipeline::FeatureExtractionExecutor;

const DEFAULT_TICK: Duration = Duration::from_millis(30);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureStats {
    pub submitted: usize,
    pub written: usize,
    pub skipped_busy: usize,
    pub failed: usize,
}

/// Drives the extractor: every tick grabs a frame, submits it, waits out the
/// rest of the tick for the user's input and stores the labelled features.
pub struct CaptureLoop {
    executor: Arc<FeatureExtractionExecutor>,
    frames: Box<dyn FrameSource>,
    labels: Box<dyn LabelSource>,
    sink: Box<dyn SampleSink>,
    tick: Duration,
}

impl CaptureLoop {
    pub fn builder(executor: Arc<FeatureExtractionExecutor>) -> CaptureLoopBuilder {
        CaptureLoopBuilder::new(executor)
    }

    /// Runs until cancelled or out of frames. The executor is stopped and the
    /// sink flushed on every exit path.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<CaptureStats> {
        let mut stats = CaptureStats::default();
        let outcome = self.capture(&cancel, &mut stats).await;

        let executor = self.executor.clone();
        if let Err(e) = tokio::task::spawn_blocking(move || executor.stop()).await {
            error!("Failed to stop feature extractor: {}", e);
        }
        self.sink.flush()?;

        info!(
            "Capture finished: {} submitted, {} written, {} skipped busy, {} failed",
            stats.submitted, stats.written, stats.skipped_busy, stats.failed
        );
        outcome.map(|_| stats)
    }

    async fn capture(&mut self, cancel: &CancellationToken, stats: &mut CaptureStats) -> Result<()> {
        let mut ticker = tokio::time::interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("Capture cancelled");
                    return Ok(());
                }
                _ = ticker.tick() => {}
            }
            let deadline = Instant::now() + self.tick;

            let Some(frame) = self.frames.next_frame()? else {
                info!("Frame source exhausted");
                return Ok(());
            };

            let captured_at = frame.captured_at();
            let pending = match self.executor.submit(frame) {
                Ok(pending) => {
                    stats.submitted += 1;
                    pending
                }
                Err(AppError::Busy) => {
                    warn!("Dropping frame: extractor busy");
                    stats.skipped_busy += 1;
                    continue;
                }
                Err(e) => return Err(e),
            };

            let label = self
                .labels
                .next_label(deadline.saturating_duration_since(Instant::now()))
                .await?;

            match pending.await {
                Ok(features) => {
                    self.sink.write_sample(&features, label)?;
                    stats.written += 1;
                    debug!(
                        "Sample written {} ms after capture",
                        (Utc::now() - captured_at).num_milliseconds()
                    );
                }
                Err(e) => {
                    warn!("Skipping sample: {}", e);
                    stats.failed += 1;
                }
            }
        }
    }
}

pub struct CaptureLoopBuilder {
    executor: Arc<FeatureExtractionExecutor>,
    frames: Option<Box<dyn FrameSource>>,
    labels: Option<Box<dyn LabelSource>>,
    sink: Option<Box<dyn SampleSink>>,
    tick: Duration,
}

impl CaptureLoopBuilder {
    pub fn new(executor: Arc<FeatureExtractionExecutor>) -> Self {
        Self {
            executor,
            frames: None,
            labels: None,
            sink: None,
            tick: DEFAULT_TICK,
        }
    }

    pub fn frames(mut self, frames: impl FrameSource + 'static) -> Self {
        self.frames = Some(Box::new(frames));
        self
    }

    pub fn labels(mut self, labels: impl LabelSource + 'static) -> Self {
        self.labels = Some(Box::new(labels));
        self
    }

    pub fn sink(mut self, sink: impl SampleSink + 'static) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    // Sample period; also bounds how long the loop waits for a label.
    pub fn tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    pub fn build(self) -> Result<CaptureLoop> {
        let missing = |what: &str| AppError::Configuration(format!("capture loop {what} not set"));
        if self.tick.is_zero() {
            return Err(AppError::Configuration(
                "capture tick must be greater than 0".to_string(),
            ));
        }
        Ok(CaptureLoop {
            executor: self.executor,
            frames: self.frames.ok_or_else(|| missing("frame source"))?,
            labels: self.labels.ok_or_else(|| missing("label source"))?,
            sink: self.sink.ok_or_else(|| missing("sample sink"))?,
            tick: self.tick,
        })
    }
}
