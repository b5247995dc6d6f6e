use parking_lot::Mutex;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use super::future::FeatureFuture;
use super::state::{AtomicState, ExecutorState};
use crate::common::{CropRect, Frame};
use crate::error::{AppError, Result};
use crate::pipeline::classifier::{FeatureVector, FrameClassifier, RegionGridClassifier};
use crate::pipeline::settings::ColorRangeSettings;

const WORKER_NAME: &str = "feature-extractor";

struct Job {
    frame: Frame,
    classifier: Arc<dyn FrameClassifier>,
    reply: oneshot::Sender<Result<FeatureVector>>,
}

struct Session {
    job_tx: mpsc::Sender<Job>,
    classifier: Arc<dyn FrameClassifier>,
    worker: JoinHandle<()>,
}

/// Runs at most one feature extraction at a time on a dedicated thread.
///
/// `submit` never blocks: it either hands the frame to the worker and returns
/// a [`FeatureFuture`], or fails right away with [`AppError::Busy`] while a
/// job is pending or running, or [`AppError::Shutdown`] when no session is
/// active. Nothing is queued; dropping or retrying a rejected frame is up to
/// the caller.
///
/// A new executor starts out `Stopped`. `start` opens a session with fixed
/// classifier settings, `stop` ends it; to change settings stop and start
/// again. Dropping the executor stops it.
pub struct FeatureExtractionExecutor {
    state: Arc<AtomicState>,
    stopping: Arc<AtomicBool>,
    session: Mutex<Option<Session>>,
    // Serializes start/stop so concurrent stops all wait for the worker.
    lifecycle: Mutex<()>,
}

impl FeatureExtractionExecutor {
    pub fn new() -> Self {
        Self {
            state: Arc::new(AtomicState::new(ExecutorState::Stopped)),
            stopping: Arc::new(AtomicBool::new(true)),
            session: Mutex::new(None),
            lifecycle: Mutex::new(()),
        }
    }

    /// Starts a session that classifies frames with [`RegionGridClassifier`]
    /// over the canonical grid.
    pub fn start(&self, crop: CropRect, settings: Arc<ColorRangeSettings>) -> Result<()> {
        self.start_with(Arc::new(RegionGridClassifier::new(crop, settings)))
    }

    pub fn start_with(&self, classifier: Arc<dyn FrameClassifier>) -> Result<()> {
        let _lifecycle = self.lifecycle.lock();
        if self.state.load() != ExecutorState::Stopped || self.session.lock().is_some() {
            return Err(AppError::AlreadyStarted);
        }

        let (job_tx, job_rx) = mpsc::channel::<Job>(1);
        self.stopping.store(false, Ordering::Release);

        let state = self.state.clone();
        let stopping = self.stopping.clone();
        let worker = thread::Builder::new()
            .name(WORKER_NAME.to_string())
            .spawn(move || run_worker(job_rx, state, stopping))?;

        info!("Feature extractor started with {}", classifier.name());
        *self.session.lock() = Some(Session {
            job_tx,
            classifier,
            worker,
        });
        self.state.store(ExecutorState::Idle);
        Ok(())
    }

    pub fn submit(&self, frame: Frame) -> Result<FeatureFuture> {
        // Held across the claim so the job can only land in the session that
        // was active when the slot was claimed.
        let guard = self.session.lock();
        let Some(session) = guard.as_ref() else {
            return Err(AppError::Shutdown);
        };
        if self.stopping.load(Ordering::Acquire) {
            return Err(AppError::Shutdown);
        }
        if !self
            .state
            .transition(ExecutorState::Idle, ExecutorState::Requested)
        {
            return match self.state.load() {
                ExecutorState::Stopped => Err(AppError::Shutdown),
                _ => Err(AppError::Busy),
            };
        }

        let frame_id = frame.id();
        let (reply, rx) = oneshot::channel();
        let job = Job {
            frame,
            classifier: session.classifier.clone(),
            reply,
        };

        match session.job_tx.try_send(job) {
            Ok(()) => {
                debug!("Submitted frame {} for extraction", frame_id);
                Ok(FeatureFuture::new(frame_id, rx))
            }
            Err(TrySendError::Full(_)) => {
                warn!("Extraction slot full, rejecting frame {}", frame_id);
                self.state
                    .transition(ExecutorState::Requested, ExecutorState::Idle);
                Err(AppError::Busy)
            }
            Err(TrySendError::Closed(_)) => {
                warn!("Extraction worker gone, rejecting frame {}", frame_id);
                self.state
                    .transition(ExecutorState::Requested, ExecutorState::Idle);
                Err(AppError::Shutdown)
            }
        }
    }

    /// Ends the session: waits for a running job to finish and the worker to
    /// exit. Safe to call any number of times, from any thread.
    pub fn stop(&self) {
        let _lifecycle = self.lifecycle.lock();
        self.stopping.store(true, Ordering::Release);

        let session = self.session.lock().take();
        if let Some(Session {
            job_tx,
            classifier: _,
            worker,
        }) = session
        {
            // Closing the channel wakes an idle worker.
            drop(job_tx);
            if worker.join().is_err() {
                error!("Feature extractor worker panicked");
            }
            info!("Feature extractor stopped");
        }

        self.state.store(ExecutorState::Stopped);
    }

    /// Snapshot for diagnostics only; it may be stale by the time it is read.
    pub fn status(&self) -> ExecutorState {
        self.state.load()
    }
}

impl Default for FeatureExtractionExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for FeatureExtractionExecutor {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_worker(mut job_rx: mpsc::Receiver<Job>, state: Arc<AtomicState>, stopping: Arc<AtomicBool>) {
    debug!("Feature extractor worker running");
    while let Some(job) = job_rx.blocking_recv() {
        if stopping.load(Ordering::Acquire) {
            debug!("Dropping frame {}: extractor stopping", job.frame.id());
            break;
        }
        state.transition(ExecutorState::Requested, ExecutorState::Running);

        let Job {
            frame,
            classifier,
            reply,
        } = job;
        let result = panic::catch_unwind(AssertUnwindSafe(|| classifier.classify(&frame)))
            .unwrap_or_else(|_| {
                error!("{} panicked on frame {}", classifier.name(), frame.id());
                Err(AppError::Extraction(format!(
                    "{} panicked",
                    classifier.name()
                )))
            });

        // Back to idle before publishing, so a caller that sees the result can
        // submit again straight away.
        state.transition(ExecutorState::Running, ExecutorState::Idle);
        if reply.send(result).is_err() {
            debug!("Result for frame {} discarded by caller", frame.id());
        }
    }
    debug!("Feature extractor worker exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::settings::ColorRange;
    use image::{DynamicImage, ImageBuffer, Rgb};
    use std::sync::atomic::AtomicUsize;
    use std::time::{Duration, Instant};

    struct SlowClassifier {
        delay: Duration,
        finished: AtomicUsize,
    }

    impl SlowClassifier {
        fn new(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                delay,
                finished: AtomicUsize::new(0),
            })
        }
    }

    impl FrameClassifier for SlowClassifier {
        fn classify(&self, frame: &Frame) -> Result<FeatureVector> {
            thread::sleep(self.delay);
            self.finished.fetch_add(1, Ordering::SeqCst);
            Ok(FeatureVector::new(vec![frame.width(), frame.height()]))
        }

        fn name(&self) -> &'static str {
            "SlowClassifier"
        }
    }

    struct PanickingClassifier;

    impl FrameClassifier for PanickingClassifier {
        fn classify(&self, _frame: &Frame) -> Result<FeatureVector> {
            panic!("classifier blew up");
        }

        fn name(&self) -> &'static str {
            "PanickingClassifier"
        }
    }

    fn frame(width: u32, height: u32) -> Frame {
        Frame::captured(DynamicImage::ImageRgb8(ImageBuffer::from_pixel(
            width,
            height,
            Rgb([0, 0, 0]),
        )))
    }

    fn wait_for_state(executor: &FeatureExtractionExecutor, wanted: ExecutorState) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while executor.status() != wanted {
            assert!(Instant::now() < deadline, "never reached {wanted}");
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_submit_and_wait() {
        let executor = FeatureExtractionExecutor::new();
        executor
            .start_with(SlowClassifier::new(Duration::ZERO))
            .unwrap();
        assert_eq!(executor.status(), ExecutorState::Idle);

        let result = executor.submit(frame(3, 4)).unwrap().wait().unwrap();
        assert_eq!(result.as_slice(), &[3, 4]);

        // The slot is free again as soon as the result is visible.
        let result = executor.submit(frame(5, 6)).unwrap().wait().unwrap();
        assert_eq!(result.as_slice(), &[5, 6]);
        executor.stop();
    }

    #[test]
    fn test_second_submit_is_busy() {
        let executor = FeatureExtractionExecutor::new();
        executor
            .start_with(SlowClassifier::new(Duration::from_millis(200)))
            .unwrap();

        let first = executor.submit(frame(1, 1)).unwrap();
        assert!(matches!(executor.submit(frame(2, 2)), Err(AppError::Busy)));
        assert!(matches!(
            executor.status(),
            ExecutorState::Requested | ExecutorState::Running
        ));

        assert_eq!(first.wait().unwrap().as_slice(), &[1, 1]);
        assert!(executor.submit(frame(2, 2)).is_ok());
    }

    #[test]
    fn test_submit_after_stop_is_shutdown() {
        let executor = FeatureExtractionExecutor::new();
        assert!(matches!(executor.submit(frame(1, 1)), Err(AppError::Shutdown)));

        executor
            .start_with(SlowClassifier::new(Duration::ZERO))
            .unwrap();
        executor.stop();
        assert_eq!(executor.status(), ExecutorState::Stopped);
        assert!(matches!(executor.submit(frame(1, 1)), Err(AppError::Shutdown)));

        let started = Instant::now();
        executor.stop();
        executor.stop();
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(executor.status(), ExecutorState::Stopped);
    }

    #[test]
    fn test_double_start_fails() {
        let executor = FeatureExtractionExecutor::new();
        executor
            .start_with(SlowClassifier::new(Duration::ZERO))
            .unwrap();
        assert!(matches!(
            executor.start_with(SlowClassifier::new(Duration::ZERO)),
            Err(AppError::AlreadyStarted)
        ));
    }

    #[test]
    fn test_restart_after_stop() {
        let executor = FeatureExtractionExecutor::new();
        executor
            .start_with(SlowClassifier::new(Duration::ZERO))
            .unwrap();
        executor.stop();
        executor
            .start_with(SlowClassifier::new(Duration::ZERO))
            .unwrap();
        assert_eq!(executor.status(), ExecutorState::Idle);
        assert!(executor.submit(frame(1, 1)).unwrap().wait().is_ok());
    }

    #[test]
    fn test_stop_waits_for_running_job() {
        let classifier = SlowClassifier::new(Duration::from_millis(300));
        let executor = Arc::new(FeatureExtractionExecutor::new());
        executor.start_with(classifier.clone()).unwrap();

        let pending = executor.submit(frame(8, 8)).unwrap();
        wait_for_state(&executor, ExecutorState::Running);

        let stopper = {
            let executor = executor.clone();
            thread::spawn(move || executor.stop())
        };
        stopper.join().unwrap();

        assert_eq!(classifier.finished.load(Ordering::SeqCst), 1);
        assert_eq!(executor.status(), ExecutorState::Stopped);
        assert_eq!(pending.wait().unwrap().as_slice(), &[8, 8]);
    }

    #[test]
    fn test_immediate_stop_runs_or_discards_pending_job() {
        for _ in 0..20 {
            let classifier = SlowClassifier::new(Duration::from_millis(10));
            let executor = FeatureExtractionExecutor::new();
            executor.start_with(classifier.clone()).unwrap();

            let pending = executor.submit(frame(8, 8)).unwrap();
            executor.stop();
            assert_eq!(executor.status(), ExecutorState::Stopped);

            match pending.wait() {
                Ok(features) => {
                    assert_eq!(features.as_slice(), &[8, 8]);
                    assert_eq!(classifier.finished.load(Ordering::SeqCst), 1);
                }
                Err(AppError::Shutdown) => {
                    assert_eq!(classifier.finished.load(Ordering::SeqCst), 0);
                }
                Err(other) => panic!("unexpected result: {other}"),
            }
        }
    }

    #[test]
    fn test_restart_under_concurrent_submits_leaves_slot_free() {
        let executor = Arc::new(FeatureExtractionExecutor::new());
        executor
            .start_with(SlowClassifier::new(Duration::ZERO))
            .unwrap();

        let done = Arc::new(AtomicBool::new(false));
        let submitter = {
            let executor = executor.clone();
            let done = done.clone();
            thread::spawn(move || {
                while !done.load(Ordering::Acquire) {
                    if let Ok(pending) = executor.submit(frame(2, 2)) {
                        let _ = pending.wait();
                    }
                }
            })
        };

        for _ in 0..50 {
            executor.stop();
            executor
                .start_with(SlowClassifier::new(Duration::ZERO))
                .unwrap();
        }
        done.store(true, Ordering::Release);
        submitter.join().unwrap();

        assert_eq!(executor.status(), ExecutorState::Idle);
        let features = executor.submit(frame(3, 1)).unwrap().wait().unwrap();
        assert_eq!(features.as_slice(), &[3, 1]);
    }

    #[test]
    fn test_try_take_polls_until_done() {
        let executor = FeatureExtractionExecutor::new();
        executor
            .start_with(SlowClassifier::new(Duration::from_millis(50)))
            .unwrap();

        let mut pending = executor.submit(frame(2, 3)).unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        let result = loop {
            if let Some(result) = pending.try_take() {
                break result;
            }
            assert!(Instant::now() < deadline);
            thread::sleep(Duration::from_millis(5));
        };
        assert_eq!(result.unwrap().as_slice(), &[2, 3]);
    }

    #[test]
    fn test_panicking_classifier_keeps_worker_alive() {
        let executor = FeatureExtractionExecutor::new();
        executor.start_with(Arc::new(PanickingClassifier)).unwrap();

        let result = executor.submit(frame(1, 1)).unwrap().wait();
        assert!(matches!(result, Err(AppError::Extraction(_))));
        assert_eq!(executor.status(), ExecutorState::Idle);
        assert!(matches!(
            executor.submit(frame(1, 1)).unwrap().wait(),
            Err(AppError::Extraction(_))
        ));
    }

    #[test]
    fn test_out_of_bounds_arrives_through_future() {
        let executor = FeatureExtractionExecutor::new();
        let any = ColorRange::everything();
        executor
            .start(
                CropRect::new(0, 0, 200, 200),
                Arc::new(ColorRangeSettings::new(any, any, any)),
            )
            .unwrap();

        let result = executor.submit(frame(100, 100)).unwrap().wait();
        assert!(matches!(result, Err(AppError::OutOfBounds { .. })));

        let features = executor.submit(frame(300, 300)).unwrap().wait().unwrap();
        assert_eq!(features.len(), 504);
    }

    #[tokio::test]
    async fn test_await_from_async_context() {
        let executor = FeatureExtractionExecutor::new();
        executor
            .start_with(SlowClassifier::new(Duration::from_millis(10)))
            .unwrap();

        let features = executor.submit(frame(9, 7)).unwrap().await.unwrap();
        assert_eq!(features.as_slice(), &[9, 7]);
        executor.stop();
    }
}
