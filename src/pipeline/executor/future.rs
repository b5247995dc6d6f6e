use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot::{self, error::TryRecvError};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::pipeline::classifier::FeatureVector;

/// Pending result of one submitted frame.
///
/// Await it from async code, call [`FeatureFuture::wait`] from a plain thread,
/// or poll it with [`FeatureFuture::try_take`]. If the executor stops before
/// the job ran, the result is [`AppError::Shutdown`].
#[derive(Debug)]
pub struct FeatureFuture {
    frame_id: Uuid,
    rx: oneshot::Receiver<Result<FeatureVector>>,
}

impl FeatureFuture {
    pub(crate) fn new(frame_id: Uuid, rx: oneshot::Receiver<Result<FeatureVector>>) -> Self {
        Self { frame_id, rx }
    }

    pub fn frame_id(&self) -> Uuid {
        self.frame_id
    }

    /// Blocks the current thread until the job finishes.
    ///
    /// Must not be called from inside an async runtime; `.await` instead.
    pub fn wait(self) -> Result<FeatureVector> {
        self.rx.blocking_recv().unwrap_or(Err(AppError::Shutdown))
    }

    /// Non-blocking poll. `None` while the job is still pending; the result is
    /// handed out once.
    pub fn try_take(&mut self) -> Option<Result<FeatureVector>> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Closed) => Some(Err(AppError::Shutdown)),
        }
    }
}

impl Future for FeatureFuture {
    type Output = Result<FeatureVector>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(AppError::Shutdown)))
    }
}
