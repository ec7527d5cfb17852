//! Background soft deletion.
//!
//! Producers enqueue [`DeletionRequest`]s through a [`DeletionHandle`]
//! without waiting. [`DeletionWorker::run`] spawns one task per request, and
//! failures of those tasks travel over a second queue to the
//! [`ErrorListener`], which only logs them. Both queues are bounded and a
//! full request queue is reported to the producer instead of blocking it.

use crate::error::ShortenerError;
use crate::service::ShortenerService;
use shrinkray_core::{OwnerId, ShortCode};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use typed_builder::TypedBuilder;

pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Codes to soft-delete on behalf of their owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionRequest {
    pub owner: OwnerId,
    pub codes: Vec<ShortCode>,
}

impl DeletionRequest {
    pub fn new(owner: OwnerId, codes: Vec<ShortCode>) -> Self {
        Self { owner, codes }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, TypedBuilder)]
pub struct WorkerSettings {
    #[builder(default = DEFAULT_QUEUE_CAPACITY)]
    pub request_capacity: usize,
    #[builder(default = DEFAULT_QUEUE_CAPACITY)]
    pub error_capacity: usize,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum WorkerError {
    #[error("the deletion request queue is full, please try again later")]
    QueueFull,
    #[error("the deletion worker has shut down")]
    Closed,
}

/// Producer side of the request queue. Cheap to clone.
#[derive(Debug, Clone)]
pub struct DeletionHandle {
    requests: mpsc::Sender<DeletionRequest>,
}

impl DeletionHandle {
    /// Enqueues `request` without waiting for room.
    pub fn send(&self, request: DeletionRequest) -> Result<(), WorkerError> {
        self.requests.try_send(request).map_err(|err| match err {
            TrySendError::Full(_) => WorkerError::QueueFull,
            TrySendError::Closed(_) => WorkerError::Closed,
        })
    }
}

/// The dequeue loop.
pub struct DeletionWorker {
    shortener: ShortenerService,
    requests: mpsc::Receiver<DeletionRequest>,
    errors: mpsc::Sender<ShortenerError>,
}

/// Logs failures of dispatched deletions.
pub struct ErrorListener {
    errors: mpsc::Receiver<ShortenerError>,
}

impl DeletionWorker {
    /// Creates the worker together with its producer handle and error listener.
    ///
    /// Capacities below one are raised to one.
    pub fn new(
        shortener: ShortenerService,
        settings: WorkerSettings,
    ) -> (Self, DeletionHandle, ErrorListener) {
        let (request_tx, request_rx) = mpsc::channel(settings.request_capacity.max(1));
        let (error_tx, error_rx) = mpsc::channel(settings.error_capacity.max(1));

        let worker = Self {
            shortener,
            requests: request_rx,
            errors: error_tx,
        };
        (
            worker,
            DeletionHandle {
                requests: request_tx,
            },
            ErrorListener { errors: error_rx },
        )
    }

    /// Dispatches requests until `cancel` fires or every handle is dropped.
    ///
    /// Dispatched tasks are not awaited; they keep running after the loop
    /// stops and give up reporting their error once `cancel` fires.
    pub async fn run(mut self, cancel: CancellationToken) {
        info!("deletion worker started");

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                request = self.requests.recv() => match request {
                    Some(request) => self.dispatch(request, cancel.clone()),
                    None => break,
                },
            }
        }

        info!("deletion worker stopped");
    }

    fn dispatch(&self, request: DeletionRequest, cancel: CancellationToken) {
        let shortener = self.shortener.clone();
        let errors = self.errors.clone();

        tokio::spawn(async move {
            let DeletionRequest { owner, codes } = request;
            let Err(err) = shortener.delete_batch_url(&codes, owner).await else {
                debug!(owner = %owner, count = codes.len(), "deletion request applied");
                return;
            };

            tokio::select! {
                sent = errors.send(err) => {
                    if let Err(mpsc::error::SendError(err)) = sent {
                        debug!(error = %err, "error listener gone, dropping deletion error");
                    }
                }
                _ = cancel.cancelled() => {
                    debug!(owner = %owner, "cancelled, dropping deletion error");
                }
            }
        });
    }
}

impl ErrorListener {
    /// Logs every reported failure until `cancel` fires and returns how many
    /// were logged. Failures still queued at cancellation are not logged.
    pub async fn run(mut self, cancel: CancellationToken) -> usize {
        let mut reported = 0;
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                err = self.errors.recv() => match err {
                    Some(err) => {
                        reported += 1;
                        error!(error = %err, "failed to process deletion request");
                    }
                    None => break,
                },
            }
        }

        info!(reported, "error listener stopped");
        reported
    }
}
