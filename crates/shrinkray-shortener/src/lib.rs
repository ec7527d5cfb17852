//! URL shortening service and background deletion worker.
//!
//! Storage lives in `shrinkray_storage`; this crate composes it with a code
//! generator and exposes the operations a transport layer needs.

pub mod error;
pub mod model;
pub mod service;
pub mod worker;

pub use error::ShortenerError;
pub use model::{BatchItem, CorrelatedUrl, OwnedUrl, Resolution, SavedUrl};
pub use service::ShortenerService;
pub use worker::{
    DeletionHandle, DeletionRequest, DeletionWorker, ErrorListener, WorkerError, WorkerSettings,
};
