//! Core types and traits for the Shrinkray URL shortener.
//!
//! This crate provides the domain model shared by the storage backends,
//! the shortening orchestrator and the deletion worker.

pub mod error;
pub mod id;
pub mod repository;
pub mod shortcode;

pub use error::{Result, StorageError};
pub use id::{OwnerId, UrlId};
pub use repository::{NewUrl, OwnershipStore, UrlRow, UrlStats, UrlStore};
pub use shortcode::ShortCode;
