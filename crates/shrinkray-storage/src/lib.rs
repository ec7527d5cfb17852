//! Storage backends for shortened URL rows.
//!
//! Three backends implement [`UrlStore`] and [`OwnershipStore`]: an in-process
//! table, a JSON-lines file and PostgreSQL. [`Storage::open`] picks one from a
//! [`StorageConfig`].

mod rows;

pub mod backend;
pub mod file;
pub mod memory;
pub mod postgres;

pub use backend::{BackendKind, Storage, StorageConfig};
pub use file::{FileOwnershipStore, FileRows, FileUrlStore};
pub use memory::{MemoryOwnershipStore, MemoryUrlStore, SharedRows};
pub use postgres::{PgOwnershipStore, PgUrlStore};
pub use shrinkray_core::{OwnershipStore, UrlStore};
