pub mod random;
pub mod seq;

pub use random::RandomGenerator;
pub use seq::SeqGenerator;

use shrinkray_core::ShortCode;

/// Trait for generating short codes.
///
/// Implementations are pure generators that don't interact with storage.
/// Nothing retries on collision: a duplicate code is stored as-is.
pub trait Generator: Send + Sync + 'static {
    /// Generates the next short code.
    fn generate(&self) -> ShortCode;
}

