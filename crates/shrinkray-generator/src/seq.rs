use crate::Generator;
use shrinkray_core::ShortCode;
use std::sync::atomic::{AtomicU64, Ordering};

const COUNTER_WIDTH: usize = 6;

/// Produces predictable codes such as `sr000000`, `sr000001`, ...
///
/// Codes never repeat within one instance, which makes the generator handy
/// for tests that need to know which code the next insert receives.
#[derive(Debug)]
pub struct SeqGenerator {
    next: AtomicU64,
    prefix: String,
}

impl SeqGenerator {
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self::with_offset(prefix, 0)
    }

    /// Starts counting at `offset` instead of zero.
    pub fn with_offset(prefix: impl Into<String>, offset: u64) -> Self {
        Self {
            next: AtomicU64::new(offset),
            prefix: prefix.into(),
        }
    }
}

impl Generator for SeqGenerator {
    fn generate(&self) -> ShortCode {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        ShortCode::new_unchecked(format!("{}{:0width$}", self.prefix, n, width = COUNTER_WIDTH))
    }
}
