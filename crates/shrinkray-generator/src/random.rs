use crate::Generator;
use shrinkray_core::shortcode::{MAX_LENGTH, MIN_LENGTH};
use shrinkray_core::ShortCode;
use std::iter;

const LETTERS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Length of the codes handed out by the shortener.
pub const DEFAULT_CODE_LENGTH: usize = 8;

/// Generates fixed-length codes of random ASCII letters.
#[derive(Debug, Clone, Copy)]
pub struct RandomGenerator {
    length: usize,
}

impl RandomGenerator {
    pub fn new() -> Self {
        Self::with_length(DEFAULT_CODE_LENGTH)
    }

    /// Lengths outside the range a [`ShortCode`] accepts are clamped into it.
    pub fn with_length(length: usize) -> Self {
        Self {
            length: length.clamp(MIN_LENGTH, MAX_LENGTH),
        }
    }

    pub fn length(&self) -> usize {
        self.length
    }
}

impl Default for RandomGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl Generator for RandomGenerator {
    fn generate(&self) -> ShortCode {
        let code: String =
            iter::repeat_with(|| LETTERS[rand::random_range(0..LETTERS.len())] as char)
                .take(self.length)
                .collect();
        ShortCode::new_unchecked(code)
    }
}
