//! Fee sizing.
//!
//! Fees are charged per word of the canonical noun encoding of the
//! unsigned transaction body, with a protocol floor.

use nockwallet_core::constants::{FEE_PER_WORD, MIN_FEE_NICKS};
use nockwallet_core::types::Nicks;

/// Fee for a body of `words` noun words.
pub fn fee_for_words(words: u64) -> Nicks {
    Nicks((words.saturating_mul(FEE_PER_WORD)).max(MIN_FEE_NICKS))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fee_scales_with_size_and_floors() {
        assert_eq!(fee_for_words(0), Nicks(MIN_FEE_NICKS));
        assert_eq!(fee_for_words(1), Nicks(FEE_PER_WORD));
        assert_eq!(fee_for_words(10), Nicks(10 * FEE_PER_WORD));
    }
}
