//! Index-synchronized shuffling of parallel lists
//!
//! Every participant shuffles with the same seed, so drop sites and
//! shipments line up identically across a session.

use rand::Rng;
use thiserror::Error;

/// Errors raised by [`shuffle_in_sync`]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ShuffleError {
    #[error("lists must have the same length (left {left}, right {right})")]
    LengthMismatch { left: usize, right: usize },
}

/// Fisher-Yates shuffle applying the same permutation to both slices.
///
/// Walks from the last index down to 1 and swaps with `j ∈ [0, i]`.
/// On a length mismatch nothing is touched and no randomness is consumed.
pub fn shuffle_in_sync<A, B, R: Rng + ?Sized>(
    left: &mut [A],
    right: &mut [B],
    rng: &mut R,
) -> Result<(), ShuffleError> {
    if left.len() != right.len() {
        return Err(ShuffleError::LengthMismatch {
            left: left.len(),
            right: right.len(),
        });
    }

    for i in (1..left.len()).rev() {
        let j = rng.random_range(0..=i);
        left.swap(i, j);
        right.swap(i, j);
    }
    Ok(())
}
