//! Threshold secret sharing over a prime field.
//!
//! The input peer only ever *splits*: every plaintext vector it owns becomes one
//! share vector per privacy peer. Reconstruction exists so the sharing can be
//! verified in tests and diagnostics; the round flow never calls it.
//!
//! # Components
//! - `share`: the per-peer share vector (zeroized on drop).
//! - `shamir`: the Shamir splitter behind the [`SecretSplitter`] contract.
//! - `reconstruct`: Lagrange interpolation at zero.

pub mod share;
pub mod shamir;
pub mod reconstruct;
pub(crate) mod polynomial;

use alloc::vec::Vec;
use core::fmt;

use crate::entropy::Randomness;
use crate::field::{FieldError, PrimeField};

pub use shamir::ShamirSharing;
pub use share::ShareVector;

/// Errors for MPC operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MpcError {
    /// Invalid share index (x-coordinate must be non-zero and below the field order).
    InvalidShareIndex,
    /// Degree must be strictly below the number of peers.
    InvalidThreshold,
    /// `split` called with no peers configured.
    NoPeers,
    /// `split` called before `init`.
    NotInitialized,
    /// Not enough shares to reconstruct.
    InsufficientShares,
    /// Duplicate share indices provided.
    DuplicateShareIndex,
    /// Mismatch in share lengths.
    ShareLengthMismatch,
    /// Random number generator failure.
    RngFailure,
    /// Underlying field arithmetic failure.
    Field(FieldError),
}

impl fmt::Display for MpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MpcError::InvalidShareIndex => write!(f, "Invalid share index"),
            MpcError::InvalidThreshold => write!(f, "Polynomial degree must be below the peer count"),
            MpcError::NoPeers => write!(f, "No privacy peers configured"),
            MpcError::NotInitialized => write!(f, "Splitter used before init()"),
            MpcError::InsufficientShares => write!(f, "Not enough shares to reconstruct"),
            MpcError::DuplicateShareIndex => write!(f, "Duplicate share index"),
            MpcError::ShareLengthMismatch => write!(f, "Share vectors differ in length"),
            MpcError::RngFailure => write!(f, "Random number generator failure"),
            MpcError::Field(e) => write!(f, "Field error: {}", e),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for MpcError {}

impl From<FieldError> for MpcError {
    fn from(err: FieldError) -> Self {
        MpcError::Field(err)
    }
}

/// Parameters fixed when a splitter is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitterConfig {
    pub field: PrimeField,
    /// Polynomial degree; `None` picks `(n - 1) / 2` at `init`.
    pub degree_t: Option<usize>,
    pub randomness: Randomness,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            field: PrimeField::default(),
            degree_t: None,
            randomness: Randomness::Os,
        }
    }
}

/// The splitting primitive consumed by share generation.
///
/// Lifecycle per round: `set_peer_count(n)`, `init()`, then any number of
/// `split` calls. Each call returns exactly `n` share vectors, vector `j`
/// destined for the privacy peer at local index `j` and of the same length as
/// `values`.
pub trait SecretSplitter: Send {
    fn set_peer_count(&mut self, n: usize);

    fn peer_count(&self) -> usize;

    /// Resolves the degree and validates it against the peer count.
    fn init(&mut self) -> Result<(), MpcError>;

    fn field(&self) -> PrimeField;

    fn split(&mut self, values: &[i64]) -> Result<Vec<ShareVector>, MpcError>;
}
