//! Per-peer share vector.
//!
//! A share vector holds the evaluations at one x-coordinate of the polynomials
//! hiding a plaintext vector, one field element per plaintext position.
//!
//! # Security
//! - Implements `Zeroize` and `ZeroizeOnDrop` to wipe share values from memory.
//! - `Debug` implementation redacts the values.

use alloc::vec::Vec;
use zeroize::{Zeroize, ZeroizeOnDrop};
use core::fmt;
use super::MpcError;

#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct ShareVector {
    /// The x-coordinate (privacy peer local index + 1). Public.
    #[zeroize(skip)]
    pub x: u64,

    /// One field element per plaintext position.
    pub values: Vec<u64>,
}

impl fmt::Debug for ShareVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShareVector")
            .field("x", &self.x)
            .field("length", &self.values.len())
            .field("values", &"***SENSITIVE***")
            .finish()
    }
}

impl ShareVector {
    /// Creates a share vector. Empty vectors are valid (nodes without neighbors).
    pub fn new(x: u64, values: Vec<u64>) -> Result<Self, MpcError> {
        if x == 0 {
            return Err(MpcError::InvalidShareIndex);
        }
        Ok(Self { x, values })
    }

    pub fn values(&self) -> &[u64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
