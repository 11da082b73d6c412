//! Shamir's secret sharing over GF(p).
//!
//! Each plaintext value becomes the constant term of a fresh random polynomial
//! of degree `t`; peer `j` (local index) receives the evaluation at `x = j + 1`.
//! Any `t + 1` peers can interpolate the value, `t` or fewer learn nothing.
//!
//! # Security
//! - **Fresh randomness**: every `split` call draws new coefficients, so sharing
//!   the same plaintext twice yields unrelated share vectors.
//! - **Zeroization**: polynomial coefficients are wiped after use.

use alloc::boxed::Box;
use alloc::vec::Vec;
use zeroize::Zeroizing;

use super::polynomial::evaluate_polynomial;
use super::{MpcError, SecretSplitter, ShareVector, SplitterConfig};
use crate::entropy::EntropySource;
use crate::field::PrimeField;

pub struct ShamirSharing {
    field: PrimeField,
    requested_degree: Option<usize>,
    degree: usize,
    peers: usize,
    ready: bool,
    rng: Box<dyn EntropySource + Send>,
}

impl ShamirSharing {
    /// Configures the splitter: randomness source, field and optional degree.
    pub fn new(config: &SplitterConfig) -> Self {
        Self::with_source(config.field, config.degree_t, config.randomness.build())
    }

    /// Same as [`ShamirSharing::new`] with an explicit entropy source.
    pub fn with_source(
        field: PrimeField,
        degree_t: Option<usize>,
        rng: Box<dyn EntropySource + Send>,
    ) -> Self {
        Self {
            field,
            requested_degree: degree_t.filter(|&t| t > 0),
            degree: 0,
            peers: 0,
            ready: false,
            rng,
        }
    }

    /// Degree in effect after `init`.
    pub fn degree(&self) -> usize {
        self.degree
    }

    /// Uniform field element by rejection sampling on the field's bit length.
    fn random_element(&mut self) -> Result<u64, MpcError> {
        let bits = self.field.bits();
        let mask = if bits >= 64 { u64::MAX } else { (1u64 << bits) - 1 };
        let mut buf = Zeroizing::new([0u8; 8]);
        loop {
            self.rng.fill(&mut buf[..]).map_err(|_| MpcError::RngFailure)?;
            let candidate = u64::from_le_bytes(*buf) & mask;
            if candidate < self.field.modulus() {
                return Ok(candidate);
            }
        }
    }
}

impl SecretSplitter for ShamirSharing {
    fn set_peer_count(&mut self, n: usize) {
        if n != self.peers {
            self.ready = false;
        }
        self.peers = n;
    }

    fn peer_count(&self) -> usize {
        self.peers
    }

    fn init(&mut self) -> Result<(), MpcError> {
        self.ready = false;
        if self.peers == 0 {
            return Err(MpcError::NoPeers);
        }
        if self.peers as u64 >= self.field.modulus() {
            return Err(MpcError::InvalidShareIndex);
        }
        let degree = self.requested_degree.unwrap_or((self.peers - 1) / 2);
        if degree >= self.peers {
            return Err(MpcError::InvalidThreshold);
        }
        self.degree = degree;
        self.ready = true;
        log::debug!(
            "Shamir splitter ready: n={}, t={}, field={} bits, rng={}",
            self.peers,
            self.degree,
            self.field.bits(),
            self.rng.name()
        );
        Ok(())
    }

    fn field(&self) -> PrimeField {
        self.field
    }

    fn split(&mut self, values: &[i64]) -> Result<Vec<ShareVector>, MpcError> {
        if !self.ready {
            return Err(MpcError::NotInitialized);
        }
        let n = self.peers;

        // share_values[j] belongs to the peer at local index j (x = j + 1)
        let mut share_values: Vec<Vec<u64>> = (0..n).map(|_| Vec::with_capacity(values.len())).collect();
        let mut coeffs = Zeroizing::new(Vec::with_capacity(self.degree + 1));

        for &value in values {
            coeffs.clear();
            coeffs.push(self.field.encode(value));
            for _ in 0..self.degree {
                let c = self.random_element()?;
                coeffs.push(c);
            }
            for (j, column) in share_values.iter_mut().enumerate() {
                column.push(evaluate_polynomial(&self.field, &coeffs, j as u64 + 1));
            }
        }

        share_values
            .into_iter()
            .enumerate()
            .map(|(j, column)| ShareVector::new(j as u64 + 1, column))
            .collect()
    }
}
