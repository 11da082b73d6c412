//! Secret reconstruction from share vectors.
//!
//! Lagrange interpolation at `x = 0` over GF(p). Used to verify sharings; the
//! input peer itself never reconstructs during a round.

use alloc::vec::Vec;
use crate::field::PrimeField;
use crate::mpc::{MpcError, ShareVector};

/// Reconstructs the field elements hidden by `shares`.
///
/// Needs at least `t + 1` shares of a degree-`t` sharing; fewer silently give
/// a wrong answer, which is what makes the scheme hiding.
pub fn reconstruct(field: &PrimeField, shares: &[ShareVector]) -> Result<Vec<u64>, MpcError> {
    let first = shares.first().ok_or(MpcError::InsufficientShares)?;
    let share_len = first.len();

    for share in shares {
        if share.len() != share_len {
            return Err(MpcError::ShareLengthMismatch);
        }
        if share.x == 0 || share.x >= field.modulus() {
            return Err(MpcError::InvalidShareIndex);
        }
    }
    for (i, a) in shares.iter().enumerate() {
        if shares[i + 1..].iter().any(|b| b.x == a.x) {
            return Err(MpcError::DuplicateShareIndex);
        }
    }

    // lambda_j = prod_{m != j} x_m / (x_m - x_j)
    let mut lambdas = Vec::with_capacity(shares.len());
    for (j, sj) in shares.iter().enumerate() {
        let mut numerator = 1u64;
        let mut denominator = 1u64;
        for (m, sm) in shares.iter().enumerate() {
            if m == j {
                continue;
            }
            numerator = field.mul(numerator, sm.x);
            denominator = field.mul(denominator, field.sub(sm.x, sj.x));
        }
        lambdas.push(field.mul(numerator, field.inv(denominator)?));
    }

    let secret = (0..share_len)
        .map(|p| {
            shares
                .iter()
                .zip(lambdas.iter())
                .fold(0u64, |acc, (share, &lambda)| field.add(acc, field.mul(share.values[p], lambda)))
        })
        .collect();
    Ok(secret)
}

/// Reconstructs and decodes back to signed plaintext values.
pub fn reconstruct_signed(field: &PrimeField, shares: &[ShareVector]) -> Result<Vec<i64>, MpcError> {
    Ok(reconstruct(field, shares)?
        .into_iter()
        .map(|e| field.decode(e))
        .collect())
}
