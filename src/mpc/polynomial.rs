//! Polynomial evaluation over GF(p).

use crate::field::PrimeField;

/// Evaluates `c[0] + c[1]*x + ... + c[k]*x^k` with Horner's method.
#[inline]
pub(crate) fn evaluate_polynomial(field: &PrimeField, coeffs: &[u64], x: u64) -> u64 {
    coeffs
        .iter()
        .rev()
        .fold(0u64, |acc, &c| field.add(field.mul(acc, x), c))
}
