//! Prime-field arithmetic for Shamir sharing.
//!
//! Shares live in GF(p) for a configurable prime `p < 2^64`. Elements are plain
//! `u64` residues; products go through `u128` so no intermediate overflows.
//!
//! Plaintext inputs are signed (`-1` is the "no export"/"no route" sentinel), so
//! the field also defines the signed encoding used on both sides of the protocol:
//! `v` maps to `v mod p`, and residues above `p / 2` decode back to negatives.

use core::fmt;

/// Largest prime below 2^63, the privacy peers' default share field.
pub const DEFAULT_FIELD_ORDER: u64 = 9_223_372_036_854_775_783;

/// Deterministic Miller-Rabin witnesses for every `u64`.
const WITNESSES: [u64; 12] = [2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldError {
    /// The configured order is not prime (or is too small to be useful).
    NotPrime,
    /// Zero has no multiplicative inverse.
    ZeroInverse,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldError::NotPrime => write!(f, "Field order is not a prime greater than 2"),
            FieldError::ZeroInverse => write!(f, "Zero has no inverse"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for FieldError {}

/// GF(p) for a runtime prime `p`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PrimeField {
    modulus: u64,
}

impl PrimeField {
    /// Creates the field, rejecting composite orders.
    pub fn new(modulus: u64) -> Result<Self, FieldError> {
        if modulus < 3 || !is_prime(modulus) {
            return Err(FieldError::NotPrime);
        }
        Ok(Self { modulus })
    }

    pub fn modulus(&self) -> u64 {
        self.modulus
    }

    /// Number of bits needed to hold any residue.
    pub fn bits(&self) -> u32 {
        u64::BITS - (self.modulus - 1).leading_zeros()
    }

    /// Maps a signed plaintext into the field.
    #[inline]
    pub fn encode(&self, value: i64) -> u64 {
        (value as i128).rem_euclid(self.modulus as i128) as u64
    }

    /// Inverse of [`PrimeField::encode`] for values within `(-p/2, p/2]`.
    #[inline]
    pub fn decode(&self, element: u64) -> i64 {
        let element = element % self.modulus;
        if element > self.modulus / 2 {
            (element as i128 - self.modulus as i128) as i64
        } else {
            element as i64
        }
    }

    #[inline]
    pub fn add(&self, a: u64, b: u64) -> u64 {
        ((a as u128 + b as u128) % self.modulus as u128) as u64
    }

    #[inline]
    pub fn sub(&self, a: u64, b: u64) -> u64 {
        let p = self.modulus as u128;
        ((a as u128 % p + p - b as u128 % p) % p) as u64
    }

    #[inline]
    pub fn mul(&self, a: u64, b: u64) -> u64 {
        mul_mod(a, b, self.modulus)
    }

    pub fn pow(&self, base: u64, exp: u64) -> u64 {
        pow_mod(base, exp, self.modulus)
    }

    /// Multiplicative inverse via Fermat's little theorem.
    pub fn inv(&self, a: u64) -> Result<u64, FieldError> {
        let a = a % self.modulus;
        if a == 0 {
            return Err(FieldError::ZeroInverse);
        }
        Ok(pow_mod(a, self.modulus - 2, self.modulus))
    }
}

impl Default for PrimeField {
    fn default() -> Self {
        Self { modulus: DEFAULT_FIELD_ORDER }
    }
}

#[inline(always)]
fn mul_mod(a: u64, b: u64, m: u64) -> u64 {
    ((a as u128 * b as u128) % m as u128) as u64
}

fn pow_mod(mut base: u64, mut exp: u64, m: u64) -> u64 {
    let mut result = 1 % m;
    base %= m;
    while exp > 0 {
        if exp & 1 == 1 {
            result = mul_mod(result, base, m);
        }
        base = mul_mod(base, base, m);
        exp >>= 1;
    }
    result
}

/// Deterministic Miller-Rabin for 64-bit candidates.
pub fn is_prime(n: u64) -> bool {
    if n < 2 {
        return false;
    }
    for &p in WITNESSES.iter() {
        if n % p == 0 {
            return n == p;
        }
    }

    let mut d = n - 1;
    let mut s = 0;
    while d % 2 == 0 {
        d /= 2;
        s += 1;
    }

    'witness: for &a in WITNESSES.iter() {
        let mut x = pow_mod(a, d, n);
        if x == 1 || x == n - 1 {
            continue;
        }
        for _ in 1..s {
            x = mul_mod(x, x, n);
            if x == n - 1 {
                continue 'witness;
            }
        }
        return false;
    }
    true
}
