//! Randomness for share generation.
//!
//! The splitter never generates randomness itself; it pulls from an
//! [`EntropySource`]. Production rounds use the operating system RNG, while a
//! seeded BLAKE3 generator gives reproducible sharings for tests and replay.

pub mod drbg;
pub mod os;

use alloc::boxed::Box;
use alloc::string::String;
use core::fmt;

pub use drbg::Blake3Drbg;
pub use os::OsEntropy;

/// Error types for entropy collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntropyError {
    /// The platform RNG refused to produce bytes.
    CollectionFailed,
    /// A randomness setting could not be parsed.
    InvalidSetting,
}

impl fmt::Display for EntropyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntropyError::CollectionFailed => write!(f, "Failed to collect entropy"),
            EntropyError::InvalidSetting => write!(f, "Invalid randomness setting"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for EntropyError {}

/// A trait for entropy sources.
pub trait EntropySource {
    /// Returns a unique identifier for the source.
    fn name(&self) -> &'static str;

    /// Fills `dest` with random bytes from the source.
    fn fill(&mut self, dest: &mut [u8]) -> Result<(), EntropyError>;
}

/// Which generator backs the splitter.
///
/// Parsed from the `mpc.randomalgorithm` setting: `os`, or `blake3:<64 hex chars>`.
#[derive(Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Randomness {
    Os,
    Seeded([u8; 32]),
}

impl fmt::Debug for Randomness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Randomness::Os => write!(f, "Os"),
            Randomness::Seeded(_) => write!(f, "Seeded(***)"),
        }
    }
}

impl Default for Randomness {
    fn default() -> Self {
        Randomness::Os
    }
}

impl Randomness {
    pub fn parse(setting: &str) -> Result<Self, EntropyError> {
        let setting = setting.trim();
        if setting.eq_ignore_ascii_case("os") {
            return Ok(Randomness::Os);
        }
        let hex_seed = setting
            .strip_prefix("blake3:")
            .ok_or(EntropyError::InvalidSetting)?;
        let mut seed = [0u8; 32];
        hex::decode_to_slice(hex_seed, &mut seed).map_err(|_| EntropyError::InvalidSetting)?;
        Ok(Randomness::Seeded(seed))
    }

    /// Instantiates the configured generator.
    pub fn build(&self) -> Box<dyn EntropySource + Send> {
        match self {
            Randomness::Os => Box::new(OsEntropy::new()),
            Randomness::Seeded(seed) => Box::new(Blake3Drbg::new(seed)),
        }
    }

    pub fn label(&self) -> String {
        match self {
            Randomness::Os => String::from("os"),
            Randomness::Seeded(_) => String::from("blake3"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::format;

    #[test]
    fn test_parse_settings() {
        assert_eq!(Randomness::parse("os"), Ok(Randomness::Os));
        assert_eq!(Randomness::parse(" OS "), Ok(Randomness::Os));

        let seeded = format!("blake3:{}", "0f".repeat(32));
        assert_eq!(Randomness::parse(&seeded), Ok(Randomness::Seeded([0x0f; 32])));

        assert_eq!(Randomness::parse("SHA1PRNG"), Err(EntropyError::InvalidSetting));
        assert_eq!(Randomness::parse("blake3:abc"), Err(EntropyError::InvalidSetting));
        let bad_hex = format!("blake3:{}", "zz".repeat(32));
        assert_eq!(Randomness::parse(&bad_hex), Err(EntropyError::InvalidSetting));
    }

    #[test]
    fn test_seed_hex_decoding() {
        let mixed = format!("blake3:{}", "aB".repeat(32));
        assert_eq!(Randomness::parse(&mixed), Ok(Randomness::Seeded([0xab; 32])));

        let too_long = format!("blake3:{}00", "11".repeat(32));
        assert_eq!(Randomness::parse(&too_long), Err(EntropyError::InvalidSetting));
        let odd = format!("blake3:{}1", "11".repeat(31));
        assert_eq!(Randomness::parse(&odd), Err(EntropyError::InvalidSetting));
    }

    #[test]
    fn test_seed_is_redacted() {
        let dbg = format!("{:?}", Randomness::Seeded([7u8; 32]));
        assert_eq!(dbg, "Seeded(***)");
    }
}
