//! Seeded deterministic generator built on the BLAKE3 XOF.
//!
//! Two generators with the same seed produce the same stream, which makes
//! sharings reproducible. Never use a fixed seed for a live round.

use zeroize::Zeroizing;
use super::{EntropyError, EntropySource};

const DOMAIN: &[u8] = b"idr-input-peer/share-drbg/v1";

pub struct Blake3Drbg {
    reader: blake3::OutputReader,
}

impl Blake3Drbg {
    pub fn new(seed: &[u8; 32]) -> Self {
        let key = Zeroizing::new(*seed);
        let mut hasher = blake3::Hasher::new_keyed(&key);
        hasher.update(DOMAIN);
        Self {
            reader: hasher.finalize_xof(),
        }
    }
}

impl EntropySource for Blake3Drbg {
    fn name(&self) -> &'static str {
        "Blake3Drbg"
    }

    fn fill(&mut self, dest: &mut [u8]) -> Result<(), EntropyError> {
        self.reader.fill(dest);
        Ok(())
    }
}
