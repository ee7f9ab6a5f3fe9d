//! Protocol parameters.

use crate::error::{PsiSumError, Result};

/// Smallest Paillier modulus accepted, locally or from a peer.
pub const MIN_KEY_BITS: usize = 256;

/// Parameters shared by both roles for a protocol run.
///
/// The defaults are suitable for production use. Tests shrink `key_bits`
/// to keep prime generation fast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolConfig {
    /// Bit length of the Paillier modulus `n`.
    pub key_bits: usize,
    /// Miller-Rabin rounds per prime candidate.
    pub primality_rounds: usize,
    /// Upper bound on the number of identifiers or dictionary entries
    /// a party will hold or accept from its peer.
    pub max_set_size: usize,
}

impl ProtocolConfig {
    /// Create a config with the default parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the Paillier modulus size.
    pub fn with_key_bits(mut self, key_bits: usize) -> Self {
        self.key_bits = key_bits;
        self
    }

    /// Set the number of Miller-Rabin rounds.
    pub fn with_primality_rounds(mut self, rounds: usize) -> Self {
        self.primality_rounds = rounds;
        self
    }

    /// Set the maximum accepted set size.
    pub fn with_max_set_size(mut self, max_set_size: usize) -> Self {
        self.max_set_size = max_set_size;
        self
    }

    /// Check that the parameters are usable.
    ///
    /// # Errors
    /// Returns `PsiSumError::InvalidConfig` if `key_bits` is below
    /// [`MIN_KEY_BITS`] or odd, or if `primality_rounds` or `max_set_size`
    /// is zero.
    pub fn validate(&self) -> Result<()> {
        if self.key_bits < MIN_KEY_BITS {
            return Err(PsiSumError::InvalidConfig(format!(
                "key_bits must be at least {}, got {}",
                MIN_KEY_BITS, self.key_bits
            )));
        }
        if self.key_bits % 2 != 0 {
            return Err(PsiSumError::InvalidConfig(format!(
                "key_bits must be even, got {}",
                self.key_bits
            )));
        }
        if self.primality_rounds == 0 {
            return Err(PsiSumError::InvalidConfig(
                "primality_rounds must be non-zero".to_string(),
            ));
        }
        if self.max_set_size == 0 {
            return Err(PsiSumError::InvalidConfig(
                "max_set_size must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            key_bits: 2048,
            primality_rounds: 40,
            max_set_size: 1_000_000,
        }
    }
}
