//! Error types for the PSI-Sum protocol.

use thiserror::Error;

/// Errors that can occur during PSI-Sum protocol execution.
///
/// Every variant is fatal to the run that raised it. A failed run never
/// yields a partial result, and a retry must start from fresh role objects
/// so that new blinding scalars and keys are sampled.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PsiSumError {
    /// A received coordinate pair does not lie on the curve.
    #[error("Invalid point: {0}")]
    InvalidPoint(String),

    /// A tag is negative or does not fit the plaintext modulus.
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// A ciphertext could not be decrypted.
    #[error("Decryption error: {0}")]
    Decryption(String),

    /// Prime or key generation failed.
    #[error("Key generation error: {0}")]
    KeyGeneration(String),

    /// A round message is structurally inconsistent with the run.
    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    /// Protocol parameters are out of range.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The transport failed to deliver a round message.
    #[error("Transport error: {0}")]
    Transport(String),
}

/// Result type for PSI-Sum operations.
pub type Result<T> = std::result::Result<T, PsiSumError>;
