//! Message types exchanged between the PSI-Sum client and server.
//!
//! Every message is plain data with serde impls; points travel as
//! [`PointBytes`] and are only trusted after the receiver decodes them.

use crate::crypto::PointBytes;
use crate::paillier::{Ciphertext, PaillierPublicKey};
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

/// Round 1, client to server.
///
/// Carries the client's blinded identifiers `H(v)^k1` in shuffled order and
/// the Paillier public key the server must encrypt tags under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Round1Message {
    /// Blinded identifiers, order randomised by the client
    pub blinded: Vec<PointBytes>,
    /// Client's encryption key
    pub public_key: PaillierPublicKey,
}

impl Round1Message {
    /// Create a new round-1 message.
    pub fn new(blinded: Vec<PointBytes>, public_key: PaillierPublicKey) -> Self {
        Self {
            blinded,
            public_key,
        }
    }

    /// Returns the number of blinded identifiers.
    pub fn len(&self) -> usize {
        self.blinded.len()
    }

    /// Returns true if the client sent no identifiers.
    pub fn is_empty(&self) -> bool {
        self.blinded.is_empty()
    }
}

/// One server dictionary entry as seen by the client: `(H(w)^k2, Enc(t))`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaggedCiphertext {
    /// Server-blinded identifier
    pub point: PointBytes,
    /// Tag encrypted under the client's key
    pub ciphertext: Ciphertext,
}

impl TaggedCiphertext {
    /// Pair a blinded point with its encrypted tag.
    pub fn new(point: PointBytes, ciphertext: Ciphertext) -> Self {
        Self { point, ciphertext }
    }
}

/// Round 2, server to client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Round2Message {
    /// The client's points re-blinded by the server, `H(v)^(k1·k2)`, in the
    /// order they were received
    pub double_blinded: Vec<PointBytes>,
    /// One entry per dictionary item, in shuffled order
    pub tagged: Vec<TaggedCiphertext>,
}

impl Round2Message {
    /// Create a new round-2 message.
    pub fn new(double_blinded: Vec<PointBytes>, tagged: Vec<TaggedCiphertext>) -> Self {
        Self {
            double_blinded,
            tagged,
        }
    }

    /// Returns the number of tagged ciphertexts.
    pub fn len(&self) -> usize {
        self.tagged.len()
    }

    /// Returns true if the server's dictionary was empty.
    pub fn is_empty(&self) -> bool {
        self.tagged.is_empty()
    }
}

/// Final output of a run, known only to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PsiSumResult {
    /// `|V ∩ keys(W)|`
    pub intersection_size: usize,
    /// `Σ W[w]` over the intersection
    pub tag_sum: BigUint,
}

impl PsiSumResult {
    /// Create a new result.
    pub fn new(intersection_size: usize, tag_sum: BigUint) -> Self {
        Self {
            intersection_size,
            tag_sum,
        }
    }

    /// Returns true if the intersection is empty.
    pub fn is_empty(&self) -> bool {
        self.intersection_size == 0
    }
}
