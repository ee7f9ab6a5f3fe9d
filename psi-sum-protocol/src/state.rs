//! Role state for PSI-Sum.
//!
//! Each protocol state is its own type and every transition consumes the
//! previous state, so a round cannot be replayed and secrets are dropped as
//! soon as they are no longer needed:
//!
//! - client: [`Client`] (created) → [`BlindedClient`] (blinded set sent) →
//!   `PsiSumResult` (result computed)
//! - server: [`Server`] (created) → [`RespondedServer`] (response sent)

use crate::crypto::BlindingScalar;
use crate::paillier::PaillierPrivateKey;
use num_bigint::BigInt;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Client (party 1) before round 1. Holds the identifier set.
pub struct Client {
    pub(crate) identifiers: Vec<String>,
}

impl Client {
    /// Create a client from its identifier set.
    ///
    /// Duplicate identifiers are collapsed.
    pub fn new<I, S>(identifiers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let unique: BTreeSet<String> = identifiers.into_iter().map(Into::into).collect();
        Self {
            identifiers: unique.into_iter().collect(),
        }
    }

    /// Returns the number of distinct identifiers.
    pub fn len(&self) -> usize {
        self.identifiers.len()
    }

    /// Returns true if the identifier set is empty.
    pub fn is_empty(&self) -> bool {
        self.identifiers.is_empty()
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("identifiers", &self.identifiers.len())
            .finish()
    }
}

/// Client after round 1, waiting for the server's response.
///
/// Owns `k1` and the Paillier private key; both are dropped when round 3
/// consumes this value.
pub struct BlindedClient {
    pub(crate) scalar: BlindingScalar,
    pub(crate) private_key: PaillierPrivateKey,
    pub(crate) sent: usize,
    pub(crate) max_set_size: usize,
}

impl BlindedClient {
    /// Number of blinded identifiers sent in round 1.
    pub fn sent(&self) -> usize {
        self.sent
    }
}

impl fmt::Debug for BlindedClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlindedClient")
            .field("sent", &self.sent)
            .finish_non_exhaustive()
    }
}

/// Server (party 2) before round 2. Holds the tagged dictionary.
pub struct Server {
    pub(crate) dictionary: Vec<(String, BigInt)>,
}

impl Server {
    /// Create a server from its `identifier → tag` dictionary.
    ///
    /// Tags are range-checked when round 2 encrypts them. If an identifier
    /// repeats, the last tag wins.
    pub fn new<I, K, T>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, T)>,
        K: Into<String>,
        T: Into<BigInt>,
    {
        let dictionary: BTreeMap<String, BigInt> = entries
            .into_iter()
            .map(|(identifier, tag)| (identifier.into(), tag.into()))
            .collect();
        Self {
            dictionary: dictionary.into_iter().collect(),
        }
    }

    /// Returns the number of dictionary entries.
    pub fn len(&self) -> usize {
        self.dictionary.len()
    }

    /// Returns true if the dictionary is empty.
    pub fn is_empty(&self) -> bool {
        self.dictionary.is_empty()
    }
}

impl fmt::Debug for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Server")
            .field("entries", &self.dictionary.len())
            .finish()
    }
}

/// Server after round 2.
///
/// Keeps only counters; it never learns the result, and holds nothing of
/// the client's beyond what was counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RespondedServer {
    pub(crate) entries_answered: usize,
    pub(crate) points_received: usize,
}

impl RespondedServer {
    /// Number of tagged ciphertexts sent.
    pub fn entries_answered(&self) -> usize {
        self.entries_answered
    }

    /// Number of blinded points received from the client.
    pub fn points_received(&self) -> usize {
        self.points_received
    }
}
