//! # Private Set Intersection with Sum (PSI-Sum)
//!
//! This library implements a two-party PSI-Sum protocol: a client holding a
//! set of identifiers learns how many of them appear in a server's
//! `identifier → tag` dictionary and the sum of the tags of those that do.
//! The client learns nothing else about the server's entries, and the
//! server learns nothing about the client's set, not even the result.
//!
//! Identifiers are hashed onto secp256k1 and blinded by secret exponents
//! held by each party (commutative double blinding); tags are encrypted
//! under the client's Paillier key and summed homomorphically.
//!
//! ## Features
//!
//! - **Transport Agnostic**: rounds produce and consume plain message
//!   structs; [`transport`] defines the seams and ships an in-process
//!   loopback plus a JSON-lines framing for byte streams.
//! - **Type-State Roles**: each protocol state is its own type, so rounds
//!   run in order, once, and secrets are dropped when their round ends.
//! - **Injectable Randomness**: every function that samples takes a
//!   `RngCore + CryptoRng`, so tests can run from a seeded generator.
//! - **Parallel Rounds**: per-identifier hashing, blinding and encryption
//!   run on a `rayon` thread pool.
//!
//! ## Protocol Overview
//!
//! 1. **Round 1** (client): blind every identifier as `H(v)^k1`, shuffle,
//!    send with the Paillier public key.
//! 2. **Round 2** (server): re-blind the client's points as `a^k2`; for each
//!    dictionary entry send `(H(w)^k2, Enc(t))`.
//! 3. **Round 3** (client): an entry matches when `(H(w)^k2)^k1` is among the
//!    doubly-blinded points; sum matching ciphertexts and decrypt once.
//!
//! ## Example Usage
//!
//! ```ignore
//! use psi_sum_protocol::{run_protocol, ProtocolConfig};
//! use rand::rngs::OsRng;
//!
//! let result = run_protocol(
//!     vec!["a", "b", "c"],
//!     vec![("c", 10), ("b", 6), ("d", 1)],
//!     &ProtocolConfig::default(),
//!     &mut OsRng,
//! )?;
//! assert_eq!(result.intersection_size, 2);
//! assert_eq!(result.tag_sum, 16u32.into());
//! # Ok::<(), psi_sum_protocol::PsiSumError>(())
//! ```
//!
//! ## Security Considerations
//!
//! - Both parties are assumed semi-honest; nothing here detects a peer that
//!   deviates from the protocol.
//! - The channel between the parties MUST be authenticated and encrypted
//!   (e.g. TLS) in production.
//! - Every run samples fresh scalars and keys. Retry a failed run from new
//!   role objects, never by reusing old ones.
//!
//! ## Modules
//!
//! - [`crypto`] - Group arithmetic and hash-to-curve
//! - [`paillier`] - Additively homomorphic encryption
//! - [`messages`] - Round messages and the result type
//! - [`state`] - Role state types (type-state pattern)
//! - [`transport`] - Transport seams
//! - [`orchestrator`] - Run sequencing
//! - [`config`] - Protocol parameters
//! - [`error`] - Error types

pub use config::{ProtocolConfig, MIN_KEY_BITS};
pub use crypto::{hash_to_curve, BlindingScalar, GroupElement, PointBytes, POINT_LEN};
pub use error::{PsiSumError, Result};
pub use messages::{PsiSumResult, Round1Message, Round2Message, TaggedCiphertext};
pub use orchestrator::{run_as_client, run_as_server, run_protocol};
pub use paillier::{generate_keypair, Ciphertext, PaillierPrivateKey, PaillierPublicKey};
pub use state::{BlindedClient, Client, RespondedServer, Server};
pub use transport::{ClientTransport, JsonLinesTransport, LoopbackServer, ServerTransport};

pub mod config;
pub mod crypto;
pub mod error;
pub mod messages;
pub mod orchestrator;
pub mod paillier;
mod protocol;
pub mod state;
pub mod transport;

/// Integration tests for the full PSI-Sum protocol.
#[cfg(test)]
mod integration_tests {
    use super::*;
    use num_bigint::BigUint;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::SeedableRng;

    fn test_config() -> ProtocolConfig {
        ProtocolConfig::new().with_key_bits(512).with_primality_rounds(20)
    }

    fn run(identifiers: Vec<&str>, dictionary: Vec<(&str, u64)>, seed: u64) -> PsiSumResult {
        let mut rng = StdRng::seed_from_u64(seed);
        run_protocol(identifiers, dictionary, &test_config(), &mut rng).unwrap()
    }

    #[test]
    fn test_full_protocol_partial_overlap() {
        let result = run(vec!["a", "b", "c"], vec![("c", 10), ("b", 6), ("d", 1)], 1);
        assert_eq!(result.intersection_size, 2);
        assert_eq!(result.tag_sum, BigUint::from(16u32));
    }

    #[test]
    fn test_full_protocol_disjoint() {
        let result = run(vec!["x"], vec![("y", 5)], 2);
        assert_eq!(result.intersection_size, 0);
        assert_eq!(result.tag_sum, BigUint::from(0u32));
        assert!(result.is_empty());
    }

    #[test]
    fn test_full_protocol_full_overlap() {
        let result = run(vec!["a", "b"], vec![("a", 3), ("b", 4)], 3);
        assert_eq!(result.intersection_size, 2);
        assert_eq!(result.tag_sum, BigUint::from(7u32));
    }

    #[test]
    fn test_full_protocol_empty_sides() {
        assert_eq!(run(vec![], vec![("a", 1)], 4), PsiSumResult::new(0, BigUint::from(0u32)));
        assert_eq!(run(vec!["a"], vec![], 5), PsiSumResult::new(0, BigUint::from(0u32)));
    }

    #[test]
    fn test_full_protocol_zero_tags_count_but_add_nothing() {
        let result = run(vec!["a", "b"], vec![("a", 0), ("b", 0), ("c", 9)], 6);
        assert_eq!(result, PsiSumResult::new(2, BigUint::from(0u32)));
    }

    #[test]
    fn test_full_protocol_duplicate_client_identifiers() {
        let result = run(vec!["a", "a", "b"], vec![("a", 2)], 7);
        assert_eq!(result, PsiSumResult::new(1, BigUint::from(2u32)));
    }

    #[test]
    fn test_full_protocol_large_random_sets() {
        // 90 unique each side, 10 shared
        let mut identifiers: Vec<String> = (0..90).map(|i| format!("client-{}", i)).collect();
        let mut dictionary: Vec<(String, u64)> = (0..90).map(|i| (format!("server-{}", i), i)).collect();
        let mut expected_sum = 0u64;
        for i in 0..10u64 {
            let shared = format!("shared-{}", i);
            identifiers.push(shared.clone());
            dictionary.push((shared, 100 + i));
            expected_sum += 100 + i;
        }

        let mut rng = StdRng::seed_from_u64(8);
        let result = run_protocol(identifiers, dictionary, &test_config(), &mut rng).unwrap();
        assert_eq!(result.intersection_size, 10);
        assert_eq!(result.tag_sum, BigUint::from(expected_sum));
    }

    #[test]
    fn test_full_protocol_large_tags() {
        let big = 1u64 << 62;
        let result = run(vec!["a", "b"], vec![("a", big), ("b", big)], 9);
        assert_eq!(result.tag_sum, BigUint::from(big) * 2u32);
    }

    #[test]
    fn test_order_independence() {
        let identifiers = vec!["a", "b", "c", "d", "e"];
        let dictionary = vec![("e", 1), ("c", 2), ("x", 4), ("a", 8)];
        let baseline = run(identifiers.clone(), dictionary.clone(), 10);

        let mut shuffle_rng = StdRng::seed_from_u64(99);
        for seed in 11..14 {
            let mut ids = identifiers.clone();
            let mut dict = dictionary.clone();
            ids.shuffle(&mut shuffle_rng);
            dict.shuffle(&mut shuffle_rng);
            assert_eq!(run(ids, dict, seed), baseline);
        }
        assert_eq!(baseline, PsiSumResult::new(3, BigUint::from(11u32)));
    }

    #[test]
    fn test_seeded_runs_are_reproducible() {
        let config = test_config();
        let mut rng_a = StdRng::seed_from_u64(42);
        let mut rng_b = StdRng::seed_from_u64(42);
        let (_, msg_a) = Client::new(vec!["a", "b"]).first_round(&config, &mut rng_a).unwrap();
        let (_, msg_b) = Client::new(vec!["a", "b"]).first_round(&config, &mut rng_b).unwrap();
        assert_eq!(msg_a, msg_b);
    }

    #[test]
    fn test_runs_use_fresh_blinding() {
        let config = test_config();
        let mut rng = StdRng::seed_from_u64(43);
        let (_, first) = Client::new(vec!["a"]).first_round(&config, &mut rng).unwrap();
        let (_, second) = Client::new(vec!["a"]).first_round(&config, &mut rng).unwrap();
        assert_ne!(first.blinded, second.blinded);
        assert_ne!(first.public_key, second.public_key);
    }

    #[test]
    fn test_messages_survive_json_transport() {
        let config = test_config();
        let mut rng = StdRng::seed_from_u64(44);
        let (client, round1) = Client::new(vec!["a", "b"]).first_round(&config, &mut rng).unwrap();
        let round1: Round1Message =
            serde_json::from_str(&serde_json::to_string(&round1).unwrap()).unwrap();
        let (_, round2) = Server::new(vec![("b", 12)])
            .second_round(round1, &config, &mut rng)
            .unwrap();
        let round2: Round2Message =
            serde_json::from_str(&serde_json::to_string(&round2).unwrap()).unwrap();
        let result = client.third_round(round2, &mut rng).unwrap();
        assert_eq!(result, PsiSumResult::new(1, BigUint::from(12u32)));
    }

    #[test]
    fn test_server_learns_only_counts() {
        let config = test_config();
        let mut rng = StdRng::seed_from_u64(45);
        let (_, round1) = Client::new(vec!["secret-a", "secret-b"])
            .first_round(&config, &mut rng)
            .unwrap();
        let (responded, _) = Server::new(vec![("secret-a", 1)])
            .second_round(round1, &config, &mut rng)
            .unwrap();
        let debug = format!("{:?}", responded);
        assert_eq!(
            debug,
            "RespondedServer { entries_answered: 1, points_received: 2 }"
        );
    }
}
