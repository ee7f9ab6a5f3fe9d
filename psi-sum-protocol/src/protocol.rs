//! Core round logic for PSI-Sum.

use crate::config::ProtocolConfig;
use crate::crypto::{blind_points, decode_points, hash_and_blind, hash_to_curve, BlindingScalar, GroupElement, PointBytes};
use crate::error::{PsiSumError, Result};
use crate::messages::{PsiSumResult, Round1Message, Round2Message, TaggedCiphertext};
use crate::paillier::{generate_keypair, Ciphertext};
use crate::state::{BlindedClient, Client, RespondedServer, Server};
use num_bigint::{BigInt, BigUint};
use num_traits::Zero;
use rand::seq::SliceRandom;
use rand::{CryptoRng, RngCore};
use rayon::prelude::*;
use std::collections::HashSet;
use tracing::{debug, info, instrument, warn};

impl Client {
    /// Round 1: blind the identifier set.
    ///
    /// Samples `k1` and a fresh Paillier key pair, computes `H(v)^k1` for
    /// every identifier and shuffles the result so its order says nothing
    /// about the input order.
    ///
    /// # Returns
    /// The client in its blinded state and the message for the server
    ///
    /// # Errors
    /// Returns `PsiSumError::InvalidConfig` if the config is unusable or the
    /// set exceeds `max_set_size`, and `PsiSumError::KeyGeneration` if no key
    /// pair could be generated.
    #[instrument(skip_all, fields(identifiers = self.identifiers.len()))]
    pub fn first_round<R: RngCore + CryptoRng>(
        self,
        config: &ProtocolConfig,
        rng: &mut R,
    ) -> Result<(BlindedClient, Round1Message)> {
        config.validate()?;
        if self.identifiers.len() > config.max_set_size {
            return Err(PsiSumError::InvalidConfig(format!(
                "identifier set of {} exceeds max_set_size {}",
                self.identifiers.len(),
                config.max_set_size
            )));
        }

        let scalar = BlindingScalar::random(rng);
        let (public_key, private_key) = generate_keypair(config, rng)?;
        debug!(bits = public_key.bits(), "generated Paillier key pair");

        let mut blinded: Vec<PointBytes> = hash_and_blind(&self.identifiers, &scalar)
            .iter()
            .map(GroupElement::to_bytes)
            .collect();
        blinded.shuffle(rng);

        info!(sent = blinded.len(), "round 1 complete");
        let state = BlindedClient {
            scalar,
            private_key,
            sent: blinded.len(),
            max_set_size: config.max_set_size,
        };
        Ok((state, Round1Message::new(blinded, public_key)))
    }
}

impl BlindedClient {
    /// Round 3: match and aggregate.
    ///
    /// Re-blinds each server point with `k1`; an entry matches when the
    /// result appears among the doubly-blinded points. Matching ciphertexts
    /// are folded into an accumulator seeded with a fresh encryption of zero,
    /// which is decrypted once. Ciphertexts of non-matching entries are
    /// never touched.
    ///
    /// # Errors
    /// - `PsiSumError::InvalidMessage` if the doubly-blinded set does not
    ///   match what was sent in round 1, or the server sent too many entries
    /// - `PsiSumError::InvalidPoint` if any received point is off the curve
    /// - `PsiSumError::Decryption` if a matching ciphertext is malformed
    #[instrument(skip_all, fields(entries = round2.tagged.len()))]
    pub fn third_round<R: RngCore + CryptoRng>(
        self,
        round2: Round2Message,
        rng: &mut R,
    ) -> Result<PsiSumResult> {
        if round2.double_blinded.len() != self.sent {
            warn!(
                expected = self.sent,
                received = round2.double_blinded.len(),
                "doubly-blinded set size mismatch"
            );
            return Err(PsiSumError::InvalidMessage(format!(
                "expected {} doubly-blinded points, received {}",
                self.sent,
                round2.double_blinded.len()
            )));
        }
        if round2.tagged.len() > self.max_set_size {
            warn!(received = round2.tagged.len(), "too many tagged ciphertexts");
            return Err(PsiSumError::InvalidMessage(format!(
                "{} tagged ciphertexts exceeds max_set_size {}",
                round2.tagged.len(),
                self.max_set_size
            )));
        }

        let lookup: HashSet<PointBytes> = decode_points(&round2.double_blinded)?
            .iter()
            .map(GroupElement::to_bytes)
            .collect();

        let scalar = &self.scalar;
        let is_member: Vec<bool> = round2
            .tagged
            .par_iter()
            .map(|entry| {
                GroupElement::from_bytes(&entry.point)
                    .map(|point| lookup.contains(&point.multiply(scalar).to_bytes()))
            })
            .collect::<Result<_>>()?;
        let matches: Vec<&Ciphertext> = round2
            .tagged
            .iter()
            .zip(is_member)
            .filter(|(_, member)| *member)
            .map(|(entry, _)| &entry.ciphertext)
            .collect();

        let public_key = self.private_key.public_key();
        for ciphertext in &matches {
            public_key.validate_ciphertext(ciphertext)?;
        }

        let seed = public_key.encrypt(&BigInt::zero(), rng)?;
        let accumulator = matches
            .iter()
            .fold(seed, |acc, ciphertext| public_key.add(&acc, ciphertext));
        let tag_sum = self.private_key.decrypt(&accumulator)?;

        info!(intersection_size = matches.len(), "round 3 complete");
        Ok(PsiSumResult::new(matches.len(), tag_sum))
    }
}

impl Server {
    /// Round 2: re-blind the client's set and encrypt the tagged dictionary.
    ///
    /// Samples `k2`, computes `a^k2` for every received point (order
    /// preserved) and `(H(w)^k2, Enc(t))` for every dictionary entry
    /// (order shuffled). Encryption nonces are drawn from `rng` up front so
    /// the exponentiations can run in parallel.
    ///
    /// # Errors
    /// - `PsiSumError::InvalidMessage` if the client sent too many points
    /// - `PsiSumError::InvalidPoint` if any received point is off the curve
    /// - `PsiSumError::Encoding` if a tag is out of range, or the tags sum to
    ///   at least the plaintext modulus and an intersection sum could wrap
    #[instrument(skip_all, fields(entries = self.dictionary.len(), received = round1.blinded.len()))]
    pub fn second_round<R: RngCore + CryptoRng>(
        self,
        round1: Round1Message,
        config: &ProtocolConfig,
        rng: &mut R,
    ) -> Result<(RespondedServer, Round2Message)> {
        config.validate()?;
        if self.dictionary.len() > config.max_set_size {
            return Err(PsiSumError::InvalidConfig(format!(
                "dictionary of {} exceeds max_set_size {}",
                self.dictionary.len(),
                config.max_set_size
            )));
        }
        if round1.blinded.len() > config.max_set_size {
            warn!(received = round1.blinded.len(), "too many blinded points");
            return Err(PsiSumError::InvalidMessage(format!(
                "{} blinded points exceeds max_set_size {}",
                round1.blinded.len(),
                config.max_set_size
            )));
        }

        let public_key = &round1.public_key;
        let received = decode_points(&round1.blinded)?;

        let plaintexts: Vec<BigUint> = self
            .dictionary
            .iter()
            .map(|(_, tag)| public_key.encode_plaintext(tag))
            .collect::<Result<_>>()?;
        let total: BigUint = plaintexts.iter().sum();
        if &total >= public_key.modulus() {
            warn!(bits = total.bits(), "tag total does not fit the plaintext modulus");
            return Err(PsiSumError::Encoding(format!(
                "sum of tags needs {} bits, modulus has {}",
                total.bits(),
                public_key.bits()
            )));
        }

        let scalar = BlindingScalar::random(rng);
        let nonces: Vec<BigUint> = (0..self.dictionary.len())
            .map(|_| public_key.sample_nonce(rng))
            .collect();

        let double_blinded: Vec<PointBytes> = blind_points(&received, &scalar)
            .iter()
            .map(GroupElement::to_bytes)
            .collect();

        let mut tagged: Vec<TaggedCiphertext> = self
            .dictionary
            .par_iter()
            .zip(plaintexts.par_iter())
            .zip(nonces.par_iter())
            .map(|(((identifier, _), plaintext), nonce)| {
                TaggedCiphertext::new(
                    hash_to_curve(identifier).multiply(&scalar).to_bytes(),
                    public_key.encrypt_with_nonce(plaintext, nonce),
                )
            })
            .collect();
        tagged.shuffle(rng);

        info!(
            double_blinded = double_blinded.len(),
            tagged = tagged.len(),
            "round 2 complete"
        );
        let state = RespondedServer {
            entries_answered: tagged.len(),
            points_received: double_blinded.len(),
        };
        Ok((state, Round2Message::new(double_blinded, tagged)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::POINT_LEN;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn test_config() -> ProtocolConfig {
        ProtocolConfig::new().with_key_bits(512).with_primality_rounds(20)
    }

    #[test]
    fn test_first_round_sends_one_point_per_identifier() {
        let mut rng = StdRng::seed_from_u64(1);
        let client = Client::new(vec!["apple", "banana", "cherry"]);
        let (state, msg) = client.first_round(&test_config(), &mut rng).unwrap();
        assert_eq!(msg.len(), 3);
        assert_eq!(state.sent(), 3);
        assert_eq!(msg.public_key.bits(), 512);
    }

    #[test]
    fn test_first_round_hides_raw_hashes() {
        let mut rng = StdRng::seed_from_u64(2);
        let client = Client::new(vec!["apple"]);
        let (_, msg) = client.first_round(&test_config(), &mut rng).unwrap();
        assert_ne!(msg.blinded[0], hash_to_curve("apple").to_bytes());
    }

    #[test]
    fn test_first_round_rejects_oversized_set() {
        let mut rng = StdRng::seed_from_u64(3);
        let client = Client::new(vec!["a", "b", "c"]);
        let config = test_config().with_max_set_size(2);
        let result = client.first_round(&config, &mut rng);
        assert!(matches!(result, Err(PsiSumError::InvalidConfig(_))));
    }

    #[test]
    fn test_second_round_preserves_received_order() {
        let mut rng = StdRng::seed_from_u64(4);
        let config = test_config();
        let (_, round1) = Client::new(vec!["a", "b", "c", "d"])
            .first_round(&config, &mut rng)
            .unwrap();
        let sent = round1.blinded.clone();
        let (responded, round2) = Server::new(vec![("a", 1)])
            .second_round(round1, &config, &mut rng)
            .unwrap();
        assert_eq!(responded.points_received(), 4);
        assert_eq!(responded.entries_answered(), 1);
        assert_eq!(round2.double_blinded.len(), sent.len());
        // re-blinding changes every point
        for (before, after) in sent.iter().zip(round2.double_blinded.iter()) {
            assert_ne!(before, after);
        }
    }

    #[test]
    fn test_second_round_rejects_invalid_point() {
        let mut rng = StdRng::seed_from_u64(5);
        let config = test_config();
        let (_, mut round1) = Client::new(vec!["a"]).first_round(&config, &mut rng).unwrap();
        round1.blinded.push(PointBytes([0x01; POINT_LEN]));
        let result = Server::new(vec![("a", 1)]).second_round(round1, &config, &mut rng);
        assert!(matches!(result, Err(PsiSumError::InvalidPoint(_))));
    }

    #[test]
    fn test_second_round_rejects_negative_tag() {
        let mut rng = StdRng::seed_from_u64(6);
        let config = test_config();
        let (_, round1) = Client::new(vec!["a"]).first_round(&config, &mut rng).unwrap();
        let result = Server::new(vec![("a", 3), ("b", -1)]).second_round(round1, &config, &mut rng);
        assert!(matches!(result, Err(PsiSumError::Encoding(_))));
    }

    #[test]
    fn test_second_round_rejects_wrapping_total() {
        let mut rng = StdRng::seed_from_u64(7);
        let config = test_config();
        let (_, round1) = Client::new(vec!["a"]).first_round(&config, &mut rng).unwrap();
        let n = BigInt::from(round1.public_key.modulus().clone());
        let half = &n / BigInt::from(2) + BigInt::from(1);
        let result = Server::new(vec![("a", half.clone()), ("b", half)])
            .second_round(round1, &config, &mut rng);
        assert!(matches!(result, Err(PsiSumError::Encoding(_))));
    }

    #[test]
    fn test_second_round_rejects_oversized_message() {
        let mut rng = StdRng::seed_from_u64(8);
        let (_, round1) = Client::new(vec!["a", "b", "c"])
            .first_round(&test_config(), &mut rng)
            .unwrap();
        let strict = test_config().with_max_set_size(2);
        let result = Server::new(vec![("a", 1)]).second_round(round1, &strict, &mut rng);
        assert!(matches!(result, Err(PsiSumError::InvalidMessage(_))));
    }

    #[test]
    fn test_third_round_rejects_size_mismatch() {
        let mut rng = StdRng::seed_from_u64(9);
        let config = test_config();
        let (client, round1) = Client::new(vec!["a", "b"]).first_round(&config, &mut rng).unwrap();
        let (_, mut round2) = Server::new(vec![("a", 1)])
            .second_round(round1, &config, &mut rng)
            .unwrap();
        round2.double_blinded.pop();
        let result = client.third_round(round2, &mut rng);
        assert!(matches!(result, Err(PsiSumError::InvalidMessage(_))));
    }

    #[test]
    fn test_third_round_rejects_invalid_tagged_point() {
        let mut rng = StdRng::seed_from_u64(10);
        let config = test_config();
        let (client, round1) = Client::new(vec!["a"]).first_round(&config, &mut rng).unwrap();
        let (_, mut round2) = Server::new(vec![("a", 1)])
            .second_round(round1, &config, &mut rng)
            .unwrap();
        round2.tagged[0].point = PointBytes([0x02; POINT_LEN]);
        let result = client.third_round(round2, &mut rng);
        assert!(matches!(result, Err(PsiSumError::InvalidPoint(_))));
    }

    #[test]
    fn test_third_round_rejects_tampered_matching_ciphertext() {
        let mut rng = StdRng::seed_from_u64(11);
        let config = test_config();
        let (client, round1) = Client::new(vec!["a"]).first_round(&config, &mut rng).unwrap();
        let (_, mut round2) = Server::new(vec![("a", 1)])
            .second_round(round1, &config, &mut rng)
            .unwrap();
        round2.tagged[0].ciphertext = Ciphertext(BigUint::zero());
        let result = client.third_round(round2, &mut rng);
        assert!(matches!(result, Err(PsiSumError::Decryption(_))));
    }

    #[test]
    fn test_third_round_rejects_matching_ciphertext_sharing_factor_with_n() {
        let mut rng = StdRng::seed_from_u64(13);
        let config = test_config();
        let (client, round1) = Client::new(vec!["a"]).first_round(&config, &mut rng).unwrap();
        let n = round1.public_key.modulus().clone();
        let (_, mut round2) = Server::new(vec![("a", 1)])
            .second_round(round1, &config, &mut rng)
            .unwrap();
        round2.tagged[0].ciphertext = Ciphertext(n);
        let result = client.third_round(round2, &mut rng);
        assert!(matches!(result, Err(PsiSumError::Decryption(_))));
    }

    #[test]
    fn test_third_round_rejects_too_many_tagged_entries() {
        let mut rng = StdRng::seed_from_u64(14);
        let client_config = test_config().with_max_set_size(2);
        let (client, round1) = Client::new(vec!["a"])
            .first_round(&client_config, &mut rng)
            .unwrap();
        let (_, round2) = Server::new(vec![("a", 1), ("b", 2), ("c", 3)])
            .second_round(round1, &test_config(), &mut rng)
            .unwrap();
        let result = client.third_round(round2, &mut rng);
        assert!(matches!(result, Err(PsiSumError::InvalidMessage(_))));
    }

    #[test]
    fn test_third_round_ignores_non_matching_ciphertexts() {
        let mut rng = StdRng::seed_from_u64(12);
        let config = test_config();
        let (client, round1) = Client::new(vec!["x"]).first_round(&config, &mut rng).unwrap();
        let (_, mut round2) = Server::new(vec![("a", 5), ("z", 9)])
            .second_round(round1, &config, &mut rng)
            .unwrap();
        // garbage on non-member entries is never examined
        for entry in round2.tagged.iter_mut() {
            entry.ciphertext = Ciphertext(BigUint::zero());
        }
        let result = client.third_round(round2, &mut rng).unwrap();
        assert_eq!(result, PsiSumResult::new(0, BigUint::zero()));
    }
}
