//! Additively homomorphic tag encryption (Paillier).
//!
//! With `g = n + 1`, encryption is `c = (1 + m·n) · rⁿ mod n²` and the
//! product of two ciphertexts decrypts to the sum of their plaintexts
//! modulo `n`. All arithmetic is on arbitrary-precision integers.

use crate::config::{ProtocolConfig, MIN_KEY_BITS};
use crate::error::{PsiSumError, Result};
use num_bigint::{BigInt, BigUint, RandBigInt, Sign};
use num_integer::Integer;
use num_traits::{One, Zero};
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use std::fmt;

const SMALL_PRIMES: [u32; 46] = [
    2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47, 53, 59, 61, 67, 71, 73, 79, 83, 89,
    97, 101, 103, 107, 109, 113, 127, 131, 137, 139, 149, 151, 157, 163, 167, 173, 179, 181, 191,
    193, 197, 199,
];

/// Paillier encryption key. Safe to share with the peer.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "PublicKeyRepr", into = "PublicKeyRepr")]
pub struct PaillierPublicKey {
    n: BigUint,
    n_squared: BigUint,
}

/// Only the modulus goes on the wire; `n²` is recomputed on receipt.
#[derive(Serialize, Deserialize)]
struct PublicKeyRepr {
    n: BigUint,
}

impl TryFrom<PublicKeyRepr> for PaillierPublicKey {
    type Error = PsiSumError;

    fn try_from(repr: PublicKeyRepr) -> Result<Self> {
        PaillierPublicKey::from_modulus(repr.n)
    }
}

impl From<PaillierPublicKey> for PublicKeyRepr {
    fn from(key: PaillierPublicKey) -> Self {
        PublicKeyRepr { n: key.n }
    }
}

impl fmt::Debug for PaillierPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaillierPublicKey")
            .field("bits", &self.n.bits())
            .finish()
    }
}

/// Paillier decryption key. Never leaves the client role.
pub struct PaillierPrivateKey {
    lambda: BigUint,
    mu: BigUint,
    public: PaillierPublicKey,
}

impl fmt::Debug for PaillierPrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PaillierPrivateKey(<redacted>)")
    }
}

/// A Paillier ciphertext, an element of `Z*_{n²}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ciphertext(pub BigUint);

impl PaillierPublicKey {
    /// Build a public key from a modulus received from the peer.
    ///
    /// # Errors
    /// Returns `PsiSumError::InvalidMessage` if `n` is even or shorter than
    /// [`MIN_KEY_BITS`].
    pub fn from_modulus(n: BigUint) -> Result<Self> {
        if n.bits() < MIN_KEY_BITS as u64 {
            return Err(PsiSumError::InvalidMessage(format!(
                "Paillier modulus has {} bits, need at least {}",
                n.bits(),
                MIN_KEY_BITS
            )));
        }
        if n.is_even() {
            return Err(PsiSumError::InvalidMessage(
                "Paillier modulus must be odd".to_string(),
            ));
        }
        let n_squared = &n * &n;
        Ok(Self { n, n_squared })
    }

    /// The plaintext modulus `n`.
    pub fn modulus(&self) -> &BigUint {
        &self.n
    }

    /// Bit length of `n`.
    pub fn bits(&self) -> u64 {
        self.n.bits()
    }

    /// Check that a tag is a valid plaintext.
    ///
    /// # Errors
    /// Returns `PsiSumError::Encoding` if `value` is negative or not below `n`.
    pub fn encode_plaintext(&self, value: &BigInt) -> Result<BigUint> {
        if value.sign() == Sign::Minus {
            return Err(PsiSumError::Encoding(format!(
                "plaintext must be non-negative, got {}",
                value
            )));
        }
        let magnitude = value.magnitude();
        if magnitude >= &self.n {
            return Err(PsiSumError::Encoding(format!(
                "plaintext of {} bits exceeds the {}-bit modulus",
                magnitude.bits(),
                self.n.bits()
            )));
        }
        Ok(magnitude.clone())
    }

    /// Draw an encryption nonce `r` uniform in `[1, n)` with `gcd(r, n) = 1`.
    pub fn sample_nonce<R: RngCore + CryptoRng>(&self, rng: &mut R) -> BigUint {
        let one = BigUint::one();
        loop {
            let r = rng.gen_biguint_range(&one, &self.n);
            if r.gcd(&self.n).is_one() {
                return r;
            }
        }
    }

    /// Encrypt an already-encoded plaintext with an explicit nonce.
    ///
    /// Lets callers draw nonces sequentially and exponentiate in parallel.
    pub fn encrypt_with_nonce(&self, plaintext: &BigUint, nonce: &BigUint) -> Ciphertext {
        let g_m = (BigUint::one() + plaintext * &self.n) % &self.n_squared;
        let r_n = nonce.modpow(&self.n, &self.n_squared);
        Ciphertext((g_m * r_n) % &self.n_squared)
    }

    /// Encrypt a non-negative integer.
    ///
    /// # Errors
    /// Returns `PsiSumError::Encoding` if `value` is out of range.
    pub fn encrypt<R: RngCore + CryptoRng>(&self, value: &BigInt, rng: &mut R) -> Result<Ciphertext> {
        let plaintext = self.encode_plaintext(value)?;
        let nonce = self.sample_nonce(rng);
        Ok(self.encrypt_with_nonce(&plaintext, &nonce))
    }

    /// Homomorphic addition: the result decrypts to `a + b mod n`.
    pub fn add(&self, a: &Ciphertext, b: &Ciphertext) -> Ciphertext {
        Ciphertext((&a.0 * &b.0) % &self.n_squared)
    }

    /// Check that a received ciphertext lies in `Z*_{n²}`.
    ///
    /// # Errors
    /// Returns `PsiSumError::Decryption` if it is zero, not below `n²`, or
    /// shares a factor with `n`.
    pub fn validate_ciphertext(&self, ciphertext: &Ciphertext) -> Result<()> {
        if ciphertext.0.is_zero() || ciphertext.0 >= self.n_squared {
            return Err(PsiSumError::Decryption(
                "ciphertext out of range".to_string(),
            ));
        }
        if !ciphertext.0.gcd(&self.n).is_one() {
            return Err(PsiSumError::Decryption(
                "ciphertext is not a unit modulo n".to_string(),
            ));
        }
        Ok(())
    }
}

impl PaillierPrivateKey {
    /// The matching public key.
    pub fn public_key(&self) -> &PaillierPublicKey {
        &self.public
    }

    /// Decrypt a ciphertext.
    ///
    /// # Errors
    /// Returns `PsiSumError::Decryption` if the ciphertext is malformed.
    pub fn decrypt(&self, ciphertext: &Ciphertext) -> Result<BigUint> {
        self.public.validate_ciphertext(ciphertext)?;
        let n = &self.public.n;
        let u = ciphertext.0.modpow(&self.lambda, &self.public.n_squared);
        let l = (u - BigUint::one()) / n;
        Ok((l * &self.mu) % n)
    }
}

/// Generate a fresh key pair of `config.key_bits` bits.
///
/// # Errors
/// Returns `PsiSumError::InvalidConfig` for unusable parameters and
/// `PsiSumError::KeyGeneration` if no prime is found within the candidate
/// budget.
pub fn generate_keypair<R: RngCore + CryptoRng>(
    config: &ProtocolConfig,
    rng: &mut R,
) -> Result<(PaillierPublicKey, PaillierPrivateKey)> {
    config.validate()?;
    let prime_bits = config.key_bits / 2;

    let p = generate_prime(prime_bits, config.primality_rounds, rng)?;
    let mut q = generate_prime(prime_bits, config.primality_rounds, rng)?;
    while q == p {
        q = generate_prime(prime_bits, config.primality_rounds, rng)?;
    }

    let one = BigUint::one();
    let n = &p * &q;
    let p_minus_one = &p - &one;
    let q_minus_one = &q - &one;
    if !n.gcd(&(&p_minus_one * &q_minus_one)).is_one() {
        return Err(PsiSumError::KeyGeneration(
            "gcd(n, (p-1)(q-1)) != 1".to_string(),
        ));
    }

    let lambda = p_minus_one.lcm(&q_minus_one);
    let mu = (&lambda % &n).modinv(&n).ok_or_else(|| {
        PsiSumError::KeyGeneration("lambda is not invertible modulo n".to_string())
    })?;

    let public = PaillierPublicKey::from_modulus(n)?;
    let private = PaillierPrivateKey {
        lambda,
        mu,
        public: public.clone(),
    };
    Ok((public, private))
}

/// Random prime with exactly `bits` bits and the top two bits set.
fn generate_prime<R: RngCore + CryptoRng>(bits: usize, rounds: usize, rng: &mut R) -> Result<BigUint> {
    let one = BigUint::one();
    let mask = (&one << (bits - 1)) | (&one << (bits - 2)) | &one;
    for _ in 0..bits * 64 {
        let candidate = rng.gen_biguint(bits as u64) | &mask;
        if is_probable_prime(&candidate, rounds, rng) {
            return Ok(candidate);
        }
    }
    Err(PsiSumError::KeyGeneration(format!(
        "no {}-bit prime found",
        bits
    )))
}

/// Trial division by small primes followed by Miller-Rabin.
fn is_probable_prime<R: RngCore + CryptoRng>(n: &BigUint, rounds: usize, rng: &mut R) -> bool {
    let one = BigUint::one();
    let two = BigUint::from(2u32);
    if *n < two {
        return false;
    }
    for &small in SMALL_PRIMES.iter() {
        let small = BigUint::from(small);
        if *n == small {
            return true;
        }
        if (n % &small).is_zero() {
            return false;
        }
    }

    let n_minus_one = n - &one;
    let s = n_minus_one.trailing_zeros().unwrap_or(0);
    let d = &n_minus_one >> s;

    'witness: for _ in 0..rounds {
        let a = rng.gen_biguint_range(&two, &n_minus_one);
        let mut x = a.modpow(&d, n);
        if x == one || x == n_minus_one {
            continue;
        }
        for _ in 1..s {
            x = (&x * &x) % n;
            if x == n_minus_one {
                continue 'witness;
            }
        }
        return false;
    }
    true
}
