//! Group arithmetic and identifier hashing for the PSI-Sum protocol.
//!
//! The group is secp256k1 (prime order, cofactor 1). Elements travel as
//! 64-byte `x ‖ y` big-endian encodings and are validated against the curve
//! equation when decoded.

use crate::error::{PsiSumError, Result};
use k256::elliptic_curve::ops::ReduceNonZero;
use k256::elliptic_curve::sec1::{FromEncodedPoint, ToEncodedPoint};
use k256::{AffinePoint, EncodedPoint, FieldBytes, NonZeroScalar, ProjectivePoint, Scalar, U256};
use rand::{CryptoRng, RngCore};
use rayon::prelude::*;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;

/// Width of one affine coordinate in bytes.
pub const COORDINATE_LEN: usize = 32;

/// Width of an encoded group element in bytes.
pub const POINT_LEN: usize = 2 * COORDINATE_LEN;

const HASH_TO_CURVE_DST: &[u8] = b"psi-sum/hash-to-curve/v1";

/// Fixed-width wire encoding of a group element: `x ‖ y`, big-endian.
///
/// The bytes are untrusted until passed through [`GroupElement::from_bytes`].
/// Equality of encodings is equality of points, so this type doubles as the
/// lookup key for matching.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PointBytes(pub [u8; POINT_LEN]);

impl PointBytes {
    /// Borrow the raw encoding.
    pub fn as_bytes(&self) -> &[u8; POINT_LEN] {
        &self.0
    }
}

impl fmt::Debug for PointBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PointBytes({})", hex::encode(&self.0[..8]))
    }
}

impl Serialize for PointBytes {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(self.0))
    }
}

impl<'de> Deserialize<'de> for PointBytes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        let raw = hex::decode(encoded).map_err(D::Error::custom)?;
        if raw.len() != POINT_LEN {
            return Err(D::Error::invalid_length(raw.len(), &"64 bytes"));
        }
        let mut bytes = [0u8; POINT_LEN];
        bytes.copy_from_slice(&raw);
        Ok(PointBytes(bytes))
    }
}

/// A non-identity point of the group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupElement(AffinePoint);

impl GroupElement {
    /// Decode and validate a point received from a peer.
    ///
    /// # Errors
    /// Returns `PsiSumError::InvalidPoint` if `(x, y)` does not satisfy the
    /// curve equation.
    pub fn from_bytes(bytes: &PointBytes) -> Result<Self> {
        let mut x = [0u8; COORDINATE_LEN];
        let mut y = [0u8; COORDINATE_LEN];
        x.copy_from_slice(&bytes.0[..COORDINATE_LEN]);
        y.copy_from_slice(&bytes.0[COORDINATE_LEN..]);
        let encoded =
            EncodedPoint::from_affine_coordinates(&FieldBytes::from(x), &FieldBytes::from(y), false);
        Option::<AffinePoint>::from(AffinePoint::from_encoded_point(&encoded))
            .map(GroupElement)
            .ok_or_else(|| {
                PsiSumError::InvalidPoint("coordinates do not satisfy the curve equation".to_string())
            })
    }

    /// Encode as `x ‖ y`, big-endian.
    pub fn to_bytes(&self) -> PointBytes {
        let encoded = self.0.to_encoded_point(false);
        let mut bytes = [0u8; POINT_LEN];
        // Both coordinates are present for every non-identity point.
        if let (Some(x), Some(y)) = (encoded.x(), encoded.y()) {
            bytes[..COORDINATE_LEN].copy_from_slice(x);
            bytes[COORDINATE_LEN..].copy_from_slice(y);
        }
        PointBytes(bytes)
    }

    /// Scalar multiplication, written `X^k` in multiplicative notation.
    ///
    /// The result is never the identity: the group has prime order and the
    /// scalar is non-zero.
    pub fn multiply(&self, scalar: &BlindingScalar) -> GroupElement {
        GroupElement(AffinePoint::from(ProjectivePoint::from(self.0) * scalar.as_scalar()))
    }

    /// Point addition.
    ///
    /// Returns `None` when the sum is the identity, i.e. `other == -self`.
    pub fn add(&self, other: &GroupElement) -> Option<GroupElement> {
        let sum = ProjectivePoint::from(self.0) + ProjectivePoint::from(other.0);
        if sum == ProjectivePoint::IDENTITY {
            return None;
        }
        Some(GroupElement(AffinePoint::from(sum)))
    }

    /// The standard base point.
    pub fn generator() -> GroupElement {
        GroupElement(AffinePoint::GENERATOR)
    }
}

/// A secret blinding exponent in `[1, n-1]`.
///
/// Sampled once per party per run. It cannot be serialised and its `Debug`
/// output is redacted.
#[derive(Clone)]
pub struct BlindingScalar(NonZeroScalar);

impl BlindingScalar {
    /// Sample a fresh scalar from a cryptographically secure RNG.
    pub fn random<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        BlindingScalar(NonZeroScalar::random(rng))
    }

    fn as_scalar(&self) -> &Scalar {
        self.0.as_ref()
    }
}

impl fmt::Debug for BlindingScalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BlindingScalar(<redacted>)")
    }
}

/// Hash an identifier to a non-zero scalar.
///
/// The SHA-256 digest of the domain tag followed by the identifier bytes is
/// reduced into `[1, n-1]`.
pub fn hash_identifier(identifier: &str) -> Scalar {
    let mut hasher = Sha256::new();
    hasher.update(HASH_TO_CURVE_DST);
    hasher.update(identifier.as_bytes());
    let digest: FieldBytes = hasher.finalize();
    <Scalar as ReduceNonZero<U256>>::reduce_nonzero_bytes(&digest)
}

/// Map an identifier deterministically onto the curve as `G · H(identifier)`.
///
/// The scalar is non-zero, so this never yields the identity and never
/// needs a retry.
pub fn hash_to_curve(identifier: &str) -> GroupElement {
    let scalar = hash_identifier(identifier);
    GroupElement(AffinePoint::from(ProjectivePoint::GENERATOR * scalar))
}

/// Hash and blind many identifiers in parallel.
///
/// # Returns
/// `hash_to_curve(id)^scalar` for each identifier, in input order.
pub fn hash_and_blind<S: AsRef<str> + Sync>(identifiers: &[S], scalar: &BlindingScalar) -> Vec<GroupElement> {
    identifiers
        .par_iter()
        .map(|identifier| hash_to_curve(identifier.as_ref()).multiply(scalar))
        .collect()
}

/// Blind many already-decoded points in parallel, preserving order.
pub fn blind_points(points: &[GroupElement], scalar: &BlindingScalar) -> Vec<GroupElement> {
    points.par_iter().map(|point| point.multiply(scalar)).collect()
}

/// Decode and validate a batch of points received from a peer.
///
/// # Errors
/// Returns `PsiSumError::InvalidPoint` if any point is off the curve.
pub fn decode_points(encoded: &[PointBytes]) -> Result<Vec<GroupElement>> {
    encoded.par_iter().map(GroupElement::from_bytes).collect()
}
