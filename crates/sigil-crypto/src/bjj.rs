//! Schnorr signatures over the Baby JubJub curve.
//!
//! Signature layout: compressed `R` (32 bytes) ‖ `s` little-endian (32 bytes).
//! `c = H(R ‖ A ‖ m)`, `s = r + c·sk`, verified as `s·G == R + c·A`.

use ark_ec::{AffineRepr, CurveGroup};
use ark_ed_on_bn254::{EdwardsAffine, Fr};
use ark_ff::PrimeField;
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use std::sync::Arc;

use crate::error::CryptoError;
use crate::keys::{KeyId, KmsKeyType};
use crate::provider::{check_key_type, derive_secret, KeyProvider};
use crate::store::PrivateKeyStore;

pub const PUBLIC_KEY_LENGTH: usize = 32;
pub const SIGNATURE_LENGTH: usize = 64;

pub struct BjjProvider {
    store: Arc<dyn PrivateKeyStore>,
}

impl BjjProvider {
    pub fn new(store: Arc<dyn PrivateKeyStore>) -> Self {
        Self { store }
    }

    fn secret_scalar(&self, key_id: &KeyId) -> Result<Fr, CryptoError> {
        let secret = self.store.get(key_id)?;
        Ok(Fr::from_le_bytes_mod_order(&secret[..]))
    }
}

fn scalar_from_hash(parts: &[&[u8]]) -> Fr {
    let mut hasher = blake3::Hasher::new();
    for part in parts {
        hasher.update(part);
    }
    Fr::from_le_bytes_mod_order(hasher.finalize().as_bytes())
}

fn compress(point: &EdwardsAffine) -> Result<Vec<u8>, CryptoError> {
    let mut out = Vec::with_capacity(PUBLIC_KEY_LENGTH);
    point
        .serialize_compressed(&mut out)
        .map_err(|e| CryptoError::SigningError(e.to_string()))?;
    Ok(out)
}

fn decompress(bytes: &[u8]) -> Result<EdwardsAffine, CryptoError> {
    if bytes.len() != PUBLIC_KEY_LENGTH {
        return Err(CryptoError::InvalidKeyLength {
            expected: PUBLIC_KEY_LENGTH,
            actual: bytes.len(),
        });
    }
    EdwardsAffine::deserialize_compressed(bytes)
        .map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))
}

fn public_point(sk: &Fr) -> EdwardsAffine {
    (EdwardsAffine::generator() * sk).into_affine()
}

impl KeyProvider for BjjProvider {
    fn key_type(&self) -> KmsKeyType {
        KmsKeyType::BabyJubJub
    }

    fn new_key_from_seed(&self, seed: &[u8]) -> Result<KeyId, CryptoError> {
        let secret = derive_secret(seed);
        let sk = Fr::from_le_bytes_mod_order(&secret[..]);
        let key_id = KeyId::new(KmsKeyType::BabyJubJub, &compress(&public_point(&sk))?);
        self.store.import(&key_id, secret)?;
        tracing::debug!(key = %key_id, "bjj key created");
        Ok(key_id)
    }

    fn public_key(&self, key_id: &KeyId) -> Result<Vec<u8>, CryptoError> {
        check_key_type(key_id, KmsKeyType::BabyJubJub)?;
        // the handle already carries the compressed point
        self.store.get(key_id)?;
        key_id.public_key_bytes()
    }

    fn sign(&self, key_id: &KeyId, message: &[u8]) -> Result<Vec<u8>, CryptoError> {
        check_key_type(key_id, KmsKeyType::BabyJubJub)?;
        let sk = self.secret_scalar(key_id)?;
        let public = compress(&public_point(&sk))?;

        let mut sk_bytes = Vec::with_capacity(32);
        sk.serialize_compressed(&mut sk_bytes)
            .map_err(|e| CryptoError::SigningError(e.to_string()))?;
        let r = scalar_from_hash(&[sk_bytes.as_slice(), message]);
        let big_r = compress(&public_point(&r))?;

        let c = scalar_from_hash(&[big_r.as_slice(), public.as_slice(), message]);
        let s = r + c * sk;

        let mut signature = big_r;
        s.serialize_compressed(&mut signature)
            .map_err(|e| CryptoError::SigningError(e.to_string()))?;
        Ok(signature)
    }

    fn verify(
        &self,
        public_key: &[u8],
        message: &[u8],
        signature: &[u8],
    ) -> Result<bool, CryptoError> {
        verify(public_key, message, signature)
    }
}

/// Check a Baby JubJub Schnorr signature against a compressed public key.
pub fn verify(public_key: &[u8], message: &[u8], signature: &[u8]) -> Result<bool, CryptoError> {
    if signature.len() != SIGNATURE_LENGTH {
        return Err(CryptoError::InvalidSignature(format!(
            "expected {} bytes, got {}",
            SIGNATURE_LENGTH,
            signature.len()
        )));
    }
    let a = decompress(public_key)?;
    let big_r = match EdwardsAffine::deserialize_compressed(&signature[..32]) {
        Ok(p) => p,
        Err(_) => return Ok(false),
    };
    let s = match Fr::deserialize_compressed(&signature[32..]) {
        Ok(s) => s,
        Err(_) => return Ok(false),
    };
    let c = scalar_from_hash(&[&signature[..32], public_key, message]);

    Ok(EdwardsAffine::generator() * s == big_r.into_group() + a * c)
}
