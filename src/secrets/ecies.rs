//! ECIES encryption to the DON public key.
//!
//! Byte-compatible with eccrypto as used by eth-crypto: secp256k1 ECDH,
//! SHA-512 of the shared x-coordinate split into an AES-256-CBC key and an
//! HMAC-SHA256 key, MAC over `iv || uncompressed ephemeral key || ciphertext`.
//! Serialized as `iv(16) || compressed ephemeral key(33) || mac(32) || ciphertext`.

use aes::Aes256;
use anyhow::{anyhow, Result};
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockEncryptMut, KeyIvInit};
use hmac::{Hmac, Mac};
use k256::ecdh::diffie_hellman;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::{PublicKey, SecretKey};
use rand::{CryptoRng, RngCore};
use sha2::{Digest, Sha256, Sha512};

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type HmacSha256 = Hmac<Sha256>;

const IV_LEN: usize = 16;
const KEY_LEN: usize = 32;

/// The DON's secp256k1 encryption key, as published by the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DonPublicKey(PublicKey);

impl DonPublicKey {
    /// Accepts the coordinator's raw 64-byte `x || y` form as well as
    /// SEC1 compressed (33) and uncompressed (65) encodings.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let key = if bytes.len() == 64 {
            let mut sec1 = Vec::with_capacity(65);
            sec1.push(0x04);
            sec1.extend_from_slice(bytes);
            PublicKey::from_sec1_bytes(&sec1)
        } else {
            PublicKey::from_sec1_bytes(bytes)
        };
        key.map(Self)
            .map_err(|_| anyhow!("Invalid DON public key ({} bytes)", bytes.len()))
    }
}

/// Encrypt `plaintext` so only the holder of the DON private key can read it.
pub fn encrypt<R: RngCore + CryptoRng>(
    rng: &mut R,
    recipient: &DonPublicKey,
    plaintext: &[u8],
) -> Result<Vec<u8>> {
    let ephemeral = SecretKey::random(rng);
    let ephemeral_public = ephemeral.public_key();

    let shared = diffie_hellman(ephemeral.to_nonzero_scalar(), recipient.0.as_affine());
    let derived = Sha512::digest(shared.raw_secret_bytes());
    let (enc_key, mac_key) = derived.split_at(KEY_LEN);

    let mut iv = [0u8; IV_LEN];
    rng.fill_bytes(&mut iv);

    let ciphertext = Aes256CbcEnc::new_from_slices(enc_key, &iv)
        .map_err(|e| anyhow!("AES key setup failed: {e}"))?
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext);

    let mut mac = HmacSha256::new_from_slice(mac_key).map_err(|e| anyhow!("HMAC key setup failed: {e}"))?;
    mac.update(&iv);
    mac.update(ephemeral_public.to_encoded_point(false).as_bytes());
    mac.update(&ciphertext);
    let tag = mac.finalize().into_bytes();

    let compressed = ephemeral_public.to_encoded_point(true);
    let mut out = Vec::with_capacity(IV_LEN + compressed.len() + tag.len() + ciphertext.len());
    out.extend_from_slice(&iv);
    out.extend_from_slice(compressed.as_bytes());
    out.extend_from_slice(&tag);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
