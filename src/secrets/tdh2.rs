//! TDH2 threshold encryption to the DON's shared key.
//!
//! Hybrid scheme: the payload is sealed with a fresh AES-256-GCM key, and
//! that key is TDH2-encrypted on P-256 so that a quorum of DON nodes must
//! cooperate to recover it. Output is the JSON shape the DON nodes parse:
//! `{"TDH2Ctxt": base64(json), "SymCtxt": base64(ct || tag), "Nonce": base64}`.
//!
//! Points are hashed as `"P256,x1,y1,x2,y2,..."` with decimal coordinates.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use alloy::primitives::U256;
use anyhow::{anyhow, bail, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use p256::elliptic_curve::bigint::U256 as ScalarUint;
use p256::elliptic_curve::ops::Reduce;
use p256::elliptic_curve::sec1::{Coordinates, ToEncodedPoint};
use p256::elliptic_curve::{Field, PrimeField};
use p256::{ProjectivePoint, PublicKey, Scalar};
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

const GROUP_NAME: &str = "P256";
/// Size of the TDH2-encrypted message and of its label.
const INPUT_LEN: usize = 32;
const NONCE_LEN: usize = 12;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct PublicKeyJson {
    #[serde(rename = "Group")]
    group: String,
    #[serde(rename = "G_bar")]
    g_bar: String,
    #[serde(rename = "H")]
    h: String,
}

#[derive(Serialize, Deserialize)]
struct Tdh2Ciphertext {
    #[serde(rename = "Group")]
    group: String,
    #[serde(rename = "C")]
    c: String,
    #[serde(rename = "Label")]
    label: String,
    #[serde(rename = "U")]
    u: String,
    #[serde(rename = "U_bar")]
    u_bar: String,
    #[serde(rename = "E")]
    e: String,
    #[serde(rename = "F")]
    f: String,
}

#[derive(Serialize, Deserialize)]
struct HybridCiphertext {
    #[serde(rename = "TDH2Ctxt")]
    tdh2_ctxt: String,
    #[serde(rename = "SymCtxt")]
    sym_ctxt: String,
    #[serde(rename = "Nonce")]
    nonce: String,
}

// ---------------------------------------------------------------------------
// Public key
// ---------------------------------------------------------------------------

/// The DON's threshold key, published by the coordinator as JSON bytes.
#[derive(Debug, Clone)]
pub struct ThresholdPublicKey {
    g_bar: ProjectivePoint,
    h: ProjectivePoint,
}

impl ThresholdPublicKey {
    /// Parse `{"Group":"P256","G_bar":..,"H":..,"HArray":[..]}`. Per-node
    /// shares in `HArray` are only needed for decryption and are ignored.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let parsed: PublicKeyJson =
            serde_json::from_slice(bytes).context("Threshold public key is not valid JSON")?;
        if parsed.group != GROUP_NAME {
            bail!("Unsupported threshold key group '{}'", parsed.group);
        }
        Ok(Self {
            g_bar: decode_point(&parsed.g_bar).context("Invalid G_bar")?,
            h: decode_point(&parsed.h).context("Invalid H")?,
        })
    }
}

fn decode_point(b64: &str) -> Result<ProjectivePoint> {
    let raw = BASE64.decode(b64).context("Point is not valid base64")?;
    PublicKey::from_sec1_bytes(&raw)
        .map(|p| p.to_projective())
        .map_err(|_| anyhow!("Point is not on P-256"))
}

fn encode_point(point: &ProjectivePoint) -> String {
    BASE64.encode(point.to_affine().to_encoded_point(false).as_bytes())
}

// ---------------------------------------------------------------------------
// Hashing
// ---------------------------------------------------------------------------

fn concatenate(points: &[&ProjectivePoint]) -> Result<String> {
    let mut out = String::from(GROUP_NAME);
    for point in points {
        let encoded = point.to_affine().to_encoded_point(false);
        match encoded.coordinates() {
            Coordinates::Uncompressed { x, y } => {
                out.push(',');
                out.push_str(&U256::from_be_slice(x).to_string());
                out.push(',');
                out.push_str(&U256::from_be_slice(y).to_string());
            }
            _ => bail!("Cannot hash the point at infinity"),
        }
    }
    Ok(out)
}

fn hash1(point: &ProjectivePoint) -> Result<[u8; INPUT_LEN]> {
    let mut hasher = Sha256::new();
    hasher.update(b"tdh2hash1");
    hasher.update(concatenate(&[point])?.as_bytes());
    Ok(hasher.finalize().into())
}

fn hash2(c: &[u8], label: &[u8], points: [&ProjectivePoint; 4]) -> Result<Scalar> {
    let mut hasher = Sha256::new();
    hasher.update(b"tdh2hash2");
    hasher.update(c);
    hasher.update(label);
    hasher.update(concatenate(&points)?.as_bytes());
    Ok(<Scalar as Reduce<ScalarUint>>::reduce_bytes(&hasher.finalize()))
}

fn xor(a: &[u8; INPUT_LEN], b: &[u8]) -> Vec<u8> {
    a.iter().zip(b).map(|(x, y)| x ^ y).collect()
}

// ---------------------------------------------------------------------------
// Encryption
// ---------------------------------------------------------------------------

/// TDH2-encrypt a 32-byte message under a 32-byte label.
fn tdh2_encrypt<R: RngCore + CryptoRng>(
    rng: &mut R,
    key: &ThresholdPublicKey,
    msg: &[u8; INPUT_LEN],
    label: &[u8; INPUT_LEN],
) -> Result<String> {
    let r = Scalar::random(&mut *rng);
    let s = Scalar::random(&mut *rng);

    let c = xor(&hash1(&(key.h * r))?, msg);
    let u = ProjectivePoint::GENERATOR * r;
    let w = ProjectivePoint::GENERATOR * s;
    let u_bar = key.g_bar * r;
    let w_bar = key.g_bar * s;
    let e = hash2(&c, label, [&u, &w, &u_bar, &w_bar])?;
    let f = s + r * e;

    serde_json::to_string(&Tdh2Ciphertext {
        group: GROUP_NAME.to_string(),
        c: BASE64.encode(&c),
        label: BASE64.encode(label),
        u: encode_point(&u),
        u_bar: encode_point(&u_bar),
        e: BASE64.encode(e.to_repr()),
        f: BASE64.encode(f.to_repr()),
    })
    .context("Failed to serialize TDH2 ciphertext")
}

/// Seal `plaintext` for the DON as a whole.
pub fn encrypt<R: RngCore + CryptoRng>(
    rng: &mut R,
    key: &ThresholdPublicKey,
    plaintext: &[u8],
) -> Result<String> {
    let mut sym_key = [0u8; INPUT_LEN];
    rng.fill_bytes(&mut sym_key);
    let mut nonce = [0u8; NONCE_LEN];
    rng.fill_bytes(&mut nonce);

    let sym_ctxt = Aes256Gcm::new_from_slice(&sym_key)
        .map_err(|e| anyhow!("AES-GCM key setup failed: {e}"))?
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|_| anyhow!("AES-GCM encryption failed"))?;

    let tdh2_ctxt = tdh2_encrypt(rng, key, &sym_key, &[0u8; INPUT_LEN])?;

    serde_json::to_string(&HybridCiphertext {
        tdh2_ctxt: BASE64.encode(tdh2_ctxt.as_bytes()),
        sym_ctxt: BASE64.encode(&sym_ctxt),
        nonce: BASE64.encode(nonce),
    })
    .context("Failed to serialize threshold ciphertext")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
