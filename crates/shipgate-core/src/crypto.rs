//! Envelope encryption for secret configuration values.
//!
//! Secret env values are encrypted with AES-256-GCM under a key derived
//! once per process from the long-lived master secret (Argon2id, fixed
//! application salt, 32-byte output). The wire envelope is three
//! colon-separated hex fields: `nonce:tag:ciphertext`.
//!
//! A fresh random 16-byte nonce is drawn for every encryption — nonce
//! reuse under one key breaks GCM confidentiality. Decryption authenticates
//! before releasing anything: a wrong key, flipped tag bit, or truncated
//! ciphertext yields [`CryptoError::Decryption`], never corrupted plaintext.

use aes_gcm::aead::consts::U16;
use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::aes::Aes256;
use aes_gcm::{AesGcm, Nonce};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::CryptoError;

/// AES-256-GCM with a 16-byte nonce (the envelope format carries the full
/// 128-bit nonce, matching the stored-data format this platform has always
/// used).
type EnvelopeCipher = AesGcm<Aes256, U16>;

const NONCE_LEN: usize = 16;
const TAG_LEN: usize = 16;
const KEY_LEN: usize = 32;

/// Application-fixed KDF salt. Changing this orphans every stored envelope.
const ENVELOPE_SALT: &[u8] = b"shipgate/envelope/v1";

/// The derived 256-bit envelope key. Zeroized on drop; derived once at
/// startup and passed explicitly — never re-read from the environment.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct EnvelopeKey([u8; KEY_LEN]);

impl EnvelopeKey {
    /// Derive the envelope key from the master secret.
    ///
    /// Deterministic: the same master secret always yields the same key, so
    /// `encrypt` and `decrypt` agree without persisting the key anywhere.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::KeyDerivation`] if Argon2 rejects the
    /// parameters or fails internally.
    pub fn derive(master_secret: &str) -> Result<Self, CryptoError> {
        let params = argon2::Params::new(64 * 1024, 3, 1, Some(KEY_LEN)).map_err(|e| {
            CryptoError::KeyDerivation {
                reason: e.to_string(),
            }
        })?;
        let argon2 =
            argon2::Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);

        let mut key = [0u8; KEY_LEN];
        argon2
            .hash_password_into(master_secret.as_bytes(), ENVELOPE_SALT, &mut key)
            .map_err(|e| CryptoError::KeyDerivation {
                reason: e.to_string(),
            })?;

        Ok(Self(key))
    }

    fn cipher(&self) -> Result<EnvelopeCipher, CryptoError> {
        EnvelopeCipher::new_from_slice(&self.0).map_err(|e| CryptoError::Encryption {
            reason: e.to_string(),
        })
    }
}

impl std::fmt::Debug for EnvelopeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvelopeKey").finish_non_exhaustive()
    }
}

/// Encrypt a plaintext string into the `nonce:tag:ciphertext` envelope.
///
/// # Errors
///
/// Returns [`CryptoError::Encryption`] if the AEAD operation fails.
pub fn encrypt(key: &EnvelopeKey, plaintext: &str) -> Result<String, CryptoError> {
    let cipher = key.cipher()?;
    let nonce = EnvelopeCipher::generate_nonce(&mut OsRng);

    // The AEAD output is ciphertext with the 16-byte tag appended.
    let sealed = cipher
        .encrypt(&nonce, plaintext.as_bytes())
        .map_err(|_| CryptoError::Encryption {
            reason: "AEAD seal failed".to_owned(),
        })?;
    let (body, tag) = sealed.split_at(sealed.len() - TAG_LEN);

    Ok(format!(
        "{}:{}:{}",
        hex::encode(nonce),
        hex::encode(tag),
        hex::encode(body)
    ))
}

/// Decrypt an envelope produced by [`encrypt`].
///
/// # Errors
///
/// - [`CryptoError::MalformedEnvelope`] if the input does not split into
///   exactly three hex fields of the right lengths.
/// - [`CryptoError::Decryption`] if authentication fails (wrong key,
///   tampered tag, truncated ciphertext).
pub fn decrypt(key: &EnvelopeKey, envelope: &str) -> Result<String, CryptoError> {
    let fields: Vec<&str> = envelope.split(':').collect();
    let [nonce_hex, tag_hex, body_hex] = fields.as_slice() else {
        return Err(CryptoError::MalformedEnvelope {
            reason: format!("expected 3 fields, got {}", fields.len()),
        });
    };

    let nonce = decode_field(nonce_hex, "nonce")?;
    let tag = decode_field(tag_hex, "tag")?;
    let body = decode_field(body_hex, "ciphertext")?;

    if nonce.len() != NONCE_LEN {
        return Err(CryptoError::MalformedEnvelope {
            reason: format!("nonce must be {NONCE_LEN} bytes, got {}", nonce.len()),
        });
    }
    if tag.len() != TAG_LEN {
        return Err(CryptoError::MalformedEnvelope {
            reason: format!("tag must be {TAG_LEN} bytes, got {}", tag.len()),
        });
    }

    let mut sealed = body;
    sealed.extend_from_slice(&tag);

    let cipher = key.cipher()?;
    let plaintext = cipher
        .decrypt(Nonce::<U16>::from_slice(&nonce), sealed.as_slice())
        .map_err(|_| CryptoError::Decryption)?;

    String::from_utf8(plaintext).map_err(|_| CryptoError::Decryption)
}

fn decode_field(field: &str, name: &str) -> Result<Vec<u8>, CryptoError> {
    hex::decode(field).map_err(|_| CryptoError::MalformedEnvelope {
        reason: format!("{name} is not valid hex"),
    })
}
