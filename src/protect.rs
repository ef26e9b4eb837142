//! Credential protection for connection descriptors.
//!
//! Protected text uses the envelope `ENCRYPTED:<base64(iv || ciphertext)>`:
//! AES-256-CBC with PKCS#7 padding, a fresh random 16-byte IV per call, and
//! the SHA-256 digest of the caller's key as the cipher key. The prefix is
//! matched case-insensitively. Both directions are idempotent: protecting
//! tagged text and unprotecting untagged text return the input unchanged.
//!
//! The envelope carries no authentication tag. Tampered ciphertext usually
//! fails padding or UTF-8 checks, which surface as [`DbError::Decryption`].

use crate::error::{DbError, DbResult};
use aes::Aes256;
use aes::cipher::block_padding::Pkcs7;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use base64::{Engine, engine::general_purpose::STANDARD};
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::borrow::Cow;
use tracing::debug;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// Marker prefix of protected text.
pub const ENVELOPE_PREFIX: &str = "ENCRYPTED:";

/// Descriptor field names treated as passwords (case-insensitive).
pub const PASSWORD_FIELDS: &[&str] = &["password", "pwd"];

const IV_LEN: usize = 16;
const BLOCK_LEN: usize = 16;

/// True when `text` starts with the envelope prefix, ignoring case.
pub fn is_encrypted(text: &str) -> bool {
    text.get(..ENVELOPE_PREFIX.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(ENVELOPE_PREFIX))
}

/// Protect `plaintext` with `key`.
///
/// Returns the input unchanged when it is already protected.
pub fn encrypt(plaintext: &str, key: &str) -> DbResult<String> {
    if plaintext.is_empty() {
        return Err(DbError::invalid_input("Text to encrypt cannot be empty"));
    }
    require_key(key)?;
    if is_encrypted(plaintext) {
        return Ok(plaintext.to_string());
    }

    let mut iv = [0u8; IV_LEN];
    rand::thread_rng().fill_bytes(&mut iv);

    let cipher = Aes256CbcEnc::new_from_slices(&derive_key(key), &iv)
        .map_err(|e| DbError::internal(format!("Cipher initialisation failed: {}", e)))?;
    let ciphertext = cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());

    let mut payload = Vec::with_capacity(IV_LEN + ciphertext.len());
    payload.extend_from_slice(&iv);
    payload.extend_from_slice(&ciphertext);
    Ok(format!("{}{}", ENVELOPE_PREFIX, STANDARD.encode(payload)))
}

/// Recover the plaintext of protected text.
///
/// Returns the input unchanged when it is not protected. A wrong key or a
/// corrupted envelope fails with [`DbError::Decryption`].
pub fn decrypt(text: &str, key: &str) -> DbResult<String> {
    require_key(key)?;
    if !is_encrypted(text) {
        return Ok(text.to_string());
    }

    let encoded = text[ENVELOPE_PREFIX.len()..].trim();
    let payload = STANDARD.decode(encoded).map_err(|e| {
        debug!(error = %e, "Envelope is not valid base64");
        DbError::Decryption
    })?;
    if payload.len() < IV_LEN + BLOCK_LEN || (payload.len() - IV_LEN) % BLOCK_LEN != 0 {
        debug!(len = payload.len(), "Envelope has an invalid length");
        return Err(DbError::Decryption);
    }

    let (iv, ciphertext) = payload.split_at(IV_LEN);
    let cipher =
        Aes256CbcDec::new_from_slices(&derive_key(key), iv).map_err(|_| DbError::Decryption)?;
    let plaintext = cipher
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| DbError::Decryption)?;
    String::from_utf8(plaintext).map_err(|_| DbError::Decryption)
}

/// Protect the value of every password field in a `key=value;` descriptor.
///
/// Every other byte of the descriptor is preserved. Empty and already
/// protected values are left as they are.
pub fn encrypt_password(descriptor: &str, key: &str) -> DbResult<String> {
    require_key(key)?;
    transform_password_fields(descriptor, |value| {
        if is_encrypted(value) {
            Ok(None)
        } else {
            encrypt(value, key).map(Some)
        }
    })
}

/// Inverse of [`encrypt_password`].
pub fn decrypt_password(descriptor: &str, key: &str) -> DbResult<String> {
    require_key(key)?;
    transform_password_fields(descriptor, |value| {
        if is_encrypted(value) {
            decrypt(value, key).map(Some)
        } else {
            Ok(None)
        }
    })
}

/// True when any password field of the descriptor holds protected text.
pub fn has_protected_password(descriptor: &str) -> bool {
    descriptor
        .split(';')
        .filter_map(password_value)
        .any(|value| is_encrypted(value.trim()))
}

fn require_key(key: &str) -> DbResult<()> {
    if key.is_empty() {
        return Err(DbError::invalid_input("Protection key cannot be empty"));
    }
    Ok(())
}

fn derive_key(key: &str) -> [u8; 32] {
    Sha256::digest(key.as_bytes()).into()
}

/// Raw value of a `password=`/`pwd=` segment, everything after the first '='.
fn password_value(segment: &str) -> Option<&str> {
    let (name, value) = segment.split_once('=')?;
    let name = name.trim();
    PASSWORD_FIELDS
        .iter()
        .any(|field| name.eq_ignore_ascii_case(field))
        .then_some(value)
}

fn transform_password_fields<F>(descriptor: &str, transform: F) -> DbResult<String>
where
    F: Fn(&str) -> DbResult<Option<String>>,
{
    let segments = descriptor
        .split(';')
        .map(|segment| transform_segment(segment, &transform))
        .collect::<DbResult<Vec<_>>>()?;
    Ok(segments.join(";"))
}

fn transform_segment<'a, F>(segment: &'a str, transform: &F) -> DbResult<Cow<'a, str>>
where
    F: Fn(&str) -> DbResult<Option<String>>,
{
    let Some(raw) = password_value(segment) else {
        return Ok(Cow::Borrowed(segment));
    };
    let value = raw.trim();
    if value.is_empty() {
        return Ok(Cow::Borrowed(segment));
    }

    match transform(value)? {
        Some(replacement) => {
            let name_end = segment.len() - raw.len();
            let lead = &raw[..raw.len() - raw.trim_start().len()];
            let trail = &raw[raw.trim_end().len()..];
            Ok(Cow::Owned(format!(
                "{}{}{}{}",
                &segment[..name_end],
                lead,
                replacement,
                trail
            )))
        }
        None => Ok(Cow::Borrowed(segment)),
    }
}
