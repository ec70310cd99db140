//! Symmetric encryption of checkpoint payloads
//!
//! Payloads are sealed with AES-256-GCM. Every blob is self-describing:
//!
//! ```text
//! magic        4 bytes  "CPK1"
//! fingerprint  8 bytes  BLAKE3(key)[..8]
//! iterations   4 bytes  u32 LE, number of sealed layers
//! content_hash 32 bytes BLAKE3(plaintext)
//! body         layer_n = nonce (12) || AES-GCM(layer_{n-1}), layer_0 = plaintext
//! ```
//!
//! The header is authenticated as associated data of every layer. A
//! fingerprint mismatch means the wrong key; anything else that fails to
//! open is corruption.

use crate::error::{Error, Result};
use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng, Payload},
    Aes256Gcm, Key, Nonce,
};
use std::fs;
use std::path::{Path, PathBuf};
use zeroize::{Zeroize, ZeroizeOnDrop};

const MAGIC: &[u8; 4] = b"CPK1";
const FINGERPRINT_LEN: usize = 8;
const HASH_LEN: usize = 32;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;
const HEADER_LEN: usize = MAGIC.len() + FINGERPRINT_LEN + 4 + HASH_LEN;

/// File extension of persisted keys
pub const KEY_EXTENSION: &str = "key";

/// 32 bytes of key material, wiped on drop
#[derive(Zeroize, ZeroizeOnDrop)]
struct KeyMaterial {
    key: [u8; 32],
}

/// Location of the key called `name` inside `dir`
///
/// Anything after the first `.` in `name` is dropped, so `crypt` and
/// `crypt.key` name the same file.
pub fn key_path(name: &str, dir: &Path) -> Result<PathBuf> {
    let stem = name.split('.').next().unwrap_or_default();
    if stem.is_empty() {
        return Err(Error::InvalidArgument(format!("invalid key name '{}'", name)));
    }
    Ok(dir.join(format!("{}.{}", stem, KEY_EXTENSION)))
}

/// Hex BLAKE3 digest of a payload, as recorded in checkpoint metadata
pub fn content_hash(content: &[u8]) -> String {
    blake3::hash(content).to_hex().to_string()
}

/// Generate new key material and persist it as hex at `dir/<name>.key`
pub fn generate_key(name: &str, dir: &Path, overwrite: bool) -> Result<PathBuf> {
    let path = key_path(name, dir)?;
    if path.exists() && !overwrite {
        return Err(Error::KeyExists(path));
    }

    let mut material = KeyMaterial { key: [0u8; 32] };
    material
        .key
        .copy_from_slice(Aes256Gcm::generate_key(&mut OsRng).as_slice());

    let mut encoded = hex::encode(material.key);
    let written = fs::write(&path, encoded.as_bytes());
    encoded.zeroize();
    written.map_err(|e| Error::from_io(e, &path))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o600))?;
    }

    tracing::info!(path = %path.display(), "Generated encryption key");
    Ok(path)
}

/// Encrypts and decrypts payloads with one project key
pub struct Crypt {
    #[allow(dead_code)]
    material: KeyMaterial,
    cipher: Aes256Gcm,
    fingerprint: [u8; FINGERPRINT_LEN],
    iterations: u32,
}

impl Crypt {
    /// Create from raw key bytes
    pub fn new(key: [u8; 32]) -> Self {
        let material = KeyMaterial { key };
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&material.key));

        let mut fingerprint = [0u8; FINGERPRINT_LEN];
        fingerprint.copy_from_slice(&blake3::hash(&material.key).as_bytes()[..FINGERPRINT_LEN]);

        Self {
            material,
            cipher,
            fingerprint,
            iterations: 1,
        }
    }

    /// Load a key written by [`generate_key`]
    pub fn from_key_file(path: &Path) -> Result<Self> {
        let mut encoded = fs::read_to_string(path).map_err(|e| Error::from_io(e, path))?;
        let decoded = hex::decode(encoded.trim());
        encoded.zeroize();

        let mut decoded = decoded
            .map_err(|_| Error::CorruptData(format!("malformed key file {}", path.display())))?;
        if decoded.len() != 32 {
            decoded.zeroize();
            return Err(Error::CorruptData(format!(
                "key in {} must be 32 bytes, got {}",
                path.display(),
                decoded.len()
            )));
        }

        let mut key = [0u8; 32];
        key.copy_from_slice(&decoded);
        decoded.zeroize();
        let crypt = Self::new(key);
        key.zeroize();
        Ok(crypt)
    }

    /// Seal payloads `iterations` times (at least once)
    pub fn with_iterations(mut self, iterations: u32) -> Self {
        self.iterations = iterations.max(1);
        self
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    /// Short hex identifier of the key, safe to log
    pub fn fingerprint(&self) -> String {
        hex::encode(self.fingerprint)
    }

    /// Encrypt a payload into a self-describing blob
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let mut header = Vec::with_capacity(HEADER_LEN);
        header.extend_from_slice(MAGIC);
        header.extend_from_slice(&self.fingerprint);
        header.extend_from_slice(&self.iterations.to_le_bytes());
        header.extend_from_slice(blake3::hash(plaintext).as_bytes());

        let mut body = plaintext.to_vec();
        for _ in 0..self.iterations {
            let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
            let sealed = self
                .cipher
                .encrypt(
                    &nonce,
                    Payload {
                        msg: &body,
                        aad: &header,
                    },
                )
                .map_err(|_| Error::CorruptData("encryption failed".into()))?;

            body.zeroize();
            body = Vec::with_capacity(NONCE_LEN + sealed.len());
            body.extend_from_slice(nonce.as_slice());
            body.extend_from_slice(&sealed);
        }

        header.extend_from_slice(&body);
        Ok(header)
    }

    /// Decrypt a blob produced by [`Crypt::encrypt`]
    pub fn decrypt(&self, blob: &[u8]) -> Result<Vec<u8>> {
        if blob.len() < HEADER_LEN || &blob[..MAGIC.len()] != MAGIC {
            return Err(Error::CorruptData("not an encrypted checkpoint payload".into()));
        }

        let header = &blob[..HEADER_LEN];
        let fingerprint = &header[MAGIC.len()..MAGIC.len() + FINGERPRINT_LEN];
        if fingerprint != self.fingerprint {
            tracing::warn!(
                expected = %self.fingerprint(),
                found = %hex::encode(fingerprint),
                "Payload was sealed with a different key"
            );
            return Err(Error::InvalidKey);
        }

        let iter_offset = MAGIC.len() + FINGERPRINT_LEN;
        let mut iterations = [0u8; 4];
        iterations.copy_from_slice(&header[iter_offset..iter_offset + 4]);
        let iterations = u32::from_le_bytes(iterations);
        let content_hash = &header[iter_offset + 4..HEADER_LEN];

        let mut body = blob[HEADER_LEN..].to_vec();
        for _ in 0..iterations {
            if body.len() < NONCE_LEN + TAG_LEN {
                return Err(Error::CorruptData("truncated payload".into()));
            }
            let (nonce, sealed) = body.split_at(NONCE_LEN);
            let opened = self
                .cipher
                .decrypt(
                    Nonce::from_slice(nonce),
                    Payload {
                        msg: sealed,
                        aad: header,
                    },
                )
                .map_err(|_| Error::CorruptData("payload failed authentication".into()))?;
            body = opened;
        }

        if blake3::hash(&body).as_bytes().as_slice() != content_hash {
            body.zeroize();
            return Err(Error::CorruptData("content hash mismatch".into()));
        }
        Ok(body)
    }

    /// Encrypt a file's content
    ///
    /// With `modify_file`, the file is rewritten in place with the blob,
    /// whose header carries the content hash of the original.
    pub fn encrypt_file(&self, path: &Path, modify_file: bool) -> Result<Vec<u8>> {
        let content = fs::read(path).map_err(|e| Error::from_io(e, path))?;
        let blob = self.encrypt(&content)?;
        if modify_file {
            fs::write(path, &blob).map_err(|e| Error::from_io(e, path))?;
        }
        Ok(blob)
    }

    /// Decrypt a file holding a blob; with `modify_file`, write the plaintext back
    pub fn decrypt_file(&self, path: &Path, modify_file: bool) -> Result<Vec<u8>> {
        let blob = fs::read(path).map_err(|e| Error::from_io(e, path))?;
        let content = self.decrypt(&blob)?;
        if modify_file {
            fs::write(path, &content).map_err(|e| Error::from_io(e, path))?;
        }
        Ok(content)
    }
}

impl std::fmt::Debug for Crypt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Crypt")
            .field("fingerprint", &self.fingerprint())
            .field("iterations", &self.iterations)
            .finish_non_exhaustive()
    }
}
