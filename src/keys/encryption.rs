// src/keys/encryption.rs

use aes_gcm::{
    aead::{Aead, OsRng},
    AeadCore, Aes256Gcm, KeyInit, Nonce,
};
use anyhow::{anyhow, Result};
use argon2::{
    password_hash::{PasswordHasher, SaltString},
    Argon2,
};
use base64::{engine::general_purpose, Engine as _};
use zeroize::Zeroizing;

const NONCE_LEN: usize = 12;

// Holds the AES key derived from the passphrase for one seal/open call.
pub struct SealingKey(Zeroizing<[u8; 32]>);

impl SealingKey {
    /// Derives a 256-bit key from a passphrase and salt using Argon2.
    pub fn new(passphrase: &str, salt: &SaltString) -> Result<Self> {
        let argon2 = Argon2::default();
        let key_hash = argon2
            .hash_password(passphrase.as_bytes(), salt)
            .map_err(|e| anyhow!("Argon2 key derivation failed: {}", e))?;

        let output = key_hash.hash.ok_or_else(|| anyhow!("Failed to get raw hash from Argon2"))?;
        let bytes = output.as_bytes();
        if bytes.len() != 32 {
            return Err(anyhow!("Argon2 produced a {}-byte key, expected 32", bytes.len()));
        }

        let mut key = Zeroizing::new([0u8; 32]);
        key.copy_from_slice(bytes);
        Ok(Self(key))
    }

    fn cipher(&self) -> Result<Aes256Gcm> {
        Aes256Gcm::new_from_slice(self.0.as_slice()).map_err(|e| anyhow!("Invalid AES key: {}", e))
    }

    /// Encrypts with a fresh random nonce. Output is `nonce (12 bytes) | ciphertext`.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher()?
            .encrypt(&nonce, plaintext)
            .map_err(|e| anyhow!("Encryption failed: {}", e))?;

        let mut result = nonce.to_vec();
        result.extend_from_slice(&ciphertext);
        Ok(result)
    }

    pub fn decrypt(&self, encrypted_data: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        if encrypted_data.len() < NONCE_LEN {
            return Err(anyhow!("Invalid encrypted data: too short to contain a nonce"));
        }

        let (nonce_bytes, ciphertext) = encrypted_data.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);

        self.cipher()?
            .decrypt(nonce, ciphertext)
            .map(Zeroizing::new)
            .map_err(|_| anyhow!("Decryption failed (likely incorrect passphrase)"))
    }
}

/// Seals a hex private key. The output format is "salt.payload", both Base64 encoded.
pub fn seal_private_key(private_key_hex: &str, passphrase: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);

    let key = SealingKey::new(passphrase, &salt)?;
    let encrypted_payload = key.encrypt(private_key_hex.trim().as_bytes())?;

    let salt_b64 = general_purpose::STANDARD_NO_PAD.encode(salt.as_str());
    let payload_b64 = general_purpose::STANDARD_NO_PAD.encode(encrypted_payload);

    Ok(format!("{}.{}", salt_b64, payload_b64))
}

/// Opens a sealed key file and returns the hex private key it contains.
pub fn open_private_key(sealed: &str, passphrase: &str) -> Result<Zeroizing<String>> {
    let (salt_b64, payload_b64) = sealed
        .trim()
        .split_once('.')
        .ok_or_else(|| anyhow!("Invalid sealed key format"))?;

    let salt_str = String::from_utf8(general_purpose::STANDARD_NO_PAD.decode(salt_b64)?)?;
    let salt = SaltString::from_b64(&salt_str).map_err(|e| anyhow!("Invalid salt format: {}", e))?;

    let encrypted_payload = general_purpose::STANDARD_NO_PAD.decode(payload_b64)?;

    let key = SealingKey::new(passphrase, &salt)?;
    let plaintext = key.decrypt(&encrypted_payload)?;

    let hex = std::str::from_utf8(&plaintext)
        .map_err(|_| anyhow!("Sealed key is not valid UTF-8"))?
        .to_string();
    Ok(Zeroizing::new(hex))
}
