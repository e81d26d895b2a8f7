//! Request-scoped signing keyring.
//!
//! A [`Keyring`] holds exactly one imported key under a random id. It is
//! created from the sealed key file for a single transaction and dropped as
//! soon as the signature exists; the secret scalar is zeroed on drop.

use anyhow::{anyhow, Context, Result};
use cosmrs::crypto::{secp256k1, PublicKey};
use cosmrs::AccountId;
use k256::ecdsa::{signature::Signer, Signature, SigningKey};
use tracing::debug;
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::keys::encryption::open_private_key;

pub struct Keyring {
    id: Uuid,
    signing_key: SigningKey,
    public_key: PublicKey,
}

impl Keyring {
    /// Opens a sealed key file with `passphrase` and imports the key.
    pub fn import(sealed: &[u8], passphrase: &str) -> Result<Self> {
        let sealed = std::str::from_utf8(sealed).context("Key file is not valid UTF-8")?;
        let key_hex = open_private_key(sealed, passphrase).context("Failed to unlock key file")?;
        Self::from_hex(&key_hex)
    }

    /// Imports an unsealed hex-encoded secp256k1 secret.
    pub fn from_hex(key_hex: &str) -> Result<Self> {
        let trimmed = key_hex.trim();
        let stripped = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        let bytes = Zeroizing::new(hex::decode(stripped).map_err(|_| anyhow!("Private key is not valid hex"))?);
        if bytes.len() != 32 {
            return Err(anyhow!("Private key must be 32 bytes, got {}", bytes.len()));
        }

        let signing_key =
            SigningKey::from_slice(&bytes).map_err(|e| anyhow!("Invalid secp256k1 private key: {}", e))?;
        let public_key = secp256k1::SigningKey::from_slice(&bytes)
            .map_err(|e| anyhow!("Invalid Cosmos private key bytes: {}", e))?
            .public_key();

        let id = Uuid::new_v4();
        debug!("Imported key into keyring {}", id);
        Ok(Self {
            id,
            signing_key,
            public_key,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// Bech32 address of the imported key under `prefix`.
    pub fn account_id(&self, prefix: &str) -> Result<AccountId> {
        self.public_key
            .account_id(prefix)
            .map_err(|e| anyhow!("Failed to derive bech32 address from key: {}", e))
    }

    /// ECDSA/SHA-256 signature over `message`, 64 bytes `r || s`, low-S.
    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        let signature: Signature = self.signing_key.sign(message);
        signature.to_bytes().to_vec()
    }
}

impl Drop for Keyring {
    fn drop(&mut self) {
        debug!("Discarding keyring {}", self.id);
    }
}
