// Key material: sealed key files on disk and the per-request keyring.
pub mod encryption;
pub mod key_store;
pub mod keyring;

pub use key_store::KeyStore;
pub use keyring::Keyring;
