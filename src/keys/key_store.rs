// src/keys/key_store.rs

use std::io;
use std::path::{Component, Path, PathBuf};

use zeroize::Zeroizing;

/// Read-only directory of sealed key files, one per sender address.
#[derive(Debug, Clone)]
pub struct KeyStore {
    dir: PathBuf,
}

impl KeyStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File holding the key for `sender`. Anything but a single plain file
    /// name is refused so a request cannot point outside the key directory.
    pub fn path_for(&self, sender: &str) -> io::Result<PathBuf> {
        let mut components = Path::new(sender).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(name)), None) => Ok(self.dir.join(name)),
            _ => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("'{}' is not a key file name", sender),
            )),
        }
    }

    /// Reads the raw key file for `sender`.
    pub async fn read(&self, sender: &str) -> io::Result<Zeroizing<Vec<u8>>> {
        let path = self.path_for(sender)?;
        tokio::fs::read(&path).await.map(Zeroizing::new)
    }
}
