// src/lib.rs

use std::sync::Arc;

use anyhow::Result;

pub mod api;
pub mod blockchain;
pub mod command;
pub mod config;
pub mod keys;
pub mod utils;

/// Application state shared across all request handlers
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: config::Config,
    /// Node client for the configured connectivity mode
    pub chain_client: Arc<dyn blockchain::client::ChainClient>,
    /// Read-only directory of sealed sender keys
    pub key_store: keys::KeyStore,
}

impl AppState {
    pub fn new(config: config::Config) -> Result<Self> {
        let chain_client = blockchain::client::create_chain_client(&config)?;
        let key_store = keys::KeyStore::new(config.key_dir.clone());
        Ok(Self {
            config,
            chain_client,
            key_store,
        })
    }
}
