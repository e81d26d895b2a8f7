// src/config.rs

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{anyhow, Context, Result};

/// How the service talks to the node named in each request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Connectivity {
    /// Cosmos REST gateway (`/cosmos/auth/...`, `/cosmos/tx/...`)
    Rest,
    /// Tendermint JSON-RPC (`abci_query`, `broadcast_tx_sync`)
    Rpc,
}

impl FromStr for Connectivity {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rest" | "http" => Ok(Connectivity::Rest),
            "rpc" | "tendermint" => Ok(Connectivity::Rpc),
            other => Err(anyhow!("unknown connectivity mode '{}'", other)),
        }
    }
}

// A struct to hold all configuration, loaded once at startup from the .env file.
#[derive(Clone, Debug)]
pub struct Config {
    // Server settings
    pub bind_address: [u8; 4],
    pub port: u16,

    // Chain settings
    pub connectivity: Connectivity,
    /// Single denomination used for both the transfer and the fee.
    pub native_denom: String,
    /// Deadline applied to every outbound node call.
    pub request_timeout_secs: u64,

    // Key settings
    /// Directory holding one sealed key file per sender address.
    pub key_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: [127, 0, 0, 1],
            port: 8080,
            connectivity: Connectivity::Rest,
            native_denom: "uatom".to_string(),
            request_timeout_secs: 5,
            key_dir: PathBuf::from("."),
        }
    }
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        // Load variables from the .env file into the environment
        dotenvy::dotenv().ok();

        let defaults = Config::default();

        let bind_address = match env::var("BIND_ADDRESS") {
            Ok(raw) => parse_ipv4(&raw).context("BIND_ADDRESS must be an IPv4 address")?,
            Err(_) => defaults.bind_address,
        };

        let connectivity = match env::var("CHAIN_CONNECTIVITY") {
            Ok(raw) => raw.parse().context("CHAIN_CONNECTIVITY must be 'rest' or 'rpc'")?,
            Err(_) => defaults.connectivity,
        };

        let native_denom = env::var("NATIVE_DENOM").unwrap_or(defaults.native_denom);
        if native_denom.trim().is_empty() {
            return Err(anyhow!("NATIVE_DENOM must not be empty"));
        }

        Ok(Config {
            bind_address,
            port: env::var("PORT")
                .unwrap_or_else(|_| defaults.port.to_string())
                .parse()
                .context("PORT must be a valid number")?,
            connectivity,
            native_denom,
            request_timeout_secs: env::var("REQUEST_TIMEOUT_SECS")
                .unwrap_or_else(|_| defaults.request_timeout_secs.to_string())
                .parse()
                .context("REQUEST_TIMEOUT_SECS must be a valid number")?,
            key_dir: env::var("KEY_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.key_dir),
        })
    }
}

fn parse_ipv4(raw: &str) -> Result<[u8; 4]> {
    let addr: std::net::Ipv4Addr = raw.trim().parse()?;
    Ok(addr.octets())
}
