// src/blockchain/mod.rs

pub mod client;
pub use client::ChainClient;

pub mod models;
pub mod registry;
pub mod rest_client;
pub mod rpc_client;
pub mod services;
