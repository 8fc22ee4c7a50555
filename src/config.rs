use dotenvy::dotenv;
use eyre::{eyre, Result};
use std::{env, time::Duration};
use tracing::info;

use crate::scanner::FailurePolicy;

#[derive(Debug, Clone)]
pub struct Config {
    pub node_url: String,    // node JSON-RPC over HTTP
    pub sidecar_url: String, // decoded blocks and storage
    pub failure_policy: FailurePolicy,
    pub request_timeout: Duration,
    pub max_retries: u32,
    pub nft_pallet: String,
    pub nft_count_storage: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            node_url: "http://127.0.0.1:9933".to_string(),
            sidecar_url: "http://127.0.0.1:8080".to_string(),
            failure_policy: FailurePolicy::Skip,
            request_timeout: Duration::from_secs(15),
            max_retries: 3,
            nft_pallet: "uniques".to_string(),
            nft_count_storage: "AccountItemCount".to_string(),
        }
    }
}

pub fn load() -> Result<Config> {
    dotenv().ok();
    from_lookup(|key| env::var(key).ok())
}

/// Build a config from any key lookup; unset keys keep their defaults.
pub fn from_lookup<F>(lookup: F) -> Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    let defaults = Config::default();

    let node_url = lookup("NODE_URL")
        .or_else(|| lookup("SUBSTRATE_RPC")) // alias support
        .unwrap_or(defaults.node_url);

    let sidecar_url = lookup("SIDECAR_URL").unwrap_or(defaults.sidecar_url);

    let failure_policy = match lookup("FAILURE_POLICY") {
        Some(raw) => raw.parse().map_err(|e: String| eyre!(e))?,
        None => defaults.failure_policy,
    };

    let request_timeout = lookup("RPC_TIMEOUT_SECS")
        .and_then(|s| s.parse().ok())
        .map(Duration::from_secs)
        .unwrap_or(defaults.request_timeout);

    let max_retries = lookup("RPC_RETRIES")
        .and_then(|s| s.parse().ok())
        .unwrap_or(defaults.max_retries);

    let nft_pallet = lookup("NFT_PALLET").unwrap_or(defaults.nft_pallet);
    let nft_count_storage = lookup("NFT_COUNT_STORAGE").unwrap_or(defaults.nft_count_storage);

    let cfg = Config {
        node_url,
        sidecar_url,
        failure_policy,
        request_timeout,
        max_retries,
        nft_pallet,
        nft_count_storage,
    };

    info!("Loaded config: {:?}", cfg);

    Ok(cfg)
}
