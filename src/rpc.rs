// src/rpc.rs
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::chain::{BlockHash, Chain, RawEvent};
use crate::config::Config;
use crate::error::ChainError;
use crate::models::{Address, BlockHeight, CollectionId};

// Error first: an `Option` result would otherwise swallow error bodies.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RpcResponse<T> {
    Error { error: RpcErrorBody },
    Success { result: T },
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct Header {
    number: String, // hex
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SystemProperties {
    token_decimals: Option<Decimals>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Decimals {
    One(u32),
    Many(Vec<u32>),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SidecarBlock {
    #[serde(default)]
    on_initialize: SidecarHook,
    #[serde(default)]
    extrinsics: Vec<SidecarExtrinsic>,
    #[serde(default)]
    on_finalize: SidecarHook,
}

#[derive(Debug, Default, Deserialize)]
struct SidecarHook {
    #[serde(default)]
    events: Vec<SidecarEvent>,
}

#[derive(Debug, Deserialize)]
struct SidecarExtrinsic {
    #[serde(default)]
    events: Vec<SidecarEvent>,
}

#[derive(Debug, Deserialize)]
struct SidecarEvent {
    method: SidecarMethod,
    #[serde(default)]
    data: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct SidecarMethod {
    pallet: String,
    method: String,
}

#[derive(Debug, Deserialize)]
struct SidecarStorage {
    value: Option<Value>,
}

/// Node JSON-RPC plus Substrate API Sidecar for decoded events.
pub struct SubstrateClient {
    client: Client,
    node_url: String,
    sidecar_url: String,
    max_retries: u32,
    retry_pause: Duration,
    nft_pallet: String,
    nft_count_storage: String,
}

impl SubstrateClient {
    pub fn new(cfg: &Config) -> Result<Self, ChainError> {
        let client = Client::builder()
            .timeout(cfg.request_timeout)
            .build()
            .map_err(|e| ChainError::Connection {
                endpoint: cfg.node_url.clone(),
                details: e.to_string(),
            })?;

        Ok(Self {
            client,
            node_url: cfg.node_url.clone(),
            sidecar_url: cfg.sidecar_url.trim_end_matches('/').to_string(),
            max_retries: cfg.max_retries.max(1),
            retry_pause: Duration::from_secs(2),
            nft_pallet: cfg.nft_pallet.clone(),
            nft_count_storage: cfg.nft_count_storage.clone(),
        })
    }

    /// Build a client and check the node answers.
    ///
    /// Returns the finalized head read during the check alongside it.
    pub async fn connect(cfg: &Config) -> Result<(Self, BlockHeight), ChainError> {
        let client = Self::new(cfg)?;
        let head = client.finalized_height().await?;
        info!(node = %client.node_url, head, "connected to node");
        Ok((client, head))
    }

    pub fn with_retry_pause(mut self, pause: Duration) -> Self {
        self.retry_pause = pause;
        self
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T, ChainError> {
        let payload = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        debug!(%method, url = %self.node_url, "sending rpc request");
        let text = self
            .with_retries(
                || self.client.post(&self.node_url).json(&payload).send(),
                &self.node_url,
            )
            .await?;

        match serde_json::from_str::<RpcResponse<T>>(&text) {
            Ok(RpcResponse::Success { result }) => Ok(result),
            Ok(RpcResponse::Error { error }) => Err(ChainError::Rpc {
                code: error.code,
                message: error.message,
            }),
            Err(e) => Err(ChainError::response(format!("{method}: {e}"))),
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ChainError> {
        let url = format!("{}{}", self.sidecar_url, path);
        debug!(%url, "sending sidecar request");
        let text = self.with_retries(|| self.client.get(&url).send(), &url).await?;
        serde_json::from_str(&text).map_err(|e| ChainError::response(format!("{path}: {e}")))
    }

    // Retries timeouts and transport hiccups; refused connections and HTTP errors return at once.
    async fn with_retries<F, Fut>(&self, send: F, endpoint: &str) -> Result<String, ChainError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = reqwest::Result<reqwest::Response>>,
    {
        let mut attempt = 1;
        loop {
            let err = match send().await {
                Ok(resp) if resp.status() == StatusCode::OK => {
                    return resp.text().await.map_err(|e| ChainError::response(e.to_string()));
                }
                Ok(resp) => {
                    return Err(ChainError::Status {
                        status: resp.status().as_u16(),
                        endpoint: endpoint.to_string(),
                    })
                }
                Err(e) if e.is_connect() => {
                    return Err(ChainError::Connection {
                        endpoint: endpoint.to_string(),
                        details: e.to_string(),
                    })
                }
                Err(e) => e,
            };

            if attempt >= self.max_retries {
                return Err(if err.is_timeout() {
                    ChainError::Timeout {
                        endpoint: endpoint.to_string(),
                    }
                } else {
                    ChainError::response(err.to_string())
                });
            }

            warn!(attempt, %endpoint, error = %err, "request failed, retrying");
            tokio::time::sleep(self.retry_pause).await;
            attempt += 1;
        }
    }
}

fn parse_hex_u64(s: &str) -> Option<u64> {
    u64::from_str_radix(s.trim_start_matches("0x"), 16).ok()
}

fn parse_hash(s: &str) -> Result<BlockHash, ChainError> {
    BlockHash::from_hex(s).ok_or_else(|| ChainError::response(format!("invalid block hash `{s}`")))
}

#[async_trait]
impl Chain for SubstrateClient {
    async fn finalized_height(&self) -> Result<BlockHeight, ChainError> {
        let head: String = self.call("chain_getFinalizedHead", json!([])).await?;
        let header: Header = self.call("chain_getHeader", json!([head])).await?;
        parse_hex_u64(&header.number).ok_or_else(|| {
            ChainError::response(format!("invalid block number `{}`", header.number))
        })
    }

    async fn block_hash(&self, height: BlockHeight) -> Result<BlockHash, ChainError> {
        // null for heights the node does not have yet
        let hash: Option<String> = self.call("chain_getBlockHash", json!([height])).await?;
        match hash {
            Some(h) => parse_hash(&h),
            None => Err(ChainError::response(format!("no block at height {height}"))),
        }
    }

    async fn events(&self, block: &BlockHash) -> Result<Vec<RawEvent>, ChainError> {
        let block: SidecarBlock = self
            .get(&format!("/blocks/{block}?eventDocs=false&extrinsicDocs=false"))
            .await?;

        let events = block
            .on_initialize
            .events
            .into_iter()
            .chain(block.extrinsics.into_iter().flat_map(|x| x.events))
            .chain(block.on_finalize.events)
            .map(|e| RawEvent::new(e.method.pallet, e.method.method, e.data))
            .collect();
        Ok(events)
    }

    async fn token_decimals(&self) -> Result<u32, ChainError> {
        let props: SystemProperties = self.call("system_properties", json!([])).await?;
        match props.token_decimals {
            Some(Decimals::One(d)) => Ok(d),
            Some(Decimals::Many(all)) => all
                .first()
                .copied()
                .ok_or(ChainError::MissingProperty("tokenDecimals")),
            None => Err(ChainError::MissingProperty("tokenDecimals")),
        }
    }

    async fn account_item_count(
        &self,
        block: &BlockHash,
        collection: &CollectionId,
        address: &Address,
    ) -> Result<u64, ChainError> {
        let path = format!(
            "/pallets/{}/storage/{}?keys[]={}&keys[]={}&at={}",
            self.nft_pallet, self.nft_count_storage, collection, address, block
        );
        let storage: SidecarStorage = self.get(&path).await?;

        match storage.value {
            None | Some(Value::Null) => Ok(0),
            Some(Value::Number(n)) => n
                .as_u64()
                .ok_or_else(|| ChainError::response(format!("invalid item count {n}"))),
            Some(Value::String(s)) => s
                .parse()
                .ok()
                .or_else(|| parse_hex_u64(&s))
                .ok_or_else(|| ChainError::response(format!("invalid item count `{s}`"))),
            Some(other) => Err(ChainError::response(format!("invalid item count {other}"))),
        }
    }
}
