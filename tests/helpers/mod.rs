//! In-memory chain for integration tests

use async_trait::async_trait;
use neko_scan::{Address, BlockHash, BlockHeight, Chain, ChainError, CollectionId, RawEvent};
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Clone, Copy)]
#[allow(dead_code)]
pub enum Failure {
    Timeout,
    Connection,
}

#[derive(Default)]
pub struct MockChain {
    pub decimals: u32,
    pub head: BlockHeight,
    blocks: HashMap<BlockHeight, Vec<RawEvent>>,
    failures: HashMap<BlockHeight, Failure>,
    holdings: HashMap<(BlockHeight, String, String), u64>,
    pub decimals_calls: AtomicUsize,
    pub event_calls: AtomicUsize,
}

#[allow(dead_code)]
impl MockChain {
    pub fn new(decimals: u32) -> Self {
        Self {
            decimals,
            ..Default::default()
        }
    }

    pub fn with_block(mut self, height: BlockHeight, events: Vec<RawEvent>) -> Self {
        self.blocks.insert(height, events);
        self.head = self.head.max(height);
        self
    }

    pub fn with_failure(mut self, height: BlockHeight, failure: Failure) -> Self {
        self.failures.insert(height, failure);
        self
    }

    pub fn with_holding(
        mut self,
        height: BlockHeight,
        collection: &str,
        address: &str,
        count: u64,
    ) -> Self {
        self.holdings
            .insert((height, collection.to_string(), address.to_string()), count);
        self
    }

    fn height_of(hash: &BlockHash) -> BlockHeight {
        let text = hash.to_string();
        u64::from_str_radix(&text[text.len() - 16..], 16).unwrap_or(0)
    }
}

pub fn hash_for(height: BlockHeight) -> BlockHash {
    let mut bytes = [0u8; 32];
    bytes[24..].copy_from_slice(&height.to_be_bytes());
    BlockHash::new(bytes)
}

#[async_trait]
impl Chain for MockChain {
    async fn finalized_height(&self) -> Result<BlockHeight, ChainError> {
        Ok(self.head)
    }

    async fn block_hash(&self, height: BlockHeight) -> Result<BlockHash, ChainError> {
        match self.failures.get(&height) {
            Some(Failure::Timeout) => Err(ChainError::Timeout {
                endpoint: "mock".into(),
            }),
            Some(Failure::Connection) => Err(ChainError::Connection {
                endpoint: "mock".into(),
                details: "refused".into(),
            }),
            None => Ok(hash_for(height)),
        }
    }

    async fn events(&self, block: &BlockHash) -> Result<Vec<RawEvent>, ChainError> {
        self.event_calls.fetch_add(1, Ordering::SeqCst);
        let height = Self::height_of(block);
        Ok(self.blocks.get(&height).cloned().unwrap_or_default())
    }

    async fn token_decimals(&self) -> Result<u32, ChainError> {
        self.decimals_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.decimals)
    }

    async fn account_item_count(
        &self,
        block: &BlockHash,
        collection: &CollectionId,
        address: &Address,
    ) -> Result<u64, ChainError> {
        let key = (
            Self::height_of(block),
            collection.to_string(),
            address.to_string(),
        );
        Ok(self.holdings.get(&key).copied().unwrap_or(0))
    }
}

#[allow(dead_code)]
pub fn transfer(from: &str, to: &str, raw: &str) -> RawEvent {
    RawEvent::new("balances", "Transfer", vec![json!(from), json!(to), json!(raw)])
}

#[allow(dead_code)]
pub fn nft(collection: u32, item: u32, from: &str, to: &str) -> RawEvent {
    RawEvent::new(
        "uniques",
        "Transferred",
        vec![json!(collection), json!(item), json!(from), json!(to)],
    )
}

#[allow(dead_code)]
pub fn noise() -> RawEvent {
    RawEvent::new("system", "ExtrinsicSuccess", vec![json!({"weight": 1})])
}
