// src/chain.rs
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;

use crate::error::ChainError;
use crate::models::{Address, BlockHeight, CollectionId};

/// 32-byte block hash
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockHash([u8; 32]);

impl BlockHash {
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Parse a `0x`-prefixed (or bare) hex string
    pub fn from_hex(s: &str) -> Option<Self> {
        let bytes = hex::decode(s.trim_start_matches("0x")).ok()?;
        let bytes: [u8; 32] = bytes.try_into().ok()?;
        Some(Self(bytes))
    }
}

impl fmt::Display for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

/// An event as decoded by the chain, before classification.
#[derive(Debug, Clone, PartialEq)]
pub struct RawEvent {
    pub section: String,
    pub method: String,
    pub data: Vec<Value>,
}

impl RawEvent {
    pub fn new(section: impl Into<String>, method: impl Into<String>, data: Vec<Value>) -> Self {
        Self {
            section: section.into(),
            method: method.into(),
            data,
        }
    }

    /// `"<section>.<method>"`
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.section, self.method)
    }
}

/// Point-in-time queries against a chain.
///
/// Every call may fail with a connectivity or timeout error; callers decide
/// through [`ChainError::is_fatal`] whether the session survives it.
#[async_trait]
pub trait Chain: Send + Sync {
    /// Latest finalized block height
    async fn finalized_height(&self) -> Result<BlockHeight, ChainError>;

    async fn block_hash(&self, height: BlockHeight) -> Result<BlockHash, ChainError>;

    /// Events of a block in the chain's native order
    async fn events(&self, block: &BlockHash) -> Result<Vec<RawEvent>, ChainError>;

    /// Decimals of the native token
    async fn token_decimals(&self) -> Result<u32, ChainError>;

    /// Number of items `address` holds in `collection` at `block`
    async fn account_item_count(
        &self,
        block: &BlockHash,
        collection: &CollectionId,
        address: &Address,
    ) -> Result<u64, ChainError>;
}

#[async_trait]
impl<C: Chain + ?Sized> Chain for &C {
    async fn finalized_height(&self) -> Result<BlockHeight, ChainError> {
        (**self).finalized_height().await
    }

    async fn block_hash(&self, height: BlockHeight) -> Result<BlockHash, ChainError> {
        (**self).block_hash(height).await
    }

    async fn events(&self, block: &BlockHash) -> Result<Vec<RawEvent>, ChainError> {
        (**self).events(block).await
    }

    async fn token_decimals(&self) -> Result<u32, ChainError> {
        (**self).token_decimals().await
    }

    async fn account_item_count(
        &self,
        block: &BlockHash,
        collection: &CollectionId,
        address: &Address,
    ) -> Result<u64, ChainError> {
        (**self).account_item_count(block, collection, address).await
    }
}
