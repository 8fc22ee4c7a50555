pub mod aggregator;
pub mod chain;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod models;
pub mod parser;
pub mod progress;
pub mod report;
pub mod rpc;
pub mod scanner;
pub mod store;

pub use aggregator::{Aggregator, KeyedCounter, StatsOrder};
pub use chain::{BlockHash, Chain, RawEvent};
pub use error::{AggregateError, ChainError, DecodeError, RowError, ScanError, StoreError};
pub use models::{
    Address, BlockHeight, CollectionId, EventRecord, InOutBoundStats, ItemId, NftTransferEvent,
    TransferEvent,
};
pub use scanner::{BlockRange, BlockScanner, FailurePolicy, ScanStats};
