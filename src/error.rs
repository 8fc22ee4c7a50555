use crate::models::{Address, BlockHeight};
use thiserror::Error;

/// Failures talking to the node or the sidecar.
#[derive(Debug, Error)]
pub enum ChainError {
    /// The endpoint could not be reached at all. Fatal for a session.
    #[error("cannot connect to {endpoint}: {details}")]
    Connection { endpoint: String, details: String },

    #[error("request to {endpoint} timed out")]
    Timeout { endpoint: String },

    #[error("HTTP {status} from {endpoint}")]
    Status { status: u16, endpoint: String },

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("unexpected response: {details}")]
    Response { details: String },

    #[error("chain does not expose property `{0}`")]
    MissingProperty(&'static str),
}

impl ChainError {
    pub fn response(details: impl Into<String>) -> Self {
        ChainError::Response {
            details: details.into(),
        }
    }

    /// Whether the session is unusable after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ChainError::Connection { .. })
    }
}

/// Errors surfaced by the block scanner stream.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("chain connection lost: {0}")]
    Connection(#[source] ChainError),

    #[error("query for block {height} failed: {source}")]
    BlockQuery {
        height: BlockHeight,
        #[source]
        source: ChainError,
    },

    #[error("invalid block range {start}..={end}")]
    InvalidRange { start: BlockHeight, end: BlockHeight },
}

/// A classified event whose payload has the wrong shape.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("{event}: missing field #{index}")]
    MissingField { event: &'static str, index: usize },

    #[error("{event}: field #{index} is not a valid {expected}")]
    InvalidField {
        event: &'static str,
        index: usize,
        expected: &'static str,
    },

    #[error("amount {raw} with {decimals} decimals does not fit a decimal")]
    AmountOutOfRange { raw: u128, decimals: u32 },
}

/// A transfer the aggregator refused; totals are left untouched.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AggregateError {
    #[error("adding {amount} to {side} total of {address} overflows")]
    Overflow {
        address: Address,
        side: &'static str,
        amount: rust_decimal::Decimal,
    },
}

/// A persisted row that cannot be replayed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RowError {
    #[error("expected {expected} columns, found {found}")]
    ColumnCount { expected: usize, found: usize },

    #[error("invalid block height `{0}`")]
    InvalidBlock(String),

    #[error("invalid amount `{0}`")]
    InvalidAmount(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
