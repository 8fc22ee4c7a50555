// src/scanner.rs
use futures_util::stream::{self, Stream, StreamExt};
use std::collections::VecDeque;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::chain::Chain;
use crate::error::{ChainError, ScanError};
use crate::models::{BlockHeight, EventRecord, NftTransferEvent, TransferEvent};
use crate::parser;
use crate::progress::{NoProgress, ProgressSink};

/// Inclusive block range, `start <= end`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRange {
    start: BlockHeight,
    end: BlockHeight,
}

impl BlockRange {
    pub fn new(start: BlockHeight, end: BlockHeight) -> Result<Self, ScanError> {
        if start > end {
            return Err(ScanError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> BlockHeight {
        self.start
    }

    pub fn end(&self) -> BlockHeight {
        self.end
    }

    /// Progress total, `end - start`
    pub fn span(&self) -> u64 {
        self.end - self.start
    }
}

/// What to do when a single block cannot be queried
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Log the block as skipped and move on
    #[default]
    Skip,
    /// Surface the error and end the scan
    Abort,
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skip" => Ok(FailurePolicy::Skip),
            "abort" => Ok(FailurePolicy::Abort),
            other => Err(format!("unknown failure policy `{other}` (expected skip|abort)")),
        }
    }
}

/// Counters for a scanner's lifetime
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub blocks_scanned: u64,
    pub skipped_blocks: Vec<BlockHeight>,
    pub skipped_events: u64,
}

/// Walks block ranges and yields decoded transfer records.
///
/// Token decimals are fetched once in [`BlockScanner::new`] and reused for
/// every block this scanner visits.
pub struct BlockScanner<C> {
    chain: C,
    decimals: u32,
    policy: FailurePolicy,
    cancel: CancellationToken,
    progress: Arc<dyn ProgressSink>,
    stats: Mutex<ScanStats>,
}

struct ScanState {
    range: BlockRange,
    next: Option<BlockHeight>,
    pending: VecDeque<EventRecord>,
}

impl<C: Chain> BlockScanner<C> {
    pub async fn new(chain: C) -> Result<Self, ChainError> {
        let decimals = chain.token_decimals().await?;
        info!(decimals, "resolved token decimals");
        Ok(Self::with_decimals(chain, decimals))
    }

    pub fn with_decimals(chain: C, decimals: u32) -> Self {
        Self {
            chain,
            decimals,
            policy: FailurePolicy::default(),
            cancel: CancellationToken::new(),
            progress: Arc::new(NoProgress),
            stats: Mutex::new(ScanStats::default()),
        }
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    pub fn decimals(&self) -> u32 {
        self.decimals
    }

    pub fn chain(&self) -> &C {
        &self.chain
    }

    pub fn stats(&self) -> ScanStats {
        self.stats.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Lazily scan `range`, yielding every tracked record in block order.
    ///
    /// Under [`FailurePolicy::Skip`] failed blocks are logged and counted; under
    /// [`FailurePolicy::Abort`] the first failure is yielded and the stream ends.
    /// A lost connection always ends the stream with an error. Cancellation is
    /// checked between blocks and ends the stream without an error.
    pub fn records(
        &self,
        range: BlockRange,
    ) -> impl Stream<Item = Result<EventRecord, ScanError>> + '_ {
        let state = ScanState {
            range,
            next: Some(range.start),
            pending: VecDeque::new(),
        };

        stream::unfold(state, move |mut state| async move {
            loop {
                if let Some(record) = state.pending.pop_front() {
                    return Some((Ok(record), state));
                }

                let height = state.next?;
                if self.cancel.is_cancelled() {
                    info!(height, "scan cancelled");
                    state.next = None;
                    self.progress.finish();
                    return None;
                }
                state.next = (height < state.range.end).then_some(height + 1);

                match self.scan_block(height).await {
                    Ok(records) => state.pending.extend(records),
                    Err(err) => {
                        let fatal = matches!(err, ScanError::Connection(_));
                        if fatal || self.policy == FailurePolicy::Abort {
                            state.next = None;
                            self.progress.finish();
                            return Some((Err(err), state));
                        }
                        warn!(height, error = %err, "skipping block");
                        if let Ok(mut stats) = self.stats.lock() {
                            stats.skipped_blocks.push(height);
                        }
                    }
                }

                self.progress
                    .update(height - state.range.start, state.range.span());
                if state.next.is_none() {
                    self.progress.finish();
                }
            }
        })
    }

    pub fn transfers(
        &self,
        range: BlockRange,
    ) -> impl Stream<Item = Result<TransferEvent, ScanError>> + '_ {
        self.records(range).filter_map(|item| async move {
            match item {
                Ok(EventRecord::Transfer(t)) => Some(Ok(t)),
                Ok(EventRecord::NftTransfer(_)) => None,
                Err(e) => Some(Err(e)),
            }
        })
    }

    pub fn nft_transfers(
        &self,
        range: BlockRange,
    ) -> impl Stream<Item = Result<NftTransferEvent, ScanError>> + '_ {
        self.records(range).filter_map(|item| async move {
            match item {
                Ok(EventRecord::NftTransfer(t)) => Some(Ok(t)),
                Ok(EventRecord::Transfer(_)) => None,
                Err(e) => Some(Err(e)),
            }
        })
    }

    /// Push-style scan of fungible transfers
    pub async fn scan<F>(&self, range: BlockRange, mut on_transfer: F) -> Result<(), ScanError>
    where
        F: FnMut(TransferEvent),
    {
        let mut transfers = std::pin::pin!(self.transfers(range));
        while let Some(item) = transfers.next().await {
            on_transfer(item?);
        }
        Ok(())
    }

    /// Push-style scan of NFT transfers
    pub async fn scan_nft<F>(&self, range: BlockRange, mut on_transfer: F) -> Result<(), ScanError>
    where
        F: FnMut(NftTransferEvent),
    {
        let mut transfers = std::pin::pin!(self.nft_transfers(range));
        while let Some(item) = transfers.next().await {
            on_transfer(item?);
        }
        Ok(())
    }

    async fn scan_block(&self, height: BlockHeight) -> Result<Vec<EventRecord>, ScanError> {
        let query_failed = |source: ChainError| {
            if source.is_fatal() {
                ScanError::Connection(source)
            } else {
                ScanError::BlockQuery { height, source }
            }
        };

        let hash = self.chain.block_hash(height).await.map_err(query_failed)?;
        let events = self.chain.events(&hash).await.map_err(query_failed)?;

        let mut records = Vec::new();
        let mut skipped = 0;
        for event in &events {
            match parser::decode_event(event, height, self.decimals) {
                Ok(Some(record)) => records.push(record),
                Ok(None) => {}
                Err(err) => {
                    warn!(
                        height,
                        event = %event.qualified_name(),
                        error = %err,
                        "skipping undecodable event"
                    );
                    skipped += 1;
                }
            }
        }

        debug!(height, events = events.len(), matched = records.len(), "scanned block");
        if let Ok(mut stats) = self.stats.lock() {
            stats.blocks_scanned += 1;
            stats.skipped_events += skipped;
        }

        Ok(records)
    }
}
