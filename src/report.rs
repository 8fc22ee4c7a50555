// src/report.rs
use futures_util::{Stream, StreamExt};
use std::collections::HashSet;
use tracing::{debug, info};

use crate::aggregator::KeyedCounter;
use crate::chain::Chain;
use crate::error::{ChainError, ScanError};
use crate::models::{Address, BlockHeight, CollectionId, NftTransferEvent};

/// Holdings change of one address between two heights
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HoldingDelta {
    pub address: Address,
    pub before: u64,
    pub after: u64,
}

impl HoldingDelta {
    /// Signed change; wide enough for any pair of `u64` counts.
    pub fn delta(&self) -> i128 {
        i128::from(self.after) - i128::from(self.before)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NftDiff {
    pub collection: CollectionId,
    pub deltas: Vec<HoldingDelta>,
    pub total: i128,
}

/// Item count of `address` in `collection` at `height`
pub async fn count_at<C: Chain>(
    chain: &C,
    height: BlockHeight,
    collection: &CollectionId,
    address: &Address,
) -> Result<u64, ChainError> {
    let hash = chain.block_hash(height).await?;
    chain.account_item_count(&hash, collection, address).await
}

/// Per-target change in holdings between `start` and `end`, in target order.
pub async fn nft_diff<C: Chain>(
    chain: &C,
    start: BlockHeight,
    end: BlockHeight,
    collection: &CollectionId,
    targets: &[Address],
) -> Result<NftDiff, ChainError> {
    let start_hash = chain.block_hash(start).await?;
    let end_hash = chain.block_hash(end).await?;

    let mut deltas = Vec::with_capacity(targets.len());
    let mut total = 0i128;
    for address in targets {
        let before = chain
            .account_item_count(&start_hash, collection, address)
            .await?;
        let after = chain
            .account_item_count(&end_hash, collection, address)
            .await?;

        let delta = HoldingDelta {
            address: address.clone(),
            before,
            after,
        };
        debug!(%address, before, after, "holdings delta");
        total += delta.delta();
        deltas.push(delta);
    }

    info!(%collection, start, end, %total, "computed holdings diff");
    Ok(NftDiff {
        collection: collection.clone(),
        deltas,
        total,
    })
}

/// Receipts per target for one collection.
///
/// Consumes the stream until it ends or yields an error; on error the
/// counts gathered so far are returned alongside it.
pub async fn receive_counts<S>(
    transfers: S,
    collection: &CollectionId,
    targets: &HashSet<Address>,
) -> (KeyedCounter<Address>, Option<ScanError>)
where
    S: Stream<Item = Result<NftTransferEvent, ScanError>>,
{
    let mut counts = KeyedCounter::new();
    let mut transfers = std::pin::pin!(transfers);

    while let Some(item) = transfers.next().await {
        match item {
            Ok(t) if &t.collection == collection && targets.contains(&t.to) => {
                debug!(to = %t.to, item = %t.item, block = t.block, "received item");
                counts.increment(&t.to);
            }
            Ok(_) => {}
            Err(err) => return (counts, Some(err)),
        }
    }

    (counts, None)
}
