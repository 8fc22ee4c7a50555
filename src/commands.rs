use eyre::{Result, WrapErr};
use futures_util::StreamExt;
use std::collections::HashSet;
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::aggregator::{Aggregator, StatsOrder};
use crate::chain::Chain;
use crate::cli::{RangeArgs, RankArgs, TargetArgs};
use crate::models::{Address, BlockHeight, CollectionId};
use crate::progress::{BarProgress, LogProgress, ProgressSink};
use crate::report;
use crate::scanner::{BlockRange, BlockScanner, FailurePolicy, ScanStats};
use crate::store::{self, NftWriter, TransferWriter};

/// Shared settings for scanning commands
pub struct ScanContext {
    pub policy: FailurePolicy,
    pub cancel: CancellationToken,
    pub bar: bool,
}

impl ScanContext {
    async fn scanner<C: Chain>(&self, chain: C, range: BlockRange) -> Result<BlockScanner<C>> {
        let progress: Arc<dyn ProgressSink> = if self.bar {
            Arc::new(BarProgress::new(range.span()))
        } else {
            Arc::new(LogProgress::new(100))
        };

        let scanner = BlockScanner::new(chain)
            .await
            .wrap_err("failed to resolve token decimals")?
            .with_policy(self.policy)
            .with_cancellation(self.cancel.clone())
            .with_progress(progress);
        Ok(scanner)
    }
}

/// Blocks to scan; an open end stops at `head`, the finalized height.
pub fn resolve_range(args: RangeArgs, head: BlockHeight) -> Result<BlockRange> {
    Ok(BlockRange::new(args.start, args.end.unwrap_or(head))?)
}

fn output(out: Option<&Path>) -> Result<Box<dyn Write>> {
    Ok(match out {
        Some(path) => Box::new(
            File::create(path).wrap_err_with(|| format!("cannot create {}", path.display()))?,
        ),
        None => Box::new(io::stdout().lock()),
    })
}

fn log_stats(stats: &ScanStats) {
    info!(
        blocks = stats.blocks_scanned,
        skipped_blocks = stats.skipped_blocks.len(),
        skipped_events = stats.skipped_events,
        "scan finished"
    );
    if !stats.skipped_blocks.is_empty() {
        warn!(heights = ?stats.skipped_blocks, "blocks skipped, results are incomplete");
    }
}

pub async fn transfers<C: Chain>(
    ctx: &ScanContext,
    chain: C,
    range: BlockRange,
    out: Option<&Path>,
) -> Result<()> {
    let scanner = ctx.scanner(chain, range).await?;
    let mut writer = TransferWriter::new(output(out)?);
    let mut count = 0u64;

    let mut stream = std::pin::pin!(scanner.transfers(range));
    let outcome = loop {
        match stream.next().await {
            Some(Ok(t)) => {
                writer.write(&t)?;
                count += 1;
            }
            Some(Err(e)) => break Err(e),
            None => break Ok(()),
        }
    };

    // rows already emitted stay valid even if the scan stopped early
    writer.finish()?.flush()?;
    info!(count, "wrote transfers");
    log_stats(&scanner.stats());
    Ok(outcome?)
}

pub async fn nft_transfers<C: Chain>(
    ctx: &ScanContext,
    chain: C,
    range: BlockRange,
    out: Option<&Path>,
) -> Result<()> {
    let scanner = ctx.scanner(chain, range).await?;
    let mut writer = NftWriter::new(output(out)?);
    let mut count = 0u64;

    let mut stream = std::pin::pin!(scanner.nft_transfers(range));
    let outcome = loop {
        match stream.next().await {
            Some(Ok(t)) => {
                writer.write(&t)?;
                count += 1;
            }
            Some(Err(e)) => break Err(e),
            None => break Ok(()),
        }
    };

    writer.finish()?.flush()?;
    info!(count, "wrote NFT transfers");
    log_stats(&scanner.stats());
    Ok(outcome?)
}

fn print_ranking(aggregator: &Aggregator, rank: RankArgs) {
    let order = StatsOrder::from(rank.order);
    for (i, (address, stats)) in aggregator
        .export_sorted(rank.top, |a, b| order.compare(a, b))
        .iter()
        .enumerate()
    {
        println!("{:>3}. {} {}", i + 1, address, stats);
    }
}

pub async fn movers<C: Chain>(
    ctx: &ScanContext,
    chain: C,
    range: BlockRange,
    rank: RankArgs,
) -> Result<()> {
    let scanner = ctx.scanner(chain, range).await?;
    let mut aggregator = Aggregator::new();
    let mut refused = 0u64;

    let outcome = scanner
        .scan(range, |transfer| {
            if let Err(e) = aggregator.register(&transfer) {
                warn!(block = transfer.block, error = %e, "transfer left out of totals");
                refused += 1;
            }
        })
        .await;
    if let Err(e) = &outcome {
        error!(error = %e, "scan stopped, ranking partial results");
    }

    log_stats(&scanner.stats());
    if refused > 0 {
        warn!(refused, "transfers left out of totals");
    }
    print_ranking(&aggregator, rank);
    Ok(outcome?)
}

pub fn top(input: &Path, rank: RankArgs) -> Result<()> {
    let file = File::open(input).wrap_err_with(|| format!("cannot open {}", input.display()))?;
    let mut aggregator = Aggregator::new();

    let summary = store::replay_transfers(file, &mut aggregator)?;
    print_ranking(&aggregator, rank);
    println!("rows: {}, skipped: {}", summary.rows, summary.skipped);
    Ok(())
}

pub async fn nft_received<C: Chain>(
    ctx: &ScanContext,
    chain: C,
    range: BlockRange,
    targets: &TargetArgs,
) -> Result<()> {
    let scanner = ctx.scanner(chain, range).await?;
    let collection = CollectionId::new(targets.collection.clone());
    let wanted: HashSet<Address> = targets
        .targets
        .iter()
        .map(|t| Address::from(t.as_str()))
        .collect();

    let (counts, err) =
        report::receive_counts(scanner.nft_transfers(range), &collection, &wanted).await;
    log_stats(&scanner.stats());

    for target in &targets.targets {
        let address = Address::from(target.as_str());
        println!("{} {}", address, counts.get(&address));
    }
    println!("total {}", counts.total());

    match err {
        Some(e) => Err(e).wrap_err("scan stopped, counts are partial"),
        None => Ok(()),
    }
}

pub async fn nft_diff<C: Chain>(chain: &C, range: BlockRange, targets: &TargetArgs) -> Result<()> {
    let collection = CollectionId::new(targets.collection.clone());
    let addresses: Vec<Address> = targets
        .targets
        .iter()
        .map(|t| Address::from(t.as_str()))
        .collect();

    let diff = report::nft_diff(chain, range.start(), range.end(), &collection, &addresses)
        .await
        .wrap_err("holdings query failed")?;

    for delta in &diff.deltas {
        println!(
            "{} {} -> {} ({:+})",
            delta.address,
            delta.before,
            delta.after,
            delta.delta()
        );
    }
    println!("total {:+}", diff.total);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_range_ends_at_head() {
        let range = resolve_range(RangeArgs { start: 10, end: None }, 500).unwrap();
        assert_eq!((range.start(), range.end()), (10, 500));
    }

    #[test]
    fn explicit_end_wins_over_head() {
        let range = resolve_range(RangeArgs { start: 10, end: Some(20) }, 500).unwrap();
        assert_eq!((range.start(), range.end()), (10, 20));
    }

    #[test]
    fn start_past_head_is_rejected() {
        assert!(resolve_range(RangeArgs { start: 600, end: None }, 500).is_err());
    }
}
