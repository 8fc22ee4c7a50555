use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::aggregator::StatsOrder;
use crate::models::BlockHeight;
use crate::scanner::FailurePolicy;

/// Transfer movers and NFT holdings reports for Substrate chains
#[derive(Parser, Debug)]
#[command(name = "neko", version, about)]
pub struct Cli {
    /// Node JSON-RPC URL (overrides NODE_URL)
    #[arg(short = 'u', long, global = true)]
    pub url: Option<String>,

    /// What to do when a block query fails (overrides FAILURE_POLICY)
    #[arg(long, value_enum, global = true)]
    pub policy: Option<PolicyArg>,

    /// Draw a progress bar instead of logging progress
    #[arg(long, global = true)]
    pub bar: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the latest finalized block height
    Head,
    /// Scan balance transfers into a CSV table
    Transfers {
        #[command(flatten)]
        range: RangeArgs,
        /// Output file, stdout when omitted
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Scan NFT transfers into a CSV table
    NftTransfers {
        #[command(flatten)]
        range: RangeArgs,
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Scan transfers and rank the biggest movers
    Movers {
        #[command(flatten)]
        range: RangeArgs,
        #[command(flatten)]
        rank: RankArgs,
    },
    /// Rank movers from a previously written transfer table
    Top {
        #[arg(short, long)]
        input: PathBuf,
        #[command(flatten)]
        rank: RankArgs,
    },
    /// Count NFTs received by target addresses in a collection
    NftReceived {
        #[command(flatten)]
        range: RangeArgs,
        #[command(flatten)]
        targets: TargetArgs,
    },
    /// Change in NFT holdings of target addresses between two blocks
    NftDiff {
        #[command(flatten)]
        range: RangeArgs,
        #[command(flatten)]
        targets: TargetArgs,
    },
}

#[derive(Args, Debug, Clone, Copy)]
pub struct RangeArgs {
    /// First block (inclusive)
    #[arg(short, long)]
    pub start: BlockHeight,
    /// Last block (inclusive), latest finalized when omitted
    #[arg(short, long)]
    pub end: Option<BlockHeight>,
}

#[derive(Args, Debug, Clone, Copy)]
pub struct RankArgs {
    #[arg(short = 'n', long, default_value_t = 10)]
    pub top: usize,
    #[arg(long, value_enum, default_value_t = OrderArg::Received)]
    pub order: OrderArg,
}

#[derive(Args, Debug, Clone)]
pub struct TargetArgs {
    #[arg(short, long)]
    pub collection: String,
    /// Address to report on, repeatable
    #[arg(short, long = "target", required = true)]
    pub targets: Vec<String>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyArg {
    Skip,
    Abort,
}

impl From<PolicyArg> for FailurePolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Skip => FailurePolicy::Skip,
            PolicyArg::Abort => FailurePolicy::Abort,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderArg {
    Received,
    Sent,
    NbReceived,
    NbSent,
}

impl From<OrderArg> for StatsOrder {
    fn from(arg: OrderArg) -> Self {
        match arg {
            OrderArg::Received => StatsOrder::Received,
            OrderArg::Sent => StatsOrder::Sent,
            OrderArg::NbReceived => StatsOrder::NbReceived,
            OrderArg::NbSent => StatsOrder::NbSent,
        }
    }
}
