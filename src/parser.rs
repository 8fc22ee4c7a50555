// src/parser.rs
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde_json::Value;

use crate::chain::RawEvent;
use crate::error::DecodeError;
use crate::models::{
    Address, BlockHeight, CollectionId, EventRecord, ItemId, NftTransferEvent, TransferEvent,
};

/// `balances.Transfer(from, to, amount)`
pub const TRANSFER_SIGNATURE: (&str, &str) = ("balances", "Transfer");

/// `uniques.Transferred(collection, item, from, to)`
pub const NFT_TRANSFERRED_SIGNATURE: (&str, &str) = ("uniques", "Transferred");

/// Event kinds the scanner understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Transfer,
    NftTransferred,
    Other,
}

impl EventKind {
    pub fn classify(event: &RawEvent) -> Self {
        match (event.section.as_str(), event.method.as_str()) {
            s if s == TRANSFER_SIGNATURE => EventKind::Transfer,
            s if s == NFT_TRANSFERRED_SIGNATURE => EventKind::NftTransferred,
            _ => EventKind::Other,
        }
    }

    fn name(self) -> &'static str {
        match self {
            EventKind::Transfer => "balances.Transfer",
            EventKind::NftTransferred => "uniques.Transferred",
            EventKind::Other => "other",
        }
    }
}

/// Classify and decode one event.
///
/// `Ok(None)` means the event is not one we track.
pub fn decode_event(
    event: &RawEvent,
    block: BlockHeight,
    decimals: u32,
) -> Result<Option<EventRecord>, DecodeError> {
    let kind = EventKind::classify(event);
    let fields = Fields {
        kind,
        data: &event.data,
    };

    match kind {
        EventKind::Transfer => {
            let raw = fields.amount(2)?;
            Ok(Some(EventRecord::Transfer(TransferEvent {
                block,
                from: Address::new(fields.text(0, "address")?),
                to: Address::new(fields.text(1, "address")?),
                amount: scale_amount(raw, decimals)?,
            })))
        }
        EventKind::NftTransferred => Ok(Some(EventRecord::NftTransfer(NftTransferEvent {
            block,
            collection: CollectionId::new(fields.text(0, "collection id")?),
            item: ItemId::new(fields.text(1, "item id")?),
            from: Address::new(fields.text(2, "address")?),
            to: Address::new(fields.text(3, "address")?),
        }))),
        EventKind::Other => Ok(None),
    }
}

/// Most fractional digits a `Decimal` can carry
const MAX_SCALE: u32 = 28;

/// `raw / 10^decimals`.
///
/// Exact up to 28 fractional digits; digits beyond that are truncated.
/// Fails when the whole part does not fit a `Decimal` or when
/// `10^decimals` overflows a `u128` (more than 38 decimals).
pub fn scale_amount(raw: u128, decimals: u32) -> Result<Decimal, DecodeError> {
    let out_of_range = DecodeError::AmountOutOfRange { raw, decimals };
    let divisor = 10u128.checked_pow(decimals).ok_or(out_of_range.clone())?;

    let whole = Decimal::from_u128(raw / divisor).ok_or(out_of_range.clone())?;
    let (mut digits, scale) = (raw % divisor, decimals.min(MAX_SCALE));
    if decimals > MAX_SCALE {
        digits /= 10u128.pow(decimals - MAX_SCALE);
    }
    let fraction = Decimal::try_from_i128_with_scale(digits as i128, scale)
        .map_err(|_| out_of_range.clone())?;

    whole
        .checked_add(fraction)
        .map(|d| d.normalize())
        .ok_or(out_of_range)
}

struct Fields<'a> {
    kind: EventKind,
    data: &'a [Value],
}

impl Fields<'_> {
    fn get(&self, index: usize) -> Result<&Value, DecodeError> {
        self.data.get(index).ok_or(DecodeError::MissingField {
            event: self.kind.name(),
            index,
        })
    }

    fn invalid(&self, index: usize, expected: &'static str) -> DecodeError {
        DecodeError::InvalidField {
            event: self.kind.name(),
            index,
            expected,
        }
    }

    // ids and accounts come as strings, small ids sometimes as numbers
    fn text(&self, index: usize, expected: &'static str) -> Result<String, DecodeError> {
        match self.get(index)? {
            Value::String(s) if !s.is_empty() => Ok(s.clone()),
            Value::Number(n) => Ok(n.to_string()),
            _ => Err(self.invalid(index, expected)),
        }
    }

    // balances are decimal strings, or hex for some encoders
    fn amount(&self, index: usize) -> Result<u128, DecodeError> {
        let parsed = match self.get(index)? {
            Value::String(s) => match s.strip_prefix("0x") {
                Some(hex) => u128::from_str_radix(hex, 16).ok(),
                None => s.parse::<u128>().ok(),
            },
            Value::Number(n) => n.as_u64().map(u128::from),
            _ => None,
        };
        parsed.ok_or_else(|| self.invalid(index, "amount"))
    }
}
