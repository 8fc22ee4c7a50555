// src/models.rs
use rust_decimal::Decimal;
use std::fmt;

/// Sequential index of a block in the chain.
pub type BlockHeight = u64;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id!(
    /// Account identifier as rendered by the chain (SS58 or hex).
    /// Compared by exact string equality, no checksum normalization.
    Address
);
string_id!(
    /// NFT collection (class) identifier
    CollectionId
);
string_id!(
    /// Item identifier within a collection
    ItemId
);

/// A decoded fungible transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferEvent {
    pub block: BlockHeight,
    pub from: Address,
    pub to: Address,
    pub amount: Decimal, // already scaled by 10^decimals
}

/// A decoded NFT transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NftTransferEvent {
    pub block: BlockHeight,
    pub from: Address,
    pub to: Address,
    pub collection: CollectionId,
    pub item: ItemId,
}

/// Any record the scanner can emit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventRecord {
    Transfer(TransferEvent),
    NftTransfer(NftTransferEvent),
}

impl EventRecord {
    pub fn block(&self) -> BlockHeight {
        match self {
            EventRecord::Transfer(t) => t.block,
            EventRecord::NftTransfer(t) => t.block,
        }
    }
}

/// Running inbound/outbound totals for one address
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InOutBoundStats {
    pub received: Decimal,
    pub nb_received: u64,
    pub sent: Decimal,
    pub nb_sent: u64,
}

impl fmt::Display for InOutBoundStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "(received: {}, sent: {}, counters: {}/{})",
            self.received, self.sent, self.nb_received, self.nb_sent
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_display_lists_totals_and_counters() {
        let stats = InOutBoundStats {
            received: Decimal::new(35, 1),
            nb_received: 2,
            sent: Decimal::from(4),
            nb_sent: 1,
        };
        assert_eq!(stats.to_string(), "(received: 3.5, sent: 4, counters: 2/1)");
    }

    #[test]
    fn addresses_compare_exactly() {
        assert_ne!(Address::from("5Grw"), Address::from("5grw"));
        assert_eq!(Address::from("5Grw"), Address::new(String::from("5Grw")));
    }
}
