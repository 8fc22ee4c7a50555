// src/aggregator.rs
use rust_decimal::Decimal;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::hash::Hash;
use std::str::FromStr;

use crate::error::AggregateError;
use crate::models::{Address, InOutBoundStats, TransferEvent};

/// Per-address movement totals for one session.
#[derive(Debug, Default, Clone)]
pub struct Aggregator {
    movers: HashMap<Address, InOutBoundStats>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `amount` as sent by `from` and received by `to`.
    ///
    /// Amounts are taken as-is, negative ones included. A self-transfer
    /// counts on both sides of the same entry. Both totals are computed
    /// before either is stored, so an overflow leaves every entry unchanged.
    pub fn register_transfer(
        &mut self,
        from: &Address,
        to: &Address,
        amount: Decimal,
    ) -> Result<(), AggregateError> {
        let overflow = |address: &Address, side| AggregateError::Overflow {
            address: address.clone(),
            side,
            amount,
        };

        let sent = self
            .movers
            .get(from)
            .map_or(Decimal::ZERO, |s| s.sent)
            .checked_add(amount)
            .ok_or_else(|| overflow(from, "sent"))?;
        let received = self
            .movers
            .get(to)
            .map_or(Decimal::ZERO, |s| s.received)
            .checked_add(amount)
            .ok_or_else(|| overflow(to, "received"))?;

        let sender = self.movers.entry(from.clone()).or_default();
        sender.sent = sent;
        sender.nb_sent += 1;

        let receiver = self.movers.entry(to.clone()).or_default();
        receiver.received = received;
        receiver.nb_received += 1;
        Ok(())
    }

    pub fn register(&mut self, transfer: &TransferEvent) -> Result<(), AggregateError> {
        self.register_transfer(&transfer.from, &transfer.to, transfer.amount)
    }

    pub fn stats(&self, address: &Address) -> Option<&InOutBoundStats> {
        self.movers.get(address)
    }

    pub fn len(&self) -> usize {
        self.movers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.movers.is_empty()
    }

    /// The `top_n` entries under `order`.
    ///
    /// Entries the comparator considers equal are ranked by address,
    /// ascending, so the output is deterministic.
    pub fn export_sorted<F>(&self, top_n: usize, mut order: F) -> Vec<(Address, InOutBoundStats)>
    where
        F: FnMut(&InOutBoundStats, &InOutBoundStats) -> Ordering,
    {
        if top_n == 0 {
            return Vec::new();
        }

        let mut ranked: Vec<_> = self
            .movers
            .iter()
            .map(|(address, stats)| (address.clone(), stats.clone()))
            .collect();
        ranked.sort_by(|(addr_a, a), (addr_b, b)| order(a, b).then_with(|| addr_a.cmp(addr_b)));
        ranked.truncate(top_n);
        ranked
    }
}

/// Built-in rankings, all highest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatsOrder {
    /// Received amount, then number of receipts
    #[default]
    Received,
    /// Sent amount, then number of sends
    Sent,
    /// Number of receipts, then received amount
    NbReceived,
    /// Number of sends, then sent amount
    NbSent,
}

impl StatsOrder {
    pub fn compare(self, a: &InOutBoundStats, b: &InOutBoundStats) -> Ordering {
        match self {
            StatsOrder::Received => b
                .received
                .cmp(&a.received)
                .then_with(|| b.nb_received.cmp(&a.nb_received)),
            StatsOrder::Sent => b.sent.cmp(&a.sent).then_with(|| b.nb_sent.cmp(&a.nb_sent)),
            StatsOrder::NbReceived => b
                .nb_received
                .cmp(&a.nb_received)
                .then_with(|| b.received.cmp(&a.received)),
            StatsOrder::NbSent => b
                .nb_sent
                .cmp(&a.nb_sent)
                .then_with(|| b.sent.cmp(&a.sent)),
        }
    }
}

impl FromStr for StatsOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "received" => Ok(StatsOrder::Received),
            "sent" => Ok(StatsOrder::Sent),
            "nb-received" => Ok(StatsOrder::NbReceived),
            "nb-sent" => Ok(StatsOrder::NbSent),
            other => Err(format!("unknown order `{other}`")),
        }
    }
}

/// Lazily created per-key counters
#[derive(Debug, Clone)]
pub struct KeyedCounter<K> {
    counts: HashMap<K, u64>,
}

impl<K> Default for KeyedCounter<K> {
    fn default() -> Self {
        Self {
            counts: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash + Ord + Clone> KeyedCounter<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&mut self, key: &K) {
        *self.counts.entry(key.clone()).or_insert(0) += 1;
    }

    /// Zero for keys never seen
    pub fn get(&self, key: &K) -> u64 {
        self.counts.get(key).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Entries ordered by key
    pub fn sorted(&self) -> Vec<(K, u64)> {
        let mut entries: Vec<_> = self.counts.iter().map(|(k, v)| (k.clone(), *v)).collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> Address {
        Address::from(s)
    }

    fn sample() -> Aggregator {
        let mut agg = Aggregator::new();
        agg.register_transfer(&addr("A"), &addr("B"), Decimal::from(10)).unwrap();
        agg.register_transfer(&addr("B"), &addr("C"), Decimal::from(4)).unwrap();
        agg.register_transfer(&addr("A"), &addr("C"), Decimal::from(6)).unwrap();
        agg
    }

    #[test]
    fn accumulates_per_address() {
        let agg = sample();

        let a = agg.stats(&addr("A")).unwrap();
        assert_eq!((a.sent, a.nb_sent), (Decimal::from(16), 2));
        assert_eq!((a.received, a.nb_received), (Decimal::ZERO, 0));

        let b = agg.stats(&addr("B")).unwrap();
        assert_eq!((b.sent, b.nb_sent), (Decimal::from(4), 1));
        assert_eq!((b.received, b.nb_received), (Decimal::from(10), 1));

        let c = agg.stats(&addr("C")).unwrap();
        assert_eq!((c.sent, c.nb_sent), (Decimal::ZERO, 0));
        assert_eq!((c.received, c.nb_received), (Decimal::from(10), 2));
    }

    #[test]
    fn top_received_breaks_amount_tie_on_receipts() {
        let top = sample().export_sorted(1, |a, b| StatsOrder::Received.compare(a, b));
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].0, addr("C"));
        assert_eq!(top[0].1.received, Decimal::from(10));
    }

    #[test]
    fn caller_comparator_ties_fall_back_to_address() {
        let top = sample().export_sorted(3, |a, b| b.received.cmp(&a.received));
        let order: Vec<_> = top.iter().map(|(a, _)| a.as_str()).collect();
        assert_eq!(order, ["B", "C", "A"]);
    }

    #[test]
    fn export_is_bounded() {
        let agg = sample();
        assert!(agg.export_sorted(0, |a, b| StatsOrder::Sent.compare(a, b)).is_empty());
        assert_eq!(agg.export_sorted(10, |a, b| StatsOrder::Sent.compare(a, b)).len(), 3);
        assert!(Aggregator::new()
            .export_sorted(5, |a, b| StatsOrder::Sent.compare(a, b))
            .is_empty());
    }

    #[test]
    fn self_transfer_counts_both_sides() {
        let mut agg = Aggregator::new();
        agg.register_transfer(&addr("X"), &addr("X"), Decimal::from(3)).unwrap();

        let x = agg.stats(&addr("X")).unwrap();
        assert_eq!(x.sent, Decimal::from(3));
        assert_eq!(x.received, Decimal::from(3));
        assert_eq!((x.nb_sent, x.nb_received), (1, 1));
        assert_eq!(agg.len(), 1);
    }

    #[test]
    fn negative_amounts_add_algebraically() {
        let mut agg = Aggregator::new();
        agg.register_transfer(&addr("A"), &addr("B"), Decimal::from(5)).unwrap();
        agg.register_transfer(&addr("A"), &addr("B"), Decimal::from(-2)).unwrap();

        assert_eq!(agg.stats(&addr("B")).unwrap().received, Decimal::from(3));
        assert_eq!(agg.stats(&addr("A")).unwrap().nb_sent, 2);
    }

    #[test]
    fn overflow_on_receiver_leaves_sender_untouched() {
        let mut agg = Aggregator::new();
        agg.register_transfer(&addr("X"), &addr("B"), Decimal::MAX).unwrap();

        let err = agg
            .register_transfer(&addr("A"), &addr("B"), Decimal::MAX)
            .unwrap_err();

        assert_eq!(
            err,
            AggregateError::Overflow {
                address: addr("B"),
                side: "received",
                amount: Decimal::MAX,
            }
        );
        assert!(agg.stats(&addr("A")).is_none());
        let b = agg.stats(&addr("B")).unwrap();
        assert_eq!((b.received, b.nb_received), (Decimal::MAX, 1));
    }

    #[test]
    fn overflow_on_sender_leaves_receiver_untouched() {
        let mut agg = Aggregator::new();
        agg.register_transfer(&addr("A"), &addr("X"), Decimal::MAX).unwrap();

        assert!(agg
            .register_transfer(&addr("A"), &addr("C"), Decimal::MAX)
            .is_err());

        assert!(agg.stats(&addr("C")).is_none());
        assert_eq!(agg.stats(&addr("A")).unwrap().nb_sent, 1);
    }

    #[test]
    fn order_names_parse() {
        assert_eq!("nb-sent".parse::<StatsOrder>(), Ok(StatsOrder::NbSent));
        assert!("volume".parse::<StatsOrder>().is_err());
    }

    #[test]
    fn keyed_counter_counts_lazily() {
        let mut counter = KeyedCounter::new();
        counter.increment(&addr("b"));
        counter.increment(&addr("a"));
        counter.increment(&addr("b"));

        assert_eq!(counter.get(&addr("b")), 2);
        assert_eq!(counter.get(&addr("zzz")), 0);
        assert_eq!(counter.total(), 3);
        assert_eq!(counter.sorted(), vec![(addr("a"), 1), (addr("b"), 2)]);
    }
}
