//! Run summaries: the itemized reports emitted at completion or stall.

use shared::{PurchasedLine, RunOutcome, RunSummary};

use crate::domain::models::BotConfig;

/// Aggregate a run ledger (one `(gift_id, price)` entry per successful
/// purchase) into an itemized summary, preserving first-purchase order.
pub fn build_summary(
    outcome: RunOutcome,
    ledger: &[(String, i64)],
    config: &BotConfig,
) -> RunSummary {
    let mut lines: Vec<PurchasedLine> = Vec::new();
    let mut total_spent = 0;
    for (gift_id, price) in ledger {
        total_spent += price;
        match lines.iter_mut().find(|line| line.gift_id == *gift_id) {
            Some(line) => line.count += 1,
            None => lines.push(PurchasedLine {
                gift_id: gift_id.clone(),
                unit_price: *price,
                count: 1,
            }),
        }
    }
    RunSummary {
        outcome,
        lines,
        total_spent,
        bought: config.bought,
        target_count: config.target_count,
        recipient: config.recipient(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::Recipient;

    #[test]
    fn ledger_entries_aggregate_per_gift_in_first_seen_order() {
        let mut config = BotConfig::defaults_for(42);
        config.bought = 3;
        config.target_count = 3;

        let ledger = vec![
            ("a".to_string(), 150),
            ("b".to_string(), 120),
            ("a".to_string(), 150),
        ];
        let summary = build_summary(RunOutcome::Completed, &ledger, &config);

        assert_eq!(summary.lines.len(), 2);
        assert_eq!(summary.lines[0].gift_id, "a");
        assert_eq!(summary.lines[0].count, 2);
        assert_eq!(summary.lines[0].unit_price, 150);
        assert_eq!(summary.lines[1].gift_id, "b");
        assert_eq!(summary.lines[1].count, 1);
        assert_eq!(summary.total_spent, 420);
        assert_eq!(summary.bought, 3);
        assert_eq!(summary.recipient, Some(Recipient::User(42)));
    }

    #[test]
    fn empty_ledger_summarizes_to_zero_totals() {
        let config = BotConfig::defaults_for(42);
        let summary = build_summary(RunOutcome::Stalled, &[], &config);
        assert!(summary.lines.is_empty());
        assert_eq!(summary.total_spent, 0);
    }
}
