//! Catalog filtering: the pure selection rule for eligible gifts.

use shared::Gift;

/// Select the gifts whose price and supply both fall within the
/// inclusive configured bounds, ordered by descending price so the
/// highest-value eligible gifts are bought first under a fixed
/// total-count budget. A gift without a reported supply counts as
/// supply 0. Ties keep catalog order.
pub fn eligible_gifts(
    gifts: &[Gift],
    min_price: i64,
    max_price: i64,
    min_supply: i64,
    max_supply: i64,
) -> Vec<Gift> {
    let mut eligible: Vec<Gift> = gifts
        .iter()
        .filter(|gift| {
            let supply = gift.supply.unwrap_or(0);
            (min_price..=max_price).contains(&gift.price)
                && (min_supply..=max_supply).contains(&supply)
        })
        .cloned()
        .collect();
    // stable sort: equal prices stay in catalog order
    eligible.sort_by(|a, b| b.price.cmp(&a.price));
    eligible
}
