//! Small shared helpers

use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// Sort any collection by a numeric key.
///
/// NaN keys sort last regardless of order. The sort is stable, so equal keys
/// keep their incoming order.
pub fn sort_by_key<T, F>(items: &mut [T], order: SortOrder, key: F)
where
    F: Fn(&T) -> f64,
{
    items.sort_by(|a, b| {
        let (ka, kb) = (key(a), key(b));
        match (ka.is_nan(), kb.is_nan()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => {
                let ord = ka.partial_cmp(&kb).unwrap_or(Ordering::Equal);
                match order {
                    SortOrder::Ascending => ord,
                    SortOrder::Descending => ord.reverse(),
                }
            }
        }
    });
}

/// Normalize a user-supplied ticker symbol (`" aapl "` -> `"AAPL"`)
pub fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_ascii_uppercase()
}

/// Change and change percent between two prices, when both are known
pub fn price_change(price: f64, prev_close: f64) -> Option<(f64, f64)> {
    if price > 0.0 && prev_close > 0.0 {
        let change = price - prev_close;
        Some((change, change / prev_close * 100.0))
    } else {
        None
    }
}

/// `up`, `down` or `unchanged` for a price change
pub fn move_direction(change: f64) -> &'static str {
    if change > 0.0 {
        "up"
    } else if change < 0.0 {
        "down"
    } else {
        "unchanged"
    }
}
