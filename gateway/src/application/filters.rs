use trading_core::Identified;

/// Keep entries at or after `since`, then cap to `limit`.
///
/// With `tail` the newest `limit` entries are kept, otherwise the oldest.
/// Entries without a timestamp never match a `since` filter.
pub fn filter_by_since_limit<T: Identified + Clone>(
    items: &[T],
    since: Option<i64>,
    limit: Option<usize>,
    tail: bool,
) -> Vec<T> {
    let matching: Vec<T> = match since {
        Some(since) => items
            .iter()
            .filter(|item| item.timestamp().is_some_and(|ts| ts >= since))
            .cloned()
            .collect(),
        None => items.to_vec(),
    };
    apply_limit(matching, limit, tail)
}

pub fn filter_by_symbol_since_limit<T: Identified + Clone>(
    items: &[T],
    symbol: Option<&str>,
    since: Option<i64>,
    limit: Option<usize>,
    tail: bool,
) -> Vec<T> {
    let matching: Vec<T> = match symbol {
        Some(symbol) => items
            .iter()
            .filter(|item| item.symbol() == Some(symbol))
            .cloned()
            .collect(),
        None => items.to_vec(),
    };
    filter_by_since_limit(&matching, since, limit, tail)
}

fn apply_limit<T>(mut items: Vec<T>, limit: Option<usize>, tail: bool) -> Vec<T> {
    let Some(limit) = limit else {
        return items;
    };
    if items.len() > limit {
        if tail {
            items.drain(..items.len() - limit);
        } else {
            items.truncate(limit);
        }
    }
    items
}
