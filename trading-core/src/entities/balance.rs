use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Holdings of a single currency
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceEntry {
    pub free: Decimal,
    pub used: Decimal,
    pub total: Decimal,
}

impl BalanceEntry {
    /// Build from free and used; total is derived.
    pub fn new(free: Decimal, used: Decimal) -> Self {
        BalanceEntry {
            free,
            used,
            total: free + used,
        }
    }
}

/// Account balance keyed by currency code
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    pub timestamp: Option<i64>,
    pub currencies: BTreeMap<String, BalanceEntry>,
}

impl Balance {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace one currency. Streams usually push partial updates.
    pub fn update(&mut self, currency: impl Into<String>, entry: BalanceEntry) {
        self.currencies.insert(currency.into().to_uppercase(), entry);
    }

    pub fn get(&self, currency: &str) -> Option<&BalanceEntry> {
        self.currencies.get(&currency.to_uppercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_partial_updates_merge() {
        let mut balance = Balance::new();
        balance.update("btc", BalanceEntry::new(dec!(1), dec!(0.5)));
        balance.update("EUR", BalanceEntry::new(dec!(100), dec!(0)));
        balance.update("BTC", BalanceEntry::new(dec!(0.7), dec!(0.8)));

        assert_eq!(balance.currencies.len(), 2);
        assert_eq!(balance.get("btc").unwrap().total, dec!(1.5));
        assert_eq!(balance.get("eur").unwrap().free, dec!(100));
    }
}
