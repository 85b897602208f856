use serde::{Deserialize, Serialize};

/// How an incoming delta's sequence indicator is compared with the book's.
///
/// Exchanges disagree on what a nonce means, so each adapter picks the rule
/// matching its feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NonceRule {
    /// Apply when `nonce > current`, silently drop otherwise
    #[default]
    StrictlyGreater,
    /// Apply when `nonce >= current`; an equal nonce is re-applied
    GreaterOrEqual,
    /// Apply only `current + 1`; older is stale, anything else is a gap
    Sequential,
    /// Same as `StrictlyGreater` but compares delta timestamps
    Timestamp,
    /// Deltas carry `[first, last]`; apply when `first <= current + 1 <= last + 1`
    RangeCovering,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NonceCheck {
    Apply,
    Stale,
    Gap { expected: i64, received: i64 },
}

impl NonceRule {
    /// Compare a delta covering `first..=last` against the book's `current`.
    ///
    /// `first` defaults to `last` for feeds that send a single indicator.
    /// Nothing can follow `i64::MAX`, so contiguous rules treat every delta
    /// as stale there.
    pub fn check(&self, current: i64, first: Option<i64>, last: i64) -> NonceCheck {
        match self {
            NonceRule::StrictlyGreater | NonceRule::Timestamp => {
                if last > current {
                    NonceCheck::Apply
                } else {
                    NonceCheck::Stale
                }
            }
            NonceRule::GreaterOrEqual => {
                if last >= current {
                    NonceCheck::Apply
                } else {
                    NonceCheck::Stale
                }
            }
            NonceRule::Sequential => {
                let Some(expected) = current.checked_add(1) else {
                    return NonceCheck::Stale;
                };
                if last < expected {
                    NonceCheck::Stale
                } else if last == expected {
                    NonceCheck::Apply
                } else {
                    NonceCheck::Gap {
                        expected,
                        received: last,
                    }
                }
            }
            NonceRule::RangeCovering => {
                let Some(expected) = current.checked_add(1) else {
                    return NonceCheck::Stale;
                };
                let first = first.unwrap_or(last);
                if last < expected {
                    NonceCheck::Stale
                } else if first <= expected {
                    NonceCheck::Apply
                } else {
                    NonceCheck::Gap {
                        expected,
                        received: first,
                    }
                }
            }
        }
    }
}
