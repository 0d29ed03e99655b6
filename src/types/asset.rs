// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use std::str::FromStr;

/// Maximum symbol length, excluding the NUL padding.
pub const MAX_SYMBOL_LEN: usize = 7;

/// A compact asset name: uppercase ASCII, NUL padded to eight bytes so it
/// can be copied around and used as an index key.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Symbol([u8; 8]);

impl Symbol {
    /// Core liquid token.
    pub const GROVE: Symbol = Symbol(*b"GRV\0\0\0\0\0");
    /// Market-pegged stable token, convertible against the feed.
    pub const GBD: Symbol = Symbol(*b"GBD\0\0\0\0\0");
    /// Staked, non-transferable shares of the vesting fund.
    pub const VESTS: Symbol = Symbol(*b"VESTS\0\0\0");

    pub fn new(name: &str) -> Option<Symbol> {
        if name.is_empty() || name.len() > MAX_SYMBOL_LEN {
            return None;
        }
        if !name.bytes().all(|b| b.is_ascii_uppercase() || b.is_ascii_digit()) {
            return None;
        }
        if !name.as_bytes()[0].is_ascii_uppercase() {
            return None;
        }
        let mut bytes = [0u8; 8];
        bytes[..name.len()].copy_from_slice(name.as_bytes());
        Some(Symbol(bytes))
    }

    pub fn as_str(&self) -> &str {
        let end = self.0.iter().position(|&b| b == 0).unwrap_or(8);
        // Construction only admits ASCII.
        std::str::from_utf8(&self.0[..end]).unwrap_or("")
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Symbol {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Symbol {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Symbol::new(&s).ok_or_else(|| D::Error::custom(format!("invalid symbol {s:?}")))
    }
}

impl FromStr for Symbol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Symbol::new(s).ok_or_else(|| format!("invalid symbol {s:?}"))
    }
}

/// An amount of one asset. Amounts are signed raw units; negative values
/// only appear transiently inside arithmetic and validation rejects them at
/// the operation boundary.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Asset {
    pub amount: i64,
    pub symbol: Symbol,
}

impl Asset {
    pub const fn new(amount: i64, symbol: Symbol) -> Asset {
        Asset { amount, symbol }
    }

    pub const fn grove(amount: i64) -> Asset {
        Asset::new(amount, Symbol::GROVE)
    }

    pub const fn gbd(amount: i64) -> Asset {
        Asset::new(amount, Symbol::GBD)
    }

    pub const fn vests(amount: i64) -> Asset {
        Asset::new(amount, Symbol::VESTS)
    }

    pub fn is_zero(&self) -> bool {
        self.amount == 0
    }

    pub fn checked_add(&self, other: Asset) -> Option<Asset> {
        if self.symbol != other.symbol {
            return None;
        }
        Some(Asset::new(self.amount.checked_add(other.amount)?, self.symbol))
    }

    pub fn checked_sub(&self, other: Asset) -> Option<Asset> {
        if self.symbol != other.symbol {
            return None;
        }
        Some(Asset::new(self.amount.checked_sub(other.amount)?, self.symbol))
    }

    /// Convert through a price. The asset must carry one of the two symbols
    /// of the pair; the result carries the other. Rounds toward zero.
    pub fn convert(&self, price: &Price) -> Asset {
        if self.symbol == price.base.symbol {
            let amount =
                (self.amount as i128 * price.quote.amount as i128) / price.base.amount as i128;
            Asset::new(amount as i64, price.quote.symbol)
        } else {
            debug_assert_eq!(self.symbol, price.quote.symbol, "asset not in price pair");
            let amount =
                (self.amount as i128 * price.base.amount as i128) / price.quote.amount as i128;
            Asset::new(amount as i64, price.base.symbol)
        }
    }
}

impl Add for Asset {
    type Output = Asset;

    fn add(self, other: Asset) -> Asset {
        assert_eq!(self.symbol, other.symbol, "asset symbol mismatch");
        Asset::new(self.amount + other.amount, self.symbol)
    }
}

impl Sub for Asset {
    type Output = Asset;

    fn sub(self, other: Asset) -> Asset {
        assert_eq!(self.symbol, other.symbol, "asset symbol mismatch");
        Asset::new(self.amount - other.amount, self.symbol)
    }
}

impl AddAssign for Asset {
    fn add_assign(&mut self, other: Asset) {
        *self = *self + other;
    }
}

impl SubAssign for Asset {
    fn sub_assign(&mut self, other: Asset) {
        *self = *self - other;
    }
}

impl Neg for Asset {
    type Output = Asset;

    fn neg(self) -> Asset {
        Asset::new(-self.amount, self.symbol)
    }
}

impl PartialOrd for Asset {
    /// Amounts of different assets are incomparable.
    fn partial_cmp(&self, other: &Asset) -> Option<Ordering> {
        if self.symbol == other.symbol {
            Some(self.amount.cmp(&other.amount))
        } else {
            None
        }
    }
}

impl fmt::Debug for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.symbol)
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.symbol)
    }
}

/// An exchange rate between two assets, expressed as the ratio
/// `base / quote`. Comparisons between prices of the same pair compare the
/// ratios exactly through 128-bit cross multiplication.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct Price {
    pub base: Asset,
    pub quote: Asset,
}

impl Price {
    pub fn new(base: Asset, quote: Asset) -> Price {
        Price { base, quote }
    }

    pub fn is_null(&self) -> bool {
        self.base.amount == 0 || self.quote.amount == 0
    }

    /// The maximum representable price selling `base_sym` for `quote_sym`.
    pub fn max(base_sym: Symbol, quote_sym: Symbol) -> Price {
        Price::new(Asset::new(i64::MAX, base_sym), Asset::new(1, quote_sym))
    }

    /// The minimum representable price selling `base_sym` for `quote_sym`.
    pub fn min(base_sym: Symbol, quote_sym: Symbol) -> Price {
        Price::new(Asset::new(1, base_sym), Asset::new(i64::MAX, quote_sym))
    }

    /// Swap base and quote.
    pub fn invert(&self) -> Price {
        Price::new(self.quote, self.base)
    }

    fn cross(&self, other: &Price) -> (i128, i128) {
        let lhs = self.base.amount as i128 * other.quote.amount as i128;
        let rhs = other.base.amount as i128 * self.quote.amount as i128;
        (lhs, rhs)
    }
}

impl PartialOrd for Price {
    fn partial_cmp(&self, other: &Price) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Price {
    fn cmp(&self, other: &Price) -> Ordering {
        // Total order: symbol pair first, then exact ratio, then raw
        // amounts so distinct representations of one ratio stay distinct.
        (self.base.symbol, self.quote.symbol)
            .cmp(&(other.base.symbol, other.quote.symbol))
            .then_with(|| {
                let (lhs, rhs) = self.cross(other);
                lhs.cmp(&rhs)
            })
            .then_with(|| {
                (self.base.amount, self.quote.amount)
                    .cmp(&(other.base.amount, other.quote.amount))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_round_trip() {
        let s = Symbol::new("USDX").unwrap();
        assert_eq!(s.as_str(), "USDX");
        assert_eq!(Symbol::GROVE.as_str(), "GRV");
        assert!(Symbol::new("toolongsym").is_none());
        assert!(Symbol::new("lower").is_none());
        assert!(Symbol::new("").is_none());
    }

    #[test]
    fn convert_through_price() {
        // 2 GRV per GBD
        let price = Price::new(Asset::gbd(1000), Asset::grove(2000));
        assert_eq!(Asset::gbd(500).convert(&price), Asset::grove(1000));
        assert_eq!(Asset::grove(1000).convert(&price), Asset::gbd(500));
    }

    #[test]
    fn convert_rounds_down() {
        let price = Price::new(Asset::gbd(3), Asset::grove(10));
        assert_eq!(Asset::gbd(1).convert(&price), Asset::grove(3));
    }

    #[test]
    fn price_ordering_is_by_ratio() {
        let cheap = Price::new(Asset::gbd(1), Asset::grove(3));
        let dear = Price::new(Asset::gbd(1), Asset::grove(2));
        assert!(cheap < dear);
        // Same ratio, different scale: ordered but not equal.
        let a = Price::new(Asset::gbd(1), Asset::grove(2));
        let b = Price::new(Asset::gbd(2), Asset::grove(4));
        assert_ne!(a, b);
        assert_eq!(a.cross(&b).0, a.cross(&b).1);
    }

    #[test]
    fn checked_arithmetic_respects_symbols() {
        assert!(Asset::grove(1).checked_add(Asset::gbd(1)).is_none());
        assert_eq!(
            Asset::grove(1).checked_add(Asset::grove(2)),
            Some(Asset::grove(3))
        );
    }
}
