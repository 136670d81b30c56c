use crate::error::{AddressError, FetchError};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Mint,
    Redeem,
    Borrow,
    RepayBorrow,
    LiquidateBorrow,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mint => "MINT",
            Self::Redeem => "REDEEM",
            Self::Borrow => "BORROW",
            Self::RepayBorrow => "REPAY_BORROW",
            Self::LiquidateBorrow => "LIQUIDATE_BORROW",
        }
    }
}

/// Which side of the interaction the scored wallet was on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventRole {
    Borrower,
    Supplier,
    LiquidationTarget,
    Liquidator,
}

impl EventRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Borrower => "borrower",
            Self::Supplier => "supplier",
            Self::LiquidationTarget => "liquidation_target",
            Self::Liquidator => "liquidator",
        }
    }
}

/// One protocol interaction. Amounts are in a common value unit (USD) by the
/// time an event reaches the feature extractor.
#[derive(Debug, Clone, PartialEq)]
pub struct WalletEvent {
    pub kind: EventKind,
    pub asset: String,
    pub amount: f64,
    pub timestamp: i64,
    pub role: EventRole,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PositionBalance {
    pub supplied: f64,
    pub borrowed: f64,
}

impl PositionBalance {
    pub fn is_open(&self) -> bool {
        self.supplied > 0.0 || self.borrowed > 0.0
    }
}

/// Current positions keyed by asset symbol, plus activity bounds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WalletSnapshot {
    pub positions: BTreeMap<String, PositionBalance>,
    pub first_activity: Option<i64>,
    pub last_activity: Option<i64>,
}

/// Everything a data source knows about one wallet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WalletHistory {
    pub events: Vec<WalletEvent>,
    pub snapshot: WalletSnapshot,
}

impl WalletHistory {
    /// Events are sorted ascending by timestamp; ties keep provider order.
    pub fn new(mut events: Vec<WalletEvent>, snapshot: WalletSnapshot) -> Self {
        events.sort_by_key(|e| e.timestamp);
        Self { events, snapshot }
    }

    /// Every amount must be finite and non-negative, and so must the event and
    /// position totals. Providers report a violation as `FetchError::Invalid`.
    pub fn check_amounts(&self) -> Result<(), FetchError> {
        let mut event_total = 0.0_f64;
        for e in &self.events {
            if !e.amount.is_finite() || e.amount < 0.0 {
                return Err(FetchError::Invalid(format!(
                    "{} {} amount {} is not a finite non-negative value",
                    e.asset,
                    e.kind.as_str(),
                    e.amount
                )));
            }
            event_total += e.amount;
        }
        if !event_total.is_finite() {
            return Err(FetchError::Invalid(format!("event amounts sum to {event_total}")));
        }

        let mut position_total = 0.0_f64;
        for (asset, p) in &self.snapshot.positions {
            for (side, v) in [("supplied", p.supplied), ("borrowed", p.borrowed)] {
                if !v.is_finite() || v < 0.0 {
                    return Err(FetchError::Invalid(format!(
                        "{asset} {side} balance {v} is not a finite non-negative value"
                    )));
                }
                position_total += v;
            }
        }
        if !position_total.is_finite() {
            return Err(FetchError::Invalid(format!("position balances sum to {position_total}")));
        }
        Ok(())
    }
}

/// A validated `0x` + 40 hex digit address, stored lowercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WalletAddress(String);

impl WalletAddress {
    pub fn parse(raw: &str) -> Result<Self, AddressError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(AddressError::Empty);
        }
        let Some(hex) = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
        else {
            return Err(AddressError::MissingPrefix(trimmed.to_string()));
        };
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(AddressError::NonHex(trimmed.to_string()));
        }
        if hex.len() != 40 {
            return Err(AddressError::BadLength {
                address: trimmed.to_string(),
                digits: hex.len(),
            });
        }
        Ok(Self(format!("0x{}", hex.to_ascii_lowercase())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Hex digits without the prefix.
    pub fn hex_digits(&self) -> &str {
        &self.0[2..]
    }
}

impl fmt::Display for WalletAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Envelope of every GraphQL response.
#[derive(Debug, Clone, Deserialize)]
pub struct GraphQlResponse<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Vec<GraphQlError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphQlError {
    pub message: String,
}

/// Result of the wallet history query against the Compound v2 subgraph.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubgraphWalletData {
    pub account: Option<SubgraphAccount>,
    #[serde(default)]
    pub mint_events: Vec<SubgraphTransferEvent>,
    #[serde(default)]
    pub redeem_events: Vec<SubgraphTransferEvent>,
    #[serde(default)]
    pub borrow_events: Vec<SubgraphDebtEvent>,
    #[serde(default)]
    pub repay_events: Vec<SubgraphDebtEvent>,
    #[serde(default)]
    pub liquidated_events: Vec<SubgraphLiquidationEvent>,
    #[serde(default)]
    pub liquidator_events: Vec<SubgraphLiquidationEvent>,
    #[serde(default)]
    pub markets: Vec<SubgraphMarket>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubgraphAccount {
    pub id: String,
    #[serde(default)]
    pub tokens: Vec<SubgraphAccountToken>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubgraphAccountToken {
    pub symbol: Option<String>,
    pub market: Option<SubgraphMarket>,
    pub total_underlying_supplied: Option<String>,
    pub total_underlying_redeemed: Option<String>,
    pub stored_borrow_balance: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubgraphMarket {
    pub underlying_symbol: Option<String>,
    #[serde(rename = "underlyingPriceUSD")]
    pub underlying_price_usd: Option<String>,
}

/// Mint and redeem events share a shape.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubgraphTransferEvent {
    pub c_token_symbol: Option<String>,
    pub underlying_amount: Option<String>,
    pub block_time: Option<i64>,
}

/// Borrow and repay events share a shape.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubgraphDebtEvent {
    pub underlying_symbol: Option<String>,
    pub amount: Option<String>,
    pub block_time: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubgraphLiquidationEvent {
    pub underlying_symbol: Option<String>,
    pub underlying_repay_amount: Option<String>,
    pub block_time: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_kind_display() {
        assert_eq!(EventKind::RepayBorrow.as_str(), "REPAY_BORROW");
        assert_eq!(EventKind::LiquidateBorrow.as_str(), "LIQUIDATE_BORROW");
        assert_eq!(EventRole::LiquidationTarget.as_str(), "liquidation_target");
    }

    #[test]
    fn test_wallet_address_normalizes_case_and_whitespace() {
        let addr = WalletAddress::parse("  0XAbCdEf0123456789abcdef0123456789ABCDEF01 ").unwrap();
        assert_eq!(addr.as_str(), "0xabcdef0123456789abcdef0123456789abcdef01");
        assert_eq!(addr.hex_digits().len(), 40);
    }

    #[test]
    fn test_wallet_address_rejects_bad_shapes() {
        assert_eq!(WalletAddress::parse("  "), Err(AddressError::Empty));
        assert!(matches!(
            WalletAddress::parse("abcdef0123456789abcdef0123456789abcdef01"),
            Err(AddressError::MissingPrefix(_))
        ));
        assert!(matches!(
            WalletAddress::parse("0xabc"),
            Err(AddressError::BadLength { digits: 3, .. })
        ));
        assert!(matches!(
            WalletAddress::parse("0xzzcdef0123456789abcdef0123456789abcdef01"),
            Err(AddressError::NonHex(_))
        ));
    }

    #[test]
    fn test_wallet_history_sorts_events() {
        let ev = |ts| WalletEvent {
            kind: EventKind::Mint,
            asset: "DAI".to_string(),
            amount: 1.0,
            timestamp: ts,
            role: EventRole::Supplier,
        };
        let history = WalletHistory::new(vec![ev(30), ev(10), ev(20)], WalletSnapshot::default());
        let ts: Vec<i64> = history.events.iter().map(|e| e.timestamp).collect();
        assert_eq!(ts, vec![10, 20, 30]);
    }

    #[test]
    fn test_parse_subgraph_wallet_data() {
        let json = r#"{
            "account": {"id": "0xabc", "tokens": [{
                "symbol": "cDAI",
                "market": {"underlyingSymbol": "DAI", "underlyingPriceUSD": "1.0"},
                "totalUnderlyingSupplied": "100",
                "totalUnderlyingRedeemed": "40",
                "storedBorrowBalance": "0"
            }]},
            "mintEvents": [{"cTokenSymbol": "cDAI", "underlyingAmount": "100", "blockTime": 1700000000}],
            "borrowEvents": []
        }"#;
        let data: SubgraphWalletData = serde_json::from_str(json).unwrap();
        let account = data.account.unwrap();
        assert_eq!(account.tokens.len(), 1);
        assert_eq!(data.mint_events[0].block_time, Some(1_700_000_000));
        assert!(data.repay_events.is_empty());
        assert!(data.liquidated_events.is_empty());
    }

    fn borrow(amount: f64) -> WalletEvent {
        WalletEvent {
            kind: EventKind::Borrow,
            asset: "WBTC".to_string(),
            amount,
            timestamp: 1_700_000_000,
            role: EventRole::Borrower,
        }
    }

    #[test]
    fn test_check_amounts_accepts_ordinary_history() {
        let mut snapshot = WalletSnapshot::default();
        snapshot.positions.insert(
            "ETH".to_string(),
            PositionBalance {
                supplied: 4_000.0,
                borrowed: 0.0,
            },
        );
        let history = WalletHistory::new(vec![borrow(1_500.0), borrow(0.0)], snapshot);
        assert_eq!(history.check_amounts(), Ok(()));
    }

    #[test]
    fn test_check_amounts_rejects_bad_event_amounts() {
        for amount in [f64::INFINITY, f64::NAN, -1.0] {
            let history = WalletHistory::new(vec![borrow(amount)], WalletSnapshot::default());
            let err = history.check_amounts().unwrap_err();
            assert!(matches!(err, FetchError::Invalid(_)), "{err}");
            assert!(err.to_string().contains("BORROW"));
        }
    }

    #[test]
    fn test_check_amounts_rejects_overflowing_totals() {
        let history = WalletHistory::new(
            vec![borrow(1e308), borrow(1e308)],
            WalletSnapshot::default(),
        );
        assert!(matches!(history.check_amounts(), Err(FetchError::Invalid(_))));

        let mut snapshot = WalletSnapshot::default();
        snapshot.positions.insert(
            "DAI".to_string(),
            PositionBalance {
                supplied: 1e308,
                borrowed: 1e308,
            },
        );
        let history = WalletHistory::new(Vec::new(), snapshot);
        assert!(matches!(history.check_amounts(), Err(FetchError::Invalid(_))));
    }
}
