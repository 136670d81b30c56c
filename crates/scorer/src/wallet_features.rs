use crate::error::ScoringError;
use common::types::{EventKind, EventRole, WalletEvent, WalletSnapshot};
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};

const SECONDS_PER_DAY: i64 = 86_400;
/// Reported as `days_since_last_liquidation` when the wallet was never liquidated.
pub const NO_LIQUIDATION_DAYS: f64 = 999.0;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FeatureVector {
    pub total_transactions: u32,
    pub avg_transaction_amount: f64,
    /// Events per day of account age, age floored at one day.
    pub activity_frequency: f64,
    pub total_supplied_volume: f64,
    pub total_redeemed_volume: f64,
    pub total_borrowed: f64,
    pub total_repaid: f64,
    pub repayment_ratio: f64,
    pub current_total_borrowed: f64,
    pub current_total_supplied: f64,
    pub current_utilization: f64,
    pub liquidation_count: u32,
    pub days_since_last_liquidation: f64,
    pub total_liquidated_value: f64,
    pub asset_diversity: u32,
    /// Fraction of open position value held in volatile assets, in [0, 1].
    pub volatile_exposure: f64,
    pub account_age_days: f64,
    pub days_since_last_activity: f64,
    pub active_positions: u32,
}

impl FeatureVector {
    /// The real-valued features by name. Counts are integers and always finite.
    pub fn real_features(&self) -> [(&'static str, f64); 15] {
        [
            ("avg_transaction_amount", self.avg_transaction_amount),
            ("activity_frequency", self.activity_frequency),
            ("total_supplied_volume", self.total_supplied_volume),
            ("total_redeemed_volume", self.total_redeemed_volume),
            ("total_borrowed", self.total_borrowed),
            ("total_repaid", self.total_repaid),
            ("repayment_ratio", self.repayment_ratio),
            ("current_total_borrowed", self.current_total_borrowed),
            ("current_total_supplied", self.current_total_supplied),
            ("current_utilization", self.current_utilization),
            ("days_since_last_liquidation", self.days_since_last_liquidation),
            ("total_liquidated_value", self.total_liquidated_value),
            ("volatile_exposure", self.volatile_exposure),
            ("account_age_days", self.account_age_days),
            ("days_since_last_activity", self.days_since_last_activity),
        ]
    }

    /// Enforce the all-finite invariant once, so scoring never has to re-check.
    pub fn validate(self) -> Result<Self, ScoringError> {
        if let Some((feature, value)) = self
            .real_features()
            .into_iter()
            .find(|(_, v)| !v.is_finite())
        {
            return Err(ScoringError::Computation { feature, value });
        }
        Ok(self)
    }
}

/// Finite inputs give a finite result: a dust denominator saturates at `f64::MAX`.
fn ratio_or_zero(numerator: f64, denominator: f64) -> f64 {
    if denominator <= 0.0 {
        0.0
    } else if numerator.is_finite() && denominator.is_finite() {
        (numerator / denominator).clamp(-f64::MAX, f64::MAX)
    } else {
        numerator / denominator
    }
}

fn whole_days_between(from: i64, to: i64) -> f64 {
    (to.saturating_sub(from).max(0) / SECONDS_PER_DAY) as f64
}

/// Turns a wallet's event history and position snapshot into a [`FeatureVector`].
///
/// `as_of` is fixed at construction so extraction is a pure function of its inputs.
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    as_of: i64,
    volatile_assets: HashSet<String>,
}

impl FeatureExtractor {
    pub fn new(as_of: i64, volatile_assets: &[String]) -> Self {
        Self {
            as_of,
            volatile_assets: volatile_assets
                .iter()
                .map(|s| s.trim().to_ascii_uppercase())
                .collect(),
        }
    }

    pub fn as_of(&self) -> i64 {
        self.as_of
    }

    fn is_volatile(&self, asset: &str) -> bool {
        self.volatile_assets.contains(&asset.to_ascii_uppercase())
    }

    /// `events` are expected in ascending timestamp order.
    pub fn extract(
        &self,
        events: &[WalletEvent],
        snapshot: &WalletSnapshot,
    ) -> Result<FeatureVector, ScoringError> {
        let mut total_amount = 0.0;
        let mut total_supplied_volume = 0.0;
        let mut total_redeemed_volume = 0.0;
        let mut total_borrowed = 0.0;
        let mut total_repaid = 0.0;
        let mut liquidation_count = 0_u32;
        let mut total_liquidated_value = 0.0;
        let mut last_liquidation: Option<i64> = None;
        let mut assets: BTreeSet<String> = BTreeSet::new();

        for e in events {
            total_amount += e.amount;
            if !e.asset.is_empty() {
                assets.insert(e.asset.to_ascii_uppercase());
            }
            match e.kind {
                EventKind::Mint => total_supplied_volume += e.amount,
                EventKind::Redeem => total_redeemed_volume += e.amount,
                EventKind::Borrow => total_borrowed += e.amount,
                EventKind::RepayBorrow => total_repaid += e.amount,
                EventKind::LiquidateBorrow if e.role == EventRole::LiquidationTarget => {
                    liquidation_count += 1;
                    total_liquidated_value += e.amount;
                    last_liquidation =
                        Some(last_liquidation.map_or(e.timestamp, |t| t.max(e.timestamp)));
                }
                // Liquidations this wallet performed on others carry no risk signal.
                EventKind::LiquidateBorrow => {}
            }
        }

        let mut current_total_supplied = 0.0;
        let mut current_total_borrowed = 0.0;
        let mut volatile_value = 0.0;
        let mut active_positions = 0_u32;
        for (asset, balance) in &snapshot.positions {
            if !asset.is_empty() {
                assets.insert(asset.to_ascii_uppercase());
            }
            current_total_supplied += balance.supplied;
            current_total_borrowed += balance.borrowed;
            if self.is_volatile(asset) {
                volatile_value += balance.supplied + balance.borrowed;
            }
            if balance.is_open() {
                active_positions += 1;
            }
        }

        let total_transactions = u32::try_from(events.len()).unwrap_or(u32::MAX);
        let first_activity = snapshot
            .first_activity
            .or_else(|| events.first().map(|e| e.timestamp));
        let last_activity = snapshot
            .last_activity
            .or_else(|| events.last().map(|e| e.timestamp));

        let account_age_days = first_activity.map_or(0.0, |t| whole_days_between(t, self.as_of));
        let days_since_last_activity =
            last_activity.map_or(0.0, |t| whole_days_between(t, self.as_of));
        let activity_frequency = f64::from(total_transactions) / account_age_days.max(1.0);

        FeatureVector {
            total_transactions,
            avg_transaction_amount: ratio_or_zero(total_amount, f64::from(total_transactions)),
            activity_frequency,
            total_supplied_volume,
            total_redeemed_volume,
            total_borrowed,
            total_repaid,
            repayment_ratio: ratio_or_zero(total_repaid, total_borrowed),
            current_total_borrowed,
            current_total_supplied,
            current_utilization: ratio_or_zero(current_total_borrowed, current_total_supplied),
            liquidation_count,
            days_since_last_liquidation: last_liquidation
                .map_or(NO_LIQUIDATION_DAYS, |t| whole_days_between(t, self.as_of)),
            total_liquidated_value,
            asset_diversity: u32::try_from(assets.len()).unwrap_or(u32::MAX),
            volatile_exposure: ratio_or_zero(
                volatile_value,
                current_total_supplied + current_total_borrowed,
            ),
            account_age_days,
            days_since_last_activity,
            active_positions,
        }
        .validate()
    }
}
