use crate::error::ScoringError;
use crate::wallet_features::FeatureVector;
use common::config::{Scoring, ThresholdOverrides, WeightOverrides};
use serde::Serialize;

pub const BASE_SCORE: i32 = 500;
pub const MIN_SCORE: i32 = 0;
pub const MAX_SCORE: i32 = 1000;

/// Point magnitudes of each rule. Penalties are stored as positive numbers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RiskWeights {
    /// Points lost per liquidation event.
    pub liquidation_penalty: f64,
    pub repayment_bonus_max: f64,
    pub repayment_penalty_max: f64,
    pub utilization_penalty_max: f64,
    pub activity_bonus_max: f64,
    pub diversification_bonus_max: f64,
    /// Full penalty for a wallet whose positions are entirely volatile assets.
    pub volatility_penalty: f64,
    pub account_age_bonus: f64,
    pub recent_activity_bonus: f64,
    pub dormancy_penalty: f64,
}

impl Default for RiskWeights {
    fn default() -> Self {
        Self {
            liquidation_penalty: 200.0,
            repayment_bonus_max: 100.0,
            repayment_penalty_max: 100.0,
            utilization_penalty_max: 150.0,
            activity_bonus_max: 50.0,
            diversification_bonus_max: 75.0,
            volatility_penalty: 100.0,
            account_age_bonus: 50.0,
            recent_activity_bonus: 25.0,
            dormancy_penalty: 75.0,
        }
    }
}

impl RiskWeights {
    #[must_use]
    pub fn with_overrides(self, o: &WeightOverrides) -> Self {
        Self {
            liquidation_penalty: o.liquidation_penalty.unwrap_or(self.liquidation_penalty),
            repayment_bonus_max: o.repayment_bonus_max.unwrap_or(self.repayment_bonus_max),
            repayment_penalty_max: o.repayment_penalty_max.unwrap_or(self.repayment_penalty_max),
            utilization_penalty_max: o
                .utilization_penalty_max
                .unwrap_or(self.utilization_penalty_max),
            activity_bonus_max: o.activity_bonus_max.unwrap_or(self.activity_bonus_max),
            diversification_bonus_max: o
                .diversification_bonus_max
                .unwrap_or(self.diversification_bonus_max),
            volatility_penalty: o.volatility_penalty.unwrap_or(self.volatility_penalty),
            account_age_bonus: o.account_age_bonus.unwrap_or(self.account_age_bonus),
            recent_activity_bonus: o.recent_activity_bonus.unwrap_or(self.recent_activity_bonus),
            dormancy_penalty: o.dormancy_penalty.unwrap_or(self.dormancy_penalty),
        }
    }

    pub fn named(&self) -> [(&'static str, f64); 10] {
        [
            ("liquidation_penalty", self.liquidation_penalty),
            ("repayment_bonus_max", self.repayment_bonus_max),
            ("repayment_penalty_max", self.repayment_penalty_max),
            ("utilization_penalty_max", self.utilization_penalty_max),
            ("activity_bonus_max", self.activity_bonus_max),
            ("diversification_bonus_max", self.diversification_bonus_max),
            ("volatility_penalty", self.volatility_penalty),
            ("account_age_bonus", self.account_age_bonus),
            ("recent_activity_bonus", self.recent_activity_bonus),
            ("dormancy_penalty", self.dormancy_penalty),
        ]
    }

    pub fn validate(&self) -> Result<(), ScoringError> {
        for (name, value) in self.named() {
            if !value.is_finite() || value < 0.0 {
                return Err(ScoringError::InvalidParameter {
                    name,
                    value,
                    reason: "weights must be finite and non-negative",
                });
            }
        }
        Ok(())
    }
}

/// Breakpoints of the per-rule mappings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoringThresholds {
    /// Repayment ratio that earns neither bonus nor penalty.
    pub repayment_neutral_ratio: f64,
    pub excellent_repayment_ratio: f64,
    pub high_utilization: f64,
    /// Activity (events per day) at or below which no bonus is earned.
    pub dormant_activity_frequency: f64,
    /// Activity at or above which the full bonus is earned.
    pub frequent_activity_frequency: f64,
    /// Distinct assets that earn the full diversification bonus.
    pub diversification_saturation: u32,
    pub mature_account_days: f64,
    pub recent_activity_days: f64,
    pub dormant_days: f64,
    pub recent_liquidation_days: f64,
    pub heavy_volatile_exposure: f64,
    /// Upper bound on total liquidation points.
    pub liquidation_penalty_cap: f64,
}

impl Default for ScoringThresholds {
    fn default() -> Self {
        Self {
            repayment_neutral_ratio: 0.5,
            excellent_repayment_ratio: 0.9,
            high_utilization: 0.8,
            // Half an event and two events per 30 days.
            dormant_activity_frequency: 0.5 / 30.0,
            frequent_activity_frequency: 2.0 / 30.0,
            diversification_saturation: 3,
            mature_account_days: 365.0,
            recent_activity_days: 7.0,
            dormant_days: 90.0,
            recent_liquidation_days: 90.0,
            heavy_volatile_exposure: 0.7,
            liquidation_penalty_cap: f64::from(MAX_SCORE),
        }
    }
}

impl ScoringThresholds {
    #[must_use]
    pub fn with_overrides(self, o: &ThresholdOverrides) -> Self {
        Self {
            repayment_neutral_ratio: o
                .repayment_neutral_ratio
                .unwrap_or(self.repayment_neutral_ratio),
            excellent_repayment_ratio: o
                .excellent_repayment_ratio
                .unwrap_or(self.excellent_repayment_ratio),
            high_utilization: o.high_utilization.unwrap_or(self.high_utilization),
            dormant_activity_frequency: o
                .dormant_activity_frequency
                .unwrap_or(self.dormant_activity_frequency),
            frequent_activity_frequency: o
                .frequent_activity_frequency
                .unwrap_or(self.frequent_activity_frequency),
            diversification_saturation: o
                .diversification_saturation
                .unwrap_or(self.diversification_saturation),
            mature_account_days: o.mature_account_days.unwrap_or(self.mature_account_days),
            recent_activity_days: o.recent_activity_days.unwrap_or(self.recent_activity_days),
            dormant_days: o.dormant_days.unwrap_or(self.dormant_days),
            recent_liquidation_days: o
                .recent_liquidation_days
                .unwrap_or(self.recent_liquidation_days),
            heavy_volatile_exposure: o
                .heavy_volatile_exposure
                .unwrap_or(self.heavy_volatile_exposure),
            liquidation_penalty_cap: o
                .liquidation_penalty_cap
                .unwrap_or(self.liquidation_penalty_cap),
        }
    }

    pub fn validate(&self) -> Result<(), ScoringError> {
        let invalid = |name, value, reason| {
            Err(ScoringError::InvalidParameter {
                name,
                value,
                reason,
            })
        };
        let reals = [
            ("repayment_neutral_ratio", self.repayment_neutral_ratio),
            ("excellent_repayment_ratio", self.excellent_repayment_ratio),
            ("high_utilization", self.high_utilization),
            ("dormant_activity_frequency", self.dormant_activity_frequency),
            ("frequent_activity_frequency", self.frequent_activity_frequency),
            ("mature_account_days", self.mature_account_days),
            ("recent_activity_days", self.recent_activity_days),
            ("dormant_days", self.dormant_days),
            ("recent_liquidation_days", self.recent_liquidation_days),
            ("heavy_volatile_exposure", self.heavy_volatile_exposure),
            ("liquidation_penalty_cap", self.liquidation_penalty_cap),
        ];
        for (name, value) in reals {
            if !value.is_finite() || value < 0.0 {
                return invalid(name, value, "thresholds must be finite and non-negative");
            }
        }
        if self.repayment_neutral_ratio <= 0.0 || self.repayment_neutral_ratio >= 1.0 {
            return invalid(
                "repayment_neutral_ratio",
                self.repayment_neutral_ratio,
                "must lie strictly between 0 and 1",
            );
        }
        if self.frequent_activity_frequency <= self.dormant_activity_frequency {
            return invalid(
                "frequent_activity_frequency",
                self.frequent_activity_frequency,
                "must exceed dormant_activity_frequency",
            );
        }
        if self.diversification_saturation == 0 {
            return invalid("diversification_saturation", 0.0, "must be at least 1");
        }
        if self.dormant_days < self.recent_activity_days {
            return invalid(
                "dormant_days",
                self.dormant_days,
                "must not be below recent_activity_days",
            );
        }
        Ok(())
    }
}

/// Which rule fired, carrying the feature values it looked at.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum Adjustment {
    Liquidation { count: u32, days_since_last: f64 },
    Repayment { ratio: f64 },
    Utilization { utilization: f64 },
    Activity { frequency: f64 },
    Diversification { assets: u32 },
    Volatility { exposure: f64 },
    AccountMaturity { age_days: f64 },
    Recency { days_since_last_activity: f64 },
}

impl Adjustment {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Liquidation { .. } => "liquidation",
            Self::Repayment { .. } => "repayment",
            Self::Utilization { .. } => "utilization",
            Self::Activity { .. } => "activity",
            Self::Diversification { .. } => "diversification",
            Self::Volatility { .. } => "volatility",
            Self::AccountMaturity { .. } => "account_maturity",
            Self::Recency { .. } => "recency",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreAdjustment {
    #[serde(flatten)]
    pub adjustment: Adjustment,
    pub delta: i32,
}

pub fn liquidation_points(count: u32, w: &RiskWeights, t: &ScoringThresholds) -> f64 {
    -(f64::from(count) * w.liquidation_penalty).min(t.liquidation_penalty_cap)
}

/// Piecewise linear, continuous and non-decreasing in `ratio`:
/// full penalty at 0, neutral at `repayment_neutral_ratio`, full bonus from 1.0.
/// Wallets that never borrowed are neutral.
pub fn repayment_points(
    ratio: f64,
    total_borrowed: f64,
    w: &RiskWeights,
    t: &ScoringThresholds,
) -> f64 {
    if total_borrowed <= 0.0 {
        return 0.0;
    }
    let neutral = t.repayment_neutral_ratio;
    if ratio >= 1.0 {
        w.repayment_bonus_max
    } else if ratio >= neutral {
        w.repayment_bonus_max * (ratio - neutral) / (1.0 - neutral)
    } else if ratio > 0.0 {
        -w.repayment_penalty_max * (neutral - ratio) / neutral
    } else {
        -w.repayment_penalty_max
    }
}

pub fn utilization_points(utilization: f64, w: &RiskWeights) -> f64 {
    -w.utilization_penalty_max * utilization.clamp(0.0, 1.0)
}

pub fn activity_points(frequency: f64, w: &RiskWeights, t: &ScoringThresholds) -> f64 {
    let span = t.frequent_activity_frequency - t.dormant_activity_frequency;
    let fraction = ((frequency - t.dormant_activity_frequency) / span).clamp(0.0, 1.0);
    w.activity_bonus_max * fraction
}

pub fn diversification_points(assets: u32, w: &RiskWeights, t: &ScoringThresholds) -> f64 {
    let saturation = t.diversification_saturation.max(1);
    w.diversification_bonus_max * f64::from(assets.min(saturation)) / f64::from(saturation)
}

pub fn volatility_points(exposure: f64, w: &RiskWeights) -> f64 {
    -w.volatility_penalty * exposure.clamp(0.0, 1.0)
}

pub fn account_maturity_points(age_days: f64, w: &RiskWeights, t: &ScoringThresholds) -> f64 {
    if age_days >= t.mature_account_days {
        w.account_age_bonus
    } else {
        0.0
    }
}

/// Wallets with no events have no recency signal either way.
pub fn recency_points(
    days_since_last_activity: f64,
    total_transactions: u32,
    w: &RiskWeights,
    t: &ScoringThresholds,
) -> f64 {
    if total_transactions == 0 {
        0.0
    } else if days_since_last_activity <= t.recent_activity_days {
        w.recent_activity_bonus
    } else if days_since_last_activity > t.dormant_days {
        -w.dormancy_penalty
    } else {
        0.0
    }
}

/// Weighted-rule credit scorer. Weights are fixed for as long as the scorer is borrowed.
#[derive(Debug, Clone, Default)]
pub struct RiskScorer {
    weights: RiskWeights,
    thresholds: ScoringThresholds,
}

impl RiskScorer {
    pub fn new(weights: RiskWeights, thresholds: ScoringThresholds) -> Result<Self, ScoringError> {
        weights.validate()?;
        thresholds.validate()?;
        Ok(Self {
            weights,
            thresholds,
        })
    }

    /// Defaults with the config file's individual overrides applied.
    pub fn from_config(cfg: &Scoring) -> Result<Self, ScoringError> {
        Self::new(
            RiskWeights::default().with_overrides(&cfg.weights),
            ScoringThresholds::default().with_overrides(&cfg.thresholds),
        )
    }

    pub fn weights(&self) -> &RiskWeights {
        &self.weights
    }

    pub fn thresholds(&self) -> &ScoringThresholds {
        &self.thresholds
    }

    /// Applies to every later `score` call on this scorer.
    #[allow(dead_code)]
    pub fn set_weights(&mut self, weights: RiskWeights) -> Result<(), ScoringError> {
        weights.validate()?;
        self.weights = weights;
        Ok(())
    }

    pub fn score(&self, f: &FeatureVector) -> (i32, Vec<ScoreAdjustment>) {
        let w = &self.weights;
        let t = &self.thresholds;

        let rules = [
            (
                Adjustment::Liquidation {
                    count: f.liquidation_count,
                    days_since_last: f.days_since_last_liquidation,
                },
                liquidation_points(f.liquidation_count, w, t),
            ),
            (
                Adjustment::Repayment {
                    ratio: f.repayment_ratio,
                },
                repayment_points(f.repayment_ratio, f.total_borrowed, w, t),
            ),
            (
                Adjustment::Utilization {
                    utilization: f.current_utilization,
                },
                utilization_points(f.current_utilization, w),
            ),
            (
                Adjustment::Activity {
                    frequency: f.activity_frequency,
                },
                activity_points(f.activity_frequency, w, t),
            ),
            (
                Adjustment::Diversification {
                    assets: f.asset_diversity,
                },
                diversification_points(f.asset_diversity, w, t),
            ),
            (
                Adjustment::Volatility {
                    exposure: f.volatile_exposure,
                },
                volatility_points(f.volatile_exposure, w),
            ),
            (
                Adjustment::AccountMaturity {
                    age_days: f.account_age_days,
                },
                account_maturity_points(f.account_age_days, w, t),
            ),
            (
                Adjustment::Recency {
                    days_since_last_activity: f.days_since_last_activity,
                },
                recency_points(f.days_since_last_activity, f.total_transactions, w, t),
            ),
        ];

        let adjustments: Vec<ScoreAdjustment> = rules
            .into_iter()
            .map(|(adjustment, points)| ScoreAdjustment {
                adjustment,
                delta: points.round() as i32,
            })
            .filter(|a| a.delta != 0)
            .collect();

        // Clamp once, after summing, never per rule.
        let raw = i64::from(BASE_SCORE)
            + adjustments
                .iter()
                .map(|a| i64::from(a.delta))
                .sum::<i64>();
        let score = raw.clamp(i64::from(MIN_SCORE), i64::from(MAX_SCORE)) as i32;

        (score, adjustments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn neutral() -> FeatureVector {
        FeatureVector {
            days_since_last_liquidation: crate::wallet_features::NO_LIQUIDATION_DAYS,
            ..FeatureVector::default()
        }
    }

    /// liquidations 0, repayment 2.846, utilization 0, activity 3.41, 5 assets,
    /// active three days ago on a 200-day-old account.
    fn sample_good_wallet() -> FeatureVector {
        FeatureVector {
            total_transactions: 23,
            total_borrowed: 1_300.0,
            total_repaid: 3_700.0,
            repayment_ratio: 2.846,
            current_utilization: 0.0,
            activity_frequency: 3.41,
            asset_diversity: 5,
            account_age_days: 200.0,
            days_since_last_activity: 3.0,
            ..neutral()
        }
    }

    fn delta_of(adjustments: &[ScoreAdjustment], label: &str) -> Option<i32> {
        adjustments
            .iter()
            .find(|a| a.adjustment.label() == label)
            .map(|a| a.delta)
    }

    #[test]
    fn test_empty_wallet_scores_base() {
        let (score, adjustments) = RiskScorer::default().score(&neutral());
        assert_eq!(score, BASE_SCORE);
        assert!(adjustments.is_empty());
    }

    #[test]
    fn test_sample_wallet_scores_750() {
        let (score, adjustments) = RiskScorer::default().score(&sample_good_wallet());
        assert_eq!(score, 750);
        assert_eq!(delta_of(&adjustments, "repayment"), Some(100));
        assert_eq!(delta_of(&adjustments, "activity"), Some(50));
        assert_eq!(delta_of(&adjustments, "diversification"), Some(75));
        assert_eq!(delta_of(&adjustments, "recency"), Some(25));
        assert_eq!(delta_of(&adjustments, "utilization"), None);
    }

    #[test]
    fn test_adjustments_follow_rule_order() {
        let f = FeatureVector {
            liquidation_count: 1,
            current_utilization: 0.5,
            ..sample_good_wallet()
        };
        let (_, adjustments) = RiskScorer::default().score(&f);
        let labels: Vec<&str> = adjustments.iter().map(|a| a.adjustment.label()).collect();
        assert_eq!(
            labels,
            vec![
                "liquidation",
                "repayment",
                "utilization",
                "activity",
                "diversification",
                "recency"
            ]
        );
    }

    #[test]
    fn test_one_liquidation_costs_exactly_the_penalty() {
        let scorer = RiskScorer::default();
        let (before, _) = scorer.score(&sample_good_wallet());
        let (after, _) = scorer.score(&FeatureVector {
            liquidation_count: 1,
            ..sample_good_wallet()
        });
        assert_eq!(before - after, 200);
    }

    #[test]
    fn test_liquidations_clamp_at_zero() {
        let scorer = RiskScorer::default();
        for count in [3, 10, 10_000] {
            let (score, adjustments) = scorer.score(&FeatureVector {
                liquidation_count: count,
                ..neutral()
            });
            assert_eq!(score, MIN_SCORE);
            assert!(delta_of(&adjustments, "liquidation").unwrap() >= -1000);
        }
    }

    #[test]
    fn test_extreme_features_stay_in_bounds() {
        let scorer = RiskScorer::default();
        let extremes = [
            FeatureVector {
                liquidation_count: u32::MAX,
                total_borrowed: 1e300,
                current_utilization: 1e300,
                volatile_exposure: 1.0,
                total_transactions: 1,
                days_since_last_activity: 1e9,
                ..neutral()
            },
            FeatureVector {
                total_borrowed: 1.0,
                repayment_ratio: 1e300,
                activity_frequency: 1e300,
                asset_diversity: u32::MAX,
                account_age_days: 1e300,
                total_transactions: u32::MAX,
                ..neutral()
            },
        ];
        for f in &extremes {
            let (score, _) = scorer.score(f);
            assert!((MIN_SCORE..=MAX_SCORE).contains(&score), "score {score}");
        }
    }

    #[test]
    fn test_score_clamps_at_max_with_generous_weights() {
        let weights = RiskWeights {
            repayment_bonus_max: 900.0,
            ..RiskWeights::default()
        };
        let scorer = RiskScorer::new(weights, ScoringThresholds::default()).unwrap();
        let (score, _) = scorer.score(&sample_good_wallet());
        assert_eq!(score, MAX_SCORE);
    }

    #[test]
    fn test_repayment_mapping_endpoints_and_monotonicity() {
        let w = RiskWeights::default();
        let t = ScoringThresholds::default();
        assert!((repayment_points(0.0, 500.0, &w, &t) + 100.0).abs() < 1e-9);
        assert!((repayment_points(1.0, 500.0, &w, &t) - 100.0).abs() < 1e-9);
        assert!((repayment_points(7.5, 500.0, &w, &t) - 100.0).abs() < 1e-9);
        assert!(repayment_points(0.5, 500.0, &w, &t).abs() < 1e-9);
        assert!(repayment_points(0.0, 0.0, &w, &t).abs() < 1e-9);

        let mut prev = f64::NEG_INFINITY;
        for i in 0..=120 {
            let ratio = f64::from(i) / 100.0;
            let p = repayment_points(ratio, 500.0, &w, &t);
            assert!(p >= prev, "not monotonic at ratio {ratio}");
            prev = p;
        }
    }

    #[test]
    fn test_zero_repayment_with_borrow_history_gets_full_penalty() {
        let f = FeatureVector {
            total_borrowed: 1_000.0,
            repayment_ratio: 0.0,
            ..neutral()
        };
        let (score, adjustments) = RiskScorer::default().score(&f);
        assert_eq!(delta_of(&adjustments, "repayment"), Some(-100));
        assert_eq!(score, 400);
    }

    #[test]
    fn test_utilization_mapping_endpoints_and_monotonicity() {
        let w = RiskWeights::default();
        assert!(utilization_points(0.0, &w).abs() < 1e-9);
        assert!((utilization_points(1.0, &w) + 150.0).abs() < 1e-9);
        assert!((utilization_points(4.0, &w) + 150.0).abs() < 1e-9);

        let mut prev = f64::INFINITY;
        for i in 0..=150 {
            let u = f64::from(i) / 100.0;
            let p = utilization_points(u, &w);
            assert!(p <= prev, "not monotonic at utilization {u}");
            prev = p;
        }
    }

    #[test]
    fn test_activity_saturates_and_never_penalizes() {
        let w = RiskWeights::default();
        let t = ScoringThresholds::default();
        assert!(activity_points(0.0, &w, &t).abs() < 1e-9);
        assert!(activity_points(0.4 / 30.0, &w, &t).abs() < 1e-9);
        assert!((activity_points(1.25 / 30.0, &w, &t) - 25.0).abs() < 1e-9);
        assert!((activity_points(2.0 / 30.0, &w, &t) - 50.0).abs() < 1e-9);
        assert!((activity_points(1.0, &w, &t) - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_activity_is_measured_in_events_per_day() {
        let scorer = RiskScorer::default();
        // 12 events over 90 days: about 0.13 per day, above two per month.
        let steady = FeatureVector {
            total_transactions: 12,
            activity_frequency: 12.0 / 90.0,
            account_age_days: 90.0,
            days_since_last_activity: 30.0,
            ..neutral()
        };
        let (_, adjustments) = scorer.score(&steady);
        assert_eq!(delta_of(&adjustments, "activity"), Some(50));

        // One event over 90 days stays under the dormant threshold.
        let sparse = FeatureVector {
            total_transactions: 1,
            activity_frequency: 1.0 / 90.0,
            ..steady
        };
        let (_, adjustments) = scorer.score(&sparse);
        assert_eq!(delta_of(&adjustments, "activity"), None);
    }

    #[test]
    fn test_diversification_has_diminishing_returns() {
        let w = RiskWeights::default();
        let t = ScoringThresholds::default();
        assert!(diversification_points(0, &w, &t).abs() < 1e-9);
        assert!((diversification_points(1, &w, &t) - 25.0).abs() < 1e-9);
        assert!((diversification_points(3, &w, &t) - 75.0).abs() < 1e-9);
        assert!((diversification_points(12, &w, &t) - 75.0).abs() < 1e-9);
    }

    #[test]
    fn test_volatility_scales_with_exposure() {
        let w = RiskWeights::default();
        assert!(volatility_points(0.0, &w).abs() < 1e-9);
        assert!((volatility_points(0.25, &w) + 25.0).abs() < 1e-9);
        assert!((volatility_points(1.0, &w) + 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_recency_requires_activity() {
        let w = RiskWeights::default();
        let t = ScoringThresholds::default();
        assert!(recency_points(0.0, 0, &w, &t).abs() < 1e-9);
        assert!((recency_points(2.0, 4, &w, &t) - 25.0).abs() < 1e-9);
        assert!(recency_points(30.0, 4, &w, &t).abs() < 1e-9);
        assert!((recency_points(120.0, 4, &w, &t) + 75.0).abs() < 1e-9);
    }

    #[test]
    fn test_set_weights_applies_to_later_calls() {
        let mut scorer = RiskScorer::default();
        let f = FeatureVector {
            liquidation_count: 1,
            ..neutral()
        };
        assert_eq!(scorer.score(&f).0, 300);

        scorer
            .set_weights(RiskWeights {
                liquidation_penalty: 50.0,
                ..RiskWeights::default()
            })
            .unwrap();
        assert_eq!(scorer.score(&f).0, 450);
    }

    #[test]
    fn test_invalid_weights_are_rejected() {
        let negative = RiskWeights {
            volatility_penalty: -100.0,
            ..RiskWeights::default()
        };
        assert!(matches!(
            RiskScorer::new(negative, ScoringThresholds::default()),
            Err(ScoringError::InvalidParameter {
                name: "volatility_penalty",
                ..
            })
        ));

        let mut scorer = RiskScorer::default();
        assert!(scorer
            .set_weights(RiskWeights {
                liquidation_penalty: f64::NAN,
                ..RiskWeights::default()
            })
            .is_err());
        assert!((scorer.weights().liquidation_penalty - 200.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_invalid_thresholds_are_rejected() {
        let inverted = ScoringThresholds {
            dormant_activity_frequency: 3.0,
            frequent_activity_frequency: 2.0,
            ..ScoringThresholds::default()
        };
        assert!(RiskScorer::new(RiskWeights::default(), inverted).is_err());

        let zero_saturation = ScoringThresholds {
            diversification_saturation: 0,
            ..ScoringThresholds::default()
        };
        assert!(RiskScorer::new(RiskWeights::default(), zero_saturation).is_err());
    }

    #[test]
    fn test_from_config_applies_individual_overrides() {
        let cfg = Scoring {
            as_of_epoch: None,
            volatile_assets: vec!["ETH".to_string()],
            weights: WeightOverrides {
                liquidation_penalty: Some(250.0),
                ..WeightOverrides::default()
            },
            thresholds: ThresholdOverrides {
                diversification_saturation: Some(5),
                ..ThresholdOverrides::default()
            },
        };
        let scorer = RiskScorer::from_config(&cfg).unwrap();
        assert!((scorer.weights().liquidation_penalty - 250.0).abs() < f64::EPSILON);
        assert!((scorer.weights().utilization_penalty_max - 150.0).abs() < f64::EPSILON);
        assert_eq!(scorer.thresholds().diversification_saturation, 5);
    }
}
