use crate::wallet_features::FeatureVector;
use crate::wallet_scoring::{Adjustment, ScoreAdjustment, ScoringThresholds};

pub const NEUTRAL_EXPLANATION: &str = "Neutral / insufficient signal";
pub const SEPARATOR: &str = "; ";

/// Turns a scorer's adjustments into a short human-readable reason string.
#[derive(Debug, Clone)]
pub struct ExplanationGenerator {
    thresholds: ScoringThresholds,
}

impl ExplanationGenerator {
    /// Must be built with the same thresholds the scorer used.
    pub fn new(thresholds: ScoringThresholds) -> Self {
        Self { thresholds }
    }

    pub fn explain(&self, features: &FeatureVector, adjustments: &[ScoreAdjustment]) -> String {
        let phrases: Vec<String> = adjustments
            .iter()
            .flat_map(|a| self.phrases(features, a))
            .collect();
        if phrases.is_empty() {
            NEUTRAL_EXPLANATION.to_string()
        } else {
            phrases.join(SEPARATOR)
        }
    }

    fn phrases(&self, features: &FeatureVector, a: &ScoreAdjustment) -> Vec<String> {
        let t = &self.thresholds;
        let positive = a.delta > 0;
        match a.adjustment {
            Adjustment::Liquidation { count, .. } => {
                let mut out = vec![format!("History of liquidations ({count})")];
                if features.days_since_last_liquidation < t.recent_liquidation_days {
                    out.push("Recent liquidation".to_string());
                }
                out
            }
            Adjustment::Repayment { ratio } => {
                let phrase = if !positive {
                    "Poor repayment history"
                } else if ratio >= t.excellent_repayment_ratio {
                    "Excellent repayment history"
                } else {
                    "Good repayment history"
                };
                vec![phrase.to_string()]
            }
            Adjustment::Utilization { utilization } => {
                let phrase = if utilization >= t.high_utilization {
                    "High utilization risk"
                } else {
                    "Moderate utilization"
                };
                vec![phrase.to_string()]
            }
            Adjustment::Activity { frequency } => {
                let phrase = if frequency >= t.frequent_activity_frequency {
                    "Active user"
                } else {
                    "Occasionally active user"
                };
                vec![phrase.to_string()]
            }
            Adjustment::Diversification { assets } => {
                let phrase = if assets >= t.diversification_saturation {
                    "Well-diversified portfolio"
                } else {
                    "Limited asset diversification"
                };
                vec![phrase.to_string()]
            }
            Adjustment::Volatility { exposure } => {
                let phrase = if exposure >= t.heavy_volatile_exposure {
                    "Heavy volatile-asset exposure"
                } else {
                    "Some volatile-asset exposure"
                };
                vec![phrase.to_string()]
            }
            Adjustment::AccountMaturity { .. } => vec!["Mature account".to_string()],
            Adjustment::Recency { .. } => {
                let phrase = if positive {
                    "Recently active"
                } else {
                    "Dormant account"
                };
                vec![phrase.to_string()]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet_features::NO_LIQUIDATION_DAYS;
    use crate::wallet_scoring::RiskScorer;

    fn explain(f: &FeatureVector) -> String {
        let scorer = RiskScorer::default();
        let (_, adjustments) = scorer.score(f);
        ExplanationGenerator::new(*scorer.thresholds()).explain(f, &adjustments)
    }

    fn neutral() -> FeatureVector {
        FeatureVector {
            days_since_last_liquidation: NO_LIQUIDATION_DAYS,
            ..FeatureVector::default()
        }
    }

    #[test]
    fn test_no_adjustments_is_neutral() {
        assert_eq!(explain(&neutral()), NEUTRAL_EXPLANATION);
        let generator = ExplanationGenerator::new(ScoringThresholds::default());
        assert_eq!(generator.explain(&neutral(), &[]), NEUTRAL_EXPLANATION);
    }

    #[test]
    fn test_good_wallet_phrases_in_rule_order() {
        let f = FeatureVector {
            total_transactions: 23,
            total_borrowed: 1_300.0,
            repayment_ratio: 2.846,
            activity_frequency: 3.41,
            asset_diversity: 5,
            account_age_days: 200.0,
            days_since_last_activity: 3.0,
            ..neutral()
        };
        assert_eq!(
            explain(&f),
            "Excellent repayment history; Active user; Well-diversified portfolio; Recently active"
        );
    }

    #[test]
    fn test_risky_wallet_phrases() {
        let f = FeatureVector {
            total_transactions: 6,
            liquidation_count: 2,
            days_since_last_liquidation: 12.0,
            total_borrowed: 900.0,
            repayment_ratio: 0.1,
            current_utilization: 0.95,
            asset_diversity: 1,
            volatile_exposure: 0.9,
            days_since_last_activity: 120.0,
            account_age_days: 400.0,
            ..neutral()
        };
        assert_eq!(
            explain(&f),
            "History of liquidations (2); Recent liquidation; Poor repayment history; \
             High utilization risk; Limited asset diversification; \
             Heavy volatile-asset exposure; Mature account; Dormant account"
        );
    }

    #[test]
    fn test_old_liquidation_is_not_recent() {
        let f = FeatureVector {
            liquidation_count: 1,
            days_since_last_liquidation: 300.0,
            ..neutral()
        };
        assert_eq!(explain(&f), "History of liquidations (1)");
    }

    #[test]
    fn test_moderate_variants() {
        let f = FeatureVector {
            total_transactions: 4,
            total_borrowed: 100.0,
            repayment_ratio: 0.75,
            current_utilization: 0.3,
            activity_frequency: 1.0 / 30.0,
            volatile_exposure: 0.2,
            days_since_last_activity: 30.0,
            ..neutral()
        };
        assert_eq!(
            explain(&f),
            "Good repayment history; Moderate utilization; Occasionally active user; \
             Some volatile-asset exposure"
        );
    }
}
