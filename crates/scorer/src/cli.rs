use std::fmt::Write as _;

use crate::pipeline::RiskScoreResult;
use crate::report::RiskBand;
use crate::wallet_scoring::RiskScorer;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Score every wallet in the configured input file.
    Run,
    Wallet { address: String },
    Weights,
}

pub fn parse_args<I>(mut args: I) -> std::result::Result<Command, String>
where
    I: Iterator<Item = String>,
{
    // Drop argv[0].
    let _ = args.next();

    let Some(cmd) = args.next() else {
        return Ok(Command::Run);
    };

    match cmd.as_str() {
        "run" => Ok(Command::Run),
        "wallet" => {
            let address = args
                .next()
                .ok_or_else(|| "usage: scorer wallet <address>".to_string())?;
            Ok(Command::Wallet { address })
        }
        "weights" => Ok(Command::Weights),
        other => Err(format!("unknown command: {other}")),
    }
}

pub fn render_weights(scorer: &RiskScorer) -> String {
    let mut out = String::from("Risk weights:\n");
    for (name, value) in scorer.weights().named() {
        let _ = writeln!(out, "  {name:<28} {value:>8.1}");
    }
    let t = scorer.thresholds();
    let _ = writeln!(out, "Thresholds:");
    let thresholds = [
        ("repayment_neutral_ratio", t.repayment_neutral_ratio),
        ("excellent_repayment_ratio", t.excellent_repayment_ratio),
        ("high_utilization", t.high_utilization),
        ("dormant_activity_frequency", t.dormant_activity_frequency),
        ("frequent_activity_frequency", t.frequent_activity_frequency),
        (
            "diversification_saturation",
            f64::from(t.diversification_saturation),
        ),
        ("mature_account_days", t.mature_account_days),
        ("recent_activity_days", t.recent_activity_days),
        ("dormant_days", t.dormant_days),
        ("recent_liquidation_days", t.recent_liquidation_days),
        ("heavy_volatile_exposure", t.heavy_volatile_exposure),
        ("liquidation_penalty_cap", t.liquidation_penalty_cap),
    ];
    for (name, value) in thresholds {
        let _ = writeln!(out, "  {name:<28} {value:>10.4}");
    }
    out
}

pub fn render_wallet(result: &RiskScoreResult) -> String {
    let mut out = String::new();
    let band = RiskBand::from_score(result.score);
    let _ = writeln!(out, "Wallet: {}", result.wallet_id);
    let _ = writeln!(
        out,
        "Score:  {} ({}, {})",
        result.score,
        band.label(),
        band.range()
    );
    let _ = writeln!(out, "Why:    {}", result.explanation);
    let _ = writeln!(out, "Adjustments:");
    if result.adjustments.is_empty() {
        let _ = writeln!(out, "  (none)");
    }
    for a in &result.adjustments {
        let _ = writeln!(out, "  {:<18} {:>+5}", a.adjustment.label(), a.delta);
    }
    let f = &result.features;
    let _ = writeln!(out, "Features:");
    let counts = [
        ("total_transactions", f.total_transactions),
        ("liquidation_count", f.liquidation_count),
        ("asset_diversity", f.asset_diversity),
        ("active_positions", f.active_positions),
    ];
    for (name, value) in counts {
        let _ = writeln!(out, "  {name:<28} {value:>12}");
    }
    for (name, value) in f.real_features() {
        let _ = writeln!(out, "  {name:<28} {value:>12.3}");
    }
    out
}
