use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::DateTime;
use csv::{ReaderBuilder, Trim, WriterBuilder};
use serde::Serialize;

use crate::pipeline::{BatchOutcome, WalletRow};
use crate::wallet_features::FeatureVector;

pub const SIMPLE_HEADER: [&str; 2] = ["wallet_id", "score"];
pub const DETAILED_HEADER: [&str; 8] = [
    "wallet_id",
    "score",
    "explanation",
    "liquidation_count",
    "repayment_ratio",
    "current_utilization",
    "activity_frequency",
    "asset_diversity",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskBand {
    High,
    Medium,
    Low,
}

impl RiskBand {
    pub const ALL: [RiskBand; 3] = [RiskBand::High, RiskBand::Medium, RiskBand::Low];

    pub fn from_score(score: i32) -> Self {
        match score {
            i32::MIN..=299 => RiskBand::High,
            300..=699 => RiskBand::Medium,
            _ => RiskBand::Low,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RiskBand::High => "High risk",
            RiskBand::Medium => "Medium risk",
            RiskBand::Low => "Low risk",
        }
    }

    pub fn range(self) -> &'static str {
        match self {
            RiskBand::High => "0-299",
            RiskBand::Medium => "300-699",
            RiskBand::Low => "700-1000",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BandCount {
    pub band: RiskBand,
    pub range: &'static str,
    pub count: usize,
    /// Share of scored wallets, 0-100.
    pub percent: f64,
}

/// Aggregate view of a batch. Statistics cover scored wallets only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSummary {
    pub as_of: String,
    pub total: usize,
    pub scored: usize,
    pub skipped: usize,
    pub skipped_by_reason: BTreeMap<&'static str, usize>,
    pub mean_score: f64,
    /// Sample standard deviation; 0 with fewer than two scores.
    pub score_std_dev: f64,
    pub bands: Vec<BandCount>,
    pub wallets_with_liquidations: usize,
    pub mean_repayment_ratio: f64,
    pub mean_utilization: f64,
    pub mean_asset_diversity: f64,
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn sample_std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    var.sqrt()
}

impl BatchSummary {
    pub fn from_outcome(outcome: &BatchOutcome, as_of: i64) -> Self {
        let results: Vec<_> = outcome.scored.iter().map(|(_, r)| r).collect();
        let scores: Vec<f64> = results.iter().map(|r| f64::from(r.score)).collect();
        let scored = results.len();

        let bands = RiskBand::ALL
            .iter()
            .map(|&band| {
                let count = results
                    .iter()
                    .filter(|r| RiskBand::from_score(r.score) == band)
                    .count();
                let percent = if scored == 0 {
                    0.0
                } else {
                    count as f64 * 100.0 / scored as f64
                };
                BandCount {
                    band,
                    range: band.range(),
                    count,
                    percent,
                }
            })
            .collect();

        let mut skipped_by_reason = BTreeMap::new();
        for (_, failure) in &outcome.skipped {
            *skipped_by_reason.entry(failure.error.reason()).or_insert(0) += 1;
        }

        let feature_mean = |f: fn(&FeatureVector) -> f64| {
            mean(&results.iter().map(|r| f(&r.features)).collect::<Vec<_>>())
        };

        Self {
            as_of: DateTime::from_timestamp(as_of, 0)
                .map_or_else(|| as_of.to_string(), |t| t.to_rfc3339()),
            total: outcome.total,
            scored,
            skipped: outcome.skipped.len(),
            skipped_by_reason,
            mean_score: mean(&scores),
            score_std_dev: sample_std_dev(&scores),
            bands,
            wallets_with_liquidations: results
                .iter()
                .filter(|r| r.features.liquidation_count > 0)
                .count(),
            mean_repayment_ratio: feature_mean(|f: &FeatureVector| f.repayment_ratio),
            mean_utilization: feature_mean(|f: &FeatureVector| f.current_utilization),
            mean_asset_diversity: feature_mean(|f: &FeatureVector| f64::from(f.asset_diversity)),
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "=== WALLET RISK SCORING SUMMARY ===");
        let _ = writeln!(out, "As of: {}", self.as_of);
        let _ = writeln!(
            out,
            "Total wallets processed: {} (scored {}, skipped {})",
            self.total, self.scored, self.skipped
        );
        let _ = writeln!(
            out,
            "Average risk score: {:.1} (std dev {:.1})",
            self.mean_score, self.score_std_dev
        );
        let _ = writeln!(out, "Score distribution:");
        for b in &self.bands {
            let _ = writeln!(
                out,
                "  {} ({}): {} ({:.1}%)",
                b.band.label(),
                b.range,
                b.count,
                b.percent
            );
        }
        let _ = writeln!(
            out,
            "Wallets with liquidations: {}",
            self.wallets_with_liquidations
        );
        let _ = writeln!(out, "Mean repayment ratio: {:.3}", self.mean_repayment_ratio);
        let _ = writeln!(out, "Mean utilization: {:.3}", self.mean_utilization);
        let _ = writeln!(out, "Mean asset diversity: {:.2}", self.mean_asset_diversity);
        if !self.skipped_by_reason.is_empty() {
            let reasons: Vec<String> = self
                .skipped_by_reason
                .iter()
                .map(|(reason, n)| format!("{reason}={n}"))
                .collect();
            let _ = writeln!(out, "Skipped by reason: {}", reasons.join(", "));
        }
        out
    }
}

/// One id per record, first column. Blank records and a leading `wallet_id` header
/// are ignored.
pub fn parse_wallet_ids<R: Read>(reader: R) -> Result<Vec<String>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader);

    let mut ids = Vec::new();
    let mut first_record = true;
    for record in rdr.records() {
        let record = record.context("failed to parse wallet list record")?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        let id = record.get(0).unwrap_or_default();
        let is_header = first_record && id.eq_ignore_ascii_case("wallet_id");
        first_record = false;
        if !is_header {
            ids.push(id.to_string());
        }
    }
    Ok(ids)
}

pub fn read_wallet_ids(path: &Path) -> Result<Vec<String>> {
    let file = File::open(path)
        .with_context(|| format!("failed to open wallet list {}", path.display()))?;
    parse_wallet_ids(file).with_context(|| format!("failed to read wallet list {}", path.display()))
}

#[derive(Debug, Serialize)]
struct SimpleRow<'a> {
    wallet_id: &'a str,
    score: Option<i32>,
}

/// Skipped wallets leave every numeric column empty.
#[derive(Debug, Default, Serialize)]
struct DetailedRow<'a> {
    wallet_id: &'a str,
    score: Option<i32>,
    explanation: Cow<'a, str>,
    liquidation_count: Option<u32>,
    repayment_ratio: Option<String>,
    current_utilization: Option<String>,
    activity_frequency: Option<String>,
    asset_diversity: Option<u32>,
}

impl<'a> DetailedRow<'a> {
    fn from_row(row: WalletRow<'a>) -> Self {
        match row {
            WalletRow::Scored(r) => {
                let f = &r.features;
                DetailedRow {
                    wallet_id: &r.wallet_id,
                    score: Some(r.score),
                    explanation: Cow::Borrowed(&r.explanation),
                    liquidation_count: Some(f.liquidation_count),
                    repayment_ratio: Some(format!("{:.3}", f.repayment_ratio)),
                    current_utilization: Some(format!("{:.3}", f.current_utilization)),
                    activity_frequency: Some(format!("{:.4}", f.activity_frequency)),
                    asset_diversity: Some(f.asset_diversity),
                }
            }
            WalletRow::Skipped(failure) => DetailedRow {
                wallet_id: &failure.wallet_id,
                explanation: Cow::Owned(format!("skipped: {}", failure.error.reason())),
                ..DetailedRow::default()
            },
        }
    }
}

pub fn write_simple_csv<W: Write>(w: W, outcome: &BatchOutcome) -> Result<()> {
    let mut wtr = WriterBuilder::new().has_headers(false).from_writer(w);
    wtr.write_record(SIMPLE_HEADER)?;
    for row in outcome.rows() {
        let score = match row {
            WalletRow::Scored(r) => Some(r.score),
            WalletRow::Skipped(_) => None,
        };
        wtr.serialize(SimpleRow {
            wallet_id: row.wallet_id(),
            score,
        })?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_detailed_csv<W: Write>(w: W, outcome: &BatchOutcome) -> Result<()> {
    let mut wtr = WriterBuilder::new().has_headers(false).from_writer(w);
    wtr.write_record(DETAILED_HEADER)?;
    for row in outcome.rows() {
        wtr.serialize(DetailedRow::from_row(row))?;
    }
    wtr.flush()?;
    Ok(())
}

fn sibling_path(output: &Path, suffix: &str) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    output.with_file_name(format!("{stem}{suffix}"))
}

/// `out/wallet_scores.csv` -> `out/wallet_scores_detailed.csv`
pub fn detailed_path(output: &Path) -> PathBuf {
    sibling_path(output, "_detailed.csv")
}

pub fn summary_path(output: &Path) -> PathBuf {
    sibling_path(output, "_summary.json")
}

fn create_file(path: &Path) -> Result<BufWriter<File>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    Ok(BufWriter::new(file))
}

/// Writes the simple CSV, the detailed CSV and the JSON summary. Returns the paths written.
pub fn write_outputs(
    output: &Path,
    outcome: &BatchOutcome,
    summary: &BatchSummary,
) -> Result<Vec<PathBuf>> {
    let detailed = detailed_path(output);
    let summary_file = summary_path(output);

    write_simple_csv(create_file(output)?, outcome)
        .with_context(|| format!("failed to write {}", output.display()))?;
    write_detailed_csv(create_file(&detailed)?, outcome)
        .with_context(|| format!("failed to write {}", detailed.display()))?;

    let mut w = create_file(&summary_file)?;
    serde_json::to_writer_pretty(&mut w, summary)?;
    writeln!(w)?;
    w.flush()?;

    Ok(vec![output.to_path_buf(), detailed, summary_file])
}
