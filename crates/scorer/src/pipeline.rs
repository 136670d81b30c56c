use std::future::Future;
use std::time::Duration;

use common::config::Ingestion;
use common::error::FetchError;
use common::types::{WalletAddress, WalletHistory};
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::error::ScoringError;
use crate::explanation::ExplanationGenerator;
use crate::wallet_features::{FeatureExtractor, FeatureVector};
use crate::wallet_scoring::{RiskScorer, ScoreAdjustment};

/// Where wallet histories come from. One call is one request; pacing and retries
/// are the pipeline's job.
pub trait WalletDataSource {
    fn source_name(&self) -> &'static str;

    fn fetch_wallet(
        &self,
        address: &WalletAddress,
    ) -> impl Future<Output = Result<WalletHistory, FetchError>> + Send;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchPolicy {
    /// Slept before every request, including the first.
    pub rate_limit_delay: Duration,
    /// Retries after the first attempt, for transient failures only.
    pub max_retries: u32,
    pub backoff_base: Duration,
    pub max_backoff: Duration,
}

impl FetchPolicy {
    pub fn from_config(cfg: &Ingestion) -> Self {
        Self {
            rate_limit_delay: Duration::from_millis(cfg.rate_limit_delay_ms),
            max_retries: cfg.max_retries,
            backoff_base: Duration::from_millis(cfg.backoff_base_ms),
            max_backoff: Duration::from_millis(cfg.max_backoff_ms),
        }
    }

    /// Wait before retry number `retry` (1-based): `base * 2^(retry-1)`, capped.
    pub fn backoff_for(&self, retry: u32) -> Duration {
        let exp = retry.saturating_sub(1).min(31);
        self.backoff_base
            .saturating_mul(1_u32 << exp)
            .min(self.max_backoff)
    }

    fn delay_before(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            self.rate_limit_delay
        } else {
            self.backoff_for(attempt).max(self.rate_limit_delay)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskScoreResult {
    pub wallet_id: String,
    pub score: i32,
    pub adjustments: Vec<ScoreAdjustment>,
    pub explanation: String,
    pub features: FeatureVector,
}

#[derive(Debug)]
pub struct WalletFailure {
    /// The id as given in the input, trimmed.
    pub wallet_id: String,
    pub error: ScoringError,
}

/// Results of one batch. Both sequences keep input order and carry the input index.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub total: usize,
    pub scored: Vec<(usize, RiskScoreResult)>,
    pub skipped: Vec<(usize, WalletFailure)>,
}

#[derive(Debug, Clone, Copy)]
pub enum WalletRow<'a> {
    Scored(&'a RiskScoreResult),
    Skipped(&'a WalletFailure),
}

impl<'a> WalletRow<'a> {
    pub fn wallet_id(&self) -> &'a str {
        match *self {
            WalletRow::Scored(r) => &r.wallet_id,
            WalletRow::Skipped(f) => &f.wallet_id,
        }
    }
}

impl BatchOutcome {
    /// Successes and failures merged back into input order.
    pub fn rows(&self) -> Vec<WalletRow<'_>> {
        let scored = self.scored.iter().map(|(i, r)| (*i, WalletRow::Scored(r)));
        let skipped = self.skipped.iter().map(|(i, f)| (*i, WalletRow::Skipped(f)));
        let mut rows: Vec<(usize, WalletRow<'_>)> = scored.chain(skipped).collect();
        rows.sort_by_key(|(i, _)| *i);
        rows.into_iter().map(|(_, row)| row).collect()
    }
}

/// Fetch -> extract -> score -> explain, one wallet at a time in input order.
pub struct BatchPipeline<'a> {
    scorer: &'a RiskScorer,
    extractor: FeatureExtractor,
    explainer: ExplanationGenerator,
    policy: FetchPolicy,
}

impl<'a> BatchPipeline<'a> {
    pub fn new(scorer: &'a RiskScorer, extractor: FeatureExtractor, policy: FetchPolicy) -> Self {
        Self {
            scorer,
            explainer: ExplanationGenerator::new(*scorer.thresholds()),
            extractor,
            policy,
        }
    }

    /// The synchronous part: no I/O, same input gives the same result.
    pub fn evaluate(
        &self,
        wallet_id: &str,
        history: &WalletHistory,
    ) -> Result<RiskScoreResult, ScoringError> {
        let features = self.extractor.extract(&history.events, &history.snapshot)?;
        let (score, adjustments) = self.scorer.score(&features);
        let explanation = self.explainer.explain(&features, &adjustments);
        debug!(
            wallet = wallet_id,
            score,
            adjustments = adjustments.len(),
            "wallet scored"
        );
        Ok(RiskScoreResult {
            wallet_id: wallet_id.to_string(),
            score,
            adjustments,
            explanation,
            features,
        })
    }

    pub async fn score_wallet<S>(
        &self,
        source: &S,
        wallet_id: &str,
    ) -> Result<RiskScoreResult, ScoringError>
    where
        S: WalletDataSource + Sync,
    {
        let address = WalletAddress::parse(wallet_id)?;
        let history = self.fetch_with_retry(source, &address).await?;
        self.evaluate(address.as_str(), &history)
    }

    /// Paced, retried fetch. Only `FetchError::Transient` is retried.
    pub async fn fetch_with_retry<S>(
        &self,
        source: &S,
        address: &WalletAddress,
    ) -> Result<WalletHistory, ScoringError>
    where
        S: WalletDataSource + Sync,
    {
        let mut attempts = 0_u32;
        loop {
            let delay = self.policy.delay_before(attempts);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            attempts += 1;

            let started = Instant::now();
            let result = source.fetch_wallet(address).await;
            let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
            let source_name = source.source_name();
            metrics::histogram!("scorer_fetch_latency_ms", "source" => source_name)
                .record(elapsed_ms);

            // Amounts that overflowed in conversion are bad data, not a scoring defect.
            let checked = result.and_then(|h| h.check_amounts().map(|()| h));
            match checked {
                Ok(history) => {
                    metrics::counter!("scorer_fetch_attempts_total", "status" => "ok")
                        .increment(1);
                    return Ok(history);
                }
                Err(e) if e.is_retryable() && attempts <= self.policy.max_retries => {
                    metrics::counter!("scorer_fetch_attempts_total", "status" => "retry")
                        .increment(1);
                    warn!(
                        wallet = %address,
                        attempt = attempts,
                        backoff_ms = self.policy.delay_before(attempts).as_millis() as u64,
                        error = %e,
                        "fetch failed, retrying"
                    );
                }
                Err(e) => {
                    metrics::counter!("scorer_fetch_attempts_total", "status" => e.kind())
                        .increment(1);
                    return Err(ScoringError::DataUnavailable {
                        wallet: address.to_string(),
                        attempts,
                        source: e,
                    });
                }
            }
        }
    }

    /// Scores every wallet. Per-wallet failures are recorded and skipped; any other
    /// error aborts the batch.
    pub async fn process<S>(
        &self,
        wallet_ids: &[String],
        source: &S,
    ) -> Result<BatchOutcome, ScoringError>
    where
        S: WalletDataSource + Sync,
    {
        info!(
            wallets = wallet_ids.len(),
            source = source.source_name(),
            as_of = self.extractor.as_of(),
            "batch started"
        );
        let mut outcome = BatchOutcome {
            total: wallet_ids.len(),
            ..BatchOutcome::default()
        };

        for (index, wallet_id) in wallet_ids.iter().enumerate() {
            match self.score_wallet(source, wallet_id).await {
                Ok(result) => {
                    metrics::counter!("scorer_wallets_scored_total").increment(1);
                    metrics::histogram!("scorer_wallet_score").record(f64::from(result.score));
                    outcome.scored.push((index, result));
                }
                Err(e) if e.is_per_wallet() => {
                    metrics::counter!("scorer_wallets_skipped_total", "reason" => e.reason())
                        .increment(1);
                    warn!(
                        wallet = wallet_id.trim(),
                        reason = e.reason(),
                        error = %e,
                        "wallet skipped"
                    );
                    outcome.skipped.push((
                        index,
                        WalletFailure {
                            wallet_id: wallet_id.trim().to_string(),
                            error: e,
                        },
                    ));
                }
                Err(e) => {
                    error!(wallet = wallet_id.trim(), error = %e, "batch aborted");
                    return Err(e);
                }
            }
        }

        info!(
            total = outcome.total,
            scored = outcome.scored.len(),
            skipped = outcome.skipped.len(),
            "batch finished"
        );
        Ok(outcome)
    }
}
