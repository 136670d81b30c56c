use common::error::{AddressError, FetchError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScoringError {
    /// Wallet identifier failed the address-shape check. Per-wallet.
    #[error("malformed wallet id: {0}")]
    MalformedInput(#[from] AddressError),

    /// Fetch failed, retries exhausted, or the provider has no history. Per-wallet.
    #[error("data unavailable for {wallet} after {attempts} attempt(s): {source}")]
    DataUnavailable {
        wallet: String,
        attempts: u32,
        #[source]
        source: FetchError,
    },

    /// A feature came out non-finite. This is a bug in extraction, not bad data.
    #[error("feature {feature} is not finite ({value})")]
    Computation { feature: &'static str, value: f64 },

    #[error("invalid scoring parameter {name} = {value}: {reason}")]
    InvalidParameter {
        name: &'static str,
        value: f64,
        reason: &'static str,
    },
}

impl ScoringError {
    /// Per-wallet errors are recorded and the batch moves on; the rest abort the run.
    pub fn is_per_wallet(&self) -> bool {
        matches!(self, Self::MalformedInput(_) | Self::DataUnavailable { .. })
    }

    pub fn reason(&self) -> &'static str {
        match self {
            Self::MalformedInput(_) => "malformed_input",
            Self::DataUnavailable { .. } => "data_unavailable",
            Self::Computation { .. } => "computation_error",
            Self::InvalidParameter { .. } => "invalid_parameter",
        }
    }
}
