use thiserror::Error;

/// Failure of the chain data provider for one wallet.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// Timeouts, connection resets, 429 and 5xx responses. Worth retrying.
    #[error("transient data source failure: {0}")]
    Transient(String),
    /// The provider has no lending history for the address.
    #[error("no lending history for {0}")]
    NotFound(String),
    /// The provider answered with something we cannot use.
    #[error("invalid data source response: {0}")]
    Invalid(String),
}

impl FetchError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transient(_) => "transient",
            Self::NotFound(_) => "not_found",
            Self::Invalid(_) => "invalid",
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AddressError {
    #[error("wallet address is empty")]
    Empty,
    #[error("wallet address {0:?} is missing the 0x prefix")]
    MissingPrefix(String),
    #[error("wallet address {address:?} has {digits} hex digits, expected 40")]
    BadLength { address: String, digits: usize },
    #[error("wallet address {0:?} contains non-hex characters")]
    NonHex(String),
}
