use crate::error::FetchError;
use crate::types::{
    EventKind, EventRole, GraphQlResponse, PositionBalance, SubgraphWalletData, WalletAddress,
    WalletEvent, WalletHistory, WalletSnapshot,
};
use anyhow::{Context, Result};
use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// Max rows per event collection; The Graph caps `first` at 1000.
pub const EVENTS_PAGE_SIZE: u32 = 1000;

const WALLET_HISTORY_QUERY: &str = "
query WalletHistory($id: ID!, $addr: Bytes!, $first: Int!) {
  account(id: $id) {
    id
    tokens {
      symbol
      market { underlyingSymbol underlyingPriceUSD }
      totalUnderlyingSupplied
      totalUnderlyingRedeemed
      storedBorrowBalance
    }
  }
  mintEvents(where: { to: $addr }, first: $first, orderBy: blockTime) {
    cTokenSymbol underlyingAmount blockTime
  }
  redeemEvents(where: { from: $addr }, first: $first, orderBy: blockTime) {
    cTokenSymbol underlyingAmount blockTime
  }
  borrowEvents(where: { borrower: $addr }, first: $first, orderBy: blockTime) {
    underlyingSymbol amount blockTime
  }
  repayEvents(where: { borrower: $addr }, first: $first, orderBy: blockTime) {
    underlyingSymbol amount blockTime
  }
  liquidatedEvents: liquidationEvents(where: { from: $addr }, first: $first, orderBy: blockTime) {
    underlyingSymbol underlyingRepayAmount blockTime
  }
  liquidatorEvents: liquidationEvents(where: { to: $addr }, first: $first, orderBy: blockTime) {
    underlyingSymbol underlyingRepayAmount blockTime
  }
  markets(first: 100) { underlyingSymbol underlyingPriceUSD }
}
";

/// Client for a Compound v2 subgraph (GraphQL over HTTP).
pub struct SubgraphClient {
    url: String,
    client: reqwest::Client,
}

impl SubgraphClient {
    pub fn new(url: &str, request_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .context("failed to build subgraph HTTP client")?;
        Ok(Self {
            url: url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn request_body(address: &WalletAddress) -> serde_json::Value {
        json!({
            "query": WALLET_HISTORY_QUERY,
            "variables": {
                "id": address.as_str(),
                "addr": address.as_str(),
                "first": EVENTS_PAGE_SIZE,
            }
        })
    }

    /// One request, no retries; pacing and backoff belong to the caller.
    pub async fn fetch_wallet_data(
        &self,
        address: &WalletAddress,
    ) -> Result<SubgraphWalletData, FetchError> {
        debug!(url = %self.url, wallet = %address, "querying subgraph");

        let resp = self
            .client
            .post(&self.url)
            .json(&Self::request_body(address))
            .send()
            .await
            .map_err(|e| classify_reqwest_error(&e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let msg = format!("subgraph returned {status}: {body}");
            return Err(if status.as_u16() == 429 || status.is_server_error() {
                FetchError::Transient(msg)
            } else {
                FetchError::Invalid(msg)
            });
        }

        let parsed: GraphQlResponse<SubgraphWalletData> = resp
            .json()
            .await
            .map_err(|e| FetchError::Invalid(format!("failed to decode subgraph response: {e}")))?;

        if !parsed.errors.is_empty() {
            let messages: Vec<&str> = parsed.errors.iter().map(|e| e.message.as_str()).collect();
            // Indexer errors are usually overload or re-sync; treat them as retryable.
            return Err(FetchError::Transient(messages.join("; ")));
        }

        parsed
            .data
            .ok_or_else(|| FetchError::Invalid("subgraph response has no data".to_string()))
    }

    pub async fn fetch_wallet_history(
        &self,
        address: &WalletAddress,
    ) -> Result<WalletHistory, FetchError> {
        let data = self.fetch_wallet_data(address).await?;
        history_from_subgraph(address, &data)
    }
}

fn classify_reqwest_error(e: &reqwest::Error) -> FetchError {
    if e.is_timeout() || e.is_connect() || e.is_request() {
        FetchError::Transient(e.to_string())
    } else {
        FetchError::Invalid(e.to_string())
    }
}

fn parse_amount(raw: Option<&str>) -> f64 {
    raw.and_then(|s| s.parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// `cDAI` -> `DAI`, `cWBTC2` -> `WBTC`. Already-underlying symbols pass through.
pub fn underlying_symbol(c_token_symbol: &str) -> String {
    let trimmed = c_token_symbol
        .strip_prefix('c')
        .unwrap_or(c_token_symbol)
        .trim_end_matches(|c: char| c.is_ascii_digit());
    trimmed.to_ascii_uppercase()
}

/// Convert subgraph rows into USD-denominated events and a position snapshot.
pub fn history_from_subgraph(
    address: &WalletAddress,
    data: &SubgraphWalletData,
) -> Result<WalletHistory, FetchError> {
    let mut prices: HashMap<String, f64> = HashMap::new();
    let account_markets = data
        .account
        .iter()
        .flat_map(|a| a.tokens.iter())
        .filter_map(|t| t.market.as_ref());
    for market in data.markets.iter().chain(account_markets) {
        if let Some(symbol) = market.underlying_symbol.as_deref() {
            let price = parse_amount(market.underlying_price_usd.as_deref());
            if price > 0.0 {
                prices.insert(symbol.to_ascii_uppercase(), price);
            }
        }
    }
    let usd = |symbol: &str, amount: f64| -> f64 {
        // Unpriced assets are assumed to be quoted in USD already.
        amount * prices.get(symbol).copied().unwrap_or(1.0)
    };

    let mut events = Vec::new();
    let mut push = |kind: EventKind,
                    role: EventRole,
                    symbol: String,
                    raw: Option<&str>,
                    ts: Option<i64>| {
        let Some(timestamp) = ts else {
            debug!(
                kind = kind.as_str(),
                role = role.as_str(),
                asset = %symbol,
                "dropping event without block time"
            );
            return;
        };
        let amount = usd(&symbol, parse_amount(raw));
        events.push(WalletEvent {
            kind,
            asset: symbol,
            amount,
            timestamp,
            role,
        });
    };

    for e in &data.mint_events {
        let symbol = underlying_symbol(e.c_token_symbol.as_deref().unwrap_or_default());
        push(
            EventKind::Mint,
            EventRole::Supplier,
            symbol,
            e.underlying_amount.as_deref(),
            e.block_time,
        );
    }
    for e in &data.redeem_events {
        let symbol = underlying_symbol(e.c_token_symbol.as_deref().unwrap_or_default());
        push(
            EventKind::Redeem,
            EventRole::Supplier,
            symbol,
            e.underlying_amount.as_deref(),
            e.block_time,
        );
    }
    for e in &data.borrow_events {
        let symbol = e
            .underlying_symbol
            .as_deref()
            .unwrap_or_default()
            .to_ascii_uppercase();
        push(
            EventKind::Borrow,
            EventRole::Borrower,
            symbol,
            e.amount.as_deref(),
            e.block_time,
        );
    }
    for e in &data.repay_events {
        let symbol = e
            .underlying_symbol
            .as_deref()
            .unwrap_or_default()
            .to_ascii_uppercase();
        push(
            EventKind::RepayBorrow,
            EventRole::Borrower,
            symbol,
            e.amount.as_deref(),
            e.block_time,
        );
    }
    for (rows, role) in [
        (&data.liquidated_events, EventRole::LiquidationTarget),
        (&data.liquidator_events, EventRole::Liquidator),
    ] {
        for e in rows {
            let symbol = e
                .underlying_symbol
                .as_deref()
                .unwrap_or_default()
                .to_ascii_uppercase();
            push(
                EventKind::LiquidateBorrow,
                role,
                symbol,
                e.underlying_repay_amount.as_deref(),
                e.block_time,
            );
        }
    }

    if data.account.is_none() && events.is_empty() {
        return Err(FetchError::NotFound(address.to_string()));
    }

    let mut positions = std::collections::BTreeMap::new();
    for token in data.account.iter().flat_map(|a| a.tokens.iter()) {
        let symbol = token
            .market
            .as_ref()
            .and_then(|m| m.underlying_symbol.clone())
            .map_or_else(
                || underlying_symbol(token.symbol.as_deref().unwrap_or_default()),
                |s| s.to_ascii_uppercase(),
            );
        if symbol.is_empty() {
            continue;
        }
        let supplied = (parse_amount(token.total_underlying_supplied.as_deref())
            - parse_amount(token.total_underlying_redeemed.as_deref()))
        .max(0.0);
        let borrowed = parse_amount(token.stored_borrow_balance.as_deref()).max(0.0);
        let entry: &mut PositionBalance = positions.entry(symbol.clone()).or_default();
        entry.supplied += usd(&symbol, supplied);
        entry.borrowed += usd(&symbol, borrowed);
    }

    let first_activity = events.iter().map(|e| e.timestamp).min();
    let last_activity = events.iter().map(|e| e.timestamp).max();

    let history = WalletHistory::new(
        events,
        WalletSnapshot {
            positions,
            first_activity,
            last_activity,
        },
    );
    // Finite strings times finite prices can still overflow to infinity.
    history.check_amounts()?;
    Ok(history)
}
