use common::compound::SubgraphClient;
use common::error::FetchError;
use common::types::{WalletAddress, WalletHistory};

use crate::pipeline::WalletDataSource;

impl WalletDataSource for SubgraphClient {
    fn source_name(&self) -> &'static str {
        "subgraph"
    }

    async fn fetch_wallet(&self, address: &WalletAddress) -> Result<WalletHistory, FetchError> {
        let res = self.fetch_wallet_history(address).await;
        match &res {
            Ok(_) => {
                metrics::counter!("scorer_subgraph_requests_total", "status" => "ok").increment(1);
            }
            Err(e) => {
                metrics::counter!("scorer_subgraph_requests_total", "status" => "error")
                    .increment(1);
                metrics::counter!("scorer_subgraph_errors_total", "kind" => e.kind()).increment(1);
            }
        }
        res
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_unreachable_subgraph_is_transient() {
        let client = SubgraphClient::new("http://127.0.0.1:1/subgraph", Duration::from_secs(2))
            .unwrap();
        let address = WalletAddress::parse("0x742d35cc6634c0532925a3b844bc454e4438f44e").unwrap();

        assert_eq!(client.source_name(), "subgraph");
        let err = client.fetch_wallet(&address).await.unwrap_err();
        assert!(err.is_retryable(), "{err}");
    }
}
