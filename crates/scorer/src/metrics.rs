use anyhow::Result;
use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

pub fn describe() {
    describe_counter!(
        "scorer_wallets_scored_total",
        "Number of wallets that received a score."
    );
    describe_counter!(
        "scorer_wallets_skipped_total",
        "Number of wallets skipped, by reason."
    );
    describe_counter!(
        "scorer_fetch_attempts_total",
        "Wallet history fetch attempts, by outcome."
    );
    describe_histogram!(
        "scorer_fetch_latency_ms",
        "Wallet history fetch latency in milliseconds."
    );
    describe_histogram!("scorer_wallet_score", "Distribution of wallet scores.");
    describe_counter!(
        "scorer_subgraph_requests_total",
        "Number of subgraph requests made."
    );
    describe_counter!(
        "scorer_subgraph_errors_total",
        "Number of failed subgraph requests, by error kind."
    );
    describe_counter!(
        common::observability::ERROR_EVENTS_METRIC,
        "Number of ERROR-level log events."
    );
}

/// Serves `/metrics` on the given port. Must be called inside the tokio runtime.
pub fn install_prometheus(port: u16) -> Result<()> {
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prometheus_handle_renders_metric_names() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        metrics::with_local_recorder(&recorder, || {
            describe();
            metrics::counter!("scorer_wallets_skipped_total", "reason" => "malformed_input")
                .increment(2);
            metrics::histogram!("scorer_wallet_score").record(640.0);
        });

        let rendered = handle.render();
        assert!(rendered.contains("scorer_wallets_skipped_total{reason=\"malformed_input\"} 2"));
        assert!(rendered.contains("scorer_wallet_score"));
    }
}
