use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use common::compound::SubgraphClient;
use common::config::{Config, DataSourceKind};

mod cli;
mod error;
mod explanation;
mod metrics;
mod pipeline;
mod report;
mod simulation;
mod sources;
mod wallet_features;
mod wallet_scoring;

use cli::Command;
use pipeline::{BatchPipeline, FetchPolicy, WalletDataSource};
use report::BatchSummary;
use simulation::SimulatedSource;
use wallet_features::FeatureExtractor;
use wallet_scoring::RiskScorer;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;

    let (dispatch, _otel_guard) =
        common::observability::build_dispatch("scorer", &config.general.log_level);
    tracing::dispatcher::set_global_default(dispatch).map_err(anyhow::Error::msg)?;

    let cmd = cli::parse_args(std::env::args()).map_err(anyhow::Error::msg)?;

    let scorer =
        RiskScorer::from_config(&config.scoring).context("invalid [scoring] configuration")?;
    if cmd == Command::Weights {
        print!("{}", cli::render_weights(&scorer));
        return Ok(());
    }

    if let Some(port) = config.prometheus_port() {
        metrics::install_prometheus(port)?;
        tracing::info!(port, "prometheus listener started");
    }
    metrics::describe();

    // Captured once so every wallet in the run is measured against the same instant.
    let as_of = config
        .scoring
        .as_of_epoch
        .unwrap_or_else(|| chrono::Utc::now().timestamp());
    let extractor = FeatureExtractor::new(as_of, &config.scoring.volatile_assets);
    let pipeline = BatchPipeline::new(
        &scorer,
        extractor,
        FetchPolicy::from_config(&config.ingestion),
    );

    match config.data_source.kind {
        DataSourceKind::Simulated => {
            run(&config, &pipeline, &SimulatedSource::new(as_of), cmd, as_of).await
        }
        DataSourceKind::Subgraph => {
            let client = SubgraphClient::new(
                &config.data_source.subgraph_url,
                Duration::from_secs(config.data_source.request_timeout_secs),
            )?;
            tracing::info!(url = client.url(), "using subgraph data source");
            run(&config, &pipeline, &client, cmd, as_of).await
        }
    }
}

async fn run<S>(
    config: &Config,
    pipeline: &BatchPipeline<'_>,
    source: &S,
    cmd: Command,
    as_of: i64,
) -> Result<()>
where
    S: WalletDataSource + Sync,
{
    if let Command::Wallet { address } = cmd {
        let result = pipeline.score_wallet(source, &address).await?;
        print!("{}", cli::render_wallet(&result));
        return Ok(());
    }

    let wallets_path = Path::new(&config.io.wallets_path);
    let wallet_ids = report::read_wallet_ids(wallets_path)?;
    tracing::info!(
        wallets = wallet_ids.len(),
        path = %wallets_path.display(),
        source = source.source_name(),
        "wallet list loaded"
    );

    let outcome = pipeline
        .process(&wallet_ids, source)
        .await
        .context("batch aborted")?;
    let summary = BatchSummary::from_outcome(&outcome, as_of);

    let written = report::write_outputs(Path::new(&config.io.output_path), &outcome, &summary)?;
    for path in &written {
        tracing::info!(path = %path.display(), "output written");
    }

    print!("{}", summary.render());
    println!(
        "\nDetailed results saved to: {}",
        report::detailed_path(Path::new(&config.io.output_path)).display()
    );
    Ok(())
}
