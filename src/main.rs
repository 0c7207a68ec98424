//! Runs the three-hand scenario against a live backend.
//!
//! Exits non-zero when any step fails.

mod cli;

use std::{process::ExitCode, time::Duration};

use clap::Parser;
use pokerwire::{
    ActorId,
    HarnessConfig,
    Orchestrator,
    TableId,
    Timeouts,
    scenario::three_player_hands,
};

#[tokio::main]
async fn main() -> ExitCode {
    // Applications embedding the library should install their own subscriber.
    tracing_subscriber::fmt::init();

    let cli = cli::Cli::parse();
    let players: [String; 3] = match cli.players.try_into() {
        Ok(players) => players,
        Err(players) => {
            tracing::error!(count = players.len(), "exactly three players are required");
            return ExitCode::from(2);
        }
    };

    #[cfg(feature = "metrics")]
    if let Some(addr) = cli.metrics_listen {
        if let Err(e) = metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
        {
            tracing::error!(%addr, error = %e, "failed to install metrics exporter");
            return ExitCode::FAILURE;
        }
    }
    #[cfg(not(feature = "metrics"))]
    if cli.metrics_listen.is_some() {
        tracing::warn!("built without the metrics feature; ignoring --metrics-listen");
    }

    let config = HarnessConfig::default()
        .with_ws_endpoint(cli.ws_url)
        .with_graphql_endpoint(cli.graphql_url)
        .with_timeouts(Timeouts::uniform(Duration::from_millis(cli.timeout_ms)))
        .with_max_ignored_frames(cli.max_ignored_frames);
    let script = three_player_hands(players.map(ActorId::new), TableId::new(cli.table));

    let orchestrator = Orchestrator::live(config);
    let outcome = tokio::select! {
        outcome = script.run(&orchestrator) => outcome,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("interrupted; abandoning scenario");
            return ExitCode::from(130);
        }
    };
    match outcome {
        Ok(report) => {
            tracing::info!(scenario = %report.name, steps = report.steps.len(), "all steps passed");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "scenario failed");
            ExitCode::FAILURE
        }
    }
}
