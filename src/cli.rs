//! Command line interface for the `pokerwire` binary.
//!
//! Literal defaults are repeated here because the build script compiles this
//! file on its own to render the man page.

use clap::Parser;

/// Command line arguments for the `pokerwire` binary.
#[derive(Debug, Parser)]
#[command(
    name = "pokerwire",
    version,
    about = "Drive a scripted three-player scenario against a poker backend"
)]
pub struct Cli {
    /// Subscription endpoint.
    #[arg(long, env = "POKERWIRE_WS_URL", default_value = "ws://127.0.0.1:3000/ws")]
    pub ws_url: String,

    /// Command endpoint.
    #[arg(
        long,
        env = "POKERWIRE_GRAPHQL_URL",
        default_value = "http://localhost:3000/graphql"
    )]
    pub graphql_url: String,

    /// Table identifier the scenario plays at.
    #[arg(long, env = "POKERWIRE_TABLE", default_value = "123")]
    pub table: String,

    /// Participant identities, in seating order.
    #[arg(
        long,
        env = "POKERWIRE_PLAYERS",
        value_delimiter = ',',
        default_values_t = ["player_one".to_string(), "player_two".to_string(), "player_three".to_string()]
    )]
    pub players: Vec<String>,

    /// Bound on every rendezvous wait, receive and command, in milliseconds.
    #[arg(long, env = "POKERWIRE_TIMEOUT_MS", default_value_t = 5000)]
    pub timeout_ms: u64,

    /// Non-matching frames a receive tolerates before failing.
    #[arg(long, env = "POKERWIRE_MAX_IGNORED_FRAMES", default_value_t = 25)]
    pub max_ignored_frames: usize,

    /// Expose Prometheus metrics on this address while the scenario runs.
    #[arg(long, env = "POKERWIRE_METRICS_LISTEN")]
    pub metrics_listen: Option<std::net::SocketAddr>,
}
