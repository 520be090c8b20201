use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use gateway_loadgen::config::Config;
use gateway_loadgen::profile::TokenRefreshPolicy;
use gateway_loadgen::runner::{IdentityScheme, LoadTest};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Drive registration, login and authenticated traffic against the API gateway
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Base URL of the target gateway, e.g. http://127.0.0.1:8000
    #[arg(long)]
    host: Option<String>,

    /// Number of concurrent virtual users
    #[arg(short, long)]
    users: Option<usize>,

    /// Users spawned per second
    #[arg(short = 'r', long)]
    spawn_rate: Option<f64>,

    /// Run duration, e.g. 30s, 5m, 1h
    #[arg(short = 't', long, value_parser = humantime::parse_duration)]
    run_time: Option<Duration>,

    /// Per-request timeout, e.g. 10s
    #[arg(long, value_parser = humantime::parse_duration)]
    request_timeout: Option<Duration>,

    /// How usernames are generated
    #[arg(long, value_enum)]
    identity: Option<IdentityScheme>,

    /// Store the tokens returned by the refresh endpoint instead of discarding them
    #[arg(long)]
    adopt_refreshed_tokens: bool,

    /// Seed for task selection and think time
    #[arg(long)]
    seed: Option<u64>,

    /// Print the final report as JSON after the summary
    #[arg(long)]
    json: bool,
}

fn apply_cli_overrides(config: &mut Config, cli: &Cli) {
    if let Some(host) = &cli.host {
        config.host = host.clone();
    }
    if let Some(users) = cli.users {
        config.users = users;
    }
    if let Some(rate) = cli.spawn_rate {
        config.spawn_rate = rate;
    }
    if let Some(run_time) = cli.run_time {
        config.run_time = run_time;
    }
    if let Some(timeout) = cli.request_timeout {
        config.request_timeout = timeout;
    }
    if let Some(identity) = cli.identity {
        config.identity = identity;
    }
    if cli.adopt_refreshed_tokens {
        config.refresh_policy = TokenRefreshPolicy::Adopt;
    }
    if cli.seed.is_some() {
        config.seed = cli.seed;
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gateway_loadgen=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Environment first, then command-line flags
    let mut config = Config::from_env();
    apply_cli_overrides(&mut config, &cli);
    info!(
        "Loaded configuration: host={}, users={}, spawn_rate={}, run_time={:?}",
        config.host, config.users, config.spawn_rate, config.run_time
    );
    if config.refresh_policy == TokenRefreshPolicy::Adopt {
        info!("Refreshed tokens will replace the login-time credentials");
    }

    let load_test = LoadTest::new(config).context("invalid load test configuration")?;

    // Ctrl-C stops spawning and lets in-flight users wind down
    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping load test");
            let _ = stop_tx.send(true);
        }
    });

    let report = load_test.run(stop_rx).await?;
    report.print_summary();

    if cli.json {
        println!("JSON: {}", report.to_json()?);
    }

    Ok(())
}
