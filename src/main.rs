use std::net::IpAddr;

use anyhow::Context;
use clap::Parser;
use garde::Validate;
use quickdraw::{
    config::{GameConfig, Pacing, RoundLimit},
    constants::{game, pacing},
    runtime, server,
};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;
use web_time::Duration;

/// Timed multiplayer reaction game server
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Address to bind
    #[arg(long, env = "QUICKDRAW_HOST", default_value = "0.0.0.0")]
    host: IpAddr,

    /// Port to bind
    #[arg(long, env = "PORT", default_value_t = 5000)]
    port: u16,

    /// Delay component preceding each prompt, in milliseconds
    #[arg(long, env = "QUICKDRAW_PROMPT_INTERVAL_MS", default_value_t = pacing::DEFAULT_PROMPT_INTERVAL)]
    prompt_interval_ms: u64,

    /// Time participants have to answer, in milliseconds
    #[arg(long, env = "QUICKDRAW_RESPONSE_WINDOW_MS", default_value_t = pacing::DEFAULT_RESPONSE_WINDOW)]
    response_window_ms: u64,

    /// Rounds played when `start_game` names no limit
    #[arg(long, env = "QUICKDRAW_ROUND_LIMIT", default_value_t = game::DEFAULT_ROUND_LIMIT)]
    round_limit: usize,

    /// Emit logs as JSON lines
    #[arg(long, env = "QUICKDRAW_LOG_JSON")]
    log_json: bool,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);

    if json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.log_json);

    let config = GameConfig {
        pacing: Pacing {
            prompt_interval: Duration::from_millis(args.prompt_interval_ms),
            response_window: Duration::from_millis(args.response_window_ms),
        },
        default_round_limit: RoundLimit(args.round_limit),
    };
    config.validate().context("invalid game configuration")?;

    let (handle, game_task) = runtime::spawn(config);

    let listener = TcpListener::bind((args.host, args.port))
        .await
        .with_context(|| format!("failed to bind {}:{}", args.host, args.port))?;

    server::serve(listener, handle.clone(), async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::error!(%error, "failed to listen for ctrl+c");
            std::future::pending::<()>().await;
        }
    })
    .await
    .context("server error")?;

    info!("shutting down");
    handle.shutdown();
    game_task.await.context("game loop panicked")?;

    Ok(())
}
