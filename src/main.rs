use anyhow::Context;
use clap::Parser;
use hybridbot::api::kraken::KrakenClient;
use hybridbot::config::Settings;
use hybridbot::execution::TradingEngine;
use hybridbot::strategy::MeanReversionPredictor;

/// Feedback-controlled spot trading bot for a single Kraken pair
#[derive(Parser, Debug)]
#[command(name = "hybridbot", version, about)]
struct Cli {
    /// Trading pair (overrides HYBRIDBOT_PAIR)
    #[arg(long)]
    pair: Option<String>,

    /// Run exactly one decision cycle and exit
    #[arg(long)]
    once: bool,

    /// Submit orders in Kraken's validate-only mode (nothing is booked)
    #[arg(long)]
    validate: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    setup_logging();

    let cli = Cli::parse();

    tracing::info!("🚀 hybridbot starting");

    let mut settings = Settings::load().context("failed to load settings")?;
    if let Some(pair) = cli.pair {
        settings.pair = pair;
    }
    if cli.validate {
        settings.validate_orders = true;
    }

    let api_key = std::env::var("KRAKEN_API_KEY")
        .context("KRAKEN_API_KEY not found in environment")?;
    let api_secret = std::env::var("KRAKEN_API_SECRET")
        .context("KRAKEN_API_SECRET not found in environment")?;

    let client =
        KrakenClient::new(api_key, api_secret).context("failed to build Kraken client")?;

    tracing::info!("📊 Configuration:");
    tracing::info!("  Pair: {}", settings.pair);
    tracing::info!(
        "  Candles: {} x {}min, SMA window {}",
        settings.candle_count,
        settings.interval_minutes,
        settings.sma_window
    );
    tracing::info!(
        "  PID gains: kp={}, ki={}, kd={}",
        settings.kp,
        settings.ki,
        settings.kd
    );
    match settings.integral_limit {
        Some(limit) => tracing::info!("  Integral clamp: +/-{}", limit),
        None => tracing::info!("  Integral clamp: off"),
    }
    tracing::info!(
        "  Retry: {} attempts, {}s apart",
        settings.max_attempts,
        settings.retry_delay_seconds
    );
    tracing::info!("  Cycle: every {}s", settings.cycle_seconds);
    if settings.validate_orders {
        tracing::info!("  Orders: validate-only, nothing will be booked");
    }

    check_account(&client).await;

    let engine_config = settings.engine_config();
    let controller = settings.controller();
    let mut engine = TradingEngine::new(
        client,
        Box::new(MeanReversionPredictor::default()),
        controller,
        engine_config,
    );

    if cli.once {
        let report = engine.run_cycle().await?;
        tracing::info!(
            "Single cycle complete: mode {}, signal {:.6}",
            report.mode.as_str(),
            report.control_signal
        );
        return Ok(());
    }

    engine.run_forever().await;
    Ok(())
}

fn setup_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("hybridbot=info")),
        )
        .init();
}

/// Startup connectivity check; failures warn but never block the loop
async fn check_account(client: &KrakenClient) {
    match client.account_balance().await {
        Ok(balance) => {
            let funded: Vec<String> = balance
                .iter()
                .filter(|(_, amount)| **amount > 0.0)
                .map(|(asset, amount)| format!("{}={}", asset, amount))
                .collect();

            if funded.is_empty() {
                tracing::info!("💰 Account reachable, no funded assets");
            } else {
                tracing::info!("💰 Balance: {}", funded.join(", "));
            }
        }
        Err(e) => tracing::warn!("Balance check failed, continuing: {}", e),
    }

    match client.open_orders().await {
        Ok(orders) => tracing::info!("📋 Open orders: {}", orders.open.len()),
        Err(e) => tracing::warn!("Open-orders check failed, continuing: {}", e),
    }

    match client.closed_orders().await {
        Ok(orders) => tracing::info!(
            "📋 Closed orders on record: {}",
            orders.count.unwrap_or(orders.closed.len() as u32)
        ),
        Err(e) => tracing::warn!("Closed-orders check failed, continuing: {}", e),
    }
}
