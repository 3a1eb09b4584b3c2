/// walletscope CLI
///
/// Runs the trade-ingestion pipeline for a wallet and prints the result
/// envelope. The serving layer uses the same `WalletScope` facade; this
/// binary exists for operators and debugging.

use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use walletscope::config::Config;
use walletscope::logger::{self, LogTag, LoggerConfig};
use walletscope::service::{FetchOptions, WalletScope};
use walletscope::trades::round_display;

#[derive(Parser, Debug)]
#[command(name = "walletscope", about = "Wallet swap-history analytics")]
struct Args {
    /// Wallet address to analyze
    wallet: String,

    /// Skip the price cascade (raw trade extraction only)
    #[arg(long)]
    no_pricing: bool,

    /// Print the full result envelope as JSON
    #[arg(long)]
    json: bool,

    /// Enable debug logging for tags (comma separated, e.g. fetch,prices)
    #[arg(long, value_delimiter = ',')]
    debug: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    logger::init(LoggerConfig::default());
    if !args.debug.is_empty() {
        logger::enable_debug_tags(&args.debug);
    }
    if let Ok(env_tags) = std::env::var("WALLETSCOPE_DEBUG") {
        let tags: Vec<String> = env_tags.split(',').map(|t| t.trim().to_string()).collect();
        logger::enable_debug_tags(&tags);
    }

    let config = Config::from_env().context("failed to load configuration")?;
    let service = Arc::new(WalletScope::new(config).context("failed to start service")?);
    service.start();

    let options = FetchOptions {
        price_trades: !args.no_pricing,
        quote_mint: None,
    };

    let progress: walletscope::transactions::ProgressFn = Arc::new(|message: &str| {
        logger::info(LogTag::System, message);
    });

    let result = service
        .fetch_wallet_trades(&args.wallet, options, Some(progress), None)
        .await;

    let report = match result {
        Ok(report) => report,
        Err(e) => {
            service.stop();
            return Err(e).context("wallet fetch failed");
        }
    };

    if args.json {
        let json = serde_json::to_string_pretty(&report).context("failed to serialize report")?;
        println!("{}", json);
    } else {
        println!();
        println!("Wallet    {}", report.wallet);
        println!("Trades    {}", report.summary.total_trades);
        println!("Priced    {}", report.summary.priced_trades);
        println!("Win rate  {:.1}%", report.summary.win_rate);
        println!("Realized  ${}", round_display(report.summary.total_pnl_usd, 2));
        println!("Elapsed   {:.1}s", report.elapsed_seconds);

        for trade in report.trades.iter().take(20) {
            println!(
                "  {} {:>4} {:<12} {:>16.6} {} pnl ${:>10.4}",
                trade.timestamp,
                format!("{:?}", trade.action).to_lowercase(),
                trade.token,
                trade.amount,
                if trade.priced { "priced  " } else { "unpriced" },
                trade.pnl_usd,
            );
        }
        if report.trades.len() > 20 {
            println!("  ... and {} more (use --json for all)", report.trades.len() - 20);
        }
    }

    service.stop();
    Ok(())
}
