//! # ecomarket-node
//!
//! Hosts the settlement core in one process: builds the shared store,
//! provisions the platform escrow wallet, loads the seed file, repairs
//! legacy fulfillment rows, and runs the payout scheduler until interrupted.

mod seed;

use std::{path::PathBuf, sync::Arc};

use clap::{Parser, Subcommand, ValueEnum};
use ecomarket_ledger::Ledger;
use ecomarket_orders::OrderLifecycle;
use ecomarket_settlement::{PayoutEngine, PayoutScheduler};
use ecomarket_store::MarketStore;
use ecomarket_types::{LogConfig, LogFormat, MarketError, NodeConfig, Result, WalletId, constants};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::seed::SeedState;

#[derive(Parser)]
#[command(name = "ecomarket-node")]
#[command(about = "EcoMarket settlement node.", version)]
struct CommandLine {
    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// JSON seed file: seller accounts, escrow balance, imported orders
    #[arg(long)]
    seed: Option<PathBuf>,
    /// Platform escrow wallet id
    #[arg(long)]
    platform_wallet: Option<Uuid>,
    /// Platform fee as a fraction of the order total
    #[arg(long)]
    fee_rate: Option<Decimal>,
    /// Milliseconds between payout sweeps
    #[arg(long)]
    sweep_interval_ms: Option<u64>,
    #[arg(long, value_enum)]
    log_format: Option<LogFormatArg>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the payout scheduler until Ctrl-C (default)
    Run,
    /// Run a single payout sweep and print its report
    Sweep,
    /// Validate the configuration and exit
    CheckConfig,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum LogFormatArg {
    Compact,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Compact => Self::Compact,
            LogFormatArg::Json => Self::Json,
        }
    }
}

impl CommandLine {
    /// Config file (if any) with command-line overrides applied.
    fn node_config(&self) -> Result<NodeConfig> {
        let mut cfg = match (&self.config, self.platform_wallet) {
            (Some(path), _) => NodeConfig::from_json_file(path)?,
            (None, Some(wallet)) => NodeConfig::new(WalletId(wallet)),
            (None, None) => {
                return Err(MarketError::Configuration(
                    "pass --config or --platform-wallet".into(),
                ));
            }
        };
        if let Some(wallet) = self.platform_wallet {
            cfg.settlement.platform_wallet = WalletId(wallet);
        }
        if let Some(rate) = self.fee_rate {
            cfg.settlement.fee_rate = rate;
        }
        if let Some(ms) = self.sweep_interval_ms {
            cfg.settlement.sweep_interval_ms = ms;
        }
        if let Some(format) = self.log_format {
            cfg.log.format = format.into();
        }
        cfg.validate()?;
        Ok(cfg)
    }

    fn seed_state(&self) -> Result<SeedState> {
        match &self.seed {
            Some(path) => SeedState::from_json_file(path),
            None => Ok(SeedState::default()),
        }
    }
}

fn setup_tracing(log: &LogConfig) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log.filter));

    let builder = tracing_subscriber::fmt().with_env_filter(env_filter);
    match log.format {
        LogFormat::Compact => builder
            .with_timer(tracing_subscriber::fmt::time::uptime())
            .compact()
            .init(),
        LogFormat::Json => builder.json().init(),
    }
}

/// Services wired over one store.
struct Node {
    ledger: Ledger,
    lifecycle: OrderLifecycle,
    engine: Arc<PayoutEngine>,
}

impl Node {
    fn start(cfg: &NodeConfig, seed: &SeedState) -> Result<Self> {
        let store = Arc::new(MarketStore::new());
        let ledger = Ledger::new(Arc::clone(&store));
        let platform = cfg.settlement.platform_wallet;
        ledger.ensure_platform_wallet(platform)?;

        let seeded = seed.apply(&store, platform)?;
        if seeded.orders == 0 {
            tracing::warn!("no seeded orders; sweeps have nothing to pay");
        }
        let identity = Arc::new(seed.directory());
        let lifecycle = OrderLifecycle::new(Arc::clone(&store));
        let repaired = lifecycle.repair_legacy_fulfillment()?;
        let engine = Arc::new(PayoutEngine::new(store, identity, cfg.settlement.clone()));

        tracing::info!(
            service = constants::SERVICE_NAME,
            version = constants::VERSION,
            platform_wallet = %cfg.settlement.platform_wallet,
            fee_rate = %cfg.settlement.fee_rate,
            sellers = seeded.sellers,
            wallets = seeded.wallets,
            orders = seeded.orders,
            repaired,
            "node started"
        );
        Ok(Self {
            ledger,
            lifecycle,
            engine,
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = CommandLine::parse();
    let cfg = args.node_config()?;
    let seed = args.seed_state()?;
    setup_tracing(&cfg.log);

    match args.command.unwrap_or(Commands::Run) {
        Commands::CheckConfig => {
            println!("{}", serde_json::to_string_pretty(&cfg)?);
        }
        Commands::Sweep => {
            let node = Node::start(&cfg, &seed)?;
            let report = node.engine.sweep()?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Run => {
            let node = Node::start(&cfg, &seed)?;
            let scheduler =
                PayoutScheduler::spawn(Arc::clone(&node.engine), cfg.settlement.sweep_interval());

            tokio::signal::ctrl_c().await?;
            tracing::info!("shutdown requested");
            scheduler.shutdown().await;
            tracing::info!(
                orders = node.lifecycle.list_orders()?.len(),
                escrow = %node.ledger.balance(cfg.settlement.platform_wallet)?,
                "node stopped"
            );
        }
    }
    Ok(())
}
