use clap::Parser;
use miette::{IntoDiagnostic, Result};
use psp_reconciler::application::locks::OrderLocks;
use psp_reconciler::application::service::NotificationService;
use psp_reconciler::config::{EnvOverrides, GatewayConfig, Preferences};
use psp_reconciler::domain::ports::StoreHandle;
use psp_reconciler::infrastructure::in_memory::InMemoryStore;
use psp_reconciler::interfaces::csv::payment_writer::PaymentWriter;
use psp_reconciler::interfaces::json::notification_reader::NotificationReader;
use psp_reconciler::interfaces::json::order_loader::load_orders;
use psp_reconciler::logging::init_tracing;
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

/// Reconciles a dump of processor notifications against the known orders and
/// prints the resulting payment states as CSV.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Notification deliveries, one JSON document per line
    input: PathBuf,

    /// Orders known before the first delivery (JSON array)
    #[arg(long)]
    orders: Option<PathBuf>,

    /// Payment method preferences (JSON). `PSP_*` environment variables
    /// override individual settings.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Path to a persistent database. If provided, uses RocksDB.
    #[cfg(feature = "storage-rocksdb")]
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Replay every payment's outstanding notifications after the input is consumed
    #[arg(long)]
    replay: bool,
}

#[cfg(feature = "storage-rocksdb")]
fn open_store(cli: &Cli) -> Result<StoreHandle> {
    use psp_reconciler::infrastructure::rocksdb::RocksDBStore;
    Ok(match &cli.db_path {
        Some(path) => Arc::new(RocksDBStore::open(path).into_diagnostic()?),
        None => Arc::new(InMemoryStore::new()),
    })
}

#[cfg(not(feature = "storage-rocksdb"))]
fn open_store(_cli: &Cli) -> Result<StoreHandle> {
    Ok(Arc::new(InMemoryStore::new()))
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let preferences = match &cli.config {
        Some(path) => Preferences::load(path).into_diagnostic()?,
        None => Preferences::default(),
    };
    let config =
        GatewayConfig::resolve(&preferences, &EnvOverrides::from_env()).into_diagnostic()?;
    info!(environment = ?config.environment, "configuration resolved");

    let store = open_store(&cli)?;
    if let Some(path) = &cli.orders {
        let orders = load_orders(File::open(path).into_diagnostic()?).into_diagnostic()?;
        for order in orders {
            // A persistent store keeps what earlier runs reconciled.
            if store.load_order(&order.number).await.into_diagnostic()?.is_none() {
                store.store_order(order).await.into_diagnostic()?;
            }
        }
    }

    let service = NotificationService::new(store.clone(), OrderLocks::new(), &config);
    let file = File::open(&cli.input).into_diagnostic()?;
    for event in NotificationReader::new(file).events() {
        match event {
            Ok(event) => {
                service.acknowledge(event).await;
            }
            Err(e) => error!(error = %e, "unreadable notification"),
        }
    }

    if cli.replay {
        for order in store.all_orders().await.into_diagnostic()? {
            for payment in &order.payments {
                service
                    .replayer()
                    .replay_outstanding(payment)
                    .await
                    .into_diagnostic()?;
            }
        }
    }

    let orders = store.all_orders().await.into_diagnostic()?;
    let stdout = io::stdout();
    let mut writer = PaymentWriter::new(stdout.lock());
    writer.write_orders(&orders).into_diagnostic()?;

    Ok(())
}
