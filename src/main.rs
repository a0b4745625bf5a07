use checkout_gateway::application::controller::GatewayController;
use checkout_gateway::application::orchestrator::PaymentOrchestrator;
use checkout_gateway::config::GatewayConfig;
use checkout_gateway::domain::order::{Order, OrderId};
use checkout_gateway::domain::ports::{OrderStore, OrderStoreBox, PaymentClientBox};
use checkout_gateway::domain::status::{OperationDomain, classify};
use checkout_gateway::error::GatewayError;
use checkout_gateway::infrastructure::audit_log::RingBufferAuditLog;
use checkout_gateway::infrastructure::in_memory::InMemoryOrderStore;
#[cfg(feature = "storage-rocksdb")]
use checkout_gateway::infrastructure::rocksdb::RocksDBOrderStore;
use checkout_gateway::infrastructure::worldline::WorldlineClient;
use checkout_gateway::interfaces::csv::order_reader::OrderReader;
use checkout_gateway::interfaces::csv::order_writer::OrderWriter;
use checkout_gateway::interfaces::http;
use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use rust_decimal::Decimal;
use std::fs::File;
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Gateway settings (JSON). Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Orders CSV used to seed the order store.
    #[arg(long)]
    orders: Option<PathBuf>,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the return callback and admin capture endpoints.
    Serve {
        #[arg(long, default_value = "127.0.0.1:8080")]
        bind: SocketAddr,
    },
    /// Create a hosted checkout session and print the redirect URL.
    Initiate { order: OrderId },
    /// Capture an authorized payment, by default for the full order total.
    Capture {
        order: OrderId,
        #[arg(long)]
        amount: Option<Decimal>,
    },
    Refund {
        order: OrderId,
        amount: Decimal,
        #[arg(long, default_value = "")]
        reason: String,
    },
    /// Print the outcome a processor status code maps to.
    Classify {
        domain: OperationDomain,
        code: i32,
        #[arg(long, default_value = "")]
        status: String,
    },
    /// Print the stored orders as CSV.
    Orders,
}

enum Store {
    Memory(InMemoryOrderStore),
    #[cfg(feature = "storage-rocksdb")]
    RocksDB(RocksDBOrderStore),
}

impl Store {
    fn open(db_path: Option<PathBuf>) -> Result<Self> {
        #[cfg(feature = "storage-rocksdb")]
        if let Some(path) = db_path {
            return Ok(Store::RocksDB(RocksDBOrderStore::open(path).into_diagnostic()?));
        }

        #[cfg(not(feature = "storage-rocksdb"))]
        if db_path.is_some() {
            eprintln!(
                "WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
            );
        }

        Ok(Store::Memory(InMemoryOrderStore::new()))
    }

    fn boxed(&self) -> OrderStoreBox {
        match self {
            Store::Memory(store) => Box::new(store.clone()),
            #[cfg(feature = "storage-rocksdb")]
            Store::RocksDB(store) => Box::new(store.clone()),
        }
    }

    async fn all_orders(&self) -> Result<Vec<Order>> {
        match self {
            Store::Memory(store) => Ok(store.all_orders().await),
            #[cfg(feature = "storage-rocksdb")]
            Store::RocksDB(store) => store.all_orders().await.into_diagnostic(),
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

async fn seed_orders(store: &OrderStoreBox, path: PathBuf) -> Result<()> {
    let file = File::open(path).into_diagnostic()?;
    let mut seeded = 0usize;
    for order_result in OrderReader::new(file).orders() {
        match order_result {
            Ok(order) => {
                store.save(&order).await.into_diagnostic()?;
                seeded += 1;
            }
            Err(e) => warn!(error = %e, "Skipping unreadable order row"),
        }
    }
    info!(seeded, "Orders loaded");
    Ok(())
}

fn build_orchestrator(config: GatewayConfig, orders: OrderStoreBox) -> Result<PaymentOrchestrator> {
    config.ensure_available().into_diagnostic()?;
    let credentials = config.credentials().into_diagnostic()?;
    info!(
        endpoint = %credentials.endpoint,
        merchant_id = %credentials.merchant_id,
        test_mode = config.test_mode,
        "Gateway configured"
    );
    let timeout = Duration::from_secs(config.request_timeout_secs);
    let client: PaymentClientBox = Box::new(
        WorldlineClient::new(credentials, timeout)
            .map_err(|e| GatewayError::transport("could not build processor client", e))
            .into_diagnostic()?,
    );
    Ok(PaymentOrchestrator::new(
        config,
        orders,
        client,
        Box::new(RingBufferAuditLog::new()),
    ))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();
    miette::set_hook(Box::new(|_| {
        Box::new(miette::MietteHandlerOpts::new().width(200).build())
    }))
    .into_diagnostic()?;

    if let Command::Classify {
        domain,
        code,
        status,
    } = &cli.command
    {
        let outcome = classify(*code, status, *domain);
        println!("{}", serde_json::to_string(&outcome).into_diagnostic()?);
        return Ok(());
    }

    let config = match &cli.config {
        Some(path) => GatewayConfig::from_file(path).into_diagnostic()?,
        None => GatewayConfig::default(),
    };

    let store = Store::open(cli.db_path)?;
    if let Some(path) = cli.orders {
        seed_orders(&store.boxed(), path).await?;
    }

    match cli.command {
        Command::Orders => {
            let orders = store.all_orders().await?;
            let stdout = io::stdout();
            let mut writer = OrderWriter::new(stdout.lock());
            writer.write_orders(&orders).into_diagnostic()?;
        }
        Command::Serve { bind } => {
            let orchestrator = build_orchestrator(config, store.boxed())?;
            let controller = Arc::new(GatewayController::new(Arc::new(orchestrator)));
            let app = http::router(controller);

            info!(%bind, "Server listening");
            let listener = tokio::net::TcpListener::bind(bind).await.into_diagnostic()?;
            axum::serve(listener, app).await.into_diagnostic()?;
        }
        Command::Initiate { order } => {
            let orchestrator = build_orchestrator(config, store.boxed())?;
            let redirect = orchestrator.initiate(order).await.into_diagnostic()?;
            println!("{}", redirect.redirect_url);
        }
        Command::Capture { order, amount } => {
            let orchestrator = build_orchestrator(config, store.boxed())?;
            let receipt = orchestrator
                .capture_payment(order, amount)
                .await
                .into_diagnostic()?;
            println!(
                "captured {} on order {order}: capture_id={} status={} status_code={}",
                receipt.amount, receipt.capture_id, receipt.status, receipt.status_code
            );
        }
        Command::Refund {
            order,
            amount,
            reason,
        } => {
            let orchestrator = build_orchestrator(config, store.boxed())?;
            let receipt = orchestrator
                .refund(order, amount, &reason)
                .await
                .into_diagnostic()?;
            println!(
                "refunded {} on order {order}: refund_id={} status={} outcome={}",
                receipt.amount, receipt.refund_id, receipt.status, receipt.outcome
            );
        }
        Command::Classify { .. } => {}
    }

    Ok(())
}
