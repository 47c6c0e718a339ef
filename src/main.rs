use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use gold_smith::backend::{ActionBackend, HttpBackend, MockBackend};
use gold_smith::config::{BackendMode, GoldSmithConfig};
use gold_smith::domain::{DeliveryMode, PaymentMethod, PaymentReceipt};
use gold_smith::{init_telemetry, ActionKind, AdminStore, GuardedAction};

#[derive(Parser)]
#[command(name = "gold-smith")]
#[command(about = "Code-gated order and savings-scheme actions for the Gold Smith admin panel")]
#[command(long_about = "Runs one guarded action end to end: sends a one-time code to the customer, \
                       verifies the code you pass with --otp, then commits the action and prints \
                       the updated entity as JSON.")]
struct Cli {
    /// Configuration file (defaults to ./gold-smith.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// JSON file holding the orders and schemes to act on
    #[arg(long, global = true, default_value = "demos/fixture.json")]
    fixture: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Confirm delivery of a pending order
    Deliver {
        order_id: String,
        #[arg(long, value_parser = parse_delivery_mode, help = "home_delivery, store_pickup or courier")]
        mode: DeliveryMode,
        #[arg(long, default_value = "")]
        comments: String,
        #[arg(long, help = "Code received by the customer")]
        otp: String,
    },
    /// Cancel a pending order
    Cancel {
        order_id: String,
        #[arg(long, help = "Staff member authorising the cancellation")]
        staff: String,
        #[arg(long)]
        reason: String,
        #[arg(long)]
        otp: String,
    },
    /// Pause a savings scheme
    Pause {
        scheme_id: String,
        #[arg(long)]
        comments: String,
        #[arg(long)]
        otp: String,
    },
    /// Stop a savings scheme for good
    Stop {
        scheme_id: String,
        #[arg(long)]
        comments: String,
        #[arg(long)]
        otp: String,
    },
    /// Record a payment for the scheme's current due month
    Pay {
        scheme_id: String,
        #[arg(long)]
        amount: u64,
        #[arg(long, default_value = "cash", value_parser = parse_payment_method)]
        method: PaymentMethod,
        #[arg(long = "txn")]
        transaction_id: Option<String>,
    },
    /// Print every order and scheme in the fixture
    Show,
}

fn parse_delivery_mode(value: &str) -> Result<DeliveryMode, String> {
    value.parse().map_err(|e: gold_smith::DomainError| e.to_string())
}

fn parse_payment_method(value: &str) -> Result<PaymentMethod, String> {
    value.parse().map_err(|e: gold_smith::DomainError| e.to_string())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    GoldSmithConfig::load_env_file()?;
    let config = GoldSmithConfig::load(cli.config.as_deref())?;
    init_telemetry(&config.observability)?;

    tokio::runtime::Runtime::new()?.block_on(async { run(cli, config).await })
}

async fn run(cli: Cli, config: GoldSmithConfig) -> Result<()> {
    let store = AdminStore::load(&cli.fixture).await?;
    let backend = build_backend(&config)?;

    match cli.command {
        Commands::Show => print_json(&store.snapshot()),
        Commands::Deliver {
            order_id,
            mode,
            comments,
            otp,
        } => {
            let order = store
                .order(&order_id)
                .ok_or_else(|| anyhow!("unknown order {order_id}"))?;
            let action = GuardedAction::for_order(ActionKind::DeliverOrder, &order, backend, config.otp)?;
            action.set_delivery_mode(mode)?;
            action.set_comments(comments)?;
            run_guarded(&action, &otp, &store).await?;
            print_json(&store.order(&order_id))
        }
        Commands::Cancel {
            order_id,
            staff,
            reason,
            otp,
        } => {
            let order = store
                .order(&order_id)
                .ok_or_else(|| anyhow!("unknown order {order_id}"))?;
            let action = GuardedAction::for_order(ActionKind::CancelOrder, &order, backend, config.otp)?;
            action.set_staff_name(staff)?;
            action.set_reason(reason)?;
            run_guarded(&action, &otp, &store).await?;
            print_json(&store.order(&order_id))
        }
        Commands::Pause {
            scheme_id,
            comments,
            otp,
        } => scheme_status(&store, backend, config, ActionKind::PauseScheme, &scheme_id, comments, &otp).await,
        Commands::Stop {
            scheme_id,
            comments,
            otp,
        } => scheme_status(&store, backend, config, ActionKind::StopScheme, &scheme_id, comments, &otp).await,
        Commands::Pay {
            scheme_id,
            amount,
            method,
            transaction_id,
        } => {
            let receipt = PaymentReceipt {
                method,
                amount,
                transaction_id,
                received_at: Utc::now(),
            };
            store.record_payment(&scheme_id, &receipt)?;
            print_json(&store.scheme(&scheme_id))
        }
    }
}

async fn scheme_status(
    store: &AdminStore,
    backend: Arc<dyn ActionBackend>,
    config: GoldSmithConfig,
    action: ActionKind,
    scheme_id: &str,
    comments: String,
    otp: &str,
) -> Result<()> {
    let scheme = store
        .scheme(scheme_id)
        .ok_or_else(|| anyhow!("unknown scheme {scheme_id}"))?;
    let guarded = GuardedAction::for_scheme(action, &scheme, backend, config.otp)?;
    guarded.set_comments(comments)?;
    run_guarded(&guarded, otp, store).await?;
    print_json(&store.scheme(scheme_id))
}

async fn run_guarded(action: &GuardedAction, otp: &str, store: &AdminStore) -> Result<()> {
    let message = action.send().await.context("sending code")?;
    eprintln!(
        "📨 {} ({})",
        message,
        action.contact().unwrap_or("no contact on record")
    );
    action.verify(otp).await.context("verifying code")?;
    let confirmation = action.commit(store).await.context("committing action")?;
    eprintln!("✅ {} committed for {}", confirmation.kind(), action.target_id());
    Ok(())
}

fn build_backend(config: &GoldSmithConfig) -> Result<Arc<dyn ActionBackend>> {
    let backend: Arc<dyn ActionBackend> = match config.backend.mode {
        BackendMode::Mock => Arc::new(
            MockBackend::new(Duration::from_millis(config.backend.mock_latency_ms))
                .with_code_length(config.otp.code_length),
        ),
        BackendMode::Http => Arc::new(HttpBackend::from_config(&config.backend)?),
    };
    Ok(backend)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
