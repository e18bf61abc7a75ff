//! Carton CLI

use std::{
    io::{self, Write as _},
    path::PathBuf,
    process::ExitCode,
    sync::Arc,
};

use carton::{
    cart::CartAggregate,
    clock::{Clock, SystemClock},
    config::CartConfig,
    fixtures::CartFixture,
    persistence::{FileStore, PersistenceAdapter},
    sync::{HttpCartService, SyncController},
};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "carton", about = "Cart summary calculator", long_about = None)]
struct Cli {
    /// Config YAML; defaults apply when omitted
    #[arg(long, env = "CARTON_CONFIG")]
    config: Option<PathBuf>,

    /// Cart fixture set under ./fixtures/carts
    #[arg(long, default_value = "basic")]
    fixture: String,

    /// Cart fixture file, instead of a named set
    #[arg(long, conflicts_with = "fixture")]
    fixture_file: Option<PathBuf>,

    /// Fetch the cart from the configured cart service instead of a fixture
    #[arg(long, conflicts_with_all = ["fixture", "fixture_file"])]
    remote: bool,

    /// Directory the item list is saved to
    #[arg(long, env = "CARTON_STORAGE_DIR")]
    storage_dir: Option<PathBuf>,

    /// Log filter used when `RUST_LOG` is unset
    #[arg(long, env = "CARTON_LOG_LEVEL", default_value = "warn")]
    log_level: String,
}

#[tokio::main]
#[expect(clippy::print_stderr, reason = "fatal errors are reported on stderr")]
async fn main() -> ExitCode {
    let _env = dotenvy::dotenv();

    let cli = Cli::parse();

    init_tracing(&cli.log_level);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("{error}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let _already_set = tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().compact().with_writer(io::stderr))
        .with(filter)
        .try_init();
}

async fn run(cli: Cli) -> Result<(), String> {
    let config = match &cli.config {
        Some(path) => CartConfig::load(path)
            .map_err(|error| format!("failed to load config {}: {error}", path.display()))?,
        None => CartConfig::default(),
    };

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let cart = if cli.remote {
        fetch_remote(&config, clock).await?
    } else {
        let fixture = match &cli.fixture_file {
            Some(path) => CartFixture::load(path.clone()),
            None => CartFixture::from_set(&cli.fixture),
        }
        .map_err(|error| format!("failed to load fixture: {error}"))?;

        fixture
            .cart(&config, clock)
            .map_err(|error| format!("failed to build cart: {error}"))?
    };

    if let Some(dir) = &cli.storage_dir {
        let store = FileStore::open(dir)
            .map_err(|error| format!("failed to open storage {}: {error}", dir.display()))?;
        let adapter = PersistenceAdapter::from_config(Arc::new(store), &config);

        adapter.schedule_save(cart.items());
        adapter.flush();

        info!(dir = %dir.display(), "saved cart items");
    }

    let mut out = io::stdout().lock();

    cart.summary()
        .write_to(&mut out, cart.items())
        .map_err(|error| format!("failed to render summary: {error}"))?;

    let ready = if cart.checkout_validation().is_ready() {
        "yes"
    } else {
        "no"
    };

    writeln!(out, " Ready for checkout: {ready}")
        .map_err(|error| format!("failed to render summary: {error}"))?;

    Ok(())
}

async fn fetch_remote(config: &CartConfig, clock: Arc<dyn Clock>) -> Result<CartAggregate, String> {
    let remote = HttpCartService::from_config(config)
        .map_err(|error| format!("failed to create cart client: {error}"))?
        .ok_or("api_base_url is not configured")?;

    let cart = CartAggregate::from_config(config, clock)
        .map_err(|error| format!("invalid config: {error}"))?
        .into_shared();

    let controller = SyncController::new(Arc::clone(&cart), Arc::new(remote));

    controller
        .sync_cart()
        .await
        .map_err(|error| format!("failed to fetch cart: {error}"))?;

    drop(controller);

    Arc::try_unwrap(cart)
        .map(tokio::sync::Mutex::into_inner)
        .map_err(|_shared| "cart is still shared".to_string())
}
