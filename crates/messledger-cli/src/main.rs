//! messledger - mess expense balances from the command line.
//!
//! Talks to the remote API when it is reachable and falls back to the local
//! store when it is not. Every command reports which source answered.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tokio::sync::broadcast;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use messledger_core::auth::KeyringTokenStore;
use messledger_core::models::{MemberSummary, MonthSummary};
use messledger_core::{Config, DataService, DataSourceEvent, Served};

// ============================================================================
// Constants
// ============================================================================

/// Keychain account holding the API token
const TOKEN_ACCOUNT: &str = "api-token";

/// Environment overrides for the config file
const ENV_API_URL: &str = "MESSLEDGER_API_URL";
const ENV_DATA_DIR: &str = "MESSLEDGER_DATA_DIR";

const USAGE: &str = "\
Usage: messledger <command> [args]

Commands:
  health                       Check the remote service
  login <email>                Sign in (prompts for the password)
  logout                       Sign out
  whoami                       Show the signed-in user
  months <mess-id>             List the months of a mess
  summary <month-id>           Month totals and every member's balance
  member <user-id> <month-id>  One member's balance
";

/// Initialize the tracing subscriber for logging
///
/// Logs go to stderr and to a daily file under `<data_dir>/logs`.
/// Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
fn init_tracing(log_dir: &Path) -> WorkerGuard {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let file_appender = tracing_appender::rolling::daily(log_dir, "messledger.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(fmt::layer().with_ansi(false).with_writer(file_writer))
        .with(filter)
        .init();

    guard
}

fn load_config() -> Result<Config> {
    let mut config = Config::load().context("Failed to load config")?;
    if let Ok(url) = std::env::var(ENV_API_URL) {
        config.api_base_url = Some(url);
    }
    if let Ok(dir) = std::env::var(ENV_DATA_DIR) {
        config.data_dir = Some(PathBuf::from(dir));
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first().map(String::as_str) else {
        eprint!("{}", USAGE);
        return Ok(());
    };
    if matches!(command, "help" | "--help" | "-h") {
        print!("{}", USAGE);
        return Ok(());
    }

    let mut config = load_config()?;
    let data_dir = config.data_dir()?;
    let log_dir = data_dir.join("logs");
    std::fs::create_dir_all(&log_dir).context("Failed to create log directory")?;
    let _guard = init_tracing(&log_dir);
    info!(command, remote = config.remote_configured(), "messledger starting");

    let tokens = Arc::new(KeyringTokenStore::new(TOKEN_ACCOUNT));
    let service = DataService::from_config(&config, tokens)?;
    let mut events = service.subscribe();

    let result = match (command, &args[1..]) {
        ("health", []) => health(&service).await,
        ("login", [email]) => login(&service, email).await.and_then(|()| {
            config.last_email = Some(email.clone());
            config.save()
        }),
        ("logout", []) => served(service.logout().await).map(|()| println!("Signed out")),
        ("whoami", []) => whoami(&service).await,
        ("months", [mess_id]) => months(&service, mess_id).await,
        ("summary", [month_id]) => summary(&service, month_id).await,
        ("member", [user_id, month_id]) => member(&service, user_id, month_id).await,
        _ => Err(anyhow!("Unknown command or wrong arguments\n\n{}", USAGE)),
    };

    report_fallbacks(&mut events);
    result
}

/// Unwrap a served value, noting when it came from the local store.
fn served<T>(served: Served<T>) -> Result<T> {
    if served.is_local() {
        eprintln!("(offline: answered from the local store)");
    }
    served.into_result().map_err(Into::into)
}

fn report_fallbacks(events: &mut broadcast::Receiver<DataSourceEvent>) {
    while let Ok(event) = events.try_recv() {
        match event {
            DataSourceEvent::FellBackToLocal { operation, reason } => {
                eprintln!("warning: {} fell back to the local store ({})", operation, reason)
            }
            DataSourceEvent::RemoteRestored => info!("Remote service reachable"),
        }
    }
}

async fn health(service: &DataService) -> Result<()> {
    if !service.monitor().is_remote_configured() {
        println!("No remote configured; running from the local store only");
        return Ok(());
    }
    let status = service.check_health().await;
    println!(
        "backend: {}\ndata store: {}\nsource: {}",
        if status.backend_available { "up" } else { "down" },
        if status.data_store_connected { "connected" } else { "disconnected" },
        if service.monitor().should_use_remote() { "remote" } else { "local" },
    );
    Ok(())
}

async fn login(service: &DataService, email: &str) -> Result<()> {
    let password = rpassword::prompt_password("Password: ")?;
    let user = served(service.login(email, &password).await)?;
    println!("Signed in as {} ({})", user.name, user.role);
    Ok(())
}

async fn whoami(service: &DataService) -> Result<()> {
    match served(service.current_user().await)? {
        Some(user) => println!("{} <{}> {}", user.name, user.email, user.role),
        None => println!("Not signed in"),
    }
    Ok(())
}

async fn months(service: &DataService, mess_id: &str) -> Result<()> {
    let months = served(service.get_months(mess_id).await)?;
    if months.is_empty() {
        println!("No months");
    }
    for month in months {
        println!(
            "{}  {:<16} {}{}",
            month.id,
            month.name,
            month.start_date,
            if month.is_active { "  (active)" } else { "" }
        );
    }
    Ok(())
}

async fn summary(service: &DataService, month_id: &str) -> Result<()> {
    let month = served(service.get_month_summary(month_id).await)?;
    print_month(&month);

    let members = served(service.get_all_members_summary(month_id).await)?;
    println!();
    for summary in &members {
        print_member(&summary.rounded());
    }
    Ok(())
}

async fn member(service: &DataService, user_id: &str, month_id: &str) -> Result<()> {
    let summary = served(service.get_member_summary(user_id, month_id).await)?;
    print_member(&summary.rounded());
    Ok(())
}

fn print_month(month: &MonthSummary) {
    println!("Month {} ({} members)", month.month_id, month.member_count);
    println!("  meals:            {:.1}", month.total_meals);
    println!("  meal rate:        {:.2}", month.meal_rate);
    println!("  deposits:         {:.2}", month.total_deposit);
    println!("  meal costs:       {:.2}", month.total_meal_cost);
    println!("  individual costs: {:.2}", month.total_individual_cost);
    println!("  shared costs:     {:.2}", month.total_shared_cost);
    println!("  balance:          {:.2}", month.mess_balance);
}

fn print_member(summary: &MemberSummary) {
    let name = if summary.user_name.is_empty() {
        summary.user_id.as_str()
    } else {
        summary.user_name.as_str()
    };
    println!(
        "{:<20} meals {:>5.1}  cost {:>9.2}  deposit {:>9.2}  balance {:>9.2}{}",
        name,
        summary.total_meals,
        summary.total_cost,
        summary.total_deposit,
        summary.balance,
        if summary.owes() { "  (owes)" } else { "" }
    );
}
