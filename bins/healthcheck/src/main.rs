//! Uplink connection health check.
//!
//! Probes the configured storage provider once, applies the outcome to the
//! previous snapshot and prints the result. Exits non-zero unless healthy.
//!
//! Usage:
//!   uplink-healthcheck                   - Probe and print
//!   uplink-healthcheck --persist         - Also load and store snapshots
//!   uplink-healthcheck --user <uuid>     - Attribute the snapshot to a user
//!   uplink-healthcheck --json            - Print the snapshot as JSON

use std::process::ExitCode;

use chrono::Utc;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use uplink_core::health::CloudStorageHealthStatus;
use uplink_core::provider::ProviderAdapter;
use uplink_core::recovery::{RecoveryContext, RecoverySelector};
use uplink_db::{HealthStatusRepository, ProviderTokenRepository, connect_with};
use uplink_shared::AppConfig;
use uplink_shared::types::UserId;

#[derive(Debug, Parser)]
#[command(name = "uplink-healthcheck", version, about)]
struct Args {
    /// User the connection belongs to.
    #[arg(long, env = "UPLINK_HEALTHCHECK_USER")]
    user: Option<UserId>,

    /// Read the previous snapshot from and store the new one in the database.
    #[arg(long)]
    persist: bool,

    /// Print the snapshot as JSON and log in JSON.
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "uplink=debug,uplink_core=debug,uplink_db=debug".into());
    if args.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    let config = AppConfig::load()?;
    let reliability = &config.reliability;
    let adapter = ProviderAdapter::from_settings(&config.storage, &reliability.health)?;
    let provider = adapter.kind();

    let store = if args.persist {
        let db = connect_with(&config.database).await?;
        info!("Connected to database");
        Some((
            HealthStatusRepository::new(db.clone()),
            ProviderTokenRepository::new(db),
        ))
    } else {
        None
    };

    let mut previous = None;
    let mut has_refresh_token = false;
    if let Some((snapshots, tokens)) = &store {
        previous = snapshots.latest_for(args.user, provider).await?;
        if let Some(user_id) = args.user
            && let Some(token) = tokens.find_for_user(user_id, provider).await?
        {
            has_refresh_token = token.has_refresh_token();
            previous = previous.map(|status| match token.expires_at {
                Some(at) => status.with_token_expiry(at),
                None => status,
            });
        }
    }

    let current = previous.unwrap_or_else(|| {
        let fresh = CloudStorageHealthStatus::healthy(provider, Utc::now()).with_last_success(None);
        match args.user {
            Some(user_id) => fresh.with_user(user_id),
            None => fresh,
        }
    });

    let next = adapter.check_health(&current).await;

    let warning_window =
        chrono::Duration::from_std(std::time::Duration::from_secs(reliability.health.token_expiry_warning_secs))
            .unwrap_or(chrono::Duration::MAX);
    if next.is_token_expiring_within(warning_window, Utc::now()) {
        warn!(
            provider = %provider,
            token_expires_at = ?next.token_expires_at,
            "Access token expires soon"
        );
    }

    if let Some((snapshots, _)) = &store {
        let id = snapshots.record(&next).await?;
        info!(snapshot_id = %id, "Health snapshot stored");
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&next)?);
    } else {
        println!("{provider}: {} ({} consecutive failures)", next.status, next.consecutive_failures);
        if let Some(error_type) = next.last_error_type {
            let selector = RecoverySelector::new(&reliability.health);
            let context = RecoveryContext::from_status(&next, has_refresh_token);
            println!("  last error: {error_type}: {}", error_type.user_message());
            println!("  recovery:   {}", selector.select_strategy(error_type, &context));
        }
    }

    Ok(if next.is_healthy() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
