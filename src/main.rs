use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use mini_dish::config::DatabaseConfig;
use mini_dish::metrics::Metrics;
use mini_dish::{ErrorKind, OrderRepository};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured logging with environment-based filtering
    // Default to INFO level, can be overridden with RUST_LOG env var
    // Example: RUST_LOG=debug cargo run -- ORD-001
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,mini_dish=debug"))
        )
        .init();

    let reference = std::env::args().nth(1).unwrap_or_else(|| "%".to_string());

    // === 1. Configuration and pool ===
    let config = DatabaseConfig::from_env()?;
    tracing::info!(
        max_connections = config.max_connections,
        reference_match = ?config.reference_match,
        "Connecting to PostgreSQL"
    );
    let storage = config.connect_storage().await?;

    // === 2. Repository ===
    let metrics = Arc::new(Metrics::new()?);
    let repository = OrderRepository::new(storage, metrics.clone());

    // === 3. Load one order aggregate ===
    match repository.find_order_by_reference(&reference).await {
        Ok(order) => {
            tracing::info!(
                order_id = ?order.id,
                reference = %order.reference,
                line_count = order.dish_orders.len(),
                total = order.total_amount(),
                "📦 Order loaded"
            );
            println!("{}", serde_json::to_string_pretty(&order)?);
        }
        Err(err) if err.kind() == ErrorKind::NotFound => {
            tracing::warn!(reference = %reference, "No order matches reference");
        }
        Err(err) => return Err(err.into()),
    }

    tracing::debug!(
        "📊 Metrics registry holds {} metric families",
        metrics.registry().gather().len()
    );

    Ok(())
}
