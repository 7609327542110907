//! Subscribe to `pings` and time a burst of `version` queries.
//!
//! Endpoints come from `LINKWIRE_HTTP_ENDPOINT` and `LINKWIRE_WS_ENDPOINT`.
//! Set `RUST_LOG=linkwire=debug` to watch the links work.
//!
//! ```text
//! cargo run -p linkwire --example pings
//! ```

use std::time::{Duration, Instant};

use linkwire::{ClientConfig, SubscriptionHandlers};
use tracing_subscriber::EnvFilter;

const QUERIES: usize = 500;

#[tokio::main]
async fn main() -> linkwire::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let client = linkwire::init(ClientConfig::from_env()?)?;

    let pings = client.add_subscription(
        ["pings"],
        SubscriptionHandlers::new(
            |value| tracing::info!(%value, "ping"),
            |error| tracing::warn!(%error, "pings ended"),
        ),
    );

    let started = Instant::now();
    let mut tasks = Vec::with_capacity(QUERIES);
    for _ in 0..QUERIES {
        let client = client.clone();
        tasks.push(tokio::spawn(async move {
            client.query::<String>(["version"]).await
        }));
    }

    let mut failed = 0;
    let mut version = None;
    for task in tasks {
        match task.await {
            Ok(Ok(v)) => version = Some(v),
            Ok(Err(error)) => {
                failed += 1;
                tracing::debug!(%error, "version query failed");
            }
            Err(error) => {
                failed += 1;
                tracing::debug!(%error, "query task panicked");
            }
        }
    }
    tracing::info!(
        queries = QUERIES,
        failed,
        version = version.as_deref().unwrap_or("unknown"),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "version queries finished"
    );

    tokio::time::sleep(Duration::from_secs(5)).await;
    pings.cancel();
    client.dispose();
    Ok(())
}
