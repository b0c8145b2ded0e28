//! Example: Polling a battery
//!
//! Run with: cargo run --example poll -- <host | config.json> [seconds]
//!
//! This example demonstrates:
//! - Building a client from a host or a JSON configuration file
//! - Running the poller in the background
//! - Watching snapshot updates
//!
//! Set `RUST_LOG=venus_udp=debug` to see every attempt.

use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;
use venus_udp::{Client, ClientConfig, Poller, SOC};

#[tokio::main]
async fn main() -> venus_udp::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // =========================================================================
    // Configure
    // =========================================================================

    let mut args = std::env::args().skip(1);
    let target = args.next().unwrap_or_else(|| "192.168.1.50".to_string());
    let mut config = if target.ends_with(".json") {
        ClientConfig::from_file(&target)?
    } else {
        ClientConfig::new(target)
    };
    if let Some(secs) = args.next().and_then(|s| s.parse().ok()) {
        config = config.with_scan_interval(Duration::from_secs(secs));
    }

    println!(
        "Polling {}:{} every {:?} ({:?} schema)",
        config.host, config.port, config.scan_interval, config.variant
    );
    println!("Worst case per command: {:?}\n", config.retry_policy().worst_case());

    // =========================================================================
    // Poll
    // =========================================================================

    let interval = config.scan_interval;
    let client = Arc::new(Client::new(config)?);
    let poller = Arc::new(Poller::new(client));
    let mut updates = poller.subscribe();

    let background = tokio::spawn({
        let poller = poller.clone();
        async move { poller.run(interval).await }
    });

    // Print five updates, then stop
    for _ in 0..5 {
        if updates.changed().await.is_err() {
            break;
        }
        let state = updates.borrow_and_update().clone();
        match (&state.snapshot, &state.last_error) {
            (Some(snapshot), None) => {
                println!("SoC {:?}%", snapshot.get_i64(SOC));
                for (name, value) in snapshot.iter() {
                    println!("  {name:<16} {value}");
                }
            }
            (snapshot, Some(error)) => {
                println!(
                    "Refresh failed ({} in a row): {error}",
                    state.consecutive_failures
                );
                if snapshot.is_some() {
                    println!("  keeping previous snapshot");
                }
            }
            (None, None) => {}
        }
        println!();
    }

    poller.shutdown();
    background.await.ok();
    Ok(())
}
