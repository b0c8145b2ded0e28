//! Example: Changing the operating mode
//!
//! Run with: cargo run --example set_mode -- <host> '<request json>'
//!
//! The request is the loose form accepted from service calls, e.g.
//!
//! ```text
//! {"mode":"Auto"}
//! {"mode":"Passive","power":-1500,"cd_time":600}
//! {"mode":2,"time_num":1,"start_time":"17:00","end_time":"22:00","days":["mon","fri"],"power":2000}
//! ```

use tracing_subscriber::EnvFilter;
use venus_udp::utils::format_week_set;
use venus_udp::{build_set_mode, Client, ClientConfig, ModeIntent, SetModeRequest, VenusError};

#[tokio::main]
async fn main() -> venus_udp::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut args = std::env::args().skip(1);
    let host = args.next().unwrap_or_else(|| "192.168.1.50".to_string());
    let request = args.next().unwrap_or_else(|| r#"{"mode":"Auto"}"#.to_string());

    // =========================================================================
    // Validate locally
    // =========================================================================

    let request: SetModeRequest = serde_json::from_str(&request)
        .map_err(|e| VenusError::validation("request", e.to_string()))?;
    let intent = ModeIntent::try_from(request)?;

    if let ModeIntent::Manual(slot) = &intent {
        println!("Manual slot {} on {}", slot.time_num, format_week_set(slot.resolved_week_set()?));
    }
    let preview = build_set_mode(0, &intent)?;
    println!("Sending {}", String::from_utf8_lossy(&preview.to_bytes()));

    // =========================================================================
    // Send
    // =========================================================================

    let client = Client::new(ClientConfig::new(host))?;
    match client.set_mode(&intent).await {
        Ok(true) => println!("{} mode accepted", intent.mode()),
        Ok(false) => println!("Device answered but did not confirm the change"),
        Err(VenusError::Exhausted { attempts, last, .. }) => {
            println!("No usable answer after {attempts} attempts: {last}")
        }
        Err(e) => return Err(e),
    }
    Ok(())
}
