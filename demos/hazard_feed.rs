// demos/hazard_feed.rs
//
// Connects to the realtime endpoint from HAZARD_WS_URL and prints alerts,
// nearby mentions and updates for one report until Ctrl+C.
//
//   HAZARD_WS_URL=wss://... HAZARD_REPORT_ID=R-1042 cargo run --example hazard_feed
use hazard_realtime::{InboundMessage, RealtimeConfig, RealtimeManager};
use std::env;
use std::sync::Arc;

fn print_message(label: &'static str) -> Arc<dyn Fn(&InboundMessage) + Send + Sync> {
    Arc::new(move |msg: &InboundMessage| {
        println!(
            "[{}] {:?} at {}: {}",
            label,
            msg.message_type,
            msg.timestamp.as_deref().unwrap_or("-"),
            msg.data
        );
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging (optional)
    env_logger::init();

    // Optional: Load .env file if you have one
    dotenv::dotenv().ok();

    let config = RealtimeConfig::from_env()?;
    println!("Connecting to realtime endpoint at {}...", config.url);
    let manager = RealtimeManager::new(config)?;

    let mut status = manager.watch_status();
    tokio::spawn(async move {
        while status.changed().await.is_ok() {
            let current = *status.borrow_and_update();
            println!("Connection status: {}", current);
        }
    });

    manager.subscribe_to_global(print_message("global"));
    manager.subscribe_to_location(13.0827, 80.2707, 10.0, print_message("nearby"));
    if let Ok(report_id) = env::var("HAZARD_REPORT_ID") {
        manager.subscribe_to_report(report_id, print_message("report"));
    }

    if let Err(e) = manager.connect().await {
        eprintln!("Initial connection failed, retrying in background: {}", e);
    }

    tokio::signal::ctrl_c().await?;
    println!("Shutting down...");
    manager.disconnect().await;
    Ok(())
}
