//! Watch a client reconnect to a TCP endpoint that comes up late.
//!
//! Run with: cargo run -p rpc-supervisor --example tcp_reconnect

use rpc_supervisor::{Client, SupervisorConfig, TcpTransport};
use std::time::Duration;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_target(false).init();

    // Reserve a free port, then release it so the endpoint starts out down
    let addr = TcpListener::bind("127.0.0.1:0").await?.local_addr()?;

    let config = SupervisorConfig::builder()
        .name("example")
        .period(Duration::from_millis(200))
        .warning_every(3)
        .shutdown_timeout(Duration::from_secs(1))
        .on_state_change(|from, to| println!("state: {} -> {}", from, to))
        .on_recovered(|failures, downtime| {
            println!("recovered after {} failures ({:?} down)", failures, downtime)
        })
        .build();

    let client = Client::connect(TcpTransport::new(addr.to_string()), config).await?;
    println!("connected at start: {}", client.is_connected());

    // Let the outage run past the shutdown timeout so the escalation fires
    tokio::time::sleep(Duration::from_millis(1500)).await;

    let listener = TcpListener::bind(addr).await?;
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            drop(socket);
        }
    });

    while !client.is_connected() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    println!("connected: {}", client.is_connected());

    client.close(Duration::from_secs(2)).await;
    Ok(())
}
