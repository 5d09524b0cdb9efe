use rpc_supervisor::{Client, ServiceTransport, SupervisorConfig, TcpTransport, Transport};
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::Instant;

#[tokio::test]
async fn tcp_client_detects_dropped_peer() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let config = SupervisorConfig::builder()
        .period(Duration::from_millis(50))
        .build();
    let client = Client::connect(TcpTransport::new(addr.to_string()), config)
        .await
        .unwrap();
    assert!(client.is_connected());
    assert!(client.transport().stream().await.is_some());

    // Tear the transport down underneath the supervisor
    client.transport().close().await.unwrap();
    drop(listener);

    let started = Instant::now();
    while client.is_connected() {
        assert!(started.elapsed() < Duration::from_secs(2));
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    tokio::time::sleep(Duration::from_millis(120)).await;
    assert!(client.state().await.consecutive_failures() >= 1);

    client.close(Duration::from_secs(1)).await;
}

#[tokio::test]
async fn tcp_client_notices_server_hangup() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let config = SupervisorConfig::builder()
        .name("hangup")
        .period(Duration::from_millis(50))
        .build();
    let client = Client::connect(TcpTransport::new(addr.to_string()), config)
        .await
        .unwrap();
    let (accepted, _) = listener.accept().await.unwrap();
    assert!(client.is_connected());

    // Server goes away entirely: accepted socket first, then the listener
    drop(accepted);
    drop(listener);

    let started = Instant::now();
    while client.is_connected() {
        assert!(
            started.elapsed() < Duration::from_secs(2),
            "server hangup never detected"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let started = Instant::now();
    while client.state().await.consecutive_failures() == 0 {
        assert!(started.elapsed() < Duration::from_secs(2), "no reconnect attempt");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(client.state().await.episode().is_some());

    client.close(Duration::from_secs(1)).await;
}

#[tokio::test]
async fn tcp_client_reconnects_after_server_restart() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let config = SupervisorConfig::builder()
        .name("restart")
        .period(Duration::from_millis(50))
        .build();
    let client = Client::connect(TcpTransport::new(addr.to_string()), config)
        .await
        .unwrap();
    let (accepted, _) = listener.accept().await.unwrap();
    drop(accepted);

    // Listener stays up, so the next tick reconnects to a fresh socket
    let accept = tokio::spawn(async move { listener.accept().await.map(|(socket, _)| socket) });
    let second = tokio::time::timeout(Duration::from_secs(2), accept)
        .await
        .expect("client never reconnected")
        .unwrap()
        .unwrap();

    let started = Instant::now();
    while !client.is_connected() {
        assert!(started.elapsed() < Duration::from_secs(2));
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(client.state().await.consecutive_failures(), 0);

    drop(second);
    client.close(Duration::from_secs(1)).await;
}

#[tokio::test]
async fn tcp_connect_timeout_is_reported() {
    // Non-routable address: the SYN goes nowhere
    let transport =
        TcpTransport::new("10.255.255.1:9").connect_timeout(Duration::from_millis(50));

    let started = Instant::now();
    let result = transport.connect().await;
    assert!(result.is_err());
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn service_transport_drives_a_tower_connector() {
    let up = Arc::new(AtomicBool::new(false));
    let gate = Arc::clone(&up);

    let connector = tower::service_fn(move |target: String| {
        let up = gate.load(Ordering::SeqCst);
        async move {
            if up {
                Ok(format!("session:{}", target))
            } else {
                Err(io::Error::new(io::ErrorKind::ConnectionRefused, "down"))
            }
        }
    });

    let config = SupervisorConfig::builder()
        .period(Duration::from_millis(100))
        .build();
    let client = Client::connect(ServiceTransport::new(connector, "node-a".to_string()), config)
        .await
        .unwrap();
    assert!(!client.is_connected());
    assert_eq!(client.supervisor().target(), "node-a");

    up.store(true, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(150)).await;

    assert!(client.is_connected());
    assert_eq!(
        client.transport().connection().await.as_deref(),
        Some("session:node-a")
    );

    client.close(Duration::from_secs(1)).await;
    assert!(client.transport().connection().await.is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn tcp_transport_reaches_live_listener() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accept = tokio::spawn(async move { listener.accept().await.map(|(s, _)| s) });

    let client = Client::connect(
        TcpTransport::new(addr.to_string()),
        SupervisorConfig::builder().check(true).build(),
    )
    .await
    .unwrap();
    assert!(client.is_connected());

    let _peer: TcpStream = accept.await.unwrap().unwrap();
    client.close(Duration::from_secs(1)).await;
    assert!(client.transport().stream().await.is_none());
}
