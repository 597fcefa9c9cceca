// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! End-to-end tests: real server, real sockets, real client session.

use pitelem::{
    decode, ClientCommand, ClientConfig, ClientSession, ClientView, ConnectionStatus,
    PresentationSink, ServerConfig, StaticSource, TelemetryField, TelemetryServer,
    TelemetrySnapshot, TelemetrySource,
};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

const INTERVAL: Duration = Duration::from_secs(2);

fn server_config(max_connections: u32) -> ServerConfig {
    ServerConfig {
        bind_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
        port: 0,
        max_connections,
        ..Default::default()
    }
}

fn client_config(addr: SocketAddr) -> ClientConfig {
    ClientConfig {
        host: addr.ip().to_string(),
        port: addr.port(),
        fetch_interval_ms: INTERVAL.as_millis() as u64,
        fetch_timeout_ms: 1000,
        ..Default::default()
    }
}

async fn start_server(
    max_connections: u32,
    source: Arc<dyn TelemetrySource>,
) -> (SocketAddr, tokio::task::JoinHandle<pitelem::ServeSummary>) {
    let server = TelemetryServer::bind(server_config(max_connections), source)
        .await
        .unwrap();
    let addr = server.local_addr().unwrap();
    (addr, tokio::spawn(server.run()))
}

async fn read_all(addr: SocketAddr) -> std::io::Result<Vec<u8>> {
    let mut stream = TcpStream::connect(addr).await?;
    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).await?;
    Ok(buf)
}

#[derive(Default)]
struct RecordingSink {
    views: Vec<ClientView>,
    notices: Vec<String>,
}

impl PresentationSink for RecordingSink {
    fn render(&mut self, view: &ClientView) {
        self.views.push(view.clone());
    }

    fn notice(&mut self, line: &str) {
        self.notices.push(line.to_string());
    }
}

/// Panics on its first collection, then behaves like [`StaticSource`].
struct FlakySource {
    calls: AtomicU32,
    inner: StaticSource,
}

impl TelemetrySource for FlakySource {
    fn collect(&self) -> TelemetrySnapshot {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            panic!("sensor bus unavailable");
        }
        self.inner.collect()
    }
}

#[tokio::test]
async fn test_server_serves_up_to_max_then_refuses() {
    let source = StaticSource::default();
    let expected = source.collect();
    let (addr, handle) = start_server(3, Arc::new(source)).await;

    for _ in 0..3 {
        let payload = read_all(addr).await.unwrap();
        let decoded = decode(&payload).unwrap();
        assert_eq!(decoded.complete(), Some(expected.clone()));
    }

    let summary = handle.await.unwrap();
    assert_eq!(summary.connections, 3);
    assert_eq!(summary.served, 3);
    assert_eq!(summary.failed, 0);

    let err = TcpStream::connect(addr).await.unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::ConnectionRefused);
}

#[tokio::test]
async fn test_single_connection_server() {
    let (addr, handle) = start_server(1, Arc::new(StaticSource::default())).await;

    let payload = read_all(addr).await.unwrap();
    assert!(!payload.is_empty());

    let summary = handle.await.unwrap();
    assert_eq!(summary.connections, 1);
    assert!(TcpStream::connect(addr).await.is_err());
}

#[tokio::test]
async fn test_failed_connection_still_counts() {
    let source = FlakySource {
        calls: AtomicU32::new(0),
        inner: StaticSource::default(),
    };
    let (addr, handle) = start_server(2, Arc::new(source)).await;

    // First connection: collection panics, the stream is dropped unsent.
    let first = read_all(addr).await.unwrap_or_default();
    assert!(first.is_empty());

    let second = read_all(addr).await.unwrap();
    assert!(decode(&second).unwrap().complete().is_some());

    let summary = handle.await.unwrap();
    assert_eq!(summary.connections, 2);
    assert_eq!(summary.served, 1);
    assert_eq!(summary.failed, 1);
}

/// Takes long enough to collect that a client can hang up first.
struct SlowSource {
    delay: Duration,
    inner: StaticSource,
}

impl TelemetrySource for SlowSource {
    fn collect(&self) -> TelemetrySnapshot {
        std::thread::sleep(self.delay);
        self.inner.collect()
    }
}

#[tokio::test]
async fn test_reset_before_send_still_counts() {
    let source = SlowSource {
        delay: Duration::from_millis(200),
        inner: StaticSource::default(),
    };
    let (addr, handle) = start_server(2, Arc::new(source)).await;

    // Reset the connection while the server is still collecting.
    let stream = TcpStream::connect(addr).await.unwrap();
    stream.set_linger(Some(Duration::ZERO)).unwrap();
    drop(stream);

    let second = read_all(addr).await.unwrap();
    assert!(decode(&second).unwrap().complete().is_some());

    let summary = handle.await.unwrap();
    assert_eq!(summary.connections, 2);
    assert_eq!(summary.served, 1);
    assert_eq!(summary.failed, 1);
    assert!(TcpStream::connect(addr).await.is_err());
}

#[tokio::test]
async fn test_client_auto_stops_when_server_exits() {
    let (addr, handle) = start_server(2, Arc::new(StaticSource::default())).await;
    let mut session = ClientSession::new(client_config(addr), RecordingSink::default());

    let t0 = Instant::now();
    session.start();

    assert_eq!(session.tick(t0).await, Some(ConnectionStatus::Success));
    assert_eq!(session.state().fetch_count(), 1);
    assert!(session.state().led_on());

    // Not due yet.
    assert_eq!(session.tick(t0 + Duration::from_millis(100)).await, None);

    assert_eq!(
        session.tick(t0 + INTERVAL).await,
        Some(ConnectionStatus::Success)
    );
    assert!(!session.state().led_on());

    let summary = handle.await.unwrap();
    assert_eq!(summary.connections, 2);

    assert_eq!(
        session.tick(t0 + INTERVAL * 2).await,
        Some(ConnectionStatus::ServerExited)
    );
    assert!(!session.state().is_running());
    assert_eq!(session.state().fetch_count(), 3);

    // Idle now: later ticks never fetch again.
    assert_eq!(session.tick(t0 + INTERVAL * 3).await, None);
    assert_eq!(session.state().fetch_count(), 3);

    let sink = session.into_sink();
    assert!(sink
        .notices
        .iter()
        .any(|n| n == "--- Auto Fetch Terminated by Server Exit ---"));
    let last = sink.views.last().unwrap();
    assert_eq!(last.status, ConnectionStatus::ServerExited);
    assert!(!last.running);
    assert!(last
        .telemetry_text
        .as_deref()
        .unwrap()
        .contains("Temperature_C:   47.2"));
}

#[tokio::test]
async fn test_malformed_payload_sets_error_and_keeps_running() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            let _ = stream.write_all(b"not-json").await;
            let _ = stream.shutdown().await;
        }
    });

    let mut session = ClientSession::new(client_config(addr), RecordingSink::default());
    let t0 = Instant::now();
    session.start();

    assert_eq!(session.tick(t0).await, Some(ConnectionStatus::Error));
    assert!(session.state().is_running());
    assert!(!session.state().led_on());

    // Retries on the next interval.
    assert_eq!(
        session.tick(t0 + INTERVAL).await,
        Some(ConnectionStatus::Error)
    );
    assert_eq!(session.state().fetch_count(), 2);

    let sink = session.into_sink();
    assert!(sink.notices[1].starts_with("An error occurred on fetch #1:"));
}

#[tokio::test]
async fn test_partial_payload_is_displayed() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        stream
            .write_all(br#"{"Temperature_C":"N/A","Firmware_Version":"v9"}"#)
            .await
            .unwrap();
        stream.shutdown().await.unwrap();
    });

    let mut session = ClientSession::new(client_config(addr), RecordingSink::default());
    session.start();
    assert_eq!(
        session.tick(Instant::now()).await,
        Some(ConnectionStatus::Success)
    );

    let telemetry = session.state().telemetry().unwrap();
    assert_eq!(telemetry.entries().len(), 2);
    assert_eq!(
        telemetry.unparsed_fields(),
        vec![TelemetryField::TemperatureC]
    );
    assert!(telemetry.get(TelemetryField::CoreVoltageV).is_none());
}

#[tokio::test]
async fn test_stop_prevents_next_fetch() {
    let (addr, handle) = start_server(5, Arc::new(StaticSource::default())).await;
    let mut session = ClientSession::new(client_config(addr), RecordingSink::default());

    let t0 = Instant::now();
    session.start();
    assert_eq!(session.tick(t0).await, Some(ConnectionStatus::Success));

    assert_eq!(session.stop(), 1);
    assert_eq!(session.tick(t0 + INTERVAL).await, None);
    assert_eq!(session.state().status(), ConnectionStatus::Idle);
    assert_eq!(session.state().fetch_count(), 1);

    handle.abort();
}

#[tokio::test]
async fn test_run_loop_until_server_exit() {
    let (addr, handle) = start_server(1, Arc::new(StaticSource::default())).await;
    let config = ClientConfig {
        fetch_interval_ms: 50,
        poll_interval_ms: 10,
        ..client_config(addr)
    };
    let mut session = ClientSession::new(config, RecordingSink::default());

    let (tx, rx) = mpsc::channel(4);
    tx.send(ClientCommand::Start).await.unwrap();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        let _ = tx.send(ClientCommand::Exit).await;
    });

    session.run(rx).await;

    assert_eq!(handle.await.unwrap().served, 1);
    assert!(!session.state().is_running());
    assert_eq!(session.state().status(), ConnectionStatus::ServerExited);
    assert_eq!(session.state().fetch_count(), 2);
}
