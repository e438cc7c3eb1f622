//! Full relay against a mock upstream feed and a mock rate endpoint.

use axum::routing::get;
use axum::{Json, Router};
use futures_util::{SinkExt, StreamExt};
use relay_app::{AppConfig, Application};
use relay_core::SymbolMeta;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::handshake::server::{Request, Response};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_hdr_async, connect_async};

/// What the mock upstream observed.
#[derive(Debug, Default)]
struct UpstreamLog {
    request_uri: Option<String>,
    close: Option<(u16, String)>,
}

/// Accept one connection, push one ticker frame per entry in `frames`, then
/// wait for the client to close.
async fn start_upstream(frames: Vec<String>) -> (SocketAddr, Arc<Mutex<UpstreamLog>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let log = Arc::new(Mutex::new(UpstreamLog::default()));
    let log_clone = log.clone();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let uri_log = log_clone.clone();
        let mut ws = accept_hdr_async(stream, move |req: &Request, resp: Response| {
            uri_log.lock().unwrap().request_uri = Some(req.uri().to_string());
            Ok(resp)
        })
        .await
        .unwrap();

        for frame in frames {
            ws.send(Message::Text(frame)).await.unwrap();
        }

        while let Some(Ok(msg)) = ws.next().await {
            if let Message::Close(frame) = msg {
                if let Some(f) = frame {
                    log_clone.lock().unwrap().close = Some((f.code.into(), f.reason.to_string()));
                }
                break;
            }
        }
    });

    (addr, log)
}

async fn start_fx(rate: f64) -> SocketAddr {
    let app = Router::new().route(
        "/latest",
        get(move || async move { Json(json!({"amount": 1.0, "base": "USD", "rates": {"INR": rate}})) }),
    );
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn ticker(stream_id: &str, price: &str) -> String {
    json!({
        "stream": format!("{stream_id}@ticker"),
        "data": {"e": "24hrTicker", "c": price, "P": "2.50", "h": "51000", "l": "49000", "q": "123456.7"}
    })
    .to_string()
}

fn config(upstream: SocketAddr, fx: SocketAddr) -> AppConfig {
    let mut config = AppConfig::default();
    config.server.broadcast_interval_ms = 100;
    config.upstream.url = format!("ws://{upstream}/stream");
    config.upstream.reconnect_delay_ms = 200;
    config.fx.url = format!("http://{fx}/latest");
    config.symbols = vec![
        SymbolMeta::new("btcusdt", "BTC", "Bitcoin"),
        SymbolMeta::new("ethusdt", "ETH", "Ethereum"),
    ];
    config
}

#[tokio::test]
async fn test_relay_end_to_end() {
    let (upstream_addr, upstream_log) = start_upstream(vec![
        r#"{"result":null,"id":1}"#.to_string(),
        ticker("dogeusdt", "0.12"),
        ticker("btcusdt", "50000"),
    ])
    .await;
    let fx_addr = start_fx(80.0).await;

    let app = Application::new(config(upstream_addr, fx_addr)).unwrap();
    let token = app.shutdown_token();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let relay_addr = listener.local_addr().unwrap();
    let (_stop_tx, stop_rx) = oneshot::channel::<()>();
    let app_task = tokio::spawn(app.run_with_listener(listener, async move {
        let _ = stop_rx.await;
    }));

    let (mut client, _) = connect_async(format!("ws://{relay_addr}/")).await.unwrap();

    // First payload carrying BTC data, whether join snapshot or scheduled flush.
    let payload: Value = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match client.next().await {
                Some(Ok(Message::Text(text))) => {
                    let value: Value = serde_json::from_str(&text).unwrap();
                    if !value["data"][0]["price_usd"].is_null() {
                        return value;
                    }
                }
                Some(Ok(_)) => {}
                other => panic!("subscriber stream ended: {other:?}"),
            }
        }
    })
    .await
    .expect("no price update within 5s");

    assert_eq!(payload["type"], "price_update");
    assert_eq!(payload["inrRate"], 80.0);
    assert!(payload["timestamp"].as_str().unwrap().ends_with('Z'));
    let data = payload["data"].as_array().unwrap();
    assert_eq!(data.len(), 2);
    assert_eq!(data[0]["symbol"], "BTC");
    assert_eq!(data[0]["price_inr"], 4_000_000.0);
    assert_eq!(data[0]["change_24h"], 2.5);
    assert_eq!(data[1]["symbol"], "ETH");
    assert!(data[1]["price_usd"].is_null());
    assert!(data.iter().all(|e| e["id"] != "dogeusdt"));

    let health: Value = reqwest::get(format!("http://{relay_addr}/api/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["binanceConnected"], true);
    assert_eq!(health["cachedSymbols"], 1);
    assert_eq!(health["inrRate"], 80.0);
    assert!(health["inrRateLastUpdated"].is_string());

    let uri = upstream_log.lock().unwrap().request_uri.clone().unwrap();
    assert_eq!(uri, "/stream?streams=btcusdt@ticker/ethusdt@ticker");

    token.cancel();

    let close = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match client.next().await {
                Some(Ok(Message::Close(frame))) => return frame,
                Some(Ok(_)) => {}
                other => panic!("no close frame: {other:?}"),
            }
        }
    })
    .await
    .expect("subscriber not closed")
    .expect("close frame without payload");
    assert_eq!(u16::from(close.code), 1001);

    tokio::time::timeout(Duration::from_secs(10), app_task)
        .await
        .expect("relay did not stop")
        .unwrap()
        .unwrap();

    let upstream_close = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            if let Some(close) = upstream_log.lock().unwrap().close.clone() {
                return Some(close);
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("upstream never saw a close frame");
    assert_eq!(
        upstream_close,
        Some((1000, "Server shutting down".to_string()))
    );
}

#[tokio::test]
async fn test_fx_failure_at_startup_uses_fallback() {
    let (upstream_addr, _log) = start_upstream(vec![ticker("ethusdt", "3000")]).await;

    // Nothing listens on this port.
    let dead = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let fx_addr = dead.local_addr().unwrap();
    drop(dead);

    let app = Application::new(config(upstream_addr, fx_addr)).unwrap();
    let token = app.shutdown_token();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let relay_addr = listener.local_addr().unwrap();
    let app_task = tokio::spawn(app.run_with_listener(listener, std::future::pending()));

    let (mut client, _) = connect_async(format!("ws://{relay_addr}/ws")).await.unwrap();
    let payload: Value = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match client.next().await {
                Some(Ok(Message::Text(text))) => {
                    let value: Value = serde_json::from_str(&text).unwrap();
                    if !value["data"][1]["price_usd"].is_null() {
                        return value;
                    }
                }
                Some(Ok(_)) => {}
                other => panic!("subscriber stream ended: {other:?}"),
            }
        }
    })
    .await
    .expect("no price update within 5s");

    assert_eq!(payload["inrRate"], 86.0);
    assert_eq!(payload["data"][1]["price_inr"], 3000.0 * 86.0);

    token.cancel();
    tokio::time::timeout(Duration::from_secs(10), app_task)
        .await
        .expect("relay did not stop")
        .unwrap()
        .unwrap();
}
