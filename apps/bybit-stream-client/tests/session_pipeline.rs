//! Session Pipeline Integration Tests
//!
//! Drives a session with a synthetic frame stream and captures everything it
//! writes through the real outbound writer.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::sync::Arc;

use futures::StreamExt;
use futures::channel::mpsc::unbounded;
use futures::stream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use bybit_stream_client::infrastructure::bybit::OutboundQueue;
use bybit_stream_client::{
    BybitClientError, FrameSink, Session, SessionConfig, StreamEvent, StreamMode,
    SubscriptionRequest,
};

fn text(frame: &str) -> Result<Message, tokio_tungstenite::tungstenite::Error> {
    Ok(Message::text(frame.to_string()))
}

#[tokio::test]
async fn mixed_frames_yield_one_pong_and_one_record() {
    let (sink_tx, sink_rx) = unbounded::<Message>();
    let (queue, writer) = OutboundQueue::spawn(sink_tx, 16);
    let (event_tx, mut event_rx) = mpsc::channel(16);

    let mut session = Session::new(
        SubscriptionRequest::from_symbol_list(StreamMode::Trade, "btc"),
        SessionConfig::default(),
        Arc::new(queue) as Arc<dyn FrameSink>,
        event_tx,
    );

    let mut frames = stream::iter(vec![
        text(r#"{"op":"ping","ts":1700000000123}"#),
        text(
            r#"{"topic":"publicTrade.BTCUSDT","ts":1700000000500,"data":[{"s":"BTCUSDT","p":"123.45","T":1700000000000}]}"#,
        ),
        text(r#"{"topic":"publicTrade.BTCUSDT","data":[{"#),
        Ok(Message::binary(vec![0x1f_u8, 0x8b, 0x08, 0x00])),
    ]);

    let result = session.run(&mut frames, &CancellationToken::new()).await;
    assert!(matches!(result, Err(BybitClientError::ConnectionClosed)));

    let stats = *session.stats();
    assert_eq!(stats.frames, 4);
    assert_eq!(stats.pongs_sent, 1);
    assert_eq!(stats.records, 1);
    assert_eq!(stats.binary_frames, 1);
    assert_eq!(stats.ignored_frames, 1);

    drop(session);
    writer.shutdown().await;

    let written: Vec<Message> = sink_rx.collect().await;
    assert_eq!(
        written,
        vec![Message::text(r#"{"op":"pong","ts":1700000000123}"#.to_string())]
    );

    match event_rx.recv().await {
        Some(StreamEvent::Record(record)) => {
            assert_eq!(record.symbol, "BTCUSDT");
            assert!((record.price - 123.45).abs() < 1e-9);
            assert!((record.timestamp - 1_700_000_000.0).abs() < 1e-9);
        }
        other => panic!("expected record, got {other:?}"),
    }
    assert!(event_rx.try_recv().is_err());
}

#[tokio::test]
async fn subscribe_then_ticker_snapshot() {
    let (sink_tx, sink_rx) = unbounded::<Message>();
    let (queue, writer) = OutboundQueue::spawn(sink_tx, 16);
    let (event_tx, mut event_rx) = mpsc::channel(16);

    let mut session = Session::new(
        SubscriptionRequest::new(StreamMode::Ticker, ["btc", "eth"]),
        SessionConfig::default(),
        Arc::new(queue) as Arc<dyn FrameSink>,
        event_tx,
    );

    session.subscribe().await.unwrap();

    let mut frames = stream::iter(vec![
        text(r#"{"success":true,"ret_msg":"","conn_id":"abc","op":"subscribe"}"#),
        text(
            r#"{"topic":"tickers.ETHUSDT","ts":1700000000000,"type":"snapshot","data":{"symbol":"ETHUSDT","lastPrice":"2000.5"}}"#,
        ),
        Ok(Message::Close(None)),
    ]);

    let result = session.run(&mut frames, &CancellationToken::new()).await;
    assert!(matches!(result, Err(BybitClientError::ConnectionClosed)));

    drop(session);
    writer.shutdown().await;

    let written: Vec<Message> = sink_rx.collect().await;
    assert_eq!(
        written,
        vec![Message::text(
            r#"{"op":"subscribe","args":["tickers.BTCUSDT","tickers.ETHUSDT"]}"#.to_string()
        )]
    );

    assert!(matches!(
        event_rx.recv().await,
        Some(StreamEvent::SubscribeAck { success: true, .. })
    ));
    match event_rx.recv().await {
        Some(StreamEvent::Record(record)) => {
            assert_eq!(record.symbol, "ETHUSDT");
            assert!((record.timestamp - 1_700_000_000.0).abs() < 1e-9);
        }
        other => panic!("expected record, got {other:?}"),
    }
}
