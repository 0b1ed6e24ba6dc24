//! End-to-end ask streams against a scripted local hub.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use sydney_stream::{
    AskOptions, CancellationToken, Client, Conversation, Error, ErrorCategory, Message,
};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing_subscriber::EnvFilter;

// ============================================================================
// Scripted Hub
// ============================================================================

/// How the hub behaves after sending its frames.
#[derive(Clone, Copy)]
enum Finish {
    /// Close the connection.
    Close,
    /// Stay silent and keep the connection open.
    Hang,
    /// Stay silent until the client releases the connection.
    Watch,
}

/// A scripted hub serving one ask.
struct Hub {
    url: String,
    /// The chat request the client sent.
    request: oneshot::Receiver<Value>,
    /// Fires when the client closes or drops the connection.
    released: oneshot::Receiver<()>,
}

/// Routes crate logs to the test output, filtered by `RUST_LOG`.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn record(value: Value) -> String {
    format!("{value}\u{1e}")
}

fn update(message: Value) -> Value {
    json!({ "type": 1, "target": "update", "arguments": [{ "messages": [message] }] })
}

fn completion(messages: Value) -> Value {
    json!({
        "type": 2,
        "invocationId": "0",
        "item": { "messages": messages, "result": { "value": "Success", "message": null } }
    })
}

/// Reads the next text frame sent by the client.
async fn next_text(ws: &mut WebSocketStream<TcpStream>) -> String {
    loop {
        match ws.next().await {
            Some(Ok(WsMessage::Text(text))) => return text.as_str().to_owned(),
            Some(Ok(_)) => continue,
            other => panic!("hub read failed: {other:?}"),
        }
    }
}

/// Serves one ask: handshake, request, then `frames` in order.
async fn spawn_hub(frames: Vec<String>, finish: Finish) -> Hub {
    let listener = TcpListener::bind(SocketAddr::from((Ipv4Addr::LOCALHOST, 0)))
        .await
        .expect("bind");
    let port = listener.local_addr().expect("addr").port();
    let (request_tx, request_rx) = oneshot::channel();
    let (released_tx, released_rx) = oneshot::channel();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.expect("accept");
        let mut ws = tokio_tungstenite::accept_async(stream).await.expect("upgrade");

        let protocol = next_text(&mut ws).await;
        assert!(protocol.starts_with(r#"{"protocol": "json""#));
        ws.send(WsMessage::Text("{}\u{1e}".to_string().into()))
            .await
            .expect("handshake reply");
        let keep_alive = next_text(&mut ws).await;
        assert_eq!(keep_alive, "{\"type\": 6}\u{1e}");
        let request = next_text(&mut ws).await;

        let body = request.trim_end_matches('\u{1e}');
        let _ = request_tx.send(serde_json::from_str(body).expect("request json"));

        for frame in frames {
            ws.send(WsMessage::Text(frame.into())).await.expect("send");
        }

        match finish {
            Finish::Close => {
                let _ = ws.close(None).await;
                while ws.next().await.is_some() {}
            }
            Finish::Hang => tokio::time::sleep(Duration::from_secs(30)).await,
            Finish::Watch => {
                while let Some(Ok(message)) = ws.next().await {
                    if message.is_close() {
                        break;
                    }
                }
                let _ = released_tx.send(());
            }
        }
    });

    Hub {
        url: format!("ws://127.0.0.1:{port}/sydney/ChatHub"),
        request: request_rx,
        released: released_rx,
    }
}

fn client(url: &str) -> Client {
    init_tracing();
    Client::builder()
        .wss_url(url)
        .read_timeout(Duration::from_secs(5))
        .build()
        .expect("client")
}

fn ask(prompt: &str) -> AskOptions {
    AskOptions::new(Conversation::new("conv-1", "client-1"), prompt)
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_incremental_answer_with_suggestions() -> anyhow::Result<()> {
    let frames = vec![
        record(json!({ "type": 6 })),
        record(update(json!({ "messageType": "InternalSearchQuery", "hiddenText": "rust" }))),
        record(update(json!({ "text": "Hel" }))),
        format!(
            "{}{}",
            record(update(json!({ "text": "Hello" }))),
            record(update(json!({ "text": "Hello wor" })))
        ),
        record(update(json!({
            "text": "Hello world",
            "suggestedResponses": [{ "text": "More" }]
        }))),
        record(completion(json!([
            { "text": "hi", "author": "user" },
            { "text": "Hello world", "suggestedResponses": [{ "text": "Final" }] }
        ]))),
    ];
    let hub = spawn_hub(frames, Finish::Close).await;

    let messages = client(&hub.url).ask_stream(ask("hi")).collect_all().await;

    let kinds: Vec<_> = messages.iter().map(|m| m.kind().as_str()).collect();
    assert_eq!(
        kinds,
        vec![
            "search_query",
            "message",
            "message",
            "message",
            "message",
            "suggested_responses",
            "suggested_responses"
        ]
    );

    let text: String = messages
        .iter()
        .filter_map(|m| match m {
            Message::Text(delta) => Some(delta.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(text, "Hello world");
    assert!(matches!(
        messages.last(),
        Some(Message::SuggestedResponses(s)) if s == &["Final".to_string()]
    ));

    let request = hub.request.await?;
    assert_eq!(request["target"], "chat");
    assert_eq!(request["arguments"][0]["message"]["text"], "hi");
    assert_eq!(request["arguments"][0]["conversationId"], "conv-1");
    Ok(())
}

#[tokio::test]
async fn test_backend_failure_ends_stream() {
    let frames = vec![
        record(update(json!({ "text": "Hi" }))),
        record(json!({
            "type": 2,
            "item": { "result": { "value": "Throttled", "message": "Request is throttled." } }
        })),
    ];
    let hub = spawn_hub(frames, Finish::Hang).await;

    let messages = client(&hub.url).ask_stream(ask("hi")).collect_all().await;

    assert_eq!(messages.len(), 2);
    match &messages[1] {
        Message::Error(Error::Backend { code, message }) => {
            assert_eq!(code, "Throttled");
            assert_eq!(message, "Request is throttled.");
        }
        other => panic!("expected backend error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_malformed_record_ends_stream() {
    let frames = vec![
        "{\"type\":1,\u{1e}".to_string(),
        record(update(json!({ "text": "never seen" }))),
    ];
    let hub = spawn_hub(frames, Finish::Hang).await;

    let messages = client(&hub.url).ask_stream(ask("hi")).collect_all().await;

    assert_eq!(messages.len(), 1);
    match &messages[0] {
        Message::Error(err) => assert_eq!(err.category(), ErrorCategory::MalformedEvent),
        other => panic!("expected error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_revoked_answer() {
    let frames = vec![
        record(update(json!({ "text": "Partial answer" }))),
        record(update(json!({ "text": "Sorry", "contentOrigin": "Apology" }))),
        record(update(json!({ "text": "never seen" }))),
    ];
    let hub = spawn_hub(frames, Finish::Hang).await;

    let messages = client(&hub.url).ask_stream(ask("hi")).collect_all().await;

    assert_eq!(messages.len(), 2);
    assert!(matches!(&messages[0], Message::Text(t) if t == "Partial answer"));
    assert!(matches!(messages[1], Message::Error(Error::MessageRevoked)));
}

#[tokio::test]
async fn test_filtered_prompt() {
    let frames = vec![record(update(
        json!({ "text": "Sorry", "contentOrigin": "Apology" }),
    ))];
    let hub = spawn_hub(frames, Finish::Hang).await;

    let messages = client(&hub.url).ask_stream(ask("hi")).collect_all().await;

    assert_eq!(messages.len(), 1);
    assert!(matches!(messages[0], Message::Error(Error::MessageFiltered)));
}

#[tokio::test]
async fn test_connection_closed_mid_stream() {
    let frames = vec![record(update(json!({ "text": "Hi" })))];
    let hub = spawn_hub(frames, Finish::Close).await;

    let messages = client(&hub.url).ask_stream(ask("hi")).collect_all().await;

    assert_eq!(messages.len(), 2);
    match &messages[1] {
        Message::Error(err) => assert!(err.is_transport_error()),
        other => panic!("expected transport error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_cancel_mid_stream_is_silent() {
    let frames = vec![record(update(json!({ "text": "Hi" })))];
    let hub = spawn_hub(frames, Finish::Hang).await;

    let cancel = CancellationToken::new();
    let mut stream = client(&hub.url).ask_stream(ask("hi").with_cancel(cancel.clone()));

    assert!(matches!(stream.next().await, Some(Message::Text(_))));
    cancel.cancel();

    let rest = tokio::time::timeout(Duration::from_secs(5), stream.collect_all())
        .await
        .expect("stream ends promptly");
    assert!(rest.is_empty());
}

#[tokio::test]
async fn test_rejected_upgrade() {
    let listener = TcpListener::bind(SocketAddr::from((Ipv4Addr::LOCALHOST, 0)))
        .await
        .expect("bind");
    let port = listener.local_addr().expect("addr").port();

    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.expect("accept");
        let mut buf = [0u8; 1024];
        let _ = tokio::io::AsyncReadExt::read(&mut stream, &mut buf).await;
        let _ = stream
            .write_all(b"HTTP/1.1 403 Forbidden\r\nContent-Length: 0\r\n\r\n")
            .await;
    });

    let messages = client(&format!("ws://127.0.0.1:{port}"))
        .ask_stream(ask("hi"))
        .collect_all()
        .await;

    assert_eq!(messages.len(), 1);
    assert!(matches!(
        messages[0],
        Message::Error(Error::UpgradeRejected { status: 403 })
    ));
}

#[tokio::test]
async fn test_raw_stream_ends_after_completion() {
    let frames = vec![
        record(update(json!({ "text": "Hi" }))),
        record(completion(json!([]))),
    ];
    let hub = spawn_hub(frames, Finish::Hang).await;

    let events: Vec<_> = client(&hub.url).ask_stream_raw(ask("hi")).collect().await;

    assert_eq!(events.len(), 2);
    assert!(events[1].as_ref().is_ok_and(|event| event.is_completion()));
}

#[tokio::test]
async fn test_dropped_stream_releases_connection() {
    let frames = vec![record(update(json!({ "text": "Hi" })))];
    let hub = spawn_hub(frames, Finish::Watch).await;

    let client = Client::builder()
        .wss_url(&hub.url)
        .read_timeout(Duration::from_secs(60))
        .build()
        .expect("client");
    let mut stream = client.ask_stream(ask("hi"));

    assert!(matches!(stream.next().await, Some(Message::Text(_))));
    drop(stream);

    tokio::time::timeout(Duration::from_secs(5), hub.released)
        .await
        .expect("connection released before the read timeout")
        .expect("hub finished");
}

#[tokio::test]
async fn test_cancel_during_handshake_sends_no_request() {
    init_tracing();
    let listener = TcpListener::bind(SocketAddr::from((Ipv4Addr::LOCALHOST, 0)))
        .await
        .expect("bind");
    let port = listener.local_addr().expect("addr").port();
    let (protocol_tx, protocol_rx) = oneshot::channel();

    let hub = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.expect("accept");
        let mut ws = tokio_tungstenite::accept_async(stream).await.expect("upgrade");

        next_text(&mut ws).await;
        let _ = protocol_tx.send(());
        tokio::time::sleep(Duration::from_millis(200)).await;
        let _ = ws.send(WsMessage::Text("{}\u{1e}".to_string().into())).await;

        let mut received = Vec::new();
        while let Ok(Some(Ok(message))) =
            tokio::time::timeout(Duration::from_secs(5), ws.next()).await
        {
            match message {
                WsMessage::Text(text) => received.push(text.as_str().to_owned()),
                WsMessage::Close(_) => break,
                _ => {}
            }
        }
        received
    });

    let cancel = CancellationToken::new();
    let stream = client(&format!("ws://127.0.0.1:{port}"))
        .ask_stream(ask("hi").with_cancel(cancel.clone()));

    protocol_rx.await.expect("protocol frame");
    cancel.cancel();

    let messages = tokio::time::timeout(Duration::from_secs(5), stream.collect_all())
        .await
        .expect("stream ends promptly");
    assert!(messages.is_empty());

    let received = hub.await.expect("hub");
    assert!(received.is_empty(), "client sent {received:?} after cancel");
}
