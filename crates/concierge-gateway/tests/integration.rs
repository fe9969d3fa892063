//! End-to-end tests for concierge-gateway.
//!
//! Each test runs in-process fakes of the three peers:
//! 1. a gateway WebSocket that scripts Hello / READY / MESSAGE_CREATE,
//! 2. the Discord REST API, recording sends and thread edits,
//! 3. the downstream decision handler.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{any, get, patch, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};

use concierge_gateway::{
    ConnectionProperties, DiscordRest, GatewayConfig, GatewayConnection, GatewayError,
    HttpTriageHandler, IdentifyPayload, TriageProcessor,
};

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

const TOKEN: &str = "test-token";
const BOT_ID: &str = "99";

async fn serve(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("127.0.0.1:{}", addr.port())
}

async fn wait_until<F: Fn() -> bool>(what: &str, check: F) {
    for _ in 0..500 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {what}");
}

fn message(id: &str, channel_id: &str, content: &str, author_id: &str, bot: bool) -> Value {
    json!({
        "id": id,
        "type": 0,
        "content": content,
        "timestamp": "2025-01-01T00:00:00.000000+00:00",
        "channel_id": channel_id,
        "author": {"id": author_id, "username": format!("user{author_id}"), "bot": bot},
        "attachments": [],
        "mentions": [],
    })
}

// ---------------------------------------------------------------------------
// Fake REST API
// ---------------------------------------------------------------------------

#[derive(Default)]
struct RestLog {
    sent: Vec<(String, Value)>,
    patched: Vec<(String, Value)>,
    auth_headers: Vec<String>,
}

type SharedLog = Arc<Mutex<RestLog>>;

fn record_auth(log: &SharedLog, headers: &HeaderMap) {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    log.lock().unwrap().auth_headers.push(auth);
}

async fn history(
    State(log): State<SharedLog>,
    headers: HeaderMap,
    Path(channel_id): Path<String>,
) -> Json<Value> {
    record_auth(&log, &headers);
    // newest first
    Json(json!([
        message("m3", &channel_id, "still broken after restart", "u1", false),
        message("m2", &channel_id, "try restarting", BOT_ID, true),
        message("m1", &channel_id, "deploy fails with an error", "u1", false),
    ]))
}

async fn fetch_message() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({"message": "Unknown Message", "code": 10008})),
    )
}

async fn create_message(
    State(log): State<SharedLog>,
    headers: HeaderMap,
    Path(channel_id): Path<String>,
    Json(body): Json<Value>,
) -> Json<Value> {
    record_auth(&log, &headers);
    let mut log = log.lock().unwrap();
    log.sent.push((channel_id.clone(), body));
    Json(json!({"id": format!("sent-{}", log.sent.len()), "channel_id": channel_id}))
}

async fn modify_channel(
    State(log): State<SharedLog>,
    headers: HeaderMap,
    Path(channel_id): Path<String>,
    Json(body): Json<Value>,
) -> Json<Value> {
    record_auth(&log, &headers);
    log.lock().unwrap().patched.push((channel_id.clone(), body));
    Json(json!({"id": channel_id}))
}

async fn start_fake_rest() -> (String, SharedLog) {
    let log = SharedLog::default();
    let app = Router::new()
        .route(
            "/api/v10/channels/{channel_id}/messages",
            get(history).post(create_message),
        )
        .route(
            "/api/v10/channels/{channel_id}/messages/{message_id}",
            get(fetch_message),
        )
        .route("/api/v10/channels/{channel_id}", patch(modify_channel))
        .with_state(log.clone());
    let addr = serve(app).await;
    (format!("http://{addr}/api/v10"), log)
}

// ---------------------------------------------------------------------------
// Fake decision handler
// ---------------------------------------------------------------------------

type SharedRequests = Arc<Mutex<Vec<Value>>>;

async fn start_fake_handler(reply: Value) -> (String, SharedRequests) {
    let requests = SharedRequests::default();
    let recorded = requests.clone();
    let app = Router::new().route(
        "/decide",
        post(move |Json(body): Json<Value>| {
            let recorded = recorded.clone();
            let reply = reply.clone();
            async move {
                recorded.lock().unwrap().push(body);
                Json(reply)
            }
        }),
    );
    let addr = serve(app).await;
    (format!("http://{addr}/decide"), requests)
}

// ---------------------------------------------------------------------------
// Fake gateway
// ---------------------------------------------------------------------------

#[derive(Clone)]
struct GatewayScript {
    frames_from_client: mpsc::UnboundedSender<Value>,
    close_after_hello: bool,
}

async fn send_json(socket: &mut WebSocket, value: Value) {
    socket
        .send(Message::Text(value.to_string().into()))
        .await
        .unwrap();
}

async fn run_fake_gateway(mut socket: WebSocket, script: GatewayScript) {
    send_json(
        &mut socket,
        json!({"op": 10, "d": {"heartbeat_interval": 50}, "s": null, "t": null}),
    )
    .await;

    if script.close_after_hello {
        let _ = socket.send(Message::Close(None)).await;
        return;
    }

    while let Some(Ok(msg)) = socket.recv().await {
        let Message::Text(text) = msg else {
            continue;
        };
        let frame: Value = serde_json::from_str(text.as_str()).unwrap();
        let _ = script.frames_from_client.send(frame.clone());

        if frame["op"] == 2 {
            send_json(
                &mut socket,
                json!({"op": 0, "s": 1, "t": "READY", "d": {
                    "v": 10,
                    "session_id": "fake-session",
                    "user": {"id": BOT_ID, "username": "concierge", "bot": true}
                }}),
            )
            .await;

            send_json(
                &mut socket,
                json!({"op": 0, "s": 2, "t": "THREAD_CREATE", "d": {
                    "id": "t1", "name": "Deploy help", "guild_id": "g1"
                }}),
            )
            .await;

            let mut from_bot = message("m0", "t1", "help is on the way", BOT_ID, true);
            from_bot["guild_id"] = json!("g1");
            from_bot["channel_type"] = json!(11);
            send_json(
                &mut socket,
                json!({"op": 0, "s": 3, "t": "MESSAGE_CREATE", "d": from_bot}),
            )
            .await;

            let mut trigger = message("m3", "t1", "still broken after restart", "u1", false);
            trigger["guild_id"] = json!("g1");
            trigger["channel_type"] = json!(11);
            send_json(
                &mut socket,
                json!({"op": 0, "s": 4, "t": "MESSAGE_CREATE", "d": trigger}),
            )
            .await;
        } else if frame["op"] == 1 {
            send_json(&mut socket, json!({"op": 11})).await;
        }
    }
}

async fn start_fake_gateway(close_after_hello: bool) -> (String, mpsc::UnboundedReceiver<Value>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let script = GatewayScript {
        frames_from_client: tx,
        close_after_hello,
    };
    let app = Router::new()
        .route(
            "/",
            any(
                |State(script): State<GatewayScript>, ws: WebSocketUpgrade| async move {
                    ws.on_upgrade(move |socket| run_fake_gateway(socket, script))
                },
            ),
        )
        .with_state(script);
    let addr = serve(app).await;
    (format!("ws://{addr}/?v=10&encoding=json"), rx)
}

fn gateway_config(url: String) -> GatewayConfig {
    GatewayConfig {
        url,
        identify: IdentifyPayload {
            token: TOKEN.to_string(),
            intents: 33281,
            properties: ConnectionProperties {
                os: "linux".to_string(),
                browser: "concierge".to_string(),
                device: "concierge".to_string(),
            },
        },
    }
}

// ---------------------------------------------------------------------------
// Test 1: full session, thread help request answered in three chunks
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_thread_help_request_end_to_end() {
    let (api_base, rest_log) = start_fake_rest().await;
    let (handler_url, handler_requests) = start_fake_handler(json!({
        "message": "x".repeat(4500),
        "metadata": {"messageId": "m3", "shouldCloseThread": true}
    }))
    .await;
    let (gateway_url, mut client_frames) = start_fake_gateway(false).await;

    let api = Arc::new(DiscordRest::new(TOKEN).with_api_base(api_base));
    let handler = Arc::new(HttpTriageHandler::new(handler_url));
    let processor = Arc::new(TriageProcessor::new(handler, api));
    let (dispatch_tx, dispatch_rx) = mpsc::channel(16);
    let dispatch = processor.spawn_dispatch_loop(dispatch_rx);

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let connection = GatewayConnection::new(gateway_config(gateway_url), dispatch_tx);
    let run = tokio::spawn(connection.run(async {
        let _ = shutdown_rx.await;
    }));

    // Identify is the first thing the client sends.
    let identify = client_frames.recv().await.unwrap();
    assert_eq!(identify["op"], 2);
    assert_eq!(identify["d"]["token"], TOKEN);
    assert_eq!(identify["d"]["intents"], 33281);

    // Heartbeats carry the latest sequence number once dispatches arrive.
    tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(frame) = client_frames.recv().await {
            if frame["op"] == 1 && frame["d"] == 4 {
                break;
            }
        }
    })
    .await
    .expect("heartbeat with sequence 4");

    wait_until("three sends and one archive", || {
        let log = rest_log.lock().unwrap();
        log.sent.len() == 3 && log.patched.len() == 1
    })
    .await;

    {
        let log = rest_log.lock().unwrap();
        assert!(log.sent.iter().all(|(channel, _)| channel == "t1"));
        let lengths: Vec<usize> = log
            .sent
            .iter()
            .map(|(_, body)| body["content"].as_str().unwrap().chars().count())
            .collect();
        assert_eq!(lengths, vec![2000, 2000, 500]);
        assert_eq!(log.sent[0].1["message_reference"]["message_id"], "m3");
        assert!(log.sent[1].1.get("message_reference").is_none());
        assert!(log.sent[2].1.get("message_reference").is_none());

        assert_eq!(log.patched[0].0, "t1");
        assert_eq!(log.patched[0].1, json!({"archived": true, "locked": false}));
        assert!(log.auth_headers.iter().all(|h| h == "Bot test-token"));
    }

    // Only the human message reached the handler, with the thread in order.
    let requests = handler_requests.lock().unwrap().clone();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request["isThread"], true);
    assert_eq!(request["channelId"], "t1");
    assert_eq!(request["guildId"], "g1");
    let ids: Vec<&str> = request["messages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["m1", "m2", "m3"]);
    assert_eq!(request["messages"][1]["isBot"], true);

    shutdown_tx.send(()).unwrap();
    let result = tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .expect("connection stops on shutdown")
        .unwrap();
    assert!(result.is_ok());

    // The connection owned the only dispatch sender.
    tokio::time::timeout(Duration::from_secs(5), dispatch)
        .await
        .expect("dispatch loop ends")
        .unwrap();
}

// ---------------------------------------------------------------------------
// Test 2: server-side close ends the session with an error
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_server_close_is_transport_closed() {
    let (gateway_url, _client_frames) = start_fake_gateway(true).await;
    let (dispatch_tx, _dispatch_rx) = mpsc::channel(1);
    let connection = GatewayConnection::new(gateway_config(gateway_url), dispatch_tx);

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        connection.run(std::future::pending()),
    )
    .await
    .expect("connection ends when the server closes");

    assert!(matches!(result, Err(GatewayError::TransportClosed(_))));
}

// ---------------------------------------------------------------------------
// Test 3: a stalled processor does not block the reader or shutdown
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_full_dispatch_queue_does_not_block_shutdown() {
    let (gateway_url, mut client_frames) = start_fake_gateway(false).await;
    let (dispatch_tx, mut dispatch_rx) = mpsc::channel(1);

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let connection = GatewayConnection::new(gateway_config(gateway_url), dispatch_tx);
    let run = tokio::spawn(connection.run(async {
        let _ = shutdown_rx.await;
    }));

    // Sequence 4 is the second MESSAGE_CREATE; the queue holds only the first.
    tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(frame) = client_frames.recv().await {
            if frame["op"] == 1 && frame["d"] == 4 {
                break;
            }
        }
    })
    .await
    .expect("heartbeat with sequence 4");

    shutdown_tx.send(()).unwrap();
    let result = tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .expect("shutdown is observed while the queue is full")
        .unwrap();
    assert!(result.is_ok());

    assert_eq!(dispatch_rx.recv().await.unwrap().event.id, "m0");
    assert!(dispatch_rx.recv().await.is_none());
}

// ---------------------------------------------------------------------------
// Test 4: handler failure posts the apology through the real REST client
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_handler_failure_apologizes_over_rest() {
    let (api_base, rest_log) = start_fake_rest().await;
    let app = Router::new().route(
        "/decide",
        post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "model unavailable") }),
    );
    let handler_url = format!("http://{}/decide", serve(app).await);

    let api = Arc::new(DiscordRest::new(TOKEN).with_api_base(api_base));
    let processor = TriageProcessor::new(Arc::new(HttpTriageHandler::new(handler_url)), api);

    let request = serde_json::from_value(json!({
        "messages": [{
            "id": "m1",
            "content": "help",
            "timestamp": "2025-01-01T00:00:00Z",
            "isBot": false,
            "author": {"id": "u1", "username": "alice"}
        }],
        "channelId": "c1",
        "guildId": "g1",
        "isThread": false
    }))
    .unwrap();

    let result = processor.process(&request).await;
    assert!(matches!(result, Err(GatewayError::Handler(_))));

    let log = rest_log.lock().unwrap();
    assert_eq!(log.sent.len(), 1);
    assert_eq!(log.sent[0].0, "c1");
    assert_eq!(
        log.sent[0].1["content"],
        concierge_gateway::APOLOGY_MESSAGE
    );
    assert!(log.patched.is_empty());
}
