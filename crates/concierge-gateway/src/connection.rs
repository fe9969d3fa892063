use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use futures_util::{Sink, SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::error::GatewayError;
use crate::heartbeat::Heartbeat;
use crate::protocol::{decode_frame, IdentifyPayload};
use crate::session::{InboundMessage, Session, SessionAction};

pub const DEFAULT_GATEWAY_URL: &str = "wss://gateway.discord.gg/?v=10&encoding=json";

const OUTBOUND_QUEUE_SIZE: usize = 64;
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub url: String,
    pub identify: IdentifyPayload,
}

/// Owns one gateway socket for its whole life. There is no resume: once the
/// socket closes, `run` returns and the caller decides what to do.
pub struct GatewayConnection {
    config: GatewayConfig,
    dispatch_tx: mpsc::Sender<InboundMessage>,
}

impl GatewayConnection {
    /// `MESSAGE_CREATE` events received while ready are forwarded to
    /// `dispatch_tx`.
    pub fn new(config: GatewayConfig, dispatch_tx: mpsc::Sender<InboundMessage>) -> Self {
        Self {
            config,
            dispatch_tx,
        }
    }

    /// Connect and process frames until `shutdown` resolves (returns `Ok`)
    /// or the server ends the connection (returns `TransportClosed`).
    pub async fn run<F>(self, shutdown: F) -> Result<(), GatewayError>
    where
        F: Future<Output = ()> + Send,
    {
        let mut session = Session::new(self.config.identify.clone());
        session.begin_connect();

        info!(url = %self.config.url, "Connecting to gateway");
        let (ws_stream, _) = tokio_tungstenite::connect_async(self.config.url.as_str())
            .await
            .map_err(|e| GatewayError::Connect(e.to_string()))?;
        session.on_open();
        info!("Connected to gateway");

        let (ws_sink, mut ws_reader) = ws_stream.split();
        let (outbound_tx, outbound_rx) = mpsc::channel::<Message>(OUTBOUND_QUEUE_SIZE);
        let mut writer = spawn_writer(ws_sink, outbound_rx);
        let mut heartbeat: Option<Heartbeat> = None;
        tokio::pin!(shutdown);

        let result = loop {
            tokio::select! {
                biased;

                _ = &mut shutdown => {
                    info!("Shutdown requested, closing gateway connection");
                    let _ = outbound_tx.send(Message::Close(None)).await;
                    break Ok(());
                }

                msg = ws_reader.next() => match msg {
                    Some(Ok(Message::Text(text))) => {
                        let frame = match decode_frame(&text) {
                            Ok(frame) => frame,
                            Err(e) => {
                                warn!(error = %e, "Dropping gateway frame");
                                continue;
                            }
                        };
                        for action in session.on_frame(frame) {
                            match action {
                                SessionAction::StartHeartbeat(interval) => {
                                    heartbeat = Some(Heartbeat::spawn(
                                        interval,
                                        session.sequence().clone(),
                                        outbound_tx.clone(),
                                    ));
                                }
                                SessionAction::Send(frame) => match frame.encode() {
                                    Ok(json) => {
                                        let sent = outbound_tx.send(Message::Text(json.into())).await;
                                        if sent.is_err() {
                                            warn!(op = frame.op(), "Writer closed, frame not sent");
                                        }
                                    }
                                    Err(e) => warn!(error = %e, "Failed to encode frame"),
                                },
                                SessionAction::Dispatch(message) => {
                                    forward_dispatch(&self.dispatch_tx, *message);
                                }
                            }
                        }
                    }
                    Some(Ok(Message::Ping(payload))) => {
                        let _ = outbound_tx.send(Message::Pong(payload)).await;
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let reason = frame
                            .map(|f| format!("{} {}", u16::from(f.code), &*f.reason))
                            .unwrap_or_else(|| "no close frame".to_string());
                        break Err(GatewayError::TransportClosed(reason));
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => break Err(GatewayError::TransportClosed(e.to_string())),
                    None => break Err(GatewayError::TransportClosed("stream ended".to_string())),
                }
            }
        };

        drop(heartbeat);
        drop(outbound_tx);
        tokio::select! {
            _ = &mut writer => {}
            () = tokio::time::sleep(WRITER_DRAIN_TIMEOUT) => {
                debug!("Writer did not drain in time");
                writer.abort();
            }
        }

        let reason = match &result {
            Ok(()) => "shutdown".to_string(),
            Err(e) => e.to_string(),
        };
        session.on_close(&reason);
        result
    }
}

/// Hand a message to the processor without waiting. The reader must keep
/// draining the socket and watching for shutdown, so a full queue drops the
/// message instead of blocking.
fn forward_dispatch(
    dispatch_tx: &mpsc::Sender<InboundMessage>,
    message: InboundMessage,
) -> bool {
    match dispatch_tx.try_send(message) {
        Ok(()) => true,
        Err(TrySendError::Full(message)) => {
            warn!(
                message_id = %message.event.id,
                channel_id = %message.event.channel_id,
                "Dispatch queue full, message dropped"
            );
            false
        }
        Err(TrySendError::Closed(_)) => {
            warn!("Message receiver dropped, event discarded");
            false
        }
    }
}

/// Single owner of the socket's write half; everything else queues frames.
fn spawn_writer<S>(mut ws_sink: S, mut outbound_rx: mpsc::Receiver<Message>) -> JoinHandle<()>
where
    S: Sink<Message> + Unpin + Send + 'static,
    S::Error: Display,
{
    tokio::spawn(async move {
        while let Some(msg) = outbound_rx.recv().await {
            let closing = matches!(msg, Message::Close(_));
            if let Err(e) = ws_sink.send(msg).await {
                debug!(error = %e, "Gateway write failed");
                break;
            }
            if closing {
                break;
            }
        }
    })
}
