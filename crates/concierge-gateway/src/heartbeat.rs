use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

use crate::protocol::OutboundFrame;
use crate::session::SequenceCell;

/// Periodic keep-alive. Sends `op 1` carrying the last-seen sequence number
/// through the connection's outbound queue, first one period after start.
///
/// The task stops when the handle is dropped or the queue closes.
pub struct Heartbeat {
    handle: JoinHandle<()>,
}

impl Heartbeat {
    pub fn spawn(
        interval: Duration,
        sequence: SequenceCell,
        outbound: mpsc::Sender<Message>,
    ) -> Self {
        let handle = tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                let seq = sequence.current();
                let json = match OutboundFrame::Heartbeat(seq).encode() {
                    Ok(json) => json,
                    Err(e) => {
                        warn!(error = %e, "Failed to encode heartbeat");
                        continue;
                    }
                };
                if outbound.send(Message::Text(json.into())).await.is_err() {
                    debug!("Outbound queue closed, stopping heartbeat");
                    break;
                }
                debug!(seq = ?seq, "Heartbeat sent");
            }
        });
        Self { handle }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for Heartbeat {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
