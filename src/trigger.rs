//! Event-notification boundary: single-slot trigger sink and its UDP feed

use serde::Deserialize;
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tracing::{debug, warn};

/// External event notification carrying the wall-clock time the sensor fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trigger {
    pub time: u64,
}

/// Wire shape of a trigger datagram
#[derive(Debug, Deserialize)]
struct TriggerMessage {
    time: u64,
}

/// Single-slot trigger channel: a newer notification overwrites a pending
/// one, so only the most recent trigger is ever observed.
pub fn channel() -> (watch::Sender<Option<Trigger>>, watch::Receiver<Option<Trigger>>) {
    watch::channel(None)
}

/// Receive trigger datagrams and forward them into the sink. Malformed
/// payloads stop here and never reach the pipeline.
pub async fn listen(socket: UdpSocket, sink: watch::Sender<Option<Trigger>>) {
    let mut buf = [0u8; 512];
    loop {
        let (len, peer) = match socket.recv_from(&mut buf).await {
            Ok(received) => received,
            Err(e) => {
                warn!("Trigger socket error: {}", e);
                continue;
            }
        };

        match serde_json::from_slice::<TriggerMessage>(&buf[..len]) {
            Ok(msg) => {
                debug!("Trigger from {}: time {}", peer, msg.time);
                if sink.send(Some(Trigger { time: msg.time })).is_err() {
                    return;
                }
            }
            Err(e) => warn!("Malformed trigger from {}: {}", peer, e),
        }
    }
}
