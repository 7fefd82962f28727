//! WebSocket transport using tokio-tungstenite. One Engine.IO packet per text frame.

use std::time::Duration;

use futures_util::{SinkExt, Stream, StreamExt};
use stockmaster_shared::{EnginePacket, ProtocolError};
use tokio::sync::mpsc::unbounded_channel;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use url::Url;

use super::{TransportError, TransportKind, TransportLink};

type WsResult = Result<Message, tokio_tungstenite::tungstenite::Error>;

pub(super) async fn open(url: Url, timeout: Duration) -> Result<TransportLink, TransportError> {
    let (ws_stream, _response) = tokio::time::timeout(timeout, connect_async(url.as_str()))
        .await
        .map_err(|_| TransportError::Timeout)?
        .map_err(|e| TransportError::WebSocket(e.to_string()))?;

    let (mut write, mut read) = ws_stream.split();

    let handshake = tokio::time::timeout(timeout, read_handshake(&mut read))
        .await
        .map_err(|_| TransportError::Timeout)??;

    crate::log_debug!("WebSocket handshake complete (sid {})", handshake.sid);

    let (out_tx, mut out_rx) = unbounded_channel::<EnginePacket>();
    let (in_tx, in_rx) = unbounded_channel();

    // Spawn read task
    let reader = tokio::spawn(async move {
        while let Some(msg_result) = read.next().await {
            match msg_result {
                Ok(Message::Text(text)) => {
                    let packet = EnginePacket::decode(text.as_str()).map_err(TransportError::from);
                    if in_tx.send(packet).is_err() {
                        return;
                    }
                }
                Ok(Message::Close(_)) => {
                    crate::log_debug!("WebSocket received close frame");
                    break;
                }
                Ok(Message::Ping(data)) => {
                    // Pong is handled automatically by tungstenite
                    crate::log_debug!("Received ping: {:?}", data);
                }
                Ok(_) => {
                    // Ignore binary, pong, etc.
                }
                Err(e) => {
                    let _ = in_tx.send(Err(TransportError::WebSocket(e.to_string())));
                    break;
                }
            }
        }
    });

    // Spawn write task
    let writer = tokio::spawn(async move {
        while let Some(packet) = out_rx.recv().await {
            let closing = packet == EnginePacket::Close;
            if let Err(e) = write.send(Message::Text(packet.encode().into())).await {
                crate::log_error!("WebSocket send failed: {}", e);
                break;
            }
            if closing {
                let _ = write.close().await;
                break;
            }
        }
    });

    Ok(TransportLink::new(
        TransportKind::WebSocket,
        handshake,
        out_tx,
        in_rx,
        reader,
        writer,
    ))
}

/// Wait for the Engine.IO open packet, which the server sends as its first frame.
async fn read_handshake<S>(read: &mut S) -> Result<stockmaster_shared::Handshake, TransportError>
where
    S: Stream<Item = WsResult> + Unpin,
{
    loop {
        match read.next().await {
            Some(Ok(Message::Text(text))) => {
                return match EnginePacket::decode(text.as_str())? {
                    EnginePacket::Open(handshake) => Ok(handshake),
                    other => Err(ProtocolError::InvalidHandshake(format!(
                        "expected open packet, got {other:?}"
                    ))
                    .into()),
                };
            }
            Some(Ok(Message::Close(_))) | None => return Err(TransportError::Closed),
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(TransportError::WebSocket(e.to_string())),
        }
    }
}
