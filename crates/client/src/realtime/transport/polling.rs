//! HTTP long-polling transport, used when the websocket upgrade is unavailable.
//!
//! GET requests long-poll for a payload; POST requests carry outgoing
//! packets. Both use `\x1e`-separated payloads.

use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use stockmaster_shared::{decode_payload, encode_payload, EnginePacket, ProtocolError};
use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};
use url::Url;

use super::{TransportError, TransportKind, TransportLink};

/// Slack added to the heartbeat deadline so a poll outlives the server's ping cycle.
const POLL_GRACE: Duration = Duration::from_secs(5);

pub(super) async fn open(
    http: reqwest::Client,
    url: Url,
    timeout: Duration,
) -> Result<TransportLink, TransportError> {
    let body = get(&http, &url, timeout).await?;
    let mut packets = decode_payload(&body)?.into_iter();

    let handshake = match packets.next() {
        Some(EnginePacket::Open(handshake)) => handshake,
        other => {
            return Err(ProtocolError::InvalidHandshake(format!(
                "expected open packet, got {other:?}"
            ))
            .into())
        }
    };

    crate::log_debug!("Polling handshake complete (sid {})", handshake.sid);

    let mut session_url = url;
    session_url
        .query_pairs_mut()
        .append_pair("sid", &handshake.sid);

    let poll_timeout = Duration::from_millis(handshake.heartbeat_deadline_ms()) + POLL_GRACE;

    let (out_tx, mut out_rx) = unbounded_channel::<EnginePacket>();
    let (in_tx, in_rx) = unbounded_channel();

    for packet in packets {
        let _ = in_tx.send(Ok(packet));
    }

    // Spawn read task
    let reader_http = http.clone();
    let reader_url = session_url.clone();
    let reader_tx = in_tx.clone();
    let reader = tokio::spawn(async move {
        loop {
            let body = match get(&reader_http, &reader_url, poll_timeout).await {
                Ok(body) => body,
                Err(e) => {
                    let _ = reader_tx.send(Err(e));
                    return;
                }
            };
            match decode_payload(&body) {
                Ok(packets) => {
                    if !forward(&reader_tx, packets) {
                        return;
                    }
                }
                Err(e) => {
                    let _ = reader_tx.send(Err(e.into()));
                    return;
                }
            }
        }
    });

    // Spawn write task
    let writer = tokio::spawn(async move {
        while let Some(first) = out_rx.recv().await {
            let mut batch = vec![first];
            while let Ok(next) = out_rx.try_recv() {
                batch.push(next);
            }
            let closing = batch.contains(&EnginePacket::Close);

            if let Err(e) = post(&http, &session_url, encode_payload(&batch), timeout).await {
                crate::log_error!("Polling send failed: {}", e);
                let _ = in_tx.send(Err(e));
                break;
            }
            if closing {
                break;
            }
        }
    });

    Ok(TransportLink::new(
        TransportKind::Polling,
        handshake,
        out_tx,
        in_rx,
        reader,
        writer,
    ))
}

/// Forward decoded packets. Returns `false` once the link is gone or the server closed it.
fn forward(
    tx: &UnboundedSender<Result<EnginePacket, TransportError>>,
    packets: Vec<EnginePacket>,
) -> bool {
    for packet in packets {
        let closing = packet == EnginePacket::Close;
        if tx.send(Ok(packet)).is_err() || closing {
            return false;
        }
    }
    true
}

/// Append a cache-busting `t` parameter, as browsers' polling clients do.
fn with_cache_buster(url: &Url) -> Url {
    let mut url = url.clone();
    url.query_pairs_mut()
        .append_pair("t", &uuid::Uuid::new_v4().simple().to_string());
    url
}

async fn get(http: &reqwest::Client, url: &Url, timeout: Duration) -> Result<String, TransportError> {
    let resp = http
        .get(with_cache_buster(url))
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout
            } else {
                TransportError::Http(e.to_string())
            }
        })?;

    let status = resp.status();
    if !status.is_success() {
        return Err(TransportError::Http(format!("poll returned {status}")));
    }
    resp.text()
        .await
        .map_err(|e| TransportError::Http(format!("failed to read body: {e}")))
}

async fn post(
    http: &reqwest::Client,
    url: &Url,
    payload: String,
    timeout: Duration,
) -> Result<(), TransportError> {
    let resp = http
        .post(with_cache_buster(url))
        .header(CONTENT_TYPE, "text/plain;charset=UTF-8")
        .timeout(timeout)
        .body(payload)
        .send()
        .await
        .map_err(|e| TransportError::Http(e.to_string()))?;

    let status = resp.status();
    if !status.is_success() {
        return Err(TransportError::Http(format!("send returned {status}")));
    }
    Ok(())
}
