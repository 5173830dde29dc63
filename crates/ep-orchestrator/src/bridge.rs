//! JSON-lines bridge
//!
//! Serves a [`CallHandler`] over any byte stream: one [`CallEnvelope`] per
//! input line, one [`ReplyEnvelope`] per request. Requests run concurrently,
//! so replies can come back out of order; hosts that overlap calls should set
//! `id` on each request.
//!
//! The bridge stops once input is exhausted and every in-flight request has
//! been answered, or as soon as the shutdown token fires.

use std::sync::Arc;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use ep_core::call::{CallEnvelope, ReplyEnvelope};

use crate::facade::CallHandler;

/// Counters for one bridge run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BridgeStats {
    /// Non-empty lines read
    pub requests: usize,
    /// Lines that did not parse as a request
    pub invalid: usize,
    /// Replies written
    pub replies: usize,
}

/// Line-oriented server for a call handler
pub struct LineBridge<H> {
    handler: Arc<H>,
    shutdown: Option<CancellationToken>,
}

impl<H: CallHandler + 'static> LineBridge<H> {
    pub fn new(handler: Arc<H>) -> Self {
        Self {
            handler,
            shutdown: None,
        }
    }

    /// Stop serving when this token is cancelled
    pub fn with_shutdown_token(mut self, token: CancellationToken) -> Self {
        self.shutdown = Some(token);
        self
    }

    /// Serve requests from `reader`, writing replies to `writer`
    pub async fn serve<R, W>(&self, reader: R, mut writer: W) -> Result<BridgeStats>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        // `next_line` keeps partial input across cancelled polls
        let mut lines = BufReader::new(reader).lines();
        let (reply_tx, mut reply_rx) = mpsc::unbounded_channel::<ReplyEnvelope>();

        let mut stats = BridgeStats::default();
        let mut in_flight = 0usize;
        let mut input_open = true;

        while input_open || in_flight > 0 {
            tokio::select! {
                _ = Self::cancelled(self.shutdown.as_ref()) => {
                    tracing::info!(in_flight, "Bridge shutting down");
                    break;
                }

                result = lines.next_line(), if input_open => {
                    let Some(line) = result? else {
                        tracing::debug!("Bridge input closed");
                        input_open = false;
                        continue;
                    };

                    let trimmed = line.trim();
                    if !trimmed.is_empty() {
                        stats.requests += 1;
                        match serde_json::from_str::<CallEnvelope>(trimmed) {
                            Ok(envelope) => {
                                in_flight += 1;
                                let handler = Arc::clone(&self.handler);
                                let reply_tx = reply_tx.clone();
                                tokio::spawn(async move {
                                    let response = handler.dispatch(envelope.request).await;
                                    // Receiver only goes away on shutdown
                                    let _ = reply_tx.send(ReplyEnvelope::new(envelope.id, response));
                                });
                            }
                            Err(e) => {
                                tracing::warn!("Invalid bridge request: {}", e);
                                stats.invalid += 1;
                                let reply = ReplyEnvelope::invalid_request(format!("Invalid request: {}", e));
                                Self::write_reply(&mut writer, &reply).await?;
                                stats.replies += 1;
                            }
                        }
                    }
                }

                Some(reply) = reply_rx.recv() => {
                    in_flight -= 1;
                    Self::write_reply(&mut writer, &reply).await?;
                    stats.replies += 1;
                }
            }
        }

        writer.flush().await?;
        Ok(stats)
    }

    async fn cancelled(token: Option<&CancellationToken>) {
        match token {
            Some(token) => token.cancelled().await,
            None => std::future::pending().await,
        }
    }

    async fn write_reply<W: AsyncWrite + Unpin>(writer: &mut W, reply: &ReplyEnvelope) -> Result<()> {
        let mut json = reply.to_json_line();
        json.push('\n');
        writer.write_all(json.as_bytes()).await?;
        writer.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ep_core::call::{CallRequest, CallResponse, CallResult};
    use std::time::Duration;

    /// Answers status calls; delays scans so replies overtake them
    struct StubHandler;

    #[async_trait]
    impl CallHandler for StubHandler {
        async fn dispatch(&self, request: CallRequest) -> CallResponse {
            match request {
                CallRequest::ScanNetworks => {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    CallResponse::Ok {
                        result: CallResult::Networks { networks: vec![] },
                    }
                }
                _ => CallResponse::Ok {
                    result: CallResult::ConnectionStatus {
                        device_connected: false,
                    },
                },
            }
        }
    }

    fn replies(output: &[u8]) -> Vec<serde_json::Value> {
        String::from_utf8_lossy(output)
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_one_reply_per_request() {
        let input = b"{\"op\":\"get_connection_status\"}\n\n{\"op\":\"get_connection_status\"}\n";
        let mut output = Vec::new();

        let stats = LineBridge::new(Arc::new(StubHandler))
            .serve(&input[..], &mut output)
            .await
            .unwrap();

        assert_eq!(stats.requests, 2);
        assert_eq!(stats.replies, 2);
        assert_eq!(replies(&output).len(), 2);
    }

    #[tokio::test]
    async fn test_invalid_line_gets_error_reply() {
        let input = b"not json\n{\"op\":\"no_such_op\"}\n";
        let mut output = Vec::new();

        let stats = LineBridge::new(Arc::new(StubHandler))
            .serve(&input[..], &mut output)
            .await
            .unwrap();

        assert_eq!(stats.invalid, 2);
        for reply in replies(&output) {
            assert_eq!(reply["status"], "error");
            assert_eq!(reply["error"]["kind"], "invalid_request");
        }
    }

    #[tokio::test]
    async fn test_overlapping_calls_keep_their_ids() {
        let input = b"{\"id\":1,\"op\":\"scan_networks\"}\n{\"id\":2,\"op\":\"get_connection_status\"}\n";
        let mut output = Vec::new();

        LineBridge::new(Arc::new(StubHandler))
            .serve(&input[..], &mut output)
            .await
            .unwrap();

        let replies = replies(&output);
        assert_eq!(replies.len(), 2);
        // Status call overtakes the slow scan
        assert_eq!(replies[0]["id"], 2);
        assert_eq!(replies[1]["id"], 1);
        assert_eq!(replies[1]["result"]["type"], "networks");
    }

    #[tokio::test]
    async fn test_line_split_across_reply_is_not_lost() {
        let (mut host, bridge_io) = tokio::io::duplex(1024);
        let (reader, writer) = tokio::io::split(bridge_io);

        let bridge = tokio::spawn(async move {
            let mut output = Vec::new();
            let stats = LineBridge::new(Arc::new(StubHandler))
                .serve(reader, &mut output)
                .await
                .unwrap();
            drop(writer);
            (stats, output)
        });

        host.write_all(b"{\"id\":1,\"op\":\"scan_networks\"}\n{\"id\":2,\"op\":\"get_conn")
            .await
            .unwrap();
        // Scan reply is written while the second line is half-read
        tokio::time::sleep(Duration::from_millis(100)).await;
        host.write_all(b"ection_status\"}\n").await.unwrap();
        host.shutdown().await.unwrap();

        let (stats, output) = bridge.await.unwrap();
        assert_eq!(stats.invalid, 0);
        assert_eq!(stats.replies, 2);

        let replies = replies(&output);
        assert_eq!(replies[0]["id"], 1);
        assert_eq!(replies[1]["id"], 2);
        assert_eq!(replies[1]["result"]["type"], "connection_status");
    }

    #[tokio::test]
    async fn test_shutdown_token_stops_bridge() {
        let token = CancellationToken::new();
        token.cancel();

        // Reader that never yields
        let (reader, _keep_open) = tokio::io::duplex(64);
        let mut output = Vec::new();

        let stats = LineBridge::new(Arc::new(StubHandler))
            .with_shutdown_token(token)
            .serve(reader, &mut output)
            .await
            .unwrap();

        assert_eq!(stats, BridgeStats::default());
    }
}
