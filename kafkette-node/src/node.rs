//! Node runtime
//!
//! Reads one JSON envelope per line, hands requests to a [`Handler`] on
//! their own tasks, and writes replies and outbound RPCs through a single
//! writer task. Replies to our own RPCs are matched by `in_reply_to` and
//! delivered to the waiting caller.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{Mutex, RwLock, mpsc, oneshot};
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, trace, warn};

use crate::error::NodeError;
use crate::protocol::{Body, ErrorCode, Init, Message, Request, Response};

/// Serves decoded client requests
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    async fn handle(&self, request: Request) -> Response;
}

/// Cloneable handle to a running (or not yet running) node
#[derive(Clone)]
pub struct Node {
    inner: Arc<Inner>,
}

struct Inner {
    id: RwLock<String>,
    next_msg_id: AtomicU64,
    pending: Mutex<HashMap<u64, oneshot::Sender<Body>>>,
    /// Set once input ends; guarded by `pending` for writers
    closed: AtomicBool,
    outbox: mpsc::UnboundedSender<Message>,
    outbox_rx: Mutex<Option<mpsc::UnboundedReceiver<Message>>>,
    rpc_timeout: Duration,
}

impl Node {
    /// Create a node whose RPCs give up after `rpc_timeout`
    pub fn new(rpc_timeout: Duration) -> Self {
        let (outbox, outbox_rx) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(Inner {
                id: RwLock::new(String::new()),
                next_msg_id: AtomicU64::new(1),
                pending: Mutex::new(HashMap::new()),
                closed: AtomicBool::new(false),
                outbox,
                outbox_rx: Mutex::new(Some(outbox_rx)),
                rpc_timeout,
            }),
        }
    }

    /// This node's id, empty until `init` arrives
    pub async fn id(&self) -> String {
        self.inner.id.read().await.clone()
    }

    fn next_msg_id(&self) -> u64 {
        self.inner.next_msg_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Run until `reader` reaches end of input
    ///
    /// Once input ends no RPC reply can arrive, so outstanding and new RPCs
    /// fail with [`NodeError::Shutdown`]. In-flight requests are then allowed
    /// to finish and every queued line is written before this returns.
    pub async fn run<R, W, H>(
        &self,
        reader: R,
        writer: W,
        handler: Arc<H>,
    ) -> Result<(), NodeError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
        H: Handler,
    {
        let outbox_rx = self
            .inner
            .outbox_rx
            .lock()
            .await
            .take()
            .ok_or(NodeError::AlreadyRunning)?;
        let (stop_tx, stop_rx) = oneshot::channel();
        let writer_task = tokio::spawn(write_loop(writer, outbox_rx, stop_rx));

        let mut tasks = JoinSet::new();
        let mut reader = BufReader::new(reader);
        let mut line = Vec::new();
        let read_result = loop {
            line.clear();
            match reader.read_until(b'\n', &mut line).await {
                Ok(0) => break Ok(()),
                Ok(_) => {
                    self.dispatch(&line, &handler, &mut tasks).await;
                    while let Some(result) = tasks.try_join_next() {
                        reap(result);
                    }
                }
                Err(e) => break Err(NodeError::Io(e)),
            }
        };

        self.close().await;
        debug!(in_flight = tasks.len(), "input closed, draining requests");
        while let Some(result) = tasks.join_next().await {
            reap(result);
        }

        let _ = stop_tx.send(());
        writer_task.await??;
        read_result
    }

    async fn dispatch<H: Handler>(
        &self,
        line: &[u8],
        handler: &Arc<H>,
        tasks: &mut JoinSet<()>,
    ) {
        let line = line.trim_ascii();
        if line.is_empty() {
            return;
        }

        let message: Message = match serde_json::from_slice(line) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "dropping line that is not a message envelope");
                return;
            }
        };
        trace!(src = %message.src, kind = ?message.body.kind(), "received");

        if let Some(reply_to) = message.body.in_reply_to {
            self.complete_rpc(reply_to, message.body).await;
            return;
        }

        let node = self.clone();
        let handler = Arc::clone(handler);
        tasks.spawn(async move {
            let response = node.respond(&message, handler.as_ref()).await;
            node.reply(&message, response).await;
        });
    }

    async fn respond<H: Handler>(&self, message: &Message, handler: &H) -> Response {
        let payload = &message.body.payload;
        match message.body.kind() {
            Some("init") => match serde_json::from_value::<Init>(payload.clone()) {
                Ok(init) => {
                    self.init(init).await;
                    Response::InitOk
                }
                Err(e) => {
                    Response::error(ErrorCode::MALFORMED_REQUEST, format!("invalid init: {e}"))
                }
            },
            Some(kind) if Request::KINDS.contains(&kind) => {
                match serde_json::from_value::<Request>(payload.clone()) {
                    Ok(request) => handler.handle(request).await,
                    Err(e) => {
                        warn!(src = %message.src, kind, error = %e, "malformed request");
                        Response::error(
                            ErrorCode::MALFORMED_REQUEST,
                            format!("invalid {kind}: {e}"),
                        )
                    }
                }
            }
            Some(kind) => Response::error(
                ErrorCode::NOT_SUPPORTED,
                format!("unsupported message type {kind}"),
            ),
            None => Response::error(ErrorCode::MALFORMED_REQUEST, "message body has no type"),
        }
    }

    async fn init(&self, init: Init) {
        info!(node_id = %init.node_id, peers = init.node_ids.len(), "node initialized");
        *self.inner.id.write().await = init.node_id;
    }

    /// Reply to `request` with `response`
    pub async fn reply(&self, request: &Message, response: Response) {
        let payload = match serde_json::to_value(&response) {
            Ok(payload) => payload,
            Err(e) => {
                error!(error = %e, "failed to encode reply");
                return;
            }
        };

        let body = Body {
            msg_id: Some(self.next_msg_id()),
            in_reply_to: request.body.msg_id,
            payload,
        };
        self.send(request.src.clone(), body).await;
    }

    async fn send(&self, dest: String, body: Body) {
        let message = Message {
            src: self.id().await,
            dest,
            body,
        };
        if self.inner.outbox.send(message).is_err() {
            warn!("writer stopped, dropping outbound message");
        }
    }

    /// Send `payload` to `dest` and wait for the reply payload
    pub async fn rpc<T: Serialize>(&self, dest: &str, payload: &T) -> Result<Value, NodeError> {
        let msg_id = self.next_msg_id();
        let body = Body {
            msg_id: Some(msg_id),
            in_reply_to: None,
            payload: serde_json::to_value(payload)?,
        };

        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.inner.pending.lock().await;
            if self.inner.closed.load(Ordering::Acquire) {
                return Err(NodeError::Shutdown);
            }
            pending.insert(msg_id, tx);
        }
        self.send(dest.to_string(), body).await;

        match tokio::time::timeout(self.inner.rpc_timeout, rx).await {
            Ok(Ok(reply)) => Ok(reply.payload),
            Ok(Err(_)) => Err(NodeError::Shutdown),
            Err(_) => {
                self.inner.pending.lock().await.remove(&msg_id);
                Err(NodeError::Timeout {
                    dest: dest.to_string(),
                    msg_id,
                })
            }
        }
    }

    /// Fail every outstanding RPC and refuse new ones
    async fn close(&self) {
        let mut pending = self.inner.pending.lock().await;
        self.inner.closed.store(true, Ordering::Release);
        if !pending.is_empty() {
            debug!(abandoned = pending.len(), "failing rpcs that can no longer be answered");
        }
        pending.clear();
    }

    async fn complete_rpc(&self, reply_to: u64, body: Body) {
        let waiter = self.inner.pending.lock().await.remove(&reply_to);
        match waiter {
            Some(tx) => {
                if tx.send(body).is_err() {
                    debug!(reply_to, "rpc caller went away before its reply");
                }
            }
            None => debug!(reply_to, "dropping reply to unknown or expired rpc"),
        }
    }
}

fn reap(result: Result<(), JoinError>) {
    if let Err(e) = result {
        error!(error = %e, "request task failed without replying");
    }
}

async fn write_loop<W>(
    mut writer: W,
    mut outbox: mpsc::UnboundedReceiver<Message>,
    mut stop: oneshot::Receiver<()>,
) -> Result<(), NodeError>
where
    W: AsyncWrite + Unpin,
{
    loop {
        tokio::select! {
            biased;
            Some(message) = outbox.recv() => write_message(&mut writer, &message).await?,
            _ = &mut stop => break,
        }
    }

    while let Ok(message) = outbox.try_recv() {
        write_message(&mut writer, &message).await?;
    }
    writer.shutdown().await?;
    Ok(())
}

async fn write_message<W>(writer: &mut W, message: &Message) -> Result<(), NodeError>
where
    W: AsyncWrite + Unpin,
{
    let mut line = serde_json::to_vec(message)?;
    line.push(b'\n');
    writer.write_all(&line).await?;
    writer.flush().await?;
    Ok(())
}
