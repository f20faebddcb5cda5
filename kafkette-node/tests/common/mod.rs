//! Shared test utilities for kafkette-node integration tests
//!
//! A [`Cluster`] runs one node over an in-memory pipe. Lines the node sends
//! to `lin-kv` or `seq-kv` are answered by an in-process simulation of those
//! services; every other line is handed to the test as a client reply.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use kafkette_log::{CasOutcome, InMemoryKv, KvStore, LogConfig};
use kafkette_node::protocol::{KvRequest, KvResponse};
use kafkette_node::{Body, ErrorCode, Message, NodeConfig, StoreMode};
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, WriteHalf};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;

/// Client id used for test requests
pub const CLIENT: &str = "c1";

/// Node id assigned by [`Cluster::init`]
pub const NODE: &str = "n1";

pub struct Cluster {
    writer: Arc<Mutex<WriteHalf<DuplexStream>>>,
    replies: mpsc::UnboundedReceiver<Value>,
    next_msg_id: u64,
    pub logs: Arc<InMemoryKv>,
    pub offsets: Arc<InMemoryKv>,
    node: JoinHandle<()>,
}

impl Cluster {
    /// Start a node in `mode` with simulated KV services that always answer
    #[allow(dead_code)]
    pub async fn start(mode: StoreMode) -> Self {
        Self::start_with(mode, LogConfig::default(), HashSet::new()).await
    }

    /// Start a node whose `silent` services never answer
    pub async fn start_with(
        mode: StoreMode,
        log_config: LogConfig,
        silent: HashSet<&'static str>,
    ) -> Self {
        let node_config = NodeConfig::default().with_rpc_timeout(Duration::from_millis(50));
        let (client, server) = tokio::io::duplex(1 << 20);
        let (server_read, server_write) = tokio::io::split(server);
        let (client_read, client_write) = tokio::io::split(client);

        let node = tokio::spawn(async move {
            kafkette_node::serve(mode, &node_config, log_config, server_read, server_write)
                .await
                .unwrap();
        });

        let writer = Arc::new(Mutex::new(client_write));
        let logs = Arc::new(InMemoryKv::new("lin-kv"));
        let offsets = Arc::new(InMemoryKv::new("seq-kv"));
        let (reply_tx, replies) = mpsc::unbounded_channel();

        tokio::spawn({
            let writer = Arc::clone(&writer);
            let logs = Arc::clone(&logs);
            let offsets = Arc::clone(&offsets);
            async move {
                let mut lines = BufReader::new(client_read).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    let message: Message = serde_json::from_str(&line).unwrap();
                    let store = match message.dest.as_str() {
                        "lin-kv" => &logs,
                        "seq-kv" => &offsets,
                        _ => {
                            let _ = reply_tx.send(serde_json::to_value(&message).unwrap());
                            continue;
                        }
                    };
                    if silent.contains(message.dest.as_str()) {
                        continue;
                    }
                    let reply = answer_kv(store.as_ref(), &message).await;
                    write_line(&writer, &serde_json::to_value(&reply).unwrap()).await;
                }
            }
        });

        Self {
            writer,
            replies,
            next_msg_id: 1,
            logs,
            offsets,
            node,
        }
    }

    /// Send `init` naming the node [`NODE`]
    pub async fn init(&mut self) -> Value {
        self.request(json!({"type": "init", "node_id": NODE, "node_ids": [NODE]}))
            .await
    }

    /// Send `body` from the test client without waiting for the reply
    pub async fn send(&mut self, mut body: Value) -> u64 {
        let msg_id = self.next_msg_id;
        self.next_msg_id += 1;
        body["msg_id"] = json!(msg_id);
        let message = json!({"src": CLIENT, "dest": NODE, "body": body});
        write_line(&self.writer, &message).await;
        msg_id
    }

    /// Next envelope addressed to the client
    pub async fn next_reply(&mut self) -> Value {
        tokio::time::timeout(Duration::from_secs(5), self.replies.recv())
            .await
            .expect("no reply within 5s")
            .expect("reply channel closed")
    }

    /// Send `body` and wait for its reply body
    pub async fn request(&mut self, body: Value) -> Value {
        let msg_id = self.send(body).await;
        loop {
            let reply = self.next_reply().await;
            if reply["body"]["in_reply_to"] == msg_id {
                assert_eq!(reply["dest"], CLIENT);
                return reply["body"].clone();
            }
        }
    }

    /// Close the node's input without waiting for it to exit
    pub async fn close_input(&self) {
        self.writer.lock().await.shutdown().await.unwrap();
    }

    /// Wait for the node to exit after its input is closed
    pub async fn finished(self) {
        self.node.await.unwrap();
    }

    /// Close the node's input and wait for it to exit
    #[allow(dead_code)]
    pub async fn shutdown(self) {
        self.close_input().await;
        self.finished().await;
    }
}

async fn write_line(writer: &Mutex<WriteHalf<DuplexStream>>, value: &Value) {
    let mut line = serde_json::to_vec(value).unwrap();
    line.push(b'\n');
    let mut writer = writer.lock().await;
    writer.write_all(&line).await.unwrap();
    writer.flush().await.unwrap();
}

/// Answer one KV request the way the external services do
async fn answer_kv(store: &InMemoryKv, message: &Message) -> Message {
    let request: KvRequest = serde_json::from_value(message.body.payload.clone()).unwrap();
    let response = match request {
        KvRequest::Read { key } => match store.read(&key).await.unwrap() {
            Some(value) => KvResponse::ReadOk { value },
            None => KvResponse::Error {
                code: ErrorCode::KEY_DOES_NOT_EXIST,
                text: format!("key {key} does not exist"),
            },
        },
        KvRequest::Write { key, value } => {
            store.write(&key, value).await.unwrap();
            KvResponse::WriteOk
        }
        KvRequest::Cas {
            key,
            from,
            to,
            create_if_not_exists,
        } => match store
            .compare_and_swap(&key, from, to, create_if_not_exists)
            .await
            .unwrap()
        {
            CasOutcome::Swapped => KvResponse::CasOk,
            CasOutcome::Conflict => KvResponse::Error {
                code: ErrorCode::PRECONDITION_FAILED,
                text: "current value does not match".into(),
            },
        },
    };

    Message {
        src: message.dest.clone(),
        dest: message.src.clone(),
        body: Body {
            msg_id: None,
            in_reply_to: message.body.msg_id,
            payload: serde_json::to_value(response).unwrap(),
        },
    }
}
