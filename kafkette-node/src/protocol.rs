//! Wire protocol message types
//!
//! Every line on the wire is one [`Message`]. The body carries a `type` tag,
//! an optional `msg_id`, and `in_reply_to` on replies.

use std::collections::BTreeMap;

use kafkette_log::{Offset, Polled};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single envelope exchanged with clients and services
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub src: String,
    pub dest: String,
    pub body: Body,
}

/// Message body: correlation ids plus the typed payload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Body {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg_id: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_reply_to: Option<u64>,

    /// Remaining fields, including `type`
    #[serde(flatten)]
    pub payload: Value,
}

impl Body {
    /// The `type` tag of the payload, if any
    pub fn kind(&self) -> Option<&str> {
        self.payload.get("type").and_then(Value::as_str)
    }
}

/// Numeric error codes understood by clients and the KV services
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorCode(pub u16);

impl ErrorCode {
    pub const TIMEOUT: Self = Self(0);
    pub const NOT_SUPPORTED: Self = Self(10);
    pub const TEMPORARILY_UNAVAILABLE: Self = Self(11);
    pub const MALFORMED_REQUEST: Self = Self(12);
    pub const CRASH: Self = Self(13);
    pub const KEY_DOES_NOT_EXIST: Self = Self(20);
    pub const PRECONDITION_FAILED: Self = Self(22);
    pub const TXN_CONFLICT: Self = Self(30);
}

/// Bootstrap message naming this node
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Init {
    pub node_id: String,
    #[serde(default)]
    pub node_ids: Vec<String>,
}

/// Log requests sent by clients
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Append a value to a key's log
    Send { key: String, msg: i64 },

    /// Read entries at or after per-key offsets
    Poll { offsets: BTreeMap<String, Offset> },

    /// Record consumer checkpoints
    CommitOffsets { offsets: BTreeMap<String, Offset> },

    /// Read consumer checkpoints
    ListCommittedOffsets { keys: Vec<String> },
}

impl Request {
    /// Every `type` tag this enum decodes
    pub const KINDS: [&'static str; 4] = [
        "send",
        "poll",
        "commit_offsets",
        "list_committed_offsets",
    ];
}

/// Replies sent back to clients
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    InitOk,

    SendOk { offset: Offset },

    PollOk { msgs: BTreeMap<String, Polled> },

    CommitOffsetsOk,

    ListCommittedOffsetsOk { offsets: BTreeMap<String, Offset> },

    Error { code: ErrorCode, text: String },
}

impl Response {
    /// Build an error reply
    pub fn error(code: ErrorCode, text: impl Into<String>) -> Self {
        Self::Error {
            code,
            text: text.into(),
        }
    }
}

/// Requests this node sends to the KV services
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum KvRequest {
    Read {
        key: String,
    },
    Write {
        key: String,
        value: Value,
    },
    Cas {
        key: String,
        from: Value,
        to: Value,
        create_if_not_exists: bool,
    },
}

/// Replies from the KV services
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum KvResponse {
    ReadOk { value: Value },
    WriteOk,
    CasOk,
    Error { code: ErrorCode, text: String },
}
