//! KvStore backed by a KV service reached through node RPCs.

use async_trait::async_trait;
use kafkette_log::{CasOutcome, Error, KvStore, Result};
use serde_json::Value;
use tracing::debug;

use crate::error::NodeError;
use crate::node::Node;
use crate::protocol::{ErrorCode, KvRequest, KvResponse};

/// Client for one remote KV service such as `lin-kv` or `seq-kv`.
#[derive(Clone)]
pub struct RemoteKv {
    node: Node,
    service: String,
}

impl RemoteKv {
    pub fn new(node: Node, service: impl Into<String>) -> Self {
        Self {
            node,
            service: service.into(),
        }
    }

    async fn call(&self, request: KvRequest) -> Result<KvResponse> {
        let payload = self
            .node
            .rpc(&self.service, &request)
            .await
            .map_err(|e| self.rpc_error(e))?;

        serde_json::from_value(payload).map_err(|e| {
            Error::Unavailable(format!("{} sent an unreadable reply: {e}", self.service))
        })
    }

    fn rpc_error(&self, error: NodeError) -> Error {
        match error {
            NodeError::Timeout { .. } => Error::Timeout(self.service.clone()),
            NodeError::Shutdown => Error::Closed(self.service.clone()),
            other => Error::Unavailable(format!("{}: {other}", self.service)),
        }
    }

    fn service_error(&self, code: ErrorCode, text: String) -> Error {
        if code == ErrorCode::TIMEOUT {
            Error::Timeout(format!("{}: {text}", self.service))
        } else {
            Error::Unavailable(format!("{} error {}: {text}", self.service, code.0))
        }
    }

    fn unexpected(&self, reply: KvResponse) -> Error {
        Error::Unavailable(format!("{} sent unexpected reply {reply:?}", self.service))
    }
}

#[async_trait]
impl KvStore for RemoteKv {
    fn name(&self) -> &str {
        &self.service
    }

    async fn read(&self, key: &str) -> Result<Option<Value>> {
        let reply = self
            .call(KvRequest::Read {
                key: key.to_string(),
            })
            .await?;

        match reply {
            KvResponse::ReadOk { value } => Ok(Some(value)),
            KvResponse::Error { code, .. } if code == ErrorCode::KEY_DOES_NOT_EXIST => Ok(None),
            KvResponse::Error { code, text } => Err(self.service_error(code, text)),
            other => Err(self.unexpected(other)),
        }
    }

    async fn write(&self, key: &str, value: Value) -> Result<()> {
        let reply = self
            .call(KvRequest::Write {
                key: key.to_string(),
                value,
            })
            .await?;

        match reply {
            KvResponse::WriteOk => Ok(()),
            KvResponse::Error { code, text } => Err(self.service_error(code, text)),
            other => Err(self.unexpected(other)),
        }
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Value,
        new: Value,
        create_if_absent: bool,
    ) -> Result<CasOutcome> {
        let reply = self
            .call(KvRequest::Cas {
                key: key.to_string(),
                from: expected,
                to: new,
                create_if_not_exists: create_if_absent,
            })
            .await?;

        match reply {
            KvResponse::CasOk => Ok(CasOutcome::Swapped),
            KvResponse::Error { code, text }
                if code == ErrorCode::PRECONDITION_FAILED
                    || code == ErrorCode::KEY_DOES_NOT_EXIST =>
            {
                debug!(service = %self.service, key, %text, "cas rejected");
                Ok(CasOutcome::Conflict)
            }
            KvResponse::Error { code, text } => Err(self.service_error(code, text)),
            other => Err(self.unexpected(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn unanswered_rpc_maps_to_store_timeout() {
        let kv = RemoteKv::new(Node::new(Duration::from_millis(10)), "lin-kv");

        let err = kv.read("k").await.unwrap_err();

        assert!(matches!(err, Error::Timeout(ref service) if service == "lin-kv"));
        assert!(err.is_transient());
    }

    #[test]
    fn shutdown_is_not_retried() {
        let kv = RemoteKv::new(Node::new(Duration::from_millis(10)), "lin-kv");

        let err = kv.rpc_error(NodeError::Shutdown);

        assert!(matches!(err, Error::Closed(ref service) if service == "lin-kv"));
        assert!(!err.is_transient());
    }

    #[test]
    fn service_errors_are_transient() {
        let kv = RemoteKv::new(Node::new(Duration::from_millis(10)), "seq-kv");

        assert!(matches!(
            kv.service_error(ErrorCode::TIMEOUT, "slow".into()),
            Error::Timeout(_)
        ));
        assert!(matches!(
            kv.service_error(ErrorCode::TEMPORARILY_UNAVAILABLE, "down".into()),
            Error::Unavailable(_)
        ));
    }
}
