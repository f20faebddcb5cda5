//! Request handler serving the log service

use std::sync::Arc;

use async_trait::async_trait;
use kafkette_log::{Error, LogService};
use tracing::warn;

use crate::node::Handler;
use crate::protocol::{ErrorCode, Request, Response};

/// Dispatches client requests to a [`LogService`]
pub struct LogHandler {
    service: Arc<LogService>,
}

impl LogHandler {
    pub fn new(service: Arc<LogService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl Handler for LogHandler {
    async fn handle(&self, request: Request) -> Response {
        let result = match request {
            Request::Send { key, msg } => self
                .service
                .send(&key, msg)
                .await
                .map(|offset| Response::SendOk { offset }),
            Request::Poll { offsets } => self
                .service
                .poll(&offsets)
                .await
                .map(|msgs| Response::PollOk { msgs }),
            Request::CommitOffsets { offsets } => self
                .service
                .commit_offsets(&offsets)
                .await
                .map(|()| Response::CommitOffsetsOk),
            Request::ListCommittedOffsets { keys } => self
                .service
                .list_committed_offsets(&keys)
                .await
                .map(|offsets| Response::ListCommittedOffsetsOk { offsets }),
        };

        result.unwrap_or_else(|e| {
            warn!(error = %e, "request failed");
            Response::error(error_code(&e), e.to_string())
        })
    }
}

/// Protocol error code reported for a log error
pub fn error_code(error: &Error) -> ErrorCode {
    match error {
        Error::AppendConflict { .. } => ErrorCode::TXN_CONFLICT,
        Error::OffsetRegression { .. } => ErrorCode::PRECONDITION_FAILED,
        Error::Timeout(_) => ErrorCode::TIMEOUT,
        Error::Unavailable(_) | Error::Closed(_) => ErrorCode::TEMPORARILY_UNAVAILABLE,
        Error::CorruptLog { .. } | Error::Codec(_) => ErrorCode::CRASH,
    }
}
