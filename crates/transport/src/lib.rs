// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! The boundary between the processor and whatever carries work orders in
//! (SQS/MDS in production, a drop directory offline). §4.J/§4.K.

pub mod offline;
pub mod stop_policy;

pub use offline::OfflineSource;
pub use stop_policy::StopPolicy;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// One unit of work handed to the processor by a transport: an opaque
/// payload plus the routing topic used to dispatch it (§6 "Message topic
/// routing").
#[derive(Debug, Clone)]
pub struct Message {
    pub message_id: String,
    pub topic: String,
    pub payload: String,
}

/// Why a message is being failed back to the transport (§4.I/§7).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailKind {
    /// The message couldn't be routed or parsed; not the document's fault.
    InternalHandlerException,
    /// Some other, caller-supplied reason.
    Other(String),
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport io error: {0}")]
    Io(#[source] std::io::Error),
    #[error("unknown message id {0}")]
    UnknownMessage(String),
    #[error("{0}")]
    Other(String),
}

/// The full adapter contract a transport must satisfy (§4.J). Every method
/// is a suspension point; the processor never blocks a worker thread on one.
#[async_trait]
pub trait MessageTransport: Send + Sync + 'static {
    async fn get_messages(&self) -> Result<Vec<Message>, TransportError>;
    async fn acknowledge_message(&self, message_id: &str) -> Result<(), TransportError>;
    async fn send_reply(&self, message_id: &str, reply_json: &str) -> Result<(), TransportError>;
    async fn fail_message(&self, message_id: &str, kind: FailKind) -> Result<(), TransportError>;
    async fn delete_message(&self, message_id: &str) -> Result<(), TransportError>;
    async fn stop(&self);
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake;

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeTransport;

pub type SharedTransport = Arc<dyn MessageTransport>;

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
