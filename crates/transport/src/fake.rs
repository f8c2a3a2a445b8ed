// SPDX-License-Identifier: MIT

use crate::{FailKind, Message, MessageTransport, TransportError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeCall {
    Acknowledge(String),
    SendReply(String, String),
    Fail(String, FailKind),
    Delete(String),
    Stop,
}

struct FakeState {
    queued: VecDeque<Message>,
    calls: Vec<FakeCall>,
}

/// An in-memory transport for tests: messages are pushed onto a queue ahead
/// of time and every acknowledgement/reply/fail/delete is recorded for
/// assertion, mirroring `dproc-registry::fake::FakePlugin`.
#[derive(Clone)]
pub struct FakeTransport {
    state: Arc<Mutex<FakeState>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self { state: Arc::new(Mutex::new(FakeState { queued: VecDeque::new(), calls: Vec::new() })) }
    }

    pub fn push(&self, message: Message) {
        self.state.lock().queued.push_back(message);
    }

    pub fn calls(&self) -> Vec<FakeCall> {
        self.state.lock().calls.clone()
    }
}

impl Default for FakeTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageTransport for FakeTransport {
    async fn get_messages(&self) -> Result<Vec<Message>, TransportError> {
        let mut state = self.state.lock();
        Ok(state.queued.drain(..).collect())
    }

    async fn acknowledge_message(&self, message_id: &str) -> Result<(), TransportError> {
        self.state.lock().calls.push(FakeCall::Acknowledge(message_id.to_string()));
        Ok(())
    }

    async fn send_reply(&self, message_id: &str, reply_json: &str) -> Result<(), TransportError> {
        self.state.lock().calls.push(FakeCall::SendReply(message_id.to_string(), reply_json.to_string()));
        Ok(())
    }

    async fn fail_message(&self, message_id: &str, kind: FailKind) -> Result<(), TransportError> {
        self.state.lock().calls.push(FakeCall::Fail(message_id.to_string(), kind));
        Ok(())
    }

    async fn delete_message(&self, message_id: &str) -> Result<(), TransportError> {
        self.state.lock().calls.push(FakeCall::Delete(message_id.to_string()));
        Ok(())
    }

    async fn stop(&self) {
        self.state.lock().calls.push(FakeCall::Stop);
    }
}
