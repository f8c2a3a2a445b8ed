// SPDX-License-Identifier: MIT

//! Polls a local drop directory instead of a message queue (§4.I "Offline
//! source", §4.K). Each file dropped under the root is turned into a
//! synthetic send-command message with a freshly minted command id, then
//! moved aside so it isn't picked up twice.

use crate::{FailKind, Message, MessageTransport, TransportError};
use async_trait::async_trait;
use std::fs;
use std::path::{Path, PathBuf};

pub const OFFLINE_SEND_TOPIC: &str = "aws.ssm.sendCommand.offline";

const SUBMITTED_DIR: &str = "submitted";
const INVALID_DIR: &str = "invalid";

pub struct OfflineSource {
    root: PathBuf,
}

impl OfflineSource {
    /// `root` is the `LocalCommandRoot` directory (§6). `submitted/` and
    /// `invalid/` subdirectories are created under it on construction.
    pub fn new(root: impl Into<PathBuf>) -> std::io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(root.join(SUBMITTED_DIR))?;
        fs::create_dir_all(root.join(INVALID_DIR))?;
        Ok(Self { root })
    }

    fn scan(&self) -> Vec<Message> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(source) => {
                tracing::warn!(root = %self.root.display(), error = %source, "offline source scan failed");
                return Vec::new();
            }
        };

        let mut messages = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            match fs::read_to_string(&path) {
                Ok(payload) if !payload.trim().is_empty() => {
                    let command_id = format!("offline-{}", nanoid::nanoid!(10));
                    self.relocate(&path, SUBMITTED_DIR);
                    messages.push(Message { message_id: command_id, topic: OFFLINE_SEND_TOPIC.to_string(), payload });
                }
                _ => {
                    tracing::warn!(path = %path.display(), "offline drop file unreadable or empty, quarantining");
                    self.relocate(&path, INVALID_DIR);
                }
            }
        }
        messages
    }

    fn relocate(&self, path: &Path, subdir: &str) {
        let Some(name) = path.file_name() else { return };
        let dest = self.root.join(subdir).join(name);
        if let Err(source) = fs::rename(path, &dest) {
            tracing::warn!(from = %path.display(), to = %dest.display(), error = %source, "failed to relocate offline drop file");
        }
    }
}

#[async_trait]
impl MessageTransport for OfflineSource {
    async fn get_messages(&self) -> Result<Vec<Message>, TransportError> {
        Ok(self.scan())
    }

    async fn acknowledge_message(&self, _message_id: &str) -> Result<(), TransportError> {
        Ok(())
    }

    async fn send_reply(&self, _message_id: &str, _reply_json: &str) -> Result<(), TransportError> {
        Ok(())
    }

    async fn fail_message(&self, _message_id: &str, _kind: FailKind) -> Result<(), TransportError> {
        Ok(())
    }

    async fn delete_message(&self, _message_id: &str) -> Result<(), TransportError> {
        Ok(())
    }

    async fn stop(&self) {}
}

#[cfg(test)]
#[path = "offline_tests.rs"]
mod tests;
