// SPDX-License-Identifier: MIT

//! Routes an inbound [`dproc_transport::Message`] to a document kind by its
//! topic string (spec §6, "Message topic routing").

/// The routing decision for one message's topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Send { offline: bool },
    Cancel { offline: bool },
}

/// `aws.ssm.sendCommand.*` / `aws.ssm.cancelCommand.*` and their
/// `.offline.` variants route to send/cancel; anything else is an
/// `InternalHandlerException` (§7) — the message is malformed or from a
/// future agent version this build doesn't understand.
pub fn route(topic: &str) -> Option<Route> {
    let rest = topic.strip_prefix("aws.ssm.")?;
    if let Some(rest) = rest.strip_prefix("sendCommand.") {
        return Some(Route::Send { offline: rest.starts_with("offline.") });
    }
    if let Some(rest) = rest.strip_prefix("cancelCommand.") {
        return Some(Route::Cancel { offline: rest.starts_with("offline.") });
    }
    None
}

#[cfg(test)]
#[path = "topic_tests.rs"]
mod tests;
