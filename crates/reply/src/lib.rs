// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Builds the reply payload sent back to the transport: per-step runtime
//! status with truncated output, plus the document's aggregate status.

pub mod truncate;

pub use truncate::{truncate as truncate_output, DEFAULT_OUTPUT_CAP};

use dproc_core::{Clock, Document, S3Location, Status};
use indexmap::IndexMap;
use serde::Serialize;

/// One step's contribution to a reply.
#[derive(Debug, Clone, Serialize)]
pub struct StepReply {
    pub status: Status,
    pub code: i32,
    pub output: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub s3_location: Option<S3Location>,
}

/// The payload reported back to the transport for a document.
#[derive(Debug, Clone, Serialize)]
pub struct Reply {
    pub agent_identity: String,
    pub date_time: String,
    pub run_id: String,
    pub steps: IndexMap<String, StepReply>,
    pub status: Option<Status>,
    /// Count of executed steps by terminal status, e.g. `{"Success": 2}`.
    pub runtime_status_counts: IndexMap<Status, usize>,
    /// Document-level debug text (currently only populated by cancel documents).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_trace_output: Option<String>,
}

fn iso8601_now(clock: &impl Clock) -> String {
    chrono::DateTime::from_timestamp_millis(clock.epoch_ms() as i64)
        .unwrap_or_else(|| chrono::DateTime::from_timestamp(0, 0).expect("epoch 0 is always valid"))
        .to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

fn step_reply(result: &dproc_core::PluginResult, cap: usize) -> StepReply {
    StepReply {
        status: result.status,
        code: result.code,
        output: truncate::truncate(&result.stdout, &result.stderr, cap),
        s3_location: result.s3_location.clone(),
    }
}

/// Counts executed steps by terminal status, in first-reached order.
fn runtime_status_counts(doc: &Document) -> IndexMap<Status, usize> {
    let mut counts = IndexMap::new();
    for step in &doc.steps {
        if step.has_executed {
            *counts.entry(step.result.status).or_insert(0) += 1;
        }
    }
    counts
}

fn document_trace_output(doc: &Document) -> Option<String> {
    doc.cancel_info.as_ref().and_then(|info| info.debug_info.clone())
}

/// A reply covering every step in the document.
pub fn build_full_reply(doc: &Document, agent_identity: &str, cap: usize, clock: &impl Clock) -> Reply {
    let steps = doc.steps.iter().map(|s| (s.step_id.clone(), step_reply(&s.result, cap))).collect();
    Reply {
        agent_identity: agent_identity.to_string(),
        date_time: iso8601_now(clock),
        run_id: doc.document_id.to_string(),
        steps,
        status: doc.status,
        runtime_status_counts: runtime_status_counts(doc),
        document_trace_output: document_trace_output(doc),
    }
}

/// An incremental reply covering just `step_id`. `None` if the document has
/// no such step.
pub fn build_step_reply(doc: &Document, step_id: &str, agent_identity: &str, cap: usize, clock: &impl Clock) -> Option<Reply> {
    let step = doc.steps.iter().find(|s| s.step_id == step_id)?;
    let mut steps = IndexMap::new();
    steps.insert(step.step_id.clone(), step_reply(&step.result, cap));
    Some(Reply {
        agent_identity: agent_identity.to_string(),
        date_time: iso8601_now(clock),
        run_id: doc.document_id.to_string(),
        steps,
        status: doc.status,
        runtime_status_counts: runtime_status_counts(doc),
        document_trace_output: document_trace_output(doc),
    })
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
