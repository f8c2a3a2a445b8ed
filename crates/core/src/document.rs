// SPDX-License-Identifier: MIT

//! The document data model: work orders, their ordered plugin steps, and
//! the results those steps produce.

use crate::status::Status;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::SystemTime;

crate::define_id! {
    /// Stable identifier for a document, unique on the local filesystem.
    ///
    /// For command documents this equals the `CommandId`; for associations
    /// it equals `AssociationId.RunId`; for sessions it equals `SessionId`.
    pub struct DocumentId("doc-");
}

/// The kind of work order a document represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DocumentKind {
    SendCommand,
    CancelCommand,
    Association,
    SendCommandOffline,
    CancelCommandOffline,
    StartSession,
    TerminateSession,
}

crate::simple_display! {
    DocumentKind {
        SendCommand => "SendCommand",
        CancelCommand => "CancelCommand",
        Association => "Association",
        SendCommandOffline => "SendCommandOffline",
        CancelCommandOffline => "CancelCommandOffline",
        StartSession => "StartSession",
        TerminateSession => "TerminateSession",
    }
}

impl DocumentKind {
    /// True for the two cancel variants; these route to the cancel pool.
    pub fn is_cancel(self) -> bool {
        matches!(self, DocumentKind::CancelCommand | DocumentKind::CancelCommandOffline)
    }
}

/// Where a document's orchestration artifacts land: local scratch directory,
/// and the (collaborator-owned) remote sinks for output upload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IoConfig {
    pub orchestration_dir: PathBuf,
    #[serde(default)]
    pub s3_bucket_name: Option<String>,
    #[serde(default)]
    pub s3_key_prefix: Option<String>,
    #[serde(default)]
    pub cloudwatch_log_group: Option<String>,
}

/// Carried by a `CancelCommand`/`CancelCommandOffline` document: which
/// in-flight document it targets, plus an optional operator note.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelInfo {
    pub target_message_id: String,
    #[serde(default)]
    pub debug_info: Option<String>,
}

/// `StringEquals` precondition operand pair, per spec §6.
///
/// `lhs` is usually `platformType` or `platformName`; `rhs` is the expected
/// value. A step with no preconditions always runs; multiple preconditions
/// are ANDed (see DESIGN.md for why — the source leaves this ambiguous).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Precondition {
    pub lhs: String,
    pub rhs: String,
}

impl Precondition {
    pub fn new(lhs: impl Into<String>, rhs: impl Into<String>) -> Self {
        Self { lhs: lhs.into(), rhs: rhs.into() }
    }

    /// Evaluate against the resolved platform facts. Preconditions are only
    /// honored when the owning document's `schema_version >= 2.2` — callers
    /// are expected to have already gated on that via
    /// [`PluginStep::preconditions_apply`].
    pub fn is_satisfied(&self, platform_type: &str, platform_name: &str) -> bool {
        let resolved = match self.lhs.as_str() {
            "platformType" => platform_type,
            "platformName" => platform_name,
            literal => literal,
        };
        resolved == self.rhs
    }
}

/// What to do with the rest of the document after a step fails.
///
/// Default is `Exit`: this spec pins the ambiguous "no modifier" case to
/// terminate the document rather than continue (see DESIGN.md).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OnFailure {
    Exit,
    Continue,
    SuccessAndExit,
}

impl Default for OnFailure {
    fn default() -> Self {
        OnFailure::Exit
    }
}

impl OnFailure {
    /// True for the modifiers that terminate the document on failure.
    pub fn is_terminator(self) -> bool {
        matches!(self, OnFailure::Exit | OnFailure::SuccessAndExit)
    }
}

/// Minimum, default, and maximum per-step timeout, per spec §4.F.
pub const MIN_STEP_TIMEOUT_SECONDS: u64 = 5;
pub const DEFAULT_STEP_TIMEOUT_SECONDS: u64 = 3600;
pub const MAX_STEP_TIMEOUT_SECONDS: u64 = 172_800;

/// Clamp a requested timeout into the allowed range.
pub fn clamp_step_timeout(seconds: u64) -> u64 {
    seconds.clamp(MIN_STEP_TIMEOUT_SECONDS, MAX_STEP_TIMEOUT_SECONDS)
}

/// Per-step settings: the normalized form of either a v1.x `runtimeConfig`
/// entry or a v2.x `mainSteps` entry. Parameter substitution and schema
/// validation have already happened upstream (the `DocumentParser`
/// collaborator); this is what the Executor actually consumes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StepConfiguration {
    #[serde(default)]
    pub settings: serde_json::Value,
    #[serde(default)]
    pub properties: serde_json::Value,
    #[serde(default)]
    pub preconditions: Vec<Precondition>,
    #[serde(default)]
    pub on_failure: OnFailure,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
    #[serde(default)]
    pub is_finally_step: bool,
}

fn default_timeout() -> u64 {
    DEFAULT_STEP_TIMEOUT_SECONDS
}

/// A pointer to plugin output uploaded to an external object store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Location {
    pub bucket: String,
    pub key: String,
}

/// The outcome of one plugin invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginResult {
    pub step_id: String,
    pub plugin_name: String,
    pub status: Status,
    pub code: i32,
    #[serde(default)]
    pub output: serde_json::Value,
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
    #[serde(default)]
    pub started_at: Option<SystemTime>,
    #[serde(default)]
    pub ended_at: Option<SystemTime>,
    #[serde(default)]
    pub s3_location: Option<S3Location>,
    #[serde(default)]
    pub error: Option<String>,
}

impl PluginResult {
    /// An unstarted placeholder result for a step that hasn't run yet.
    pub fn not_started(step_id: impl Into<String>, plugin_name: impl Into<String>) -> Self {
        Self {
            step_id: step_id.into(),
            plugin_name: plugin_name.into(),
            status: Status::NotStarted,
            code: 0,
            output: serde_json::Value::Null,
            stdout: String::new(),
            stderr: String::new(),
            started_at: None,
            ended_at: None,
            s3_location: None,
            error: None,
        }
    }
}

/// One plugin invocation inside a document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginStep {
    pub step_id: String,
    pub plugin_name: String,
    pub configuration: StepConfiguration,
    #[serde(default)]
    pub has_executed: bool,
    pub result: PluginResult,
}

impl PluginStep {
    pub fn new(step_id: impl Into<String>, plugin_name: impl Into<String>, configuration: StepConfiguration) -> Self {
        let step_id = step_id.into();
        let plugin_name = plugin_name.into();
        let result = PluginResult::not_started(step_id.clone(), plugin_name.clone());
        Self { step_id, plugin_name, configuration, has_executed: false, result }
    }

    /// Invariant 4: `has_executed` implies the result is no longer `NotStarted`.
    pub fn upholds_execution_invariant(&self) -> bool {
        !self.has_executed || self.result.status != Status::NotStarted
    }

    /// Whether this document's schema version is new enough to honor
    /// preconditions at all (spec §6: only `schemaVersion >= 2.2`).
    pub fn preconditions_apply(schema_version: &str) -> bool {
        parse_schema_version(schema_version).map(|(maj, min)| (maj, min) >= (2, 2)).unwrap_or(false)
    }
}

/// Parse a `"<major>.<minor>"` schema version string.
pub fn parse_schema_version(s: &str) -> Option<(u32, u32)> {
    let (maj, min) = s.split_once('.')?;
    Some((maj.parse().ok()?, min.parse().ok()?))
}

/// A work order: an ordered sequence of plugin steps plus the bookkeeping
/// needed to run, persist, and report on it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub document_id: DocumentId,
    pub message_id: String,
    #[serde(default)]
    pub command_id: Option<String>,
    #[serde(default)]
    pub association_id: Option<String>,
    pub instance_id: String,
    pub document_name: String,
    pub document_version: String,
    pub schema_version: String,
    pub created_at: SystemTime,
    #[serde(default)]
    pub run_count: u32,
    pub kind: DocumentKind,
    pub steps: Vec<PluginStep>,
    #[serde(default)]
    pub cancel_info: Option<CancelInfo>,
    #[serde(default)]
    pub io_config: IoConfig,
    #[serde(default)]
    pub status: Option<Status>,
    /// Parameters resolved by the upstream `DocumentParser`; carried through
    /// for logging/reply context only, never re-substituted here.
    #[serde(default)]
    pub parameters: HashMap<String, String>,
    /// The highest reboot status any step ever reported, kept even after a
    /// resumed step's own status is downgraded to `Success` (spec §9: a
    /// completed document that rebooted mid-run still aggregates to
    /// `SuccessAndReboot`, merge rule). `None` if the document never rebooted.
    #[serde(default)]
    pub reboot_history: Option<Status>,
}

impl Document {
    /// Recompute the aggregate status from the current step results, merged
    /// with any remembered reboot history (invariant 5: the aggregate is
    /// never stored without this recomputation).
    pub fn recompute_status(&mut self) {
        let from_steps = crate::status::aggregate(self.steps.iter().map(|s| s.result.status));
        self.status = crate::status::merge(from_steps, self.reboot_history);
    }

    /// Record that a step resumed past a reboot, so the aggregate still
    /// reflects it after the step's own status is downgraded to `Success`.
    pub fn remember_reboot(&mut self, status: Status) {
        debug_assert!(status.is_reboot());
        self.reboot_history = crate::status::merge(self.reboot_history, Some(status));
    }

    /// True once recomputation would move the document out of Current into
    /// Completed. Looks at each step's live status rather than the reported
    /// aggregate: after a resumed reboot step is downgraded to `Success`,
    /// `self.status` can still read `SuccessAndReboot` via `reboot_history`,
    /// but the document is done and must still move to Completed.
    pub fn is_complete(&self) -> bool {
        if self.steps.iter().any(|s| s.result.status.is_reboot()) {
            return false;
        }
        match self.status {
            Some(status) => status.is_terminal(),
            None => false,
        }
    }

    /// True when some step is currently sitting at a live reboot status: the
    /// document must stay in Current until the reboot is resumed (invariant
    /// 6). Ignores `reboot_history`, which only affects the reported
    /// aggregate once every step has actually finished.
    pub fn awaits_reboot(&self) -> bool {
        self.steps.iter().any(|s| s.result.status.is_reboot())
    }

    pub fn step_mut(&mut self, step_id: &str) -> Option<&mut PluginStep> {
        self.steps.iter_mut().find(|s| s.step_id == step_id)
    }
}

#[cfg(test)]
#[path = "document_tests.rs"]
mod tests;
