// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Runs the ordered steps of one document against the plugin registry,
//! checkpointing per-step and final state through the document store.

use dproc_core::{clamp_step_timeout, CancelToken, Document, PluginResult, PluginStep, Status};
use dproc_registry::{Lookup, PluginRegistry};
use dproc_store::{DocumentStore, Folder};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Platform facts used to evaluate step preconditions (spec §6).
#[derive(Debug, Clone)]
pub struct Platform {
    pub platform_type: String,
    pub platform_name: String,
}

/// Runs documents step by step against a [`PluginRegistry`], persisting
/// through a [`DocumentStore`] after every transition.
pub struct Executor {
    registry: Arc<PluginRegistry>,
}

impl Executor {
    pub fn new(registry: Arc<PluginRegistry>) -> Self {
        Self { registry }
    }

    /// Execute every not-yet-terminal step of `doc` in declaration order.
    ///
    /// `report_step` is invoked once per step after its result is persisted,
    /// mirroring the Go source's `reportStep` callback — it's how the
    /// caller drives incremental replies without this function needing to
    /// know about transports.
    pub async fn run_document(
        &self,
        store: &DocumentStore,
        doc: &mut Document,
        folder: Folder,
        cancel: &CancelToken,
        platform: &Platform,
        mut report_step: impl FnMut(&str, &PluginResult),
    ) {
        let mut stop_requested = false;

        for idx in 0..doc.steps.len() {
            let is_finally = doc.steps[idx].configuration.is_finally_step;

            if cancel.is_canceled() {
                stop_requested = true;
            }
            if stop_requested && !is_finally {
                continue;
            }

            if doc.steps[idx].has_executed {
                match doc.steps[idx].result.status {
                    Status::Success | Status::Skipped | Status::Failed => continue,
                    Status::SuccessAndReboot | Status::PassedAndReboot => {
                        let reboot_status = doc.steps[idx].result.status;
                        doc.steps[idx].result.status = Status::Success;
                        doc.remember_reboot(reboot_status);
                        let _ = store.persist(doc, folder);
                        report_step(&doc.steps[idx].step_id.clone(), &doc.steps[idx].result.clone());
                        continue;
                    }
                    _ => {}
                }
            }

            if PluginStep::preconditions_apply(&doc.schema_version) {
                let satisfied = doc.steps[idx]
                    .configuration
                    .preconditions
                    .iter()
                    .all(|p| p.is_satisfied(&platform.platform_type, &platform.platform_name));
                if !satisfied {
                    self.finish_without_execution(doc, idx, Status::Skipped, 0, None, folder, store, &mut report_step);
                    self.update_stop(doc, idx, &mut stop_requested);
                    continue;
                }
            }

            let plugin_name = doc.steps[idx].plugin_name.clone();
            let plugin = match self.registry.lookup(&plugin_name) {
                Lookup::Supported(p) => p,
                Lookup::KnownButUnsupported => {
                    self.finish_without_execution(
                        doc,
                        idx,
                        Status::Skipped,
                        0,
                        Some("plugin known but unsupported on this platform".to_string()),
                        folder,
                        store,
                        &mut report_step,
                    );
                    self.update_stop(doc, idx, &mut stop_requested);
                    continue;
                }
                Lookup::Unknown => {
                    self.finish_without_execution(
                        doc,
                        idx,
                        Status::Failed,
                        1,
                        Some(format!("unknown plugin {plugin_name}; upgrade the agent")),
                        folder,
                        store,
                        &mut report_step,
                    );
                    self.update_stop(doc, idx, &mut stop_requested);
                    continue;
                }
            };

            doc.steps[idx].result.status = Status::InProgress;
            let _ = store.persist(doc, folder);

            let timeout = Duration::from_secs(clamp_step_timeout(doc.steps[idx].configuration.timeout_seconds));
            let child_cancel = cancel.child_with_timeout(timeout);
            let step_id = doc.steps[idx].step_id.clone();
            let config = doc.steps[idx].configuration.clone();
            let plugin_for_task = plugin.clone();
            let cancel_for_task = child_cancel.clone();

            let start = Instant::now();
            let handle = tokio::spawn(async move { plugin_for_task.execute(&step_id, &config, cancel_for_task).await });

            let mut result = match handle.await {
                Ok(result) => result,
                Err(join_err) if join_err.is_panic() => {
                    tracing::error!(step_id = %doc.steps[idx].step_id, plugin = %plugin_name, "plugin panicked");
                    let mut r = PluginResult::not_started(doc.steps[idx].step_id.clone(), plugin_name.clone());
                    r.status = Status::Failed;
                    r.code = 1;
                    r.error = Some("plugin panicked".to_string());
                    r
                }
                Err(_) => {
                    let mut r = PluginResult::not_started(doc.steps[idx].step_id.clone(), plugin_name.clone());
                    r.status = Status::Cancelled;
                    r
                }
            };
            result.step_id = doc.steps[idx].step_id.clone();
            result.plugin_name = plugin_name.clone();
            tracing::debug!(
                step_id = %result.step_id,
                plugin = %plugin_name,
                status = %result.status,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "step finished"
            );

            doc.steps[idx].has_executed = true;
            doc.steps[idx].result = result.clone();
            let _ = store.persist(doc, folder);
            report_step(&doc.steps[idx].step_id, &result);

            if result.status == Status::Cancelled {
                stop_requested = true;
            } else if result.status == Status::Failed && doc.steps[idx].configuration.on_failure.is_terminator() {
                stop_requested = true;
            }
        }

        doc.recompute_status();
        let _ = store.persist(doc, folder);
    }

    /// Mark a step terminal without invoking its plugin (skip/unknown/unsupported paths).
    #[allow(clippy::too_many_arguments)]
    fn finish_without_execution(
        &self,
        doc: &mut Document,
        idx: usize,
        status: Status,
        code: i32,
        error: Option<String>,
        folder: Folder,
        store: &DocumentStore,
        report_step: &mut impl FnMut(&str, &PluginResult),
    ) {
        doc.steps[idx].has_executed = true;
        doc.steps[idx].result.status = status;
        doc.steps[idx].result.code = code;
        doc.steps[idx].result.error = error;
        let _ = store.persist(doc, folder);
        report_step(&doc.steps[idx].step_id.clone(), &doc.steps[idx].result.clone());
    }

    fn update_stop(&self, doc: &Document, idx: usize, stop_requested: &mut bool) {
        if doc.steps[idx].result.status == Status::Failed && doc.steps[idx].configuration.on_failure.is_terminator() {
            *stop_requested = true;
        }
    }
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
