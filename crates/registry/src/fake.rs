// SPDX-License-Identifier: MIT

//! Test double for [`crate::Plugin`]: records every invocation and returns a
//! canned result, optionally blocking until cancelled first.

use crate::{Plugin, StopKind};
use async_trait::async_trait;
use dproc_core::{CancelToken, PluginResult, Status, StepConfiguration};
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct FakeCall {
    pub step_id: String,
}

struct FakeState {
    calls: Vec<FakeCall>,
    stop_calls: Vec<StopKind>,
}

/// Plugin double that returns a fixed [`PluginResult`], or — if constructed
/// via [`FakePlugin::blocking`] — waits on its `Cancel` token before
/// returning a `Cancelled` result, for exercising the executor's timeout and
/// cancellation paths without a real subprocess.
#[derive(Clone)]
pub struct FakePlugin {
    name: String,
    result: PluginResult,
    blocks: bool,
    state: Arc<Mutex<FakeState>>,
}

impl FakePlugin {
    pub fn new(name: impl Into<String>, result: PluginResult) -> Self {
        Self {
            name: name.into(),
            result,
            blocks: false,
            state: Arc::new(Mutex::new(FakeState { calls: Vec::new(), stop_calls: Vec::new() })),
        }
    }

    /// A plugin that never returns on its own; it only resolves once its
    /// cancel token fires, then reports `Cancelled`.
    pub fn blocking(name: impl Into<String>) -> Self {
        let mut plugin = Self::new(name, PluginResult::not_started("unused", "unused"));
        plugin.blocks = true;
        plugin
    }

    pub fn calls(&self) -> Vec<FakeCall> {
        self.state.lock().calls.clone()
    }

    pub fn stop_calls(&self) -> Vec<StopKind> {
        self.state.lock().stop_calls.clone()
    }
}

#[async_trait]
impl Plugin for FakePlugin {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, step_id: &str, _configuration: &StepConfiguration, cancel: CancelToken) -> PluginResult {
        self.state.lock().calls.push(FakeCall { step_id: step_id.to_string() });

        if self.blocks {
            cancel.canceled().await;
            let mut result = PluginResult::not_started(step_id, &self.name);
            result.status = Status::Cancelled;
            return result;
        }

        let mut result = self.result.clone();
        result.step_id = step_id.to_string();
        result.plugin_name = self.name.clone();
        result
    }

    fn stop(&self, kind: StopKind) {
        self.state.lock().stop_calls.push(kind);
    }
}
