// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! The plugin contract and a read-only-after-init registry of plugins.

use async_trait::async_trait;
use dproc_core::{CancelToken, PluginResult, StepConfiguration};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// How a plugin should wind down when asked to stop independently of
/// cancellation (used for whole-process shutdown of long-lived plugin
/// subprocesses, e.g. a session plugin).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopKind {
    Soft,
    Hard,
}

/// A named unit of work a document step can invoke.
///
/// Implementations may block (they run on the worker pool's task, not the
/// reactor thread) but must honor `cancel` and must never panic — the
/// registry's `Lookup` result is wrapped by the executor in a panic guard,
/// but a well-behaved plugin shouldn't need it.
#[async_trait]
pub trait Plugin: Send + Sync + 'static {
    fn name(&self) -> &str;

    async fn execute(&self, step_id: &str, configuration: &StepConfiguration, cancel: CancelToken) -> PluginResult;

    /// Best-effort external stop signal, e.g. for a plugin backing a
    /// long-lived session. Most plugins have nothing to do here.
    fn stop(&self, _kind: StopKind) {}
}

/// Outcome of a registry lookup, distinguishing "never heard of this
/// plugin" from "known, but unsupported on this platform".
pub enum Lookup {
    Supported(Arc<dyn Plugin>),
    KnownButUnsupported,
    Unknown,
}

/// Read-only-after-construction table of available plugins.
pub struct PluginRegistry {
    plugins: HashMap<String, Arc<dyn Plugin>>,
    known_but_unsupported: HashSet<String>,
}

impl PluginRegistry {
    pub fn builder() -> PluginRegistryBuilder {
        PluginRegistryBuilder::default()
    }

    /// Look up a plugin by name.
    ///
    /// `Unknown` means the document references a plugin this build has
    /// never heard of and should trigger an upgrade-agent recommendation;
    /// `KnownButUnsupported` means the plugin exists but isn't available on
    /// this platform, and the step should be reported `Skipped`.
    pub fn lookup(&self, name: &str) -> Lookup {
        if let Some(plugin) = self.plugins.get(name) {
            return Lookup::Supported(plugin.clone());
        }
        if self.known_but_unsupported.contains(name) {
            return Lookup::KnownButUnsupported;
        }
        Lookup::Unknown
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

#[derive(Default)]
pub struct PluginRegistryBuilder {
    plugins: HashMap<String, Arc<dyn Plugin>>,
    known_but_unsupported: HashSet<String>,
}

impl PluginRegistryBuilder {
    pub fn register(mut self, plugin: Arc<dyn Plugin>) -> Self {
        self.plugins.insert(plugin.name().to_string(), plugin);
        self
    }

    /// Mark a plugin name as known but unavailable on this platform.
    pub fn register_unsupported(mut self, name: impl Into<String>) -> Self {
        self.known_but_unsupported.insert(name.into());
        self
    }

    pub fn build(self) -> PluginRegistry {
        PluginRegistry { plugins: self.plugins, known_but_unsupported: self.known_but_unsupported }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake;

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
