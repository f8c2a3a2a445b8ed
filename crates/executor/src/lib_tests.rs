// SPDX-License-Identifier: MIT

use super::*;
use dproc_core::{DocumentId, DocumentKind, IoConfig, OnFailure, PluginResult, StepConfiguration};
use dproc_registry::fake::FakePlugin;
use std::collections::HashMap;
use std::time::SystemTime;
use tempfile::TempDir;

fn platform() -> Platform {
    Platform { platform_type: "Linux".into(), platform_name: "Amazon Linux".into() }
}

fn store() -> (TempDir, DocumentStore) {
    let dir = TempDir::new().unwrap();
    let store = DocumentStore::new(dir.path(), "i-0123456789abcdef0");
    (dir, store)
}

fn step(id: &str, plugin: &str, on_failure: OnFailure, finally: bool) -> dproc_core::PluginStep {
    let config = StepConfiguration { on_failure, is_finally_step: finally, ..Default::default() };
    dproc_core::PluginStep::new(id, plugin, config)
}

fn doc(steps: Vec<dproc_core::PluginStep>) -> Document {
    Document {
        document_id: DocumentId::from_string("doc-a"),
        message_id: "msg-a".into(),
        command_id: Some("a".into()),
        association_id: None,
        instance_id: "i-0123456789abcdef0".into(),
        document_name: "AWS-RunShellScript".into(),
        document_version: "1".into(),
        schema_version: "2.2".into(),
        created_at: SystemTime::now(),
        run_count: 0,
        kind: DocumentKind::SendCommand,
        steps,
        cancel_info: None,
        io_config: IoConfig::default(),
        status: None,
        parameters: HashMap::new(),
        reboot_history: None,
    }
}

fn success_result() -> PluginResult {
    let mut r = PluginResult::not_started("unused", "unused");
    r.status = Status::Success;
    r
}

fn failure_result() -> PluginResult {
    let mut r = PluginResult::not_started("unused", "unused");
    r.status = Status::Failed;
    r.code = 1;
    r
}

fn cancelled_result() -> PluginResult {
    let mut r = PluginResult::not_started("unused", "unused");
    r.status = Status::Cancelled;
    r
}

fn registry_with(plugins: Vec<Arc<dyn dproc_registry::Plugin>>) -> Arc<PluginRegistry> {
    let mut builder = PluginRegistry::builder();
    for p in plugins {
        builder = builder.register(p);
    }
    Arc::new(builder.build())
}

#[tokio::test]
async fn all_steps_succeed_aggregate_is_success() {
    let plugin = Arc::new(FakePlugin::new("echo", success_result()));
    let registry = registry_with(vec![plugin]);
    let (_dir, store) = store();
    let mut document = doc(vec![step("step:0", "echo", OnFailure::Exit, false), step("step:1", "echo", OnFailure::Exit, false)]);
    let executor = Executor::new(registry);
    let cancel = CancelToken::new();

    executor.run_document(&store, &mut document, Folder::Current, &cancel, &platform(), |_, _| {}).await;

    assert_eq!(document.status, Some(Status::Success));
    assert!(document.steps.iter().all(|s| s.has_executed));
}

#[tokio::test]
async fn on_failure_exit_stops_remaining_steps() {
    let fail_plugin = Arc::new(FakePlugin::new("fail", failure_result()));
    let echo_plugin = Arc::new(FakePlugin::new("echo", success_result()));
    let registry = registry_with(vec![fail_plugin, echo_plugin.clone()]);
    let (_dir, store) = store();
    let mut document = doc(vec![step("step:0", "fail", OnFailure::Exit, false), step("step:1", "echo", OnFailure::Exit, false)]);
    let executor = Executor::new(registry);
    let cancel = CancelToken::new();

    executor.run_document(&store, &mut document, Folder::Current, &cancel, &platform(), |_, _| {}).await;

    assert_eq!(document.status, Some(Status::Failed));
    assert!(document.steps[0].has_executed);
    assert!(!document.steps[1].has_executed);
    assert!(echo_plugin.calls().is_empty());
}

#[tokio::test]
async fn on_failure_continue_runs_remaining_steps() {
    let fail_plugin = Arc::new(FakePlugin::new("fail", failure_result()));
    let echo_plugin = Arc::new(FakePlugin::new("echo", success_result()));
    let registry = registry_with(vec![fail_plugin, echo_plugin.clone()]);
    let (_dir, store) = store();
    let mut document = doc(vec![step("step:0", "fail", OnFailure::Continue, false), step("step:1", "echo", OnFailure::Exit, false)]);
    let executor = Executor::new(registry);
    let cancel = CancelToken::new();

    executor.run_document(&store, &mut document, Folder::Current, &cancel, &platform(), |_, _| {}).await;

    assert!(document.steps[1].has_executed);
    assert_eq!(echo_plugin.calls().len(), 1);
}

#[tokio::test]
async fn finally_step_runs_even_after_stop() {
    let fail_plugin = Arc::new(FakePlugin::new("fail", failure_result()));
    let cleanup_plugin = Arc::new(FakePlugin::new("cleanup", success_result()));
    let registry = registry_with(vec![fail_plugin, cleanup_plugin.clone()]);
    let (_dir, store) = store();
    let mut document =
        doc(vec![step("step:0", "fail", OnFailure::Exit, false), step("step:1", "cleanup", OnFailure::Exit, true)]);
    let executor = Executor::new(registry);
    let cancel = CancelToken::new();

    executor.run_document(&store, &mut document, Folder::Current, &cancel, &platform(), |_, _| {}).await;

    assert!(document.steps[1].has_executed);
    assert_eq!(cleanup_plugin.calls().len(), 1);
}

#[tokio::test]
async fn cancelled_step_halts_remaining_non_finally_steps() {
    let cancel_plugin = Arc::new(FakePlugin::new("cancel-me", cancelled_result()));
    let echo_plugin = Arc::new(FakePlugin::new("echo", success_result()));
    let cleanup_plugin = Arc::new(FakePlugin::new("cleanup", success_result()));
    let registry = registry_with(vec![cancel_plugin, echo_plugin.clone(), cleanup_plugin.clone()]);
    let (_dir, store) = store();
    let mut document = doc(vec![
        step("step:0", "cancel-me", OnFailure::Exit, false),
        step("step:1", "echo", OnFailure::Exit, false),
        step("step:2", "cleanup", OnFailure::Exit, true),
    ]);
    let executor = Executor::new(registry);
    let cancel = CancelToken::new();

    executor.run_document(&store, &mut document, Folder::Current, &cancel, &platform(), |_, _| {}).await;

    assert_eq!(document.steps[0].result.status, Status::Cancelled);
    assert!(!document.steps[1].has_executed);
    assert!(echo_plugin.calls().is_empty());
    assert!(document.steps[2].has_executed);
    assert_eq!(cleanup_plugin.calls().len(), 1);
}

#[tokio::test]
async fn cancellation_before_a_step_starts_skips_it() {
    let echo_plugin = Arc::new(FakePlugin::new("echo", success_result()));
    let registry = registry_with(vec![echo_plugin.clone()]);
    let (_dir, store) = store();
    let mut document =
        doc(vec![step("step:0", "echo", OnFailure::Exit, false), step("step:1", "echo", OnFailure::Exit, false)]);
    let executor = Executor::new(registry);
    let cancel = CancelToken::new();
    cancel.cancel(dproc_core::CancelReason::Canceled);

    executor.run_document(&store, &mut document, Folder::Current, &cancel, &platform(), |_, _| {}).await;

    assert!(!document.steps[0].has_executed);
    assert!(!document.steps[1].has_executed);
    assert!(echo_plugin.calls().is_empty());
}

#[tokio::test]
async fn unknown_plugin_fails_with_upgrade_hint() {
    let registry = registry_with(vec![]);
    let (_dir, store) = store();
    let mut document = doc(vec![step("step:0", "aws:neverHeardOfIt", OnFailure::Exit, false)]);
    let executor = Executor::new(registry);
    let cancel = CancelToken::new();

    executor.run_document(&store, &mut document, Folder::Current, &cancel, &platform(), |_, _| {}).await;

    assert_eq!(document.steps[0].result.status, Status::Failed);
    assert!(document.steps[0].result.error.as_ref().unwrap().contains("upgrade"));
}

#[tokio::test]
async fn known_but_unsupported_plugin_is_skipped() {
    let registry = Arc::new(PluginRegistry::builder().register_unsupported("aws:psModule").build());
    let (_dir, store) = store();
    let mut document = doc(vec![step("step:0", "aws:psModule", OnFailure::Exit, false)]);
    let executor = Executor::new(registry);
    let cancel = CancelToken::new();

    executor.run_document(&store, &mut document, Folder::Current, &cancel, &platform(), |_, _| {}).await;

    assert_eq!(document.steps[0].result.status, Status::Skipped);
}

#[tokio::test]
async fn precondition_mismatch_skips_step() {
    let plugin = Arc::new(FakePlugin::new("echo", success_result()));
    let registry = registry_with(vec![plugin.clone()]);
    let (_dir, store) = store();
    let mut config_step = step("step:0", "echo", OnFailure::Exit, false);
    config_step.configuration.preconditions.push(dproc_core::Precondition::new("platformType", "Windows"));
    let mut document = doc(vec![config_step]);
    let executor = Executor::new(registry);
    let cancel = CancelToken::new();

    executor.run_document(&store, &mut document, Folder::Current, &cancel, &platform(), |_, _| {}).await;

    assert_eq!(document.steps[0].result.status, Status::Skipped);
    assert!(plugin.calls().is_empty());
}

#[tokio::test]
async fn resumed_success_step_is_not_re_executed() {
    let plugin = Arc::new(FakePlugin::new("echo", success_result()));
    let registry = registry_with(vec![plugin.clone()]);
    let (_dir, store) = store();
    let mut already_done = step("step:0", "echo", OnFailure::Exit, false);
    already_done.has_executed = true;
    already_done.result.status = Status::Success;
    let mut document = doc(vec![already_done]);
    let executor = Executor::new(registry);
    let cancel = CancelToken::new();

    executor.run_document(&store, &mut document, Folder::Current, &cancel, &platform(), |_, _| {}).await;

    assert!(plugin.calls().is_empty());
}

#[tokio::test]
async fn resumed_reboot_step_downgrades_to_success() {
    let plugin = Arc::new(FakePlugin::new("echo", success_result()));
    let registry = registry_with(vec![plugin.clone()]);
    let (_dir, store) = store();
    let mut rebooted = step("step:0", "echo", OnFailure::Exit, false);
    rebooted.has_executed = true;
    rebooted.result.status = Status::SuccessAndReboot;
    let mut document = doc(vec![rebooted, step("step:1", "echo", OnFailure::Exit, false)]);
    let executor = Executor::new(registry);
    let cancel = CancelToken::new();

    executor.run_document(&store, &mut document, Folder::Current, &cancel, &platform(), |_, _| {}).await;

    assert_eq!(document.steps[0].result.status, Status::Success);
    assert_eq!(plugin.calls().len(), 1); // only step:1 actually invoked
    assert_eq!(document.status, Some(Status::SuccessAndReboot));
}

#[tokio::test]
async fn panic_in_plugin_is_reported_as_failed() {
    struct PanicPlugin;
    #[async_trait::async_trait]
    impl dproc_registry::Plugin for PanicPlugin {
        fn name(&self) -> &str {
            "panics"
        }
        async fn execute(
            &self,
            _step_id: &str,
            _configuration: &StepConfiguration,
            _cancel: CancelToken,
        ) -> PluginResult {
            panic!("plugin exploded");
        }
    }

    let registry = registry_with(vec![Arc::new(PanicPlugin)]);
    let (_dir, store) = store();
    let mut document = doc(vec![step("step:0", "panics", OnFailure::Exit, false)]);
    let executor = Executor::new(registry);
    let cancel = CancelToken::new();

    executor.run_document(&store, &mut document, Folder::Current, &cancel, &platform(), |_, _| {}).await;

    assert_eq!(document.steps[0].result.status, Status::Failed);
    assert_eq!(document.steps[0].result.code, 1);
}

#[tokio::test]
async fn timeout_fires_timed_out_cancel_reason_into_plugin() {
    let plugin = FakePlugin::blocking("slow");
    let registry = registry_with(vec![Arc::new(plugin)]);
    let (_dir, store) = store();
    let config = StepConfiguration { timeout_seconds: dproc_core::MIN_STEP_TIMEOUT_SECONDS, ..Default::default() };
    let step = dproc_core::PluginStep::new("step:0", "slow", config);
    let mut document = doc(vec![step]);
    let executor = Executor::new(registry);
    let cancel = CancelToken::new();

    let report = tokio::time::timeout(
        std::time::Duration::from_secs(dproc_core::MIN_STEP_TIMEOUT_SECONDS + 5),
        executor.run_document(&store, &mut document, Folder::Current, &cancel, &platform(), |_, _| {}),
    )
    .await;

    assert!(report.is_ok());
    assert_eq!(document.steps[0].result.status, Status::Cancelled);
}

#[tokio::test]
async fn report_step_callback_invoked_per_step() {
    let plugin = Arc::new(FakePlugin::new("echo", success_result()));
    let registry = registry_with(vec![plugin]);
    let (_dir, store) = store();
    let mut document = doc(vec![step("step:0", "echo", OnFailure::Exit, false), step("step:1", "echo", OnFailure::Exit, false)]);
    let executor = Executor::new(registry);
    let cancel = CancelToken::new();

    let reported = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let reported_clone = reported.clone();
    executor
        .run_document(&store, &mut document, Folder::Current, &cancel, &platform(), move |step_id, _result| {
            reported_clone.lock().push(step_id.to_string());
        })
        .await;

    assert_eq!(*reported.lock(), vec!["step:0", "step:1"]);
}
