// SPDX-License-Identifier: MIT

use super::*;
use dproc_core::{DocumentId, DocumentKind, FakeClock, IoConfig, PluginStep, StepConfiguration};
use std::collections::HashMap;
use std::time::SystemTime;

fn doc_with_steps(steps: Vec<PluginStep>) -> Document {
    Document {
        document_id: DocumentId::from_string("doc-abc"),
        message_id: "msg-abc".into(),
        command_id: Some("abc".into()),
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
        status: Some(Status::Success),
        parameters: HashMap::new(),
        reboot_history: None,
    }
}

fn step_with_output(id: &str, stdout: &str, stderr: &str) -> PluginStep {
    let mut step = PluginStep::new(id, "aws:runShellScript", StepConfiguration::default());
    step.has_executed = true;
    step.result.status = Status::Success;
    step.result.stdout = stdout.to_string();
    step.result.stderr = stderr.to_string();
    step
}

#[test]
fn full_reply_includes_every_step_in_order() {
    let doc = doc_with_steps(vec![step_with_output("step:0", "ok", ""), step_with_output("step:1", "also ok", "")]);
    let clock = FakeClock::new();
    let reply = build_full_reply(&doc, "i-0123456789abcdef0", DEFAULT_OUTPUT_CAP, &clock);

    assert_eq!(reply.run_id, "doc-abc");
    assert_eq!(reply.status, Some(Status::Success));
    let keys: Vec<_> = reply.steps.keys().cloned().collect();
    assert_eq!(keys, vec!["step:0", "step:1"]);
    assert_eq!(reply.steps["step:0"].output, "ok");
}

#[test]
fn step_reply_truncates_output_to_cap() {
    let doc = doc_with_steps(vec![step_with_output("step:0", &"x".repeat(10_000), "")]);
    let clock = FakeClock::new();
    let reply = build_full_reply(&doc, "i-instance", 200, &clock);
    assert!(reply.steps["step:0"].output.len() <= 200);
}

#[test]
fn incremental_reply_covers_only_requested_step() {
    let doc = doc_with_steps(vec![step_with_output("step:0", "a", ""), step_with_output("step:1", "b", "")]);
    let clock = FakeClock::new();
    let reply = build_step_reply(&doc, "step:1", "i-instance", DEFAULT_OUTPUT_CAP, &clock).unwrap();
    assert_eq!(reply.steps.len(), 1);
    assert!(reply.steps.contains_key("step:1"));
}

#[test]
fn incremental_reply_missing_step_is_none() {
    let doc = doc_with_steps(vec![step_with_output("step:0", "a", "")]);
    let clock = FakeClock::new();
    assert!(build_step_reply(&doc, "step:missing", "i-instance", DEFAULT_OUTPUT_CAP, &clock).is_none());
}

#[test]
fn date_time_is_rfc3339_utc() {
    let doc = doc_with_steps(vec![]);
    let clock = FakeClock::new();
    let reply = build_full_reply(&doc, "i-instance", DEFAULT_OUTPUT_CAP, &clock);
    assert!(reply.date_time.ends_with('Z'));
}

#[test]
fn full_reply_counts_steps_by_status() {
    let doc = doc_with_steps(vec![step_with_output("step:0", "ok", ""), step_with_output("step:1", "also ok", "")]);
    let clock = FakeClock::new();
    let reply = build_full_reply(&doc, "i-instance", DEFAULT_OUTPUT_CAP, &clock);
    assert_eq!(reply.runtime_status_counts.get(&Status::Success), Some(&2));
}

#[test]
fn cancel_document_trace_output_carries_debug_info() {
    let mut doc = doc_with_steps(vec![]);
    doc.cancel_info = Some(dproc_core::CancelInfo { target_message_id: "msg-target".into(), debug_info: Some("Command msg-target cancelled".into()) });
    let clock = FakeClock::new();
    let reply = build_full_reply(&doc, "i-instance", DEFAULT_OUTPUT_CAP, &clock);
    assert_eq!(reply.document_trace_output.as_deref(), Some("Command msg-target cancelled"));
}

#[test]
fn reply_serializes_to_json() {
    let doc = doc_with_steps(vec![step_with_output("step:0", "ok", "")]);
    let clock = FakeClock::new();
    let reply = build_full_reply(&doc, "i-instance", DEFAULT_OUTPUT_CAP, &clock);
    let json = serde_json::to_string(&reply).unwrap();
    assert!(json.contains("\"run_id\":\"doc-abc\""));
}
