// SPDX-License-Identifier: MIT

use super::*;

fn step(id: &str, status: Status) -> PluginStep {
    let mut step = PluginStep::new(id, "aws:runShellScript", StepConfiguration::default());
    step.has_executed = true;
    step.result.status = status;
    step
}

#[test]
fn document_kind_routes_cancel_variants() {
    assert!(DocumentKind::CancelCommand.is_cancel());
    assert!(DocumentKind::CancelCommandOffline.is_cancel());
    assert!(!DocumentKind::SendCommand.is_cancel());
    assert!(!DocumentKind::Association.is_cancel());
}

#[test]
fn on_failure_default_is_exit() {
    assert_eq!(OnFailure::default(), OnFailure::Exit);
    assert!(OnFailure::Exit.is_terminator());
    assert!(OnFailure::SuccessAndExit.is_terminator());
    assert!(!OnFailure::Continue.is_terminator());
}

#[test]
fn clamp_step_timeout_respects_bounds() {
    assert_eq!(clamp_step_timeout(0), MIN_STEP_TIMEOUT_SECONDS);
    assert_eq!(clamp_step_timeout(1_000_000), MAX_STEP_TIMEOUT_SECONDS);
    assert_eq!(clamp_step_timeout(60), 60);
}

#[test]
fn precondition_matches_platform_type() {
    let p = Precondition::new("platformType", "Linux");
    assert!(p.is_satisfied("Linux", "Amazon Linux"));
    assert!(!p.is_satisfied("Windows", "Amazon Linux"));
}

#[test]
fn precondition_matches_platform_name() {
    let p = Precondition::new("platformName", "Ubuntu");
    assert!(p.is_satisfied("Linux", "Ubuntu"));
    assert!(!p.is_satisfied("Linux", "Amazon Linux"));
}

#[test]
fn preconditions_apply_only_from_schema_2_2() {
    assert!(!PluginStep::preconditions_apply("2.0"));
    assert!(!PluginStep::preconditions_apply("2.1"));
    assert!(PluginStep::preconditions_apply("2.2"));
    assert!(PluginStep::preconditions_apply("2.3"));
    assert!(PluginStep::preconditions_apply("3.0"));
    assert!(!PluginStep::preconditions_apply("garbage"));
}

#[test]
fn new_step_is_not_started_and_upholds_invariant() {
    let step = PluginStep::new("step:0", "aws:runShellScript", StepConfiguration::default());
    assert!(!step.has_executed);
    assert_eq!(step.result.status, Status::NotStarted);
    assert!(step.upholds_execution_invariant());
}

#[test]
fn executed_step_without_status_change_violates_invariant() {
    let mut step = PluginStep::new("step:0", "aws:runShellScript", StepConfiguration::default());
    step.has_executed = true;
    assert!(!step.upholds_execution_invariant());
}

fn sample_document(steps: Vec<PluginStep>) -> Document {
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
        status: None,
        parameters: HashMap::new(),
        reboot_history: None,
    }
}

#[test]
fn recompute_status_aggregates_steps() {
    let mut doc = sample_document(vec![step("step:0", Status::Success), step("step:1", Status::Failed)]);
    doc.recompute_status();
    assert_eq!(doc.status, Some(Status::Failed));
}

#[test]
fn recompute_status_empty_steps_is_none() {
    let mut doc = sample_document(vec![]);
    doc.recompute_status();
    assert_eq!(doc.status, None);
    assert!(!doc.is_complete());
}

#[test]
fn is_complete_true_for_terminal_non_reboot() {
    let mut doc = sample_document(vec![step("step:0", Status::Success)]);
    doc.recompute_status();
    assert!(doc.is_complete());
}

#[test]
fn is_complete_false_while_awaiting_reboot() {
    let mut doc = sample_document(vec![step("step:0", Status::SuccessAndReboot)]);
    doc.recompute_status();
    assert!(!doc.is_complete());
    assert!(doc.awaits_reboot());
}

#[test]
fn recompute_status_keeps_reboot_history_after_downgrade_resumes_to_success() {
    let mut doc = sample_document(vec![step("step:0", Status::Success), step("step:1", Status::Success)]);
    doc.remember_reboot(Status::SuccessAndReboot);
    doc.recompute_status();
    assert_eq!(doc.status, Some(Status::SuccessAndReboot));
    assert!(doc.is_complete());
}

#[test]
fn remember_reboot_keeps_the_higher_ranked_status() {
    let mut doc = sample_document(vec![]);
    doc.remember_reboot(Status::SuccessAndReboot);
    doc.remember_reboot(Status::PassedAndReboot);
    assert_eq!(doc.reboot_history, Some(Status::PassedAndReboot));
}

#[test]
fn step_mut_finds_by_id() {
    let mut doc = sample_document(vec![step("step:0", Status::Success), step("step:1", Status::NotStarted)]);
    let found = doc.step_mut("step:1").expect("step:1 present");
    found.result.status = Status::InProgress;
    assert_eq!(doc.steps[1].result.status, Status::InProgress);
    assert!(doc.step_mut("step:missing").is_none());
}

#[test]
fn parse_schema_version_rejects_malformed() {
    assert_eq!(parse_schema_version("2.2"), Some((2, 2)));
    assert_eq!(parse_schema_version("not-a-version"), None);
    assert_eq!(parse_schema_version("2"), None);
}
