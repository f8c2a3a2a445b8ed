// SPDX-License-Identifier: MIT

//! Exit-code-to-[`Status`] mapping for plugins that wrap a subprocess
//! (spec §6, "Exit codes"). The executor itself never calls this — it runs
//! against the injected [`crate::Status`] a `Plugin` impl already returned —
//! this is the table a subprocess-backed `Plugin` implementation consults to
//! produce that `PluginResult` in the first place.

use crate::Status;

/// Deliberate, agent-recognized "I succeeded" signal a plugin script can
/// return instead of `0`.
pub const EXIT_CODE_SUCCESS_ALT: i32 = 168;
/// Deliberate "I failed" signal, distinguished from an unhandled crash.
pub const EXIT_CODE_FAILURE_ALT: i32 = 169;
/// POSIX "killed by SIGKILL" convention (128 + signal 9).
pub const EXIT_CODE_KILLED_UNIX: i32 = 137;
/// Windows convention for a process terminated by the OS rather than exiting on its own.
pub const EXIT_CODE_KILLED_WINDOWS: i32 = -1;

/// Platform reboot exit codes that signal "succeeded, but the host must
/// reboot before the next step can run".
pub const REBOOT_EXIT_CODES: [i32; 2] = [3010, 194];

/// Map a subprocess exit code to the step status and code that should be
/// recorded against it, given how the step's cancel token resolved.
///
/// `was_cancelled` / `was_timed_out` take precedence over the raw exit code
/// because a killed-by-us process often also reports 137/-1, and the
/// distinction ("we killed it" vs "it died on its own") only the caller
/// that owns the cancel token can make.
pub fn status_for_exit(code: i32, was_cancelled: bool, was_timed_out: bool) -> (Status, i32) {
    if was_timed_out {
        return (Status::TimedOut, code);
    }
    if was_cancelled {
        return (Status::Cancelled, code);
    }
    match code {
        0 => (Status::Success, code),
        EXIT_CODE_SUCCESS_ALT => (Status::Success, 0),
        EXIT_CODE_FAILURE_ALT => (Status::Failed, code),
        c if REBOOT_EXIT_CODES.contains(&c) => (Status::SuccessAndReboot, 0),
        EXIT_CODE_KILLED_UNIX | EXIT_CODE_KILLED_WINDOWS => (Status::Failed, code),
        c => (Status::Failed, c),
    }
}

#[cfg(test)]
#[path = "exit_code_tests.rs"]
mod tests;
