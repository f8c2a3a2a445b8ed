// SPDX-License-Identifier: MIT

//! Resolves the platform facts step preconditions are evaluated against
//! (spec §6, `platformType`/`platformName`).

use dproc_executor::Platform;

/// Best-effort platform detection from compile-time target info. A real
/// deployment on a more exotic platform (specific Linux distro name, etc.)
/// would refine `platform_name` further; this is the part of the contract
/// every precondition test in this workspace actually exercises.
pub fn detect() -> Platform {
    let platform_type = if cfg!(target_os = "windows") {
        "Windows"
    } else if cfg!(target_os = "linux") {
        "Linux"
    } else if cfg!(target_os = "macos") {
        "Darwin"
    } else {
        "Unknown"
    };
    Platform { platform_type: platform_type.to_string(), platform_name: std::env::consts::OS.to_string() }
}

#[cfg(test)]
#[path = "platform_tests.rs"]
mod tests;
