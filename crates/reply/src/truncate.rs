// SPDX-License-Identifier: MIT

//! Output truncation: combine stdout/stderr into one string that never
//! exceeds a byte cap, per spec §4.H.

pub const DEFAULT_OUTPUT_CAP: usize = 2400;

const ERROR_HEADER: &str = "\n----------ERROR-------\n";
const OUTPUT_TRUNCATED_SUFFIX: &str = "\n---Output truncated---";
const ERROR_TRUNCATED_SUFFIX: &str = "\n---Error truncated----";

/// Truncate `s` to at most `max_bytes`, backing off to the nearest earlier
/// UTF-8 char boundary so the result is always valid `str`.
fn byte_safe_truncate(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Combine `stdout` and `stderr` into one string of length `<= cap` bytes.
///
/// Rule order, per spec §4.H:
/// 1. If both fit verbatim (plus the error header when `stderr` is
///    non-empty), concatenate as-is.
/// 2. If both halves individually exceed `cap/2`, truncate each to an even
///    share of the remaining budget.
/// 3. Otherwise the shorter side is kept whole and the longer side is
///    truncated to whatever budget remains.
pub fn truncate(stdout: &str, stderr: &str, cap: usize) -> String {
    let has_stderr = !stderr.is_empty();
    let header = if has_stderr { ERROR_HEADER } else { "" };

    if stdout.len() + stderr.len() + header.len() < cap {
        let whole = if has_stderr { format!("{stdout}{header}{stderr}") } else { stdout.to_string() };
        return clamp(whole, cap);
    }

    if !has_stderr {
        let budget = cap.saturating_sub(OUTPUT_TRUNCATED_SUFFIX.len());
        let out = byte_safe_truncate(stdout, budget);
        return clamp(format!("{out}{OUTPUT_TRUNCATED_SUFFIX}"), cap);
    }

    let half_cap = cap / 2;
    if stdout.len() > half_cap && stderr.len() > half_cap {
        let budget_each =
            cap.saturating_sub(header.len() + OUTPUT_TRUNCATED_SUFFIX.len() + ERROR_TRUNCATED_SUFFIX.len()) / 2;
        let out = byte_safe_truncate(stdout, budget_each);
        let err = byte_safe_truncate(stderr, budget_each);
        return clamp(format!("{out}{OUTPUT_TRUNCATED_SUFFIX}{header}{err}{ERROR_TRUNCATED_SUFFIX}"), cap);
    }

    if stdout.len() <= stderr.len() {
        let budget = cap.saturating_sub(header.len() + stdout.len() + ERROR_TRUNCATED_SUFFIX.len());
        let err = byte_safe_truncate(stderr, budget);
        clamp(format!("{stdout}{header}{err}{ERROR_TRUNCATED_SUFFIX}"), cap)
    } else {
        let budget = cap.saturating_sub(header.len() + stderr.len() + OUTPUT_TRUNCATED_SUFFIX.len());
        let out = byte_safe_truncate(stdout, budget);
        clamp(format!("{out}{OUTPUT_TRUNCATED_SUFFIX}{header}{stderr}"), cap)
    }
}

/// Last-resort bound: when `cap` is too small for even the header/suffix
/// overhead, the budget calculations above saturate to 0 but the overhead
/// text itself is still appended in full. Clamp to a prefix of whatever was
/// built so the `len() <= cap` guarantee holds unconditionally.
fn clamp(s: String, cap: usize) -> String {
    if s.len() <= cap {
        s
    } else {
        byte_safe_truncate(&s, cap).to_string()
    }
}

#[cfg(test)]
#[path = "truncate_tests.rs"]
mod tests;
