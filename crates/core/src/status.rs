// SPDX-License-Identifier: MIT

//! The status lattice shared by steps and documents, and the total order
//! used to merge a multiset of statuses into one aggregate.
//!
//! Replaces the "scan an ordered list to find the first match" idiom with an
//! explicit, unit-tested [`Status::rank`] total order (see
//! [`crate::simple_display!`] for the analogous pattern used elsewhere in
//! this crate for enum-to-string mappings).

use serde::{Deserialize, Serialize};

/// Status of a single step or of a whole document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum Status {
    NotStarted,
    InProgress,
    Skipped,
    Success,
    SuccessAndReboot,
    PassedAndReboot,
    Failed,
    Cancelled,
    TimedOut,
}

crate::simple_display! {
    Status {
        NotStarted => "NotStarted",
        InProgress => "InProgress",
        Skipped => "Skipped",
        Success => "Success",
        SuccessAndReboot => "SuccessAndReboot",
        PassedAndReboot => "PassedAndReboot",
        Failed => "Failed",
        Cancelled => "Cancelled",
        TimedOut => "TimedOut",
    }
}

impl Status {
    /// Rank in the fixed precedence order from spec §4.G. Larger wins a merge.
    ///
    /// ```text
    /// Skipped < Success < SuccessAndReboot < PassedAndReboot
    ///        < NotStarted < InProgress < Failed < Cancelled < TimedOut
    /// ```
    pub const fn rank(self) -> u8 {
        match self {
            Status::Skipped => 0,
            Status::Success => 1,
            Status::SuccessAndReboot => 2,
            Status::PassedAndReboot => 3,
            Status::NotStarted => 4,
            Status::InProgress => 5,
            Status::Failed => 6,
            Status::Cancelled => 7,
            Status::TimedOut => 8,
        }
    }

    /// Covers {Success, SuccessAndReboot, PassedAndReboot}.
    pub fn is_success(self) -> bool {
        matches!(self, Status::Success | Status::SuccessAndReboot | Status::PassedAndReboot)
    }

    /// Covers {SuccessAndReboot, PassedAndReboot}.
    pub fn is_reboot(self) -> bool {
        matches!(self, Status::SuccessAndReboot | Status::PassedAndReboot)
    }

    /// Statuses a document/step never transitions out of on its own.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Status::Success
                | Status::Failed
                | Status::Cancelled
                | Status::TimedOut
                | Status::Skipped
                | Status::SuccessAndReboot
                | Status::PassedAndReboot
        )
    }
}

/// An optional status, used for the empty operand of [`merge`].
///
/// `Merge` in spec §4.G treats the empty string as an identity element;
/// here that's modeled as `None` rather than overloading `Status` with an
/// unrepresentable variant.
pub type MaybeStatus = Option<Status>;

/// Merge two (possibly absent) statuses by precedence.
///
/// Commutative, associative, with identity `None` — pinned by property
/// tests in `status_tests.rs`.
pub fn merge(a: MaybeStatus, b: MaybeStatus) -> MaybeStatus {
    match (a, b) {
        (None, other) => other,
        (other, None) => other,
        (Some(a), Some(b)) => Some(if b.rank() > a.rank() { b } else { a }),
    }
}

/// Fold a sequence of statuses into one aggregate via repeated [`merge`].
///
/// Returns `None` for an empty sequence (a document with no steps has no
/// aggregate status yet).
pub fn aggregate<I: IntoIterator<Item = Status>>(statuses: I) -> MaybeStatus {
    statuses.into_iter().fold(None, |acc, s| merge(acc, Some(s)))
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
