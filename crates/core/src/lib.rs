// SPDX-License-Identifier: MIT

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! dproc-core: shared data model and primitives for the document processor.
//!
//! Types here have no I/O of their own; they're the vocabulary the other
//! crates (`dproc-store`, `dproc-pool`, `dproc-executor`, ...) build on.

pub mod cancel;
pub mod clock;
pub mod document;
pub mod exit_code;
pub mod id;
pub mod macros;
pub mod status;

pub use cancel::{CancelReason, CancelToken};
pub use clock::{Clock, FakeClock, SystemClock};
pub use document::{
    clamp_step_timeout, parse_schema_version, CancelInfo, Document, DocumentId, DocumentKind,
    IoConfig, OnFailure, PluginResult, PluginStep, Precondition, S3Location, StepConfiguration,
    DEFAULT_STEP_TIMEOUT_SECONDS, MAX_STEP_TIMEOUT_SECONDS, MIN_STEP_TIMEOUT_SECONDS,
};
pub use exit_code::status_for_exit;
pub use id::short;
pub use status::{aggregate, merge, MaybeStatus, Status};
