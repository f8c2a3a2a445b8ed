// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Wires the document store, plugin registry, worker pools, and a message
//! transport into the poll loop that is this agent's command-execution core.

pub mod config;
pub mod platform;
pub mod processor;
pub mod topic;

pub use config::{Config, ConfigError};
pub use processor::Processor;
