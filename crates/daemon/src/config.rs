// SPDX-License-Identifier: MIT

//! Centralized environment variable access for the daemon crate, mirroring
//! the spec's `Mds.*`/`Ssm.*`/`Agent.*` option names (§6) as
//! `DPROC_*`-prefixed environment variables.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not determine a home directory to derive a default orchestration root; set DPROC_ORCHESTRATION_ROOT_DIR")]
    NoOrchestrationRoot,
    #[error("DPROC_INSTANCE_ID must be set")]
    MissingInstanceId,
}

/// Runtime configuration for one processor instance, resolved once at
/// startup from environment variables (falling back to the spec's stated
/// defaults).
#[derive(Debug, Clone)]
pub struct Config {
    pub instance_id: String,
    pub orchestration_root_dir: PathBuf,
    pub send_pool_concurrency: usize,
    pub max_retry: u32,
    pub stop_timeout: Duration,
    pub association_frequency: Duration,
    pub output_truncate_cap: usize,
    pub offline_root: Option<PathBuf>,
    pub poll_min_sleep: Duration,
    pub poll_max_sleep: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            instance_id: instance_id()?,
            orchestration_root_dir: orchestration_root_dir()?,
            send_pool_concurrency: command_workers_limit(),
            max_retry: command_retry_limit(),
            stop_timeout: stop_timeout_millis(),
            association_frequency: association_frequency_minutes(),
            output_truncate_cap: dproc_reply::DEFAULT_OUTPUT_CAP,
            offline_root: offline_root(),
            poll_min_sleep: Duration::from_millis(2000),
            poll_max_sleep: Duration::from_millis(2500),
        })
    }
}

fn instance_id() -> Result<String, ConfigError> {
    std::env::var("DPROC_INSTANCE_ID").map_err(|_| ConfigError::MissingInstanceId)
}

/// `Agent.OrchestrationRootDir`: `DPROC_ORCHESTRATION_ROOT_DIR` >
/// `<state dir>/dproc`.
fn orchestration_root_dir() -> Result<PathBuf, ConfigError> {
    if let Ok(dir) = std::env::var("DPROC_ORCHESTRATION_ROOT_DIR") {
        return Ok(PathBuf::from(dir));
    }
    dirs::state_dir()
        .or_else(dirs::data_local_dir)
        .map(|dir| dir.join("dproc"))
        .ok_or(ConfigError::NoOrchestrationRoot)
}

/// `Mds.CommandWorkersLimit`: default matches
/// [`dproc_pool::DEFAULT_SEND_POOL_CONCURRENCY`].
fn command_workers_limit() -> usize {
    std::env::var("DPROC_COMMAND_WORKERS_LIMIT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(dproc_pool::DEFAULT_SEND_POOL_CONCURRENCY)
}

/// `Mds.CommandRetryLimit`: how many times a document may be reconciled out
/// of Current before it's given up on as Failed.
fn command_retry_limit() -> u32 {
    std::env::var("DPROC_COMMAND_RETRY_LIMIT").ok().and_then(|v| v.parse().ok()).unwrap_or(3)
}

/// `Mds.StopTimeoutMillis`: grace period `shutdown_and_wait` gives in-flight
/// documents before reporting them as not cleanly drained.
fn stop_timeout_millis() -> Duration {
    std::env::var("DPROC_STOP_TIMEOUT_MS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(Duration::from_secs(30))
}

/// `Ssm.AssociationFrequencyMinutes`: how often association documents are
/// reissued. Association scheduling itself is out of scope (§ Non-goals);
/// this is carried so config round-trips the option, as the spec requires
/// every `Mds.*`/`Ssm.*` name to resolve to something even when the feature
/// behind it isn't implemented yet.
fn association_frequency_minutes() -> Duration {
    let minutes = std::env::var("DPROC_ASSOCIATION_FREQUENCY_MINUTES")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(30);
    Duration::from_secs(minutes * 60)
}

/// When set, the processor also polls a [`dproc_transport::OfflineSource`]
/// rooted here in addition to its primary transport (§4.K).
fn offline_root() -> Option<PathBuf> {
    std::env::var("DPROC_OFFLINE_ROOT").ok().map(PathBuf::from)
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
