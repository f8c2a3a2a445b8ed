// SPDX-License-Identifier: MIT

//! The core state machine (spec §4.I): reconciles persisted state on
//! startup, then polls a transport in a loop, routing each message to the
//! send or cancel pool and reporting results back through the transport.

use crate::config::Config;
use crate::platform;
use crate::topic::{self, Route};
use dproc_core::{CancelInfo, CancelToken, Document, DocumentKind, Status};
use dproc_executor::Executor;
use dproc_pool::WorkerPool;
use dproc_registry::PluginRegistry;
use dproc_reply::build_full_reply;
use dproc_store::{DocumentStore, Folder, StoreError};
use dproc_transport::{FailKind, Message, MessageTransport, OfflineSource, SharedTransport, StopPolicy};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Notify};

/// One representative kind per on-disk area, used to enumerate Current/Pending
/// on startup. `DocumentStore::list`/`load` only use the kind to resolve which
/// area (`documents/` vs `session/`) a document lives under, never to filter
/// within an area, so scanning once per area and dispatching on each loaded
/// document's own `kind` field covers every kind without re-processing the
/// same files once per kind that shares an area. Cancel documents never land
/// in the store: they're handled entirely within one poll tick.
const RESUMABLE_AREAS: [DocumentKind; 2] = [DocumentKind::SendCommand, DocumentKind::StartSession];

pub struct Processor {
    config: Config,
    store: Arc<DocumentStore>,
    send_pool: Arc<WorkerPool>,
    cancel_pool: Arc<WorkerPool>,
    executor: Arc<Executor>,
    transport: SharedTransport,
    offline: Option<Arc<OfflineSource>>,
    stop_policy: StopPolicy<dproc_core::SystemClock>,
    clock: dproc_core::SystemClock,
    skip_wait: Arc<Notify>,
    reply_tx: mpsc::UnboundedSender<(String, String)>,
}

impl Processor {
    pub fn new(config: Config, transport: SharedTransport, registry: Arc<PluginRegistry>) -> Self {
        let store = Arc::new(DocumentStore::new(config.orchestration_root_dir.clone(), config.instance_id.clone()));
        let send_pool = Arc::new(WorkerPool::send_pool(config.send_pool_concurrency));
        let cancel_pool = Arc::new(WorkerPool::cancel_pool());
        let executor = Arc::new(Executor::new(registry));
        let offline = config.offline_root.as_ref().and_then(|root| match OfflineSource::new(root.as_path()) {
            Ok(source) => Some(Arc::new(source)),
            Err(err) => {
                tracing::warn!(error = %err, "failed to open offline source");
                None
            }
        });
        let stop_policy = StopPolicy::with_defaults(dproc_core::SystemClock);

        let (reply_tx, reply_rx) = mpsc::unbounded_channel();
        spawn_reply_forwarder(reply_rx, transport.clone());

        Self {
            config,
            store,
            send_pool,
            cancel_pool,
            executor,
            transport,
            offline,
            stop_policy,
            clock: dproc_core::SystemClock,
            skip_wait: Arc::new(Notify::new()),
            reply_tx,
        }
    }

    /// Let an external caller wake the poll loop immediately instead of
    /// waiting out its idle sleep.
    pub fn wake(&self) {
        self.skip_wait.notify_one();
    }

    /// Resume everything left in Current or Pending from a prior run.
    /// Current is scanned first: those documents were already dispatched.
    pub async fn reconcile(&self) {
        for area_kind in RESUMABLE_AREAS {
            for id in self.store.list(Folder::Current, area_kind) {
                self.store.resolve_duplicate(&id, area_kind);
                match self.store.load(&id, area_kind, Folder::Current) {
                    Ok(doc) => self.dispatch_to_current(doc).await,
                    Err(StoreError::Corrupt { .. }) => {}
                    Err(err) => tracing::warn!(document_id = %id, error = %err, "failed to load document during reconciliation"),
                }
            }
            for id in self.store.list(Folder::Pending, area_kind) {
                match self.store.load(&id, area_kind, Folder::Pending) {
                    Ok(doc) => self.dispatch_pending(doc).await,
                    Err(StoreError::Corrupt { .. }) => {}
                    Err(err) => tracing::warn!(document_id = %id, error = %err, "failed to load document during reconciliation"),
                }
            }
        }
    }

    /// Run the poll loop until `shutdown` fires, then drain both pools.
    pub async fn run(&self, shutdown: CancelToken) {
        self.reconcile().await;

        loop {
            if shutdown.is_canceled() {
                break;
            }
            let processed = self.tick().await;
            if shutdown.is_canceled() {
                break;
            }
            if processed == 0 {
                let sleep_for = random_between(self.config.poll_min_sleep, self.config.poll_max_sleep);
                tokio::select! {
                    _ = shutdown.canceled() => break,
                    _ = self.skip_wait.notified() => {}
                    _ = tokio::time::sleep(sleep_for) => {}
                }
            }
        }

        let send_report = self.send_pool.shutdown_and_wait(self.config.stop_timeout).await;
        let cancel_report = self.cancel_pool.shutdown_and_wait(self.config.stop_timeout).await;
        if !send_report.is_clean() || !cancel_report.is_clean() {
            tracing::warn!(
                send_timed_out = send_report.timed_out.len(),
                cancel_timed_out = cancel_report.timed_out.len(),
                "shutdown grace period elapsed with jobs still in flight"
            );
        }
        self.transport.stop().await;
    }

    /// One poll: gate on health, pull messages from the primary transport
    /// and any offline source, route each. Returns how many were processed
    /// (used to decide whether to skip the idle sleep).
    async fn tick(&self) -> usize {
        if !self.stop_policy.is_healthy() {
            return 0;
        }

        let mut messages = match self.transport.get_messages().await {
            Ok(messages) => {
                self.stop_policy.record_success();
                messages
            }
            Err(err) => {
                tracing::warn!(error = %err, "transport get_messages failed");
                self.stop_policy.record_error();
                Vec::new()
            }
        };

        if let Some(offline) = &self.offline {
            match offline.get_messages().await {
                Ok(more) => messages.extend(more),
                Err(err) => tracing::warn!(error = %err, "offline source scan failed"),
            }
        }

        let count = messages.len();
        for message in messages {
            self.dispatch(message).await;
        }
        count
    }

    async fn dispatch(&self, message: Message) {
        match topic::route(&message.topic) {
            Some(Route::Send { .. }) => self.handle_send(message).await,
            Some(Route::Cancel { .. }) => self.handle_cancel(message).await,
            None => {
                tracing::warn!(topic = %message.topic, message_id = %message.message_id, "unrecognized topic");
                let _ = self.transport.fail_message(&message.message_id, FailKind::InternalHandlerException).await;
            }
        }
    }

    async fn handle_send(&self, message: Message) {
        let doc: Document = match serde_json::from_str(&message.payload) {
            Ok(doc) => doc,
            Err(err) => {
                tracing::warn!(message_id = %message.message_id, error = %err, "failed to parse document");
                let _ = self.transport.fail_message(&message.message_id, FailKind::InternalHandlerException).await;
                return;
            }
        };
        if let Err(err) = self.transport.acknowledge_message(&message.message_id).await {
            tracing::warn!(message_id = %message.message_id, error = %err, "failed to acknowledge message");
        }
        if let Err(err) = self.store.persist(&doc, Folder::Pending) {
            tracing::error!(error = %err, "failed to persist incoming document to pending");
            return;
        }
        self.dispatch_pending(doc).await;
        self.wake();
    }

    async fn handle_cancel(&self, message: Message) {
        let doc: Document = match serde_json::from_str(&message.payload) {
            Ok(doc) => doc,
            Err(err) => {
                tracing::warn!(message_id = %message.message_id, error = %err, "failed to parse cancel document");
                let _ = self.transport.fail_message(&message.message_id, FailKind::InternalHandlerException).await;
                return;
            }
        };
        let Some(cancel_info) = doc.cancel_info.clone() else {
            tracing::warn!(message_id = %message.message_id, "cancel document missing cancelInfo");
            let _ = self.transport.fail_message(&message.message_id, FailKind::InternalHandlerException).await;
            return;
        };

        let _ = self.transport.acknowledge_message(&message.message_id).await;
        let send_pool = Arc::clone(&self.send_pool);
        let transport = self.transport.clone();
        let message_id = message.message_id.clone();
        let config = self.config.clone();
        let clock = self.clock.clone();
        let result = self.cancel_pool.submit(message.message_id.clone(), move |_cancel| async move {
            let mut doc = doc;
            let cancelled = send_pool.cancel(&cancel_info.target_message_id);
            let (status, debug_info) = if cancelled {
                (Status::Success, format!("Command {} cancelled", cancel_info.target_message_id))
            } else {
                (Status::Failed, format!("Command {} already completed", cancel_info.target_message_id))
            };
            doc.status = Some(status);
            doc.cancel_info = Some(CancelInfo { target_message_id: cancel_info.target_message_id, debug_info: Some(debug_info) });

            let reply = build_full_reply(&doc, &config.instance_id, config.output_truncate_cap, &clock);
            let json = serde_json::to_string(&reply).unwrap_or_else(|_| "{}".to_string());
            let _ = transport.send_reply(&message_id, &json).await;
            let _ = transport.delete_message(&message_id).await;
        });
        if result.is_err() {
            tracing::warn!(message_id = %message.message_id, "cancel pool rejected job (duplicate or shutting down)");
        }
    }

    async fn dispatch_pending(&self, doc: Document) {
        let kind = doc.kind;
        self.store.move_doc(&doc.document_id, kind, Folder::Pending, Folder::Current);
        self.dispatch_to_current(doc).await;
    }

    /// `run_count` is incremented on every dispatch to Current, whether that's
    /// a document's first run out of Pending or a resume from a prior crash
    /// (spec's unified reading of its own retry-counting Open Question).
    async fn dispatch_to_current(&self, mut doc: Document) {
        doc.run_count += 1;
        if doc.run_count > self.config.max_retry {
            tracing::warn!(document_id = %doc.document_id, run_count = doc.run_count, "giving up on document after max retries");
            if doc.status.map(|s| !s.is_terminal()).unwrap_or(true) {
                doc.status = Some(Status::Failed);
            }
            let _ = self.store.persist(&doc, Folder::Current);
            self.finish_and_report(doc, Folder::Current).await;
            return;
        }
        if let Err(err) = self.store.persist(&doc, Folder::Current) {
            tracing::error!(error = %err, "failed to persist document before dispatch");
            return;
        }
        self.run_in_pool(doc, Folder::Current).await;
    }

    /// Submit a document to the send pool: run every step, then either leave
    /// it in Current (awaiting reboot) or hand off to [`Self::finish_and_report`].
    async fn run_in_pool(&self, doc: Document, folder: Folder) {
        let store = Arc::clone(&self.store);
        let executor = Arc::clone(&self.executor);
        let platform = platform::detect();
        let reply_tx = self.reply_tx.clone();
        let transport = self.transport.clone();
        let message_id = doc.message_id.clone();
        let job_id = doc.message_id.clone();
        let document_id_for_log = doc.document_id.clone();
        let config = self.config.clone();
        let clock = self.clock.clone();

        let result = self.send_pool.submit(job_id, move |cancel| async move {
            let mut doc = doc;
            let report_message_id = message_id.clone();
            executor
                .run_document(&store, &mut doc, folder, &cancel, &platform, move |step_id, result| {
                    let payload = serde_json::json!({
                        "messageId": report_message_id,
                        "stepId": step_id,
                        "status": result.status.to_string(),
                        "code": result.code,
                    });
                    let _ = reply_tx.send((report_message_id.clone(), payload.to_string()));
                })
                .await;

            if doc.awaits_reboot() {
                tracing::info!(document_id = %doc.document_id, "document awaits reboot, remaining in current");
                return;
            }

            store.move_doc(&doc.document_id, doc.kind, folder, Folder::Completed);
            let reply = build_full_reply(&doc, &config.instance_id, config.output_truncate_cap, &clock);
            let json = serde_json::to_string(&reply).unwrap_or_else(|_| "{}".to_string());
            let _ = transport.send_reply(&message_id, &json).await;
            let _ = transport.delete_message(&message_id).await;
        });

        if result.is_err() {
            tracing::warn!(document_id = %document_id_for_log, "send pool rejected job (duplicate or shutting down)");
        }
    }

    /// Move an already-terminal document straight to Completed and send its
    /// final reply, bypassing the send pool. Used when reconciliation gives
    /// up on a document without re-running it.
    async fn finish_and_report(&self, doc: Document, folder: Folder) {
        let message_id = doc.message_id.clone();
        self.store.move_doc(&doc.document_id, doc.kind, folder, Folder::Completed);
        let reply = build_full_reply(&doc, &self.config.instance_id, self.config.output_truncate_cap, &self.clock);
        let json = serde_json::to_string(&reply).unwrap_or_else(|_| "{}".to_string());
        let _ = self.transport.send_reply(&message_id, &json).await;
        let _ = self.transport.delete_message(&message_id).await;
    }
}

fn random_between(min: Duration, max: Duration) -> Duration {
    if max <= min {
        return min;
    }
    let span = (max - min).as_millis() as u64;
    let offset = rand::thread_rng().gen_range(0..=span);
    min + Duration::from_millis(offset)
}

fn spawn_reply_forwarder(mut rx: mpsc::UnboundedReceiver<(String, String)>, transport: SharedTransport) {
    tokio::spawn(async move {
        while let Some((message_id, payload)) = rx.recv().await {
            if let Err(err) = transport.send_reply(&message_id, &payload).await {
                tracing::warn!(message_id = %message_id, error = %err, "failed to forward incremental reply");
            }
        }
    });
}

#[cfg(test)]
#[path = "processor_tests.rs"]
mod tests;
