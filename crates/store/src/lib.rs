// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Crash-safe document persistence across the Pending / Current / Completed /
//! Corrupt folder lifecycle.
//!
//! Layout: `<root>/<instanceId>/<area>/state/<folder>/<docId>`, where `<area>`
//! is `documents` for every kind except `StartSession`/`TerminateSession`,
//! which get their own parallel `session` tree. Files are named by
//! `DocumentID` alone, no extension. Every write goes to a `.tmp` sibling and
//! is `rename`d into place, so a crash mid-write never leaves a
//! partially-written document file — the same idiom the host agent uses for
//! its own crash markers.

use dproc_core::{Document, DocumentId, DocumentKind};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error at {path}: {source}")]
    Io { path: PathBuf, #[source] source: std::io::Error },
    #[error("document {id} not found in {folder:?}")]
    NotFound { id: DocumentId, folder: Folder },
    #[error("document {id} is corrupt and has been quarantined: {source}")]
    Corrupt { id: String, #[source] source: serde_json::Error },
}

/// One of the four lifecycle folders a document can live in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Folder {
    Pending,
    Current,
    Completed,
    Corrupt,
}

impl Folder {
    fn dirname(self) -> &'static str {
        match self {
            Folder::Pending => "pending",
            Folder::Current => "current",
            Folder::Completed => "completed",
            Folder::Corrupt => "corrupt",
        }
    }

    pub const ALL: [Folder; 4] = [Folder::Pending, Folder::Current, Folder::Completed, Folder::Corrupt];
}

/// The two parallel top-level trees spec §6 lays out: every kind lives under
/// `documents/`, except session lifecycle documents, which get their own
/// `session/` tree (same four lifecycle folders underneath).
fn area_dirname(kind: DocumentKind) -> &'static str {
    match kind {
        DocumentKind::StartSession | DocumentKind::TerminateSession => "session",
        _ => "documents",
    }
}

/// Crash-safe per-document file store, rooted at one instance's state tree.
pub struct DocumentStore {
    root: PathBuf,
    instance_id: String,
}

impl DocumentStore {
    pub fn new(root: impl Into<PathBuf>, instance_id: impl Into<String>) -> Self {
        Self { root: root.into(), instance_id: instance_id.into() }
    }

    fn folder_dir(&self, folder: Folder, kind: DocumentKind) -> PathBuf {
        self.root.join(&self.instance_id).join(area_dirname(kind)).join("state").join(folder.dirname())
    }

    fn doc_path(&self, folder: Folder, kind: DocumentKind, id: &DocumentId) -> PathBuf {
        self.folder_dir(folder, kind).join(id.as_str())
    }

    fn tmp_path(&self, folder: Folder, kind: DocumentKind, id: &DocumentId) -> PathBuf {
        self.folder_dir(folder, kind).join(format!("{}.tmp", id.as_str()))
    }

    fn io_err(path: &Path, source: std::io::Error) -> StoreError {
        StoreError::Io { path: path.to_path_buf(), source }
    }

    /// Write `doc` into `folder`, replacing any existing file for the same ID.
    ///
    /// Atomic: the document is written to a `.tmp` sibling first, then
    /// `rename`d into place, so a crash mid-write never corrupts the live file.
    pub fn persist(&self, doc: &Document, folder: Folder) -> Result<(), StoreError> {
        let dir = self.folder_dir(folder, doc.kind);
        let path = self.doc_path(folder, doc.kind, &doc.document_id);
        let tmp_path = self.tmp_path(folder, doc.kind, &doc.document_id);

        fs::create_dir_all(&dir).map_err(|e| Self::io_err(&dir, e))?;
        let json = serde_json::to_vec_pretty(doc).expect("Document serialization is infallible");
        fs::write(&tmp_path, &json).map_err(|e| Self::io_err(&tmp_path, e))?;
        fs::rename(&tmp_path, &path).map_err(|e| Self::io_err(&path, e))?;
        Ok(())
    }

    /// Read a document out of `folder`. A file that fails to deserialize is
    /// moved into [`Folder::Corrupt`] and `Err(StoreError::Corrupt)` is
    /// returned; it will not be retried from its original folder again.
    pub fn load(&self, id: &DocumentId, kind: DocumentKind, folder: Folder) -> Result<Document, StoreError> {
        let path = self.doc_path(folder, kind, id);
        let bytes = fs::read(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StoreError::NotFound { id: id.clone(), folder }
            } else {
                Self::io_err(&path, e)
            }
        })?;

        match serde_json::from_slice::<Document>(&bytes) {
            Ok(doc) => Ok(doc),
            Err(source) => {
                self.quarantine(id, kind, folder, &bytes);
                Err(StoreError::Corrupt { id: id.to_string(), source })
            }
        }
    }

    fn quarantine(&self, id: &DocumentId, kind: DocumentKind, folder: Folder, bytes: &[u8]) {
        let dest_dir = self.folder_dir(Folder::Corrupt, kind);
        let dest = self.doc_path(Folder::Corrupt, kind, id);
        if let Err(e) = fs::create_dir_all(&dest_dir).and_then(|_| fs::write(&dest, bytes)) {
            tracing::warn!(document_id = %id, error = %e, "failed to quarantine corrupt document");
        }
        let src = self.doc_path(folder, kind, id);
        if let Err(e) = fs::remove_file(&src) {
            tracing::warn!(document_id = %id, error = %e, "failed to remove corrupt document from source folder");
        }
    }

    /// Move a document's file from `src` to `dst`. Per spec, a failure here
    /// is logged and swallowed rather than propagated: it must never block
    /// the processor's forward progress.
    pub fn move_doc(&self, id: &DocumentId, kind: DocumentKind, src: Folder, dst: Folder) {
        let src_path = self.doc_path(src, kind, id);
        let dst_path = self.doc_path(dst, kind, id);
        let dst_dir = self.folder_dir(dst, kind);
        if let Err(e) = fs::create_dir_all(&dst_dir).and_then(|_| fs::rename(&src_path, &dst_path)) {
            tracing::warn!(document_id = %id, from = ?src, to = ?dst, error = %e, "failed to move document");
        }
    }

    /// List the document IDs present in `folder` for the given kind.
    /// Order is a deterministic lexicographic sort of filenames, not
    /// necessarily creation order.
    pub fn list(&self, folder: Folder, kind: DocumentKind) -> Vec<DocumentId> {
        let dir = self.folder_dir(folder, kind);
        let mut ids: Vec<DocumentId> = match fs::read_dir(&dir) {
            Ok(entries) => entries
                .flatten()
                .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
                .filter_map(|entry| {
                    let name = entry.file_name();
                    let name = name.to_str()?;
                    if name.ends_with(".tmp") {
                        return None;
                    }
                    Some(DocumentId::from_string(name))
                })
                .collect(),
            Err(_) => Vec::new(),
        };
        ids.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        ids
    }

    /// Load, apply `patch`, and persist back to the same folder.
    pub fn update<F>(&self, id: &DocumentId, kind: DocumentKind, folder: Folder, patch: F) -> Result<Document, StoreError>
    where
        F: FnOnce(&mut Document),
    {
        let mut doc = self.load(id, kind, folder)?;
        patch(&mut doc);
        self.persist(&doc, folder)?;
        Ok(doc)
    }

    /// Enforce the exactly-one-folder invariant for a document ID that may
    /// have landed in both Current and Pending across a crash: Current wins,
    /// the Pending copy (if any) is deleted.
    pub fn resolve_duplicate(&self, id: &DocumentId, kind: DocumentKind) {
        let current_path = self.doc_path(Folder::Current, kind, id);
        let pending_path = self.doc_path(Folder::Pending, kind, id);
        if current_path.exists() && pending_path.exists() {
            if let Err(e) = fs::remove_file(&pending_path) {
                tracing::warn!(document_id = %id, error = %e, "failed to drop duplicate pending copy");
            }
        }
    }
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
