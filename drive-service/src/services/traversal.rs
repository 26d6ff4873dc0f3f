//! Recursive fetch of Drive selections into local storage.
//!
//! Folders are expanded depth-first: a folder's children (all pages) are
//! processed before the folder's next sibling. Each item id is handled at most
//! once per run, which also stops folder cycles.

use std::collections::HashSet;

use thiserror::Error;

use crate::config::DriveSettings;
use crate::models::{DocumentDescriptor, FOLDER_MIME_TYPE, PDF_MIME_TYPE};
use crate::services::drive_client::{escape_query_value, DriveApi, DriveError, ListQuery};
use crate::services::metrics;
use crate::services::storage::{Storage, StorageError};

#[derive(Debug, Error)]
pub enum TraversalError {
    #[error("Drive call for {id} failed: {source}")]
    Drive {
        id: String,
        #[source]
        source: DriveError,
    },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// What to do with an item, decided by mime type alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Export,
    Descend,
    Download,
    Skip,
}

/// Which mime types are exported to PDF and which are downloaded as-is.
#[derive(Debug, Clone, Default)]
pub struct MimePolicy {
    export: HashSet<String>,
    allowed: HashSet<String>,
}

impl MimePolicy {
    pub fn new<E, A>(export: E, allowed: A) -> Self
    where
        E: IntoIterator,
        E::Item: Into<String>,
        A: IntoIterator,
        A::Item: Into<String>,
    {
        Self {
            export: export.into_iter().map(Into::into).collect(),
            allowed: allowed.into_iter().map(Into::into).collect(),
        }
    }

    pub fn from_settings(settings: &DriveSettings) -> Self {
        Self::new(
            settings.export_mime_types.iter().cloned(),
            settings.allowed_mime_types.iter().cloned(),
        )
    }

    /// Export beats folder beats allowed download.
    pub fn classify(&self, mime_type: &str) -> Action {
        if self.export.contains(mime_type) {
            Action::Export
        } else if mime_type == FOLDER_MIME_TYPE {
            Action::Descend
        } else if self.allowed.contains(mime_type) {
            Action::Download
        } else {
            Action::Skip
        }
    }

    pub fn allowed(&self) -> impl Iterator<Item = &str> {
        self.allowed.iter().map(String::as_str)
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FetchReport {
    /// Stored file names in the order they were written.
    pub downloaded: Vec<String>,
    pub exported: usize,
    pub folders: usize,
    pub skipped: usize,
}

/// `files.list` query for the non-trashed children of a folder.
pub fn children_query(folder_id: &str) -> String {
    format!(
        "'{}' in parents and trashed=false",
        escape_query_value(folder_id)
    )
}

/// List every child of `folder_id`, following page tokens to the end.
pub async fn list_children(
    drive: &dyn DriveApi,
    folder_id: &str,
) -> Result<Vec<DocumentDescriptor>, DriveError> {
    let q = children_query(folder_id);
    let mut children = Vec::new();
    let mut page_token: Option<String> = None;

    loop {
        let page = drive
            .list_files(&ListQuery::new(q.clone()).page_token(page_token.take()))
            .await?;
        children.extend(page.files);

        match page.next_page_token.filter(|token| !token.is_empty()) {
            Some(token) => page_token = Some(token),
            None => break,
        }
    }

    Ok(children)
}

pub struct Traversal<'a> {
    drive: &'a dyn DriveApi,
    storage: &'a dyn Storage,
    policy: &'a MimePolicy,
    visited: HashSet<String>,
    report: FetchReport,
}

impl<'a> Traversal<'a> {
    pub fn new(drive: &'a dyn DriveApi, storage: &'a dyn Storage, policy: &'a MimePolicy) -> Self {
        Self {
            drive,
            storage,
            policy,
            visited: HashSet::new(),
            report: FetchReport::default(),
        }
    }

    /// Fetch every selected item. The first provider or storage failure aborts.
    pub async fn run(mut self, docs: Vec<DocumentDescriptor>) -> Result<FetchReport, TraversalError> {
        // One iterator per open folder level; the top is the folder being walked.
        let mut stack = vec![docs.into_iter()];

        while let Some(level) = stack.last_mut() {
            let Some(item) = level.next() else {
                stack.pop();
                continue;
            };

            if let Some(children) = self.visit(item).await? {
                stack.push(children.into_iter());
            }
        }

        Ok(self.report)
    }

    /// Handle one item; returns the children to walk next for folders.
    async fn visit(
        &mut self,
        item: DocumentDescriptor,
    ) -> Result<Option<Vec<DocumentDescriptor>>, TraversalError> {
        let action = self.policy.classify(&item.mime_type);

        if action == Action::Skip || item.id.is_empty() {
            tracing::debug!(id = %item.id, mime_type = %item.mime_type, "Skipping item");
            self.report.skipped += 1;
            metrics::record_item("skipped");
            return Ok(None);
        }

        if !self.visited.insert(item.id.clone()) {
            tracing::debug!(id = %item.id, "Item already handled in this request");
            return Ok(None);
        }

        let drive_err = |source| TraversalError::Drive {
            id: item.id.clone(),
            source,
        };

        match action {
            Action::Export => {
                let data = self
                    .drive
                    .export(&item.id, PDF_MIME_TYPE)
                    .await
                    .map_err(drive_err)?;
                let stored = self
                    .storage
                    .save(&format!("{}.pdf", item.name), data)
                    .await?;

                tracing::info!(id = %item.id, file = %stored, "Exported document as PDF");
                self.report.exported += 1;
                self.report.downloaded.push(stored);
                metrics::record_item("exported");
                Ok(None)
            }
            Action::Descend => {
                let children = list_children(self.drive, &item.id)
                    .await
                    .map_err(drive_err)?;

                tracing::debug!(id = %item.id, children = children.len(), "Expanded folder");
                self.report.folders += 1;
                Ok(Some(children))
            }
            Action::Download => {
                let data = self.drive.download(&item.id).await.map_err(drive_err)?;
                let stored = self.storage.save(&item.name, data).await?;

                tracing::info!(id = %item.id, file = %stored, "Downloaded file");
                self.report.downloaded.push(stored);
                metrics::record_item("downloaded");
                Ok(None)
            }
            Action::Skip => Ok(None),
        }
    }
}
