//! Bulk attachment downloader
//!
//! Downloads every selected attachment of a ticket concurrently and collects
//! the successes into one archive. The batch completes when every download
//! has resolved, in whatever order the network delivers them, and the
//! archive is finalized exactly once, even when some downloads fail.

use async_trait::async_trait;
use futures::future::join_all;
use thiserror::Error;
use tracing::{info, warn};

use crate::attachments::AttachmentRecord;
use crate::helpdesk::transport::ApiTransport;
use crate::render::{BatchState, DownloadState, Renderer};

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("archive generation failed: {0}")]
    Generation(String),
}

/// Archive sink. The engine feeds binary blobs in and receives one blob
/// back; the actual archive format is the implementation's business.
#[async_trait]
pub trait Archiver: Send {
    /// Store one file. A duplicate name overwrites the earlier entry;
    /// acceptable, since names derive from unique source metadata.
    fn add_file(&mut self, name: &str, contents: Vec<u8>);

    /// Produce the final blob. Called exactly once per batch, after every
    /// download has resolved.
    async fn finalize(&mut self) -> Result<Vec<u8>, ArchiveError>;
}

/// Uncompressed in-memory sink: keeps the files addressable for tests and
/// for embedders that run their own packer over the result.
#[derive(Debug, Default)]
pub struct MemoryArchiver {
    files: Vec<(String, Vec<u8>)>,
}

impl MemoryArchiver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn files(&self) -> &[(String, Vec<u8>)] {
        &self.files
    }
}

#[async_trait]
impl Archiver for MemoryArchiver {
    fn add_file(&mut self, name: &str, contents: Vec<u8>) {
        self.files.retain(|(existing, _)| existing != name);
        self.files.push((name.to_string(), contents));
    }

    async fn finalize(&mut self) -> Result<Vec<u8>, ArchiveError> {
        let mut blob = Vec::new();
        for (name, contents) in &self.files {
            blob.extend_from_slice(name.as_bytes());
            blob.push(b'\n');
            blob.extend_from_slice(contents);
            blob.push(b'\n');
        }
        Ok(blob)
    }
}

/// One entry from the attachment table, as offered to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentSelection {
    pub text: String,
    pub href: String,
    /// Filename the blob is archived under.
    pub download: String,
    /// User-approved and CORS-eligible.
    pub checked: bool,
}

impl AttachmentSelection {
    /// The default selection for a rendered record: checked unless the host
    /// disqualifies it.
    pub fn from_record(record: &AttachmentRecord) -> Self {
        Self {
            text: record.text.clone(),
            href: record.href.clone(),
            download: record.download.clone(),
            checked: !record.missing_cors_header,
        }
    }
}

/// Result of a completed batch.
#[derive(Debug)]
pub struct ArchiveOutcome {
    pub file_name: String,
    pub archive: Vec<u8>,
    pub succeeded: usize,
    pub failed: usize,
}

/// Download every checked selection and assemble the archive.
///
/// The selection controls are disabled up front so a second click cannot
/// start a competing batch. All downloads run concurrently; a failed
/// download is excluded from the archive but still counts toward batch
/// completion. Once all have resolved, the archive is finalized exactly
/// once and handed to the renderer as `{account_code}.zendesk-{ticket_id}.zip`
/// (account code defaults to `UNKNOWN`).
///
/// Returns `Ok(None)` when nothing is checked.
pub async fn download_selected<T, A, R>(
    transport: &T,
    renderer: &R,
    archiver: &mut A,
    ticket_id: &str,
    account_code: Option<&str>,
    selections: &[AttachmentSelection],
) -> Result<Option<ArchiveOutcome>, ArchiveError>
where
    T: ApiTransport + ?Sized,
    A: Archiver + ?Sized,
    R: Renderer + ?Sized,
{
    renderer.disable_selections(ticket_id);

    let selected: Vec<&AttachmentSelection> =
        selections.iter().filter(|selection| selection.checked).collect();
    if selected.is_empty() {
        return Ok(None);
    }

    renderer.batch_state(ticket_id, BatchState::Downloading);

    let downloads = selected.iter().map(|selection| async move {
        renderer.download_state(&selection.href, DownloadState::Started);
        let result = transport.get_bytes(&selection.href).await;
        renderer.download_state(&selection.href, DownloadState::Finished);
        (*selection, result)
    });
    // Resolves only once every download has, successes and failures alike.
    let completed = join_all(downloads).await;

    let mut succeeded = 0;
    let mut failed = 0;
    for (selection, result) in completed {
        match result {
            Ok(contents) => {
                archiver.add_file(&selection.download, contents);
                succeeded += 1;
            }
            Err(error) => {
                warn!(href = %selection.href, %error, "attachment download failed; excluded from archive");
                failed += 1;
            }
        }
    }

    renderer.batch_state(ticket_id, BatchState::Generating);
    let archive = archiver.finalize().await?;

    let file_name = format!(
        "{}.zendesk-{}.zip",
        account_code.unwrap_or("UNKNOWN"),
        ticket_id
    );
    renderer.archive_ready(ticket_id, &file_name, &archive);
    info!(ticket = %ticket_id, file = %file_name, succeeded, failed, "bulk download complete");

    Ok(Some(ArchiveOutcome {
        file_name,
        archive,
        succeeded,
        failed,
    }))
}
