//! Renderer seam
//!
//! The engine decides *what* to show (attachment rows, download progress,
//! the finished archive) and hands it to a [`Renderer`]; building and
//! styling the actual DOM is the embedding environment's job. The shipped
//! [`LogRenderer`] reports through structured logging, which is enough for
//! the headless binary and for watching the engine work.

use tracing::info;

use crate::attachments::AttachmentRecord;

/// Progress of one attachment download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadState {
    Started,
    Finished,
}

/// Progress of the whole bulk-download batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    Downloading,
    Generating,
}

/// Downstream rendering hooks. All methods are fire-and-forget: rendering
/// failures must never stall the automation chain.
pub trait Renderer: Send + Sync {
    /// One resolved attachment table row, called in display order.
    fn attachment_row(&self, record: &AttachmentRecord);

    /// Grey out the selection controls the moment a bulk download begins.
    fn disable_selections(&self, ticket_id: &str);

    /// Per-attachment download progress.
    fn download_state(&self, href: &str, state: DownloadState);

    /// Batch-level progress on the trigger control.
    fn batch_state(&self, ticket_id: &str, state: BatchState);

    /// The finished archive, ready to be offered as a download link.
    fn archive_ready(&self, ticket_id: &str, file_name: &str, archive: &[u8]);
}

/// Renderer that narrates through `tracing` instead of touching any DOM.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogRenderer;

impl Renderer for LogRenderer {
    fn attachment_row(&self, record: &AttachmentRecord) {
        info!(
            text = %record.text,
            author = %record.author,
            timestamp = %record.timestamp,
            "attachment row"
        );
    }

    fn disable_selections(&self, ticket_id: &str) {
        info!(ticket = %ticket_id, "selection controls disabled");
    }

    fn download_state(&self, href: &str, state: DownloadState) {
        info!(%href, ?state, "attachment download");
    }

    fn batch_state(&self, ticket_id: &str, state: BatchState) {
        info!(ticket = %ticket_id, ?state, "bulk download batch");
    }

    fn archive_ready(&self, ticket_id: &str, file_name: &str, archive: &[u8]) {
        info!(
            ticket = %ticket_id,
            file = %file_name,
            bytes = archive.len(),
            "archive ready"
        );
    }
}
