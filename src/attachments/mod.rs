//! Attachment table data
//!
//! Records describing the files linked from a ticket conversation. The
//! embedding environment extracts them from the vendor markup; this module
//! owns the parts that are actual logic (filename decoding, the
//! CORS-disqualification predicate, the display ordering) plus the
//! concurrent bulk downloader in [`bulk`].

pub mod bulk;

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

pub use bulk::{
    ArchiveError, ArchiveOutcome, Archiver, AttachmentSelection, MemoryArchiver, download_selected,
};

/// Metadata for one attachment (or attachment-like external link) in a
/// ticket conversation. Ephemeral: constructed per render, never cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentRecord {
    /// Display name (the decoded filename).
    pub text: String,
    pub href: String,
    /// Filename the download should be saved under.
    pub download: String,
    /// Comment the attachment belongs to, for permalinking.
    pub comment_id: String,
    pub author: String,
    /// Human-readable timestamp shown next to the author.
    pub time: String,
    /// Machine timestamp (ISO 8601), the primary sort key.
    pub timestamp: String,
    /// Hosted on a domain that does not grant cross-origin reads; excluded
    /// from bulk download.
    pub missing_cors_header: bool,
}

/// Display order: newest first, ties broken by name.
pub fn display_order(a: &AttachmentRecord, b: &AttachmentRecord) -> Ordering {
    b.timestamp
        .cmp(&a.timestamp)
        .then_with(|| a.text.cmp(&b.text))
}

/// Order records for the attachment table. `None` when there is nothing to
/// render; the caller skips building the container entirely.
pub fn table_rows(mut records: Vec<AttachmentRecord>) -> Option<Vec<AttachmentRecord>> {
    if records.is_empty() {
        return None;
    }
    records.sort_by(display_order);
    Some(records)
}

/// Recover the original filename from an attachment URL.
///
/// The link text is truncated by the UI, so the name is taken from the
/// `name` query parameter instead: `+` becomes a space, then the remainder
/// is percent-decoded.
pub fn attachment_file_name(href: &str) -> Option<String> {
    let (_, query) = href.split_once('?')?;
    let start = query.find("name=")? + "name=".len();
    let encoded = query[start..].replace('+', "%20");
    urlencoding::decode(&encoded)
        .ok()
        .map(|decoded| decoded.into_owned())
}

/// Large attachments are served from a host that omits CORS headers, which
/// makes bulk binary retrieval impossible; they are listed but not
/// selectable.
pub fn is_large_attachment(href: &str) -> bool {
    href.contains("ticketAttachmentId")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(text: &str, timestamp: &str) -> AttachmentRecord {
        AttachmentRecord {
            text: text.to_string(),
            href: format!("https://support.example.test/attachments/token?name={text}"),
            download: text.to_string(),
            comment_id: "c1".to_string(),
            author: "Support Agent".to_string(),
            time: timestamp.to_string(),
            timestamp: timestamp.to_string(),
            missing_cors_header: false,
        }
    }

    #[test]
    fn newer_attachments_sort_first() {
        let rows = table_rows(vec![
            record("log.txt", "2020-03-01T00:00:00Z"),
            record("log.txt", "2020-03-05T00:00:00Z"),
        ])
        .unwrap();

        assert_eq!(rows[0].timestamp, "2020-03-05T00:00:00Z");
        assert_eq!(rows[1].timestamp, "2020-03-01T00:00:00Z");
    }

    #[test]
    fn equal_timestamps_sort_by_name() {
        let rows = table_rows(vec![
            record("b.txt", "2020-03-01T00:00:00Z"),
            record("a.txt", "2020-03-01T00:00:00Z"),
        ])
        .unwrap();

        assert_eq!(rows[0].text, "a.txt");
        assert_eq!(rows[1].text, "b.txt");
    }

    #[test]
    fn no_records_means_no_table() {
        assert!(table_rows(Vec::new()).is_none());
    }

    #[test]
    fn file_name_decodes_from_the_query_string() {
        assert_eq!(
            attachment_file_name("https://h/a/123?name=thread+dump%202020.txt"),
            Some("thread dump 2020.txt".to_string())
        );
        assert_eq!(
            attachment_file_name("https://h/a/123?name=simple.log"),
            Some("simple.log".to_string())
        );
        assert_eq!(attachment_file_name("https://h/a/123"), None);
    }

    #[test]
    fn large_attachment_hosts_are_disqualified() {
        assert!(is_large_attachment(
            "https://files.example.test/download?ticketAttachmentId=555"
        ));
        assert!(!is_large_attachment(
            "https://support.example.test/attachments/token?name=a.txt"
        ));
    }
}
