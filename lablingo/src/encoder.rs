//! File encoder: turns a selected lab-report file into an inline upload.
//!
//! Uploads travel as self-describing data URLs (`data:<mime>;base64,<payload>`)
//! so the media type is never separated from the bytes.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::EncodeError;

/// Media types accepted by the file picker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaType {
    Jpeg,
    Png,
    Webp,
    Heic,
    Pdf,
}

impl MediaType {
    pub const ALL: [MediaType; 5] = [
        MediaType::Jpeg,
        MediaType::Png,
        MediaType::Webp,
        MediaType::Heic,
        MediaType::Pdf,
    ];

    /// Check a declared MIME type against the allow-list.
    pub fn from_mime(declared: &str) -> Result<Self, EncodeError> {
        let normalized = declared
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        MediaType::ALL
            .into_iter()
            .find(|media_type| media_type.as_mime() == normalized)
            .ok_or_else(|| EncodeError::UnsupportedMediaType(declared.to_string()))
    }

    pub fn as_mime(&self) -> &'static str {
        match self {
            MediaType::Jpeg => "image/jpeg",
            MediaType::Png => "image/png",
            MediaType::Webp => "image/webp",
            MediaType::Heic => "image/heic",
            MediaType::Pdf => "application/pdf",
        }
    }

    /// Comma-separated list suitable for an `accept` attribute.
    pub fn accept_list() -> String {
        MediaType::ALL
            .iter()
            .map(MediaType::as_mime)
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_mime())
    }
}

/// An encoded file ready to be attached to an analysis request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedFile {
    pub data: String,
    pub media_type: MediaType,
}

impl UploadedFile {
    /// The bare base64 payload, without the data URL prefix.
    pub fn payload(&self) -> &str {
        match self.data.split_once("base64,") {
            Some((_, payload)) => payload,
            None => &self.data,
        }
    }
}

/// Validate the declared type and base64-encode the file contents.
///
/// Encoding runs on the blocking pool so large PDFs don't stall the runtime.
pub async fn encode(bytes: Vec<u8>, declared_mime: &str) -> Result<UploadedFile, EncodeError> {
    let media_type = MediaType::from_mime(declared_mime).inspect_err(|_| {
        warn!(declared = %declared_mime, "Rejected upload with unsupported media type");
    })?;

    if bytes.is_empty() {
        return Err(EncodeError::EmptyFile);
    }

    let size = bytes.len();
    let payload = tokio::task::spawn_blocking(move || STANDARD.encode(&bytes))
        .await
        .map_err(|e| EncodeError::Interrupted(e.to_string()))?;

    info!(media_type = %media_type, bytes = size, "Encoded uploaded file");

    Ok(UploadedFile {
        data: format!("data:{};base64,{}", media_type.as_mime(), payload),
        media_type,
    })
}

/// Ticket handed out when a file read starts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeTicket(u64);

/// The input form's file slot.
///
/// Reads are sequenced by selection order: a read that completes after a newer
/// selection has started is discarded instead of overwriting the newer file.
#[derive(Debug, Default)]
pub struct EncodeSlot {
    latest: AtomicU64,
    file: Mutex<Option<UploadedFile>>,
}

impl EncodeSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new selection, superseding any read still in flight.
    pub fn begin(&self) -> EncodeTicket {
        EncodeTicket(self.latest.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Store a finished read. Returns false when the ticket was superseded.
    pub fn complete(&self, ticket: EncodeTicket, file: UploadedFile) -> bool {
        let mut slot = self.lock();
        if self.latest.load(Ordering::SeqCst) != ticket.0 {
            debug!(ticket = ticket.0, "Discarding superseded file read");
            return false;
        }
        *slot = Some(file);
        true
    }

    /// Remove the file and invalidate reads still in flight.
    pub fn clear(&self) {
        let mut slot = self.lock();
        self.latest.fetch_add(1, Ordering::SeqCst);
        *slot = None;
    }

    /// Move the file out of the form once a request is sent.
    pub fn take(&self) -> Option<UploadedFile> {
        self.lock().take()
    }

    pub fn current(&self) -> Option<UploadedFile> {
        self.lock().clone()
    }

    pub fn media_type(&self) -> Option<MediaType> {
        self.lock().as_ref().map(|f| f.media_type)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<UploadedFile>> {
        self.file.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allow_list_accepts_declared_types() {
        assert_eq!(MediaType::from_mime("image/jpeg").unwrap(), MediaType::Jpeg);
        assert_eq!(MediaType::from_mime("IMAGE/PNG").unwrap(), MediaType::Png);
        assert_eq!(MediaType::from_mime("image/webp").unwrap(), MediaType::Webp);
        assert_eq!(MediaType::from_mime("image/heic").unwrap(), MediaType::Heic);
        assert_eq!(
            MediaType::from_mime("application/pdf; charset=binary").unwrap(),
            MediaType::Pdf
        );
    }

    #[test]
    fn allow_list_rejects_everything_else() {
        for declared in ["text/plain", "image/gif", "application/zip", ""] {
            let err = MediaType::from_mime(declared).unwrap_err();
            assert!(matches!(err, EncodeError::UnsupportedMediaType(_)));
        }
    }

    #[tokio::test]
    async fn pdf_is_encoded_as_data_url() {
        let file = encode(b"%PDF-1.7".to_vec(), "application/pdf")
            .await
            .unwrap();

        assert_eq!(file.media_type, MediaType::Pdf);
        assert!(file.data.starts_with("data:application/pdf;base64,"));
        assert_eq!(file.payload(), STANDARD.encode(b"%PDF-1.7"));
    }

    #[tokio::test]
    async fn unsupported_and_empty_files_are_rejected() {
        let err = encode(b"hello".to_vec(), "text/plain").await.unwrap_err();
        assert!(matches!(err, EncodeError::UnsupportedMediaType(_)));

        let err = encode(Vec::new(), "image/png").await.unwrap_err();
        assert!(matches!(err, EncodeError::EmptyFile));
    }

    #[test]
    fn payload_without_prefix_is_returned_as_is() {
        let file = UploadedFile {
            data: "QUJD".to_string(),
            media_type: MediaType::Png,
        };
        assert_eq!(file.payload(), "QUJD");
    }

    fn sample(media_type: MediaType) -> UploadedFile {
        UploadedFile {
            data: format!("data:{};base64,QUJD", media_type.as_mime()),
            media_type,
        }
    }

    #[test]
    fn superseded_read_is_discarded() {
        let slot = EncodeSlot::new();
        let first = slot.begin();
        let second = slot.begin();

        assert!(slot.complete(second, sample(MediaType::Pdf)));
        // The first selection finishes last but must not win.
        assert!(!slot.complete(first, sample(MediaType::Png)));
        assert_eq!(slot.media_type(), Some(MediaType::Pdf));
    }

    #[test]
    fn clear_invalidates_in_flight_reads() {
        let slot = EncodeSlot::new();
        let ticket = slot.begin();
        slot.clear();

        assert!(!slot.complete(ticket, sample(MediaType::Jpeg)));
        assert!(slot.current().is_none());
    }

    #[test]
    fn take_empties_the_slot() {
        let slot = EncodeSlot::new();
        let ticket = slot.begin();
        slot.complete(ticket, sample(MediaType::Heic));

        assert!(slot.take().is_some());
        assert!(slot.take().is_none());
    }
}
