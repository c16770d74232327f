//! Attachment descriptors as supplied by the caller.
//!
//! The renderer only reads these; the binary payload never passes through it.

use serde::{Deserialize, Serialize};

use crate::i18n;

/// One email attachment or inline resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Attachment {
    /// `true` if the attachment is referenced from within the HTML body.
    pub inline: bool,

    /// Content-ID used by `src="cid:..."` references, without angle brackets.
    pub content_id: Option<String>,

    /// Backend attachment id, as used in `/emails/attachment?att_id=...` URLs.
    pub attachment_id: Option<String>,

    /// Filename of the attachment, if known.
    pub filename: Option<String>,

    /// MIME content type (e.g. `"image/png"`).
    pub mime_type: Option<String>,

    /// Decoded size in bytes.
    pub size: Option<u64>,
}

/// Coarse attachment category used to pick an icon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    Image,
    Pdf,
    Document,
    Spreadsheet,
    Text,
    Other,
}

impl Attachment {
    /// An inline attachment referenced by Content-ID.
    pub fn inline_cid(content_id: impl Into<String>) -> Self {
        Self {
            inline: true,
            content_id: Some(content_id.into()),
            ..Self::default()
        }
    }

    /// Classify the attachment from its MIME type, falling back to the extension.
    pub fn kind(&self) -> AttachmentKind {
        let mime = self.mime_type.as_deref().unwrap_or("").to_lowercase();
        let name = self.filename.as_deref().unwrap_or("").to_lowercase();
        let ext = name.rsplit_once('.').map(|(_, e)| e).unwrap_or("");

        if mime.starts_with("image/")
            || matches!(ext, "png" | "jpg" | "jpeg" | "gif" | "webp" | "bmp" | "svg")
        {
            AttachmentKind::Image
        } else if mime == "application/pdf" || ext == "pdf" {
            AttachmentKind::Pdf
        } else if mime.contains("msword")
            || mime.contains("officedocument.word")
            || matches!(ext, "doc" | "docx" | "rtf")
        {
            AttachmentKind::Document
        } else if mime.contains("excel")
            || mime.contains("spreadsheet")
            || matches!(ext, "xls" | "xlsx" | "csv")
        {
            AttachmentKind::Spreadsheet
        } else if ext == "txt" {
            AttachmentKind::Text
        } else {
            AttachmentKind::Other
        }
    }

    /// Filename for display, or a localized generic label.
    pub fn display_name(&self) -> &str {
        match self.filename.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => i18n::msg_default_attachment_name(),
        }
    }

    /// Human-readable size (e.g. `"1.5 KiB"`), empty when unknown.
    pub fn size_label(&self) -> String {
        self.size
            .map(|n| humansize::format_size(n, humansize::BINARY))
            .unwrap_or_default()
    }
}
