//! Input to the renderer.

use serde::{Deserialize, Serialize};

use super::attachment::Attachment;

/// Everything the renderer needs to display one email.
///
/// Constructed by the caller per displayed email; the renderer only reads it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EmailContent {
    /// Raw HTML body, if the message has one.
    pub raw_html: Option<String>,
    /// Plain-text body used when there is no usable HTML.
    pub fallback_text: String,
    /// Attachment descriptors, inline and regular.
    pub attachments: Vec<Attachment>,
}

impl EmailContent {
    /// Content with an HTML body and no attachments.
    pub fn html(raw_html: impl Into<String>) -> Self {
        Self {
            raw_html: Some(raw_html.into()),
            ..Self::default()
        }
    }

    /// Content with only a plain-text body.
    pub fn text(fallback_text: impl Into<String>) -> Self {
        Self {
            fallback_text: fallback_text.into(),
            ..Self::default()
        }
    }

    /// Builder-style attachment list.
    pub fn with_attachments(mut self, attachments: Vec<Attachment>) -> Self {
        self.attachments = attachments;
        self
    }

    /// The HTML body, if present and not just whitespace.
    pub fn usable_html(&self) -> Option<&str> {
        self.raw_html
            .as_deref()
            .filter(|html| !html.trim().is_empty())
    }

    /// Attachments offered as separate downloads (not referenced inline).
    pub fn downloadable_attachments(&self) -> impl Iterator<Item = &Attachment> {
        self.attachments.iter().filter(|a| !a.inline)
    }
}
