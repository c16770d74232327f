//! Parser for `.eml` files (RFC 5322 messages, optionally with an MBOX `From ` line).

use std::path::Path;

use mail_parser::{MessageParser, MimeHeaders, PartType};

use crate::error::{RenderError, Result};
use crate::model::attachment::Attachment;
use crate::model::content::EmailContent;

/// Read and parse a single `.eml` file.
pub fn load_eml(path: impl AsRef<Path>) -> Result<EmailContent> {
    let path = path.as_ref();
    let data = std::fs::read(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            RenderError::FileNotFound(path.to_path_buf())
        } else {
            RenderError::io(path, e)
        }
    })?;
    parse_eml(&data)
}

/// Extract the HTML body, text body and attachment descriptors of a raw message.
pub fn parse_eml(raw_message: &[u8]) -> Result<EmailContent> {
    let message_bytes = skip_from_line(raw_message);
    let msg = MessageParser::default()
        .parse(message_bytes)
        .ok_or_else(|| RenderError::MimeError("Failed to parse message".into()))?;

    // `body_html` converts text-only messages to HTML; keep real HTML parts only.
    let raw_html = msg
        .html_part(0)
        .filter(|part| matches!(part.body, PartType::Html(_)))
        .and_then(|_| msg.body_html(0))
        .map(|s| s.into_owned());
    let fallback_text = msg
        .body_text(0)
        .map(|s| s.into_owned())
        .unwrap_or_default();

    let attachments = msg
        .attachments()
        .map(|part| {
            let content_id = part
                .content_id()
                .map(|id| id.trim().trim_start_matches('<').trim_end_matches('>').to_string())
                .filter(|id| !id.is_empty());
            let disposition = part
                .content_disposition()
                .map(|d| d.ctype().to_ascii_lowercase());
            // Parts in multipart/related often carry a Content-ID and no disposition.
            let inline = match disposition.as_deref() {
                Some("inline") => true,
                Some(_) => false,
                None => content_id.is_some(),
            };
            let mime_type = part.content_type().map(|ct| match ct.subtype() {
                Some(sub) => format!("{}/{}", ct.ctype(), sub),
                None => ct.ctype().to_string(),
            });

            Attachment {
                inline,
                content_id,
                attachment_id: None,
                filename: part.attachment_name().map(String::from),
                mime_type,
                size: Some(part.contents().len() as u64),
            }
        })
        .collect::<Vec<_>>();

    tracing::debug!(
        has_html = raw_html.is_some(),
        attachments = attachments.len(),
        "Parsed message"
    );

    Ok(EmailContent {
        raw_html,
        fallback_text,
        attachments,
    })
}

/// Skip a leading BOM and the `From ` separator line of MBOX-extracted messages.
fn skip_from_line(data: &[u8]) -> &[u8] {
    let data = data.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(data);
    if data.starts_with(b"From ") {
        if let Some(pos) = data.iter().position(|&b| b == b'\n') {
            return &data[pos + 1..];
        }
    }
    data
}
