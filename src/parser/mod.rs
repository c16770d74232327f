//! Email parsing: turn message files into renderer input.

pub mod eml;

use std::path::Path;

use crate::error::{RenderError, Result};
use crate::model::content::EmailContent;

/// Load renderer input from a file, picking the format from its extension.
///
/// `.eml` files are parsed as MIME messages, `.html`/`.htm` files are taken
/// as a raw HTML body, anything else as plain text.
pub fn load_content(path: &Path) -> Result<EmailContent> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    if ext.as_deref() == Some("eml") {
        return eml::load_eml(path);
    }

    let text = std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            RenderError::FileNotFound(path.to_path_buf())
        } else {
            RenderError::io(path, e)
        }
    })?;
    Ok(match ext.as_deref() {
        Some("html" | "htm") => EmailContent::html(text),
        _ => EmailContent::text(text),
    })
}
