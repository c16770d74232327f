//! The email rendering pipeline.
//!
//! Stages, leaf to root:
//! 1. [`strip`]: drop `<img>` tags that point at inline attachments.
//! 2. [`classify`]: score the raw HTML as structured or plain.
//! 3. [`theme`]: pick the palette from the host theme and the classification.
//! 4. [`sanitize`]: allow-list sanitization of the assembled fragment.
//! 5. [`document`]: stylesheet, standalone document and frame descriptors.
//! 6. [`mount`]: two-phase asynchronous mount into a host container.
//!
//! Stages 1–5 are pure and exposed together as [`prepare`].

pub mod classify;
pub mod document;
pub mod mount;
pub mod sanitize;
pub mod strip;
pub mod theme;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::content::EmailContent;

use self::classify::Classification;
use self::sanitize::{HtmlSanitizer, UnsanitizedPolicy};
use self::theme::{HostTheme, ThemeDecision};

pub use self::mount::{FrameEvent, FrameHost, MountedView, RenderHandle, Renderer};

/// Host-side inputs that decide the palette.
///
/// Passed in explicitly instead of being read from global display state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderEnv {
    /// Host application theme setting.
    pub host_theme: HostTheme,
    /// Whether the platform reports a dark color-scheme preference.
    pub system_prefers_dark: bool,
}

/// Output of the pure pipeline stages for one email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedEmail {
    pub classification: Classification,
    pub theme: ThemeDecision,
    /// Sanitized body fragment.
    pub body: String,
    /// Complete themed document embedding `body`.
    pub document: String,
}

/// Build the body fragment handed to the sanitizer.
///
/// HTML bodies have their inline images stripped and, unless structured, are
/// wrapped in the prose container. Without HTML, each line of the fallback
/// text becomes an escaped paragraph inside `#receivedContent`.
pub fn assemble_body(content: &EmailContent, classification: &Classification) -> String {
    match content.usable_html() {
        Some(html) => {
            let stripped = strip::strip_inline_images(html, &content.attachments);
            if classification.is_structured {
                stripped
            } else {
                format!(r#"<div class="panel-content">{stripped}</div>"#)
            }
        }
        None => {
            let paragraphs: String = content
                .fallback_text
                .split('\n')
                .map(|line| format!("<p>{}</p>", escape_html(line)))
                .collect();
            format!(r#"<div class="panel-content" id="receivedContent">{paragraphs}</div>"#)
        }
    }
}

/// Run stages 1–5 for one email.
pub fn prepare(
    content: &EmailContent,
    env: RenderEnv,
    sanitizer: Option<&dyn HtmlSanitizer>,
    policy: UnsanitizedPolicy,
) -> Result<PreparedEmail> {
    let classification = content
        .usable_html()
        .map(classify::classify)
        .unwrap_or_default();
    let theme = theme::resolve(env.host_theme, env.system_prefers_dark, &classification);
    let assembled = assemble_body(content, &classification);
    let body = sanitize::sanitize_with(sanitizer, policy, &assembled)?;
    let document = document::build_document(&body, &theme);

    tracing::debug!(
        structured = classification.is_structured,
        scheme = %theme.color_scheme,
        body_bytes = body.len(),
        "Prepared email document"
    );

    Ok(PreparedEmail {
        classification,
        theme,
        body,
        document,
    })
}

/// Escape text for use as HTML element content.
fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            '\r' => {}
            _ => out.push(ch),
        }
    }
    out
}
