//! Removal of `<img>` tags that point at inline attachments.
//!
//! Inline images reference either a `cid:` URL or the backend's attachment
//! endpoint. Neither resolves inside the sandboxed frame, so they would render
//! as broken-image placeholders (or hit the backend for tracking pixels).

use std::sync::LazyLock;

use regex::Regex;

use crate::model::attachment::Attachment;

/// Any `<img>` whose `src` is a `cid:` URL.
static ANY_CID_IMG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<img\b[^>]*\bsrc\s*=\s*["']\s*cid:[^"']+["'][^>]*>"#)
        .expect("valid cid regex")
});

/// Remove every `<img>` that references an inline attachment.
///
/// Only attachments with `inline == true` participate. Each one is matched
/// independently by Content-ID, by backend attachment id, and by filename
/// (a substring match on `src`). A final pass removes any `cid:` image left
/// over, whatever the attachment metadata says.
///
/// Returns the input unchanged when either `html` or `attachments` is empty.
pub fn strip_inline_images(html: &str, attachments: &[Attachment]) -> String {
    if html.is_empty() || attachments.is_empty() {
        return html.to_string();
    }

    let patterns: Vec<Regex> = attachments
        .iter()
        .filter(|a| a.inline)
        .flat_map(patterns_for)
        .collect();

    // Removing a tag can splice two fragments into a new match; repeat until stable.
    let mut out = html.to_string();
    loop {
        let next = strip_once(&out, &patterns);
        if next == out {
            return out;
        }
        out = next;
    }
}

fn strip_once(html: &str, patterns: &[Regex]) -> String {
    let mut out = html.to_string();
    for re in patterns {
        out = re.replace_all(&out, "").into_owned();
    }
    ANY_CID_IMG.replace_all(&out, "").into_owned()
}

/// Build the match patterns for one inline attachment.
fn patterns_for(att: &Attachment) -> Vec<Regex> {
    let mut sources = Vec::with_capacity(3);

    if let Some(cid) = non_empty(&att.content_id) {
        let cid = cid.trim_start_matches('<').trim_end_matches('>');
        sources.push(format!(
            r#"(?i)<img\b[^>]*\bsrc\s*=\s*["']\s*cid:\s*<?{}>?["'][^>]*>"#,
            regex::escape(cid)
        ));
    }
    if let Some(id) = non_empty(&att.attachment_id) {
        sources.push(format!(
            r#"(?i)<img\b[^>]*\bsrc\s*=\s*["'][^"']*?/emails/attachment[^"']*?att_id={}[^"']*?["'][^>]*>"#,
            regex::escape(id)
        ));
    }
    if let Some(name) = non_empty(&att.filename) {
        sources.push(format!(
            r#"(?i)<img\b[^>]*\bsrc\s*=\s*["'][^"']*?{}[^"']*?["'][^>]*>"#,
            regex::escape(name)
        ));
    }

    sources
        .iter()
        .filter_map(|src| match Regex::new(src) {
            Ok(re) => Some(re),
            Err(e) => {
                tracing::warn!(error = %e, "Skipping unusable inline attachment pattern");
                None
            }
        })
        .collect()
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}
