//! Allow-list sanitization of the assembled email fragment.

use serde::{Deserialize, Serialize};

use crate::error::{RenderError, Result};

/// Something that turns untrusted HTML into markup safe to embed.
pub trait HtmlSanitizer: Send + Sync {
    /// Return the sanitized form of `html`.
    fn sanitize(&self, html: &str) -> String;
}

/// What to do when no sanitizer is configured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnsanitizedPolicy {
    /// Fail the render with [`RenderError::SanitizerUnavailable`].
    #[default]
    Refuse,
    /// Embed the assembled HTML as-is and log a warning.
    Allow,
}

/// Sanitizer configuration on top of the sanitizer's baseline allow-list.
#[derive(Debug, Clone, Copy)]
pub struct SanitizeOptions {
    /// Keep links whose scheme is outside the baseline list.
    pub allow_unknown_protocols: bool,
    /// Extra tags to allow.
    pub add_tags: &'static [&'static str],
    /// Extra attributes to allow on every tag.
    pub add_attributes: &'static [&'static str],
    /// Tags removed regardless of any other setting.
    pub forbid_tags: &'static [&'static str],
}

impl SanitizeOptions {
    /// Policy used for email bodies.
    pub const EMAIL: Self = Self {
        allow_unknown_protocols: true,
        add_tags: &["style", "svg", "path"],
        add_attributes: &[
            "style",
            "target",
            "align",
            "border",
            "cellpadding",
            "cellspacing",
            "background",
        ],
        forbid_tags: &["script", "iframe", "object", "embed", "form"],
    };
}

/// Legacy presentational markup that email layouts depend on.
const LAYOUT_TAGS: &[&str] = &["font", "center"];
const LAYOUT_ATTRIBUTES: &[&str] = &[
    "class", "id", "width", "height", "bgcolor", "valign", "color", "dir",
];

/// Link schemes accepted on top of ammonia's defaults when unknown protocols are allowed.
const EXTRA_URL_SCHEMES: &[&str] = &[
    "cid", "data", "callto", "feed", "facetime", "maps", "msteams", "skype", "slack", "spotify",
    "tg", "whatsapp", "zoommtg",
];

/// [`HtmlSanitizer`] backed by `ammonia`.
pub struct AmmoniaSanitizer {
    builder: ammonia::Builder<'static>,
}

impl AmmoniaSanitizer {
    /// Build a sanitizer for the given options.
    pub fn new(options: &SanitizeOptions) -> Self {
        let mut builder = ammonia::Builder::default();
        builder
            .add_tags(LAYOUT_TAGS.iter().copied())
            .add_generic_attributes(LAYOUT_ATTRIBUTES.iter().copied());

        // A tag cannot be both allowed and content-stripped.
        builder.rm_clean_content_tags(options.add_tags.iter().copied());
        builder
            .add_tags(options.add_tags.iter().copied())
            .add_generic_attributes(options.add_attributes.iter().copied());

        if options.allow_unknown_protocols {
            builder.add_url_schemes(EXTRA_URL_SCHEMES.iter().copied());
        }

        builder.rm_tags(options.forbid_tags.iter().copied());
        builder.add_clean_content_tags(["script"].iter().copied());

        Self { builder }
    }

    /// Sanitizer configured for email bodies.
    pub fn email() -> Self {
        Self::new(&SanitizeOptions::EMAIL)
    }
}

impl Default for AmmoniaSanitizer {
    fn default() -> Self {
        Self::email()
    }
}

impl HtmlSanitizer for AmmoniaSanitizer {
    fn sanitize(&self, html: &str) -> String {
        self.builder.clean(html).to_string()
    }
}

/// Sanitize `html`, or apply `policy` if there is no sanitizer.
pub fn sanitize_with(
    sanitizer: Option<&dyn HtmlSanitizer>,
    policy: UnsanitizedPolicy,
    html: &str,
) -> Result<String> {
    match (sanitizer, policy) {
        (Some(s), _) => Ok(s.sanitize(html)),
        (None, UnsanitizedPolicy::Allow) => {
            tracing::warn!(
                bytes = html.len(),
                "No HTML sanitizer configured; embedding unsanitized email HTML"
            );
            Ok(html.to_string())
        }
        (None, UnsanitizedPolicy::Refuse) => {
            tracing::error!("No HTML sanitizer configured; refusing to render email HTML");
            Err(RenderError::SanitizerUnavailable)
        }
    }
}
