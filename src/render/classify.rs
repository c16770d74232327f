//! Heuristic layout classification of HTML email bodies.
//!
//! Newsletter and marketing templates are fixed-width, table-based layouts
//! that assume a white canvas; forcing them into a dark palette breaks them.
//! Prose emails, on the other hand, read better wrapped in the host's own
//! typography. This module tells the two apart with a cumulative score over
//! raw text patterns. It is deliberately not a parser: malformed markup only
//! makes the verdict less accurate.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

/// Minimum score for a non-plain body to count as structured.
pub const STRUCTURED_THRESHOLD: u32 = 3;

/// Tags that do not count against the plain-content override.
const TRIVIAL_TAGS: &[&str] = &["p", "br", "a", "span", "strong", "em", "b", "i"];

static TABLE_TAG: LazyLock<Regex> = LazyLock::new(|| re(r"<table\b"));
static WIDTH_5XX: LazyLock<Regex> = LazyLock::new(|| {
    re(r#"\bwidth\s*=\s*["']?5\d{2}\b|width\s*:\s*5\d{2}px"#)
});
static CENTERED: LazyLock<Regex> = LazyLock::new(|| re(r"margin\s*:\s*0\s*auto"));
static BUTTON_LINK: LazyLock<Regex> = LazyLock::new(|| {
    re(r#"<a\b[^>]+(?:background|border-radius|display:\s*inline-block|padding:\s*[^;"'>]{2,})"#)
});
static WIDE_IMAGE: LazyLock<Regex> = LazyLock::new(|| {
    re(r#"<img\b[^>]+(?:width=["']?[3-7]\d{2}\b|style=["'][^"']*width:\s*[3-7]\d{2}px)"#)
});
static LEGACY_ATTR: LazyLock<Regex> =
    LazyLock::new(|| re(r"\b(?:align|valign|bgcolor|cellpadding|cellspacing)\s*="));
static TAG_NAME: LazyLock<Regex> = LazyLock::new(|| re(r"<([a-z0-9-]+)"));
static WHITE_BACKGROUND: LazyLock<Regex> = LazyLock::new(|| {
    re(r#"\bbgcolor\s*=\s*["']?#?fff|background(?:-color)?\s*:\s*#?fff|rgb\(\s*255\s*,\s*255\s*,\s*255\s*\)"#)
});

fn re(pattern: &str) -> Regex {
    Regex::new(pattern).expect("valid classifier regex")
}

/// One scoring rule that fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    /// Two or more `<table>` tags.
    MultipleTables,
    /// Outlook conditional comment (`<!--[if mso]`).
    OfficeConditional,
    /// A 5xx px fixed width.
    FixedWidth,
    /// `margin: 0 auto` centering.
    CenteredWrapper,
    /// At least 12 `style=` attributes.
    ManyStyles,
    /// At least 25 `style=` attributes.
    VeryManyStyles,
    /// A link styled as a button.
    ButtonLink,
    /// An image 300–799 px wide.
    WideImage,
    /// `align=`, `valign=`, `bgcolor=`, `cellpadding=` or `cellspacing=`.
    LegacyAttributes,
}

impl Signal {
    /// Points this signal adds to the score.
    pub fn weight(self) -> u32 {
        match self {
            Self::MultipleTables | Self::OfficeConditional => 2,
            _ => 1,
        }
    }
}

/// Result of classifying one HTML body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Classification {
    /// Sum of the weights of `signals`.
    pub score: u32,
    /// Rules that fired, in evaluation order.
    pub signals: Vec<Signal>,
    /// Number of `<table>` tags.
    pub table_count: usize,
    /// Number of `style=` occurrences.
    pub style_count: usize,
    /// Distinct tag names outside the trivial inline set.
    pub non_trivial_tags: usize,
    /// The plain-content override applied.
    pub looks_plain: bool,
    /// Render as a structured (white canvas, unwrapped) layout.
    pub is_structured: bool,
    /// The body declares an explicit white background.
    pub prefer_white: bool,
}

/// Classify a raw HTML body.
pub fn classify(raw_html: &str) -> Classification {
    let h = raw_html.to_lowercase();
    if h.trim().is_empty() {
        return Classification::default();
    }

    let table_count = TABLE_TAG.find_iter(&h).count();
    let style_count = h.matches("style=").count();

    let mut signals = Vec::new();
    if table_count >= 2 {
        signals.push(Signal::MultipleTables);
    }
    if h.contains("<!--[if mso]") {
        signals.push(Signal::OfficeConditional);
    }
    if WIDTH_5XX.is_match(&h) {
        signals.push(Signal::FixedWidth);
    }
    if CENTERED.is_match(&h) {
        signals.push(Signal::CenteredWrapper);
    }
    if style_count >= 12 {
        signals.push(Signal::ManyStyles);
    }
    if style_count >= 25 {
        signals.push(Signal::VeryManyStyles);
    }
    if BUTTON_LINK.is_match(&h) {
        signals.push(Signal::ButtonLink);
    }
    if WIDE_IMAGE.is_match(&h) {
        signals.push(Signal::WideImage);
    }
    if LEGACY_ATTR.is_match(&h) {
        signals.push(Signal::LegacyAttributes);
    }
    let score = signals.iter().map(|s| s.weight()).sum();

    let non_trivial_tags = TAG_NAME
        .captures_iter(&h)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .filter(|tag| !TRIVIAL_TAGS.contains(tag))
        .collect::<BTreeSet<_>>()
        .len();
    let looks_plain = table_count == 0 && non_trivial_tags <= 2 && style_count < 6;

    let result = Classification {
        score,
        signals,
        table_count,
        style_count,
        non_trivial_tags,
        looks_plain,
        is_structured: !looks_plain && score >= STRUCTURED_THRESHOLD,
        prefer_white: WHITE_BACKGROUND.is_match(&h),
    };
    tracing::debug!(
        score = result.score,
        tables = result.table_count,
        styles = result.style_count,
        looks_plain = result.looks_plain,
        structured = result.is_structured,
        prefer_white = result.prefer_white,
        "Classified email body"
    );
    result
}
