//! Standalone document and frame descriptors for the isolated view.

use std::fmt;

use super::theme::ThemeDecision;

/// Padding added to a measured body scroll height.
pub const HEIGHT_PADDING: u32 = 16;

/// CSS height transition applied to the visible frame.
pub const HEIGHT_TRANSITION: &str = "height .12s ease";

/// CSS class of the visible frame element.
pub const FRAME_CLASS: &str = "mail-frame";

/// Sandbox flags for an embedded frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sandbox {
    /// Off-screen measurement frame: same-origin access only, so the
    /// renderer can read its scroll height.
    Probe,
    /// Visible frame: links may open popups or navigate the top level, but
    /// only as a direct result of a user click.
    Visible,
}

impl Sandbox {
    /// Value of the `sandbox` attribute.
    pub fn as_attr(self) -> &'static str {
        match self {
            Self::Probe => "allow-same-origin",
            Self::Visible => {
                "allow-same-origin allow-popups allow-popups-to-escape-sandbox allow-top-navigation-by-user-activation"
            }
        }
    }
}

impl fmt::Display for Sandbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_attr())
    }
}

/// Everything a host needs to create one embedded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameSpec {
    /// Full document loaded into the frame.
    pub srcdoc: String,
    pub sandbox: Sandbox,
}

/// Stylesheet injected into every rendered email.
///
/// In dark mode, light backgrounds declared by the email (`bgcolor`, inline
/// background styles, explicit `#fff`) are overridden so the text color stays
/// readable.
pub fn build_stylesheet(theme: &ThemeDecision) -> String {
    let ThemeDecision {
        background: bg,
        foreground: fg,
        color_scheme,
    } = *theme;

    let mut css = format!(
        r#":root{{color-scheme:{color_scheme};}}
html,body{{margin:0!important;padding:0!important;background:{bg}!important;color:{fg}!important;font:14px/1.45 -apple-system,BlinkMacSystemFont,'Segoe UI',Roboto,Arial,sans-serif;}}
a:not([class*="btn"]):not([class*="button"]):not([role="button"]):not([style*="background"]):not([style*="padding"]):not([style*="border-radius"]){{color:inherit!important;text-decoration:underline;}}
a:visited,a:active{{color:inherit!important;}}
a:hover{{opacity:.85;text-decoration:underline;}}
img{{max-width:100%!important;height:auto!important;border:0;outline:0;}}
img[src^="cid:"],img[src*="/emails/attachment"]{{display:none!important;}}
table{{border-collapse:collapse!important;max-width:100%;}}
blockquote{{margin:.5em 0 .5em 1em;padding-left:.8em;border-left:3px solid rgba(0,0,0,.2);}}
hr{{border:0;border-top:1px solid rgba(0,0,0,.15);}}
.panel-content{{font-size:1.2rem;line-height:1.45;color:inherit;}}
.panel-content p,.panel-content div,.panel-content span,.panel-content li{{font:inherit;color:inherit;}}
.panel-content p{{margin:.45em 0;}}
"#
    );

    if !theme.is_white() {
        css.push_str(&format!(
            r#"body,p,div,span,td,li,a,h1,h2,h3,h4,h5,h6{{color:{fg}!important;}}
table[bgcolor],td[bgcolor],div[style*="background"],td[style*="background"],table[style*="background-color:#fff"],td[style*="background-color:#fff"],table[style*="background-color: #fff"],td[style*="background-color: #fff"]{{background-color:{bg}!important;}}
"#
        ));
    }
    css
}

/// Wrap a sanitized body in a complete themed document.
///
/// `<base target="_blank">` makes every link open outside the frame.
pub fn build_document(body: &str, theme: &ThemeDecision) -> String {
    format!(
        "<!doctype html><html><head>\
<meta charset=\"utf-8\"/>\
<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\"/>\
<base target=\"_blank\">\
<style>{}</style>\
</head><body>{}</body></html>",
        build_stylesheet(theme),
        body
    )
}
