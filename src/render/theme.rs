//! Color scheme resolution for the embedded document.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::classify::Classification;
use crate::error::RenderError;

/// The host application's theme setting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostTheme {
    /// Dark palette (the default when the host sets nothing).
    #[default]
    Dark,
    /// Light palette.
    Light,
    /// Follow the system color-scheme preference.
    Auto,
}

impl HostTheme {
    /// Parse a host theme attribute, treating unknown or missing values as dark.
    pub fn from_attr(value: Option<&str>) -> Self {
        value.and_then(|v| v.parse().ok()).unwrap_or_default()
    }

    /// Collapse `Auto` using the system preference.
    pub fn resolve(self, system_prefers_dark: bool) -> ColorScheme {
        match self {
            Self::Dark => ColorScheme::Dark,
            Self::Light => ColorScheme::Light,
            Self::Auto if system_prefers_dark => ColorScheme::Dark,
            Self::Auto => ColorScheme::Light,
        }
    }
}

impl FromStr for HostTheme {
    type Err = RenderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dark" => Ok(Self::Dark),
            "light" => Ok(Self::Light),
            "auto" => Ok(Self::Auto),
            other => Err(RenderError::InvalidTheme(other.to_string())),
        }
    }
}

/// Concrete scheme of a rendered document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorScheme {
    Light,
    Dark,
}

impl ColorScheme {
    /// Value for the CSS `color-scheme` property.
    pub fn as_css(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }
}

impl fmt::Display for ColorScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_css())
    }
}

/// Final colors for one rendered email.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ThemeDecision {
    pub background: &'static str,
    pub foreground: &'static str,
    pub color_scheme: ColorScheme,
}

impl ThemeDecision {
    /// White canvas with near-black text.
    pub const WHITE: Self = Self {
        background: "#ffffff",
        foreground: "#111111",
        color_scheme: ColorScheme::Light,
    };

    /// Dark canvas with light gray text.
    pub const DARK: Self = Self {
        background: "#2a2a2a",
        foreground: "#e6e6e6",
        color_scheme: ColorScheme::Dark,
    };

    /// `true` for the white palette.
    pub fn is_white(&self) -> bool {
        self.color_scheme == ColorScheme::Light
    }
}

/// Pick the palette for an email.
///
/// Structured layouts and bodies that declare a white background always get
/// the white canvas; everything else follows the host theme.
pub fn resolve(
    host: HostTheme,
    system_prefers_dark: bool,
    classification: &Classification,
) -> ThemeDecision {
    let use_white = classification.is_structured
        || classification.prefer_white
        || host.resolve(system_prefers_dark) == ColorScheme::Light;
    if use_white {
        ThemeDecision::WHITE
    } else {
        ThemeDecision::DARK
    }
}
