//! `mailframe`: themed, sandboxed rendering of third-party HTML email.
//!
//! The crate classifies an email body as a structured (newsletter-style)
//! layout or plain prose, strips inline attachment images, picks a light or
//! dark palette, sanitizes the markup and wraps it in a standalone document.
//! [`render::Renderer`] then mounts that document into a host container
//! through an off-screen measurement probe.

pub mod config;
pub mod error;
pub mod i18n;
pub mod model;
pub mod parser;
pub mod render;
