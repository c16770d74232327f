//! Core data model types: the email content handed to the renderer and its attachments.

pub mod attachment;
pub mod content;
