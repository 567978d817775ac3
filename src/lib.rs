//! Ebook content generation: outlines, chapter drafts and SEO metadata from
//! a hosted chat-completion model, with deterministic template fallbacks so
//! every call resolves to a well-formed result.

pub mod config;
pub mod models;
pub mod services;
pub mod utils;
