//! Text generation backends for the issue bot.
//!
//! Implements [`pipeline::ContentGenerator`] for Google's Gemini
//! `generateContent` API. Request formatting, response parsing and back-off
//! live here; the orchestration layer sees only prompts and text.

mod gemini;

pub use gemini::{
    GeminiConfig, GeminiGenerator, SetupError, DEFAULT_GEMINI_API_BASE, DEFAULT_GEMINI_MODEL,
};
