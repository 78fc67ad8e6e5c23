//! Classifier client implementations.

#[cfg(feature = "groq")]
mod groq;

#[cfg(feature = "groq")]
pub use groq::{
    parse_completion, parse_retry_after, GroqModerationClient, DEFAULT_RETRY_AFTER, SYSTEM_PROMPT,
};
