//! Remote backends: Gemini for text, Google Cloud TTS for speech.

pub mod gemini;
pub mod google_tts;
pub mod shared;

pub use shared::{ProviderError, ProviderErrorKind, ProviderResult};
