//! Text-to-speech adapters

mod elevenlabs;

pub use elevenlabs::{ElevenLabsTts, TtsConfig};
