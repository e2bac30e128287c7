//! Speech adapters for the call screening pipeline
//!
//! - [`DeepgramStt`]: prerecorded transcription of one caller segment
//! - [`ElevenLabsTts`]: full-utterance synthesis of one assistant reply
//!
//! Both wrap an external HTTP capability and convert every fault into the
//! typed error kinds from `call-screen-core`.

pub mod factory;
pub mod stt;
pub mod tts;

pub use factory::{create_stt, create_tts};
pub use stt::{DeepgramStt, SttConfig};
pub use tts::{ElevenLabsTts, TtsConfig};

use thiserror::Error;

/// Adapter construction errors
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Failed to create HTTP client: {0}")]
    Client(String),
}
