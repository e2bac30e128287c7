//! Core traits for the call screening pipeline
//!
//! Every external capability sits behind one of these traits so the
//! orchestrator can be driven by real providers or by test doubles.
//!
//! ```text
//! Speech:
//!   - SpeechToText: caller audio → text + confidence
//!   - TextToSpeech: reply text → audio
//!
//! Language:
//!   - LanguageModel: transcript history → next reply
//!
//! Delivery:
//!   - AudioSink: plays synthesized audio back to the caller
//!   - SummaryHandoff: receives the summary at call end
//! ```

mod delivery;
mod llm;
mod speech;

pub use delivery::{AudioSink, SummaryHandoff};
pub use llm::LanguageModel;
pub use speech::{SpeechToText, TextToSpeech};
