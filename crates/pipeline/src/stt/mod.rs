//! Speech-to-text adapters

mod deepgram;

pub use deepgram::{DeepgramStt, SttConfig};
