//! Default endpoints, models and timeouts
//!
//! Single source for provider defaults so the settings structs, the
//! adapters and the sample config file agree.

/// Provider base URLs
pub mod endpoints {
    pub const OPENAI: &str = "https://api.openai.com/v1";
    pub const ANTHROPIC: &str = "https://api.anthropic.com";
    pub const OLLAMA: &str = "http://localhost:11434";
    pub const DEEPGRAM: &str = "https://api.deepgram.com";
    pub const ELEVENLABS: &str = "https://api.elevenlabs.io";
}

/// Provider model identifiers
pub mod models {
    pub const OPENAI_CHAT: &str = "gpt-4-turbo";
    pub const ANTHROPIC_CHAT: &str = "claude-3-5-sonnet-20241022";
    pub const OLLAMA_CHAT: &str = "llama3.2";
    pub const DEEPGRAM_STT: &str = "nova-3";
    pub const ELEVENLABS_TTS: &str = "eleven_monolingual_v1";
    pub const ELEVENLABS_VOICE: &str = "sB1b5zUrxQVAFl2PhZFp";
}

/// Adapter call timeouts (milliseconds)
pub mod timeouts {
    pub const STT_MS: u64 = 10_000;
    pub const LLM_MS: u64 = 20_000;
    pub const TTS_MS: u64 = 15_000;
    pub const HANDOFF_MS: u64 = 5_000;
}

/// Environment variables consulted when a key is absent from config files
pub mod api_key_vars {
    pub const OPENAI: &str = "OPENAI_API_KEY";
    pub const ANTHROPIC: &str = "ANTHROPIC_API_KEY";
    pub const DEEPGRAM: &str = "DEEPGRAM_API_KEY";
    pub const ELEVENLABS: &str = "ELEVENLABS_API_KEY";
}
