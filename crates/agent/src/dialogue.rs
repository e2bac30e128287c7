//! Dialogue engine
//!
//! Holds the persona and the append-only transcript for one call. Every
//! generation call rebuilds the instruction from the [`Profile`] and sends
//! the full history; calls are short enough that nothing is trimmed.

use std::sync::Arc;

use unicode_segmentation::UnicodeSegmentation;

use call_screen_config::SummaryStrategyKind;
use call_screen_core::{
    CallSummary, DialogueError, LanguageModel, Profile, Transcript, Turn,
};
use call_screen_llm::PromptBuilder;

use crate::summary::{ExtractiveSummarizer, GenerativeSummarizer};

/// Persona, history and generation for one call
pub struct DialogueEngine {
    session_id: String,
    profile: Arc<Profile>,
    llm: Arc<dyn LanguageModel>,
    transcript: Transcript,
    summary_strategy: SummaryStrategyKind,
}

impl DialogueEngine {
    pub fn new(
        session_id: impl Into<String>,
        profile: Arc<Profile>,
        llm: Arc<dyn LanguageModel>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            profile,
            llm,
            transcript: Transcript::new(),
            summary_strategy: SummaryStrategyKind::default(),
        }
    }

    pub fn with_summary_strategy(mut self, strategy: SummaryStrategyKind) -> Self {
        self.summary_strategy = strategy;
        self
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Record the caller's text, generate a reply and record it
    ///
    /// On failure the caller turn stays recorded and no assistant turn is
    /// added.
    pub async fn respond(&mut self, caller_text: &str) -> Result<String, DialogueError> {
        self.record_caller(caller_text, None);
        let reply = self.generate_reply().await?;
        self.record_assistant(&reply);
        Ok(reply)
    }

    pub fn record_caller(&mut self, text: &str, confidence: Option<f32>) -> &Turn {
        self.transcript.push(Turn::caller(text.trim(), confidence))
    }

    pub fn record_assistant(&mut self, text: &str) -> &Turn {
        self.transcript.push(Turn::assistant(text))
    }

    pub fn record_apology(&mut self, text: &str) -> &Turn {
        self.transcript.push(Turn::apology(text))
    }

    pub fn record_notice(&mut self, text: &str) -> &Turn {
        self.transcript.push(Turn::notice(text))
    }

    /// Generate the next assistant reply without touching the transcript
    ///
    /// Replies over the profile's word budget are cut at a word boundary.
    pub async fn generate_reply(&self) -> Result<String, DialogueError> {
        let request = PromptBuilder::for_profile(&self.profile)
            .with_turns(self.transcript.turns())
            .build();

        let response = self.llm.generate(request).await?;
        let text = response.text.trim();
        if text.is_empty() {
            return Err(DialogueError::EmptyResponse);
        }

        let reply = truncate_to_words(text, self.profile.max_reply_words);
        if reply.len() < text.len() {
            tracing::debug!(
                session_id = %self.session_id,
                budget = self.profile.max_reply_words,
                "Reply truncated to word budget"
            );
        }

        Ok(reply)
    }

    /// Structured summary of the whole transcript
    pub async fn summarize(&self) -> CallSummary {
        let turns = self.transcript.turns();

        let fields = match self.summary_strategy {
            SummaryStrategyKind::Extractive => ExtractiveSummarizer::extract(&self.profile, turns),
            SummaryStrategyKind::Generative => {
                GenerativeSummarizer::new(self.llm.clone())
                    .summarize(&self.profile, turns)
                    .await
            }
        };

        let mut summary = CallSummary::new(&self.session_id, &self.profile.name);
        fields.apply_to(&mut summary);
        summary.turn_count = self.transcript.len();
        summary
    }
}

/// Cut `text` after `max_words` words, ending it as a sentence
///
/// Words are counted with Unicode word boundaries, so contractions and
/// non-Latin scripts count the way a listener would hear them.
pub fn truncate_to_words(text: &str, max_words: usize) -> String {
    if max_words == 0 {
        return text.to_string();
    }

    let mut words = 0;
    for (idx, segment) in text.split_word_bound_indices() {
        if !segment.chars().any(char::is_alphanumeric) {
            continue;
        }
        if words == max_words {
            let kept = text[..idx]
                .trim_end()
                .trim_end_matches(|c: char| matches!(c, ',' | ';' | ':' | '-'))
                .trim_end();
            return if kept.ends_with(['.', '!', '?']) {
                kept.to_string()
            } else {
                format!("{}.", kept)
            };
        }
        words += 1;
    }

    text.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use call_screen_core::{GenerateRequest, GenerateResponse, Role, Speaker};
    use parking_lot::Mutex;

    /// Replies with queued texts and keeps every request it saw
    struct ScriptedModel {
        replies: Mutex<Vec<Result<String, DialogueError>>>,
        requests: Mutex<Vec<GenerateRequest>>,
    }

    impl ScriptedModel {
        fn new(replies: Vec<Result<String, DialogueError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies),
                requests: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LanguageModel for ScriptedModel {
        async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, DialogueError> {
            self.requests.lock().push(request);
            let mut replies = self.replies.lock();
            if replies.is_empty() {
                return Err(DialogueError::Unavailable("script exhausted".into()));
            }
            replies.remove(0).map(GenerateResponse::text)
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }

    fn engine(llm: Arc<ScriptedModel>) -> DialogueEngine {
        DialogueEngine::new("call-1", Arc::new(Profile::new("Alex")), llm)
            .with_summary_strategy(SummaryStrategyKind::Extractive)
    }

    #[tokio::test]
    async fn test_respond_appends_both_turns() {
        let llm = ScriptedModel::new(vec![Ok(
            "Hi Jordan, I'm Alex's AI assistant. What about the proposal should I pass on?".into(),
        )]);
        let mut engine = engine(llm.clone());

        let reply = engine
            .respond("Hi, this is Jordan calling about the marketing proposal.")
            .await
            .unwrap();

        assert!(reply.contains("AI assistant"));
        let turns = engine.transcript().turns();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].speaker, Speaker::Caller);
        assert_eq!(turns[1].speaker, Speaker::Assistant);
        assert_eq!(turns[1].content, reply);
    }

    #[tokio::test]
    async fn test_instruction_rebuilt_with_full_history() {
        let llm = ScriptedModel::new(vec![Ok("First reply.".into()), Ok("Second reply.".into())]);
        let mut engine = engine(llm.clone());

        engine.respond("Hello?").await.unwrap();
        engine.respond("Is Alex around?").await.unwrap();

        let requests = llm.requests.lock();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].system_prompt(), requests[1].system_prompt());
        assert!(requests[1]
            .system_prompt()
            .unwrap()
            .contains("Alex's AI assistant"));

        let history = requests[1].conversation();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].role, Role::User);
        assert_eq!(history[1].role, Role::Assistant);
        assert_eq!(history[2].content, "Is Alex around?");
    }

    #[tokio::test]
    async fn test_failure_adds_no_assistant_turn() {
        let llm = ScriptedModel::new(vec![Err(DialogueError::Timeout(
            std::time::Duration::from_secs(20),
        ))]);
        let mut engine = engine(llm);

        let err = engine.respond("Hello?").await.unwrap_err();
        assert!(matches!(err, DialogueError::Timeout(_)));
        assert_eq!(engine.transcript().len(), 1);
        assert_eq!(engine.transcript().assistant_utterances(), 0);
    }

    #[tokio::test]
    async fn test_blank_reply_is_error() {
        let llm = ScriptedModel::new(vec![Ok("   ".into())]);
        let mut engine = engine(llm);
        engine.record_caller("Hello?", Some(0.9));

        assert_eq!(
            engine.generate_reply().await.unwrap_err(),
            DialogueError::EmptyResponse
        );
    }

    #[tokio::test]
    async fn test_generate_reply_does_not_mutate() {
        let llm = ScriptedModel::new(vec![Ok("Sure.".into())]);
        let mut engine = engine(llm);
        engine.record_caller("Can you take a message?", Some(0.9));

        engine.generate_reply().await.unwrap();
        assert_eq!(engine.transcript().len(), 1);
    }

    #[tokio::test]
    async fn test_long_reply_truncated() {
        let long = (1..=80).map(|i| format!("word{}", i)).collect::<Vec<_>>().join(" ");
        let llm = ScriptedModel::new(vec![Ok(long)]);
        let mut engine = engine(llm);

        let reply = engine.respond("Tell me everything").await.unwrap();
        assert_eq!(reply.split_whitespace().count(), 50);
        assert!(reply.ends_with("word50."));
    }

    #[tokio::test]
    async fn test_summarize_is_repeatable() {
        let llm = ScriptedModel::new(vec![Ok("Hi Jordan, what should I tell Alex?".into())]);
        let mut engine = engine(llm);
        engine
            .respond("Hi, this is Jordan calling about the marketing proposal.")
            .await
            .unwrap();

        let first = engine.summarize().await;
        let second = engine.summarize().await;

        assert_eq!(first.caller_name.as_deref(), Some("Jordan"));
        assert_eq!(first.purpose.as_deref(), Some("marketing proposal"));
        assert_eq!(first.screened_for, "Alex");
        assert_eq!(first.turn_count, 2);
        assert_eq!(first.caller_name, second.caller_name);
        assert_eq!(first.purpose, second.purpose);
        assert_eq!(first.action_items, second.action_items);
    }

    #[test]
    fn test_truncate_to_words() {
        assert_eq!(truncate_to_words("one two three four", 2), "one two.");
        assert_eq!(truncate_to_words("one, two, three", 2), "one, two.");
        assert_eq!(truncate_to_words("Hi there! How are you?", 2), "Hi there!");
        assert_eq!(truncate_to_words("short reply", 50), "short reply");
        assert_eq!(truncate_to_words("I don't know yet", 2), "I don't.");
    }
}
