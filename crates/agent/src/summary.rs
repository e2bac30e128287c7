//! Call summary extraction
//!
//! Two strategies produce the same categories (identity, purpose, callback,
//! action items, urgency):
//! - [`ExtractiveSummarizer`]: regex patterns over caller turns, deterministic
//! - [`GenerativeSummarizer`]: asks the language model for a fixed JSON shape
//!
//! Generative output is merged field by field over the extractive baseline,
//! and any generation or parse failure falls back to the baseline.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use call_screen_core::{
    CallSummary, CallbackInfo, DialogueError, LanguageModel, Profile, Speaker, Turn, Urgency,
};
use call_screen_llm::{build_summary_instructions, render_transcript, PromptBuilder};

/// Introductions: "this is Jordan", "my name is Jordan Lee", "I'm Jordan"
static NAME_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"\b(?i:this is|my name is|my name's|it's|i am|i'm)\s+([A-Z][a-zA-Z'\-]+(?:\s+[A-Z][a-zA-Z'\-]+)?)",
        r"\b([A-Z][a-z'\-]+)\s+(?i:here)\b",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

/// Organisation after "from", "I'm with", "work at" or "representing"
static COMPANY_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"\b(?i:calling from|from|i'm with|i am with|we're with|work (?:for|at)|representing)\s+([A-Z][\w&'\-]*(?:\s+[A-Z][\w&'\-]*)*)",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

/// Reason for the call, up to the end of the clause
static PURPOSE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)\b(?:calling|call|reaching out|ringing|getting in touch|following up)\s+(?:about|regarding|concerning|re)\s+([^.!?;,]+)",
        r"(?i)\b(?:it's|it is|this is)\s+(?:about|regarding)\s+([^.!?;,]+)",
        r"(?i)\b(?:want(?:ed)?|like|hoping) to (?:talk|speak|chat)\s+(?:(?:to|with)\s+[^.!?;,]+?\s+)?about\s+([^.!?;,]+)",
        r"(?i)\b(?:want(?:ed)?|like|hoping) to discuss\s+([^.!?;,]+)",
        r"(?i)\b(?:regarding|concerning)\s+([^.!?;,]+)",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

static PHONE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(\+?\d{1,2}[\s.\-]?\(?\d{3}\)?[\s.\-]?\d{3}[\s.\-]?\d{4})",
        r"(\(?\d{3}\)?[\s.\-]?\d{3}[\s.\-]?\d{4})",
        r"(\d{3}[\s.\-]\d{4})",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

static TIME_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)\b((?:after|before|around|by|at)\s+\d{1,2}(?::\d{2})?\s*(?:am|pm)?)\b",
        r"(?i)\b((?:tomorrow|today|tonight|this)\s+(?:morning|afternoon|evening))\b",
        r"(?i)\b((?:on\s+)?(?:monday|tuesday|wednesday|thursday|friday|saturday|sunday)(?:\s+(?:morning|afternoon|evening))?)\b",
        r"(?i)\b(tomorrow|tonight|later today|end of (?:the )?day)\b",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

static CALLBACK_REQUEST: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:call (?:me )?back|give me a call|reach me|get back to me|return my call|call me)\b",
    )
    .ok()
});

/// Sentences asking something of the screened person
static REQUEST_PATTERN: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:please|can you|could you|would you|make sure|let (?:him|her|them|\w+) know|tell (?:him|her|them|\w+)|remind|need (?:him|her|them|\w+) to)\b",
    )
    .ok()
});

static HIGH_URGENCY: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:urgent|urgently|asap|as soon as possible|emergency|immediately|right away|critical)\b").ok()
});

static MEDIUM_URGENCY: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:soon|today|this week|time[- ]sensitive|deadline|important)\b").ok()
});

/// Capitalised words that open a sentence without naming anyone
const NOT_NAMES: [&str; 24] = [
    "monday", "tuesday", "wednesday", "thursday", "friday", "saturday", "sunday",
    "january", "february", "march", "april", "may", "june", "july", "august",
    "september", "october", "november", "december", "me", "not", "just", "urgent", "about",
];

/// Leading articles dropped from extracted phrases
const LEADING_ARTICLES: [&str; 6] = ["the ", "a ", "an ", "your ", "our ", "some "];

/// Extracted call details, shared by both strategies
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SummaryFields {
    pub caller_name: Option<String>,
    pub caller_company: Option<String>,
    pub purpose: Option<String>,
    pub callback: Option<CallbackInfo>,
    pub action_items: Vec<String>,
    pub urgency: Urgency,
}

impl SummaryFields {
    /// Overlay `other` on top of `self`, keeping baseline values where
    /// `other` has nothing
    pub fn merge(mut self, other: SummaryFields) -> SummaryFields {
        if other.caller_name.is_some() {
            self.caller_name = other.caller_name;
        }
        if other.caller_company.is_some() {
            self.caller_company = other.caller_company;
        }
        if other.purpose.is_some() {
            self.purpose = other.purpose;
        }
        self.callback = match (self.callback, other.callback) {
            (Some(base), Some(generated)) => Some(CallbackInfo {
                name: generated.name.or(base.name),
                number: generated.number.or(base.number),
                preferred_time: generated.preferred_time.or(base.preferred_time),
            }),
            (base, generated) => generated.or(base),
        };
        if !other.action_items.is_empty() {
            self.action_items = other.action_items;
        }
        self.urgency = self.urgency.max_with(other.urgency);
        self
    }

    /// Copy the fields into a summary
    pub fn apply_to(self, summary: &mut CallSummary) {
        summary.caller_name = self.caller_name;
        summary.caller_company = self.caller_company;
        summary.purpose = self.purpose;
        summary.callback = self.callback.filter(|c| !c.is_empty());
        summary.action_items = self.action_items;
        summary.urgency = self.urgency;
    }
}

trait UrgencyExt {
    fn rank(&self) -> u8;
    fn max_with(self, other: Urgency) -> Urgency;
}

impl UrgencyExt for Urgency {
    fn rank(&self) -> u8 {
        match self {
            Urgency::Low => 0,
            Urgency::Medium => 1,
            Urgency::High => 2,
        }
    }

    fn max_with(self, other: Urgency) -> Urgency {
        if other.rank() > self.rank() {
            other
        } else {
            self
        }
    }
}

/// Rule-based extraction over caller turns
pub struct ExtractiveSummarizer;

impl ExtractiveSummarizer {
    /// Names and organisations that refer to the screened person are skipped
    pub fn extract(profile: &Profile, turns: &[Turn]) -> SummaryFields {
        let caller: Vec<&str> = turns
            .iter()
            .filter(|t| t.speaker == Speaker::Caller)
            .map(|t| t.content.as_str())
            .collect();

        let someone_else = |candidate: &str| names_someone_else(candidate, &profile.name);
        let caller_name =
            first_capture_where(&NAME_PATTERNS, &caller, someone_else).map(|n| clean_phrase(&n));
        let caller_company = first_capture_where(&COMPANY_PATTERNS, &caller, someone_else)
            .map(|c| clean_phrase(&c));
        let purpose = first_capture(&PURPOSE_PATTERNS, &caller)
            .map(|p| clean_phrase(&p))
            .filter(|p| !p.is_empty());

        let number = first_capture(&PHONE_PATTERNS, &caller).map(|n| n.trim().to_string());
        let preferred_time = first_capture(&TIME_PATTERNS, &caller).map(|t| t.trim().to_string());
        let wants_callback = caller.iter().any(|text| is_match(&CALLBACK_REQUEST, text));

        let callback = if number.is_some() || wants_callback {
            Some(CallbackInfo {
                name: caller_name.clone(),
                number,
                preferred_time,
            })
        } else {
            None
        };

        let mut action_items: Vec<String> = caller
            .iter()
            .flat_map(|text| sentences(*text))
            .filter(|s| is_match(&REQUEST_PATTERN, s))
            .map(|s| s.to_string())
            .collect();
        action_items.dedup();

        if let Some(callback) = &callback {
            action_items.push(callback_action(callback, caller_name.as_deref()));
        }

        let urgency = if caller.iter().any(|t| is_match(&HIGH_URGENCY, t)) {
            Urgency::High
        } else if caller.iter().any(|t| is_match(&MEDIUM_URGENCY, t)) {
            Urgency::Medium
        } else {
            Urgency::Low
        };

        SummaryFields {
            caller_name,
            caller_company,
            purpose,
            callback,
            action_items,
            urgency,
        }
    }
}

/// JSON shape requested from the model
#[derive(Debug, Default, Deserialize)]
struct GeneratedSummary {
    #[serde(default)]
    caller_name: Option<String>,
    #[serde(default)]
    caller_company: Option<String>,
    #[serde(default)]
    purpose: Option<String>,
    #[serde(default)]
    callback: Option<GeneratedCallback>,
    #[serde(default)]
    action_items: Vec<String>,
    #[serde(default)]
    urgency: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct GeneratedCallback {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    number: Option<String>,
    #[serde(default)]
    preferred_time: Option<String>,
}

impl From<GeneratedSummary> for SummaryFields {
    fn from(g: GeneratedSummary) -> Self {
        let callback = g
            .callback
            .map(|c| CallbackInfo {
                name: non_blank(c.name),
                number: non_blank(c.number),
                preferred_time: non_blank(c.preferred_time),
            })
            .filter(|c| !c.is_empty());

        SummaryFields {
            caller_name: non_blank(g.caller_name),
            caller_company: non_blank(g.caller_company),
            purpose: non_blank(g.purpose).map(|p| clean_phrase(&p)),
            callback,
            action_items: g
                .action_items
                .into_iter()
                .map(|a| a.trim().to_string())
                .filter(|a| !a.is_empty())
                .collect(),
            urgency: g
                .urgency
                .as_deref()
                .and_then(Urgency::parse)
                .unwrap_or_default(),
        }
    }
}

/// Model-based extraction
pub struct GenerativeSummarizer {
    llm: Arc<dyn LanguageModel>,
}

impl GenerativeSummarizer {
    pub fn new(llm: Arc<dyn LanguageModel>) -> Self {
        Self { llm }
    }

    /// Ask the model for the summary fields
    pub async fn generate(
        &self,
        profile: &Profile,
        turns: &[Turn],
    ) -> Result<SummaryFields, DialogueError> {
        let request = PromptBuilder::new(build_summary_instructions(profile))
            .user_message(format!("Transcript:\n{}", render_transcript(turns)))
            .temperature(0.0)
            .json_mode()
            .build();

        let response = self.llm.generate(request).await?;
        parse_generated(&response.text)
    }

    /// Generated fields over the extractive baseline, or the baseline alone
    /// when generation fails
    pub async fn summarize(&self, profile: &Profile, turns: &[Turn]) -> SummaryFields {
        let baseline = ExtractiveSummarizer::extract(profile, turns);
        match self.generate(profile, turns).await {
            Ok(generated) => baseline.merge(generated),
            Err(e) => {
                tracing::warn!(
                    model = %self.llm.model_name(),
                    error = %e,
                    "Generative summary failed, using extractive result"
                );
                baseline
            }
        }
    }
}

/// Parse model output, tolerating markdown code fences around the JSON
fn parse_generated(text: &str) -> Result<SummaryFields, DialogueError> {
    let trimmed = text.trim();
    let body = match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if end > start => &trimmed[start..=end],
        _ => {
            return Err(DialogueError::InvalidResponse(
                "summary output contains no JSON object".to_string(),
            ))
        }
    };

    serde_json::from_str::<GeneratedSummary>(body)
        .map(SummaryFields::from)
        .map_err(|e| DialogueError::InvalidResponse(e.to_string()))
}

fn first_capture(patterns: &[Regex], texts: &[&str]) -> Option<String> {
    texts.iter().find_map(|text| {
        patterns
            .iter()
            .find_map(|p| p.captures(text))
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
    })
}

/// First capture across all matches that passes `accept`
fn first_capture_where(
    patterns: &[Regex],
    texts: &[&str],
    accept: impl Fn(&str) -> bool,
) -> Option<String> {
    texts.iter().find_map(|text| {
        patterns.iter().find_map(|p| {
            p.captures_iter(text)
                .filter_map(|c| c.get(1))
                .map(|m| m.as_str())
                .find(|candidate| accept(candidate))
                .map(str::to_string)
        })
    })
}

/// False for weekdays, months and the screened person's own name
fn names_someone_else(candidate: &str, screened_for: &str) -> bool {
    let Some(first) = candidate.split_whitespace().next() else {
        return false;
    };
    let first = first.trim_end_matches("'s").to_lowercase();

    !NOT_NAMES.contains(&first.as_str())
        && !screened_for
            .split_whitespace()
            .any(|part| part.eq_ignore_ascii_case(&first))
}

fn is_match(pattern: &Lazy<Option<Regex>>, text: &str) -> bool {
    pattern.as_ref().map(|p| p.is_match(text)).unwrap_or(false)
}

fn sentences(text: &str) -> impl Iterator<Item = &str> {
    text.split(['.', '!', '?'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Trim punctuation and leading articles from an extracted phrase
fn clean_phrase(raw: &str) -> String {
    let mut phrase = raw
        .trim()
        .trim_end_matches(|c: char| c.is_ascii_punctuation())
        .trim();

    loop {
        let lower = phrase.to_lowercase();
        let rest = LEADING_ARTICLES
            .iter()
            .find(|a| lower.starts_with(*a))
            .and_then(|article| phrase.get(article.len()..));
        match rest {
            Some(rest) => phrase = rest.trim_start(),
            None => break,
        }
    }

    phrase.to_string()
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("null"))
}

fn callback_action(callback: &CallbackInfo, caller_name: Option<&str>) -> String {
    let mut action = format!("Call back {}", caller_name.unwrap_or("the caller"));
    if let Some(number) = &callback.number {
        action.push_str(&format!(" at {}", number));
    }
    if let Some(time) = &callback.preferred_time {
        action.push_str(&format!(" ({})", time));
    }
    action
}
