//! Prompt construction
//!
//! The persona lives entirely in the instruction text, which is a pure
//! function of the [`Profile`]. Conversation history is mapped onto chat
//! roles: caller turns become user messages, assistant turns (apologies and
//! notices included) become assistant messages.

use call_screen_core::{GenerateRequest, Message, Profile, Speaker, Turn};

/// Build the system instruction for one generation call
pub fn build_system_instructions(profile: &Profile) -> String {
    let name = &profile.name;
    let mut instructions = format!(
        r#"You are an AI assistant answering phone calls on behalf of {owner}.

## Opening
In your FIRST response, always start by:
- Identifying yourself as {name}'s AI assistant
- Saying they're unavailable right now
- Then addressing whatever the caller said or offering to help

## Your Approach
- Find out who is calling, what company they are with, why they are calling and what they need
- Identify what type of caller this is (recruiter, client, sales, personal, etc.) and adapt
- Take messages: get their name, a callback number, a good time to call back and the reason for calling
- Answer questions about {name} when the information below covers them

## Guidelines
- Keep every reply under {words} words; this is a phone call
- Be friendly and professional
- Ask one question at a time
- Confirm key details by repeating them back
- Don't make commitments on {name}'s behalf
- Speak naturally: no bullet points, headers or markdown
"#,
        owner = profile.description(),
        name = name,
        words = profile.max_reply_words,
    );

    if let Some(about) = non_empty(&profile.about) {
        instructions.push_str(&format!(
            "\n## About {}\n{}\nUse this to answer relevant questions, but don't volunteer all of it unprompted.\n",
            name, about
        ));
    }

    match non_empty(&profile.share_email) {
        Some(email) => instructions.push_str(&format!(
            "\n## Contact Info to Share\n- Email: {} (share if asked or if the caller needs to send information)\n",
            email
        )),
        None => instructions.push_str(
            "\n## Contact Info\n- Don't share personal contact information. Take their contact info instead.\n",
        ),
    }

    if let Some(special) = non_empty(&profile.special_instructions) {
        instructions.push_str(&format!("\n## Special Instructions\n{}\n", special));
    }

    instructions
}

/// Instruction for the generative call summary
pub fn build_summary_instructions(profile: &Profile) -> String {
    format!(
        r#"You extract structured information from a phone call transcript. The call was answered by an AI assistant on behalf of {name}.

Return a JSON object with exactly these fields:
{{
  "caller_name": string or null,
  "caller_company": string or null,
  "purpose": short phrase or null,
  "callback": {{"name": string or null, "number": string or null, "preferred_time": string or null}} or null,
  "action_items": array of short strings for {name},
  "urgency": "low" | "medium" | "high"
}}

Only use information the caller actually stated. Use null when something was not said."#,
        name = profile.name
    )
}

/// Render turns as plain "Caller:/Assistant:" lines
pub fn render_transcript(turns: &[Turn]) -> String {
    turns
        .iter()
        .map(|t| {
            let label = match t.speaker {
                Speaker::Caller => "Caller",
                Speaker::Assistant => "Assistant",
            };
            format!("{}: {}", label, t.content)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Builds a [`GenerateRequest`] from instructions and transcript turns
pub struct PromptBuilder {
    request: GenerateRequest,
}

impl PromptBuilder {
    pub fn new(system: impl Into<String>) -> Self {
        Self {
            request: GenerateRequest::new(system),
        }
    }

    /// Persona instructions for the given profile
    pub fn for_profile(profile: &Profile) -> Self {
        Self::new(build_system_instructions(profile))
    }

    pub fn with_turns(mut self, turns: &[Turn]) -> Self {
        self.request
            .messages
            .extend(turns.iter().map(|turn| match turn.speaker {
                Speaker::Caller => Message::user(turn.content.clone()),
                Speaker::Assistant => Message::assistant(turn.content.clone()),
            }));
        self
    }

    pub fn user_message(mut self, content: impl Into<String>) -> Self {
        self.request.messages.push(Message::user(content));
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.request = self.request.with_temperature(temperature);
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.request = self.request.with_max_tokens(max_tokens);
        self
    }

    pub fn json_mode(mut self) -> Self {
        self.request = self.request.with_json_mode(true);
        self
    }

    pub fn message_count(&self) -> usize {
        self.request.messages.len()
    }

    pub fn build(self) -> GenerateRequest {
        self.request
    }
}
