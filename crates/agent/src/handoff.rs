//! Summary handoff collaborators

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use call_screen_config::{HandoffKind, HandoffSettings};
use call_screen_core::{CallSummary, HandoffError, SummaryHandoff};

use crate::CallError;

/// Writes the summary as a structured log record
pub struct LogHandoff;

#[async_trait]
impl SummaryHandoff for LogHandoff {
    async fn deliver(&self, summary: &CallSummary) -> Result<(), HandoffError> {
        tracing::info!(
            session_id = %summary.session_id,
            screened_for = %summary.screened_for,
            caller_name = ?summary.caller_name,
            caller_company = ?summary.caller_company,
            purpose = ?summary.purpose,
            needs_callback = summary.needs_callback(),
            urgency = ?summary.urgency,
            action_items = summary.action_items.len(),
            end_reason = ?summary.end_reason,
            "{}",
            summary.headline()
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}

/// POSTs the summary as JSON to a configured URL
pub struct WebhookHandoff {
    url: String,
    client: reqwest::Client,
}

impl WebhookHandoff {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, CallError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CallError::Configuration(e.to_string()))?;

        Ok(Self {
            url: url.into(),
            client,
        })
    }
}

#[async_trait]
impl SummaryHandoff for WebhookHandoff {
    async fn deliver(&self, summary: &CallSummary) -> Result<(), HandoffError> {
        let response = self
            .client
            .post(&self.url)
            .json(summary)
            .send()
            .await
            .map_err(|e| HandoffError::Delivery(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(HandoffError::Rejected(status.as_u16()));
        }

        tracing::debug!(
            session_id = %summary.session_id,
            url = %self.url,
            "Summary delivered to webhook"
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "webhook"
    }
}

/// Build the configured handoff
pub fn create_handoff(settings: &HandoffSettings) -> Result<Arc<dyn SummaryHandoff>, CallError> {
    match settings.kind {
        HandoffKind::Log => Ok(Arc::new(LogHandoff)),
        HandoffKind::Webhook => {
            let url = settings
                .webhook_url
                .as_deref()
                .filter(|u| !u.trim().is_empty())
                .ok_or_else(|| {
                    CallError::Configuration("handoff.webhook_url is required".to_string())
                })?;
            Ok(Arc::new(WebhookHandoff::new(
                url,
                Duration::from_millis(settings.timeout_ms),
            )?))
        }
    }
}
