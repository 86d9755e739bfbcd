//! Keyword-matched chat.
//!
//! Messages are classified by an ordered route table: the first route whose
//! vocabulary appears in the message wins. Absence requests start a two-turn
//! flow that asks for the reason before calling `report_absence`.

use chrono::{Local, NaiveDate};
use serde_json::json;

use crate::assistant::context::{ChatContext, PendingCall};
use crate::assistant::dates::{format_long, parse_date};
use crate::client::ToolBackend;
use crate::mcp::dispatcher::result_text;
use crate::mcp::schema::DATE_FORMAT;
use crate::tools::{absence, menu};

/// First message of every conversation.
pub const GREETING: &str = "Hello! 👋 I'm your School Assistant. How can I help you today?";

/// Reply after the conversation is cleared.
pub const CLEARED: &str = "Chat cleared! How can I help you?";

const HOMEWORK_SOON: &str = "📚 **Coming Soon!** The homework and schedule features are currently under development. Stay tuned!";

const CHAT_SOON: &str = "💬 **Coming Soon!** General chat functionality is currently under development. For now, I can help you report absences or check the lunch menu!";

const REASON_AGAIN: &str = "Please tell me the reason for your absence:";

/// What a message is asking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    /// Reporting an absence.
    Absence,
    /// Asking about lunch.
    Menu,
    /// Homework or schedule questions.
    Homework,
    /// Anything else.
    Chat,
}

struct Route {
    intent: Intent,
    keywords: &'static [&'static str],
}

/// Checked in order; the first match wins.
const ROUTES: &[Route] = &[
    Route {
        intent: Intent::Absence,
        keywords: &["absent", "absence", "miss school", "won't be there"],
    },
    Route {
        intent: Intent::Menu,
        keywords: &["lunch", "menu", "food", "eat"],
    },
    Route {
        intent: Intent::Homework,
        keywords: &["homework", "schedule", "class"],
    },
];

/// Classifies a message by the route table.
#[must_use]
pub fn classify(text: &str) -> Intent {
    let lower = text.to_lowercase();
    ROUTES
        .iter()
        .find(|route| route.keywords.iter().any(|k| lower.contains(k)))
        .map_or(Intent::Chat, |route| route.intent)
}

/// Routes chat messages to tools by keyword.
pub struct KeywordRouter {
    backend: Box<dyn ToolBackend>,
}

impl KeywordRouter {
    /// Creates a router calling tools through `backend`.
    #[must_use]
    pub fn new(backend: Box<dyn ToolBackend>) -> Self {
        Self { backend }
    }

    /// Ends the conversation with the backend, closing any server session.
    pub async fn close(&mut self) {
        if let Err(e) = self.backend.close().await {
            tracing::warn!(error = %e, "Failed to close tool session");
        }
    }

    /// Answers one message, using the local date as "today".
    pub async fn respond(&mut self, ctx: &mut ChatContext, text: &str) -> String {
        self.respond_on(ctx, text, Local::now().date_naive()).await
    }

    /// Answers one message relative to `today`.
    ///
    /// A parked call is completed (or re-asked, if the answer is blank)
    /// before any classification happens. The parked call is cleared once
    /// it is sent, whether or not the call succeeds.
    pub async fn respond_on(&mut self, ctx: &mut ChatContext, text: &str, today: NaiveDate) -> String {
        if let Some(pending) = ctx.take() {
            return self.complete(ctx, pending, text).await;
        }

        match classify(text) {
            Intent::Absence => {
                let date = parse_date(text, today);
                ctx.begin(
                    PendingCall::new(absence::NAME, "reason")
                        .with_arg("date", date.format(DATE_FORMAT).to_string()),
                );
                format!(
                    "📅 I'll help you report an absence for **{}**.\n\n{REASON_AGAIN}",
                    format_long(date)
                )
            }
            Intent::Menu => self.lunch_menu(parse_date(text, today)).await,
            Intent::Homework => HOMEWORK_SOON.to_string(),
            Intent::Chat => CHAT_SOON.to_string(),
        }
    }

    async fn complete(&mut self, ctx: &mut ChatContext, pending: PendingCall, answer: &str) -> String {
        let answer = answer.trim();
        if answer.is_empty() {
            ctx.begin(pending);
            return REASON_AGAIN.to_string();
        }

        let (tool, args) = pending.complete(answer);
        match self.backend.call_tool(&tool, args).await {
            Ok(result) => format!("✅ {}", result_text(&result)),
            Err(e) => {
                tracing::warn!(tool = %tool, error = %e, "Tool call failed");
                e.user_message()
            }
        }
    }

    async fn lunch_menu(&mut self, date: NaiveDate) -> String {
        let args = json!({ "date": date.format(DATE_FORMAT).to_string() });
        match self.backend.call_tool(menu::NAME, args).await {
            Ok(result) => format!(
                "🍽️ Lunch Menu ({})\n\n{}",
                format_long(date),
                result_text(&result)
            ),
            Err(e) => {
                tracing::warn!(tool = menu::NAME, error = %e, "Tool call failed");
                e.user_message()
            }
        }
    }
}

impl std::fmt::Debug for KeywordRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeywordRouter").finish_non_exhaustive()
    }
}
