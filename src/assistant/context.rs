//! Per-conversation state.

use serde_json::{Map, Value};

/// A tool call waiting on one more answer from the user.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingCall {
    tool: String,
    args: Map<String, Value>,
    awaiting: String,
}

impl PendingCall {
    /// Starts a call to `tool` whose `awaiting` argument is still unknown.
    #[must_use]
    pub fn new(tool: impl Into<String>, awaiting: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            args: Map::new(),
            awaiting: awaiting.into(),
        }
    }

    /// Records an argument that is already known.
    #[must_use]
    pub fn with_arg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.args.insert(name.into(), value.into());
        self
    }

    /// Tool the call is for.
    #[must_use]
    pub fn tool(&self) -> &str {
        &self.tool
    }

    /// Name of the argument still missing.
    #[must_use]
    pub fn awaiting(&self) -> &str {
        &self.awaiting
    }

    /// Arguments collected so far.
    #[must_use]
    pub const fn args(&self) -> &Map<String, Value> {
        &self.args
    }

    /// Fills in the missing argument and returns the tool name and arguments.
    #[must_use]
    pub fn complete(mut self, answer: &str) -> (String, Value) {
        self.args.insert(self.awaiting, Value::from(answer));
        (self.tool, Value::Object(self.args))
    }
}

/// State of one conversation, owned by whoever drives it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatContext {
    pending: Option<PendingCall>,
}

impl ChatContext {
    /// A fresh conversation.
    #[must_use]
    pub const fn new() -> Self {
        Self { pending: None }
    }

    /// Whether the next message answers a follow-up question.
    #[must_use]
    pub const fn is_awaiting(&self) -> bool {
        self.pending.is_some()
    }

    /// The call waiting on an answer, if any.
    #[must_use]
    pub const fn pending(&self) -> Option<&PendingCall> {
        self.pending.as_ref()
    }

    /// Parks a call until the next message.
    pub fn begin(&mut self, call: PendingCall) {
        self.pending = Some(call);
    }

    /// Removes and returns the parked call, clearing the flag.
    pub fn take(&mut self) -> Option<PendingCall> {
        self.pending.take()
    }

    /// Forgets any parked call.
    pub fn reset(&mut self) {
        self.pending = None;
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn complete_fills_the_awaited_argument() {
        let call = PendingCall::new("report_absence", "reason").with_arg("date", "2025-11-09");
        let (tool, args) = call.complete("dentist");
        assert_eq!(tool, "report_absence");
        assert_eq!(args, json!({"date": "2025-11-09", "reason": "dentist"}));
    }

    #[test]
    fn take_clears_the_flag() {
        let mut ctx = ChatContext::new();
        ctx.begin(PendingCall::new("report_absence", "reason"));
        assert!(ctx.is_awaiting());
        assert!(ctx.take().is_some());
        assert!(!ctx.is_awaiting());
        assert!(ctx.take().is_none());
    }

    #[test]
    fn contexts_are_independent() {
        let mut first = ChatContext::new();
        let second = ChatContext::new();
        first.begin(PendingCall::new("report_absence", "reason"));
        assert!(first.is_awaiting());
        assert!(!second.is_awaiting());
        first.reset();
        assert_eq!(first, second);
    }
}
