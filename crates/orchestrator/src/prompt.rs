//! Prompt composition — history plus the new query under a token budget.
//!
//! The builder is deterministic: the same (history, query) pair always
//! yields the same ModelRequest. When serialized history would blow the
//! budget, oldest messages are dropped first (sliding window); the new
//! query is never dropped.

use riskpilot_core::client::{ModelRequest, PromptMessage};
use riskpilot_core::error::PromptError;
use riskpilot_core::message::{Message, Role};
use tracing::debug;

use crate::token::{estimate_message_tokens, estimate_text_message_tokens, estimate_tokens};

/// Composes ModelRequests from session history and a new query.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    model: String,
    system_prompt: String,
    temperature: f32,
    max_tokens: Option<u32>,
    /// Token budget covering history plus the new query. The system prompt
    /// is fixed per deployment and sits outside the budget.
    context_budget: usize,
}

impl PromptBuilder {
    pub fn new(model: impl Into<String>, system_prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            system_prompt: system_prompt.into(),
            temperature: 0.2,
            max_tokens: None,
            context_budget: 4096,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_context_budget(mut self, tokens: usize) -> Self {
        self.context_budget = tokens;
        self
    }

    /// The configured context budget in tokens.
    pub fn context_budget(&self) -> usize {
        self.context_budget
    }

    /// Build a ModelRequest from history plus the new query.
    ///
    /// Fails with `InputTooLarge` when the query alone exceeds the budget;
    /// history alone never causes a failure, it just slides out.
    pub fn build(&self, history: &[Message], new_query: &str) -> Result<ModelRequest, PromptError> {
        let query_tokens = estimate_text_message_tokens(new_query);
        if query_tokens > self.context_budget {
            return Err(PromptError::InputTooLarge {
                query_tokens: estimate_tokens(new_query),
                budget: self.context_budget,
            });
        }

        // Walk history newest-first, keeping what fits in the remainder.
        let mut remaining = self.context_budget - query_tokens;
        let mut kept: Vec<&Message> = Vec::new();
        for message in history.iter().rev() {
            let cost = estimate_message_tokens(message);
            if cost > remaining {
                break;
            }
            remaining -= cost;
            kept.push(message);
        }

        if kept.len() < history.len() {
            debug!(
                dropped = history.len() - kept.len(),
                kept = kept.len(),
                budget = self.context_budget,
                "Sliding window dropped oldest history"
            );
        }

        let mut messages = Vec::with_capacity(kept.len() + 2);
        messages.push(PromptMessage::new(Role::System, self.system_prompt.clone()));
        for message in kept.iter().rev() {
            messages.push(PromptMessage::new(message.role, message.content.clone()));
        }
        messages.push(PromptMessage::new(Role::User, new_query));

        Ok(ModelRequest {
            model: self.model.clone(),
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> PromptBuilder {
        PromptBuilder::new("mistral-large-latest", "Be precise.").with_context_budget(64)
    }

    fn history_pair(question: &str, answer: &str) -> Vec<Message> {
        vec![Message::user(question), Message::assistant(answer)]
    }

    #[test]
    fn builds_system_history_query() {
        let history = history_pair("q1", "a1");
        let req = builder().build(&history, "q2").unwrap();

        assert_eq!(req.model, "mistral-large-latest");
        assert_eq!(req.messages.len(), 4);
        assert_eq!(req.messages[0].role, Role::System);
        assert_eq!(req.messages[1].content, "q1");
        assert_eq!(req.messages[2].content, "a1");
        assert_eq!(req.messages[3], PromptMessage::new(Role::User, "q2"));
    }

    #[test]
    fn deterministic_for_same_input() {
        let history = history_pair("q1", "a1");
        let b = builder();
        assert_eq!(
            b.build(&history, "q2").unwrap(),
            b.build(&history, "q2").unwrap()
        );
    }

    #[test]
    fn empty_history_is_fine() {
        let req = builder().build(&[], "first question").unwrap();
        assert_eq!(req.messages.len(), 2);
        assert_eq!(req.messages[1].content, "first question");
    }

    #[test]
    fn oldest_messages_slide_out_first() {
        // Each 28-char message costs 7 + 4 = 11 tokens; query costs 11.
        // Budget 64 leaves 53 for history → 4 messages fit, oldest dropped.
        let history: Vec<Message> = (0..6)
            .map(|i| {
                let text = format!("message number {i} padding xxx");
                assert_eq!(text.len(), 28);
                if i % 2 == 0 {
                    Message::user(text)
                } else {
                    Message::assistant(text)
                }
            })
            .collect();

        let req = builder().build(&history, "0123456789012345678901234567").unwrap();

        // system + 4 newest history + query
        assert_eq!(req.messages.len(), 6);
        assert!(req.messages[1].content.contains("number 2"));
        assert!(req.messages[4].content.contains("number 5"));
        assert_eq!(req.messages[5].content, "0123456789012345678901234567");
    }

    #[test]
    fn window_never_exceeds_budget() {
        let history: Vec<Message> = (0..50)
            .map(|i| Message::user(format!("question {i} with some padding text")))
            .collect();
        let b = builder();
        let req = b.build(&history, "the new query").unwrap();

        let spent: usize = req
            .messages
            .iter()
            .skip(1) // system prompt sits outside the budget
            .map(|m| crate::token::estimate_text_message_tokens(&m.content))
            .sum();
        assert!(spent <= b.context_budget());
        // The new query is always last and intact.
        assert_eq!(req.messages.last().unwrap().content, "the new query");
    }

    #[test]
    fn oversized_query_is_rejected() {
        let huge = "x".repeat(64 * 4 + 16);
        match builder().build(&[], &huge) {
            Err(PromptError::InputTooLarge { budget, .. }) => assert_eq!(budget, 64),
            other => panic!("Expected InputTooLarge, got: {other:?}"),
        }
    }

    #[test]
    fn query_exactly_at_budget_passes() {
        // 240 chars → 60 tokens + 4 overhead = 64 = budget.
        let query = "y".repeat(240);
        let req = builder().build(&[], &query).unwrap();
        assert_eq!(req.messages.len(), 2);
    }

    #[test]
    fn generation_parameters_flow_through() {
        let req = PromptBuilder::new("mistral-large-latest", "sys")
            .with_temperature(0.7)
            .with_max_tokens(650)
            .build(&[], "q")
            .unwrap();
        assert!((req.temperature - 0.7).abs() < f32::EPSILON);
        assert_eq!(req.max_tokens, Some(650));
    }
}
