//! Token-bounded prompt assembly.
//!
//! Layout of a built prompt:
//!
//! ```text
//! [system] [few-shot 1 .. few-shot n] [history, oldest kept .. newest] [current user turn]
//! ```
//!
//! The current turn is always present. History is admitted newest first
//! and admission stops at the first message that would overflow the
//! budget, so a kept message never has an older dropped one after it.

use sourcewell_core::error::TokenError;
use sourcewell_core::message::{Message, MessageContent};
use tracing::debug;

use crate::token::TokenCounter;

/// Which messages count against the budget.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BudgetPolicy {
    /// Only the current turn and history are counted
    #[default]
    HistoryOnly,
    /// System prompt and few-shots are counted too
    Everything,
}

impl std::str::FromStr for BudgetPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "history_only" => Ok(Self::HistoryOnly),
            "everything" => Ok(Self::Everything),
            other => Err(format!("unknown budget policy '{other}'")),
        }
    }
}

/// The result of [`MessageBuilder::build`].
#[derive(Debug, Clone)]
pub struct BuiltPrompt {
    pub messages: Vec<Message>,
    /// Tokens counted against the budget under the builder's policy
    pub counted_tokens: usize,
    /// History messages left out because of the budget
    pub dropped_history: usize,
}

impl BuiltPrompt {
    /// The current user turn.
    pub fn current_turn(&self) -> Option<&Message> {
        self.messages.last()
    }
}

/// Assembles prompts with a token counter and a budget policy.
pub struct MessageBuilder<'a> {
    counter: &'a dyn TokenCounter,
    policy: BudgetPolicy,
}

impl<'a> MessageBuilder<'a> {
    pub fn new(counter: &'a dyn TokenCounter) -> Self {
        Self {
            counter,
            policy: BudgetPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: BudgetPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Build a prompt.
    ///
    /// `history` is the conversation so far with the current turn last;
    /// that last entry is skipped because `user_content` replaces it.
    /// `max_tokens` is the budget left after reserving completion tokens.
    pub fn build(
        &self,
        system_prompt: &str,
        model_id: &str,
        history: &[Message],
        user_content: impl Into<MessageContent>,
        max_tokens: usize,
        few_shots: &[Message],
    ) -> Result<BuiltPrompt, TokenError> {
        let mut messages = Vec::with_capacity(2 + few_shots.len() + history.len());
        messages.push(Message::system(system_prompt));
        messages.extend(few_shots.iter().cloned());

        let user = Message::user(user_content);
        let mut total = self.counter.count(&user, model_id)?;
        if self.policy == BudgetPolicy::Everything {
            total += self.counter.count_all(&messages, model_id)?;
        }

        let prior = match history.split_last() {
            Some((_, prior)) => prior,
            None => &[],
        };

        // History goes between the few-shots and the current turn
        let insert_at = messages.len();
        let mut kept = 0;
        for message in prior.iter().rev() {
            let cost = self.counter.count(message, model_id)?;
            if total + cost > max_tokens {
                debug!(
                    max_tokens,
                    kept,
                    dropped = prior.len() - kept,
                    "Reached max tokens, history will be truncated"
                );
                break;
            }
            messages.insert(insert_at, message.clone());
            total += cost;
            kept += 1;
        }

        messages.push(user);

        Ok(BuiltPrompt {
            messages,
            counted_tokens: total,
            dropped_history: prior.len() - kept,
        })
    }
}
