//! Rolling conversation context for chat requests
//!
//! The chat backend receives a system prompt plus one user message that
//! carries the recent transcript followed by the new input.

use serde::{Deserialize, Serialize};

/// Default system prompt for the assistant
pub const SYSTEM_PROMPT: &str = "You are Alt, an assistant AI designed to help users with their queries.";

/// Role of a message in a chat request
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl MessageRole {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

/// A single message as sent to the chat API
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

/// Everything the chat backend needs for one turn
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatRequest {
    pub system_prompt: String,
    pub context: String,
    pub user_text: String,
}

impl ChatRequest {
    /// Context followed by the new input, separated by a line break
    pub fn user_content(&self) -> String {
        format!("{}\n{}", self.context, self.user_text)
    }

    /// System and user messages in API order
    pub fn messages(&self) -> Vec<ChatMessage> {
        vec![
            ChatMessage {
                role: MessageRole::System,
                content: self.system_prompt.clone(),
            },
            ChatMessage {
                role: MessageRole::User,
                content: self.user_content(),
            },
        ]
    }
}

/// Transcript of recent exchanges, truncated to a fixed number of lines
#[derive(Clone, Debug)]
pub struct ConversationContext {
    lines: Vec<String>,
    max_lines: usize,
}

impl ConversationContext {
    pub fn new(max_lines: usize) -> Self {
        Self {
            lines: Vec::new(),
            max_lines,
        }
    }

    /// Record a finished exchange
    ///
    /// Multi-line messages count one line per line of text, so a long reply
    /// can push out everything before it.
    pub fn record_exchange(&mut self, user_text: &str, assistant_text: &str) {
        let exchange = format!("User: {}\nAssistant: {}", user_text, assistant_text);
        self.lines.extend(exchange.split('\n').map(str::to_string));
        self.trim_to_fit();
    }

    /// The retained transcript
    pub fn context(&self) -> String {
        self.lines.join("\n")
    }

    /// Build the request for a new user input
    pub fn request_for(&self, system_prompt: &str, user_text: &str) -> ChatRequest {
        ChatRequest {
            system_prompt: system_prompt.to_string(),
            context: self.context(),
            user_text: user_text.to_string(),
        }
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn max_lines(&self) -> usize {
        self.max_lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    fn trim_to_fit(&mut self) {
        if self.lines.len() > self.max_lines {
            let excess = self.lines.len() - self.max_lines;
            self.lines.drain(..excess);
        }
    }
}

impl Default for ConversationContext {
    fn default() -> Self {
        Self::new(10)
    }
}
