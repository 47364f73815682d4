//! Chat request shaping
//!
//! The chat-completion call itself lives in the host application; this module
//! keeps the rolling transcript and builds what gets sent.

pub mod context;

pub use context::{ChatMessage, ChatRequest, ConversationContext, MessageRole, SYSTEM_PROMPT};
