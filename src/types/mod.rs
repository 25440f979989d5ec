//! Public types for the Vendora API.

mod chat;
mod message;
mod tool;

pub use chat::{ChatContext, ChatReply, ChatRequest, TenantProfile, TurnContext};
pub use message::{Message, Role};
pub use tool::{ToolCall, ToolDefinition};

/// Company whose catalog, branches and settings back an agent.
pub type TenantId = u64;

/// End-user conversation, stable across turns.
pub type SessionId = u64;

/// Chatbot configuration that owns an FAQ set.
pub type ChatbotId = u64;
