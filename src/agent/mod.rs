//! Sales agents: the chat model, conversation history, tools, prompts and
//! the per-tenant agent cache.

mod cache;
pub mod content;
pub mod model;
pub mod prompt;
mod runtime;
mod store;
pub mod tools;

pub use cache::{AgentCache, ModelFactory};
pub use model::{ChatModel, LlmChatModel, ModelConfig, ModelReply};
pub use prompt::PromptSections;
pub use runtime::{Agent, MAX_ROUNDS};
pub use store::{ConversationConfig, ConversationStore};
