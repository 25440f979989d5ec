//! Vendora - sales chat agents over a resilient business-data layer
//!
//! Each tenant (a business) gets an LLM sales agent whose system prompt is
//! enriched with its catalog, branches, payment methods and FAQs, and whose
//! tools search the catalog and register orders. Everything the agent
//! needs from the business APIs goes through the [`resilience`] layer:
//! expiring caches, per-key singleflight builds, circuit breakers and
//! retries.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use vendora::{
//!     ChatModel, ChatRequest, ChatService, HttpUpstream, LlmChatModel, ModelConfig,
//!     TenantProfile, http_client,
//! };
//!
//! #[tokio::main]
//! async fn main() -> vendora::Result<()> {
//!     let client = http_client(Duration::from_secs(10))?;
//!     let api = Arc::new(HttpUpstream::new("information_api", "https://api.example.com/ia", client));
//!
//!     let service = ChatService::builder()
//!         .information_api(api.clone())
//!         .faq_api(api)
//!         .model_factory(|| {
//!             let model: Arc<dyn ChatModel> =
//!                 Arc::new(LlmChatModel::new(ModelConfig::new().api_key("sk-..."))?);
//!             Ok(model)
//!         })
//!         .build()?;
//!
//!     let reply = service
//!         .handle(ChatRequest::new("Do you have chocolate cake?", 7, TenantProfile::new(42)))
//!         .await;
//!     println!("{}", reply.reply);
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod business;
pub mod error;
pub mod resilience;
#[cfg(feature = "server")]
pub mod server;
mod service;
pub mod telemetry;
pub mod types;
pub mod upstream;
mod version;

// Re-export main types at crate root
pub use error::{Result, TransportError, VendoraError};
pub use service::{ChatService, ChatServiceBuilder, Health, MAX_MESSAGE_CHARS};
pub use version::{GIT_BRANCH, GIT_SHA, PKG_VERSION, git_dirty, version_string};

pub use agent::{
    Agent, AgentCache, ChatModel, ConversationConfig, ConversationStore, LlmChatModel,
    ModelConfig, ModelFactory, ModelReply,
};
pub use business::{BusinessData, BusinessDataConfig, OrderRequest, Product, SearchResult};
pub use resilience::{
    BreakerConfig, CacheConfig, CircuitBreaker, Outcome, RetryConfig, SessionSerializer,
    SingleflightCache, resilient_call,
};
pub use types::{
    ChatContext, ChatReply, ChatRequest, ChatbotId, Message, Role, SessionId, TenantId,
    TenantProfile, ToolCall, ToolDefinition, TurnContext,
};
pub use upstream::{HttpUpstream, Upstream, http_client};
