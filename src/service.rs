//! Top-level chat turn handling.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use tracing::{error, info, instrument, warn};

use crate::agent::{
    AgentCache, ChatModel, ConversationConfig, ConversationStore, ModelFactory,
};
use crate::business::{BusinessData, BusinessDataConfig};
use crate::resilience::{CacheConfig, DEFAULT_SESSION_SWEEP_THRESHOLD, SessionSerializer};
use crate::telemetry;
use crate::types::{ChatReply, ChatRequest, TurnContext};
use crate::upstream::Upstream;
use crate::{Result, VendoraError, version};

/// Longest inbound message accepted, in characters.
pub const MAX_MESSAGE_CHARS: usize = 4096;

const NO_MESSAGE: &str = "I didn't receive your message. Could you repeat it?";
const TOO_LONG: &str = "Your message is too long. Please send it in shorter parts.";
const MISSING_TENANT: &str = "Configuration error: the request does not identify a business.";
const CONFIG_PROBLEM: &str = "Sorry, I had a configuration problem. Could you try again?";
const TROUBLE: &str = "Sorry, I had trouble processing your message. Could you try again?";

/// Service health as reported by `/health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Health {
    /// `ok`, or `degraded` while any upstream circuit is open.
    pub status: &'static str,
    pub version: String,
    pub agents: usize,
    pub sessions: usize,
}

/// Answers chat messages for every tenant.
///
/// Construct once per process with [`ChatService::builder`] and share it.
pub struct ChatService {
    agents: AgentCache,
    sessions: SessionSerializer,
    data: Arc<BusinessData>,
    chat_timeout: Duration,
}

impl ChatService {
    pub fn builder() -> ChatServiceBuilder {
        ChatServiceBuilder::new()
    }

    /// Handle one inbound message. Never fails: every error path produces a
    /// user-presentable reply with its classification in `error`.
    #[instrument(name = "chat.handle", skip_all, fields(session = request.session_id))]
    pub async fn handle(&self, request: ChatRequest) -> ChatReply {
        let started = Instant::now();
        info!(
            session = request.session_id,
            chars = request.message.chars().count(),
            "message received"
        );

        let reply = match tokio::time::timeout(self.chat_timeout, self.process(&request)).await {
            Ok(reply) => reply,
            Err(_) => {
                let e = VendoraError::Timeout(self.chat_timeout);
                error!(session = request.session_id, error = %e, "chat turn timed out");
                ChatReply::degraded(
                    format!(
                        "The request took longer than {}s. Please try again.",
                        self.chat_timeout.as_secs()
                    ),
                    e.kind(),
                )
            }
        };

        let status = match reply.error {
            None => "success",
            Some("timeout") => "timeout",
            Some("invalid_input") | Some("configuration") => "rejected",
            Some(_) => "error",
        };
        metrics::counter!(telemetry::CHAT_REQUESTS_TOTAL, "status" => status).increment(1);
        metrics::histogram!(telemetry::CHAT_DURATION_SECONDS)
            .record(started.elapsed().as_secs_f64());
        reply
    }

    async fn process(&self, request: &ChatRequest) -> ChatReply {
        let message = request.message.trim();
        if message.is_empty() {
            return ChatReply::degraded(NO_MESSAGE, "invalid_input");
        }
        let chars = request.message.chars().count();
        if chars > MAX_MESSAGE_CHARS {
            warn!(session = request.session_id, chars, "message over length limit");
            return ChatReply::degraded(TOO_LONG, "invalid_input");
        }

        let profile = request.profile();
        let tenant = match profile.tenant_id {
            Some(id) if id > 0 => id,
            _ => {
                warn!(session = request.session_id, "request without tenant id");
                return ChatReply::degraded(MISSING_TENANT, "configuration");
            }
        };

        let agent = match self.agents.get_or_build(&profile).await {
            Ok(agent) => agent,
            Err(e) => {
                error!(tenant, kind = e.kind(), error = %e, "agent unavailable");
                return ChatReply::degraded(CONFIG_PROBLEM, e.kind());
            }
        };

        let ctx = TurnContext::new(tenant, request.session_id);
        let turn = self
            .sessions
            .with_session_lock(ctx.session_id, || agent.run_turn(&ctx, message))
            .await;

        match turn {
            Ok(text) => {
                info!(tenant, session = ctx.session_id, chars = text.chars().count(), "reply generated");
                ChatReply::ok(text)
            }
            Err(e) => {
                error!(tenant, session = ctx.session_id, kind = e.kind(), error = %e, "turn failed");
                ChatReply::degraded(TROUBLE, e.kind())
            }
        }
    }

    pub fn health(&self) -> Health {
        let status = if self.data.any_circuit_open() {
            "degraded"
        } else {
            "ok"
        };
        Health {
            status,
            version: version::version_string(),
            agents: self.agents.len(),
            sessions: self.agents.store().len(),
        }
    }

    pub fn agents(&self) -> &AgentCache {
        &self.agents
    }

    pub fn business_data(&self) -> &Arc<BusinessData> {
        &self.data
    }

    /// Release process-wide state. Callers stop accepting requests first.
    pub fn shutdown(&self) {
        self.agents.clear();
        self.agents.store().clear();
        self.data.clear();
        info!("chat service shut down");
    }
}

impl std::fmt::Debug for ChatService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatService")
            .field("agents", &self.agents)
            .field("chat_timeout", &self.chat_timeout)
            .finish_non_exhaustive()
    }
}

/// Builder for [`ChatService`].
pub struct ChatServiceBuilder {
    information: Option<Arc<dyn Upstream>>,
    faq: Option<Arc<dyn Upstream>>,
    model_factory: Option<ModelFactory>,
    business: BusinessDataConfig,
    agent_cache: CacheConfig,
    conversation: ConversationConfig,
    session_sweep_threshold: usize,
    chat_timeout: Duration,
}

impl Default for ChatServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatServiceBuilder {
    pub fn new() -> Self {
        Self {
            information: None,
            faq: None,
            model_factory: None,
            business: BusinessDataConfig::default(),
            agent_cache: CacheConfig::default(),
            conversation: ConversationConfig::default(),
            session_sweep_threshold: DEFAULT_SESSION_SWEEP_THRESHOLD,
            chat_timeout: Duration::from_secs(120),
        }
    }

    /// Upstream serving catalog, branches, payments, context, shipping,
    /// search and orders.
    pub fn information_api(mut self, upstream: Arc<dyn Upstream>) -> Self {
        self.information = Some(upstream);
        self
    }

    pub fn faq_api(mut self, upstream: Arc<dyn Upstream>) -> Self {
        self.faq = Some(upstream);
        self
    }

    /// Use an already created model.
    pub fn model(mut self, model: Arc<dyn ChatModel>) -> Self {
        self.model_factory = Some(Box::new(move || Ok(Arc::clone(&model))));
        self
    }

    /// Create the model lazily, on the first agent build.
    pub fn model_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn ChatModel>> + Send + Sync + 'static,
    {
        self.model_factory = Some(Box::new(factory));
        self
    }

    pub fn business_config(mut self, config: BusinessDataConfig) -> Self {
        self.business = config;
        self
    }

    pub fn agent_cache(mut self, config: CacheConfig) -> Self {
        self.agent_cache = config;
        self
    }

    pub fn conversation(mut self, config: ConversationConfig) -> Self {
        self.conversation = config;
        self
    }

    pub fn session_sweep_threshold(mut self, threshold: usize) -> Self {
        self.session_sweep_threshold = threshold;
        self
    }

    pub fn chat_timeout(mut self, timeout: Duration) -> Self {
        self.chat_timeout = timeout;
        self
    }

    pub fn build(self) -> Result<ChatService> {
        let information = self.information.ok_or_else(|| {
            VendoraError::Configuration("information API upstream not configured".into())
        })?;
        let faq = self
            .faq
            .ok_or_else(|| VendoraError::Configuration("FAQ API upstream not configured".into()))?;
        let model_factory = self
            .model_factory
            .ok_or_else(|| VendoraError::Configuration("chat model not configured".into()))?;
        if self.chat_timeout.is_zero() {
            return Err(VendoraError::Configuration(
                "chat timeout must be positive".into(),
            ));
        }

        let data = Arc::new(BusinessData::new(information, faq, self.business));
        let store = Arc::new(ConversationStore::new(self.conversation));
        Ok(ChatService {
            agents: AgentCache::new(self.agent_cache, model_factory, store, Arc::clone(&data)),
            sessions: SessionSerializer::new(self.session_sweep_threshold),
            data,
            chat_timeout: self.chat_timeout,
        })
    }
}
