//! A tenant's agent and its tool-calling turn loop.

use std::sync::Arc;

use tokio::time::Instant;
use tracing::{debug, instrument, warn};

use super::content;
use super::model::ChatModel;
use super::store::ConversationStore;
use super::tools;
use crate::business::BusinessData;
use crate::telemetry;
use crate::types::{Message, TenantId, ToolDefinition, TurnContext};
use crate::{Result, VendoraError};

/// Model rounds allowed per turn, tool rounds included.
pub const MAX_ROUNDS: usize = 5;

const EMPTY_REPLY: &str = "Sorry, I couldn't process your request.";

/// Everything needed to answer a tenant's customers.
///
/// Built once per tenant and cached; the model and the conversation store
/// are shared with every other agent.
pub struct Agent {
    tenant_id: TenantId,
    system_prompt: String,
    tools: Vec<ToolDefinition>,
    model: Arc<dyn ChatModel>,
    store: Arc<ConversationStore>,
    data: Arc<BusinessData>,
}

impl Agent {
    pub fn new(
        tenant_id: TenantId,
        system_prompt: String,
        model: Arc<dyn ChatModel>,
        store: Arc<ConversationStore>,
        data: Arc<BusinessData>,
    ) -> Self {
        Self {
            tenant_id,
            system_prompt,
            tools: tools::definitions(),
            model,
            store,
            data,
        }
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Answer `message` within the session's conversation.
    ///
    /// The caller must hold the session lock. History is saved after every
    /// tool round and on the final reply, so tool effects such as a
    /// registered order stay visible even when a later round fails. A turn
    /// that fails before running any tool leaves history untouched.
    #[instrument(name = "agent.turn", skip(self, message), fields(tenant = ctx.tenant_id, session = ctx.session_id))]
    pub async fn run_turn(&self, ctx: &TurnContext, message: &str) -> Result<String> {
        let mut history = self.store.load(ctx.session_id);
        history.push(content::user_message(message));

        for round in 1..=MAX_ROUNDS {
            let reply = self.complete(&history).await?;

            if reply.tool_calls.is_empty() {
                let text = match reply.content.trim() {
                    "" => EMPTY_REPLY.to_owned(),
                    text => text.to_owned(),
                };
                history.push(Message::assistant(text.clone()));
                self.store.save(ctx.session_id, history);
                debug!(round, "turn completed");
                return Ok(text);
            }

            debug!(round, calls = reply.tool_calls.len(), "executing tool calls");
            let calls = reply.tool_calls.clone();
            history.push(Message::assistant_with_tool_calls(reply.content, reply.tool_calls));
            for call in &calls {
                let result = tools::execute(&self.data, ctx, call).await;
                history.push(Message::tool_result(&call.id, result));
            }
            self.store.save(ctx.session_id, history.clone());
        }

        warn!(rounds = MAX_ROUNDS, "model kept calling tools, giving up");
        Err(VendoraError::Llm(format!(
            "no final answer after {MAX_ROUNDS} model rounds"
        )))
    }

    async fn complete(&self, history: &[Message]) -> Result<super::ModelReply> {
        let started = Instant::now();
        let result = self
            .model
            .complete(&self.system_prompt, history, &self.tools)
            .await;
        let status = if result.is_ok() { "success" } else { "error" };
        metrics::counter!(telemetry::LLM_REQUESTS_TOTAL, "status" => status).increment(1);
        metrics::histogram!(telemetry::LLM_DURATION_SECONDS, "status" => status)
            .record(started.elapsed().as_secs_f64());
        result
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("tenant_id", &self.tenant_id)
            .field("model", &self.model.name())
            .field("tools", &self.tools.len())
            .finish_non_exhaustive()
    }
}
