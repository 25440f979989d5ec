//! Chat model abstraction and its `llm` crate implementation.
//!
//! [`LlmChatModel`] stores configuration and builds an llm provider per call,
//! because the llm crate takes the system prompt and tools at build time.

use std::time::Duration;

use async_trait::async_trait;
use llm::LLMProvider;
use llm::builder::{FunctionBuilder, LLMBackend, LLMBuilder, ParamBuilder};
use llm::chat::ChatMessage as LlmMessage;
use tracing::instrument;

use crate::types::{Message, Role, ToolCall, ToolDefinition};
use crate::{Result, VendoraError};

/// What the model answered in one round.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelReply {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
}

impl ModelReply {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    pub fn with_tool_calls(tool_calls: Vec<ToolCall>) -> Self {
        Self {
            content: String::new(),
            tool_calls,
        }
    }
}

/// One model round: system prompt plus history in, text or tool calls out.
#[async_trait]
pub trait ChatModel: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(
        &self,
        system_prompt: &str,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<ModelReply>;
}

/// Settings for [`LlmChatModel`].
#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// `openai`, `anthropic`, `openrouter`, `ollama` or `google`.
    pub backend: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            backend: "openai".into(),
            model: "gpt-4o-mini".into(),
            temperature: 0.5,
            max_tokens: 2048,
            timeout: Duration::from_secs(90),
            base_url: None,
            api_key: None,
        }
    }
}

impl ModelConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn backend(mut self, backend: impl Into<String>) -> Self {
        self.backend = backend.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }
}

fn parse_backend(name: &str) -> Result<LLMBackend> {
    match name.trim().to_ascii_lowercase().as_str() {
        "openai" => Ok(LLMBackend::OpenAI),
        "anthropic" => Ok(LLMBackend::Anthropic),
        "openrouter" => Ok(LLMBackend::OpenRouter),
        "ollama" => Ok(LLMBackend::Ollama),
        "google" => Ok(LLMBackend::Google),
        other => Err(VendoraError::Configuration(format!(
            "unknown model backend '{other}'"
        ))),
    }
}

/// [`ChatModel`] backed by the `llm` crate.
pub struct LlmChatModel {
    backend: LLMBackend,
    name: String,
    config: ModelConfig,
}

impl LlmChatModel {
    /// Validate the configuration. Every backend except Ollama needs a key.
    pub fn new(config: ModelConfig) -> Result<Self> {
        let backend = parse_backend(&config.backend)?;
        let has_key = config.api_key.as_deref().is_some_and(|k| !k.trim().is_empty());
        if backend != LLMBackend::Ollama && !has_key {
            return Err(VendoraError::Configuration(format!(
                "backend '{}' requires an API key",
                config.backend
            )));
        }
        if config.model.trim().is_empty() {
            return Err(VendoraError::Configuration("model name is empty".into()));
        }
        Ok(Self {
            backend,
            name: config.backend.to_ascii_lowercase(),
            config,
        })
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    fn build_provider(
        &self,
        system_prompt: &str,
        tools: &[ToolDefinition],
    ) -> Result<Box<dyn LLMProvider>> {
        let mut builder = LLMBuilder::new()
            .backend(self.backend.clone())
            .model(&self.config.model)
            .timeout_seconds(self.config.timeout.as_secs().max(1))
            .temperature(self.config.temperature)
            .max_tokens(self.config.max_tokens);
        if let Some(ref key) = self.config.api_key {
            builder = builder.api_key(key);
        }
        if !system_prompt.is_empty() {
            builder = builder.system(system_prompt);
        }
        if let Some(ref url) = self.config.base_url {
            builder = builder.base_url(url.clone());
        }

        for tool in tools {
            let mut function = FunctionBuilder::new(&tool.name).description(&tool.description);
            for (name, schema) in tool.properties() {
                let (type_of, description) = flatten_param(schema);
                function = function
                    .param(ParamBuilder::new(name).type_of(type_of).description(description));
            }
            let required = tool.required();
            if !required.is_empty() {
                function = function.required(required);
            }
            builder = builder.function(function);
        }

        builder.build().map_err(VendoraError::from)
    }
}

/// Parameter type and description as the llm builder accepts them.
///
/// The builder has no nested schemas, so arrays and objects travel as
/// JSON-encoded strings; argument parsing accepts both forms.
fn flatten_param(schema: &serde_json::Value) -> (&str, String) {
    let type_of = schema.get("type").and_then(|t| t.as_str()).unwrap_or("string");
    let description = schema
        .get("description")
        .and_then(|d| d.as_str())
        .unwrap_or("");
    match type_of {
        "array" | "object" => ("string", format!("{description} (JSON-encoded {type_of})")),
        other => (other, description.to_owned()),
    }
}

#[async_trait]
impl ChatModel for LlmChatModel {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(name = "llm.complete", skip_all, fields(model = %self.config.model, backend = %self.name))]
    async fn complete(
        &self,
        system_prompt: &str,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<ModelReply> {
        let provider = self.build_provider(system_prompt, tools)?;
        let llm_messages = to_llm_messages(messages);

        let response = if tools.is_empty() {
            provider.chat(&llm_messages).await
        } else {
            provider
                .chat_with_tools(&llm_messages, provider.tools())
                .await
        }
        .map_err(VendoraError::from)?;

        let tool_calls = response
            .tool_calls()
            .map(|calls| from_llm_tool_calls(&calls))
            .unwrap_or_default();

        Ok(ModelReply {
            content: response.text().unwrap_or_default(),
            tool_calls,
        })
    }
}

// ============================================================================
// Conversions
// ============================================================================

fn llm_call(id: &str, name: &str, arguments: &str) -> llm::ToolCall {
    llm::ToolCall {
        id: id.to_owned(),
        call_type: "function".to_owned(),
        function: llm::FunctionCall {
            name: name.to_owned(),
            arguments: arguments.to_owned(),
        },
    }
}

/// History messages in llm crate form. Tool results travel as user
/// messages carrying the originating call id. The llm crate holds one
/// content type per message, so each image of a user message becomes its
/// own image-URL message ahead of the text.
pub(crate) fn to_llm_messages(messages: &[Message]) -> Vec<LlmMessage> {
    let mut out = Vec::with_capacity(messages.len());
    for msg in messages {
        match &msg.role {
            Role::User => {
                for url in &msg.images {
                    out.push(LlmMessage::user().image_url(url.clone()).build());
                }
                if msg.images.is_empty() || !msg.content.is_empty() {
                    out.push(LlmMessage::user().content(msg.content.clone()).build());
                }
            }
            Role::Assistant if msg.tool_calls.is_empty() => {
                out.push(LlmMessage::assistant().content(msg.content.clone()).build());
            }
            Role::Assistant => {
                let calls = msg
                    .tool_calls
                    .iter()
                    .map(|tc| llm_call(&tc.id, &tc.name, &tc.arguments))
                    .collect();
                out.push(
                    LlmMessage::assistant()
                        .tool_use(calls)
                        .content(msg.content.clone())
                        .build(),
                );
            }
            Role::Tool { tool_call_id } => out.push(
                LlmMessage::user()
                    .tool_result(vec![llm_call(tool_call_id, "", &msg.content)])
                    .build(),
            ),
        }
    }
    out
}

pub(crate) fn from_llm_tool_calls(calls: &[llm::ToolCall]) -> Vec<ToolCall> {
    calls
        .iter()
        .map(|c| ToolCall::new(&c.id, &c.function.name, &c.function.arguments))
        .collect()
}
