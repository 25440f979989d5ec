//! Chat request and reply types, and the per-turn context.

use serde::{Deserialize, Serialize};

use super::{ChatbotId, SessionId, TenantId};

/// Per-tenant presentation settings sent by the gateway with every message.
///
/// Only `tenant_id` is required. The rest personalise the system prompt and
/// fall back to defaults when absent or blank. Field aliases accept the
/// gateway's original key names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TenantProfile {
    #[serde(default, alias = "id_empresa")]
    pub tenant_id: Option<TenantId>,
    #[serde(default, alias = "id_chatbot")]
    pub chatbot_id: Option<ChatbotId>,
    #[serde(default, alias = "nombre_bot")]
    pub bot_name: Option<String>,
    #[serde(default, alias = "personalidad")]
    pub personality: Option<String>,
    #[serde(default, alias = "nombre_negocio")]
    pub business_name: Option<String>,
    #[serde(default, alias = "propuesta_valor")]
    pub value_proposition: Option<String>,
    #[serde(default, alias = "medios_pago")]
    pub payment_notes: Option<String>,
}

impl TenantProfile {
    pub fn new(tenant_id: TenantId) -> Self {
        Self {
            tenant_id: Some(tenant_id),
            ..Self::default()
        }
    }

    pub fn chatbot_id(mut self, id: ChatbotId) -> Self {
        self.chatbot_id = Some(id);
        self
    }

    pub fn bot_name(mut self, name: impl Into<String>) -> Self {
        self.bot_name = Some(name.into());
        self
    }

    pub fn business_name(mut self, name: impl Into<String>) -> Self {
        self.business_name = Some(name.into());
        self
    }

    pub fn personality(mut self, personality: impl Into<String>) -> Self {
        self.personality = Some(personality.into());
        self
    }
}

/// Envelope around the tenant profile, as sent by the gateway.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatContext {
    #[serde(default)]
    pub config: TenantProfile,
}

/// Inbound chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub session_id: SessionId,
    #[serde(default)]
    pub context: Option<ChatContext>,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>, session_id: SessionId, profile: TenantProfile) -> Self {
        Self {
            message: message.into(),
            session_id,
            context: Some(ChatContext { config: profile }),
        }
    }

    pub fn profile(&self) -> TenantProfile {
        self.context
            .as_ref()
            .map(|c| c.config.clone())
            .unwrap_or_default()
    }
}

/// Reply to a chat message. `reply` is always user-presentable text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatReply {
    pub reply: String,
    /// Failure classification for observability; never shown to the user.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'static str>,
}

impl ChatReply {
    pub fn ok(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            error: None,
        }
    }

    pub fn degraded(reply: impl Into<String>, kind: &'static str) -> Self {
        Self {
            reply: reply.into(),
            error: Some(kind),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Identity of the turn being processed, handed to every tool call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TurnContext {
    pub tenant_id: TenantId,
    pub session_id: SessionId,
}

impl TurnContext {
    pub fn new(tenant_id: TenantId, session_id: SessionId) -> Self {
        Self {
            tenant_id,
            session_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn gateway_payload_with_original_keys() {
        let req: ChatRequest = serde_json::from_value(json!({
            "message": "hola",
            "session_id": 7,
            "context": {"config": {
                "id_empresa": 42,
                "id_chatbot": 3,
                "nombre_bot": "Vera",
                "personalidad": "warm"
            }}
        }))
        .unwrap();

        let profile = req.profile();
        assert_eq!(profile.tenant_id, Some(42));
        assert_eq!(profile.chatbot_id, Some(3));
        assert_eq!(profile.bot_name.as_deref(), Some("Vera"));
        assert_eq!(profile.personality.as_deref(), Some("warm"));
    }

    #[test]
    fn missing_context_yields_empty_profile() {
        let req: ChatRequest =
            serde_json::from_value(json!({"message": "hi", "session_id": 1})).unwrap();
        assert_eq!(req.profile(), TenantProfile::default());
    }

    #[test]
    fn reply_omits_error_when_ok() {
        let body = serde_json::to_value(ChatReply::ok("hello")).unwrap();
        assert_eq!(body, json!({"reply": "hello"}));
        let body = serde_json::to_value(ChatReply::degraded("sorry", "timeout")).unwrap();
        assert_eq!(body["error"], "timeout");
    }
}
