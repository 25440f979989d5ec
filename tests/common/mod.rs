//! Shared fakes for integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Value, json};

use vendora::error::TransportError;
use vendora::{ChatModel, Message, ModelReply, Result, ToolDefinition, Upstream, VendoraError};

// ============================================================================
// Upstream
// ============================================================================

type Responder = Box<dyn Fn(&Value) -> Result<Value> + Send + Sync>;

/// In-memory upstream answering with a closure and recording every payload.
pub struct FakeUpstream {
    name: &'static str,
    respond: Responder,
    fetches: AtomicUsize,
    submits: AtomicUsize,
    payloads: Mutex<Vec<Value>>,
}

impl FakeUpstream {
    pub fn new<F>(name: &'static str, respond: F) -> Arc<Self>
    where
        F: Fn(&Value) -> Result<Value> + Send + Sync + 'static,
    {
        Arc::new(Self {
            name,
            respond: Box::new(respond),
            fetches: AtomicUsize::new(0),
            submits: AtomicUsize::new(0),
            payloads: Mutex::new(Vec::new()),
        })
    }

    /// Answers every operation with `{"success": true}` and no data.
    pub fn empty(name: &'static str) -> Arc<Self> {
        Self::new(name, |_| Ok(json!({"success": true})))
    }

    /// Fails every call with a transport timeout.
    pub fn unreachable(name: &'static str) -> Arc<Self> {
        Self::new(name, |_| Err(VendoraError::Transport(TransportError::Timeout)))
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn submits(&self) -> usize {
        self.submits.load(Ordering::SeqCst)
    }

    pub fn payloads(&self) -> Vec<Value> {
        self.payloads.lock().unwrap().clone()
    }

    /// Fetches whose `codOpe` equals `op`.
    pub fn fetches_of(&self, op: &str) -> usize {
        self.payloads()
            .iter()
            .filter(|p| p.get("codOpe").and_then(Value::as_str) == Some(op))
            .count()
    }

    fn answer(&self, payload: &Value) -> Result<Value> {
        self.payloads.lock().unwrap().push(payload.clone());
        (self.respond)(payload)
    }
}

#[async_trait]
impl Upstream for FakeUpstream {
    fn name(&self) -> &str {
        self.name
    }

    async fn fetch(&self, payload: &Value) -> Result<Value> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        self.answer(payload)
    }

    async fn submit(&self, payload: &Value) -> Result<Value> {
        self.submits.fetch_add(1, Ordering::SeqCst);
        self.answer(payload)
    }
}

// ============================================================================
// Chat model
// ============================================================================

/// Model that replays scripted replies and records what it was sent.
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Result<ModelReply>>>,
    calls: AtomicUsize,
    seen: Mutex<Vec<(String, Vec<Message>)>>,
}

impl ScriptedModel {
    pub fn new(replies: Vec<Result<ModelReply>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        })
    }

    /// Echoes the last message once the script is exhausted.
    pub fn echo() -> Arc<Self> {
        Self::new(Vec::new())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// System prompt and history of every call, in order.
    pub fn seen(&self) -> Vec<(String, Vec<Message>)> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(
        &self,
        system_prompt: &str,
        messages: &[Message],
        _tools: &[ToolDefinition],
    ) -> Result<ModelReply> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen
            .lock()
            .unwrap()
            .push((system_prompt.to_string(), messages.to_vec()));
        let scripted = self.replies.lock().unwrap().pop_front();
        match scripted {
            Some(reply) => reply,
            None => {
                let last = messages.last().map(|m| m.content.clone()).unwrap_or_default();
                Ok(ModelReply::text(format!("echo: {last}")))
            }
        }
    }
}
