//! Per-tenant agent cache.

use std::sync::{Arc, Mutex, PoisonError};

use tracing::info;

use super::model::ChatModel;
use super::prompt;
use super::runtime::Agent;
use super::store::ConversationStore;
use crate::business::BusinessData;
use crate::resilience::{CacheConfig, SingleflightCache};
use crate::types::{TenantId, TenantProfile};
use crate::{Result, VendoraError};

/// Creates the process-wide chat model. Called at most once successfully.
pub type ModelFactory = Box<dyn Fn() -> Result<Arc<dyn ChatModel>> + Send + Sync>;

/// Agents keyed by tenant, built at most once concurrently per tenant.
///
/// Every agent shares one chat model, created lazily by the factory on the
/// first build, and one conversation store.
pub struct AgentCache {
    agents: SingleflightCache<TenantId, Arc<Agent>>,
    model: Mutex<Option<Arc<dyn ChatModel>>>,
    model_factory: ModelFactory,
    store: Arc<ConversationStore>,
    data: Arc<BusinessData>,
}

impl AgentCache {
    pub fn new(
        config: CacheConfig,
        model_factory: ModelFactory,
        store: Arc<ConversationStore>,
        data: Arc<BusinessData>,
    ) -> Self {
        Self {
            agents: SingleflightCache::new("agents", config),
            model: Mutex::new(None),
            model_factory,
            store,
            data,
        }
    }

    /// Shared model, created on first use. The factory runs under a plain
    /// mutex and never suspends, so at most one model is ever created.
    fn model(&self) -> Result<Arc<dyn ChatModel>> {
        let mut slot = self.model.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(model) = slot.as_ref() {
            return Ok(Arc::clone(model));
        }
        let model = (self.model_factory)()?;
        info!(model = model.name(), "chat model created");
        *slot = Some(Arc::clone(&model));
        Ok(model)
    }

    /// The agent for the profile's tenant, building it on a miss.
    ///
    /// The profile of the request that triggers the build shapes the prompt
    /// until the entry expires. Any failure is reported as
    /// [`VendoraError::Build`].
    pub async fn get_or_build(&self, profile: &TenantProfile) -> Result<Arc<Agent>> {
        let tenant = match profile.tenant_id {
            Some(id) if id > 0 => id,
            _ => {
                return Err(VendoraError::Build {
                    tenant: 0,
                    reason: "missing tenant id".into(),
                });
            }
        };

        let store = Arc::clone(&self.store);
        let data = Arc::clone(&self.data);
        let profile = profile.clone();
        self.agents
            .get_or_build(tenant, || {
                let model = self.model();
                async move {
                    let model = model?;
                    info!(tenant, "building agent");
                    let system_prompt = prompt::build_system_prompt(&profile, &data).await;
                    Ok(Arc::new(Agent::new(tenant, system_prompt, model, store, data)))
                }
            })
            .await
            .map_err(|e| match e {
                e @ VendoraError::Build { .. } => e,
                other => VendoraError::Build {
                    tenant,
                    reason: other.to_string(),
                },
            })
    }

    pub fn is_cached(&self, tenant: TenantId) -> bool {
        self.agents.contains(&tenant)
    }

    /// Drop a tenant's agent so the next request rebuilds it.
    pub fn invalidate(&self, tenant: TenantId) {
        self.agents.invalidate(&tenant);
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn clear(&self) {
        self.agents.clear();
    }

    pub fn store(&self) -> &Arc<ConversationStore> {
        &self.store
    }

    pub fn business_data(&self) -> &Arc<BusinessData> {
        &self.data
    }
}

impl std::fmt::Debug for AgentCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentCache")
            .field("agents", &self.agents.len())
            .field(
                "model",
                &self
                    .model
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .as_ref()
                    .map(|m| m.name().to_owned()),
            )
            .finish_non_exhaustive()
    }
}
