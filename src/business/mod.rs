//! Business data consumed by agents: prompt enrichment, search and orders.
//!
//! Every tenant-keyed lookup, and search, share one breaker on the
//! information API; FAQs have their own breaker keyed by chatbot. Each
//! domain keeps its own cache.

pub mod format;
pub mod lenient;
mod orders;
mod read_through;
mod search;

use std::sync::Arc;

use serde_json::{Value, json};

pub use format::Product;
pub use orders::{OrderItem, OrderRequest};
pub use read_through::ReadThrough;
pub use search::{SEARCH_LIMIT, SearchResult};

use crate::resilience::{BreakerConfig, CacheConfig, CircuitBreaker, Outcome, SingleflightCache};
use crate::types::{ChatbotId, TenantId};
use crate::upstream::Upstream;

const OP_CATEGORIES: &str = "OBTENER_CATEGORIAS";
const OP_BRANCHES: &str = "OBTENER_SUCURSALES_PUBLICAS";
const OP_PAYMENT_METHODS: &str = "OBTENER_METODOS_PAGO";
const OP_BUSINESS_CONTEXT: &str = "OBTENER_CONTEXTO_NEGOCIO";
const OP_SHIPPING_COSTS: &str = "OBTENER_COSTO_ENVIO";

/// Cache and breaker settings for [`BusinessData`].
#[derive(Debug, Clone)]
pub struct BusinessDataConfig {
    pub breaker: BreakerConfig,
    /// Categories, branches, payment methods, context, shipping and FAQs.
    pub data_cache: CacheConfig,
    pub search_cache: CacheConfig,
}

impl Default for BusinessDataConfig {
    fn default() -> Self {
        Self {
            breaker: BreakerConfig::default(),
            data_cache: CacheConfig::default(),
            search_cache: CacheConfig::new()
                .max_entries(2_000)
                .ttl(std::time::Duration::from_secs(900)),
        }
    }
}

/// Process-wide access to the business APIs.
pub struct BusinessData {
    information: Arc<dyn Upstream>,
    faq: Arc<dyn Upstream>,
    information_breaker: Arc<CircuitBreaker<TenantId>>,
    faq_breaker: Arc<CircuitBreaker<ChatbotId>>,
    categories: ReadThrough<TenantId>,
    branches: ReadThrough<TenantId>,
    payment_methods: ReadThrough<TenantId>,
    business_context: ReadThrough<TenantId>,
    shipping_costs: ReadThrough<TenantId>,
    faqs: ReadThrough<ChatbotId>,
    search_cache: SingleflightCache<(TenantId, String), Vec<Product>>,
}

impl BusinessData {
    pub fn new(
        information: Arc<dyn Upstream>,
        faq: Arc<dyn Upstream>,
        config: BusinessDataConfig,
    ) -> Self {
        let information_breaker = Arc::new(CircuitBreaker::new(
            "information_api",
            config.breaker.clone(),
        ));
        let faq_breaker = Arc::new(CircuitBreaker::new("faq_api", config.breaker));
        let data = |domain| {
            ReadThrough::new(domain, config.data_cache.clone(), information_breaker.clone())
        };

        Self {
            categories: data("categories"),
            branches: data("branches"),
            payment_methods: data("payment_methods"),
            business_context: data("business_context"),
            shipping_costs: data("shipping_costs"),
            faqs: ReadThrough::new("faqs", config.data_cache.clone(), faq_breaker.clone()),
            search_cache: SingleflightCache::new("search", config.search_cache),
            information,
            faq,
            information_breaker,
            faq_breaker,
        }
    }

    async fn tenant_lookup(
        &self,
        cache: &ReadThrough<TenantId>,
        operation: &'static str,
        tenant: TenantId,
        format: fn(&Value) -> String,
    ) -> String {
        let upstream = self.information.clone();
        cache
            .read(
                tenant,
                move || async move {
                    let payload = json!({"codOpe": operation, "id_empresa": tenant});
                    Outcome::from_envelope(upstream.fetch(&payload).await)
                },
                format,
            )
            .await
    }

    /// Catalog categories, one numbered line each.
    pub async fn categories(&self, tenant: TenantId) -> String {
        self.tenant_lookup(&self.categories, OP_CATEGORIES, tenant, format::categories_from_envelope)
            .await
    }

    /// Public branches with their compact opening hours.
    pub async fn branches(&self, tenant: TenantId) -> String {
        self.tenant_lookup(&self.branches, OP_BRANCHES, tenant, format::branches_from_envelope)
            .await
    }

    pub async fn payment_methods(&self, tenant: TenantId) -> String {
        self.tenant_lookup(
            &self.payment_methods,
            OP_PAYMENT_METHODS,
            tenant,
            format::payment_methods_from_envelope,
        )
        .await
    }

    /// Free-text description of the business.
    pub async fn business_context(&self, tenant: TenantId) -> String {
        self.tenant_lookup(
            &self.business_context,
            OP_BUSINESS_CONTEXT,
            tenant,
            format::business_context_from_envelope,
        )
        .await
    }

    /// Delivery zones with cost, type and time.
    pub async fn shipping_costs(&self, tenant: TenantId) -> String {
        self.tenant_lookup(
            &self.shipping_costs,
            OP_SHIPPING_COSTS,
            tenant,
            format::shipping_costs_from_envelope,
        )
        .await
    }

    /// Question/answer pairs for `chatbot`; `""` when no chatbot is configured.
    pub async fn faqs(&self, chatbot: Option<ChatbotId>) -> String {
        let Some(chatbot) = chatbot else {
            return String::new();
        };
        let upstream = self.faq.clone();
        self.faqs
            .read(
                chatbot,
                move || async move {
                    let payload = json!({"id_chatbot": chatbot});
                    Outcome::from_envelope(upstream.fetch(&payload).await)
                },
                format::faqs_from_envelope,
            )
            .await
    }

    /// Whether any breaker currently rejects calls.
    pub fn any_circuit_open(&self) -> bool {
        self.information_breaker.any_open() || self.faq_breaker.any_open()
    }

    pub fn information_breaker(&self) -> &CircuitBreaker<TenantId> {
        &self.information_breaker
    }

    pub fn faq_breaker(&self) -> &CircuitBreaker<ChatbotId> {
        &self.faq_breaker
    }

    /// Drop every cached lookup and search result.
    pub fn clear(&self) {
        for cache in [
            &self.categories,
            &self.branches,
            &self.payment_methods,
            &self.business_context,
            &self.shipping_costs,
        ] {
            cache.clear();
        }
        self.faqs.clear();
        self.search_cache.clear();
    }
}

impl std::fmt::Debug for BusinessData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BusinessData")
            .field("information", &self.information.name())
            .field("faq", &self.faq.name())
            .finish_non_exhaustive()
    }
}
