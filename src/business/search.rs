//! Catalog search with a shared result cache.

use serde::Serialize;
use serde_json::json;
use tracing::{debug, warn};

use super::BusinessData;
use super::format::{Product, format_products};
use super::lenient;
use crate::error::TransportError;
use crate::resilience::{Outcome, resilient_call};
use crate::telemetry;
use crate::types::TenantId;
use crate::VendoraError;

const OP_SEARCH: &str = "BUSCAR_PRODUCTOS_SERVICIOS_VENTAS_DIRECTAS";

/// Maximum products requested per search.
pub const SEARCH_LIMIT: u32 = 10;

const EMPTY_TERM: &str = "The search term cannot be empty.";
const UNAVAILABLE: &str =
    "The search service is temporarily unavailable. Please try again in a few minutes.";
const TOO_SLOW: &str = "The search took too long. Please try again.";

/// Result of a catalog search. Never an error: failures carry a
/// user-presentable message instead.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub success: bool,
    pub items: Vec<Product>,
    pub error: Option<String>,
}

impl SearchResult {
    fn found(items: Vec<Product>) -> Self {
        Self {
            success: true,
            items,
            error: None,
        }
    }

    fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            items: Vec::new(),
            error: Some(message.into()),
        }
    }

    /// Text handed back to the model as the tool result.
    pub fn to_tool_text(&self, term: &str) -> String {
        if !self.success {
            return self
                .error
                .clone()
                .unwrap_or_else(|| "The search could not be completed.".to_owned());
        }
        if self.items.is_empty() {
            return format!("No products or services matched '{term}'. Try other terms.");
        }
        format!(
            "Found {} result(s) for '{term}':\n\n{}",
            self.items.len(),
            format_products(&self.items)
        )
    }
}

impl BusinessData {
    /// Search the tenant's catalog for `term`.
    ///
    /// Results are cached per tenant and case-insensitive term. Concurrent
    /// identical searches share one upstream call. Business failures return
    /// the upstream's message and are not cached.
    pub async fn search(&self, tenant: TenantId, term: &str) -> SearchResult {
        let term = term.trim();
        if term.is_empty() {
            return SearchResult::failed(EMPTY_TERM);
        }

        let key = (tenant, term.to_lowercase());
        if let Some(items) = self.search_cache.cached(&key) {
            return SearchResult::found(items);
        }

        if self.information_breaker.is_open(&tenant) {
            metrics::counter!(telemetry::CACHE_LOOKUPS_TOTAL,
                "cache" => self.search_cache.name(),
                "result" => telemetry::RESULT_CIRCUIT_OPEN,
            )
            .increment(1);
            warn!(tenant, "search rejected, circuit open");
            return SearchResult::failed(UNAVAILABLE);
        }

        let payload = json!({
            "codOpe": OP_SEARCH,
            "id_empresa": tenant,
            "busqueda": term,
            "limite": SEARCH_LIMIT,
        });
        let upstream = self.information.clone();
        let breaker = self.information_breaker.clone();

        let built = self
            .search_cache
            .get_or_build(key, move || async move {
                let body = resilient_call(&breaker, &tenant, "search", || async {
                    Outcome::from_envelope(upstream.fetch(&payload).await)
                })
                .await?;
                Ok(lenient::field_list::<Product>(&body, "productos"))
            })
            .await;

        match built {
            Ok(items) => {
                debug!(tenant, term, count = items.len(), "search completed");
                SearchResult::found(items)
            }
            Err(VendoraError::Business(message)) => {
                warn!(tenant, term, %message, "search rejected by upstream");
                SearchResult::failed(message)
            }
            Err(VendoraError::Transport(TransportError::Timeout)) => SearchResult::failed(TOO_SLOW),
            Err(e) => {
                warn!(tenant, term, kind = e.kind(), error = %e, "search failed");
                SearchResult::failed(UNAVAILABLE)
            }
        }
    }
}
