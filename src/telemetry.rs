//! Telemetry metric name constants.
//!
//! Centralised metric names for vendora operations. Consumers install
//! their own `metrics` recorder (e.g. prometheus, statsd); without a
//! recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `vendora_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `cache`: cache instance name (e.g. "agents", "categories", "search")
//! - `service`: upstream lookup name (e.g. "categories", "faqs")
//! - `result`: cache lookup outcome: "hit", "miss" or "circuit_open"
//! - `status`: outcome: "success" or "error"

/// Cache lookups by outcome.
///
/// Labels: `cache`, `result` ("hit" | "miss" | "circuit_open").
pub const CACHE_LOOKUPS_TOTAL: &str = "vendora_cache_lookups_total";

/// Upstream calls made through a circuit breaker.
///
/// Labels: `service`, `status` ("success" | "error").
pub const RESILIENT_CALLS_TOTAL: &str = "vendora_resilient_calls_total";

/// Times a breaker key reached its failure threshold.
///
/// Labels: `breaker`.
pub const CIRCUIT_TRIPS_TOTAL: &str = "vendora_circuit_trips_total";

/// Total retry attempts (not counting the initial request).
///
/// Labels: `service`, `operation`.
pub const RETRIES_TOTAL: &str = "vendora_retries_total";

/// Model rounds requested by agents. A turn with tool calls makes several.
///
/// Labels: `status` ("success" | "error").
pub const LLM_REQUESTS_TOTAL: &str = "vendora_llm_requests_total";

/// Duration of one model round, in seconds.
///
/// Labels: `status` ("success" | "error").
pub const LLM_DURATION_SECONDS: &str = "vendora_llm_duration_seconds";

/// Tool invocations by the agent.
///
/// Labels: `tool` ("search_catalog" | "register_order" | "unknown"),
/// `status` ("success" | "error" | "invalid_arguments" | "unknown_tool").
pub const TOOL_CALLS_TOTAL: &str = "vendora_tool_calls_total";

/// Chat requests handled by [`ChatService`](crate::ChatService).
///
/// Labels: `status` ("success" | "timeout" | "error" | "rejected").
pub const CHAT_REQUESTS_TOTAL: &str = "vendora_chat_requests_total";

/// End-to-end chat request duration in seconds.
pub const CHAT_DURATION_SECONDS: &str = "vendora_chat_duration_seconds";

pub(crate) const RESULT_HIT: &str = "hit";
pub(crate) const RESULT_MISS: &str = "miss";
pub(crate) const RESULT_CIRCUIT_OPEN: &str = "circuit_open";
