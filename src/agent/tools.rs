//! Tools the sales agent can call during a turn.

use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::business::{BusinessData, OrderRequest, lenient};
use crate::telemetry;
use crate::types::{ToolCall, ToolDefinition, TurnContext};

pub const SEARCH_CATALOG: &str = "search_catalog";
pub const REGISTER_ORDER: &str = "register_order";

#[derive(Debug, Deserialize)]
struct SearchArgs {
    #[serde(default, alias = "busqueda", deserialize_with = "lenient::text")]
    query: String,
}

/// Definitions handed to the model on every round.
pub fn definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition::new(
            SEARCH_CATALOG,
            "Search the business catalog for products or services. Use it whenever the \
             customer asks about availability, prices or details of an item.",
            json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Product or service name, or keywords describing it"
                    }
                },
                "required": ["query"]
            }),
        ),
        ToolDefinition::new(
            REGISTER_ORDER,
            "Register a confirmed order. Call it only after the customer has confirmed \
             the products, delivery details and payment.",
            json!({
                "type": "object",
                "properties": {
                    "products": {
                        "type": "array",
                        "description": "Items as objects with catalog_id and quantity"
                    },
                    "operation": {"type": "string", "description": "Payment operation number"},
                    "modality": {"type": "string", "description": "Delivery or Pickup"},
                    "shipping_type": {"type": "string", "description": "Shipping type chosen by the customer"},
                    "name": {"type": "string", "description": "Customer full name"},
                    "dni": {"type": "string", "description": "Customer national ID"},
                    "phone": {"type": "string", "description": "Customer phone number"},
                    "payment_method": {"type": "string", "description": "Payment method used"},
                    "amount_paid": {"type": "number", "description": "Amount paid"},
                    "address": {"type": "string", "description": "Delivery address"},
                    "shipping_cost": {"type": "number", "description": "Shipping cost for the zone"},
                    "note": {"type": "string", "description": "Extra notes for the order"},
                    "estimated_delivery": {"type": "string", "description": "Estimated delivery date"},
                    "email": {"type": "string", "description": "Customer email"},
                    "branch": {"type": "string", "description": "Pickup branch"}
                },
                "required": [
                    "products", "operation", "modality", "shipping_type", "name",
                    "dni", "phone", "payment_method", "amount_paid"
                ]
            }),
        ),
    ]
}

/// Run one tool call. Every failure is reported to the model as text.
pub async fn execute(data: &BusinessData, ctx: &TurnContext, call: &ToolCall) -> String {
    let (status, text) = match call.name.as_str() {
        SEARCH_CATALOG => match call.parse_arguments::<SearchArgs>() {
            Ok(args) => {
                let result = data.search(ctx.tenant_id, &args.query).await;
                let status = if result.success { "success" } else { "error" };
                (status, result.to_tool_text(args.query.trim()))
            }
            Err(e) => ("invalid_arguments", invalid_arguments(call, &e)),
        },
        REGISTER_ORDER => match call.parse_arguments::<OrderRequest>() {
            Ok(order) => ("success", data.register_order(ctx, &order).await),
            Err(e) => ("invalid_arguments", invalid_arguments(call, &e)),
        },
        other => {
            warn!(tool = other, "model called an unknown tool");
            ("unknown_tool", format!("Unknown tool '{other}'."))
        }
    };

    metrics::counter!(telemetry::TOOL_CALLS_TOTAL,
        "tool" => tool_label(&call.name),
        "status" => status,
    )
    .increment(1);
    debug!(tool = %call.name, tenant = ctx.tenant_id, session = ctx.session_id, status, "tool executed");
    text
}

fn invalid_arguments(call: &ToolCall, error: &serde_json::Error) -> String {
    warn!(tool = %call.name, error = %error, "invalid tool arguments");
    format!("Invalid arguments for {}: {error}. Correct them and try again.", call.name)
}

/// Bounded label set: names the model invents collapse to `unknown`.
fn tool_label(name: &str) -> &'static str {
    match name {
        SEARCH_CATALOG => SEARCH_CATALOG,
        REGISTER_ORDER => REGISTER_ORDER,
        _ => "unknown",
    }
}
