//! Order registration (write path, never retried).

use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{error, info, warn};

use super::BusinessData;
use super::lenient;
use crate::resilience::Outcome;
use crate::types::TurnContext;
use crate::{Result, VendoraError};

const OP_REGISTER_ORDER: &str = "REGISTRAR_PEDIDO";
const CURRENCY_ID: u64 = 1;

/// One catalog line of an order.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OrderItem {
    #[serde(alias = "id_catalogo", deserialize_with = "lenient::integer")]
    pub catalog_id: u64,
    #[serde(alias = "cantidad", deserialize_with = "lenient::integer")]
    pub quantity: u64,
}

/// Order details collected by the agent from the customer.
///
/// Numeric identifiers (payment operation, DNI, phone) are kept as text
/// since models send them as either numbers or strings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OrderRequest {
    #[serde(deserialize_with = "lenient::embedded_list")]
    pub products: Vec<OrderItem>,
    #[serde(deserialize_with = "lenient::text")]
    pub operation: String,
    #[serde(deserialize_with = "lenient::text")]
    pub modality: String,
    #[serde(deserialize_with = "lenient::text")]
    pub shipping_type: String,
    #[serde(deserialize_with = "lenient::text")]
    pub name: String,
    #[serde(deserialize_with = "lenient::text")]
    pub dni: String,
    #[serde(deserialize_with = "lenient::text")]
    pub phone: String,
    #[serde(deserialize_with = "lenient::text")]
    pub payment_method: String,
    #[serde(deserialize_with = "lenient::required_number")]
    pub amount_paid: f64,
    #[serde(default, deserialize_with = "lenient::text")]
    pub address: String,
    #[serde(default, deserialize_with = "lenient::number")]
    pub shipping_cost: Option<f64>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub note: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub estimated_delivery: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub email: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub branch: String,
}

impl OrderRequest {
    pub fn validate(&self) -> Result<()> {
        if self.products.is_empty() {
            return Err(VendoraError::InvalidInput(
                "an order needs at least one product".into(),
            ));
        }
        if let Some(item) = self.products.iter().find(|p| p.quantity == 0) {
            return Err(VendoraError::InvalidInput(format!(
                "product {} has quantity 0",
                item.catalog_id
            )));
        }
        let missing: Vec<&str> = [
            ("operation", &self.operation),
            ("modality", &self.modality),
            ("name", &self.name),
            ("dni", &self.dni),
            ("phone", &self.phone),
            ("payment_method", &self.payment_method),
        ]
        .into_iter()
        .filter(|(_, v)| v.is_empty())
        .map(|(field, _)| field)
        .collect();
        if !missing.is_empty() {
            return Err(VendoraError::InvalidInput(format!(
                "missing order fields: {}",
                missing.join(", ")
            )));
        }
        Ok(())
    }

    /// Upstream payload. Tenant and session come from the turn, never from
    /// model-supplied arguments.
    pub fn to_payload(&self, ctx: &TurnContext) -> Value {
        let products: Vec<Value> = self
            .products
            .iter()
            .map(|p| json!({"id_catalogo": p.catalog_id, "cantidad": p.quantity}))
            .collect();
        json!({
            "codOpe": OP_REGISTER_ORDER,
            "id_empresa": ctx.tenant_id,
            "id_moneda": CURRENCY_ID,
            "id_prospecto": ctx.session_id,
            "productos": products,
            "operacion": self.operation,
            "modalidad": self.modality,
            "tipo_envio": self.shipping_type,
            "direccion": self.address,
            "costo_envio": self.shipping_cost.unwrap_or(0.0),
            "observacion": self.note,
            "fecha_entrega_estimada": self.estimated_delivery,
            "nombre": self.name,
            "dni": self.dni,
            "celular": self.phone,
            "email": self.email,
            "medio_pago": self.payment_method,
            "sucursal": self.branch,
            "monto_pagado": self.amount_paid,
        })
    }
}

impl BusinessData {
    /// Register a confirmed order and describe the outcome for the model.
    ///
    /// Sent once with no retry and no breaker: a timed-out write may have
    /// landed upstream, and repeating it could duplicate the order.
    pub async fn register_order(&self, ctx: &TurnContext, order: &OrderRequest) -> String {
        if let Err(e) = order.validate() {
            return format!("The order was not registered: {e}. Ask the customer for the missing details.");
        }

        info!(
            tenant = ctx.tenant_id,
            session = ctx.session_id,
            products = order.products.len(),
            operation = %order.operation,
            "registering order"
        );

        let payload = order.to_payload(ctx);
        match Outcome::from_envelope(self.information.submit(&payload).await) {
            Outcome::Success(body) => {
                let order_id = ["id_pedido", "id"]
                    .iter()
                    .filter_map(|f| body.get(*f))
                    .map(lenient::value_text)
                    .find(|id| !id.is_empty());
                info!(tenant = ctx.tenant_id, order_id = ?order_id, "order registered");
                match order_id {
                    Some(id) => format!("Order registered successfully. Order number: {id}."),
                    None => "Order registered successfully.".to_owned(),
                }
            }
            Outcome::BusinessFailure(reason) => {
                warn!(tenant = ctx.tenant_id, %reason, "order rejected by upstream");
                format!("The order could not be registered: {reason}")
            }
            Outcome::TransportFailure(e) => {
                error!(tenant = ctx.tenant_id, error = %e, "order submit failed");
                "The order could not be registered because of a communication error. \
                 Please try again."
                    .to_owned()
            }
            Outcome::Failed(e) => {
                error!(tenant = ctx.tenant_id, kind = e.kind(), error = %e, "order submit failed");
                format!(
                    "The order could not be registered because of an upstream error ({}). \
                     Please try again.",
                    e.kind()
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order() -> OrderRequest {
        serde_json::from_value(json!({
            "products": [{"id_catalogo": "17", "cantidad": 2}],
            "operation": 123456,
            "modality": "Delivery",
            "shipping_type": "Express",
            "name": "Ana Pérez",
            "dni": 44556677,
            "phone": "999111222",
            "payment_method": "yape",
            "amount_paid": "90.5",
            "address": "Av. Lima 123",
            "shipping_cost": 10
        }))
        .unwrap()
    }

    #[test]
    fn lenient_arguments_are_accepted() {
        let order = order();
        assert_eq!(order.products[0].catalog_id, 17);
        assert_eq!(order.operation, "123456");
        assert_eq!(order.dni, "44556677");
        assert_eq!(order.amount_paid, 90.5);
        assert!(order.validate().is_ok());
    }

    #[test]
    fn payload_carries_turn_identity() {
        let payload = order().to_payload(&TurnContext::new(42, 7));
        assert_eq!(payload["codOpe"], "REGISTRAR_PEDIDO");
        assert_eq!(payload["id_empresa"], 42);
        assert_eq!(payload["id_prospecto"], 7);
        assert_eq!(payload["id_moneda"], 1);
        assert_eq!(payload["productos"][0]["cantidad"], 2);
        assert_eq!(payload["costo_envio"], 10.0);
        assert_eq!(payload["sucursal"], "");
    }

    #[test]
    fn products_may_arrive_json_encoded() {
        let order: OrderRequest = serde_json::from_value(json!({
            "products": "[{\"catalog_id\": 5, \"quantity\": \"3\"}]",
            "operation": "1", "modality": "Pickup", "shipping_type": "",
            "name": "Luis", "dni": "1", "phone": "2",
            "payment_method": "plin", "amount_paid": 30
        }))
        .unwrap();
        assert_eq!(order.products, vec![OrderItem { catalog_id: 5, quantity: 3 }]);
    }

    #[test]
    fn validation_names_missing_fields() {
        let mut order = order();
        order.name.clear();
        order.phone.clear();
        let err = order.validate().unwrap_err().to_string();
        assert!(err.contains("name, phone"), "got {err}");

        let mut empty = self::order();
        empty.products.clear();
        assert!(empty.validate().is_err());
    }
}
