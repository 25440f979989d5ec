//! Upstream record types and their prompt/tool text renderings.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::lenient;

const MAX_CATEGORIES: usize = 15;
const MAX_BRANCHES: usize = 5;
const CATEGORY_DESCRIPTION_CHARS: usize = 200;
const PRODUCT_DESCRIPTION_CHARS: usize = 120;

// ============================================================================
// Text helpers
// ============================================================================

/// Strip HTML tags and common entities, collapse whitespace, and cut to
/// `max_chars` characters with a trailing `...`.
pub fn clean_text(raw: &str, max_chars: usize) -> String {
    let mut stripped = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(open) = rest.find('<') {
        stripped.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('>') {
            Some(close) if close > 0 => {
                stripped.push(' ');
                rest = &after[close + 1..];
            }
            _ => {
                stripped.push('<');
                rest = after;
            }
        }
    }
    stripped.push_str(rest);

    let decoded = stripped.replace("&nbsp;", " ").replace("&amp;", "&");
    let collapsed = decoded.split_whitespace().collect::<Vec<_>>().join(" ");
    truncate_chars(&collapsed, max_chars)
}

fn truncate_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_owned(),
    }
}

fn or_dash(s: &str) -> &str {
    if s.is_empty() { "-" } else { s }
}

/// `1234.5` as `1,234.50`.
fn thousands(value: f64) -> String {
    let fixed = format!("{:.2}", value.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    let sign = if value < 0.0 { "-" } else { "" };
    format!("{sign}{grouped}.{frac_part}")
}

/// Unit price as shown in search results: `S/. 1,234.50`.
pub fn format_price(price: Option<f64>) -> String {
    match price {
        Some(p) if p.is_finite() => format!("S/. {}", thousands(p)),
        _ => "-".to_owned(),
    }
}

/// Shipping cost: whole amounts without decimals (`S/ 20`), others with two
/// (`S/ 20.50`). Non-numeric text is shown as given.
pub fn format_cost(raw: &str) -> String {
    let raw = raw.trim();
    if raw.is_empty() {
        return "-".to_owned();
    }
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() && v.fract() == 0.0 => format!("S/ {}", v as i64),
        Ok(v) if v.is_finite() => format!("S/ {v:.2}"),
        _ => raw.to_owned(),
    }
}

// ============================================================================
// Categories
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Category {
    #[serde(default, rename = "nombre", deserialize_with = "lenient::text")]
    pub name: String,
    #[serde(default, rename = "descripcion", deserialize_with = "lenient::text")]
    pub description: String,
    #[serde(default, rename = "cantidad_productos", deserialize_with = "lenient::number")]
    pub product_count: Option<f64>,
}

/// `N) Name: description. (K products)`, one line per category.
pub fn format_categories(categories: &[Category]) -> String {
    categories
        .iter()
        .take(MAX_CATEGORIES)
        .enumerate()
        .map(|(i, cat)| {
            let name = if cat.name.is_empty() { "Unnamed" } else { cat.name.as_str() };
            let desc = clean_text(&cat.description, CATEGORY_DESCRIPTION_CHARS);
            let mut line = if desc.is_empty() {
                format!("{}) {name}.", i + 1)
            } else {
                format!("{}) {name}: {desc}.", i + 1)
            };
            if let Some(count) = cat.product_count.filter(|c| *c >= 1.0) {
                line.push_str(&format!(" ({} products)", count as u64));
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn categories_from_envelope(body: &Value) -> String {
    format_categories(&lenient::field_list::<Category>(body, "categorias"))
}

// ============================================================================
// Branches
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Branch {
    #[serde(default, rename = "nombre", deserialize_with = "lenient::text")]
    pub name: String,
    #[serde(default, rename = "direccion", deserialize_with = "lenient::text")]
    pub address: String,
    #[serde(default, rename = "horario_lunes", deserialize_with = "lenient::text")]
    pub monday: String,
    #[serde(default, rename = "horario_martes", deserialize_with = "lenient::text")]
    pub tuesday: String,
    #[serde(default, rename = "horario_miercoles", deserialize_with = "lenient::text")]
    pub wednesday: String,
    #[serde(default, rename = "horario_jueves", deserialize_with = "lenient::text")]
    pub thursday: String,
    #[serde(default, rename = "horario_viernes", deserialize_with = "lenient::text")]
    pub friday: String,
    #[serde(default, rename = "horario_sabado", deserialize_with = "lenient::text")]
    pub saturday: String,
    #[serde(default, rename = "horario_domingo", deserialize_with = "lenient::text")]
    pub sunday: String,
}

impl Branch {
    pub fn week(&self) -> [&str; 7] {
        [
            &self.monday,
            &self.tuesday,
            &self.wednesday,
            &self.thursday,
            &self.friday,
            &self.saturday,
            &self.sunday,
        ]
    }
}

fn is_closed(hours: &str) -> bool {
    let lower = hours.to_lowercase();
    lower.is_empty() || lower.contains("closed") || lower.contains("cerrado")
}

/// Group consecutive days sharing the same hours: `Mon-Fri 9-18, Sat 9-13, Sun closed`.
///
/// A week with no hours at all yields `""` rather than "closed every day".
pub fn compact_schedule(week: [&str; 7]) -> String {
    const DAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

    if week.iter().all(|h| h.trim().is_empty()) {
        return String::new();
    }

    let mut groups = Vec::new();
    let mut start = 0;
    while start < week.len() {
        let hours = week[start].trim();
        let mut end = start;
        while end + 1 < week.len() && week[end + 1].trim() == hours {
            end += 1;
        }
        let range = if end > start {
            format!("{}-{}", DAYS[start], DAYS[end])
        } else {
            DAYS[start].to_owned()
        };
        let label = if is_closed(hours) { "closed" } else { hours };
        groups.push(format!("{range} {label}"));
        start = end + 1;
    }
    groups.join(", ")
}

/// `N) Name, Address. Hours: <compact>.`, one line per branch.
pub fn format_branches(branches: &[Branch]) -> String {
    branches
        .iter()
        .take(MAX_BRANCHES)
        .enumerate()
        .map(|(i, b)| {
            let name = if b.name.is_empty() { "Unnamed" } else { b.name.as_str() };
            let mut line = format!("{}) {name}", i + 1);
            if !b.address.is_empty() {
                line.push_str(", ");
                line.push_str(&b.address);
            }
            let hours = compact_schedule(b.week());
            if !hours.is_empty() {
                line.push_str(". Hours: ");
                line.push_str(&hours);
            }
            line.push('.');
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn branches_from_envelope(body: &Value) -> String {
    format_branches(&lenient::field_list::<Branch>(body, "sucursales"))
}

// ============================================================================
// Payment methods
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Bank {
    #[serde(default, rename = "nombre", deserialize_with = "lenient::text")]
    pub name: String,
    #[serde(default, rename = "numero_cuenta", deserialize_with = "lenient::text")]
    pub account: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub cci: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Wallet {
    #[serde(default, rename = "titular", deserialize_with = "lenient::text")]
    pub holder: String,
    #[serde(default, rename = "celular", deserialize_with = "lenient::text")]
    pub phone: String,
}

impl Wallet {
    fn describe(&self, label: &str) -> Option<String> {
        let mut parts = Vec::new();
        if !self.holder.is_empty() {
            parts.push(self.holder.clone());
        }
        if !self.phone.is_empty() {
            parts.push(format!("phone {}", self.phone));
        }
        (!parts.is_empty()).then(|| format!("{label}: {}", parts.join(", ")))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaymentMethods {
    #[serde(default, rename = "bancos", deserialize_with = "lenient::list")]
    pub banks: Vec<Bank>,
    #[serde(default)]
    pub yape: Option<Wallet>,
    #[serde(default)]
    pub plin: Option<Wallet>,
}

/// A "Banks:" section and a "Digital wallets:" section, each saying so
/// explicitly when nothing is configured.
pub fn format_payment_methods(methods: &PaymentMethods) -> String {
    let banks = if methods.banks.is_empty() {
        "Banks: No bank accounts configured.".to_owned()
    } else {
        let lines: Vec<String> = methods
            .banks
            .iter()
            .enumerate()
            .map(|(i, b)| {
                let name = if b.name.is_empty() { "Bank" } else { b.name.as_str() };
                if b.account.is_empty() && b.cci.is_empty() {
                    format!("{}) {name}", i + 1)
                } else {
                    format!("{}) {name}: Account {}, CCI {}", i + 1, b.account, b.cci)
                }
            })
            .collect();
        format!("Banks:\n{}", lines.join("\n"))
    };

    let wallets: Vec<String> = [("Yape", &methods.yape), ("Plin", &methods.plin)]
        .into_iter()
        .filter_map(|(label, w)| w.as_ref().and_then(|w| w.describe(label)))
        .enumerate()
        .map(|(i, w)| format!("{}) {w}", i + 1))
        .collect();
    let wallets = if wallets.is_empty() {
        "Digital wallets: No digital wallets configured.".to_owned()
    } else {
        format!("Digital wallets:\n{}", wallets.join("\n"))
    };

    format!("{banks}\n\n{wallets}")
}

/// Missing or non-object `metodos_pago` renders as `""`.
pub fn payment_methods_from_envelope(body: &Value) -> String {
    match body.get("metodos_pago") {
        Some(v) if v.as_object().is_some_and(|m| !m.is_empty()) => {
            serde_json::from_value::<PaymentMethods>(v.clone())
                .map(|m| format_payment_methods(&m))
                .unwrap_or_default()
        }
        _ => String::new(),
    }
}

// ============================================================================
// Business context
// ============================================================================

pub fn business_context_from_envelope(body: &Value) -> String {
    body.get("contexto_negocio")
        .map(lenient::value_text)
        .unwrap_or_default()
}

// ============================================================================
// Shipping costs
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ShippingZone {
    #[serde(default, rename = "lugar", deserialize_with = "lenient::text")]
    pub place: String,
    #[serde(default, rename = "costo", deserialize_with = "lenient::text")]
    pub cost: String,
    #[serde(default, rename = "tipo_envio", deserialize_with = "lenient::text")]
    pub kind: String,
    #[serde(default, rename = "tiempo_entrega", deserialize_with = "lenient::text")]
    pub delivery_time: String,
}

/// `- Zone: X, Cost: S/ 20, Type: T, Time: D`, one line per zone.
pub fn format_shipping_zones(zones: &[ShippingZone]) -> String {
    zones
        .iter()
        .map(|z| {
            format!(
                "- Zone: {}, Cost: {}, Type: {}, Time: {}",
                or_dash(&z.place),
                format_cost(&z.cost),
                or_dash(&z.kind),
                or_dash(&z.delivery_time)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// `zonas_costos` is itself a JSON document encoded as a string.
pub fn shipping_costs_from_envelope(body: &Value) -> String {
    let zones = match body.get("zonas_costos") {
        Some(Value::String(raw)) if !raw.trim().is_empty() => {
            match serde_json::from_str::<Value>(raw) {
                Ok(doc) => lenient::field_list::<ShippingZone>(&doc, "zonas"),
                Err(e) => {
                    tracing::warn!(error = %e, "unparseable shipping zones");
                    return String::new();
                }
            }
        }
        Some(doc) if doc.is_object() => lenient::field_list::<ShippingZone>(doc, "zonas"),
        _ => Vec::new(),
    };
    format_shipping_zones(&zones)
}

// ============================================================================
// FAQs
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Faq {
    #[serde(default, rename = "pregunta", deserialize_with = "lenient::text")]
    pub question: String,
    #[serde(default, rename = "respuesta", deserialize_with = "lenient::text")]
    pub answer: String,
}

/// `Question:`/`Answer:` pairs separated by blank lines.
pub fn format_faqs(faqs: &[Faq]) -> String {
    faqs.iter()
        .filter(|f| !f.question.is_empty() || !f.answer.is_empty())
        .map(|f| {
            let q = if f.question.is_empty() { "(no text)" } else { f.question.as_str() };
            let a = if f.answer.is_empty() { "(no text)" } else { f.answer.as_str() };
            format!("Question: {q}\nAnswer: {a}")
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn faqs_from_envelope(body: &Value) -> String {
    format_faqs(&lenient::field_list::<Faq>(body, "preguntas_frecuentes"))
}

// ============================================================================
// Products
// ============================================================================

/// Catalog entry returned by product search.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Product {
    #[serde(default, deserialize_with = "lenient::text")]
    pub id: String,
    #[serde(default, rename = "nombre", deserialize_with = "lenient::text")]
    pub name: String,
    #[serde(default, rename = "precio_unitario", deserialize_with = "lenient::number")]
    pub unit_price: Option<f64>,
    #[serde(default, rename = "nombre_categoria", deserialize_with = "lenient::text")]
    pub category: String,
    #[serde(default, rename = "descripcion", deserialize_with = "lenient::text")]
    pub description: String,
    #[serde(default, rename = "nombre_unidad", deserialize_with = "lenient::text")]
    pub unit: String,
}

fn format_product(p: &Product) -> String {
    let description = clean_text(&p.description, PRODUCT_DESCRIPTION_CHARS);
    let unit = if p.unit.is_empty() {
        "unit".to_owned()
    } else {
        p.unit.to_lowercase()
    };
    format!(
        "### {}\n- ID: {}\n- Price: {} per {unit}\n- Category: {}\n- Description: {}",
        or_dash(&p.name),
        or_dash(&p.id),
        format_price(p.unit_price),
        or_dash(&p.category),
        or_dash(&description),
    )
}

/// Products rendered for a tool reply.
pub fn format_products(products: &[Product]) -> String {
    if products.is_empty() {
        return "No results found.".to_owned();
    }
    products
        .iter()
        .map(format_product)
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn clean_text_strips_markup_and_truncates() {
        assert_eq!(
            clean_text("<p>Fresh&nbsp;bread &amp; <b>cakes</b></p>", 200),
            "Fresh bread & cakes"
        );
        assert_eq!(clean_text("abcdef", 3), "abc...");
        assert_eq!(clean_text("a < b", 10), "a < b");
        assert_eq!(clean_text("ñandú", 5), "ñandú");
    }

    #[test]
    fn prices_and_costs() {
        assert_eq!(format_price(Some(1234.5)), "S/. 1,234.50");
        assert_eq!(format_price(Some(12.0)), "S/. 12.00");
        assert_eq!(format_price(Some(1_000_000.0)), "S/. 1,000,000.00");
        assert_eq!(format_price(None), "-");
        assert_eq!(format_cost("20"), "S/ 20");
        assert_eq!(format_cost("20.5"), "S/ 20.50");
        assert_eq!(format_cost("to agree"), "to agree");
        assert_eq!(format_cost(""), "-");
    }

    #[test]
    fn categories_limit_and_counts() {
        let body = json!({"success": true, "categorias": [
            {"nombre": "Cakes", "descripcion": "<i>Sweet</i>", "cantidad_productos": "4"},
            {"nombre": "", "descripcion": null, "cantidad_productos": 0}
        ]});
        assert_eq!(
            categories_from_envelope(&body),
            "1) Cakes: Sweet. (4 products)\n2) Unnamed."
        );

        let many: Vec<Category> = (0..20)
            .map(|i| Category {
                name: format!("c{i}"),
                ..Category::default()
            })
            .collect();
        assert_eq!(format_categories(&many).lines().count(), 15);
    }

    #[test]
    fn schedule_groups_consecutive_days() {
        let week = ["9-18", "9-18", "9-18", "9-18", "9-18", "9-13", ""];
        assert_eq!(compact_schedule(week), "Mon-Fri 9-18, Sat 9-13, Sun closed");

        let split = ["9-18", "Cerrado", "9-18", "9-18", "9-18", "9-18", "9-18"];
        assert_eq!(
            compact_schedule(split),
            "Mon 9-18, Tue closed, Wed-Sun 9-18"
        );
        assert_eq!(compact_schedule([""; 7]), "");
    }

    #[test]
    fn branches_render_address_and_hours() {
        let body = json!({"sucursales": [{
            "nombre": "Centro",
            "direccion": "Av. Lima 123",
            "horario_lunes": "9-18", "horario_martes": "9-18", "horario_miercoles": "9-18",
            "horario_jueves": "9-18", "horario_viernes": "9-18",
            "horario_sabado": "cerrado", "horario_domingo": "cerrado"
        }]});
        assert_eq!(
            branches_from_envelope(&body),
            "1) Centro, Av. Lima 123. Hours: Mon-Fri 9-18, Sat-Sun closed."
        );
    }

    #[test]
    fn payment_methods_sections() {
        let body = json!({"metodos_pago": {
            "bancos": [{"nombre": "BCP", "numero_cuenta": "123", "cci": "00123"}],
            "yape": {"titular": "Ana", "celular": 999111222},
            "plin": null
        }});
        assert_eq!(
            payment_methods_from_envelope(&body),
            "Banks:\n1) BCP: Account 123, CCI 00123\n\nDigital wallets:\n1) Yape: Ana, phone 999111222"
        );

        let empty = json!({"metodos_pago": {"bancos": null}});
        assert_eq!(
            payment_methods_from_envelope(&empty),
            "Banks: No bank accounts configured.\n\nDigital wallets: No digital wallets configured."
        );
        assert_eq!(payment_methods_from_envelope(&json!({"metodos_pago": {}})), "");
    }

    #[test]
    fn shipping_zones_from_embedded_json() {
        let body = json!({
            "zonas_costos": r#"{"zonas":[{"lugar":"San Isidro","costo":"20","tipo_envio":"Express","tiempo_entrega":"1 day"},{"lugar":"","costo":12.5}]}"#
        });
        assert_eq!(
            shipping_costs_from_envelope(&body),
            "- Zone: San Isidro, Cost: S/ 20, Type: Express, Time: 1 day\n- Zone: -, Cost: S/ 12.50, Type: -, Time: -"
        );
        assert_eq!(shipping_costs_from_envelope(&json!({"zonas_costos": "{oops"})), "");
    }

    #[test]
    fn faqs_skip_blank_pairs() {
        let body = json!({"preguntas_frecuentes": [
            {"pregunta": "Do you deliver?", "respuesta": "Yes"},
            {"pregunta": "", "respuesta": ""},
            {"pregunta": "Hours?", "respuesta": null}
        ]});
        assert_eq!(
            faqs_from_envelope(&body),
            "Question: Do you deliver?\nAnswer: Yes\n\nQuestion: Hours?\nAnswer: (no text)"
        );
    }

    #[test]
    fn product_rendering() {
        let product: Product = serde_json::from_value(json!({
            "id": 17, "nombre": "Chocolate cake", "precio_unitario": "45.9",
            "nombre_categoria": "Cakes", "descripcion": "<p>Rich</p>", "nombre_unidad": "Unit"
        }))
        .unwrap();
        assert_eq!(
            format_products(&[product]),
            "### Chocolate cake\n- ID: 17\n- Price: S/. 45.90 per unit\n- Category: Cakes\n- Description: Rich"
        );
        assert_eq!(format_products(&[]), "No results found.");
    }
}
