//! System prompt rendering for a tenant's sales agent.

use std::fmt::Write as _;

use tracing::debug;

use crate::business::BusinessData;
use crate::types::TenantProfile;

const DEFAULT_PERSONALITY: &str = "friendly, professional and approachable";
const DEFAULT_BOT_NAME: &str = "sales assistant";
const DEFAULT_BUSINESS_NAME: &str = "the company";
const DEFAULT_VALUE_PROPOSITION: &str = "We offer quality products with fast delivery.";
const NO_CATALOG: &str = "No product or service information is loaded. Use the search_catalog \
                          tool whenever the customer asks about something specific.";

/// Business data sections embedded in the prompt. Empty means unavailable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromptSections {
    pub categories: String,
    pub branches: String,
    pub payment_methods: String,
    pub business_context: String,
    pub shipping_costs: String,
    pub faqs: String,
}

impl PromptSections {
    /// Fetch every section concurrently. Lookups never fail; a section that
    /// cannot be loaded is empty.
    pub async fn gather(profile: &TenantProfile, data: &BusinessData) -> Self {
        let faqs = data.faqs(profile.chatbot_id);
        let Some(tenant) = profile.tenant_id else {
            return Self {
                faqs: faqs.await,
                ..Self::default()
            };
        };

        let (categories, branches, payment_methods, business_context, shipping_costs, faqs) = tokio::join!(
            data.categories(tenant),
            data.branches(tenant),
            data.payment_methods(tenant),
            data.business_context(tenant),
            data.shipping_costs(tenant),
            faqs,
        );
        debug!(
            tenant,
            categories = !categories.is_empty(),
            branches = !branches.is_empty(),
            payment_methods = !payment_methods.is_empty(),
            business_context = !business_context.is_empty(),
            shipping_costs = !shipping_costs.is_empty(),
            faqs = !faqs.is_empty(),
            "prompt sections gathered"
        );
        Self {
            categories,
            branches,
            payment_methods,
            business_context,
            shipping_costs,
            faqs,
        }
    }
}

fn or_default<'a>(value: &'a Option<String>, default: &'a str) -> &'a str {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(default)
}

fn section(out: &mut String, title: &str, body: &str) {
    let body = body.trim();
    if !body.is_empty() {
        let _ = write!(out, "\n\n## {title}\n{body}");
    }
}

/// Render the system prompt from a profile and its gathered sections.
pub fn render(profile: &TenantProfile, sections: &PromptSections) -> String {
    let bot_name = or_default(&profile.bot_name, DEFAULT_BOT_NAME);
    let personality = or_default(&profile.personality, DEFAULT_PERSONALITY);
    // A bot name stands in for a missing business name.
    let business_name = match or_default(&profile.business_name, "") {
        "" => or_default(&profile.bot_name, DEFAULT_BUSINESS_NAME),
        name => name,
    };
    let value_proposition = or_default(&profile.value_proposition, DEFAULT_VALUE_PROPOSITION);

    let mut out = format!(
        "You are {bot_name}, the {personality} sales assistant of {business_name}.\n\
         {value_proposition}\n\n\
         Help customers find products and services, answer their questions and \
         register their orders. Never invent prices, stock or policies: use the \
         search_catalog tool for anything not listed below. Before calling \
         register_order, confirm the products, quantities, delivery details and \
         payment with the customer. Keep answers short and clear."
    );

    let categories = match sections.categories.trim() {
        "" => NO_CATALOG,
        text => text,
    };
    section(&mut out, "Products and services", categories);
    section(&mut out, "Branches", &sections.branches);

    let payment = match sections.payment_methods.trim() {
        "" => or_default(&profile.payment_notes, ""),
        text => text,
    };
    section(&mut out, "Payment methods", payment);
    section(&mut out, "About the business", &sections.business_context);
    section(&mut out, "Shipping costs", &sections.shipping_costs);
    section(&mut out, "Frequently asked questions", &sections.faqs);
    out
}

/// Gather sections for `profile` and render its prompt.
pub async fn build_system_prompt(profile: &TenantProfile, data: &BusinessData) -> String {
    let sections = PromptSections::gather(profile, data).await;
    render(profile, &sections)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_a_bare_profile() {
        let prompt = render(&TenantProfile::new(1), &PromptSections::default());
        assert!(prompt.starts_with("You are sales assistant, the friendly"));
        assert!(prompt.contains("of the company."));
        assert!(prompt.contains(NO_CATALOG));
        assert!(!prompt.contains("## Branches"));
    }

    #[test]
    fn bot_name_stands_in_for_business_name() {
        let profile = TenantProfile::new(1).bot_name("Dulce Bot");
        let prompt = render(&profile, &PromptSections::default());
        assert!(prompt.contains("sales assistant of Dulce Bot."));

        let profile = profile.business_name("Dulce Tentación");
        let prompt = render(&profile, &PromptSections::default());
        assert!(prompt.contains("of Dulce Tentación."));
    }

    #[test]
    fn sections_render_in_order() {
        let sections = PromptSections {
            categories: "1) Cakes".into(),
            branches: "1) Centro".into(),
            faqs: "Question: a\nAnswer: b".into(),
            ..PromptSections::default()
        };
        let prompt = render(&TenantProfile::new(1), &sections);
        let cats = prompt.find("## Products and services").unwrap();
        let branches = prompt.find("## Branches").unwrap();
        let faqs = prompt.find("## Frequently asked questions").unwrap();
        assert!(cats < branches && branches < faqs);
        assert!(!prompt.contains(NO_CATALOG));
    }

    #[test]
    fn payment_notes_used_when_lookup_is_empty() {
        let mut profile = TenantProfile::new(1);
        profile.payment_notes = Some("Cash on delivery".into());
        let prompt = render(&profile, &PromptSections::default());
        assert!(prompt.contains("## Payment methods\nCash on delivery"));
    }
}
