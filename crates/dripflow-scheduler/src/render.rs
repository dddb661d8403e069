//! Template rendering — literal placeholder substitution plus the
//! mandatory unsubscribe footer.
//!
//! Unknown tokens are left untouched. `{{unsubscribe_url}}` itself is not
//! resolved here — the transport layer downstream owns that.

use dripflow_core::types::{Campaign, Lead, LeadMagnet};

const UNSUBSCRIBE_TOKEN: &str = "{{unsubscribe_url}}";
const UNSUBSCRIBE_FOOTER: &str = "\n\n---\nUnsubscribe: {{unsubscribe_url}}";

/// Substitute recognized placeholder tokens. Used for subjects and bodies.
pub fn render_text(
    text: &str,
    lead: &Lead,
    campaign: Option<&Campaign>,
    lead_magnet: Option<&LeadMagnet>,
) -> String {
    text.replace("{{name}}", lead.name.as_deref().unwrap_or("there"))
        .replace("{{company}}", lead.company.as_deref().unwrap_or(""))
        .replace(
            "{{lead_magnet_title}}",
            lead_magnet.map(|m| m.title.as_str()).unwrap_or(""),
        )
        .replace(
            "{{campaign_name}}",
            campaign.map(|c| c.name.as_str()).unwrap_or(""),
        )
}

/// Render a message body: substitution, then the unsubscribe footer when
/// the author did not already place an `{{unsubscribe_url}}` token. Every
/// outbound message carries an unsubscribe affordance.
pub fn render_body(
    body: &str,
    lead: &Lead,
    campaign: Option<&Campaign>,
    lead_magnet: Option<&LeadMagnet>,
) -> String {
    let mut rendered = render_text(body, lead, campaign, lead_magnet);
    if !rendered.contains(UNSUBSCRIBE_TOKEN) {
        rendered.push_str(UNSUBSCRIBE_FOOTER);
    }
    rendered
}
