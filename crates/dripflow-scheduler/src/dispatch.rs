//! Dispatch — the single render/send/transition path shared by the
//! poller and the immediate-dispatch path.
//!
//! Failures during one entry's dispatch are fully contained: recorded on
//! that entry, logged, and the pass moves on. Only a failing due-scan
//! aborts a pass; the next tick retries the whole scan.

use chrono::{DateTime, Utc};
use dripflow_core::DripflowConfig;
use dripflow_core::error::Result;
use dripflow_store::Store;

use crate::render::{render_body, render_text};

/// What happened to one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Sent,
    Failed,
    /// Another path claimed the entry first — a silent no-op.
    AlreadyClaimed,
}

/// Dispatch one queue entry end to end.
///
/// Claims the entry first (`queued → sending`); losing the claim means
/// the poller and the immediate path raced and the other side is sending,
/// so this returns `AlreadyClaimed` without touching the row. Settings
/// are read fresh from the store on every call so rotated credentials
/// take effect immediately.
pub async fn dispatch_entry(
    store: &Store,
    config: &DripflowConfig,
    id: &str,
) -> Result<DispatchOutcome> {
    if !store.claim(id)? {
        tracing::debug!("Entry {id} already claimed, skipping");
        return Ok(DispatchOutcome::AlreadyClaimed);
    }

    let Some(entry) = store.get_email_log(id)? else {
        // Claimed a row that vanished — only possible via external deletion.
        tracing::warn!("⚠️ Claimed entry {id} no longer exists");
        return Ok(DispatchOutcome::Failed);
    };

    let Some(lead) = store.get_lead(&entry.lead_id)? else {
        store.mark_failed(id, &format!("Lead not found: {}", entry.lead_id))?;
        return Ok(DispatchOutcome::Failed);
    };
    let campaign = match &lead.campaign_id {
        Some(campaign_id) => store.get_campaign(campaign_id)?,
        None => None,
    };
    let lead_magnet = match &lead.lead_magnet_id {
        Some(magnet_id) => store.get_lead_magnet(magnet_id)?,
        None => None,
    };

    let subject = render_text(&entry.subject, &lead, campaign.as_ref(), lead_magnet.as_ref());
    let body = render_body(&entry.body, &lead, campaign.as_ref(), lead_magnet.as_ref());

    let settings = store.get_settings()?;
    let provider = match dripflow_providers::create_provider(&settings, config) {
        Ok(provider) => provider,
        Err(e) => {
            store.mark_failed(id, &e.to_string())?;
            tracing::warn!("⚠️ Entry {id} failed: {e}");
            return Ok(DispatchOutcome::Failed);
        }
    };

    match provider.send(&lead.email, &subject, &body).await {
        Ok(provider_message_id) => {
            store.mark_sent(id, provider_message_id.as_deref(), Utc::now())?;
            tracing::info!("✅ Sent '{subject}' to {} via {}", lead.email, provider.name());
            Ok(DispatchOutcome::Sent)
        }
        Err(e) => {
            store.mark_failed(id, &e.to_string())?;
            tracing::warn!("⚠️ Entry {id} failed: {e}");
            Ok(DispatchOutcome::Failed)
        }
    }
}

/// One poller pass: pull the due page (oldest first), dispatch each entry.
/// Returns how many entries were attempted.
pub async fn process_due(
    store: &Store,
    config: &DripflowConfig,
    now: DateTime<Utc>,
) -> Result<usize> {
    let due = store.list_due(now, config.dispatch.batch_size)?;
    let total = due.len();

    for entry in &due {
        if let Err(e) = dispatch_entry(store, config, &entry.id).await {
            // Store-level error mid-entry: record it and keep the batch going.
            store.mark_failed(&entry.id, &e.to_string()).ok();
            tracing::warn!("⚠️ Entry {} failed: {e}", entry.id);
        }
    }

    Ok(total)
}
