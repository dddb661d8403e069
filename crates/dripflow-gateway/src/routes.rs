//! API route handlers for the gateway.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};
use chrono::Utc;
use dripflow_core::types::{Campaign, EmailLog, Lead, LeadMagnet, NurtureSequence, NurtureStep, new_id};
use dripflow_store::SettingsPatch;
use serde::Deserialize;
use serde_json::{Value, json};

use super::server::AppState;

type ApiResult = std::result::Result<Json<Value>, (StatusCode, Json<Value>)>;

fn api_err(status: StatusCode, msg: impl std::fmt::Display) -> (StatusCode, Json<Value>) {
    (status, Json(json!({ "ok": false, "error": msg.to_string() })))
}

fn internal(e: impl std::fmt::Display) -> (StatusCode, Json<Value>) {
    api_err(StatusCode::INTERNAL_SERVER_ERROR, e)
}

/// Mask a secret string for display — show first 4 chars + •••
fn mask_secret(s: &str) -> String {
    if s.is_empty() {
        return String::new();
    }
    let mut chars = s.chars();
    let prefix: String = chars.by_ref().take(4).collect();
    if chars.next().is_none() {
        return "••••".to_string();
    }
    format!("{prefix}••••")
}

/// Health check endpoint.
pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "dripflow-gateway",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// ── Lead capture ─────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct LeadCreatePayload {
    pub email: String,
    #[serde(default)]
    pub campaign_id: Option<String>,
    #[serde(default)]
    pub lead_magnet_id: Option<String>,
    #[serde(default)]
    pub landing_page_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
}

/// Create a lead, enqueue its nurture sequence, and trigger the
/// immediate-dispatch path for any near-term entry.
///
/// Returns success as soon as the rows are durable — the caller never
/// waits on, or learns about, the eventual delivery outcome.
pub async fn create_lead(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LeadCreatePayload>,
) -> ApiResult {
    if payload.email.trim().is_empty() {
        return Err(api_err(StatusCode::UNPROCESSABLE_ENTITY, "email is required"));
    }

    let now = Utc::now();
    let lead = Lead {
        id: new_id(),
        campaign_id: payload.campaign_id,
        lead_magnet_id: payload.lead_magnet_id,
        landing_page_id: payload.landing_page_id,
        email: payload.email.trim().to_string(),
        name: payload.name,
        company: payload.company,
        created_at: now,
    };
    state.store.insert_lead(&lead).map_err(internal)?;

    // Direct welcome notice — no sequence/step reference.
    state
        .store
        .insert_email_log(&EmailLog::direct(&lead.id, "Welcome", "Thanks for downloading.", now))
        .map_err(internal)?;

    let entries = dripflow_scheduler::enqueue_sequence_for_lead(&state.store, &lead, now)
        .map_err(internal)?;

    if let Some(immediate) =
        dripflow_scheduler::pick_immediate(&entries, now, state.config.dispatch.immediate_window_secs)
    {
        let store = state.store.clone();
        let config = state.config.clone();
        let entry_id = immediate.id.clone();
        // Fire and forget; the claim inside dispatch_entry keeps this from
        // racing the poller into a double-send.
        tokio::spawn(async move {
            if let Err(e) = dripflow_scheduler::dispatch_entry(&store, &config, &entry_id).await {
                tracing::warn!("⚠️ Immediate dispatch of {entry_id} failed: {e}");
            }
        });
    }

    Ok(Json(json!({
        "ok": true,
        "lead_id": lead.id,
        "queued": entries.len(),
    })))
}

// ── Delivery logs ────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct LogFilter {
    #[serde(default)]
    pub lead_id: Option<String>,
    #[serde(default)]
    pub campaign_id: Option<String>,
}

/// Operator-facing delivery log listing.
pub async fn list_email_logs(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<LogFilter>,
) -> ApiResult {
    let logs = state
        .store
        .list_logs(filter.lead_id.as_deref(), filter.campaign_id.as_deref(), 200)
        .map_err(internal)?;
    Ok(Json(json!({ "ok": true, "logs": logs })))
}

// ── Settings ─────────────────────────────────────────────────────────

/// Current delivery settings (API key masked).
pub async fn get_settings(State(state): State<Arc<AppState>>) -> ApiResult {
    let settings = state.store.get_settings().map_err(internal)?;
    Ok(Json(json!({
        "ok": true,
        "provider": settings.provider,
        "api_key": mask_secret(&settings.api_key),
        "api_key_set": !settings.api_key.is_empty(),
        "from_email": settings.from_email,
        "from_name": settings.from_name,
        "available_providers": dripflow_providers::available_providers(),
    })))
}

/// Partial settings update — rotated credentials take effect on the next
/// dispatch, no restart needed.
pub async fn update_settings(
    State(state): State<Arc<AppState>>,
    Json(patch): Json<SettingsPatch>,
) -> ApiResult {
    let updated = state.store.update_settings(&patch).map_err(internal)?;
    tracing::info!("⚙️ Delivery settings updated (provider: {})", updated.provider);
    Ok(Json(json!({
        "ok": true,
        "provider": updated.provider,
        "api_key_set": !updated.api_key.is_empty(),
        "from_email": updated.from_email,
        "from_name": updated.from_name,
    })))
}

// ── Campaign / sequence setup ────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CampaignCreatePayload {
    pub name: String,
}

pub async fn create_campaign(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CampaignCreatePayload>,
) -> ApiResult {
    let campaign = Campaign {
        id: new_id(),
        name: payload.name,
        created_at: Utc::now(),
    };
    state.store.insert_campaign(&campaign).map_err(internal)?;
    Ok(Json(json!({ "ok": true, "campaign": campaign })))
}

#[derive(Debug, Deserialize)]
pub struct LeadMagnetCreatePayload {
    pub campaign_id: String,
    pub title: String,
}

pub async fn create_lead_magnet(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LeadMagnetCreatePayload>,
) -> ApiResult {
    if state.store.get_campaign(&payload.campaign_id).map_err(internal)?.is_none() {
        return Err(api_err(StatusCode::NOT_FOUND, "Campaign not found"));
    }
    let magnet = LeadMagnet {
        id: new_id(),
        campaign_id: payload.campaign_id,
        title: payload.title,
        created_at: Utc::now(),
    };
    state.store.insert_lead_magnet(&magnet).map_err(internal)?;
    Ok(Json(json!({ "ok": true, "lead_magnet": magnet })))
}

#[derive(Debug, Deserialize)]
pub struct StepPayload {
    pub subject: String,
    pub body: String,
    #[serde(default)]
    pub offset_days: i64,
    #[serde(default)]
    pub intent: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SequenceCreatePayload {
    pub campaign_id: String,
    #[serde(default)]
    pub lead_magnet_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub steps: Vec<StepPayload>,
}

/// Create a sequence with its steps inline. Step order follows payload
/// order (1-based); offsets must be non-negative.
pub async fn create_sequence(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SequenceCreatePayload>,
) -> ApiResult {
    if state.store.get_campaign(&payload.campaign_id).map_err(internal)?.is_none() {
        return Err(api_err(StatusCode::NOT_FOUND, "Campaign not found"));
    }
    if payload.steps.iter().any(|s| s.offset_days < 0) {
        return Err(api_err(
            StatusCode::UNPROCESSABLE_ENTITY,
            "offset_days must be non-negative",
        ));
    }

    let now = Utc::now();
    let seq = NurtureSequence {
        id: new_id(),
        campaign_id: payload.campaign_id,
        lead_magnet_id: payload.lead_magnet_id,
        name: payload.name.unwrap_or_else(|| "Default Sequence".into()),
        created_at: now,
    };
    state.store.insert_sequence(&seq).map_err(internal)?;

    let mut steps = Vec::with_capacity(payload.steps.len());
    for (i, step) in payload.steps.into_iter().enumerate() {
        let step = NurtureStep {
            id: new_id(),
            sequence_id: seq.id.clone(),
            order: (i + 1) as i64,
            subject: step.subject,
            body: step.body,
            offset_days: step.offset_days,
            intent: step.intent,
            created_at: now,
        };
        state.store.insert_step(&step).map_err(internal)?;
        steps.push(step);
    }

    Ok(Json(json!({ "ok": true, "sequence": seq, "steps": steps })))
}
