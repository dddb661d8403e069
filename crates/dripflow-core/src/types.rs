//! Domain types for the nurture-sequence delivery engine.
//!
//! `EmailLog` is the durable queue item: one scheduled attempt to deliver
//! one step to one lead. Subject and body are snapshots taken at enqueue
//! time, so later edits to a step template never change already-queued sends.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Generate a fresh string id (UUID v4, stored as TEXT).
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Campaign — read-only lookup subset used for template context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Lead magnet — the asset a lead opted in for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeadMagnet {
    pub id: String,
    pub campaign_id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

/// A named drip sequence, owned by a campaign and optionally scoped to
/// one lead magnet. Magnet-scoped sequences win over campaign-wide ones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NurtureSequence {
    pub id: String,
    pub campaign_id: String,
    pub lead_magnet_id: Option<String>,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// One message template within a sequence. Authored once, reused for
/// every enrolled lead, never mutated by the delivery engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NurtureStep {
    pub id: String,
    pub sequence_id: String,
    /// 1-based, unique within a sequence. Intended send order — not a
    /// scheduling field, `offset_days` is.
    pub order: i64,
    pub subject: String,
    pub body: String,
    /// Days after enrollment before this step fires. Non-negative.
    pub offset_days: i64,
    pub intent: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A person who opted in via a landing page or the API.
/// Immutable from the delivery engine's perspective.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lead {
    pub id: String,
    pub campaign_id: Option<String>,
    pub lead_magnet_id: Option<String>,
    pub landing_page_id: Option<String>,
    pub email: String,
    pub name: Option<String>,
    pub company: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Delivery state of a queue entry.
///
/// Transitions are monotonic and one-directional:
/// `Queued → Sending → Sent | Failed`. `Sending` is the transient
/// in-flight claim marker — the conditional update from `Queued` that
/// prevents the poller and the immediate-dispatch path from double-sending
/// the same row. There is no path back to `Queued` and no automatic retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Queued,
    Sending,
    Sent,
    Failed,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Queued => "queued",
            DeliveryStatus::Sending => "sending",
            DeliveryStatus::Sent => "sent",
            DeliveryStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(DeliveryStatus::Queued),
            "sending" => Some(DeliveryStatus::Sending),
            "sent" => Some(DeliveryStatus::Sent),
            "failed" => Some(DeliveryStatus::Failed),
            _ => None,
        }
    }
}

/// Durable queue entry — one scheduled attempt to deliver one step to one lead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailLog {
    pub id: String,
    pub lead_id: String,
    /// None for directly-logged messages (e.g. a welcome notice).
    pub sequence_id: Option<String>,
    pub step_id: Option<String>,
    pub subject: String,
    pub body: String,
    pub status: DeliveryStatus,
    pub provider_message_id: Option<String>,
    pub error_message: Option<String>,
    /// Earliest timestamp at which dispatch is permitted.
    /// None means "log only, not a live delivery".
    pub scheduled_at: Option<DateTime<Utc>>,
    /// Set only on transition to `Sent`.
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl EmailLog {
    /// New queued entry for one step of a sequence.
    pub fn queued(
        lead_id: &str,
        sequence_id: &str,
        step_id: &str,
        subject: &str,
        body: &str,
        scheduled_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: new_id(),
            lead_id: lead_id.to_string(),
            sequence_id: Some(sequence_id.to_string()),
            step_id: Some(step_id.to_string()),
            subject: subject.to_string(),
            body: body.to_string(),
            status: DeliveryStatus::Queued,
            provider_message_id: None,
            error_message: None,
            scheduled_at: Some(scheduled_at),
            sent_at: None,
            created_at: Utc::now(),
        }
    }

    /// New directly-logged entry with no sequence/step reference,
    /// scheduled for immediate dispatch.
    pub fn direct(lead_id: &str, subject: &str, body: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: new_id(),
            lead_id: lead_id.to_string(),
            sequence_id: None,
            step_id: None,
            subject: subject.to_string(),
            body: body.to_string(),
            status: DeliveryStatus::Queued,
            provider_message_id: None,
            error_message: None,
            scheduled_at: Some(now),
            sent_at: None,
            created_at: now,
        }
    }
}

/// Rotatable email delivery settings, supplied by the settings store at
/// dispatch time. Never cached across poller ticks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailSettings {
    pub provider: String,
    pub api_key: String,
    pub from_email: String,
    pub from_name: String,
}

impl Default for EmailSettings {
    fn default() -> Self {
        Self {
            provider: "none".into(),
            api_key: String::new(),
            from_email: "no-reply@dripflow.io".into(),
            from_name: "Dripflow".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_str() {
        for s in [
            DeliveryStatus::Queued,
            DeliveryStatus::Sending,
            DeliveryStatus::Sent,
            DeliveryStatus::Failed,
        ] {
            assert_eq!(DeliveryStatus::parse(s.as_str()), Some(s));
        }
        assert_eq!(DeliveryStatus::parse("bounced"), None);
    }

    #[test]
    fn queued_entry_snapshots_content() {
        let log = EmailLog::queued("l1", "s1", "st1", "Hi", "Body", Utc::now());
        assert_eq!(log.status, DeliveryStatus::Queued);
        assert_eq!(log.subject, "Hi");
        assert!(log.sent_at.is_none());
        assert!(log.provider_message_id.is_none());
    }
}
