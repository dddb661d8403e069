//! Enrollment — resolving which sequence a lead receives and turning its
//! steps into concrete queue entries.

use chrono::{DateTime, Duration, Utc};
use dripflow_core::error::Result;
use dripflow_core::types::{EmailLog, Lead, NurtureSequence};
use dripflow_store::Store;

/// Buffer added to every step with `offset_days > 0`. The poller runs on
/// a fixed interval, so a step landing exactly on the enrollment instant
/// could collide with the same-tick immediate send on interval-boundary
/// rounding; the buffer keeps delayed steps strictly after it. Zero-offset
/// steps get no buffer so they stay eligible for near-immediate dispatch.
const DAY_ZERO_BUFFER_MINUTES: i64 = 5;

/// Compute a step's send timestamp from the enrollment instant.
pub fn compute_scheduled_at(now: DateTime<Utc>, offset_days: i64) -> DateTime<Utc> {
    let mut scheduled = now + Duration::days(offset_days);
    if offset_days > 0 {
        scheduled += Duration::minutes(DAY_ZERO_BUFFER_MINUTES);
    }
    scheduled
}

/// Find the one sequence that applies to a lead, or none.
///
/// Lead-magnet-level targeting is more specific and wins over a
/// campaign-wide default, so an operator can configure a generic campaign
/// sequence with per-magnet overrides. No match is a legitimate empty
/// result, not an error.
pub fn resolve_sequence(store: &Store, lead: &Lead) -> Result<Option<NurtureSequence>> {
    if let Some(magnet_id) = &lead.lead_magnet_id
        && let Some(seq) = store.sequence_for_lead_magnet(magnet_id)?
    {
        return Ok(Some(seq));
    }
    if let Some(campaign_id) = &lead.campaign_id
        && let Some(seq) = store.sequence_for_campaign(campaign_id)?
    {
        return Ok(Some(seq));
    }
    Ok(None)
}

/// Enroll a lead: one queued entry per step of the resolved sequence,
/// persisted atomically, with subject/body snapshotted from the step.
/// Returns the empty vec (and persists nothing) when no sequence applies.
pub fn enqueue_sequence_for_lead(
    store: &Store,
    lead: &Lead,
    now: DateTime<Utc>,
) -> Result<Vec<EmailLog>> {
    let Some(seq) = resolve_sequence(store, lead)? else {
        return Ok(Vec::new());
    };

    let steps = store.steps_for_sequence(&seq.id)?;
    let logs: Vec<EmailLog> = steps
        .iter()
        .map(|step| {
            EmailLog::queued(
                &lead.id,
                &seq.id,
                &step.id,
                &step.subject,
                &step.body,
                compute_scheduled_at(now, step.offset_days),
            )
        })
        .collect();

    store.insert_email_logs(&logs)?;
    tracing::info!(
        "📅 Enrolled lead {} in sequence '{}' ({} step(s))",
        lead.id,
        seq.name,
        logs.len()
    );
    Ok(logs)
}

/// Pick the entry to hand to the immediate-dispatch path: the earliest
/// one scheduled within the near-term window after enrollment.
pub fn pick_immediate<'a>(
    entries: &'a [EmailLog],
    now: DateTime<Utc>,
    window_secs: i64,
) -> Option<&'a EmailLog> {
    let cutoff = now + Duration::seconds(window_secs);
    entries
        .iter()
        .filter(|e| e.scheduled_at.is_some_and(|at| at <= cutoff))
        .min_by_key(|e| e.scheduled_at)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use dripflow_core::config::EmailSeedConfig;
    use dripflow_core::types::{Campaign, DeliveryStatus, LeadMagnet, NurtureStep, new_id};

    fn temp_store(tag: &str) -> (Store, std::path::PathBuf) {
        let path = std::env::temp_dir().join(format!("dripflow-enroll-{tag}-{}.db", new_id()));
        let store = Store::open(&path, &EmailSeedConfig::default()).unwrap();
        (store, path)
    }

    fn seed_campaign(store: &Store) -> Campaign {
        let campaign = Campaign {
            id: new_id(),
            name: "Launch".into(),
            created_at: Utc::now(),
        };
        store.insert_campaign(&campaign).unwrap();
        campaign
    }

    fn seed_sequence(
        store: &Store,
        campaign_id: &str,
        magnet_id: Option<&str>,
        name: &str,
        offsets: &[i64],
    ) -> NurtureSequence {
        let seq = NurtureSequence {
            id: new_id(),
            campaign_id: campaign_id.to_string(),
            lead_magnet_id: magnet_id.map(String::from),
            name: name.into(),
            created_at: Utc::now(),
        };
        store.insert_sequence(&seq).unwrap();
        for (i, offset) in offsets.iter().enumerate() {
            store
                .insert_step(&NurtureStep {
                    id: new_id(),
                    sequence_id: seq.id.clone(),
                    order: (i + 1) as i64,
                    subject: format!("Step {}", i + 1),
                    body: "Hello {{name}}".into(),
                    offset_days: *offset,
                    intent: None,
                    created_at: Utc::now(),
                })
                .unwrap();
        }
        seq
    }

    fn seed_lead(store: &Store, campaign_id: Option<&str>, magnet_id: Option<&str>) -> Lead {
        let lead = Lead {
            id: new_id(),
            campaign_id: campaign_id.map(String::from),
            lead_magnet_id: magnet_id.map(String::from),
            landing_page_id: None,
            email: "a@x.com".into(),
            name: None,
            company: None,
            created_at: Utc::now(),
        };
        store.insert_lead(&lead).unwrap();
        lead
    }

    #[test]
    fn buffer_applies_only_to_delayed_steps() {
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(compute_scheduled_at(t, 0), t);
        assert_eq!(
            compute_scheduled_at(t, 3),
            t + Duration::days(3) + Duration::minutes(5)
        );
        assert_eq!(
            compute_scheduled_at(t, 7),
            t + Duration::days(7) + Duration::minutes(5)
        );
    }

    #[test]
    fn magnet_scoped_sequence_wins_over_campaign_default() {
        let (store, path) = temp_store("precedence");
        let campaign = seed_campaign(&store);
        let magnet = LeadMagnet {
            id: new_id(),
            campaign_id: campaign.id.clone(),
            title: "Checklist".into(),
            created_at: Utc::now(),
        };
        store.insert_lead_magnet(&magnet).unwrap();

        seed_sequence(&store, &campaign.id, None, "Campaign Default", &[0]);
        let scoped = seed_sequence(&store, &campaign.id, Some(&magnet.id), "Magnet Override", &[0]);

        let lead = seed_lead(&store, Some(&campaign.id), Some(&magnet.id));
        let resolved = resolve_sequence(&store, &lead).unwrap().unwrap();
        assert_eq!(resolved.id, scoped.id);

        // Without a magnet, the campaign default applies.
        let plain = seed_lead(&store, Some(&campaign.id), None);
        let resolved = resolve_sequence(&store, &plain).unwrap().unwrap();
        assert_eq!(resolved.name, "Campaign Default");
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn no_matching_sequence_enqueues_nothing() {
        let (store, path) = temp_store("noop");
        let lead = seed_lead(&store, None, None);
        let logs = enqueue_sequence_for_lead(&store, &lead, Utc::now()).unwrap();
        assert!(logs.is_empty());
        assert!(store.list_logs(Some(&lead.id), None, 200).unwrap().is_empty());
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn two_step_enrollment_scenario() {
        // Lead with no name, 2-step sequence (offset 0 and 2), enrolled at
        // 2024-01-01T00:00:00Z → entries at T and T+2d+5min.
        let (store, path) = temp_store("scenario");
        let campaign = seed_campaign(&store);
        let seq = seed_sequence(&store, &campaign.id, None, "Drip", &[0, 2]);
        let lead = seed_lead(&store, Some(&campaign.id), None);

        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let logs = enqueue_sequence_for_lead(&store, &lead, t).unwrap();
        assert_eq!(logs.len(), 2);
        assert!(logs.iter().all(|l| l.status == DeliveryStatus::Queued));
        assert!(logs.iter().all(|l| l.sequence_id.as_deref() == Some(seq.id.as_str())));

        let mut scheduled: Vec<_> = logs.iter().filter_map(|l| l.scheduled_at).collect();
        scheduled.sort();
        assert_eq!(scheduled[0], t);
        assert_eq!(scheduled[1], Utc.with_ymd_and_hms(2024, 1, 3, 0, 5, 0).unwrap());

        // Entries are durable, not just returned.
        let persisted = store.list_logs(Some(&lead.id), None, 200).unwrap();
        assert_eq!(persisted.len(), 2);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn immediate_pick_prefers_earliest_within_window() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let soon = EmailLog::queued("l", "s", "st1", "A", "a", now);
        let later = EmailLog::queued("l", "s", "st2", "B", "b", now + Duration::seconds(30));
        let distant = EmailLog::queued("l", "s", "st3", "C", "c", now + Duration::days(2));

        let entries = vec![distant.clone(), later.clone(), soon.clone()];
        let picked = pick_immediate(&entries, now, 60).unwrap();
        assert_eq!(picked.id, soon.id);

        // Nothing near-term → no immediate dispatch.
        assert!(pick_immediate(&[distant], now, 60).is_none());
    }
}
