//! The background dispatcher — a fixed-interval due scan owned by one
//! dedicated tokio task.
//!
//! Single-flight by construction: the loop awaits each pass to completion
//! before ticking again, and missed ticks are skipped rather than burst.
//! tokio's interval fires immediately on the first tick, which doubles as
//! the startup catch-up pass for entries that became due while the
//! process was down.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dripflow_core::DripflowConfig;
use dripflow_store::Store;
use tokio::time::MissedTickBehavior;

use crate::dispatch;

/// Spawn the dispatcher loop as a background tokio task.
pub fn spawn_dispatcher(
    store: Arc<Store>,
    config: Arc<DripflowConfig>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let every = config.dispatch.interval_secs;
        tracing::info!("⏰ Delivery dispatcher started (check every {every}s)");

        let mut interval = tokio::time::interval(Duration::from_secs(every));
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            interval.tick().await;

            match dispatch::process_due(&store, &config, Utc::now()).await {
                Ok(0) => {}
                Ok(n) => tracing::info!("📤 Attempted {n} due email(s)"),
                // Scan-level failure aborts this pass only; the next tick
                // retries the whole scan.
                Err(e) => tracing::warn!("⚠️ Due scan failed: {e}"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use dripflow_core::config::EmailSeedConfig;
    use dripflow_core::types::{DeliveryStatus, EmailLog, Lead, new_id};

    #[tokio::test]
    async fn startup_pass_catches_up_overdue_entries() {
        let path = std::env::temp_dir().join(format!("dripflow-engine-{}.db", new_id()));
        let seed = EmailSeedConfig {
            provider: "mock".into(),
            ..Default::default()
        };
        let store = Arc::new(Store::open(&path, &seed).unwrap());
        let lead = Lead {
            id: new_id(),
            campaign_id: None,
            lead_magnet_id: None,
            landing_page_id: None,
            email: "a@x.com".into(),
            name: None,
            company: None,
            created_at: Utc::now(),
        };
        store.insert_lead(&lead).unwrap();

        // Became due while the process was "down".
        let overdue = EmailLog::direct(&lead.id, "Hi", "Body", Utc::now() - ChronoDuration::hours(2));
        store.insert_email_log(&overdue).unwrap();

        let handle = spawn_dispatcher(store.clone(), Arc::new(DripflowConfig::default()));
        // First tick fires immediately; give it a moment to finish.
        tokio::time::sleep(std::time::Duration::from_millis(300)).await;
        handle.abort();

        let state = store.get_email_log(&overdue.id).unwrap().unwrap();
        assert_eq!(state.status, DeliveryStatus::Sent);
        std::fs::remove_file(&path).ok();
    }
}
