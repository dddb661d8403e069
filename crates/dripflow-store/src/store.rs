//! SQLite store for domain lookups, the delivery queue, and settings.
//!
//! WAL mode, `CREATE TABLE IF NOT EXISTS` migrations, RFC3339 TEXT
//! timestamps. The `claim` / `mark_sent` / `mark_failed` conditional
//! updates are the only code path that moves a queue entry through its
//! state machine: `queued → sending → sent | failed`.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use dripflow_core::config::EmailSeedConfig;
use dripflow_core::error::{DripflowError, Result};
use dripflow_core::types::{
    Campaign, DeliveryStatus, EmailLog, EmailSettings, Lead, LeadMagnet, NurtureSequence,
    NurtureStep,
};
use rusqlite::{Connection, params, params_from_iter};
use serde::Deserialize;

fn db_err(e: rusqlite::Error) -> DripflowError {
    DripflowError::Store(e.to_string())
}

fn ts(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn parse_ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_default()
}

/// Partial update for the settings row. `None` fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsPatch {
    pub provider: Option<String>,
    pub api_key: Option<String>,
    pub from_email: Option<String>,
    pub from_name: Option<String>,
}

/// Durable store — domain lookups, delivery queue, settings.
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Open or create the database, run migrations, seed the settings row.
    pub fn open(path: &Path, seed: &EmailSeedConfig) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).map_err(db_err)?;

        // WAL for better concurrent read behavior
        conn.execute_batch("PRAGMA journal_mode=WAL;").ok();

        let store = Self {
            conn: Mutex::new(conn),
        };
        store.migrate()?;
        store.seed_settings(seed)?;
        Ok(store)
    }

    fn migrate(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS campaigns (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS lead_magnets (
                id TEXT PRIMARY KEY,
                campaign_id TEXT NOT NULL REFERENCES campaigns(id),
                title TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS nurture_sequences (
                id TEXT PRIMARY KEY,
                campaign_id TEXT NOT NULL REFERENCES campaigns(id),
                lead_magnet_id TEXT REFERENCES lead_magnets(id),
                name TEXT NOT NULL DEFAULT 'Default Sequence',
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS nurture_steps (
                id TEXT PRIMARY KEY,
                sequence_id TEXT NOT NULL REFERENCES nurture_sequences(id) ON DELETE CASCADE,
                step_order INTEGER NOT NULL,
                subject TEXT NOT NULL,
                body TEXT NOT NULL,
                offset_days INTEGER NOT NULL DEFAULT 0,
                intent TEXT,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS leads (
                id TEXT PRIMARY KEY,
                campaign_id TEXT,
                lead_magnet_id TEXT,
                landing_page_id TEXT,
                email TEXT NOT NULL,
                name TEXT,
                company TEXT,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS email_logs (
                id TEXT PRIMARY KEY,
                lead_id TEXT NOT NULL,
                sequence_id TEXT,
                step_id TEXT,
                subject TEXT NOT NULL,
                body TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'queued',
                provider_message_id TEXT,
                error_message TEXT,
                scheduled_at TEXT,
                sent_at TEXT,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS app_settings (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                provider TEXT NOT NULL DEFAULT 'none',
                api_key TEXT NOT NULL DEFAULT '',
                from_email TEXT NOT NULL DEFAULT '',
                from_name TEXT NOT NULL DEFAULT '',
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_email_logs_due
                ON email_logs(status, scheduled_at);
            CREATE INDEX IF NOT EXISTS idx_email_logs_lead
                ON email_logs(lead_id);
            CREATE INDEX IF NOT EXISTS idx_sequences_campaign
                ON nurture_sequences(campaign_id);
            CREATE INDEX IF NOT EXISTS idx_sequences_magnet
                ON nurture_sequences(lead_magnet_id);
            CREATE INDEX IF NOT EXISTS idx_steps_sequence
                ON nurture_steps(sequence_id);
            ",
        )
        .map_err(db_err)?;
        Ok(())
    }

    /// Insert the settings row from config seed values if absent.
    fn seed_settings(&self, seed: &EmailSeedConfig) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR IGNORE INTO app_settings (id, provider, api_key, from_email, from_name, updated_at)
             VALUES (1, ?1, ?2, ?3, ?4, ?5)",
            params![seed.provider, seed.api_key, seed.from_email, seed.from_name, ts(&Utc::now())],
        )
        .map_err(db_err)?;
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| DripflowError::Store(format!("Lock poisoned: {e}")))
    }

    // ── Campaigns / lead magnets ─────────────────────────────────────

    pub fn insert_campaign(&self, campaign: &Campaign) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO campaigns (id, name, created_at) VALUES (?1, ?2, ?3)",
            params![campaign.id, campaign.name, ts(&campaign.created_at)],
        )
        .map_err(db_err)?;
        Ok(())
    }

    pub fn get_campaign(&self, id: &str) -> Result<Option<Campaign>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT id, name, created_at FROM campaigns WHERE id = ?1")
            .map_err(db_err)?;
        let found = stmt
            .query_row(params![id], |row| {
                Ok(Campaign {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    created_at: parse_ts(&row.get::<_, String>(2)?),
                })
            })
            .ok();
        Ok(found)
    }

    pub fn insert_lead_magnet(&self, magnet: &LeadMagnet) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO lead_magnets (id, campaign_id, title, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![magnet.id, magnet.campaign_id, magnet.title, ts(&magnet.created_at)],
        )
        .map_err(db_err)?;
        Ok(())
    }

    pub fn get_lead_magnet(&self, id: &str) -> Result<Option<LeadMagnet>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT id, campaign_id, title, created_at FROM lead_magnets WHERE id = ?1")
            .map_err(db_err)?;
        let found = stmt
            .query_row(params![id], |row| {
                Ok(LeadMagnet {
                    id: row.get(0)?,
                    campaign_id: row.get(1)?,
                    title: row.get(2)?,
                    created_at: parse_ts(&row.get::<_, String>(3)?),
                })
            })
            .ok();
        Ok(found)
    }

    // ── Sequences / steps ────────────────────────────────────────────

    pub fn insert_sequence(&self, seq: &NurtureSequence) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO nurture_sequences (id, campaign_id, lead_magnet_id, name, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![seq.id, seq.campaign_id, seq.lead_magnet_id, seq.name, ts(&seq.created_at)],
        )
        .map_err(db_err)?;
        Ok(())
    }

    pub fn insert_step(&self, step: &NurtureStep) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO nurture_steps (id, sequence_id, step_order, subject, body, offset_days, intent, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                step.id,
                step.sequence_id,
                step.order,
                step.subject,
                step.body,
                step.offset_days,
                step.intent,
                ts(&step.created_at)
            ],
        )
        .map_err(db_err)?;
        Ok(())
    }

    fn sequence_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<NurtureSequence> {
        Ok(NurtureSequence {
            id: row.get(0)?,
            campaign_id: row.get(1)?,
            lead_magnet_id: row.get(2)?,
            name: row.get(3)?,
            created_at: parse_ts(&row.get::<_, String>(4)?),
        })
    }

    /// Sequence scoped to this exact lead magnet, if any.
    pub fn sequence_for_lead_magnet(&self, lead_magnet_id: &str) -> Result<Option<NurtureSequence>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, campaign_id, lead_magnet_id, name, created_at
                 FROM nurture_sequences WHERE lead_magnet_id = ?1
                 ORDER BY created_at LIMIT 1",
            )
            .map_err(db_err)?;
        Ok(stmt.query_row(params![lead_magnet_id], Self::sequence_row).ok())
    }

    /// Campaign-wide sequence (lead-magnet-agnostic lookup), if any.
    pub fn sequence_for_campaign(&self, campaign_id: &str) -> Result<Option<NurtureSequence>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, campaign_id, lead_magnet_id, name, created_at
                 FROM nurture_sequences WHERE campaign_id = ?1
                 ORDER BY created_at LIMIT 1",
            )
            .map_err(db_err)?;
        Ok(stmt.query_row(params![campaign_id], Self::sequence_row).ok())
    }

    pub fn steps_for_sequence(&self, sequence_id: &str) -> Result<Vec<NurtureStep>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, sequence_id, step_order, subject, body, offset_days, intent, created_at
                 FROM nurture_steps WHERE sequence_id = ?1 ORDER BY step_order",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![sequence_id], |row| {
                Ok(NurtureStep {
                    id: row.get(0)?,
                    sequence_id: row.get(1)?,
                    order: row.get(2)?,
                    subject: row.get(3)?,
                    body: row.get(4)?,
                    offset_days: row.get(5)?,
                    intent: row.get(6)?,
                    created_at: parse_ts(&row.get::<_, String>(7)?),
                })
            })
            .map_err(db_err)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    // ── Leads ────────────────────────────────────────────────────────

    pub fn insert_lead(&self, lead: &Lead) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO leads (id, campaign_id, lead_magnet_id, landing_page_id, email, name, company, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                lead.id,
                lead.campaign_id,
                lead.lead_magnet_id,
                lead.landing_page_id,
                lead.email,
                lead.name,
                lead.company,
                ts(&lead.created_at)
            ],
        )
        .map_err(db_err)?;
        Ok(())
    }

    pub fn get_lead(&self, id: &str) -> Result<Option<Lead>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, campaign_id, lead_magnet_id, landing_page_id, email, name, company, created_at
                 FROM leads WHERE id = ?1",
            )
            .map_err(db_err)?;
        let found = stmt
            .query_row(params![id], |row| {
                Ok(Lead {
                    id: row.get(0)?,
                    campaign_id: row.get(1)?,
                    lead_magnet_id: row.get(2)?,
                    landing_page_id: row.get(3)?,
                    email: row.get(4)?,
                    name: row.get(5)?,
                    company: row.get(6)?,
                    created_at: parse_ts(&row.get::<_, String>(7)?),
                })
            })
            .ok();
        Ok(found)
    }

    // ── Delivery queue ───────────────────────────────────────────────

    fn email_log_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<EmailLog> {
        Ok(EmailLog {
            id: row.get(0)?,
            lead_id: row.get(1)?,
            sequence_id: row.get(2)?,
            step_id: row.get(3)?,
            subject: row.get(4)?,
            body: row.get(5)?,
            status: DeliveryStatus::parse(&row.get::<_, String>(6)?)
                .unwrap_or(DeliveryStatus::Failed),
            provider_message_id: row.get(7)?,
            error_message: row.get(8)?,
            scheduled_at: row.get::<_, Option<String>>(9)?.map(|s| parse_ts(&s)),
            sent_at: row.get::<_, Option<String>>(10)?.map(|s| parse_ts(&s)),
            created_at: parse_ts(&row.get::<_, String>(11)?),
        })
    }

    const LOG_COLUMNS: &'static str = "id, lead_id, sequence_id, step_id, subject, body, status, \
                                       provider_message_id, error_message, scheduled_at, sent_at, created_at";

    fn insert_log_stmt(conn: &Connection, log: &EmailLog) -> rusqlite::Result<usize> {
        conn.execute(
            "INSERT INTO email_logs (id, lead_id, sequence_id, step_id, subject, body, status,
                                     provider_message_id, error_message, scheduled_at, sent_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                log.id,
                log.lead_id,
                log.sequence_id,
                log.step_id,
                log.subject,
                log.body,
                log.status.as_str(),
                log.provider_message_id,
                log.error_message,
                log.scheduled_at.as_ref().map(ts),
                log.sent_at.as_ref().map(ts),
                ts(&log.created_at)
            ],
        )
    }

    pub fn insert_email_log(&self, log: &EmailLog) -> Result<()> {
        let conn = self.lock()?;
        Self::insert_log_stmt(&conn, log).map_err(db_err)?;
        Ok(())
    }

    /// Insert all entries of one enrollment in a single transaction —
    /// all steps of the resolved sequence land, or none do.
    pub fn insert_email_logs(&self, logs: &[EmailLog]) -> Result<()> {
        if logs.is_empty() {
            return Ok(());
        }
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(db_err)?;
        for log in logs {
            Self::insert_log_stmt(&tx, log).map_err(db_err)?;
        }
        tx.commit().map_err(db_err)?;
        Ok(())
    }

    pub fn get_email_log(&self, id: &str) -> Result<Option<EmailLog>> {
        let conn = self.lock()?;
        let sql = format!("SELECT {} FROM email_logs WHERE id = ?1", Self::LOG_COLUMNS);
        let mut stmt = conn.prepare(&sql).map_err(db_err)?;
        Ok(stmt.query_row(params![id], Self::email_log_row).ok())
    }

    /// Due entries: still `queued`, `scheduled_at <= now`, oldest-due first.
    pub fn list_due(&self, now: DateTime<Utc>, limit: u32) -> Result<Vec<EmailLog>> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {} FROM email_logs
             WHERE status = 'queued' AND scheduled_at IS NOT NULL AND scheduled_at <= ?1
             ORDER BY scheduled_at ASC LIMIT ?2",
            Self::LOG_COLUMNS
        );
        let mut stmt = conn.prepare(&sql).map_err(db_err)?;
        let rows = stmt
            .query_map(params![ts(&now), limit], Self::email_log_row)
            .map_err(db_err)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    /// Operator-facing log listing. A campaign filter is resolved through
    /// that campaign's sequence ids; a campaign with no sequences has no
    /// logs to show.
    pub fn list_logs(
        &self,
        lead_id: Option<&str>,
        campaign_id: Option<&str>,
        limit: u32,
    ) -> Result<Vec<EmailLog>> {
        let mut conditions: Vec<String> = Vec::new();
        let mut values: Vec<rusqlite::types::Value> = Vec::new();

        if let Some(campaign_id) = campaign_id {
            let seq_ids = self.sequence_ids_for_campaign(campaign_id)?;
            if seq_ids.is_empty() {
                return Ok(Vec::new());
            }
            let placeholders: Vec<String> = (0..seq_ids.len())
                .map(|i| format!("?{}", values.len() + i + 1))
                .collect();
            conditions.push(format!("sequence_id IN ({})", placeholders.join(", ")));
            values.extend(seq_ids.into_iter().map(rusqlite::types::Value::from));
        }
        if let Some(lead_id) = lead_id {
            conditions.push(format!("lead_id = ?{}", values.len() + 1));
            values.push(lead_id.to_string().into());
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };
        let sql = format!(
            "SELECT {} FROM email_logs {} ORDER BY created_at DESC LIMIT ?{}",
            Self::LOG_COLUMNS,
            where_clause,
            values.len() + 1
        );
        values.push((limit as i64).into());

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql).map_err(db_err)?;
        let rows = stmt
            .query_map(params_from_iter(values), Self::email_log_row)
            .map_err(db_err)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    fn sequence_ids_for_campaign(&self, campaign_id: &str) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT id FROM nurture_sequences WHERE campaign_id = ?1")
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![campaign_id], |row| row.get::<_, String>(0))
            .map_err(db_err)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    // ── State machine ────────────────────────────────────────────────

    /// Atomically claim a queued entry for dispatch (`queued → sending`).
    /// Returns false when another path already claimed it — the caller
    /// treats that as a silent no-op, never an error.
    pub fn claim(&self, id: &str) -> Result<bool> {
        let conn = self.lock()?;
        let changed = conn
            .execute(
                "UPDATE email_logs SET status = 'sending' WHERE id = ?1 AND status = 'queued'",
                params![id],
            )
            .map_err(db_err)?;
        Ok(changed == 1)
    }

    /// `sending → sent`: provider reported success.
    pub fn mark_sent(
        &self,
        id: &str,
        provider_message_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE email_logs
             SET status = 'sent', sent_at = ?2, provider_message_id = ?3, error_message = NULL
             WHERE id = ?1 AND status IN ('queued', 'sending')",
            params![id, ts(&now), provider_message_id],
        )
        .map_err(db_err)?;
        Ok(())
    }

    /// `sending → failed`: hard failure, recorded with a human-readable
    /// cause. No automatic retry — operators requeue manually if desired.
    pub fn mark_failed(&self, id: &str, error: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE email_logs
             SET status = 'failed', error_message = ?2, sent_at = NULL, provider_message_id = NULL
             WHERE id = ?1 AND status IN ('queued', 'sending')",
            params![id, error],
        )
        .map_err(db_err)?;
        Ok(())
    }

    // ── Settings ─────────────────────────────────────────────────────

    /// Latest delivery settings. Read at dispatch time, never cached,
    /// so rotated credentials take effect on the next tick.
    pub fn get_settings(&self) -> Result<EmailSettings> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT provider, api_key, from_email, from_name FROM app_settings WHERE id = 1")
            .map_err(db_err)?;
        let found = stmt
            .query_row([], |row| {
                Ok(EmailSettings {
                    provider: row.get(0)?,
                    api_key: row.get(1)?,
                    from_email: row.get(2)?,
                    from_name: row.get(3)?,
                })
            })
            .ok();
        Ok(found.unwrap_or_default())
    }

    pub fn update_settings(&self, patch: &SettingsPatch) -> Result<EmailSettings> {
        let mut current = self.get_settings()?;
        if let Some(provider) = &patch.provider {
            current.provider = provider.clone();
        }
        if let Some(api_key) = &patch.api_key {
            current.api_key = api_key.clone();
        }
        if let Some(from_email) = &patch.from_email {
            current.from_email = from_email.clone();
        }
        if let Some(from_name) = &patch.from_name {
            current.from_name = from_name.clone();
        }

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO app_settings (id, provider, api_key, from_email, from_name, updated_at)
             VALUES (1, ?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
                 provider = excluded.provider,
                 api_key = excluded.api_key,
                 from_email = excluded.from_email,
                 from_name = excluded.from_name,
                 updated_at = excluded.updated_at",
            params![
                current.provider,
                current.api_key,
                current.from_email,
                current.from_name,
                ts(&Utc::now())
            ],
        )
        .map_err(db_err)?;
        Ok(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use dripflow_core::types::new_id;

    fn temp_store(tag: &str) -> (Store, std::path::PathBuf) {
        let path = std::env::temp_dir().join(format!("dripflow-test-{tag}-{}.db", new_id()));
        let store = Store::open(&path, &EmailSeedConfig::default()).unwrap();
        (store, path)
    }

    fn make_lead(store: &Store, campaign_id: Option<&str>, magnet_id: Option<&str>) -> Lead {
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
    fn due_listing_excludes_future_and_non_queued() {
        let (store, path) = temp_store("due");
        let now = Utc::now();
        let lead = make_lead(&store, None, None);

        let due = EmailLog::direct(&lead.id, "Hi", "Body", now - Duration::minutes(1));
        let future = EmailLog::direct(&lead.id, "Later", "Body", now + Duration::days(1));
        store.insert_email_log(&due).unwrap();
        store.insert_email_log(&future).unwrap();

        let listed = store.list_due(now, 100).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, due.id);

        // Once the entry leaves `queued` it disappears from the due-set,
        // so a second scan never re-sends it.
        store.mark_sent(&due.id, Some("msg-1"), now).unwrap();
        assert!(store.list_due(now, 100).unwrap().is_empty());

        let reloaded = store.get_email_log(&due.id).unwrap().unwrap();
        assert_eq!(reloaded.status, DeliveryStatus::Sent);
        assert_eq!(reloaded.provider_message_id.as_deref(), Some("msg-1"));
        assert!(reloaded.sent_at.is_some());
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn due_listing_orders_oldest_first() {
        let (store, path) = temp_store("order");
        let now = Utc::now();
        let lead = make_lead(&store, None, None);
        let newer = EmailLog::direct(&lead.id, "B", "b", now - Duration::minutes(1));
        let older = EmailLog::direct(&lead.id, "A", "a", now - Duration::minutes(10));
        store.insert_email_log(&newer).unwrap();
        store.insert_email_log(&older).unwrap();

        let listed = store.list_due(now, 100).unwrap();
        assert_eq!(listed[0].id, older.id);
        assert_eq!(listed[1].id, newer.id);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn claim_is_won_exactly_once() {
        let (store, path) = temp_store("claim");
        let now = Utc::now();
        let lead = make_lead(&store, None, None);
        let log = EmailLog::direct(&lead.id, "Hi", "Body", now);
        store.insert_email_log(&log).unwrap();

        assert!(store.claim(&log.id).unwrap());
        assert!(!store.claim(&log.id).unwrap());

        store.mark_failed(&log.id, "boom").unwrap();
        let reloaded = store.get_email_log(&log.id).unwrap().unwrap();
        assert_eq!(reloaded.status, DeliveryStatus::Failed);
        assert_eq!(reloaded.error_message.as_deref(), Some("boom"));
        assert!(reloaded.sent_at.is_none());
        assert!(reloaded.provider_message_id.is_none());

        // Terminal states are one-directional — no further claims.
        assert!(!store.claim(&log.id).unwrap());
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn campaign_filter_resolves_through_sequences() {
        let (store, path) = temp_store("filter");
        let now = Utc::now();
        let campaign = Campaign {
            id: new_id(),
            name: "Launch".into(),
            created_at: now,
        };
        store.insert_campaign(&campaign).unwrap();
        let seq = NurtureSequence {
            id: new_id(),
            campaign_id: campaign.id.clone(),
            lead_magnet_id: None,
            name: "Default Sequence".into(),
            created_at: now,
        };
        store.insert_sequence(&seq).unwrap();
        let lead = make_lead(&store, Some(&campaign.id), None);

        let mut log = EmailLog::direct(&lead.id, "Hi", "Body", now);
        log.sequence_id = Some(seq.id.clone());
        store.insert_email_log(&log).unwrap();
        // Unrelated direct log without a sequence reference
        store
            .insert_email_log(&EmailLog::direct(&lead.id, "Welcome", "Thanks", now))
            .unwrap();

        let by_campaign = store.list_logs(None, Some(&campaign.id), 200).unwrap();
        assert_eq!(by_campaign.len(), 1);
        assert_eq!(by_campaign[0].id, log.id);

        // Campaign with no sequences has no logs to show
        let other = store.list_logs(None, Some("missing-campaign"), 200).unwrap();
        assert!(other.is_empty());

        let by_lead = store.list_logs(Some(&lead.id), None, 200).unwrap();
        assert_eq!(by_lead.len(), 2);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn settings_seed_and_partial_update() {
        let (store, path) = temp_store("settings");
        let settings = store.get_settings().unwrap();
        assert_eq!(settings.provider, "none");
        assert_eq!(settings.from_name, "Dripflow");

        let updated = store
            .update_settings(&SettingsPatch {
                provider: Some("sendgrid".into()),
                api_key: Some("sg-key".into()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(updated.provider, "sendgrid");
        assert_eq!(updated.api_key, "sg-key");
        // Untouched fields survive the patch
        assert_eq!(updated.from_name, "Dripflow");

        let reloaded = store.get_settings().unwrap();
        assert_eq!(reloaded.provider, "sendgrid");
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn batch_insert_is_atomic() {
        let (store, path) = temp_store("batch");
        let now = Utc::now();
        let lead = make_lead(&store, None, None);
        let a = EmailLog::queued(&lead.id, "seq", "st1", "One", "b", now);
        let mut b = EmailLog::queued(&lead.id, "seq", "st2", "Two", "b", now);
        b.id = a.id.clone(); // primary key collision forces a rollback

        assert!(store.insert_email_logs(&[a, b]).is_err());
        assert!(store.list_logs(Some(&lead.id), None, 200).unwrap().is_empty());
        std::fs::remove_file(&path).ok();
    }
}
