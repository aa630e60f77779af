// src/storage/store.rs — SQLite operations

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

/// Format a timestamp the way every table stores it (fixed width, sortable as text).
pub fn ts(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn now_ts() -> String {
    ts(Utc::now())
}

/// Parse a stored timestamp; malformed values sort as the epoch.
pub fn parse_ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_default()
}

/// Task metadata key holding the resolved external reference.
pub const TASK_REFERENCE_KEY: &str = "reference";

/// Low-level SQLite operations for all data types.
pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    // -- Tenants --

    pub fn insert_tenant(
        &self,
        code: &str,
        name: Option<&str>,
        status: &str,
    ) -> anyhow::Result<()> {
        self.conn.execute(
            "INSERT INTO tenants (code, name, status, created_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(code) DO UPDATE SET name = excluded.name, status = excluded.status",
            params![code, name, status, now_ts()],
        )?;
        Ok(())
    }

    pub fn list_active_tenants(&self) -> anyhow::Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT code FROM tenants WHERE status = 'active' ORDER BY code")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    // -- Sessions --

    pub fn insert_session(
        &self,
        id: &str,
        tenant_id: &str,
        user_id: &str,
        channel: &str,
    ) -> anyhow::Result<()> {
        let now = now_ts();
        self.conn.execute(
            "INSERT INTO sessions (id, tenant_id, user_id, channel, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![id, tenant_id, user_id, channel, now],
        )?;
        Ok(())
    }

    pub fn load_session_state(&self, id: &str) -> anyhow::Result<Option<String>> {
        let state: Option<Option<String>> = self
            .conn
            .query_row(
                "SELECT state FROM sessions WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(state.flatten())
    }

    pub fn save_session_state(&self, id: &str, state: &str) -> anyhow::Result<bool> {
        let changed = self.conn.execute(
            "UPDATE sessions SET state = ?1, updated_at = ?2 WHERE id = ?3",
            params![state, now_ts(), id],
        )?;
        Ok(changed > 0)
    }

    // -- Tasks --

    pub fn insert_task(&self, task: &NewTask) -> anyhow::Result<()> {
        let now = now_ts();
        self.conn.execute(
            "INSERT INTO tasks (id, session_id, tenant_id, task_type, status, label, title,
             metadata, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
            params![
                task.id,
                task.session_id,
                task.tenant_id,
                task.task_type,
                task.status,
                task.label,
                task.title,
                task.metadata.as_deref().unwrap_or("{}"),
                now
            ],
        )?;
        Ok(())
    }

    pub fn update_task_status(&self, id: &str, status: &str) -> anyhow::Result<bool> {
        let changed = self.conn.execute(
            "UPDATE tasks SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![status, now_ts(), id],
        )?;
        Ok(changed > 0)
    }

    /// Set one key of the task's metadata bag (e.g. the resolved external reference).
    pub fn set_task_metadata(&self, id: &str, key: &str, value: &str) -> anyhow::Result<bool> {
        let path = format!("$.{key}");
        let changed = self.conn.execute(
            "UPDATE tasks SET metadata = json_set(metadata, ?1, ?2), updated_at = ?3
             WHERE id = ?4",
            params![path, value, now_ts(), id],
        )?;
        Ok(changed > 0)
    }

    /// Tasks of one session, newest first.
    pub fn list_session_tasks(
        &self,
        session_id: &str,
        tenant_id: &str,
        task_type: Option<&str>,
        limit: u32,
    ) -> anyhow::Result<Vec<TaskRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, session_id, tenant_id, task_type, status, label, title, metadata,
             created_at, updated_at
             FROM tasks
             WHERE session_id = ?1 AND tenant_id = ?2 AND (?3 IS NULL OR task_type = ?3)
             ORDER BY created_at DESC
             LIMIT ?4",
        )?;
        let rows = stmt.query_map(params![session_id, tenant_id, task_type, limit], |row| {
            Ok(TaskRow {
                id: row.get(0)?,
                session_id: row.get(1)?,
                tenant_id: row.get(2)?,
                task_type: row.get(3)?,
                status: row.get(4)?,
                label: row.get(5)?,
                title: row.get(6)?,
                metadata: row.get(7)?,
                created_at: row.get(8)?,
                updated_at: row.get(9)?,
            })
        })?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    // -- Historical transactions --

    pub fn insert_transaction(&self, record: &TransactionRecord) -> anyhow::Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO transactions (id, tenant_id, document_no, partner_name, summary,
             posting_date, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                record.id,
                record.tenant_id,
                record.document_no,
                record.partner_name,
                record.summary,
                record.posting_date,
                record.status,
                ts(record.created_at)
            ],
        )?;
        for (i, line) in record.lines.iter().enumerate() {
            tx.execute(
                "INSERT INTO transaction_lines (transaction_id, line_no, side, action_code,
                 action_name, amount, memo)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    record.id,
                    i as i64 + 1,
                    line.side,
                    line.action_code,
                    line.action_name,
                    line.amount,
                    line.memo
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Actions used on completed transactions whose summary or any line memo
    /// contains the vendor name, most used first.
    pub fn query_vendor_action_usage(
        &self,
        tenant_id: &str,
        vendor: &str,
        limit: u32,
    ) -> anyhow::Result<Vec<ActionUsageRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT l.action_code, l.action_name, l.side, COUNT(*) AS usage_count,
                    MAX(t.created_at) AS last_used
             FROM transactions t
             JOIN transaction_lines l ON l.transaction_id = t.id
             WHERE t.tenant_id = ?1
               AND t.status = 'completed'
               AND (
                 instr(lower(COALESCE(t.summary, '')), lower(?2)) > 0
                 OR EXISTS (
                   SELECT 1 FROM transaction_lines l2
                   WHERE l2.transaction_id = t.id
                     AND instr(lower(COALESCE(l2.memo, '')), lower(?2)) > 0
                 )
               )
             GROUP BY l.action_code, l.action_name, l.side
             ORDER BY usage_count DESC, last_used DESC
             LIMIT ?3",
        )?;
        let rows = stmt.query_map(params![tenant_id, vendor, limit], |row| {
            Ok(ActionUsageRow {
                action_code: row.get(0)?,
                action_name: row.get(1)?,
                side: row.get(2)?,
                usage_count: row.get(3)?,
                last_used: row.get(4)?,
            })
        })?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    /// Most recent transactions having a line whose absolute amount is within [lower, upper].
    pub fn query_similar_transactions(
        &self,
        tenant_id: &str,
        lower: f64,
        upper: f64,
        limit: u32,
    ) -> anyhow::Result<Vec<SimilarTransactionRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT t.document_no, t.summary,
                    COALESCE((SELECT SUM(ABS(l.amount)) FROM transaction_lines l
                              WHERE l.transaction_id = t.id AND l.side = 'DR'), 0) AS total,
                    t.posting_date,
                    (SELECT l.action_code FROM transaction_lines l
                     WHERE l.transaction_id = t.id AND l.side = 'DR' ORDER BY l.line_no LIMIT 1),
                    (SELECT l.action_code FROM transaction_lines l
                     WHERE l.transaction_id = t.id AND l.side = 'CR' ORDER BY l.line_no LIMIT 1)
             FROM transactions t
             WHERE t.tenant_id = ?1
               AND EXISTS (
                 SELECT 1 FROM transaction_lines l
                 WHERE l.transaction_id = t.id AND ABS(l.amount) BETWEEN ?2 AND ?3
               )
             ORDER BY t.created_at DESC
             LIMIT ?4",
        )?;
        let rows = stmt.query_map(params![tenant_id, lower, upper, limit], |row| {
            Ok(SimilarTransactionRow {
                document_no: row.get(0)?,
                summary: row.get(1)?,
                amount: row.get(2)?,
                posting_date: row.get(3)?,
                debit_action: row.get(4)?,
                credit_action: row.get(5)?,
            })
        })?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    /// Group the `recent` newest vendor-matched transactions by
    /// (primary debit, primary credit, summary) and return the top `top_k`.
    pub fn query_vendor_booking_templates(
        &self,
        tenant_id: &str,
        vendor: &str,
        recent: u32,
        top_k: u32,
    ) -> anyhow::Result<Vec<BookingTemplateRow>> {
        let mut stmt = self.conn.prepare(
            "WITH matched AS (
               SELECT t.id, t.summary FROM transactions t
               WHERE t.tenant_id = ?1
                 AND instr(lower(COALESCE(t.summary, '')), lower(?2)) > 0
               ORDER BY t.created_at DESC
               LIMIT ?3
             ),
             primaries AS (
               SELECT m.summary,
                 (SELECT l.action_code FROM transaction_lines l
                  WHERE l.transaction_id = m.id AND l.side = 'DR' ORDER BY l.line_no LIMIT 1) AS dr,
                 (SELECT l.action_code FROM transaction_lines l
                  WHERE l.transaction_id = m.id AND l.side = 'CR' ORDER BY l.line_no LIMIT 1) AS cr
               FROM matched m
             )
             SELECT dr, cr, summary, COUNT(*) AS cnt
             FROM primaries
             WHERE dr IS NOT NULL AND cr IS NOT NULL
             GROUP BY dr, cr, summary
             ORDER BY cnt DESC, dr, cr
             LIMIT ?4",
        )?;
        let rows = stmt.query_map(params![tenant_id, vendor, recent, top_k], |row| {
            Ok(BookingTemplateRow {
                debit_action: row.get(0)?,
                debit_name: None,
                credit_action: row.get(1)?,
                credit_name: None,
                summary: row.get(2)?,
                usage_count: row.get(3)?,
            })
        })?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    /// Booking templates for an expense keyword, matched against summary,
    /// line memo, or line action name.
    pub fn query_category_booking_templates(
        &self,
        tenant_id: &str,
        keyword: &str,
        recent: u32,
        top_k: u32,
    ) -> anyhow::Result<Vec<BookingTemplateRow>> {
        let mut stmt = self.conn.prepare(
            "WITH matched AS (
               SELECT t.id FROM transactions t
               WHERE t.tenant_id = ?1
                 AND (
                   instr(lower(COALESCE(t.summary, '')), lower(?2)) > 0
                   OR EXISTS (
                     SELECT 1 FROM transaction_lines l
                     WHERE l.transaction_id = t.id
                       AND (instr(lower(COALESCE(l.memo, '')), lower(?2)) > 0
                            OR instr(lower(COALESCE(l.action_name, '')), lower(?2)) > 0)
                   )
                 )
               ORDER BY t.created_at DESC
               LIMIT ?3
             ),
             primaries AS (
               SELECT
                 (SELECT l.action_code FROM transaction_lines l
                  WHERE l.transaction_id = m.id AND l.side = 'DR' ORDER BY l.line_no LIMIT 1) AS dr,
                 (SELECT l.action_name FROM transaction_lines l
                  WHERE l.transaction_id = m.id AND l.side = 'DR' ORDER BY l.line_no LIMIT 1) AS dr_name,
                 (SELECT l.action_code FROM transaction_lines l
                  WHERE l.transaction_id = m.id AND l.side = 'CR' ORDER BY l.line_no LIMIT 1) AS cr,
                 (SELECT l.action_name FROM transaction_lines l
                  WHERE l.transaction_id = m.id AND l.side = 'CR' ORDER BY l.line_no LIMIT 1) AS cr_name
               FROM matched m
             )
             SELECT dr, dr_name, cr, cr_name, COUNT(*) AS cnt
             FROM primaries
             WHERE dr IS NOT NULL AND cr IS NOT NULL
             GROUP BY dr, dr_name, cr, cr_name
             ORDER BY cnt DESC, dr, cr
             LIMIT ?4",
        )?;
        let rows = stmt.query_map(params![tenant_id, keyword, recent, top_k], |row| {
            Ok(BookingTemplateRow {
                debit_action: row.get(0)?,
                debit_name: row.get(1)?,
                credit_action: row.get(2)?,
                credit_name: row.get(3)?,
                summary: None,
                usage_count: row.get(4)?,
            })
        })?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    /// Debit totals per transaction with a partner, created on or after `since`.
    pub fn query_partner_amounts(
        &self,
        tenant_id: &str,
        since: DateTime<Utc>,
    ) -> anyhow::Result<Vec<PartnerAmountRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT t.id, t.document_no, t.partner_name,
                    COALESCE((SELECT SUM(ABS(l.amount)) FROM transaction_lines l
                              WHERE l.transaction_id = t.id AND l.side = 'DR'), 0),
                    t.created_at
             FROM transactions t
             WHERE t.tenant_id = ?1
               AND t.partner_name IS NOT NULL
               AND t.status != 'cancelled'
               AND t.created_at >= ?2
             ORDER BY t.created_at DESC",
        )?;
        let rows = stmt.query_map(params![tenant_id, ts(since)], |row| {
            Ok(PartnerAmountRow {
                transaction_id: row.get(0)?,
                document_no: row.get(1)?,
                partner_name: row.get(2)?,
                amount: row.get(3)?,
                created_at: row.get(4)?,
            })
        })?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    // -- Learning events --

    pub fn insert_learning_event(&self, event: &NewLearningEvent) -> anyhow::Result<()> {
        let at = ts(event.created_at);
        self.conn.execute(
            "INSERT INTO learning_events (id, tenant_id, event_type, session_id, skill_id,
             context, decision_output, user_action, outcome, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)",
            params![
                event.id,
                event.tenant_id,
                event.event_type,
                event.session_id,
                event.skill_id,
                event.context,
                event.decision_output,
                event.user_action,
                event.outcome,
                at
            ],
        )?;
        Ok(())
    }

    /// Flip matching `pending_review` events to `confirmed`. Returns rows changed.
    pub fn confirm_pending_events(
        &self,
        tenant_id: &str,
        event_type: &str,
        context_key: &str,
        context_value: &str,
    ) -> anyhow::Result<usize> {
        let path = format!("$.{context_key}");
        let changed = self.conn.execute(
            "UPDATE learning_events
             SET outcome = 'confirmed', updated_at = ?1
             WHERE tenant_id = ?2
               AND event_type = ?3
               AND outcome = 'pending_review'
               AND CAST(json_extract(context, ?4) AS TEXT) = ?5",
            params![now_ts(), tenant_id, event_type, path, context_value],
        )?;
        Ok(changed)
    }

    /// All events of one tenant with the given outcome, oldest first.
    pub fn query_events_by_outcome(
        &self,
        tenant_id: &str,
        outcome: &str,
    ) -> anyhow::Result<Vec<LearningEventRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, tenant_id, event_type, session_id, skill_id, context,
             decision_output, user_action, outcome, created_at, updated_at
             FROM learning_events
             WHERE tenant_id = ?1 AND outcome = ?2
             ORDER BY created_at, id",
        )?;
        let rows = stmt.query_map(params![tenant_id, outcome], map_event_row)?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    pub fn get_learning_event(&self, id: &str) -> anyhow::Result<Option<LearningEventRow>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, tenant_id, event_type, session_id, skill_id, context,
                 decision_output, user_action, outcome, created_at, updated_at
                 FROM learning_events WHERE id = ?1",
                params![id],
                map_event_row,
            )
            .optional()?;
        Ok(row)
    }

    pub fn count_pending_events_before(
        &self,
        tenant_id: &str,
        before: DateTime<Utc>,
    ) -> anyhow::Result<i64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM learning_events
             WHERE tenant_id = ?1 AND outcome = 'pending_review' AND created_at < ?2",
            params![tenant_id, ts(before)],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    // -- Learned patterns --

    /// Immediate-learning upsert: insert at `initial`, or keep the new
    /// recommendation and step confidence up to `ceiling`.
    #[allow(clippy::too_many_arguments)]
    pub fn reinforce_pattern(
        &self,
        tenant_id: &str,
        pattern_type: &str,
        conditions: &str,
        recommendation: &str,
        initial: f64,
        step: f64,
        ceiling: f64,
    ) -> anyhow::Result<()> {
        self.conn.execute(
            "INSERT INTO learned_patterns (tenant_id, pattern_type, conditions, recommendation,
             confidence, sample_count, last_updated_at)
             VALUES (?1, ?2, ?3, ?4, MIN(?5, ?7), 1, ?8)
             ON CONFLICT(tenant_id, pattern_type, conditions) DO UPDATE SET
                recommendation = excluded.recommendation,
                confidence = MIN(?7, learned_patterns.confidence + ?6),
                sample_count = learned_patterns.sample_count + 1,
                last_updated_at = excluded.last_updated_at",
            params![
                tenant_id,
                pattern_type,
                conditions,
                recommendation,
                initial,
                step,
                ceiling,
                now_ts()
            ],
        )?;
        Ok(())
    }

    /// Batch-learning upsert: overwrite every derived column. All rows are
    /// written in one transaction.
    pub fn replace_patterns(
        &self,
        tenant_id: &str,
        patterns: &[PatternWrite],
    ) -> anyhow::Result<usize> {
        let now = now_ts();
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO learned_patterns (tenant_id, pattern_type, conditions,
                 recommendation, confidence, sample_count, last_updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(tenant_id, pattern_type, conditions) DO UPDATE SET
                    recommendation = excluded.recommendation,
                    confidence = excluded.confidence,
                    sample_count = excluded.sample_count,
                    last_updated_at = excluded.last_updated_at",
            )?;
            for p in patterns {
                stmt.execute(params![
                    tenant_id,
                    p.pattern_type,
                    p.conditions,
                    p.recommendation,
                    p.confidence,
                    p.sample_count,
                    now
                ])?;
            }
        }
        tx.commit()?;
        Ok(patterns.len())
    }

    pub fn get_pattern(
        &self,
        tenant_id: &str,
        pattern_type: &str,
        conditions: &str,
    ) -> anyhow::Result<Option<LearnedPatternRow>> {
        let row = self
            .conn
            .query_row(
                "SELECT tenant_id, pattern_type, conditions, recommendation, confidence,
                 sample_count, last_updated_at
                 FROM learned_patterns
                 WHERE tenant_id = ?1 AND pattern_type = ?2 AND conditions = ?3",
                params![tenant_id, pattern_type, conditions],
                map_pattern_row,
            )
            .optional()?;
        Ok(row)
    }

    pub fn query_patterns_by_type(
        &self,
        tenant_id: &str,
        pattern_type: &str,
        min_confidence: f64,
        limit: u32,
    ) -> anyhow::Result<Vec<LearnedPatternRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT tenant_id, pattern_type, conditions, recommendation, confidence,
             sample_count, last_updated_at
             FROM learned_patterns
             WHERE tenant_id = ?1 AND pattern_type = ?2 AND confidence >= ?3
             ORDER BY confidence DESC, sample_count DESC
             LIMIT ?4",
        )?;
        let rows = stmt.query_map(
            params![tenant_id, pattern_type, min_confidence, limit],
            map_pattern_row,
        )?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    /// Category patterns where either side contains the other (case-insensitive).
    pub fn query_category_patterns(
        &self,
        tenant_id: &str,
        category: &str,
        min_confidence: f64,
        limit: u32,
    ) -> anyhow::Result<Vec<LearnedPatternRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT tenant_id, pattern_type, conditions, recommendation, confidence,
             sample_count, last_updated_at
             FROM learned_patterns
             WHERE tenant_id = ?1
               AND pattern_type = 'category_action'
               AND json_extract(conditions, '$.category') IS NOT NULL
               AND (
                 instr(lower(json_extract(conditions, '$.category')), lower(?2)) > 0
                 OR instr(lower(?2), lower(json_extract(conditions, '$.category'))) > 0
               )
               AND confidence >= ?3
             ORDER BY confidence DESC, sample_count DESC
             LIMIT ?4",
        )?;
        let rows = stmt.query_map(
            params![tenant_id, category, min_confidence, limit],
            map_pattern_row,
        )?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    pub fn query_all_patterns(&self, tenant_id: &str) -> anyhow::Result<Vec<LearnedPatternRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT tenant_id, pattern_type, conditions, recommendation, confidence,
             sample_count, last_updated_at
             FROM learned_patterns
             WHERE tenant_id = ?1
             ORDER BY pattern_type, conditions",
        )?;
        let rows = stmt.query_map(params![tenant_id], map_pattern_row)?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    /// Get a reference to the underlying connection (for advanced queries).
    pub fn conn(&self) -> &Connection {
        &self.conn
    }
}

fn map_event_row(row: &Row<'_>) -> rusqlite::Result<LearningEventRow> {
    Ok(LearningEventRow {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        event_type: row.get(2)?,
        session_id: row.get(3)?,
        skill_id: row.get(4)?,
        context: row.get(5)?,
        decision_output: row.get(6)?,
        user_action: row.get(7)?,
        outcome: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

fn map_pattern_row(row: &Row<'_>) -> rusqlite::Result<LearnedPatternRow> {
    Ok(LearnedPatternRow {
        tenant_id: row.get(0)?,
        pattern_type: row.get(1)?,
        conditions: row.get(2)?,
        recommendation: row.get(3)?,
        confidence: row.get(4)?,
        sample_count: row.get(5)?,
        last_updated_at: row.get(6)?,
    })
}

// -- Input types --

#[derive(Debug, Clone)]
pub struct NewTask {
    pub id: String,
    pub session_id: String,
    pub tenant_id: String,
    pub task_type: String,
    pub status: String,
    pub label: Option<String>,
    pub title: String,
    pub metadata: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TransactionRecord {
    pub id: String,
    pub tenant_id: String,
    pub document_no: String,
    pub partner_name: Option<String>,
    pub summary: Option<String>,
    pub posting_date: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub lines: Vec<TransactionLine>,
}

#[derive(Debug, Clone)]
pub struct TransactionLine {
    pub side: String,
    pub action_code: String,
    pub action_name: Option<String>,
    pub amount: f64,
    pub memo: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewLearningEvent {
    pub id: String,
    pub tenant_id: String,
    pub event_type: String,
    pub session_id: Option<String>,
    pub skill_id: Option<String>,
    pub context: String,
    pub decision_output: Option<String>,
    pub user_action: Option<String>,
    pub outcome: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PatternWrite {
    pub pattern_type: String,
    pub conditions: String,
    pub recommendation: String,
    pub confidence: f64,
    pub sample_count: i64,
}

// -- Row types --

#[derive(Debug, Clone)]
pub struct TaskRow {
    pub id: String,
    pub session_id: String,
    pub tenant_id: String,
    pub task_type: String,
    pub status: String,
    pub label: Option<String>,
    pub title: String,
    pub metadata: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone)]
pub struct ActionUsageRow {
    pub action_code: String,
    pub action_name: Option<String>,
    pub side: String,
    pub usage_count: i64,
    pub last_used: String,
}

#[derive(Debug, Clone)]
pub struct SimilarTransactionRow {
    pub document_no: String,
    pub summary: Option<String>,
    pub amount: f64,
    pub posting_date: String,
    pub debit_action: Option<String>,
    pub credit_action: Option<String>,
}

#[derive(Debug, Clone)]
pub struct BookingTemplateRow {
    pub debit_action: String,
    pub debit_name: Option<String>,
    pub credit_action: String,
    pub credit_name: Option<String>,
    pub summary: Option<String>,
    pub usage_count: i64,
}

#[derive(Debug, Clone)]
pub struct PartnerAmountRow {
    pub transaction_id: String,
    pub document_no: String,
    pub partner_name: String,
    pub amount: f64,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct LearningEventRow {
    pub id: String,
    pub tenant_id: String,
    pub event_type: String,
    pub session_id: Option<String>,
    pub skill_id: Option<String>,
    pub context: String,
    pub decision_output: Option<String>,
    pub user_action: Option<String>,
    pub outcome: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LearnedPatternRow {
    pub tenant_id: String,
    pub pattern_type: String,
    pub conditions: String,
    pub recommendation: String,
    pub confidence: f64,
    pub sample_count: i64,
    pub last_updated_at: String,
}
