// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! The durable row store: a `rusqlite`-backed stand-in for the external
//! relational store spec §1 treats as a given collaborator.
//!
//! `rusqlite::Connection` is `Send` but not `Sync` and its calls are
//! blocking, so every operation here hands the connection to
//! `spawn_blocking` rather than holding the mutex across an `.await`.

use std::sync::{Arc, Mutex};

use rusqlite::{params, OptionalExtension};

use crate::error::{StoreError, StoreResult};
use crate::models::*;
use crate::schema::SCHEMA_SQL;

#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<rusqlite::Connection>>,
}

impl Store {
    /// Open (or create) the SQLite database at `path` and apply schema DDL.
    pub fn open(path: &str) -> StoreResult<Self> {
        let conn = rusqlite::Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// In-memory store for tests.
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = rusqlite::Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&rusqlite::Connection) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| StoreError::Transient("store connection mutex poisoned".into()))?;
            f(&guard)
        })
        .await
        .map_err(|e| StoreError::Transient(format!("blocking task panicked: {e}")))?
    }

    // ── AgentConsciousness ────────────────────────────────────────────────

    pub async fn load_consciousness(&self, agent_entity_id: &str) -> StoreResult<ConsciousnessRow> {
        let id = agent_entity_id.to_string();
        self.with_conn(move |conn| {
            let row = conn
                .query_row(
                    "SELECT agent_entity_id, messages_json, cycle_count, token_estimate, last_cycle_at
                     FROM agent_consciousness WHERE agent_entity_id = ?1",
                    params![id],
                    |r| {
                        Ok(ConsciousnessRow {
                            agent_entity_id: r.get(0)?,
                            messages_json: r.get(1)?,
                            cycle_count: r.get(2)?,
                            token_estimate: r.get(3)?,
                            last_cycle_at: r.get(4)?,
                        })
                    },
                )
                .optional()?;
            Ok(row.unwrap_or_else(|| ConsciousnessRow {
                agent_entity_id: id.clone(),
                messages_json: "[]".into(),
                cycle_count: 0,
                token_estimate: 0,
                last_cycle_at: chrono::Utc::now().to_rfc3339(),
            }))
        })
        .await
    }

    pub async fn save_consciousness(&self, row: ConsciousnessRow) -> StoreResult<()> {
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO agent_consciousness
                    (agent_entity_id, messages_json, cycle_count, token_estimate, last_cycle_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(agent_entity_id) DO UPDATE SET
                    messages_json = excluded.messages_json,
                    cycle_count = excluded.cycle_count,
                    token_estimate = excluded.token_estimate,
                    last_cycle_at = excluded.last_cycle_at",
                params![
                    row.agent_entity_id,
                    row.messages_json,
                    row.cycle_count,
                    row.token_estimate,
                    row.last_cycle_at
                ],
            )?;
            Ok(())
        })
        .await
    }

    // ── InboxEvent ────────────────────────────────────────────────────────

    /// Upsert with `status=pending`; returns `true` if a new row was inserted,
    /// `false` if `event_id` already existed (idempotent push, spec §4.4).
    pub async fn insert_inbox_event_pending(&self, row: InboxEventRow) -> StoreResult<bool> {
        self.with_conn(move |conn| {
            let changed = conn.execute(
                "INSERT INTO inbox_event
                    (agent_entity_id, event_id, event_type, data_json, status, run_id, created_at, processed_at)
                 VALUES (?1, ?2, ?3, ?4, 'pending', NULL, ?5, NULL)
                 ON CONFLICT(agent_entity_id, event_id) DO NOTHING",
                params![row.agent_entity_id, row.event_id, row.event_type, row.data_json, row.created_at],
            )?;
            Ok(changed > 0)
        })
        .await
    }

    pub async fn get_inbox_event(
        &self,
        agent_entity_id: &str,
        event_id: &str,
    ) -> StoreResult<Option<InboxEventRow>> {
        let (agent, event) = (agent_entity_id.to_string(), event_id.to_string());
        self.with_conn(move |conn| {
            let row = conn
                .query_row(
                    "SELECT agent_entity_id, event_id, event_type, data_json, status, run_id, created_at, processed_at
                     FROM inbox_event WHERE agent_entity_id = ?1 AND event_id = ?2",
                    params![agent, event],
                    row_to_inbox_event,
                )
                .optional()?;
            Ok(row)
        })
        .await
    }

    /// `pending → processing`, guarded. Rows not currently `pending` are
    /// silently skipped rather than erroring — recovery may re-mark.
    pub async fn mark_events_processing(
        &self,
        agent_entity_id: &str,
        event_ids: &[String],
        run_id: &str,
    ) -> StoreResult<usize> {
        let (agent, ids, run) = (agent_entity_id.to_string(), event_ids.to_vec(), run_id.to_string());
        self.with_conn(move |conn| {
            let mut count = 0usize;
            for id in &ids {
                count += conn.execute(
                    "UPDATE inbox_event SET status = 'processing', run_id = ?3
                     WHERE agent_entity_id = ?1 AND event_id = ?2 AND status = 'pending'",
                    params![agent, id, run],
                )?;
            }
            Ok(count)
        })
        .await
    }

    pub async fn mark_events_processed(
        &self,
        agent_entity_id: &str,
        event_ids: &[String],
    ) -> StoreResult<usize> {
        self.mark_events_terminal(agent_entity_id, event_ids, "processed").await
    }

    pub async fn mark_events_failed(
        &self,
        agent_entity_id: &str,
        event_ids: &[String],
    ) -> StoreResult<usize> {
        self.mark_events_terminal(agent_entity_id, event_ids, "failed").await
    }

    async fn mark_events_terminal(
        &self,
        agent_entity_id: &str,
        event_ids: &[String],
        terminal: &'static str,
    ) -> StoreResult<usize> {
        let (agent, ids) = (agent_entity_id.to_string(), event_ids.to_vec());
        let now = chrono::Utc::now().to_rfc3339();
        self.with_conn(move |conn| {
            let mut count = 0usize;
            for id in &ids {
                count += conn.execute(
                    &format!(
                        "UPDATE inbox_event SET status = '{terminal}', processed_at = ?3
                         WHERE agent_entity_id = ?1 AND event_id = ?2 AND status = 'processing'"
                    ),
                    params![agent, id, now],
                )?;
            }
            Ok(count)
        })
        .await
    }

    /// Re-queue all `processing` rows for `agent_entity_id` back to `pending`.
    /// Returns the recovered rows so the caller (Inbox) can re-left-push them
    /// onto the fast queue.
    pub async fn recover_stuck_events(&self, agent_entity_id: &str) -> StoreResult<Vec<InboxEventRow>> {
        let agent = agent_entity_id.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT agent_entity_id, event_id, event_type, data_json, status, run_id, created_at, processed_at
                 FROM inbox_event WHERE agent_entity_id = ?1 AND status = 'processing'",
            )?;
            let rows: Vec<InboxEventRow> = stmt
                .query_map(params![agent], row_to_inbox_event)?
                .collect::<Result<_, _>>()?;
            for row in &rows {
                conn.execute(
                    "UPDATE inbox_event SET status = 'pending', run_id = NULL
                     WHERE agent_entity_id = ?1 AND event_id = ?2",
                    params![row.agent_entity_id, row.event_id],
                )?;
            }
            Ok(rows)
        })
        .await
    }

    // ── Run ───────────────────────────────────────────────────────────────

    pub async fn create_run(&self, row: RunRow) -> StoreResult<()> {
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO run
                    (run_id, agent_entity_id, agent_id, status, cycle_number, inbox_event_count,
                     step_count, prompt_tokens, completion_tokens, duration_ms, trigger_json,
                     error_message, created_at, completed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                params![
                    row.run_id,
                    row.agent_entity_id,
                    row.agent_id,
                    row.status,
                    row.cycle_number,
                    row.inbox_event_count,
                    row.step_count,
                    row.prompt_tokens,
                    row.completion_tokens,
                    row.duration_ms,
                    row.trigger_json,
                    row.error_message,
                    row.created_at,
                    row.completed_at
                ],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn get_run(&self, run_id: &str) -> StoreResult<RunRow> {
        let id = run_id.to_string();
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT run_id, agent_entity_id, agent_id, status, cycle_number, inbox_event_count,
                        step_count, prompt_tokens, completion_tokens, duration_ms, trigger_json,
                        error_message, created_at, completed_at
                 FROM run WHERE run_id = ?1",
                params![id],
                row_to_run,
            )
            .optional()?
            .ok_or_else(|| StoreError::NotFound(format!("run {id}")))
        })
        .await
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn complete_run(
        &self,
        run_id: &str,
        step_count: i64,
        prompt_tokens: i64,
        completion_tokens: i64,
        duration_ms: i64,
        completed_at: &str,
    ) -> StoreResult<()> {
        let (id, completed_at) = (run_id.to_string(), completed_at.to_string());
        self.with_conn(move |conn| {
            conn.execute(
                "UPDATE run SET status = 'completed', step_count = ?2, prompt_tokens = ?3,
                    completion_tokens = ?4, duration_ms = ?5, completed_at = ?6
                 WHERE run_id = ?1",
                params![id, step_count, prompt_tokens, completion_tokens, duration_ms, completed_at],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn fail_run(&self, run_id: &str, error_message: &str, completed_at: &str) -> StoreResult<()> {
        let (id, msg, completed_at) = (run_id.to_string(), error_message.to_string(), completed_at.to_string());
        self.with_conn(move |conn| {
            conn.execute(
                "UPDATE run SET status = 'failed', error_message = ?2, completed_at = ?3 WHERE run_id = ?1",
                params![id, msg, completed_at],
            )?;
            Ok(())
        })
        .await
    }

    /// Delete the run row entirely — used for skip-rollback (spec §4.2 step 9).
    pub async fn delete_run(&self, run_id: &str) -> StoreResult<()> {
        let id = run_id.to_string();
        self.with_conn(move |conn| {
            conn.execute("DELETE FROM run WHERE run_id = ?1", params![id])?;
            Ok(())
        })
        .await
    }

    // ── PendingToolCall ───────────────────────────────────────────────────

    pub async fn insert_pending_tool_call(&self, row: PendingToolCallRow) -> StoreResult<()> {
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO pending_tool_call
                    (run_id, call_id, tool_name, input_json, status, output_json, requested_at, completed_at)
                 VALUES (?1, ?2, ?3, ?4, 'pending', NULL, ?5, NULL)",
                params![row.run_id, row.call_id, row.tool_name, row.input_json, row.requested_at],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn get_pending_tool_call(&self, run_id: &str, call_id: &str) -> StoreResult<PendingToolCallRow> {
        let (run, call) = (run_id.to_string(), call_id.to_string());
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT run_id, call_id, tool_name, input_json, status, output_json, requested_at, completed_at
                 FROM pending_tool_call WHERE run_id = ?1 AND call_id = ?2",
                params![run, call],
                row_to_pending_tool_call,
            )
            .optional()?
            .ok_or_else(|| StoreError::NotFound(format!("pending tool call {call_id}")))
        })
        .await
    }

    /// `pending → completed`, guarded. Returns `AlreadyCompleted` if the call
    /// was already resolved (spec §4.7, §8 async-tool idempotence).
    pub async fn complete_pending_tool_call(
        &self,
        run_id: &str,
        call_id: &str,
        output_json: &str,
        completed_at: &str,
    ) -> StoreResult<()> {
        let (run, call, output, completed_at) = (
            run_id.to_string(),
            call_id.to_string(),
            output_json.to_string(),
            completed_at.to_string(),
        );
        self.with_conn(move |conn| {
            let current: Option<String> = conn
                .query_row(
                    "SELECT status FROM pending_tool_call WHERE run_id = ?1 AND call_id = ?2",
                    params![run, call],
                    |r| r.get(0),
                )
                .optional()?;
            match current.as_deref() {
                None => Err(StoreError::NotFound(format!("pending tool call {call}"))),
                Some("completed") => Err(StoreError::AlreadyCompleted(format!(
                    "tool call {call} already completed"
                ))),
                Some(_) => {
                    conn.execute(
                        "UPDATE pending_tool_call SET status = 'completed', output_json = ?3, completed_at = ?4
                         WHERE run_id = ?1 AND call_id = ?2",
                        params![run, call, output, completed_at],
                    )?;
                    Ok(())
                }
            }
        })
        .await
    }

    // ── Plan ──────────────────────────────────────────────────────────────

    pub async fn upsert_plan(&self, row: PlanRow) -> StoreResult<()> {
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO plan
                    (plan_id, agent_entity_id, name, instruction, run_after_secs, scheduled_at, cron,
                     next_run_at, last_run_at, status, is_recurring)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                 ON CONFLICT(plan_id) DO UPDATE SET
                    name = excluded.name, instruction = excluded.instruction,
                    run_after_secs = excluded.run_after_secs, scheduled_at = excluded.scheduled_at,
                    cron = excluded.cron, next_run_at = excluded.next_run_at,
                    last_run_at = excluded.last_run_at, status = excluded.status,
                    is_recurring = excluded.is_recurring",
                params![
                    row.plan_id,
                    row.agent_entity_id,
                    row.name,
                    row.instruction,
                    row.run_after_secs,
                    row.scheduled_at,
                    row.cron,
                    row.next_run_at,
                    row.last_run_at,
                    row.status,
                    row.is_recurring as i64
                ],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn get_plan(&self, plan_id: &str) -> StoreResult<PlanRow> {
        let id = plan_id.to_string();
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT plan_id, agent_entity_id, name, instruction, run_after_secs, scheduled_at,
                        cron, next_run_at, last_run_at, status, is_recurring
                 FROM plan WHERE plan_id = ?1",
                params![id],
                row_to_plan,
            )
            .optional()?
            .ok_or_else(|| StoreError::NotFound(format!("plan {id}")))
        })
        .await
    }

    pub async fn list_pending_plans(&self) -> StoreResult<Vec<PlanRow>> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT plan_id, agent_entity_id, name, instruction, run_after_secs, scheduled_at,
                        cron, next_run_at, last_run_at, status, is_recurring
                 FROM plan WHERE status = 'pending'",
            )?;
            let rows = stmt
                .query_map([], row_to_plan)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }

    pub async fn update_plan_fired(
        &self,
        plan_id: &str,
        last_run_at: &str,
        next_run_at: Option<&str>,
    ) -> StoreResult<()> {
        let (id, last, next) = (
            plan_id.to_string(),
            last_run_at.to_string(),
            next_run_at.map(|s| s.to_string()),
        );
        self.with_conn(move |conn| {
            conn.execute(
                "UPDATE plan SET last_run_at = ?2, next_run_at = ?3 WHERE plan_id = ?1",
                params![id, last, next],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn complete_plan(&self, plan_id: &str) -> StoreResult<()> {
        let id = plan_id.to_string();
        self.with_conn(move |conn| {
            conn.execute(
                "UPDATE plan SET status = 'completed', next_run_at = NULL WHERE plan_id = ?1",
                params![id],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn cancel_plan(&self, plan_id: &str) -> StoreResult<()> {
        let id = plan_id.to_string();
        self.with_conn(move |conn| {
            conn.execute("UPDATE plan SET status = 'canceled' WHERE plan_id = ?1", params![id])?;
            Ok(())
        })
        .await
    }

    // ── SmartSpaceMessage ─────────────────────────────────────────────────

    /// Insert with the next monotone `seq` for `smart_space_id`, computed and
    /// written inside one transaction to serialize concurrent inserts within
    /// a space (spec §5 shared-resource policy).
    pub async fn insert_space_message(
        &self,
        message_id: &str,
        smart_space_id: &str,
        entity_id: &str,
        role: &str,
        content: &str,
        metadata_json: &str,
        run_id: Option<&str>,
    ) -> StoreResult<SpaceMessageRow> {
        let (message_id, space, entity, role, content, metadata, run_id) = (
            message_id.to_string(),
            smart_space_id.to_string(),
            entity_id.to_string(),
            role.to_string(),
            content.to_string(),
            metadata_json.to_string(),
            run_id.map(|s| s.to_string()),
        );
        let created_at = chrono::Utc::now().to_rfc3339();
        self.with_conn(move |conn| {
            let tx = conn.unchecked_transaction()?;
            let next_seq: i64 = tx.query_row(
                "SELECT COALESCE(MAX(seq), 0) + 1 FROM smart_space_message WHERE smart_space_id = ?1",
                params![space],
                |r| r.get(0),
            )?;
            tx.execute(
                "INSERT INTO smart_space_message
                    (message_id, smart_space_id, entity_id, role, content, seq, metadata_json, run_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![message_id, space, entity, role, content, next_seq, metadata, run_id, created_at],
            )?;
            tx.commit()?;
            Ok(SpaceMessageRow {
                message_id,
                smart_space_id: space,
                entity_id: entity,
                role,
                content,
                seq: next_seq,
                metadata_json: metadata,
                run_id,
                created_at,
            })
        })
        .await
    }

    pub async fn update_space_message(
        &self,
        message_id: &str,
        content: &str,
        metadata_json: &str,
    ) -> StoreResult<()> {
        let (id, content, metadata) = (message_id.to_string(), content.to_string(), metadata_json.to_string());
        self.with_conn(move |conn| {
            let changed = conn.execute(
                "UPDATE smart_space_message SET content = ?2, metadata_json = ?3 WHERE message_id = ?1",
                params![id, content, metadata],
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound(format!("space message {id}")));
            }
            Ok(())
        })
        .await
    }

    /// Last `limit` messages in `smart_space_id`, oldest first — backs the
    /// inbox event's `recentContext` (spec §4.4, up to 5 entries).
    pub async fn list_recent_space_messages(
        &self,
        smart_space_id: &str,
        limit: u32,
    ) -> StoreResult<Vec<SpaceMessageRow>> {
        let space = smart_space_id.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT message_id, smart_space_id, entity_id, role, content, seq, metadata_json, run_id, created_at
                 FROM smart_space_message WHERE smart_space_id = ?1 ORDER BY seq DESC LIMIT ?2",
            )?;
            let mut rows: Vec<SpaceMessageRow> = stmt
                .query_map(params![space, limit], row_to_space_message)?
                .collect::<Result<_, _>>()?;
            rows.reverse();
            Ok(rows)
        })
        .await
    }

    /// Find the `SpaceMessage` a pending async tool call left at
    /// `requires_action`, by the `call_id` its metadata was tagged with
    /// (spec §4.7 `submitToolResult` needs `smartSpaceId`/`messageId`, which
    /// the HTTP edge's `{callId, result}` body doesn't carry).
    pub async fn find_space_message_by_call_id(
        &self,
        run_id: &str,
        call_id: &str,
    ) -> StoreResult<Option<SpaceMessageRow>> {
        let (run_id, call_id) = (run_id.to_string(), call_id.to_string());
        self.with_conn(move |conn| {
            Ok(conn
                .query_row(
                    "SELECT message_id, smart_space_id, entity_id, role, content, seq, metadata_json, run_id, created_at
                     FROM smart_space_message
                     WHERE run_id = ?1 AND json_extract(metadata_json, '$.call_id') = ?2
                     ORDER BY seq DESC LIMIT 1",
                    params![run_id, call_id],
                    row_to_space_message,
                )
                .optional()?)
        })
        .await
    }
}

// ── Row mappers ─────────────────────────────────────────────────────────────

fn row_to_inbox_event(r: &rusqlite::Row) -> rusqlite::Result<InboxEventRow> {
    Ok(InboxEventRow {
        agent_entity_id: r.get(0)?,
        event_id: r.get(1)?,
        event_type: r.get(2)?,
        data_json: r.get(3)?,
        status: r.get(4)?,
        run_id: r.get(5)?,
        created_at: r.get(6)?,
        processed_at: r.get(7)?,
    })
}

fn row_to_run(r: &rusqlite::Row) -> rusqlite::Result<RunRow> {
    Ok(RunRow {
        run_id: r.get(0)?,
        agent_entity_id: r.get(1)?,
        agent_id: r.get(2)?,
        status: r.get(3)?,
        cycle_number: r.get(4)?,
        inbox_event_count: r.get(5)?,
        step_count: r.get(6)?,
        prompt_tokens: r.get(7)?,
        completion_tokens: r.get(8)?,
        duration_ms: r.get(9)?,
        trigger_json: r.get(10)?,
        error_message: r.get(11)?,
        created_at: r.get(12)?,
        completed_at: r.get(13)?,
    })
}

fn row_to_pending_tool_call(r: &rusqlite::Row) -> rusqlite::Result<PendingToolCallRow> {
    Ok(PendingToolCallRow {
        run_id: r.get(0)?,
        call_id: r.get(1)?,
        tool_name: r.get(2)?,
        input_json: r.get(3)?,
        status: r.get(4)?,
        output_json: r.get(5)?,
        requested_at: r.get(6)?,
        completed_at: r.get(7)?,
    })
}

fn row_to_plan(r: &rusqlite::Row) -> rusqlite::Result<PlanRow> {
    Ok(PlanRow {
        plan_id: r.get(0)?,
        agent_entity_id: r.get(1)?,
        name: r.get(2)?,
        instruction: r.get(3)?,
        run_after_secs: r.get(4)?,
        scheduled_at: r.get(5)?,
        cron: r.get(6)?,
        next_run_at: r.get(7)?,
        last_run_at: r.get(8)?,
        status: r.get(9)?,
        is_recurring: r.get::<_, i64>(10)? != 0,
    })
}

fn row_to_space_message(r: &rusqlite::Row) -> rusqlite::Result<SpaceMessageRow> {
    Ok(SpaceMessageRow {
        message_id: r.get(0)?,
        smart_space_id: r.get(1)?,
        entity_id: r.get(2)?,
        role: r.get(3)?,
        content: r.get(4)?,
        seq: r.get(5)?,
        metadata_json: r.get(6)?,
        run_id: r.get(7)?,
        created_at: r.get(8)?,
    })
}
