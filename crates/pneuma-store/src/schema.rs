// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! DDL for the six persisted tables (spec §3, §6). Additive-only evolution —
//! schema migration is out of scope.

pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS agent_consciousness (
    agent_entity_id TEXT PRIMARY KEY,
    messages_json   TEXT NOT NULL,
    cycle_count     INTEGER NOT NULL DEFAULT 0,
    token_estimate  INTEGER NOT NULL DEFAULT 0,
    last_cycle_at   TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS inbox_event (
    agent_entity_id TEXT NOT NULL,
    event_id        TEXT NOT NULL,
    event_type      TEXT NOT NULL,
    data_json       TEXT NOT NULL,
    status          TEXT NOT NULL,
    run_id          TEXT,
    created_at      TEXT NOT NULL,
    processed_at    TEXT,
    PRIMARY KEY (agent_entity_id, event_id)
);
CREATE INDEX IF NOT EXISTS idx_inbox_event_status
    ON inbox_event (agent_entity_id, status);

CREATE TABLE IF NOT EXISTS run (
    run_id             TEXT PRIMARY KEY,
    agent_entity_id    TEXT NOT NULL,
    agent_id           TEXT NOT NULL,
    status             TEXT NOT NULL,
    cycle_number       INTEGER NOT NULL,
    inbox_event_count  INTEGER NOT NULL DEFAULT 0,
    step_count         INTEGER NOT NULL DEFAULT 0,
    prompt_tokens      INTEGER NOT NULL DEFAULT 0,
    completion_tokens  INTEGER NOT NULL DEFAULT 0,
    duration_ms        INTEGER NOT NULL DEFAULT 0,
    trigger_json       TEXT NOT NULL,
    error_message      TEXT,
    created_at         TEXT NOT NULL,
    completed_at       TEXT
);

CREATE TABLE IF NOT EXISTS pending_tool_call (
    run_id        TEXT NOT NULL,
    call_id       TEXT NOT NULL,
    tool_name     TEXT NOT NULL,
    input_json    TEXT NOT NULL,
    status        TEXT NOT NULL,
    output_json   TEXT,
    requested_at  TEXT NOT NULL,
    completed_at  TEXT,
    PRIMARY KEY (run_id, call_id)
);

CREATE TABLE IF NOT EXISTS plan (
    plan_id         TEXT PRIMARY KEY,
    agent_entity_id TEXT NOT NULL,
    name            TEXT NOT NULL,
    instruction     TEXT NOT NULL,
    run_after_secs  INTEGER,
    scheduled_at    TEXT,
    cron            TEXT,
    next_run_at     TEXT,
    last_run_at     TEXT,
    status          TEXT NOT NULL,
    is_recurring    INTEGER NOT NULL,
    UNIQUE (agent_entity_id, name)
);

CREATE TABLE IF NOT EXISTS smart_space_message (
    message_id      TEXT PRIMARY KEY,
    smart_space_id  TEXT NOT NULL,
    entity_id       TEXT NOT NULL,
    role            TEXT NOT NULL,
    content         TEXT NOT NULL,
    seq             INTEGER NOT NULL,
    metadata_json   TEXT NOT NULL,
    run_id          TEXT,
    created_at      TEXT NOT NULL,
    UNIQUE (smart_space_id, seq)
);
CREATE INDEX IF NOT EXISTS idx_space_message_space
    ON smart_space_message (smart_space_id, seq);
"#;
