// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! The Inbox: a fast per-agent FIFO queue backed by a durable log.
//!
//! Every event is recorded in the row store (`L[agentEntityId]`) before it
//! becomes visible on the fast queue (`Q[agentEntityId]`) — durable-first,
//! so a crash between the two never silently drops an event. The fast queue
//! itself lives in process memory; [`pneuma_broker::WakeRegistry`] lets a
//! worker block on it across reconnects instead of polling the store.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use pneuma_broker::WakeRegistry;
use pneuma_store::{InboxEventRow, Store};
use uuid::Uuid;

use crate::error::{InboxError, InboxResult};
use crate::event::{EventData, InboxEvent, PlanData, ServiceData, SpaceMessageData, ToolResultData};

const WAIT_POLL_TIMEOUT: Duration = Duration::from_secs(30);

pub struct Inbox {
    store: Store,
    queues: Mutex<HashMap<String, VecDeque<String>>>,
    wake: WakeRegistry,
}

impl Inbox {
    pub fn new(store: Store) -> Self {
        Self {
            store,
            queues: Mutex::new(HashMap::new()),
            wake: WakeRegistry::new(),
        }
    }

    fn left_push(&self, agent_entity_id: &str, serialized: String) {
        let mut queues = self.queues.lock().expect("inbox queue mutex poisoned");
        queues.entry(agent_entity_id.to_string()).or_default().push_front(serialized);
    }

    /// Durable-first enqueue: upsert the log row (idempotent on `eventId`),
    /// then push onto the fast queue and wake any blocked waiter.
    pub async fn push_to_inbox(&self, agent_entity_id: &str, event: InboxEvent) -> InboxResult<()> {
        let row = InboxEventRow {
            agent_entity_id: agent_entity_id.to_string(),
            event_id: event.event_id.clone(),
            event_type: event.type_str().to_string(),
            data_json: serde_json::to_string(&event).map_err(|e| InboxError::Decode(e.to_string()))?,
            status: "pending".into(),
            run_id: None,
            created_at: event.timestamp.clone(),
            processed_at: None,
        };
        self.store.insert_inbox_event_pending(row.clone()).await?;

        let serialized = serde_json::to_string(&event).map_err(|e| InboxError::Decode(e.to_string()))?;
        self.left_push(agent_entity_id, serialized);
        self.wake.notify(agent_entity_id);
        Ok(())
    }

    pub async fn push_space_message_event(
        &self,
        agent_entity_id: &str,
        data: SpaceMessageData,
    ) -> InboxResult<()> {
        let event_id = data.message_id.clone();
        self.push_to_inbox(agent_entity_id, InboxEvent::new(event_id, EventData::SpaceMessage(data)))
            .await
    }

    pub async fn push_plan_event(&self, agent_entity_id: &str, data: PlanData) -> InboxResult<()> {
        let event_id = format!("{}:{}", data.plan_id, chrono::Utc::now().to_rfc3339());
        self.push_to_inbox(agent_entity_id, InboxEvent::new(event_id, EventData::Plan(data)))
            .await
    }

    pub async fn push_service_event(&self, agent_entity_id: &str, data: ServiceData) -> InboxResult<()> {
        let event_id = Uuid::new_v4().to_string();
        self.push_to_inbox(agent_entity_id, InboxEvent::new(event_id, EventData::Service(data)))
            .await
    }

    pub async fn push_tool_result_event(&self, agent_entity_id: &str, data: ToolResultData) -> InboxResult<()> {
        let event_id = format!("tr:{}", data.tool_call_id);
        self.push_to_inbox(agent_entity_id, InboxEvent::new(event_id, EventData::ToolResult(data)))
            .await
    }

    /// Right-pop everything queued, parse, dedup by `eventId` (belt-and-braces
    /// against re-pushed items from recovery), return in FIFO order.
    pub fn drain_inbox(&self, agent_entity_id: &str) -> InboxResult<Vec<InboxEvent>> {
        let drained: Vec<String> = {
            let mut queues = self.queues.lock().expect("inbox queue mutex poisoned");
            match queues.get_mut(agent_entity_id) {
                Some(q) => std::iter::from_fn(|| q.pop_back()).collect(),
                None => Vec::new(),
            }
        };

        let mut seen = std::collections::HashSet::new();
        let mut events = Vec::with_capacity(drained.len());
        for raw in drained {
            let event: InboxEvent = serde_json::from_str(&raw).map_err(|e| InboxError::Decode(e.to_string()))?;
            if seen.insert(event.event_id.clone()) {
                events.push(event);
            }
        }
        Ok(events)
    }

    /// Block until the fast queue is non-empty or `cancelled` resolves,
    /// polling the wake signal in 30s slices so a cancellation is noticed
    /// promptly even without an explicit push.
    pub async fn wait_for_inbox(
        &self,
        agent_entity_id: &str,
        cancel: &pneuma_runtime::CancelToken,
    ) -> InboxResult<Option<InboxEvent>> {
        loop {
            if self.inbox_size(agent_entity_id) > 0 {
                let mut queues = self.queues.lock().expect("inbox queue mutex poisoned");
                let raw = queues.get_mut(agent_entity_id).and_then(|q| q.pop_back());
                drop(queues);
                if let Some(raw) = raw {
                    let event: InboxEvent =
                        serde_json::from_str(&raw).map_err(|e| InboxError::Decode(e.to_string()))?;
                    return Ok(Some(event));
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => return Ok(None),
                _woken = self.wake.wait(agent_entity_id, WAIT_POLL_TIMEOUT) => {}
            }
        }
    }

    /// Non-destructive read of at most `count` items from the oldest end.
    pub fn peek_inbox(&self, agent_entity_id: &str, count: usize) -> InboxResult<Vec<InboxEvent>> {
        let queues = self.queues.lock().expect("inbox queue mutex poisoned");
        let Some(q) = queues.get(agent_entity_id) else {
            return Ok(Vec::new());
        };
        q.iter()
            .rev()
            .take(count)
            .map(|raw| serde_json::from_str(raw).map_err(|e| InboxError::Decode(e.to_string())))
            .collect()
    }

    pub fn inbox_size(&self, agent_entity_id: &str) -> usize {
        self.queues
            .lock()
            .expect("inbox queue mutex poisoned")
            .get(agent_entity_id)
            .map(|q| q.len())
            .unwrap_or(0)
    }

    pub async fn mark_events_processing(
        &self,
        agent_entity_id: &str,
        event_ids: &[String],
        run_id: &str,
    ) -> InboxResult<usize> {
        Ok(self.store.mark_events_processing(agent_entity_id, event_ids, run_id).await?)
    }

    pub async fn mark_events_processed(&self, agent_entity_id: &str, event_ids: &[String]) -> InboxResult<usize> {
        Ok(self.store.mark_events_processed(agent_entity_id, event_ids).await?)
    }

    pub async fn mark_events_failed(&self, agent_entity_id: &str, event_ids: &[String]) -> InboxResult<usize> {
        Ok(self.store.mark_events_failed(agent_entity_id, event_ids).await?)
    }

    /// Re-queue every `processing` row for `agentEntityId` back onto the fast
    /// queue and reset its status to `pending`. Called once at worker start.
    pub async fn recover_stuck_events(&self, agent_entity_id: &str) -> InboxResult<usize> {
        let rows = self.store.recover_stuck_events(agent_entity_id).await?;
        let count = rows.len();
        for row in rows {
            let event: InboxEvent =
                serde_json::from_str(&row.data_json).map_err(|e| InboxError::Decode(e.to_string()))?;
            self.left_push(agent_entity_id, serde_json::to_string(&event).map_err(|e| InboxError::Decode(e.to_string()))?);
        }
        if count > 0 {
            self.wake.notify(agent_entity_id);
        }
        Ok(count)
    }
}
