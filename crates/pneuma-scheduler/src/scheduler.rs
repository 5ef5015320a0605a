// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! The Plan Scheduler (C6, spec §4.6).
//!
//! Backed by [`pneuma_broker::DelayQueue`] keyed by `planId`: a one-shot
//! delayed job for `scheduled_at`/`run_after` plans, re-armed after every
//! firing for recurring `cron` plans. Cancellation (`dequeuePlan`) is a
//! tombstone set rather than a true removal from the heap, since the queue
//! has no by-key delete — a cancelled id popped off the queue is dropped
//! silently instead of firing.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::{Duration as StdDuration, Instant};

use chrono::Utc;
use pneuma_broker::DelayQueue;
use pneuma_inbox::{Inbox, PlanData};
use pneuma_runtime::{Backoff, CancelToken};
use pneuma_store::{PlanRow, Store};
use tracing::{info, warn};

use crate::cron_util::next_fire_after;
use crate::error::{SchedulerError, SchedulerResult};

const REMOVE_ON_FAIL: u32 = 5;

pub struct Scheduler {
    store: Store,
    inbox: Arc<Inbox>,
    queue: DelayQueue<String>,
    cancelled: Mutex<HashSet<String>>,
}

impl Scheduler {
    pub fn new(store: Store, inbox: Arc<Inbox>) -> Self {
        Self {
            store,
            inbox,
            queue: DelayQueue::new(),
            cancelled: Mutex::new(HashSet::new()),
        }
    }

    /// Register a plan's firing per spec §4.6 `enqueuePlan`.
    pub fn enqueue_plan(&self, plan: &PlanRow) -> SchedulerResult<()> {
        self.cancelled.lock().expect("scheduler cancel-set mutex poisoned").remove(&plan.plan_id);

        if plan.is_recurring {
            let cron_expr = plan
                .cron
                .as_deref()
                .ok_or_else(|| SchedulerError::NoSchedule(plan.plan_id.clone()))?;
            let next = next_fire_after(cron_expr, Utc::now())?;
            self.queue.push(instant_from_delay(next), plan.plan_id.clone());
            return Ok(());
        }

        let next_run_at = plan
            .next_run_at
            .as_deref()
            .ok_or_else(|| SchedulerError::NoSchedule(plan.plan_id.clone()))?;
        let next_run_at = chrono::DateTime::parse_from_rfc3339(next_run_at)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());
        self.queue.push(instant_from_delay(next_run_at), plan.plan_id.clone());
        Ok(())
    }

    /// spec §4.6 `dequeuePlan` — tombstones the id so a pending firing is
    /// dropped instead of executed.
    pub fn dequeue_plan(&self, plan_id: &str) {
        self.cancelled.lock().expect("scheduler cancel-set mutex poisoned").insert(plan_id.to_string());
    }

    fn is_cancelled(&self, plan_id: &str) -> bool {
        self.cancelled.lock().expect("scheduler cancel-set mutex poisoned").remove(plan_id)
    }

    /// spec §4.6 `onJobFire`.
    pub async fn on_job_fire(&self, plan_id: &str) -> SchedulerResult<()> {
        let plan = match self.store.get_plan(plan_id).await {
            Ok(plan) => plan,
            Err(pneuma_store::StoreError::NotFound(_)) => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        if plan.status != "pending" {
            return Ok(());
        }

        self.inbox
            .push_plan_event(
                &plan.agent_entity_id,
                PlanData {
                    plan_id: plan.plan_id.clone(),
                    plan_name: plan.name.clone(),
                    instruction: plan.instruction.clone(),
                },
            )
            .await?;

        if plan.is_recurring {
            let cron_expr = plan.cron.as_deref().ok_or_else(|| SchedulerError::NoSchedule(plan.plan_id.clone()))?;
            let now = Utc::now();
            let next = next_fire_after(cron_expr, now)?;
            self.store
                .update_plan_fired(&plan.plan_id, &now.to_rfc3339(), Some(&next.to_rfc3339()))
                .await?;
            self.queue.push(instant_from_delay(next), plan.plan_id.clone());
        } else {
            self.store.complete_plan(&plan.plan_id).await?;
        }
        Ok(())
    }

    /// spec §4.6 `reconcileOnStartup`.
    pub async fn reconcile_on_startup(&self) -> SchedulerResult<()> {
        let pending = self.store.list_pending_plans().await?;
        let now = Utc::now();
        for plan in pending {
            if plan.is_recurring && plan.next_run_at.is_none() {
                let cron_expr = plan.cron.as_deref().ok_or_else(|| SchedulerError::NoSchedule(plan.plan_id.clone()))?;
                let next = next_fire_after(cron_expr, now)?;
                self.store
                    .update_plan_fired(&plan.plan_id, plan.last_run_at.as_deref().unwrap_or(&now.to_rfc3339()), Some(&next.to_rfc3339()))
                    .await?;
                self.queue.push(instant_from_delay(next), plan.plan_id.clone());
                continue;
            }

            if !plan.is_recurring {
                if let Some(next_run_at) = &plan.next_run_at {
                    let parsed = chrono::DateTime::parse_from_rfc3339(next_run_at).map(|dt| dt.with_timezone(&Utc));
                    if matches!(parsed, Ok(t) if t <= now) {
                        self.store.complete_plan(&plan.plan_id).await?;
                        continue;
                    }
                }
            }

            self.enqueue_plan(&plan)?;
        }
        Ok(())
    }

    /// Drive the queue until `cancel` trips: pop the next due plan id, skip
    /// it if tombstoned, otherwise fire it with capped retry.
    pub async fn run(&self, cancel: CancelToken) {
        loop {
            let plan_id = tokio::select! {
                _ = cancel.cancelled() => return,
                id = self.queue.pop() => id,
            };

            if self.is_cancelled(&plan_id) {
                info!(plan_id, "skipping firing for cancelled plan");
                continue;
            }

            let mut backoff = Backoff::new(StdDuration::from_millis(200), StdDuration::from_secs(5));
            let mut attempt = 0u32;
            loop {
                match self.on_job_fire(&plan_id).await {
                    Ok(()) => break,
                    Err(e) => {
                        attempt += 1;
                        if attempt >= REMOVE_ON_FAIL {
                            warn!(plan_id, error = %e, attempt, "plan firing permanently failed, giving up");
                            break;
                        }
                        warn!(plan_id, error = %e, attempt, "plan firing failed, retrying");
                        tokio::time::sleep(backoff.next()).await;
                    }
                }
            }
        }
    }
}

fn instant_from_delay(fire_at: chrono::DateTime<Utc>) -> Instant {
    let delay_ms = (fire_at - Utc::now()).num_milliseconds().max(0) as u64;
    Instant::now() + StdDuration::from_millis(delay_ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one_shot_plan(id: &str, agent: &str, delay: StdDuration) -> PlanRow {
        PlanRow {
            plan_id: id.into(),
            agent_entity_id: agent.into(),
            name: "heartbeat".into(),
            instruction: "check in".into(),
            run_after_secs: None,
            scheduled_at: None,
            cron: None,
            next_run_at: Some((Utc::now() + chrono::Duration::from_std(delay).unwrap()).to_rfc3339()),
            last_run_at: None,
            status: "pending".into(),
            is_recurring: false,
        }
    }

    #[tokio::test]
    async fn on_job_fire_completes_a_one_shot_plan_and_pushes_inbox_event() {
        let store = Store::open_in_memory().unwrap();
        let inbox = Arc::new(Inbox::new(store.clone()));
        let plan = one_shot_plan("p1", "a1", StdDuration::from_millis(0));
        store.upsert_plan(plan.clone()).await.unwrap();

        let scheduler = Scheduler::new(store.clone(), inbox.clone());
        scheduler.on_job_fire("p1").await.unwrap();

        let updated = store.get_plan("p1").await.unwrap();
        assert_eq!(updated.status, "completed");
        assert_eq!(inbox.inbox_size("a1"), 1);
    }

    #[tokio::test]
    async fn on_job_fire_reschedules_recurring_plan() {
        let store = Store::open_in_memory().unwrap();
        let inbox = Arc::new(Inbox::new(store.clone()));
        let mut plan = one_shot_plan("p1", "a1", StdDuration::from_millis(0));
        plan.is_recurring = true;
        plan.cron = Some("0 * * * * *".into());
        plan.next_run_at = None;
        store.upsert_plan(plan).await.unwrap();

        let scheduler = Scheduler::new(store.clone(), inbox);
        scheduler.on_job_fire("p1").await.unwrap();

        let updated = store.get_plan("p1").await.unwrap();
        assert_eq!(updated.status, "pending");
        assert!(updated.next_run_at.is_some());
        assert!(updated.last_run_at.is_some());
    }

    #[tokio::test]
    async fn on_job_fire_is_a_no_op_for_missing_plan() {
        let store = Store::open_in_memory().unwrap();
        let inbox = Arc::new(Inbox::new(store.clone()));
        let scheduler = Scheduler::new(store, inbox);
        scheduler.on_job_fire("does-not-exist").await.unwrap();
    }

    #[tokio::test]
    async fn on_job_fire_is_a_no_op_for_already_completed_plan() {
        let store = Store::open_in_memory().unwrap();
        let inbox = Arc::new(Inbox::new(store.clone()));
        let plan = one_shot_plan("p1", "a1", StdDuration::from_millis(0));
        store.upsert_plan(plan).await.unwrap();
        store.complete_plan("p1").await.unwrap();

        let scheduler = Scheduler::new(store.clone(), inbox.clone());
        scheduler.on_job_fire("p1").await.unwrap();
        assert_eq!(inbox.inbox_size("a1"), 0);
    }

    #[tokio::test]
    async fn dequeue_plan_causes_run_loop_to_skip_firing() {
        let store = Store::open_in_memory().unwrap();
        let inbox = Arc::new(Inbox::new(store.clone()));
        let plan = one_shot_plan("p1", "a1", StdDuration::from_millis(0));
        store.upsert_plan(plan.clone()).await.unwrap();

        let scheduler = Arc::new(Scheduler::new(store.clone(), inbox.clone()));
        scheduler.enqueue_plan(&plan).unwrap();
        scheduler.dequeue_plan("p1");

        let source = pneuma_runtime::shutdown::CancelTokenSource::new();
        let token = source.token();
        let sched2 = scheduler.clone();
        let handle = tokio::spawn(async move { sched2.run(token).await });

        tokio::time::sleep(StdDuration::from_millis(50)).await;
        source.cancel();
        handle.await.unwrap();

        // The plan row itself is untouched — only the scheduled firing was dropped.
        let reloaded = store.get_plan("p1").await.unwrap();
        assert_eq!(reloaded.status, "pending");
        assert_eq!(inbox.inbox_size("a1"), 0);
    }

    #[tokio::test]
    async fn reconcile_on_startup_completes_past_due_one_shot_plans() {
        let store = Store::open_in_memory().unwrap();
        let inbox = Arc::new(Inbox::new(store.clone()));
        let mut plan = one_shot_plan("p1", "a1", StdDuration::from_millis(0));
        plan.next_run_at = Some((Utc::now() - chrono::Duration::seconds(10)).to_rfc3339());
        store.upsert_plan(plan).await.unwrap();

        let scheduler = Scheduler::new(store.clone(), inbox);
        scheduler.reconcile_on_startup().await.unwrap();

        let reloaded = store.get_plan("p1").await.unwrap();
        assert_eq!(reloaded.status, "completed");
    }

    #[tokio::test]
    async fn reconcile_on_startup_computes_next_run_at_for_recurring_plan_missing_one() {
        let store = Store::open_in_memory().unwrap();
        let inbox = Arc::new(Inbox::new(store.clone()));
        let mut plan = one_shot_plan("p1", "a1", StdDuration::from_millis(0));
        plan.is_recurring = true;
        plan.cron = Some("0 * * * * *".into());
        plan.next_run_at = None;
        store.upsert_plan(plan).await.unwrap();

        let scheduler = Scheduler::new(store.clone(), inbox);
        scheduler.reconcile_on_startup().await.unwrap();

        let reloaded = store.get_plan("p1").await.unwrap();
        assert!(reloaded.next_run_at.is_some());
    }
}
