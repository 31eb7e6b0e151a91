//! Ticket registry and scheduler for long-running actions.

use std::collections::HashSet;
use std::future::pending;
use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeDelta, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::{Semaphore, watch};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use bimhub_core::config::WorkerConfig;
use bimhub_core::error::AppError;
use bimhub_core::result::AppResult;
use bimhub_core::types::id::Ticket;
use bimhub_entity::action::LongActionState;

use crate::action::LongAction;

#[derive(Debug)]
struct TrackedAction<A: ?Sized> {
    action: Arc<A>,
    caller_id: String,
    done: Arc<watch::Sender<bool>>,
}

#[derive(Debug)]
struct Shared<A: ?Sized> {
    actions: DashMap<Ticket, TrackedAction<A>>,
    in_flight: DashMap<String, Ticket>,
    semaphore: Arc<Semaphore>,
    config: WorkerConfig,
    shutdown: CancellationToken,
    tasks: TaskTracker,
}

/// Hands out tickets for submitted actions and runs them in the background.
///
/// Equal submissions (same [`LongAction::dedup_key`]) share one ticket
/// while the first is still running. At most `worker.concurrency` actions
/// execute at once; the rest wait as NOT_STARTED. Terminal actions stay
/// pollable for `worker.retention_seconds`.
#[derive(Debug)]
pub struct LongActionManager<A: LongAction + ?Sized = dyn LongAction> {
    shared: Arc<Shared<A>>,
}

impl<A: LongAction + ?Sized> Clone for LongActionManager<A> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<A: LongAction + ?Sized> LongActionManager<A> {
    /// Create a manager.
    pub fn new(config: WorkerConfig) -> Self {
        let permits = config.concurrency.max(1);
        Self {
            shared: Arc::new(Shared {
                actions: DashMap::new(),
                in_flight: DashMap::new(),
                semaphore: Arc::new(Semaphore::new(permits)),
                config,
                shutdown: CancellationToken::new(),
                tasks: TaskTracker::new(),
            }),
        }
    }

    /// Submit an action and return its ticket without waiting for it.
    ///
    /// If an equal action is still NOT_STARTED or STARTED, its ticket is
    /// returned and `action` is dropped unrun.
    pub fn submit(&self, action: Arc<A>, caller_id: impl Into<String>) -> AppResult<Ticket> {
        if self.shared.shutdown.is_cancelled() {
            return Err(AppError::service_unavailable(
                "Action manager is shutting down",
            ));
        }
        let caller_id = caller_id.into();
        let dedup_key = action.dedup_key();
        let ticket = Ticket::new();
        let done = Arc::new(watch::Sender::new(false));
        let tracked = TrackedAction {
            action: Arc::clone(&action),
            caller_id: caller_id.clone(),
            done: Arc::clone(&done),
        };

        // Lock order: `in_flight` before `actions`.
        match self.shared.in_flight.entry(dedup_key.clone()) {
            Entry::Occupied(mut entry) => {
                let existing = *entry.get();
                let running = self
                    .shared
                    .actions
                    .get(&existing)
                    .is_some_and(|t| !t.action.state().state.is_terminal());
                if running {
                    debug!(ticket = %existing, caller_id, "Reusing in-flight action");
                    return Ok(existing);
                }
                self.shared.actions.insert(ticket, tracked);
                entry.insert(ticket);
            }
            Entry::Vacant(entry) => {
                self.shared.actions.insert(ticket, tracked);
                entry.insert(ticket);
            }
        }
        info!(
            ticket = %ticket,
            caller_id,
            description = action.description(),
            "Action submitted"
        );

        let shared = Arc::clone(&self.shared);
        self.shared.tasks.spawn(async move {
            drive(&shared, ticket, action).await;
            shared.in_flight.remove_if(&dedup_key, |_, t| *t == ticket);
            done.send_replace(true);
        });
        Ok(ticket)
    }

    fn tracked(&self, ticket: Ticket) -> AppResult<(Arc<A>, Arc<watch::Sender<bool>>)> {
        self.shared
            .actions
            .get(&ticket)
            .map(|t| (Arc::clone(&t.action), Arc::clone(&t.done)))
            .ok_or_else(|| AppError::not_found(format!("Ticket {ticket} not found")))
    }

    /// The action behind a ticket.
    pub fn get(&self, ticket: Ticket) -> AppResult<Arc<A>> {
        self.tracked(ticket).map(|(action, _)| action)
    }

    /// A snapshot of the action's state.
    pub fn state(&self, ticket: Ticket) -> AppResult<LongActionState> {
        Ok(self.get(ticket)?.state())
    }

    /// Request cancellation. Returns `false` if the action already ended.
    pub fn cancel(&self, ticket: Ticket) -> AppResult<bool> {
        let cancelled = self.get(ticket)?.cancel();
        info!(ticket = %ticket, cancelled, "Cancel requested");
        Ok(cancelled)
    }

    /// Wait until the background task for `ticket` has finished.
    pub async fn wait(&self, ticket: Ticket) -> AppResult<LongActionState> {
        let (action, done) = self.tracked(ticket)?;
        let mut rx = done.subscribe();
        drop(done);
        // A dropped sender means the entry was reaped, so the task is over.
        let _ = rx.wait_for(|finished| *finished).await;
        Ok(action.state())
    }

    /// Tickets submitted by a caller.
    pub fn tickets_for(&self, caller_id: &str) -> Vec<Ticket> {
        let mut tickets: Vec<Ticket> = self
            .shared
            .actions
            .iter()
            .filter(|entry| entry.caller_id == caller_id)
            .map(|entry| *entry.key())
            .collect();
        tickets.sort_by_key(|t| t.0);
        tickets
    }

    /// Number of tracked actions, terminal ones included.
    pub fn len(&self) -> usize {
        self.shared.actions.len()
    }

    /// Whether no actions are tracked.
    pub fn is_empty(&self) -> bool {
        self.shared.actions.is_empty()
    }

    /// Number of actions not yet in a terminal state.
    pub fn active(&self) -> usize {
        self.shared
            .actions
            .iter()
            .filter(|entry| !entry.action.state().state.is_terminal())
            .count()
    }

    /// Drop terminal actions that finished more than `retention_seconds` ago.
    pub fn reap_expired(&self) -> usize {
        let retention = i64::try_from(self.shared.config.retention_seconds)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .unwrap_or(TimeDelta::MAX);
        let cutoff = Utc::now().checked_sub_signed(retention);
        let in_flight: HashSet<Ticket> = self.shared.in_flight.iter().map(|e| *e.value()).collect();
        let mut reaped = 0;
        self.shared.actions.retain(|ticket, tracked| {
            if in_flight.contains(ticket) {
                return true;
            }
            let state = tracked.action.state();
            let expired = state.state.is_terminal()
                && matches!((state.finished_at, cutoff), (Some(at), Some(cutoff)) if at <= cutoff);
            if expired {
                reaped += 1;
            }
            !expired
        });
        if reaped > 0 {
            debug!(reaped, remaining = self.len(), "Reaped expired actions");
        }
        reaped
    }

    /// Periodically reap expired actions until shutdown.
    pub fn start_reaper(&self) {
        let manager = self.clone();
        let interval = Duration::from_secs(self.shared.config.reaper_interval_seconds.max(1));
        self.shared.tasks.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = manager.shared.shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        manager.reap_expired();
                    }
                }
            }
            debug!("Reaper stopped");
        });
    }

    /// Stop accepting submissions and wait for running actions.
    ///
    /// Actions still running after `grace` are cancelled. Queued actions
    /// that never got a slot are cancelled right away.
    pub async fn shutdown(&self, grace: Duration) {
        info!(active = self.active(), "Action manager shutting down");
        self.shared.shutdown.cancel();
        self.shared.tasks.close();
        if tokio::time::timeout(grace, self.shared.tasks.wait())
            .await
            .is_err()
        {
            warn!(
                active = self.active(),
                "Grace period elapsed, cancelling running actions"
            );
            for entry in self.shared.actions.iter() {
                entry.action.cancel();
            }
            self.shared.tasks.wait().await;
        }
        info!("Action manager shut down complete");
    }
}

/// Run one action: wait for a slot, init, execute, bounded by the timeout.
async fn drive<A: LongAction + ?Sized>(shared: &Shared<A>, ticket: Ticket, action: Arc<A>) {
    let permit = tokio::select! {
        biased;
        _ = shared.shutdown.cancelled() => None,
        permit = Arc::clone(&shared.semaphore).acquire_owned() => permit.ok(),
    };
    let Some(_permit) = permit else {
        action.cancel();
        debug!(ticket = %ticket, "Action dropped before it got a slot");
        return;
    };
    if action.state().state.is_terminal() {
        debug!(ticket = %ticket, "Action ended before it started");
        return;
    }

    let timeout = Duration::from_secs(shared.config.action_timeout_seconds);
    let deadline = async {
        if timeout.is_zero() {
            pending::<()>().await;
        } else {
            tokio::time::sleep(timeout).await;
        }
    };
    let run = async {
        match action.init().await {
            Ok(()) => action.execute().await,
            Err(e) => {
                warn!(ticket = %ticket, error = %e, "Action init failed");
                action.fail(e).await;
            }
        }
    };
    tokio::pin!(run);
    tokio::select! {
        _ = &mut run => {}
        _ = deadline => {
            action.time_out();
            run.await;
        }
    }

    let state = action.state();
    info!(
        ticket = %ticket,
        state = %state.state,
        cancelled = state.cancelled,
        "Action completed"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use bimhub_core::error::ErrorKind;
    use bimhub_entity::action::ActionState;

    #[derive(Debug)]
    struct SleepAction {
        key: String,
        work: Duration,
        fail_init: bool,
        cancel: CancellationToken,
        state: Mutex<LongActionState>,
        executions: AtomicUsize,
    }

    impl SleepAction {
        fn new(key: &str, work: Duration) -> Arc<Self> {
            Self::build(key, work, false)
        }

        fn build(key: &str, work: Duration, fail_init: bool) -> Arc<Self> {
            Arc::new(Self {
                key: key.to_string(),
                work,
                fail_init,
                cancel: CancellationToken::new(),
                state: Mutex::new(LongActionState::not_started("Sleep")),
                executions: AtomicUsize::new(0),
            })
        }

        fn finish(&self, state: ActionState, cancelled: bool) {
            let mut s = self.state.lock().unwrap();
            if s.state.is_terminal() {
                return;
            }
            s.state = state;
            s.cancelled = cancelled;
            s.progress = 100;
            s.finished_at = Some(Utc::now());
        }
    }

    #[async_trait]
    impl LongAction for SleepAction {
        fn description(&self) -> &str {
            "Sleep"
        }

        fn dedup_key(&self) -> String {
            self.key.clone()
        }

        async fn init(&self) -> AppResult<()> {
            if self.fail_init {
                return Err(AppError::database("no session"));
            }
            Ok(())
        }

        async fn execute(&self) {
            self.executions.fetch_add(1, Ordering::SeqCst);
            self.state.lock().unwrap().state = ActionState::Started;
            tokio::select! {
                _ = self.cancel.cancelled() => self.finish(ActionState::Finished, true),
                _ = tokio::time::sleep(self.work) => self.finish(ActionState::Finished, false),
            }
        }

        async fn fail(&self, error: AppError) {
            self.state.lock().unwrap().errors.push(error.to_string());
            self.finish(ActionState::Failed, false);
        }

        fn state(&self) -> LongActionState {
            self.state.lock().unwrap().clone()
        }

        fn cancel(&self) -> bool {
            let not_started = {
                let s = self.state.lock().unwrap();
                if s.state.is_terminal() {
                    return false;
                }
                s.state == ActionState::NotStarted
            };
            self.cancel.cancel();
            if not_started {
                self.finish(ActionState::Finished, true);
            }
            true
        }

        fn time_out(&self) -> bool {
            self.cancel()
        }
    }

    fn config(concurrency: usize, timeout: u64) -> WorkerConfig {
        WorkerConfig {
            concurrency,
            action_timeout_seconds: timeout,
            retention_seconds: 0,
            ..WorkerConfig::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_equal_submissions_share_a_ticket() {
        let manager = LongActionManager::<SleepAction>::new(config(2, 0));
        let first = SleepAction::new("same", Duration::from_secs(5));
        let second = SleepAction::new("same", Duration::from_secs(5));

        let a = manager.submit(Arc::clone(&first), "alice").unwrap();
        let b = manager.submit(Arc::clone(&second), "bob").unwrap();
        assert_eq!(a, b);
        assert_eq!(manager.len(), 1);

        manager.wait(a).await.unwrap();
        assert_eq!(first.executions.load(Ordering::SeqCst), 1);
        assert_eq!(second.executions.load(Ordering::SeqCst), 0);

        let c = manager.submit(second, "bob").unwrap();
        assert_ne!(a, c);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_limit_queues_actions() {
        let manager = LongActionManager::<SleepAction>::new(config(1, 0));
        let a = manager
            .submit(SleepAction::new("a", Duration::from_secs(10)), "c")
            .unwrap();
        let b = manager
            .submit(SleepAction::new("b", Duration::from_secs(10)), "c")
            .unwrap();

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(manager.state(a).unwrap().state, ActionState::Started);
        assert_eq!(manager.state(b).unwrap().state, ActionState::NotStarted);

        manager.wait(b).await.unwrap();
        assert_eq!(manager.active(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_cancels_action() {
        let manager = LongActionManager::<SleepAction>::new(config(1, 2));
        let ticket = manager
            .submit(SleepAction::new("slow", Duration::from_secs(60)), "c")
            .unwrap();
        let state = manager.wait(ticket).await.unwrap();
        assert_eq!(state.state, ActionState::Finished);
        assert!(state.cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_init_failure_fails_action() {
        let manager = LongActionManager::<SleepAction>::new(config(1, 0));
        let action = SleepAction::build("broken", Duration::ZERO, true);
        let ticket = manager.submit(Arc::clone(&action), "c").unwrap();
        let state = manager.wait(ticket).await.unwrap();
        assert_eq!(state.state, ActionState::Failed);
        assert_eq!(action.executions.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_and_unknown_tickets() {
        let manager = LongActionManager::<SleepAction>::new(config(1, 0));
        let ticket = manager
            .submit(SleepAction::new("a", Duration::from_secs(60)), "c")
            .unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(manager.cancel(ticket).unwrap());
        let state = manager.wait(ticket).await.unwrap();
        assert!(state.cancelled);
        assert!(!manager.cancel(ticket).unwrap());

        let unknown = Ticket::new();
        assert_eq!(manager.state(unknown).unwrap_err().kind, ErrorKind::NotFound);
        assert_eq!(manager.cancel(unknown).unwrap_err().kind, ErrorKind::NotFound);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reap_and_tickets_for() {
        let manager = LongActionManager::<SleepAction>::new(config(2, 0));
        let a = manager
            .submit(SleepAction::new("a", Duration::from_secs(1)), "alice")
            .unwrap();
        let b = manager
            .submit(SleepAction::new("b", Duration::from_secs(1)), "bob")
            .unwrap();
        assert_eq!(manager.tickets_for("alice"), vec![a]);

        manager.wait(a).await.unwrap();
        manager.wait(b).await.unwrap();
        assert_eq!(manager.reap_expired(), 2);
        assert!(manager.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_rejects_submissions() {
        let manager = LongActionManager::<SleepAction>::new(config(1, 0));
        let running = manager
            .submit(SleepAction::new("a", Duration::from_secs(60)), "c")
            .unwrap();
        let queued = manager
            .submit(SleepAction::new("b", Duration::from_secs(60)), "c")
            .unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        manager.shutdown(Duration::from_secs(1)).await;
        assert!(manager.state(running).unwrap().cancelled);
        assert!(manager.state(queued).unwrap().cancelled);

        let err = manager
            .submit(SleepAction::new("c", Duration::ZERO), "c")
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::ServiceUnavailable);
    }
}
