//! Poll scheduler
//!
//! [`ChannelCore`] owns the single lock and condition variable of a channel and
//! implements the start/stop transitions. The lock is never held across a
//! network call and is released while waiting for an in-flight cycle.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use synclink_core::{
    ChannelManager, ClientKeyPair, ConfigurationError, HttpClient, LongPollConfig, Result,
};
use tracing::{debug, info};

use crate::state::{PollPhase, PollState, WorkerSlot};
use crate::worker::{Job, Worker};

pub(crate) struct ChannelCore {
    pub(crate) config: LongPollConfig,
    pub(crate) keys: ClientKeyPair,
    pub(crate) http: Arc<dyn HttpClient>,
    pub(crate) manager: Option<Weak<dyn ChannelManager>>,
    state: Mutex<PollState>,
    /// Signalled whenever `connection_in_progress` drops to false
    idle: Condvar,
}

impl ChannelCore {
    pub(crate) fn new(
        config: LongPollConfig,
        keys: ClientKeyPair,
        http: Arc<dyn HttpClient>,
        manager: Option<Weak<dyn ChannelManager>>,
        state: PollState,
    ) -> Self {
        Self {
            config,
            keys,
            http,
            manager,
            state: Mutex::new(state),
            idle: Condvar::new(),
        }
    }

    pub(crate) fn id(&self) -> &str {
        &self.config.channel_id
    }

    /// Lock the poll state; a panic elsewhere never wedges the channel
    pub(crate) fn lock_state(&self) -> MutexGuard<'_, PollState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn notify_idle(&self) {
        self.idle.notify_all();
    }

    pub(crate) fn phase(&self) -> PollPhase {
        self.lock_state().phase()
    }

    // ------------------------------------------------------------------------
    // Start / Stop
    // ------------------------------------------------------------------------

    pub(crate) fn start(self: &Arc<Self>) -> Result<()> {
        info!(channel_id = %self.id(), "starting poll scheduler");

        let mut state = self.lock_state();
        if state.worker.is_unstarted() {
            info!(channel_id = %self.id(), "first start, creating poll worker");
            let core = Arc::downgrade(self);
            let worker = Worker::spawn(&self.config.worker_thread_name, move || {
                if let Some(core) = core.upgrade() {
                    let outcome = core.execute_cycle();
                    debug!(channel_id = %core.id(), ?outcome, "poll cycle finished");
                }
            })
            .map_err(|err| ConfigurationError::WorkerUnavailable {
                channel_id: self.id().into(),
                reason: err.to_string(),
            })?;
            state.worker = WorkerSlot::Running(worker);
        }

        if !state.stopped {
            info!(channel_id = %self.id(), "poll scheduler is already started");
            return Ok(());
        }

        state.stopped = false;
        // An in-flight cycle reschedules itself when it completes.
        if !state.task_posted && !state.connection_in_progress {
            self.post_task(&mut state)?;
        }
        info!(channel_id = %self.id(), "poll scheduler started");
        Ok(())
    }

    /// Stop scheduling cycles and wait out the one in flight, if any
    pub(crate) fn stop(&self) {
        info!(channel_id = %self.id(), "stopping poll scheduler");

        let mut state = self.lock_state();
        if !state.stopped {
            state.stopped = true;
            if state.connection_in_progress {
                state.abort_requests += 1;
                self.http.close_connection();
            }
        }

        if !state.connection_in_progress {
            return;
        }

        if state.worker.is_worker_thread() {
            debug!(channel_id = %self.id(), "stop requested from poll worker, not waiting");
            return;
        }

        // Wait for this cycle only; a restart may already have begun the next one.
        debug!(channel_id = %self.id(), "waiting for in-flight poll to finish");
        let cycle = state.cycle_seq;
        let retry = Duration::from_millis(self.config.abort_retry_ms.max(1));
        while state.connection_in_progress && state.cycle_seq == cycle {
            let (next, wait) = self
                .idle
                .wait_timeout(state, retry)
                .unwrap_or_else(PoisonError::into_inner);
            state = next;
            if wait.timed_out() && state.connection_in_progress && state.cycle_seq == cycle {
                debug!(channel_id = %self.id(), "in-flight poll still running, repeating abort");
                self.http.close_connection();
            }
        }
        info!(channel_id = %self.id(), "poll scheduler stopped");
    }

    /// Queue the next cycle on the worker; caller holds the lock
    pub(crate) fn post_task(&self, state: &mut PollState) -> Result<()> {
        if let WorkerSlot::Running(worker) = &state.worker {
            if worker.post(Job::Poll) {
                state.task_posted = true;
                return Ok(());
            }
        }

        state.stopped = true;
        Err(ConfigurationError::WorkerUnavailable {
            channel_id: self.id().into(),
            reason: "poll worker is not running".into(),
        }
        .into())
    }

    /// Stop for good and release the worker
    pub(crate) fn shutdown(&self) {
        self.stop();

        let worker = std::mem::replace(&mut self.lock_state().worker, WorkerSlot::Retired);
        if let WorkerSlot::Running(worker) = worker {
            info!(channel_id = %self.id(), "shutting down poll worker");
            worker.shutdown(self.config.join_worker_on_drop);
        }
    }
}
