//! Request/response cycle
//!
//! One cycle runs entirely on the worker: capture state under the lock, build
//! and send the request outside it, hand the decoded response to the
//! demultiplexer, then reschedule. Failures are classified here and never leave
//! the worker as errors; an unrecoverable one is reported to the channel
//! manager instead.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};

use synclink_core::{
    ChannelError, HttpResponse, LongPollServerInfo, MultipartPostRequest, Result, ServerInfo,
};
use tracing::{debug, error, info, warn};

use crate::poller::ChannelCore;
use crate::state::{CycleContext, PollState};

/// How a cycle ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CycleOutcome {
    /// Channel was stopped before the cycle began
    Skipped,
    /// Server or adapters missing; channel settled to idle
    Misconfigured,
    Completed,
    /// Stopped mid-cycle; the exchange was aborted or never sent
    Cancelled,
    /// Exchange failed on its own; server reported to the manager
    Failed,
}

impl ChannelCore {
    pub(crate) fn execute_cycle(&self) -> CycleOutcome {
        let context = {
            let mut state = self.lock_state();
            state.task_posted = false;
            if state.stopped {
                debug!(channel_id = %self.id(), "channel stopped, skipping poll cycle");
                return CycleOutcome::Skipped;
            }

            match state.capture(self.id()) {
                Ok(context) => {
                    state.connection_in_progress = true;
                    state.cycle_seq += 1;
                    context
                }
                Err(err) => {
                    error!(channel_id = %self.id(), error = %err, "cannot run poll cycle");
                    state.stopped = true;
                    return CycleOutcome::Misconfigured;
                }
            }
        };

        let request = match guarded(|| self.prepare(&context)) {
            Ok(request) => request,
            Err(err) => return self.fail_cycle(&context, err),
        };

        // A stop that landed while the request was being built had no exchange to abort.
        {
            let mut state = self.lock_state();
            if state.stopped || state.abort_requests != context.abort_epoch {
                debug!(channel_id = %self.id(), "stop requested before send, dropping request");
                state.connection_in_progress = false;
                self.reschedule_if_running(&mut state);
                drop(state);
                self.notify_idle();
                return CycleOutcome::Cancelled;
            }
        }

        let response = match guarded(|| self.http.send_request(&request)) {
            Ok(response) => response,
            Err(err) => return self.fail_cycle(&context, err),
        };

        self.lock_state().connection_in_progress = false;
        let delivered = guarded(|| self.deliver(&context, &response));
        self.notify_idle();
        if let Err(err) = delivered {
            return self.fail_cycle(&context, err);
        }

        self.reschedule_if_running(&mut self.lock_state());
        CycleOutcome::Completed
    }

    fn prepare(&self, context: &CycleContext) -> Result<MultipartPostRequest> {
        let types = &self.config.supported_types;
        let body = context.multiplexer.compile_request(types)?;
        let request = context
            .processor
            .create_operation_request(context.server.url(), &body)?;

        debug!(
            channel_id = %self.id(),
            url = %context.server.url(),
            upstream = ?types.upstream(),
            bytes = body.len(),
            "sending poll request"
        );
        Ok(request)
    }

    fn deliver(&self, context: &CycleContext, response: &HttpResponse) -> Result<()> {
        let payload = context.processor.retrieve_operation_response(response)?;
        if payload.is_empty() {
            debug!(channel_id = %self.id(), "poll window elapsed without data");
            return Ok(());
        }

        debug!(channel_id = %self.id(), bytes = payload.len(), "processing poll response");
        context.demultiplexer.process_response(&payload)
    }

    fn fail_cycle(&self, context: &CycleContext, err: ChannelError) -> CycleOutcome {
        let server_failed = {
            let mut state = self.lock_state();
            state.connection_in_progress = false;

            let aborted = state.stopped || state.abort_requests != context.abort_epoch;
            if aborted {
                info!(channel_id = %self.id(), error = %err, "connection was aborted");
                self.reschedule_if_running(&mut state);
            } else {
                error!(
                    channel_id = %self.id(),
                    host = %context.server.host(),
                    port = context.server.port(),
                    error = %err,
                    kind = err.label(),
                    "connection failed"
                );
                state.stopped = true;
            }
            !aborted
        };

        self.notify_idle();
        if !server_failed {
            return CycleOutcome::Cancelled;
        }

        self.report_failure(&context.server);
        CycleOutcome::Failed
    }

    /// Queue the next cycle unless the channel is stopped or one is already queued
    fn reschedule_if_running(&self, state: &mut PollState) {
        if !state.stopped && !state.task_posted {
            if let Err(err) = self.post_task(state) {
                error!(channel_id = %self.id(), error = %err, "failed to schedule next poll");
            }
        }
    }

    fn report_failure(&self, server: &Arc<LongPollServerInfo>) {
        let Some(manager) = self.manager.as_ref().and_then(Weak::upgrade) else {
            warn!(channel_id = %self.id(), "no channel manager to report the failed server to");
            return;
        };

        let server = ServerInfo::HttpLongPoll(Arc::clone(server));
        if panic::catch_unwind(AssertUnwindSafe(|| manager.on_server_failed(server))).is_err() {
            error!(channel_id = %self.id(), "channel manager panicked handling server failure");
        }
    }
}

/// Run collaborator code, turning a panic into a cycle failure
fn guarded<T>(f: impl FnOnce() -> Result<T>) -> Result<T> {
    panic::catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|payload| {
        Err(ChannelError::data_error(format!(
            "poll cycle panicked: {}",
            panic_message(payload.as_ref())
        )))
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}
