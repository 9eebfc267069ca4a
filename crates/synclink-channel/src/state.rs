//! Poll state record
//!
//! Everything the channel mutates across threads lives in [`PollState`] and is
//! only touched while holding the channel lock.

use std::sync::Arc;

use synclink_core::{
    ConfigurationError, DataDemultiplexer, DataMultiplexer, HttpDataProcessor,
    LongPollServerInfo, Result,
};

use crate::worker::Worker;

// ----------------------------------------------------------------------------
// Poll Phase
// ----------------------------------------------------------------------------

/// Observable state of the poll state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollPhase {
    /// No cycle will be scheduled until the next start
    Idle,
    /// Polling; a cycle is posted or about to be
    Scheduled,
    /// A request is being built, sent or parsed
    InFlight,
    /// Stop requested while a request was still outstanding
    Stopping,
}

// ----------------------------------------------------------------------------
// Worker Slot
// ----------------------------------------------------------------------------

/// One-time worker initialization, guarded by the channel lock
pub(crate) enum WorkerSlot {
    /// Channel has never been started
    Unstarted,
    Running(Worker),
    /// Channel was shut down; the worker is gone for good
    Retired,
}

impl WorkerSlot {
    pub(crate) fn is_unstarted(&self) -> bool {
        matches!(self, WorkerSlot::Unstarted)
    }

    /// Whether the caller is running on this channel's worker thread
    pub(crate) fn is_worker_thread(&self) -> bool {
        match self {
            WorkerSlot::Running(worker) => worker.is_current(),
            _ => false,
        }
    }
}

// ----------------------------------------------------------------------------
// Cycle Context
// ----------------------------------------------------------------------------

/// Everything a cycle reads, captured under the lock when the cycle begins
pub(crate) struct CycleContext {
    pub(crate) server: Arc<LongPollServerInfo>,
    pub(crate) processor: HttpDataProcessor,
    pub(crate) multiplexer: Arc<dyn DataMultiplexer>,
    pub(crate) demultiplexer: Arc<dyn DataDemultiplexer>,
    /// Value of [`PollState::abort_requests`] at capture time
    pub(crate) abort_epoch: u64,
}

// ----------------------------------------------------------------------------
// Poll State
// ----------------------------------------------------------------------------

pub(crate) struct PollState {
    pub(crate) stopped: bool,
    pub(crate) connection_in_progress: bool,
    pub(crate) task_posted: bool,
    /// Number of times a stop asked the transport to abort an exchange
    pub(crate) abort_requests: u64,
    /// Number of cycles that have entered the in-progress phase
    pub(crate) cycle_seq: u64,
    pub(crate) worker: WorkerSlot,
    pub(crate) current_server: Option<Arc<LongPollServerInfo>>,
    pub(crate) processor: Option<HttpDataProcessor>,
    pub(crate) multiplexer: Option<Arc<dyn DataMultiplexer>>,
    pub(crate) demultiplexer: Option<Arc<dyn DataDemultiplexer>>,
}

impl PollState {
    pub(crate) fn new(
        multiplexer: Option<Arc<dyn DataMultiplexer>>,
        demultiplexer: Option<Arc<dyn DataDemultiplexer>>,
    ) -> Self {
        Self {
            stopped: true,
            connection_in_progress: false,
            task_posted: false,
            abort_requests: 0,
            cycle_seq: 0,
            worker: WorkerSlot::Unstarted,
            current_server: None,
            processor: None,
            multiplexer,
            demultiplexer,
        }
    }

    pub(crate) fn phase(&self) -> PollPhase {
        match (self.stopped, self.connection_in_progress) {
            (true, false) => PollPhase::Idle,
            (true, true) => PollPhase::Stopping,
            (false, true) => PollPhase::InFlight,
            (false, false) => PollPhase::Scheduled,
        }
    }

    /// Snapshot the server, crypto context and adapters for one cycle
    pub(crate) fn capture(&self, channel_id: &str) -> Result<CycleContext> {
        let (Some(server), Some(processor)) = (&self.current_server, &self.processor) else {
            return Err(ConfigurationError::MissingServer {
                channel_id: channel_id.into(),
            }
            .into());
        };
        let multiplexer =
            self.multiplexer
                .clone()
                .ok_or_else(|| ConfigurationError::MissingMultiplexer {
                    channel_id: channel_id.into(),
                })?;
        let demultiplexer =
            self.demultiplexer
                .clone()
                .ok_or_else(|| ConfigurationError::MissingDemultiplexer {
                    channel_id: channel_id.into(),
                })?;

        Ok(CycleContext {
            server: Arc::clone(server),
            processor: processor.clone(),
            multiplexer,
            demultiplexer,
            abort_epoch: self.abort_requests,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use synclink_core::{
        ChannelError, ClientKeyPair, EncoderDecoder, ServerPublicKey, SupportedTypes,
    };

    struct NullAdapter;

    impl DataMultiplexer for NullAdapter {
        fn compile_request(&self, _types: &SupportedTypes) -> Result<Vec<u8>> {
            Ok(Vec::new())
        }
    }

    impl DataDemultiplexer for NullAdapter {
        fn process_response(&self, _response: &[u8]) -> Result<()> {
            Ok(())
        }
    }

    fn bound_state() -> PollState {
        let mut state = PollState::new(Some(Arc::new(NullAdapter)), Some(Arc::new(NullAdapter)));
        let key = ServerPublicKey::new([9u8; 32]);
        let url = url::Url::parse("http://127.0.0.1:9999/lp").unwrap();
        state.current_server = Some(Arc::new(LongPollServerInfo::from_url(url, key).unwrap()));
        state.processor = Some(HttpDataProcessor::new(
            EncoderDecoder::new(&ClientKeyPair::generate(), key).unwrap(),
        ));
        state
    }

    #[test]
    fn test_initial_state_is_idle() {
        let state = PollState::new(None, None);
        assert_eq!(state.phase(), PollPhase::Idle);
        assert!(state.worker.is_unstarted());
        assert!(!state.worker.is_worker_thread());
        assert!(!state.task_posted);
    }

    #[test]
    fn test_phase_mapping() {
        let mut state = PollState::new(None, None);
        state.stopped = false;
        assert_eq!(state.phase(), PollPhase::Scheduled);
        state.connection_in_progress = true;
        assert_eq!(state.phase(), PollPhase::InFlight);
        state.stopped = true;
        assert_eq!(state.phase(), PollPhase::Stopping);
        state.connection_in_progress = false;
        assert_eq!(state.phase(), PollPhase::Idle);
    }

    #[test]
    fn test_capture_requires_server_and_adapters() {
        let state = PollState::new(None, None);
        assert!(matches!(
            state.capture("lp"),
            Err(ChannelError::Configuration(ConfigurationError::MissingServer { .. }))
        ));

        let mut state = bound_state();
        state.demultiplexer = None;
        assert!(matches!(
            state.capture("lp"),
            Err(ChannelError::Configuration(ConfigurationError::MissingDemultiplexer { .. }))
        ));

        state.multiplexer = None;
        assert!(matches!(
            state.capture("lp"),
            Err(ChannelError::Configuration(ConfigurationError::MissingMultiplexer { .. }))
        ));
    }

    #[test]
    fn test_capture_snapshots_abort_epoch() {
        let mut state = bound_state();
        state.abort_requests = 3;
        let context = state.capture("lp").unwrap();
        assert_eq!(context.abort_epoch, 3);
        assert_eq!(context.server.port(), 9999);
    }
}
