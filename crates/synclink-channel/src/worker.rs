//! Background worker of a long-poll channel
//!
//! One named thread per channel, fed by a FIFO job queue. Jobs run strictly one
//! after another, so at most one request cycle is ever executing.

use std::io;
use std::sync::mpsc;
use std::thread::{self, JoinHandle};

use tracing::{debug, info, warn};

/// Unit of work handed to the worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Job {
    /// Run one request/response cycle
    Poll,
    /// Exit the worker loop
    Shutdown,
}

pub(crate) struct Worker {
    sender: mpsc::Sender<Job>,
    handle: JoinHandle<()>,
}

impl Worker {
    /// Spawn the worker thread; `run_cycle` is invoked for every posted poll job
    pub(crate) fn spawn<F>(name: &str, run_cycle: F) -> io::Result<Self>
    where
        F: Fn() + Send + 'static,
    {
        let (sender, receiver) = mpsc::channel::<Job>();

        let handle = thread::Builder::new().name(name.into()).spawn(move || {
            info!("poll worker started");
            for job in receiver {
                match job {
                    Job::Poll => run_cycle(),
                    Job::Shutdown => break,
                }
            }
            info!("poll worker exiting");
        })?;

        Ok(Self { sender, handle })
    }

    /// Queue a job; false if the worker is gone
    pub(crate) fn post(&self, job: Job) -> bool {
        self.sender.send(job).is_ok()
    }

    pub(crate) fn is_current(&self) -> bool {
        thread::current().id() == self.handle.thread().id()
    }

    /// Ask the worker to exit after the jobs already queued
    ///
    /// Never joins when called from the worker thread itself.
    pub(crate) fn shutdown(self, join: bool) {
        let _ = self.sender.send(Job::Shutdown);

        if !join || self.is_current() {
            debug!("detaching poll worker");
            return;
        }

        if self.handle.join().is_err() {
            warn!("poll worker panicked before shutdown");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_jobs_run_in_post_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let counter = Arc::new(Mutex::new(0u32));

        let worker = {
            let log = Arc::clone(&log);
            let counter = Arc::clone(&counter);
            Worker::spawn("worker-order-test", move || {
                let mut count = counter.lock().unwrap();
                *count += 1;
                log.lock().unwrap().push(*count);
            })
            .unwrap()
        };

        for _ in 0..5 {
            assert!(worker.post(Job::Poll));
        }
        worker.shutdown(true);

        assert_eq!(*log.lock().unwrap(), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_post_after_shutdown_fails() {
        let worker = Worker::spawn("worker-shutdown-test", || {}).unwrap();
        assert!(!worker.is_current());

        let sender = worker.sender.clone();
        worker.shutdown(true);
        assert!(sender.send(Job::Poll).is_err());
    }
}
