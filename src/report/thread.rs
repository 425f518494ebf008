use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::thread::Builder;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::unbounded;
use crossbeam_channel::RecvTimeoutError;
use crossbeam_channel::Sender;

use crate::errors::Error;
use crate::errors::Result;
use crate::span::FinishedSpan;

use super::Reporter;


const STOP_DELAY_MS_DEFAULT: u64 = 2000;
const RECV_TIMEOUT_MS: u64 = 50;


/// Background-thread wrapper around any `Reporter`.
///
/// `report` only enqueues the batch on an unbounded channel so the
/// instrumented call path never waits on delivery, whichever sink is
/// wrapped. A spawned thread drains the channel and pushes each batch
/// through the inner reporter, logging and dropping failures.
///
/// When `ThreadReporter::stop` is called or the instance is dropped:
///
///   1. The calling thread pauses for `stop_delay` so batches still in
///      the channel can be delivered.
///   2. The background thread is told to shut down and is joined.
pub struct ThreadReporter {
    sender: Sender<Vec<FinishedSpan>>,
    stop_delay: Duration,
    stopping: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
}

impl ThreadReporter {
    /// Spawn the delivery thread around the given inner reporter.
    pub fn new<R: Reporter + 'static>(inner: R) -> ThreadReporter {
        let (sender, receiver) = unbounded::<Vec<FinishedSpan>>();
        let stopping = Arc::new(AtomicBool::new(false));
        let inner_stopping = Arc::clone(&stopping);

        let thread = Builder::new()
            .name("zipkin-relay-reporter".into())
            .spawn(move || {
                while !inner_stopping.load(Ordering::Relaxed) {
                    let timeout = Duration::from_millis(RECV_TIMEOUT_MS);
                    match receiver.recv_timeout(timeout) {
                        Ok(batch) => {
                            if let Err(error) = inner.report(&batch) {
                                tracing::error!("span report failed: {}", error);
                            }
                        }
                        Err(RecvTimeoutError::Timeout) => continue,
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
            })
            .expect("failed to spawn reporter thread");

        ThreadReporter {
            sender,
            stop_delay: Duration::from_millis(STOP_DELAY_MS_DEFAULT),
            stopping,
            thread_handle: Some(thread),
        }
    }

    /// Version of `new` that also sets the `stop_delay`.
    pub fn new_with_delay<R: Reporter + 'static>(
        inner: R,
        stop_delay: Duration,
    ) -> ThreadReporter {
        let mut reporter = ThreadReporter::new(inner);
        reporter.stop_delay = stop_delay;
        reporter
    }

    /// Stops the background thread and joins it.
    pub fn stop(&mut self) {
        if let Some(thread) = self.thread_handle.take() {
            thread::sleep(self.stop_delay);
            self.stopping.store(true, Ordering::Relaxed);
            if thread.join().is_err() {
                tracing::error!("reporter thread panicked");
            }
        }
    }
}

impl Reporter for ThreadReporter {
    fn report(&self, spans: &[FinishedSpan]) -> Result<()> {
        if spans.is_empty() {
            return Ok(());
        }
        self.sender
            .send(spans.to_vec())
            .map_err(|_| Error::Queue(String::from("reporter thread is gone")))
    }
}

impl Drop for ThreadReporter {
    fn drop(&mut self) {
        self.stop()
    }
}
