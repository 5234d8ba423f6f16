//! Background resolve worker.
//!
//! One thread per request, at most one active. Submitting a new request flags the
//! previous job's cancel token and moves it to a retiring list; retiring jobs are
//! joined once they finish, or detached with a warning after the grace period.

use crossbeam_channel::{Receiver, Sender, unbounded};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

use crate::search::engine::{ResolveSource, SearchEngine};
use crate::search::query::{FilterParams, ResolvedList};
use crate::search::resolve::CancelCheck;
use crate::store::SharedStore;

/// Monotonic token source. Clones share the counter.
#[derive(Debug, Clone, Default)]
pub struct GenerationCounter(Arc<AtomicU64>);

impl GenerationCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue the next token. The first token is 1.
    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Most recently issued token (0 before any).
    pub fn latest(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }

    pub fn is_latest(&self, generation: u64) -> bool {
        generation == self.latest()
    }
}

/// Cooperative cancel flag handed to a running scan.
#[derive(Debug, Default)]
pub struct CancelToken(AtomicBool);

impl CancelToken {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

impl CancelCheck for CancelToken {
    fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// A finished resolve as delivered back to the interactive thread.
#[derive(Debug, Clone)]
pub struct ResolveOutcome {
    pub generation: u64,
    pub epoch: u64,
    pub params: FilterParams,
    pub list: ResolvedList,
    /// `None` when the worker failed and `list` is the empty fallback.
    pub source: Option<ResolveSource>,
    pub elapsed: Duration,
}

impl ResolveOutcome {
    pub fn failed(&self) -> bool {
        self.source.is_none()
    }
}

struct Job {
    generation: u64,
    cancel: Arc<CancelToken>,
    handle: JoinHandle<()>,
}

pub struct SearchWorker {
    store: SharedStore,
    engine: Arc<SearchEngine>,
    generations: GenerationCounter,
    grace: Duration,
    current: Option<Job>,
    retiring: Vec<(Job, Instant)>,
    tx: Sender<ResolveOutcome>,
    rx: Receiver<ResolveOutcome>,
}

impl SearchWorker {
    pub fn new(
        store: SharedStore,
        engine: Arc<SearchEngine>,
        generations: GenerationCounter,
        grace: Duration,
    ) -> Self {
        let (tx, rx) = unbounded();
        Self {
            store,
            engine,
            generations,
            grace,
            current: None,
            retiring: Vec::new(),
            tx,
            rx,
        }
    }

    pub fn generations(&self) -> &GenerationCounter {
        &self.generations
    }

    /// Start resolving `params` on a fresh thread and return its generation token.
    pub fn submit(&mut self, params: FilterParams) -> u64 {
        let generation = self.generations.next();
        if let Some(previous) = self.current.take() {
            previous.cancel.cancel();
            debug!(
                superseded = previous.generation,
                by = generation,
                "resolve_superseded"
            );
            self.retiring.push((previous, Instant::now() + self.grace));
        }
        self.reap(Instant::now());

        let cancel = Arc::new(CancelToken::default());
        let store = Arc::clone(&self.store);
        let engine = Arc::clone(&self.engine);
        let tx = self.tx.clone();
        let token = Arc::clone(&cancel);

        let handle = thread::spawn(move || {
            let started = Instant::now();
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                let store = store.read();
                engine.resolve_cancellable(&store, &params, token.as_ref())
            }));
            let delivered = match outcome {
                Ok(Some(resolution)) => ResolveOutcome {
                    generation,
                    epoch: resolution.epoch,
                    params,
                    list: resolution.list,
                    source: Some(resolution.source),
                    elapsed: started.elapsed(),
                },
                Ok(None) => {
                    debug!(generation, "resolve_cancelled");
                    return;
                }
                Err(payload) => {
                    error!(
                        generation,
                        panic = %panic_message(payload.as_ref()),
                        "resolve_failed; showing empty result"
                    );
                    ResolveOutcome {
                        generation,
                        epoch: store.read().epoch(),
                        params,
                        list: ResolvedList::empty(),
                        source: None,
                        elapsed: started.elapsed(),
                    }
                }
            };
            // The receiver is gone only during shutdown.
            let _ = tx.send(delivered);
        });

        self.current = Some(Job {
            generation,
            cancel,
            handle,
        });
        generation
    }

    /// Join retiring jobs that finished; detach the ones past their grace deadline.
    pub fn reap(&mut self, now: Instant) {
        let mut keep = Vec::with_capacity(self.retiring.len());
        for (job, deadline) in self.retiring.drain(..) {
            if job.handle.is_finished() {
                let _ = job.handle.join();
            } else if now >= deadline {
                warn!(
                    generation = job.generation,
                    grace_ms = self.grace.as_millis() as u64,
                    "superseded resolve still running after grace period; detaching"
                );
            } else {
                keep.push((job, deadline));
            }
        }
        self.retiring = keep;
    }

    /// Drain delivered results and return the newest one that is still current.
    ///
    /// Results for an older generation or an older store epoch are dropped.
    pub fn try_recv(&mut self) -> Option<ResolveOutcome> {
        self.reap(Instant::now());
        let mut accepted = None;
        while let Ok(outcome) = self.rx.try_recv() {
            let from_current_job = self
                .current
                .as_ref()
                .is_some_and(|job| job.generation == outcome.generation);
            if self.is_current(&outcome) {
                accepted = Some(outcome);
            } else if from_current_job {
                // Superseded outside the worker (e.g. a cleared filter view).
                self.finish_current();
            }
        }
        if accepted.is_some() {
            self.finish_current();
        }
        accepted
    }

    /// Block until the current request delivers, or `timeout` passes.
    pub fn wait(&mut self, timeout: Duration) -> Option<ResolveOutcome> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let outcome = self.rx.recv_timeout(remaining).ok()?;
            if self.is_current(&outcome) {
                self.finish_current();
                return Some(outcome);
            }
        }
    }

    /// True while the latest request has not delivered yet.
    pub fn is_busy(&self) -> bool {
        self.current.is_some()
    }

    fn is_current(&self, outcome: &ResolveOutcome) -> bool {
        if !self.generations.is_latest(outcome.generation) {
            debug!(
                generation = outcome.generation,
                latest = self.generations.latest(),
                "stale_result_dropped"
            );
            return false;
        }
        let epoch = self.store.read().epoch();
        if outcome.epoch != epoch {
            debug!(
                generation = outcome.generation,
                result_epoch = outcome.epoch,
                store_epoch = epoch,
                "result_from_reloaded_store_dropped"
            );
            return false;
        }
        true
    }

    fn finish_current(&mut self) {
        if let Some(job) = self.current.take() {
            let _ = job.handle.join();
        }
    }

    /// Cancel everything and wait up to the grace period for threads to exit.
    pub fn shutdown(&mut self) {
        if let Some(job) = self.current.take() {
            job.cancel.cancel();
            self.retiring.push((job, Instant::now() + self.grace));
        }
        let deadline = Instant::now() + self.grace;
        while !self.retiring.is_empty() && Instant::now() < deadline {
            self.reap(Instant::now());
            if !self.retiring.is_empty() {
                thread::sleep(Duration::from_millis(5));
            }
        }
        self.reap(deadline);
    }
}

impl Drop for SearchWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::types::{ConversationKey, Message};
    use crate::store::{MessageStore, shared};

    fn shared_store(bodies: &[&str]) -> SharedStore {
        let mut store = MessageStore::new();
        for (i, body) in bodies.iter().enumerate() {
            store.insert(
                ConversationKey::direct("A", "B"),
                Message {
                    msg_id: i.to_string(),
                    sender: "A".into(),
                    receiver: "B".into(),
                    body: (*body).into(),
                    ..Default::default()
                },
            );
        }
        store.finalize();
        shared(store)
    }

    fn worker(store: SharedStore) -> SearchWorker {
        SearchWorker::new(
            store,
            Arc::new(SearchEngine::new(16)),
            GenerationCounter::new(),
            Duration::from_millis(200),
        )
    }

    #[test]
    fn generations_increase() {
        let counter = GenerationCounter::new();
        assert_eq!(counter.latest(), 0);
        let a = counter.next();
        let b = counter.clone().next();
        assert!(b > a);
        assert!(counter.is_latest(b));
        assert!(!counter.is_latest(a));
    }

    #[test]
    fn only_latest_generation_is_delivered() {
        let mut worker = worker(shared_store(&["alpha", "beta", "alphabet"]));
        let first = worker.submit(FilterParams::new().with_text("beta"));
        let second = worker.submit(FilterParams::new().with_text("alpha"));
        assert!(second > first);

        let outcome = worker.wait(Duration::from_secs(5)).expect("result");
        assert_eq!(outcome.generation, second);
        assert_eq!(outcome.list.count(), 2);
        assert!(!outcome.failed());
        assert!(!worker.is_busy());
    }

    #[test]
    fn result_from_before_reload_is_discarded() {
        let store = shared_store(&["alpha"]);
        let mut worker = worker(Arc::clone(&store));
        // Hold the write lock so the worker cannot scan until the reload lands.
        let mut guard = store.write();
        worker.submit(FilterParams::new().with_text("alpha"));
        let mut next = MessageStore::new();
        next.insert(
            ConversationKey::group("G"),
            Message {
                msg_id: "n".into(),
                body: "alpha two".into(),
                ..Default::default()
            },
        );
        guard.replace(next);
        drop(guard);

        // Computed after the reload, so it carries the new epoch and is accepted.
        let outcome = worker.wait(Duration::from_secs(5)).expect("result");
        assert_eq!(outcome.epoch, 1);
        assert_eq!(outcome.list.count(), 1);
    }

    #[test]
    fn cancel_token_reports_cancellation() {
        let token = CancelToken::default();
        assert!(!token.is_cancelled());
        token.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn panic_payloads_are_readable() {
        let caught = panic::catch_unwind(|| panic!("bad row")).unwrap_err();
        assert_eq!(panic_message(caught.as_ref()), "bad row");
    }
}
