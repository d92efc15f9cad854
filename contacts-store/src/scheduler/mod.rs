//! The Request Scheduler (spec.md §4.H): one worker thread pulling from a
//! FIFO queue, with per-request shared state a caller can poll, cancel, or
//! await. The worker operates on its own detached copy of each request's
//! payload so a caller mutating its own handle never races the worker
//! mid-execution (spec.md §4.H "the worker operates on a detached copy").

pub mod request;
mod worker;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

use contacts_notify::Notifier;
use contacts_types::ContactsError;
use tokio::sync::Notify;

use crate::storage::StorageAdapter;

pub use request::{RequestKind, RequestOutcome, RequestResult, RequestState};

struct Job {
    id: u64,
    kind: Mutex<Option<RequestKind>>,
    state: Mutex<RequestState>,
    result: Mutex<Option<RequestOutcome>>,
    cancel: AtomicBool,
    notify: Notify,
}

struct QueueInner {
    queue: Mutex<VecDeque<Arc<Job>>>,
    condvar: Condvar,
    shutdown: AtomicBool,
}

/// Owns the worker thread and the shared queue it drains. One instance per
/// open engine; dropping it joins the worker after waking it with a
/// shutdown signal.
pub struct Scheduler {
    inner: Arc<QueueInner>,
    next_id: AtomicU64,
    worker: Option<JoinHandle<()>>,
}

impl Scheduler {
    /// Spawns the single worker thread against `storage`/`notifier`. `storage`
    /// is `None` when the engine could not open its database at all; the
    /// worker still drains the queue but fails every request immediately
    /// with a generic error instead of touching a handle that doesn't exist
    /// (spec.md §4.H "degraded-mode handling").
    pub fn start(storage: Option<Arc<StorageAdapter>>, notifier: Notifier) -> Self {
        let inner = Arc::new(QueueInner {
            queue: Mutex::new(VecDeque::new()),
            condvar: Condvar::new(),
            shutdown: AtomicBool::new(false),
        });

        let worker_inner = Arc::clone(&inner);
        let worker = std::thread::Builder::new()
            .name("contacts-store-worker".into())
            .spawn(move || run_worker(worker_inner, storage, notifier))
            .expect("failed to spawn contacts-store worker thread");

        Scheduler {
            inner,
            next_id: AtomicU64::new(1),
            worker: Some(worker),
        }
    }

    /// Queues `kind` and returns a handle the caller can poll/cancel/await.
    /// FIFO by construction: new jobs always land at the back.
    pub fn submit(&self, kind: RequestKind) -> RequestHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let job = Arc::new(Job {
            id,
            kind: Mutex::new(Some(kind)),
            state: Mutex::new(RequestState::Inactive),
            result: Mutex::new(None),
            cancel: AtomicBool::new(false),
            notify: Notify::new(),
        });

        {
            let mut queue = self.inner.queue.lock().unwrap();
            queue.push_back(Arc::clone(&job));
        }
        self.inner.condvar.notify_one();

        RequestHandle { inner: Arc::clone(&self.inner), job }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.inner.shutdown.store(true, Ordering::SeqCst);
        self.inner.condvar.notify_all();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

/// A live request: lets a caller watch, cancel, or wait on it without
/// touching the queue directly.
#[derive(Clone)]
pub struct RequestHandle {
    inner: Arc<QueueInner>,
    job: Arc<Job>,
}

impl RequestHandle {
    pub fn state(&self) -> RequestState {
        *self.job.state.lock().unwrap()
    }

    pub fn result(&self) -> Option<RequestOutcome> {
        self.job.result.lock().unwrap().clone()
    }

    /// Cooperative cancellation (spec.md §4.H): if the request hasn't
    /// started, it's removed from the queue and marked `Canceled` right
    /// away. If it's already running, the cancel flag is set for the
    /// worker to observe between batch items; the request still settles
    /// into `Canceled` once the worker notices.
    pub fn cancel(&self) {
        self.job.cancel.store(true, Ordering::Relaxed);

        let mut state = self.job.state.lock().unwrap();
        if *state == RequestState::Inactive {
            let mut queue = self.inner.queue.lock().unwrap();
            queue.retain(|j| j.id != self.job.id);
            *state = RequestState::Canceled;
            drop(queue);
            drop(state);
            self.job.notify.notify_waiters();
        }
    }

    /// Promotes this request to the front of the pending queue (if it's
    /// still queued) and waits for it to reach a terminal state (spec.md
    /// §4.H "wait-for-finished queue-head promotion") — a caller blocked on
    /// one request shouldn't have to wait behind unrelated work ahead of it.
    pub async fn wait_for_finished(&self) -> RequestState {
        {
            let mut queue = self.inner.queue.lock().unwrap();
            if let Some(pos) = queue.iter().position(|j| j.id == self.job.id) {
                if pos != 0 {
                    let job = queue.remove(pos).unwrap();
                    queue.push_front(job);
                }
            }
        }
        self.inner.condvar.notify_all();

        loop {
            if self.state().is_terminal() {
                return self.state();
            }
            self.job.notify.notified().await;
        }
    }
}

fn run_worker(inner: Arc<QueueInner>, storage: Option<Arc<StorageAdapter>>, notifier: Notifier) {
    loop {
        let job = {
            let mut queue = inner.queue.lock().unwrap();
            loop {
                if inner.shutdown.load(Ordering::SeqCst) {
                    return;
                }
                if let Some(job) = queue.pop_front() {
                    break job;
                }
                queue = inner.condvar.wait(queue).unwrap();
            }
        };

        {
            let mut state = job.state.lock().unwrap();
            if *state == RequestState::Canceled {
                continue;
            }
            *state = RequestState::Active;
        }

        let kind = job.kind.lock().unwrap().take();
        let outcome = match (kind, storage.as_deref()) {
            (Some(kind), Some(storage)) => worker::execute(storage, &notifier, kind, &job.cancel),
            _ => Err(ContactsError::Unspecified),
        };

        let canceled = job.cancel.load(Ordering::Relaxed);
        *job.result.lock().unwrap() = Some(outcome);
        *job.state.lock().unwrap() = if canceled { RequestState::Canceled } else { RequestState::Finished };
        job.notify.notify_waiters();
    }
}
