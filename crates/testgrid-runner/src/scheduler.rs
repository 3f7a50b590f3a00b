//! Concurrency-limited task scheduler.
//!
//! A [`Scheduler`] runs asynchronous tasks on the tokio runtime while
//! keeping at most `limit` of them in flight. Tasks submitted beyond the
//! limit wait in a FIFO queue; every settling task (success, error or
//! panic) hands its slot directly to the oldest waiter.
//!
//! Slot accounting and the wait queue live behind one mutex, so the
//! "never more than `limit` running" invariant holds on a multi-threaded
//! runtime too.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::trace;

/// Throttles how many submitted tasks run at once.
///
/// Cloning is cheap; clones share the same slots and queue.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

struct Inner {
    limit: Option<usize>,
    state: Mutex<SlotState>,
}

#[derive(Default)]
struct SlotState {
    running: usize,
    waiting: VecDeque<oneshot::Sender<Slot>>,
}

enum Claim {
    Ready(Slot),
    Queued(oneshot::Receiver<Slot>),
}

/// Permission to run one task. Dropping it frees the slot.
struct Slot {
    inner: Option<Arc<Inner>>,
}

impl Slot {
    fn new(inner: Arc<Inner>) -> Self {
        Self { inner: Some(inner) }
    }

    /// Forget the slot without releasing it (used when a handoff fails and
    /// the slot is passed on to the next waiter instead).
    fn disarm(mut self) {
        self.inner.take();
    }
}

impl Drop for Slot {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.take() {
            inner.release();
        }
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, SlotState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn claim(self: &Arc<Self>) -> Claim {
        let mut state = self.lock();
        match self.limit {
            Some(limit) if state.running >= limit => {
                let (tx, rx) = oneshot::channel();
                state.waiting.push_back(tx);
                trace!(
                    running = state.running,
                    queued = state.waiting.len(),
                    "No free slot, task queued"
                );
                Claim::Queued(rx)
            }
            _ => {
                state.running += 1;
                Claim::Ready(Slot::new(Arc::clone(self)))
            }
        }
    }

    fn release(self: &Arc<Self>) {
        let mut state = self.lock();
        while let Some(waiter) = state.waiting.pop_front() {
            match waiter.send(Slot::new(Arc::clone(self))) {
                Ok(()) => {
                    trace!(queued = state.waiting.len(), "Slot handed to queued task");
                    return;
                }
                // Waiter went away; try the next one.
                Err(slot) => slot.disarm(),
            }
        }
        state.running = state.running.saturating_sub(1);
    }
}

async fn wait_for_slot(inner: Arc<Inner>, mut claim: Claim) -> Slot {
    loop {
        match claim {
            Claim::Ready(slot) => return slot,
            Claim::Queued(rx) => match rx.await {
                Ok(slot) => return slot,
                Err(_) => claim = inner.claim(),
            },
        }
    }
}

impl Scheduler {
    /// Create a scheduler. `None` means every task starts immediately.
    pub fn new(limit: Option<usize>) -> Self {
        Self {
            inner: Arc::new(Inner {
                limit,
                state: Mutex::new(SlotState::default()),
            }),
        }
    }

    /// Create a scheduler allowing at most `limit` tasks in flight.
    pub fn bounded(limit: usize) -> Self {
        Self::new(Some(limit))
    }

    /// Create a scheduler that never queues.
    pub fn unbounded() -> Self {
        Self::new(None)
    }

    pub fn limit(&self) -> Option<usize> {
        self.inner.limit
    }

    /// Number of tasks currently holding a slot.
    pub fn in_flight(&self) -> usize {
        self.inner.lock().running
    }

    /// Number of tasks waiting for a slot.
    pub fn queued(&self) -> usize {
        self.inner.lock().waiting.len()
    }

    /// Schedule a task.
    ///
    /// Never runs `task` synchronously: the returned handle resolves with
    /// the task's output once it has been granted a slot and finished.
    /// Queue position is fixed at the time of this call. Must be called
    /// from within a tokio runtime.
    pub fn submit<F, Fut>(&self, task: F) -> JoinHandle<Fut::Output>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future + Send + 'static,
        Fut::Output: Send + 'static,
    {
        let claim = self.inner.claim();
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let _slot = wait_for_slot(inner, claim).await;
            task().await
        })
    }

    /// Wrap a task factory so every call goes through this scheduler.
    ///
    /// The wrapped factory takes the same argument and returns a handle to
    /// the eventual result instead of the future itself.
    pub fn wrap<A, F, Fut>(&self, factory: F) -> impl Fn(A) -> JoinHandle<Fut::Output> + Clone
    where
        A: Send + 'static,
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future + Send + 'static,
        Fut::Output: Send + 'static,
    {
        let scheduler = self.clone();
        let factory = Arc::new(factory);
        move |args: A| {
            let factory = Arc::clone(&factory);
            scheduler.submit(move || factory(args))
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::unbounded()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::time::{sleep, Instant};

    #[tokio::test(start_paused = true)]
    async fn test_never_exceeds_limit() {
        let scheduler = Scheduler::bounded(3);
        let current = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..12u64)
            .map(|i| {
                let current = current.clone();
                let peak = peak.clone();
                scheduler.submit(move || async move {
                    let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    sleep(Duration::from_millis(10 * (i % 4 + 1))).await;
                    current.fetch_sub(1, Ordering::SeqCst);
                    i
                })
            })
            .collect();

        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.await.unwrap());
        }

        assert_eq!(results, (0..12).collect::<Vec<_>>());
        assert_eq!(peak.load(Ordering::SeqCst), 3);
        assert_eq!(scheduler.in_flight(), 0);
        assert_eq!(scheduler.queued(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unbounded_starts_everything() {
        let scheduler = Scheduler::unbounded();
        let started = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..20)
            .map(|_| {
                let started = started.clone();
                scheduler.submit(move || async move {
                    started.fetch_add(1, Ordering::SeqCst);
                    sleep(Duration::from_secs(1)).await;
                })
            })
            .collect();

        assert_eq!(scheduler.queued(), 0);
        sleep(Duration::from_millis(1)).await;
        assert_eq!(started.load(Ordering::SeqCst), 20);

        for handle in handles {
            handle.await.unwrap();
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_queue_and_in_flight_counts() {
        let scheduler = Scheduler::bounded(2);

        let handles: Vec<_> = (0..5)
            .map(|_| scheduler.submit(|| sleep(Duration::from_secs(1))))
            .collect();

        assert_eq!(scheduler.in_flight(), 2);
        assert_eq!(scheduler.queued(), 3);

        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(scheduler.in_flight(), 0);
        assert_eq!(scheduler.queued(), 0);
    }

    #[tokio::test]
    async fn test_queued_tasks_start_in_submission_order() {
        let scheduler = Scheduler::bounded(1);
        let order = Arc::new(Mutex::new(Vec::new()));

        let handles: Vec<_> = (0..6)
            .map(|i| {
                let order = order.clone();
                scheduler.submit(move || async move {
                    order.lock().unwrap().push(i);
                    tokio::task::yield_now().await;
                })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4, 5]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_settling_task_starts_next_queued() {
        let scheduler = Scheduler::bounded(2);
        let base = Instant::now();
        let durations = [10u64, 100, 100, 10];

        let handles: Vec<_> = durations
            .iter()
            .map(|&ms| {
                scheduler.submit(move || async move {
                    let started = base.elapsed();
                    sleep(Duration::from_millis(ms)).await;
                    started
                })
            })
            .collect();

        let mut starts = Vec::new();
        for handle in handles {
            starts.push(handle.await.unwrap());
        }

        assert!(starts[0] < Duration::from_millis(10));
        assert!(starts[1] < Duration::from_millis(10));
        // Task 2 takes task 0's slot, task 3 waits for task 1.
        assert!(starts[2] >= Duration::from_millis(10) && starts[2] < Duration::from_millis(100));
        assert!(starts[3] >= Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_failure_frees_slot() {
        let scheduler = Scheduler::bounded(1);

        let failing = scheduler.submit(|| async { Err::<u32, String>("boom".to_string()) });
        let next = scheduler.submit(|| async { Ok::<u32, String>(7) });

        assert_eq!(failing.await.unwrap(), Err("boom".to_string()));
        assert_eq!(next.await.unwrap(), Ok(7));
        assert_eq!(scheduler.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_panic_frees_slot() {
        let scheduler = Scheduler::bounded(1);

        let panicking = scheduler.submit(|| async {
            panic!("task blew up");
        });
        let next = scheduler.submit(|| async { 42 });

        assert!(panicking.await.unwrap_err().is_panic());
        assert_eq!(next.await.unwrap(), 42);
        assert_eq!(scheduler.in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wrap_preserves_arguments() {
        let scheduler = Scheduler::bounded(2);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let double = scheduler.wrap(move |x: u32| {
            counter.fetch_add(1, Ordering::SeqCst);
            async move {
                sleep(Duration::from_millis(5)).await;
                x * 2
            }
        });

        let handles: Vec<_> = (1..=4).map(&double).collect();
        // The factory only runs once a slot is granted, inside the spawned task.
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.await.unwrap());
        }
        assert_eq!(results, vec![2, 4, 6, 8]);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }
}
