//! Bucketed work scheduler.
//!
//! Dispatches caller-supplied work items onto an injected task pool while
//! holding two guarantees: at most one item per bucket is in flight at any
//! time, and no more than `max_degree_of_parallelism` items run overall.
//! Across buckets, higher user priority dispatches first; within a priority,
//! earlier enqueues win; within one bucket, strict FIFO.
//!
//! Two locks protect the state: `buckets` (outer) guards the per-bucket
//! queues, `dispatch` (inner) guards the ready heap and worker accounting.
//! `buckets` is never acquired while `dispatch` is held.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use futures::channel::oneshot;
use futures::future::BoxFuture;
use fxhash::FxHashMap;
use log::{debug, trace};
use parking_lot::Mutex;

use crate::heap::BinaryHeap;

/// Handle to the executor that runs worker futures.
///
/// The scheduler never blocks inside `spawn`; a worker future drives one
/// dispatched item at a time and may suspend on any pool thread.
pub trait TaskPool: Send + Sync {
    fn spawn(&self, task: BoxFuture<'static, ()>);
}

/// Any matching closure is a pool handle, so wiring an executor up is one
/// line, e.g. `|task| { tokio::spawn(task); }`.
impl<F> TaskPool for F
where
    F: Fn(BoxFuture<'static, ()>) + Send + Sync,
{
    fn spawn(&self, task: BoxFuture<'static, ()>) {
        (self)(task)
    }
}

type WorkRoutine<T> = dyn Fn(T) -> BoxFuture<'static, ()> + Send + Sync;

/// The sequence counter starts here and hands out strictly smaller values,
/// so the sequence bits never carry into the priority byte.
const SEQ_START: u64 = 1 << PRIORITY_SHIFT;
const PRIORITY_SHIFT: u32 = 56;

/// A work item annotated with its scheduling labels.
struct Item<T> {
    /// `(priority << 56) | seq`; unique per scheduler instance
    composite: u64,
    bucket: i64,
    value: T,
}

// The ready set is a min-heap; inverting the comparison makes it pop the
// largest composite (highest priority, then earliest enqueue) first.
impl<T> Ord for Item<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        other.composite.cmp(&self.composite)
    }
}

impl<T> PartialOrd for Item<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> PartialEq for Item<T> {
    fn eq(&self, other: &Self) -> bool {
        self.composite == other.composite
    }
}

impl<T> Eq for Item<T> {}

/// State behind the inner lock: the ready set and worker accounting.
struct Dispatch<T> {
    ready: BinaryHeap<Item<T>>,
    active: usize,
    /// Senders waiting for the post-stop quiescent point
    completion: Vec<oneshot::Sender<bool>>,
}

struct Inner<T> {
    /// Outer lock. An entry marks the bucket as having an item in flight or
    /// in the ready heap; `Some(queue)` additionally holds items awaiting
    /// their turn. Items in a queue are never in the heap.
    buckets: Mutex<FxHashMap<i64, Option<VecDeque<Item<T>>>>>,
    /// Inner lock
    dispatch: Mutex<Dispatch<T>>,
    /// Items not yet handed to the pool (ready heap plus all bucket queues)
    pending: AtomicUsize,
    seq: AtomicU64,
    stopped: AtomicBool,
    /// 0 means unlimited
    max_dop: usize,
    pool: Box<dyn TaskPool>,
    routine: Box<WorkRoutine<T>>,
}

impl<T> Inner<T> {
    #[inline]
    fn dop_limit(&self) -> usize {
        if self.max_dop == 0 {
            usize::MAX
        } else {
            self.max_dop
        }
    }
}

/// Concurrent dispatcher over an external task pool with per-bucket mutual
/// exclusion, a global parallelism cap and priority-aware ordering.
///
/// Cloning yields another handle to the same scheduler.
pub struct WorkScheduler<T: Send + 'static> {
    inner: Arc<Inner<T>>,
}

impl<T: Send + 'static> Clone for WorkScheduler<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Send + 'static> WorkScheduler<T> {
    /// Creates a scheduler running `routine` on `pool`.
    ///
    /// `max_degree_of_parallelism` of 0 means unlimited. The routine's own
    /// failures are the pool's concern; the scheduler counts a finish
    /// regardless of the routine's outcome.
    pub fn new<P, F>(max_degree_of_parallelism: usize, pool: P, routine: F) -> Self
    where
        P: TaskPool + 'static,
        F: Fn(T) -> BoxFuture<'static, ()> + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(Inner {
                buckets: Mutex::new(FxHashMap::default()),
                dispatch: Mutex::new(Dispatch {
                    ready: BinaryHeap::new(),
                    active: 0,
                    completion: Vec::new(),
                }),
                pending: AtomicUsize::new(0),
                seq: AtomicU64::new(SEQ_START),
                stopped: AtomicBool::new(false),
                max_dop: max_degree_of_parallelism,
                pool: Box::new(pool),
                routine: Box::new(routine),
            }),
        }
    }

    /// Enqueues `value` with default (lowest) priority.
    pub fn enqueue(&self, value: T, bucket: i64) {
        self.enqueue_with_priority(value, bucket, 0)
    }

    /// Enqueues `value`; higher `priority` dispatches earlier across
    /// buckets, equal priority dispatches in enqueue order.
    pub fn enqueue_with_priority(&self, value: T, bucket: i64, priority: u8) {
        let seq = self.inner.seq.fetch_sub(1, Ordering::Relaxed) - 1;
        let composite = (u64::from(priority) << PRIORITY_SHIFT) | seq;
        let item = Item {
            composite,
            bucket,
            value,
        };
        self.inner.pending.fetch_add(1, Ordering::SeqCst);

        {
            let mut buckets = self.inner.buckets.lock();
            if let Some(state) = buckets.get_mut(&bucket) {
                // the bucket already has an item in flight or ready; this
                // one waits its turn
                state.get_or_insert_with(VecDeque::new).push_back(item);
                return;
            }
            if self.inner.stopped.load(Ordering::SeqCst) {
                // no dispatch after stop; park for the next drain
                let mut queue = VecDeque::new();
                queue.push_back(item);
                buckets.insert(bucket, Some(queue));
                return;
            }
            buckets.insert(bucket, None);
        }

        let mut dispatch = self.inner.dispatch.lock();
        // recheck the stop flag: a stop may have slipped in between the two
        // lock sections, and nothing dispatches after stop
        if !self.inner.stopped.load(Ordering::SeqCst) && dispatch.active < self.inner.dop_limit() {
            dispatch.active += 1;
            drop(dispatch);
            self.inner.pending.fetch_sub(1, Ordering::SeqCst);
            trace!("dispatching bucket {} directly", bucket);
            spawn_worker(&self.inner, item);
        } else {
            push_ready(&mut dispatch.ready, item);
        }
    }

    /// Ceases dispatch, waits for in-flight routines to finish and returns
    /// the undispatched items, highest composite priority first.
    ///
    /// The stop transition happens before this method returns its future;
    /// only the wait and the drain are deferred. May be called again later
    /// to drain items enqueued after the stop.
    pub fn stop_and_wait_for_completion(&self) -> impl Future<Output = Vec<T>> {
        let inner = Arc::clone(&self.inner);
        let receiver = {
            let _buckets = inner.buckets.lock();
            let mut dispatch = inner.dispatch.lock();
            inner.stopped.store(true, Ordering::SeqCst);
            if dispatch.active == 0 {
                debug!("stop requested with no active workers");
                None
            } else {
                debug!(
                    "stop requested; waiting for {} active workers",
                    dispatch.active
                );
                let (tx, rx) = oneshot::channel();
                dispatch.completion.push(tx);
                Some(rx)
            }
        };
        async move {
            if let Some(rx) = receiver {
                // the sender is only dropped with the scheduler itself
                let _ = rx.await;
            }
            drain_remaining(&inner)
        }
    }

    /// Items not yet handed to the pool.
    pub fn pending_work_items(&self) -> usize {
        self.inner.pending.load(Ordering::SeqCst)
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::SeqCst)
    }

    /// The configured cap; 0 means unlimited.
    pub fn max_degree_of_parallelism(&self) -> usize {
        self.inner.max_dop
    }
}

#[inline]
fn push_ready<T>(ready: &mut BinaryHeap<Item<T>>, item: Item<T>) {
    // growth only fails at the 32-bit capacity bound, far beyond any
    // realistic backlog
    ready
        .push(item)
        .expect("ready heap exceeded its capacity bound");
}

fn spawn_worker<T: Send + 'static>(inner: &Arc<Inner<T>>, item: Item<T>) {
    let worker = worker_loop(Arc::clone(inner), item);
    inner.pool.spawn(Box::pin(worker));
}

/// Runs one dispatched item, then keeps pulling from the ready heap until
/// it is empty or the scheduler stops.
async fn worker_loop<T: Send + 'static>(inner: Arc<Inner<T>>, mut item: Item<T>) {
    loop {
        let Item { bucket, value, .. } = item;
        (inner.routine)(value).await;

        {
            let mut buckets = inner.buckets.lock();
            let release = match buckets.get_mut(&bucket) {
                Some(Some(queue)) => match queue.pop_front() {
                    Some(next) => {
                        // move the successor into the ready set; the bucket
                        // entry stays, marking the successor as the bucket's
                        // single in-flight-or-ready item. Taking `dispatch`
                        // here respects the buckets -> dispatch lock order.
                        push_ready(&mut inner.dispatch.lock().ready, next);
                        false
                    }
                    None => true,
                },
                Some(None) => true,
                None => false,
            };
            if release {
                buckets.remove(&bucket);
            }
        }

        let mut dispatch = inner.dispatch.lock();
        if inner.stopped.load(Ordering::SeqCst) {
            dispatch.active -= 1;
            if dispatch.active == 0 {
                debug!("last worker settled after stop");
                for tx in dispatch.completion.drain(..) {
                    let _ = tx.send(true);
                }
            }
            return;
        }
        match dispatch.ready.pop() {
            Ok(next) => {
                inner.pending.fetch_sub(1, Ordering::SeqCst);
                drop(dispatch);
                trace!("worker moving on to bucket {}", next.bucket);
                item = next;
            }
            Err(_) => {
                dispatch.active -= 1;
                return;
            }
        }
    }
}

/// Empties the ready heap and every bucket queue, highest composite first.
/// Runs only at quiescent points (no active workers).
fn drain_remaining<T: Send>(inner: &Inner<T>) -> Vec<T> {
    let mut buckets = inner.buckets.lock();
    let mut dispatch = inner.dispatch.lock();
    let mut drained: Vec<Item<T>> = Vec::new();
    while let Ok(item) = dispatch.ready.pop() {
        drained.push(item);
    }
    for (_, state) in buckets.drain() {
        if let Some(queue) = state {
            drained.extend(queue);
        }
    }
    drained.sort_unstable_by(|a, b| b.composite.cmp(&a.composite));
    inner.pending.fetch_sub(drained.len(), Ordering::SeqCst);
    debug!("drained {} undispatched items", drained.len());
    drained.into_iter().map(|item| item.value).collect()
}
