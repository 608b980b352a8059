//! A composable future/promise pair with continuations and broken-promise
//! semantics, independent of the Tokio runtime's own `Future` trait.
//!
//! A shared cell behind a mutex, holding `{empty, value, exception}`, with
//! a producer refcount that resolves the cell to *broken promise* once
//! every `Promise` clone pointing at it is dropped without a value ever
//! being set.
//!
//! This is a hand-rolled single-assignment cell rather than
//! `tokio::sync::oneshot` because continuations need to be attachable
//! after the fact and run at most once regardless of how many times `then`
//! is called or whether the value was already set — `oneshot` only gives
//! one consumer a `Receiver`, it doesn't support the `then`/`thenQueue`
//! shape.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use crate::error::FutureError;

enum State<T> {
    Empty,
    Value(T),
    Exception(FutureError),
}

struct Continuation<T> {
    run: Box<dyn FnOnce(Result<T, FutureError>) + Send>,
}

struct Shared<T> {
    state: Mutex<State<T>>,
    notify: Notify,
    continuations: Mutex<Vec<Continuation<T>>>,
    producers: Mutex<usize>,
}

impl<T: Clone + Send + 'static> Shared<T> {
    fn new() -> Self {
        Shared {
            state: Mutex::new(State::Empty),
            notify: Notify::new(),
            continuations: Mutex::new(Vec::new()),
            producers: Mutex::new(1),
        }
    }

    fn set_value(&self, value: T) -> Result<(), FutureError> {
        self.resolve(State::Value(value))
    }

    fn set_exception(&self, err: FutureError) -> Result<(), FutureError> {
        self.resolve(State::Exception(err))
    }

    /// Transitions `Empty -> Value/Exception` at most once, then runs every
    /// queued continuation outside the state lock — unlocking before
    /// invoking continuations means a continuation calling back into the
    /// future can't deadlock on its own lock.
    fn resolve(&self, new_state: State<T>) -> Result<(), FutureError> {
        {
            let mut guard = self.state.lock().expect("future mutex poisoned");
            if !matches!(*guard, State::Empty) {
                return Err(FutureError::PromiseAlreadySatisfied);
            }
            *guard = new_state;
        }
        self.notify.notify_waiters();
        self.drain_continuations();
        Ok(())
    }

    fn drain_continuations(&self) {
        let conts = std::mem::take(&mut *self.continuations.lock().expect("future mutex poisoned"));
        for cont in conts {
            let result = self.snapshot();
            (cont.run)(result);
        }
    }

    fn snapshot(&self) -> Result<T, FutureError> {
        match &*self.state.lock().expect("future mutex poisoned") {
            State::Empty => unreachable!("continuation ran before resolution"),
            State::Value(v) => Ok(v.clone()),
            State::Exception(e) => Err(*e),
        }
    }

    fn is_ready(&self) -> bool {
        !matches!(*self.state.lock().expect("future mutex poisoned"), State::Empty)
    }

    /// Adds a continuation: runs it immediately (on the caller's thread) if
    /// the cell is already resolved, else queues it to run on whichever
    /// thread eventually resolves the cell.
    fn then<F>(self: &Arc<Self>, f: F)
    where
        F: FnOnce(Result<T, FutureError>) + Send + 'static,
    {
        let mut guard = self.state.lock().expect("future mutex poisoned");
        if matches!(*guard, State::Empty) {
            self.continuations
                .lock()
                .expect("future mutex poisoned")
                .push(Continuation { run: Box::new(f) });
            return;
        }
        let result = match &*guard {
            State::Value(v) => Ok(v.clone()),
            State::Exception(e) => Err(*e),
            State::Empty => unreachable!(),
        };
        drop(guard);
        f(result);
    }

    fn acquire_producer(&self) {
        *self.producers.lock().expect("future mutex poisoned") += 1;
    }

    fn release_producer(&self) {
        let mut count = self.producers.lock().expect("future mutex poisoned");
        *count -= 1;
        if *count == 0 && !self.is_ready() {
            drop(count);
            let _ = self.set_exception(FutureError::BrokenPromise);
        }
    }
}

/// A single-assignment, multiply-observable value.
///
/// Cloning a `Future` shares the same underlying cell — every clone
/// observes the same eventual value.
pub struct Future<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Future<T> {
    fn clone(&self) -> Self {
        Future { shared: self.shared.clone() }
    }
}

impl<T: Clone + Send + 'static> Future<T> {
    /// Builds an already-resolved future, for handlers that produce a value
    /// synchronously but still need to return something future-shaped.
    pub fn ready(value: T) -> Self {
        let shared = Arc::new(Shared::new());
        let _ = shared.set_value(value);
        Future { shared }
    }

    pub fn is_ready(&self) -> bool {
        self.shared.is_ready()
    }

    /// Blocks the calling thread until the value is ready. Only ever called
    /// from a `spawn_blocking` context or outside the async runtime — inside
    /// an async task use [`Future::wait`].
    pub fn get(&self) -> Result<T, FutureError> {
        loop {
            {
                let guard = self.shared.state.lock().expect("future mutex poisoned");
                match &*guard {
                    State::Value(v) => return Ok(v.clone()),
                    State::Exception(e) => return Err(*e),
                    State::Empty => {}
                }
            }
            // Parking without polling would require a condvar; since the
            // runtime's Notify requires an async wait, synchronous callers
            // use a tight-yield loop backed by a short sleep. In practice
            // `get` is only used in tests against already-queued resolutions.
            std::thread::yield_now();
        }
    }

    /// Awaits the value asynchronously.
    pub async fn wait(&self) -> Result<T, FutureError> {
        loop {
            if self.shared.is_ready() {
                let guard = self.shared.state.lock().expect("future mutex poisoned");
                return match &*guard {
                    State::Value(v) => Ok(v.clone()),
                    State::Exception(e) => Err(*e),
                    State::Empty => unreachable!(),
                };
            }
            self.shared.notify.notified().await;
        }
    }

    /// Schedules `f` to run with the eventual result, on whichever context
    /// resolves the cell (or immediately, on the caller, if already
    /// resolved).
    pub fn then<F>(&self, f: F)
    where
        F: FnOnce(Result<T, FutureError>) + Send + 'static,
    {
        self.shared.then(f);
    }

    /// Schedules the continuation to run as a task submitted to `queue`
    /// instead of inline; if `queue` has been dropped by the time the future
    /// resolves, the continuation never runs and any derived future built on
    /// top of it should be treated as broken-promise by the caller.
    pub fn then_queue<F>(&self, queue: std::sync::Weak<crate::sync::work_queue::WorkQueue>, f: F)
    where
        F: FnOnce(Result<T, FutureError>) + Send + 'static,
    {
        self.shared.then(move |result| {
            if let Some(queue) = queue.upgrade() {
                queue.push(Box::new(move || f(result)));
            }
        });
    }
}

/// The producer side of a [`Future`]. Dropping every `Promise` for a cell
/// without setting a value resolves the future to *broken promise*.
pub struct Promise<T> {
    shared: Arc<Shared<T>>,
}

impl<T: Clone + Send + 'static> Promise<T> {
    pub fn new() -> Self {
        Promise { shared: Arc::new(Shared::new()) }
    }

    pub fn get_future(&self) -> Future<T> {
        Future { shared: self.shared.clone() }
    }

    pub fn set_value(&self, value: T) -> Result<(), FutureError> {
        self.shared.set_value(value)
    }

    pub fn set_exception(&self, err: FutureError) -> Result<(), FutureError> {
        self.shared.set_exception(err)
    }
}

impl<T> Default for Promise<T>
where
    T: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Promise<T> {
    fn clone(&self) -> Self {
        self.shared.acquire_producer();
        Promise { shared: self.shared.clone() }
    }
}

impl<T> Drop for Promise<T> {
    fn drop(&mut self) {
        self.shared.release_producer();
    }
}

/// The `void`-returning specialization: a future that only ever signals
/// completion or failure, with no payload. Modelled as
/// `Future<()>`/`Promise<()>` directly — `()` plays the role of a
/// bool-valued cell here since success carries no further information.
pub type VoidFuture = Future<()>;
pub type VoidPromise = Promise<()>;
