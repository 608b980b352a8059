//! A thread-safe FIFO of zero-argument callables, with non-blocking,
//! bulk-drain, and (a)wait-pop variants.
//!
//! Built on a plain `std::sync::Mutex` plus a `tokio::sync::Notify` instead
//! of a condvar, so `wait_pop` composes with `tokio::select!` the way the
//! rest of the transport layer does.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::Notify;

pub type Job = Box<dyn FnOnce() + Send>;

pub struct WorkQueue {
    jobs: Mutex<VecDeque<Job>>,
    notify: Notify,
}

impl Default for WorkQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkQueue {
    pub fn new() -> Self {
        WorkQueue { jobs: Mutex::new(VecDeque::new()), notify: Notify::new() }
    }

    pub fn push(&self, job: Job) {
        self.jobs.lock().expect("work queue mutex poisoned").push_back(job);
        self.notify.notify_one();
    }

    /// Pops one job without blocking; `None` if the queue is empty.
    pub fn try_pop(&self) -> Option<Job> {
        self.jobs.lock().expect("work queue mutex poisoned").pop_front()
    }

    /// Drains every job currently queued in one shot.
    pub fn drain(&self) -> Vec<Job> {
        let mut guard = self.jobs.lock().expect("work queue mutex poisoned");
        guard.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.jobs.lock().expect("work queue mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pops a job, waiting asynchronously until one is available.
    pub async fn wait_pop(&self) -> Job {
        loop {
            if let Some(job) = self.try_pop() {
                return job;
            }
            self.notify.notified().await;
        }
    }

    /// Pops a job, waiting up to `timeout`; `None` on timeout.
    pub async fn wait_pop_timeout(&self, timeout: Duration) -> Option<Job> {
        tokio::time::timeout(timeout, self.wait_pop()).await.ok()
    }
}
