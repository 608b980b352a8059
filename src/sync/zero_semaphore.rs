//! A counting semaphore whose only public wait condition is "the count is
//! zero", used to let a transport quiesce its in-flight asynchronous
//! operations before it tears itself down.
//!
//! Used by the TCP transport to wait for outstanding completions on
//! shutdown before dropping the socket.

use std::sync::Mutex;
use tokio::sync::Notify;

pub struct ZeroSemaphore {
    count: Mutex<i64>,
    notify: Notify,
}

impl Default for ZeroSemaphore {
    fn default() -> Self {
        Self::new()
    }
}

impl ZeroSemaphore {
    pub fn new() -> Self {
        ZeroSemaphore { count: Mutex::new(0), notify: Notify::new() }
    }

    pub fn increment(&self) {
        let mut count = self.count.lock().expect("zero-semaphore mutex poisoned");
        *count += 1;
    }

    pub fn decrement(&self) {
        let mut count = self.count.lock().expect("zero-semaphore mutex poisoned");
        *count -= 1;
        if *count == 0 {
            self.notify.notify_waiters();
        }
    }

    pub fn count(&self) -> i64 {
        *self.count.lock().expect("zero-semaphore mutex poisoned")
    }

    /// Waits until the counter reaches zero. If it's already zero, returns
    /// immediately.
    pub async fn wait(&self) {
        loop {
            if self.count() == 0 {
                return;
            }
            self.notify.notified().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn wait_returns_immediately_at_zero() {
        let sem = ZeroSemaphore::new();
        sem.wait().await;
    }

    #[tokio::test]
    async fn wait_blocks_until_every_increment_is_matched() {
        let sem = Arc::new(ZeroSemaphore::new());
        sem.increment();
        sem.increment();
        let waiter = {
            let sem = sem.clone();
            tokio::spawn(async move {
                sem.wait().await;
            })
        };
        sem.decrement();
        sem.decrement();
        tokio::time::timeout(std::time::Duration::from_secs(1), waiter)
            .await
            .expect("wait should complete once the counter reaches zero")
            .unwrap();
    }
}
