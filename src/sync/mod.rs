//! Concurrency primitives the RPC and transport layers are built on: a
//! zero-counting semaphore for quiescing in-flight work before teardown, a
//! multi-producer/multi-consumer work queue, and a timer queue.
//!
//! A generic counting semaphore and a monitor (mutex+value) are folded
//! into `tokio::sync` primitives used directly at the call sites that need
//! them; only the primitives with RPC-specific contracts (zero-wait,
//! cancel-but-still-deliver-once) get dedicated types here.

pub mod timer_queue;
pub mod work_queue;
pub mod zero_semaphore;

pub use timer_queue::TimerQueue;
pub use work_queue::WorkQueue;
pub use zero_semaphore::ZeroSemaphore;
