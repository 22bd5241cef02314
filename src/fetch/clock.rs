// src/fetch/clock.rs
//! Time source used by the gates.
//!
//! Production code sleeps on the tokio timer. Tests swap in [`FakeClock`],
//! which advances a virtual clock instantly so exact wait durations can be
//! asserted without slowing the suite down.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

#[async_trait]
pub trait Clock: Send + Sync {
    /// Time elapsed since the clock was created.
    fn elapsed(&self) -> Duration;

    /// Suspend the caller for `d`.
    async fn sleep(&self, d: Duration);
}

/// Real clock backed by `tokio::time`.
#[derive(Debug)]
pub struct TokioClock {
    start: tokio::time::Instant,
}

impl TokioClock {
    pub fn new() -> Self {
        Self {
            start: tokio::time::Instant::now(),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for TokioClock {
    fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    async fn sleep(&self, d: Duration) {
        tokio::time::sleep(d).await;
    }
}

/// Simulated clock: `sleep` returns immediately and moves virtual time forward.
#[derive(Debug, Default)]
pub struct FakeClock {
    inner: Mutex<FakeState>,
}

#[derive(Debug, Default)]
struct FakeState {
    now: Duration,
    sleeps: Vec<Duration>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every sleep requested so far, in call order.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.inner
            .lock()
            .expect("fake clock mutex poisoned")
            .sleeps
            .clone()
    }
}

#[async_trait]
impl Clock for FakeClock {
    fn elapsed(&self) -> Duration {
        self.inner.lock().expect("fake clock mutex poisoned").now
    }

    async fn sleep(&self, d: Duration) {
        let mut g = self.inner.lock().expect("fake clock mutex poisoned");
        g.now += d;
        g.sleeps.push(d);
    }
}
