// src/fetch/gate.rs
//! Quota-then-wait admission control for one pacing dimension.
//!
//! A gate lets `capacity` actions through, then the next action waits for
//! `period` and opens a fresh window in which that action already counts.
//! The gate is owned by a single actor; every mutating method takes
//! `&mut self`.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;

use super::clock::Clock;
use super::error::ConfigError;

pub struct Gate {
    name: &'static str,
    clock: Arc<dyn Clock>,
    period: Duration,
    capacity: usize,
    remaining: usize,
}

impl Gate {
    pub fn new(
        name: &'static str,
        clock: Arc<dyn Clock>,
        period: Duration,
        capacity: usize,
    ) -> Result<Self, ConfigError> {
        if capacity == 0 {
            return Err(ConfigError::ZeroCapacity(name));
        }
        Ok(Self {
            name,
            clock,
            period,
            capacity,
            remaining: capacity,
        })
    }

    /// Take one slot. Returns `true` when the call had to wait for `period`.
    pub async fn try_advance(&mut self) -> bool {
        if self.remaining > 0 {
            self.remaining -= 1;
            return false;
        }

        tracing::debug!(gate = self.name, period = ?self.period, "gate exhausted, waiting");
        counter!("edgar_gate_waits_total", "gate" => self.name).increment(1);
        self.clock.sleep(self.period).await;
        // The call that triggered the wait belongs to the new window.
        self.remaining = self.capacity - 1;
        true
    }

    /// Wait a full period regardless of the remaining quota, then refill.
    pub async fn force_wait(&mut self) {
        tracing::debug!(gate = self.name, period = ?self.period, "forced gate wait");
        counter!("edgar_gate_waits_total", "gate" => self.name).increment(1);
        self.clock.sleep(self.period).await;
        self.remaining = self.capacity;
    }

    pub fn reset(&mut self) {
        self.remaining = self.capacity;
    }

    pub fn remaining(&self) -> usize {
        self.remaining
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}

impl std::fmt::Debug for Gate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gate")
            .field("name", &self.name)
            .field("period", &self.period)
            .field("capacity", &self.capacity)
            .field("remaining", &self.remaining)
            .finish()
    }
}
