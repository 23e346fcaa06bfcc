//! Shared clock for replaying several symbols at once.
//!
//! Every unreleased bar is an event, ordered by close time with ties broken
//! by symbol. An engine thread may release its next bar only when that bar is
//! the earliest pending event, and keeps the turn until its tick has finished.
//! The governor and the paper broker therefore see bars in the same order on
//! every run, whatever the thread scheduling.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{Condvar, Mutex};
use tracing::debug;

/// How often a waiting thread rechecks the shutdown flag.
const SHUTDOWN_CHECK: Duration = Duration::from_millis(50);

#[derive(Debug, Default)]
struct Schedule {
    events: VecDeque<(DateTime<Utc>, String)>,
    remaining: HashMap<String, usize>,
}

impl Schedule {
    fn pop_if_front(&mut self, symbol: &str) -> bool {
        if !self.events.front().is_some_and(|(_, s)| s == symbol) {
            return false;
        }
        self.events.pop_front();
        if let Some(n) = self.remaining.get_mut(symbol) {
            *n = n.saturating_sub(1);
        }
        true
    }
}

pub struct ReplayClock {
    schedule: Mutex<Schedule>,
    advanced: Condvar,
}

impl ReplayClock {
    pub fn new(mut events: Vec<(DateTime<Utc>, String)>) -> Self {
        events.sort();
        let mut remaining: HashMap<String, usize> = HashMap::new();
        for (_, symbol) in &events {
            *remaining.entry(symbol.clone()).or_default() += 1;
        }
        Self {
            schedule: Mutex::new(Schedule {
                events: events.into(),
                remaining,
            }),
            advanced: Condvar::new(),
        }
    }

    /// Handle for the thread replaying `symbol`. Dropping it withdraws the
    /// symbol's remaining events so the other threads are not left waiting.
    pub fn participant(&self, symbol: &str) -> Participant<'_> {
        Participant {
            clock: self,
            symbol: symbol.to_string(),
        }
    }

    pub fn pending(&self) -> usize {
        self.schedule.lock().events.len()
    }

    fn retire(&self, symbol: &str) {
        let mut schedule = self.schedule.lock();
        if schedule.remaining.remove(symbol).unwrap_or(0) > 0 {
            debug!(symbol = %symbol, "withdrawing unreplayed bars");
            schedule.events.retain(|(_, s)| s != symbol);
        }
        self.advanced.notify_all();
    }
}

pub struct Participant<'a> {
    clock: &'a ReplayClock,
    symbol: String,
}

impl<'a> Participant<'a> {
    /// Block until this symbol's next bar is the earliest pending event.
    /// `None` once the symbol has no events left or `shutdown` is raised.
    pub fn wait_turn(&self, shutdown: &AtomicBool) -> Option<Turn<'a>> {
        let clock = self.clock;
        let mut schedule = clock.schedule.lock();
        loop {
            if shutdown.load(Ordering::SeqCst) {
                return None;
            }
            if schedule.remaining.get(&self.symbol).copied().unwrap_or(0) == 0 {
                return None;
            }
            if schedule.events.front().is_some_and(|(_, s)| *s == self.symbol) {
                return Some(Turn {
                    clock,
                    symbol: self.symbol.clone(),
                });
            }
            clock.advanced.wait_for(&mut schedule, SHUTDOWN_CHECK);
        }
    }
}

impl Drop for Participant<'_> {
    fn drop(&mut self) {
        self.clock.retire(&self.symbol);
    }
}

/// Permission to release one bar. The event is consumed when the turn drops.
pub struct Turn<'a> {
    clock: &'a ReplayClock,
    symbol: String,
}

impl Drop for Turn<'_> {
    fn drop(&mut self) {
        let mut schedule = self.clock.schedule.lock();
        if schedule.pop_if_front(&self.symbol) {
            self.clock.advanced.notify_all();
        }
    }
}
