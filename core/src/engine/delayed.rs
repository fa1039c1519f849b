//! Delayed-function queue
//!
//! Holds pending calls with their countdowns. The host drives time by calling
//! `advance` with elapsed ticks or milliseconds; due entries are handed back for
//! dispatch and either re-armed for their next repeat or dropped.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::types::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DelayUnit {
    Milliseconds,
    Ticks,
}

/// A pending call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DelayedFunction {
    pub template: String,
    pub args: Vec<Value>,
    pub num_passed_params: usize,
    pub first_delay: i32,
    /// Runs after the first one; 0 runs once.
    pub repeat_count: i32,
    pub subsequent_delay: i32,
    pub crosses_frames: bool,
    pub unit: DelayUnit,
    pub call_site: String,
    /// Countdown to the next run, in `unit`.
    pub remaining: i64,
    /// Runs already made.
    pub runs: i32,
}

impl DelayedFunction {
    /// Repeats still to come after the next run.
    pub fn repeats_left(&self) -> i32 {
        (self.repeat_count - self.runs).max(0)
    }
}

#[derive(Debug, Default, Clone)]
pub struct DelayedQueue {
    pending: Vec<DelayedFunction>,
}

impl DelayedQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DelayedFunction> {
        self.pending.iter()
    }

    pub fn get(&self, index: usize) -> Option<&DelayedFunction> {
        self.pending.get(index)
    }

    pub fn enqueue(&mut self, mut entry: DelayedFunction) {
        entry.remaining = i64::from(entry.first_delay);
        entry.runs = 0;
        debug!(
            function = %entry.template,
            delay = entry.first_delay,
            repeats = entry.repeat_count,
            unit = ?entry.unit,
            "queued delayed function"
        );
        self.pending.push(entry);
    }

    /// Remove entries whose template name starts with `prefix` (case-insensitive).
    /// A blank prefix clears the queue. Returns the number removed.
    pub fn cancel_by_prefix(&mut self, prefix: &str) -> usize {
        let before = self.pending.len();
        if prefix.is_empty() {
            self.pending.clear();
        } else {
            let prefix = prefix.to_ascii_lowercase();
            self.pending
                .retain(|f| !f.template.to_ascii_lowercase().starts_with(&prefix));
        }
        before - self.pending.len()
    }

    /// Count down entries of `unit` by `amount` and return those now due, in queue
    /// order. Each due entry runs at most once per call.
    pub fn advance(&mut self, unit: DelayUnit, amount: i64) -> Vec<DelayedFunction> {
        let mut due = Vec::new();
        self.pending.retain_mut(|entry| {
            if entry.unit != unit {
                return true;
            }
            entry.remaining -= amount;
            if entry.remaining > 0 {
                return true;
            }
            due.push(entry.clone());
            entry.runs += 1;
            if entry.runs > entry.repeat_count {
                return false;
            }
            entry.remaining += i64::from(entry.subsequent_delay);
            true
        });
        due
    }

    /// The host moved to a new frame: drop entries that do not survive it.
    pub fn frame_changed(&mut self) -> usize {
        let before = self.pending.len();
        self.pending.retain(|f| f.crosses_frames);
        before - self.pending.len()
    }
}
