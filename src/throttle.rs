//! Scan gate: cooldown and duplicate suppression for a continuous scanner
//!
//! A live camera yields the same code on many consecutive frames. The gate
//! lets a value through once, then holds everything back for the cooldown,
//! and never lets the last accepted value through again until [`ScanGate::reset`].

use crate::models::{DetectionResult, Outcome};
use std::time::{Duration, Instant};

/// Cooldown applied after each accepted code
pub const DEFAULT_COOLDOWN: Duration = Duration::from_millis(2000);

/// Decides which detections a continuous scanner reports
#[derive(Debug, Clone)]
pub struct ScanGate {
    cooldown: Duration,
    active: bool,
    last_value: Option<String>,
    last_accepted: Option<Instant>,
}

impl ScanGate {
    /// Active gate with the default cooldown
    pub fn new() -> Self {
        Self::with_cooldown(DEFAULT_COOLDOWN)
    }

    /// Active gate with a custom cooldown
    pub fn with_cooldown(cooldown: Duration) -> Self {
        Self {
            cooldown,
            active: true,
            last_value: None,
            last_accepted: None,
        }
    }

    /// [`accept_at`](Self::accept_at) using the current time
    pub fn accept(&mut self, value: &str) -> bool {
        self.accept_at(value, Instant::now())
    }

    /// Whether `value`, seen at `now`, should be reported
    ///
    /// Rejected while paused, during the cooldown, and when `value` equals the
    /// last accepted value.
    pub fn accept_at(&mut self, value: &str, now: Instant) -> bool {
        if !self.active {
            return false;
        }
        if let Some(last) = self.last_accepted {
            if now.saturating_duration_since(last) < self.cooldown {
                return false;
            }
        }
        if self.last_value.as_deref() == Some(value) {
            return false;
        }

        self.last_value = Some(value.to_owned());
        self.last_accepted = Some(now);
        true
    }

    /// The outcome's detection if it carries a value the gate accepts
    pub fn filter<'a>(&mut self, outcome: &'a Outcome) -> Option<&'a DetectionResult> {
        let result = outcome.result()?;
        let value = result.value.as_deref()?;
        self.accept(value).then_some(result)
    }

    /// Stop accepting anything
    pub fn pause(&mut self) {
        self.active = false;
    }

    /// Accept again, keeping the duplicate and cooldown history
    pub fn resume(&mut self) {
        self.active = true;
    }

    /// True unless paused
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Forget history and resume
    pub fn reset(&mut self) {
        self.active = true;
        self.last_value = None;
        self.last_accepted = None;
    }
}

impl Default for ScanGate {
    fn default() -> Self {
        Self::new()
    }
}
