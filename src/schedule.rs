use std::time::{Duration, Instant};

/// One-shot deferred action that can be cancelled or rescheduled.
///
/// Scheduling again replaces the pending deadline, so a superseded action
/// never fires late.
#[derive(Debug, Default, Clone, Copy)]
pub struct Deferred {
    due: Option<Instant>,
}

impl Deferred {
    pub fn schedule(&mut self, now: Instant, delay: Duration) {
        self.due = Some(now + delay);
    }

    pub fn cancel(&mut self) {
        self.due = None;
    }

    #[cfg(test)]
    pub fn is_pending(&self) -> bool {
        self.due.is_some()
    }

    /// Time left before the action fires.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.due.map(|due| due.saturating_duration_since(now))
    }

    /// Returns `true` once, when the deadline has passed.
    pub fn fire(&mut self, now: Instant) -> bool {
        match self.due {
            Some(due) if now >= due => {
                self.due = None;
                true
            }
            _ => false,
        }
    }
}

/// Transient message hidden automatically after a delay.
#[derive(Debug, Default)]
pub struct Banner {
    message: Option<String>,
    hide: Deferred,
}

impl Banner {
    pub fn show(&mut self, message: impl Into<String>, now: Instant, visible_for: Duration) {
        self.message = Some(message.into());
        self.hide.schedule(now, visible_for);
    }

    pub fn dismiss(&mut self) {
        self.message = None;
        self.hide.cancel();
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.hide.remaining(now)
    }

    pub fn tick(&mut self, now: Instant) {
        if self.hide.fire(now) {
            self.message = None;
        }
    }
}
