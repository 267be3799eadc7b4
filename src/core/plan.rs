use chrono::{DateTime, FixedOffset, TimeDelta};

use crate::core::dispatch::Dispatch;

/// One planning slot with its dispatch decision. Immutable once created.
#[derive(Clone, Copy, Debug)]
pub struct Slot {
    pub start_time: DateTime<FixedOffset>,
    pub duration: TimeDelta,
    pub dispatch: Dispatch,
}

impl Slot {
    pub fn end_time(&self) -> DateTime<FixedOffset> {
        self.start_time + self.duration
    }

    /// Half-open containment: a slot owns `[start_time, end_time)`.
    pub fn contains(&self, time: DateTime<FixedOffset>) -> bool {
        self.start_time <= time && time < self.end_time()
    }
}

/// A dispatch schedule from the planning instant to the horizon.
///
/// Slots are contiguous, non-overlapping and strictly increasing; a new plan
/// replaces the previous one wholesale.
#[derive(Clone, Debug)]
pub struct Plan {
    pub generated_at: DateTime<FixedOffset>,
    pub horizon_end: DateTime<FixedOffset>,
    pub slots: Vec<Slot>,
}

impl Plan {
    /// The single slot covering the given instant, if the plan still does.
    pub fn active_slot(&self, now: DateTime<FixedOffset>) -> Option<&Slot> {
        self.slots.iter().find(|slot| slot.contains(now))
    }
}
