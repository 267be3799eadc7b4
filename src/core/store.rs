use std::sync::{Arc, PoisonError, RwLock};

use crate::core::plan::Plan;

/// Single most-recent-value cell for the current plan.
///
/// The planner is the only writer. Readers get a cheap handle that stays
/// valid for the duration of one steering tick even when a re-plan lands
/// mid-tick; a swap is indivisible, so a reader never observes a partially
/// written plan.
#[derive(Default)]
pub struct PlanStore(RwLock<Option<Arc<Plan>>>);

impl PlanStore {
    /// Atomically replace the previous plan, if any.
    pub fn replace(&self, plan: Plan) {
        *self.0.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(plan));
    }

    pub fn current(&self) -> Option<Arc<Plan>> {
        self.0.read().unwrap_or_else(PoisonError::into_inner).clone()
    }
}
