use chrono::{DateTime, FixedOffset};

use crate::{
    core::{dispatch::Dispatch, plan::Plan},
    quantity::power::Watts,
};

/// Outcome of one steering tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Enforcement {
    /// No plan has been generated yet.
    Unplanned,

    /// The plan no longer covers the current instant.
    Expired,

    /// Grid import exceeded the ceiling; the plan is overridden.
    Curtailed { import_power: Watts },

    /// The active slot applies as planned.
    Scheduled(Dispatch),
}

impl Enforcement {
    /// The dispatch to apply: everything except a scheduled slot resolves
    /// to the safe all-zero dispatch.
    pub const fn dispatch(self) -> Dispatch {
        match self {
            Self::Scheduled(dispatch) => dispatch,
            Self::Unplanned | Self::Expired | Self::Curtailed { .. } => Dispatch::SAFE,
        }
    }
}

/// Pick the dispatch for the current instant.
///
/// The import guard always wins: a slot is applied verbatim only while the
/// live grid import stays at or under the ceiling.
pub fn enforce(
    plan: Option<&Plan>,
    now: DateTime<FixedOffset>,
    import_power: Watts,
    import_ceiling: Watts,
) -> Enforcement {
    let Some(plan) = plan else {
        return Enforcement::Unplanned;
    };
    let Some(slot) = plan.active_slot(now) else {
        return Enforcement::Expired;
    };
    if import_power > import_ceiling {
        return Enforcement::Curtailed { import_power };
    }
    Enforcement::Scheduled(slot.dispatch)
}

#[cfg(test)]
mod tests {
    use chrono::{TimeDelta, TimeZone};

    use super::*;
    use crate::{
        core::{dispatch::HeaterStage, plan::Slot},
        quantity::current::Amperes,
    };

    fn at(hour: u32, minute: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(3600)
            .unwrap()
            .with_ymd_and_hms(2026, 8, 5, hour, minute, 0)
            .unwrap()
    }

    fn busy_dispatch() -> Dispatch {
        Dispatch {
            battery_charge_current: Amperes(25.0),
            heater_stage: HeaterStage::Full,
            export_limit: Watts(12_200.0),
        }
    }

    fn plan() -> Plan {
        let slot =
            Slot { start_time: at(10, 0), duration: TimeDelta::minutes(15), dispatch: busy_dispatch() };
        Plan { generated_at: at(10, 0), horizon_end: at(10, 15), slots: vec![slot] }
    }

    #[test]
    fn test_no_plan_is_safe() {
        let enforcement = enforce(None, at(10, 5), Watts::ZERO, Watts(100.0));
        assert_eq!(enforcement, Enforcement::Unplanned);
        assert_eq!(enforcement.dispatch(), Dispatch::SAFE);
    }

    #[test]
    fn test_expired_plan_is_safe() {
        let enforcement = enforce(Some(&plan()), at(11, 0), Watts::ZERO, Watts(100.0));
        assert_eq!(enforcement, Enforcement::Expired);
        assert_eq!(enforcement.dispatch(), Dispatch::SAFE);
    }

    #[test]
    fn test_guard_overrides_the_slot() {
        let enforcement = enforce(Some(&plan()), at(10, 5), Watts(150.0), Watts(100.0));
        assert_eq!(enforcement, Enforcement::Curtailed { import_power: Watts(150.0) });
        // Exactly the all-zero dispatch, no matter what the slot says:
        assert_eq!(enforcement.dispatch(), Dispatch::SAFE);
        assert_eq!(enforcement.dispatch().heater_stage.relays(), (false, false));
    }

    #[test]
    fn test_import_at_the_ceiling_is_allowed() {
        let enforcement = enforce(Some(&plan()), at(10, 5), Watts(100.0), Watts(100.0));
        assert_eq!(enforcement, Enforcement::Scheduled(busy_dispatch()));
    }

    #[test]
    fn test_slot_applies_verbatim() {
        let enforcement = enforce(Some(&plan()), at(10, 5), Watts(50.0), Watts(100.0));
        assert_eq!(enforcement.dispatch(), busy_dispatch());
    }
}
