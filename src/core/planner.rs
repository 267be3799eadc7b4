use bon::Builder;
use chrono::{DateTime, DurationRound, FixedOffset, TimeDelta};

use crate::{
    cli::{BatteryArgs, BoilerArgs, PlanningArgs},
    core::{
        dispatch::{Dispatch, HeaterStage},
        need::ResourceNeed,
        plan::{Plan, Slot},
        series::HourlySeries,
    },
    prelude::*,
    quantity::{
        current::Amperes,
        energy::KilowattHours,
        percent::Percent,
        power::Watts,
        rate::MegawattHourRate,
    },
};

/// Builds the dispatch schedule for one planning horizon.
///
/// Needs and the estimated state of charge are threaded as running state
/// across the slot loop: a single forward pass that never revisits an
/// earlier slot's decision.
#[derive(Builder)]
pub struct Planner<'a> {
    pv: &'a HourlySeries<KilowattHours>,
    prices: &'a HourlySeries<MegawattHourRate>,

    /// Measured state of charge at the planning instant.
    state_of_charge: Percent,

    battery_need: ResourceNeed,
    boiler_need: ResourceNeed,

    battery: BatteryArgs,
    boiler: BoilerArgs,
    planning: PlanningArgs,
}

impl Planner<'_> {
    /// Build the slot plan covering `[now, horizon_end)`.
    ///
    /// Slots are aligned to slot-duration boundaries: the first slot is
    /// shortened to the next boundary when `now` is mid-slot, and the last
    /// one is truncated at the horizon. Empty forecast or price series
    /// degrade to zero PV and an unknown price — planning never fails.
    #[instrument(skip_all, fields(now = %now, horizon_end = %horizon_end))]
    #[must_use]
    pub fn generate(
        mut self,
        now: DateTime<FixedOffset>,
        horizon_end: DateTime<FixedOffset>,
    ) -> Plan {
        let slot_duration = self.planning.slot_length();
        self.state_of_charge = self.state_of_charge.clamped();

        let mut slots = Vec::new();
        let mut start_time = now;
        while start_time < horizon_end {
            let end_time = next_boundary(start_time, slot_duration).min(horizon_end);
            let duration = end_time - start_time;
            let pv_energy = self.pv.get(start_time).unwrap_or(KilowattHours::ZERO)
                * (duration.as_seconds_f64() / 3600.0);
            let price = self.prices.get(start_time);

            let dispatch = self.dispatch_slot(price, pv_energy);
            debug!(%start_time, ?pv_energy, ?price, ?dispatch, "slot");
            slots.push(Slot { start_time, duration, dispatch });

            start_time = end_time;
        }

        info!(
            n_slots = slots.len(),
            state_of_charge = %self.state_of_charge,
            "generated",
        );
        Plan { generated_at: now, horizon_end, slots }
    }

    /// First matching rule wins; no rule is re-evaluated once applied.
    fn dispatch_slot(
        &mut self,
        price: Option<MegawattHourRate>,
        pv_energy: KilowattHours,
    ) -> Dispatch {
        // 1. Protect the battery against deep discharge, price notwithstanding:
        if self.state_of_charge < self.battery.emergency_state_of_charge {
            let heater_stage = if self.planning.emergency_heating {
                self.minimum_heater_stage(pv_energy)
            } else {
                HeaterStage::Off
            };
            self.charge(pv_energy);
            return Dispatch {
                battery_charge_current: self
                    .battery
                    .emergency_charge_current
                    .min(self.battery.max_charge_current),
                heater_stage,
                export_limit: Watts::ZERO,
            };
        }

        // 2. Sell when the spot price clears the threshold; an unknown price never does:
        if price.is_some_and(|price| price >= self.planning.export_price_threshold) {
            return Dispatch {
                battery_charge_current: Amperes::ZERO,
                heater_stage: HeaterStage::Off,
                export_limit: self.planning.max_export_limit,
            };
        }

        // 3. The battery first, towards its minimum:
        if self.battery_need.to_minimum.is_positive() {
            self.charge(pv_energy);
            return Dispatch {
                battery_charge_current: self.battery.max_charge_current,
                heater_stage: HeaterStage::Off,
                export_limit: Watts::ZERO,
            };
        }

        // 4. The boiler towards its minimum, staged by the PV the slot is expected to yield:
        if self.boiler_need.to_minimum.is_positive() {
            let heater_stage = self.minimum_heater_stage(pv_energy);
            self.boiler_need.absorb(pv_energy);
            return Dispatch {
                battery_charge_current: Amperes::ZERO,
                heater_stage,
                export_limit: Watts::ZERO,
            };
        }

        // 5. Top the battery up to its optimum while PV remains:
        if self.battery_need.to_optimal.is_positive() && pv_energy.is_positive() {
            self.charge(pv_energy);
            return Dispatch {
                battery_charge_current: self.battery.max_charge_current,
                heater_stage: HeaterStage::Off,
                export_limit: Watts::ZERO,
            };
        }

        // 6. Heat towards the optimum on the first element only:
        if self.boiler_need.to_optimal.is_positive()
            && pv_energy >= self.boiler.partial_stage_pv_energy
        {
            self.boiler_need.absorb(pv_energy);
            return Dispatch {
                battery_charge_current: Amperes::ZERO,
                heater_stage: HeaterStage::Partial,
                export_limit: Watts::ZERO,
            };
        }

        // 7. Nothing left to do:
        Dispatch::SAFE
    }

    /// Model the slot's PV as absorbed by the battery: later slots see the
    /// reduced remaining need and the advanced state of charge.
    fn charge(&mut self, pv_energy: KilowattHours) {
        self.battery_need.absorb(pv_energy);
        self.state_of_charge =
            (self.state_of_charge + Percent(pv_energy / self.battery.capacity * 100.0)).clamped();
    }

    fn minimum_heater_stage(&self, pv_energy: KilowattHours) -> HeaterStage {
        if !self.boiler_need.to_minimum.is_positive() {
            HeaterStage::Off
        } else if pv_energy >= self.boiler.full_stage_pv_energy {
            HeaterStage::Full
        } else if pv_energy >= self.boiler.partial_stage_pv_energy {
            HeaterStage::Partial
        } else if self.boiler.grid_assisted_heating {
            HeaterStage::Partial
        } else {
            HeaterStage::Off
        }
    }
}

fn next_boundary(time: DateTime<FixedOffset>, slot_duration: TimeDelta) -> DateTime<FixedOffset> {
    time.duration_trunc(slot_duration).unwrap_or(time) + slot_duration
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use itertools::Itertools;

    use super::*;
    use crate::quantity::temperature::Celsius;

    const NO_NEED: ResourceNeed =
        ResourceNeed { to_minimum: KilowattHours::ZERO, to_optimal: KilowattHours::ZERO };

    fn offset() -> FixedOffset {
        FixedOffset::east_opt(3600).unwrap()
    }

    fn at(hour: u32, minute: u32) -> DateTime<FixedOffset> {
        offset().with_ymd_and_hms(2026, 8, 5, hour, minute, 0).unwrap()
    }

    fn battery_args() -> BatteryArgs {
        BatteryArgs {
            capacity: KilowattHours(12.0),
            max_charge_current: Amperes(25.0),
            emergency_charge_current: Amperes(12.0),
            minimum_state_of_charge: Percent(80.0),
            optimal_state_of_charge: Percent(100.0),
            emergency_state_of_charge: Percent(20.0),
        }
    }

    fn boiler_args() -> BoilerArgs {
        BoilerArgs {
            volume_litres: 120.0,
            specific_heat_wh: 1.163,
            efficiency: 0.9,
            minimum_temperature: Celsius(55.0),
            optimal_temperature: Celsius(70.0),
            partial_stage_pv_energy: KilowattHours(0.2),
            full_stage_pv_energy: KilowattHours(0.4),
            grid_assisted_heating: false,
        }
    }

    fn planning_args() -> PlanningArgs {
        PlanningArgs {
            utc_offset: offset(),
            slot_duration: "15m".parse().unwrap(),
            fallback_horizon_hour: 20,
            export_price_threshold: MegawattHourRate(300.0),
            max_export_limit: Watts(12_200.0),
            emergency_heating: false,
        }
    }

    struct Setup {
        state_of_charge: Percent,
        battery_need: ResourceNeed,
        boiler_need: ResourceNeed,
        battery: BatteryArgs,
        boiler: BoilerArgs,
        planning: PlanningArgs,
    }

    impl Default for Setup {
        fn default() -> Self {
            Self {
                state_of_charge: Percent(100.0),
                battery_need: NO_NEED,
                boiler_need: NO_NEED,
                battery: battery_args(),
                boiler: boiler_args(),
                planning: planning_args(),
            }
        }
    }

    impl Setup {
        fn generate(
            &self,
            pv: &HourlySeries<KilowattHours>,
            prices: &HourlySeries<MegawattHourRate>,
            now: DateTime<FixedOffset>,
            horizon_end: DateTime<FixedOffset>,
        ) -> Plan {
            Planner::builder()
                .pv(pv)
                .prices(prices)
                .state_of_charge(self.state_of_charge)
                .battery_need(self.battery_need)
                .boiler_need(self.boiler_need)
                .battery(self.battery)
                .boiler(self.boiler)
                .planning(self.planning)
                .build()
                .generate(now, horizon_end)
        }
    }

    #[test]
    fn test_slots_cover_the_horizon_exactly() {
        let pv = HourlySeries::default();
        let prices = HourlySeries::default();
        let plan = Setup::default().generate(&pv, &prices, at(10, 7), at(12, 0));

        // The first slot is shortened to the next boundary:
        assert_eq!(plan.slots[0].start_time, at(10, 7));
        assert_eq!(plan.slots[0].end_time(), at(10, 15));

        for (slot, next) in plan.slots.iter().tuple_windows() {
            assert_eq!(slot.end_time(), next.start_time);
            assert!(slot.start_time < next.start_time);
        }
        assert_eq!(plan.slots.last().unwrap().end_time(), at(12, 0));
    }

    #[test]
    fn test_empty_forecasts_degrade_to_an_idle_plan() {
        let pv = HourlySeries::default();
        let prices = HourlySeries::default();
        let plan = Setup::default().generate(&pv, &prices, at(10, 0), at(12, 0));

        assert_eq!(plan.slots.len(), 8);
        assert!(plan.slots.iter().all(|slot| slot.dispatch == Dispatch::SAFE));
    }

    #[test]
    fn test_export_when_the_price_clears_the_threshold() {
        // Battery full, boiler above optimum, price above the threshold:
        let pv = HourlySeries::default();
        let prices = HourlySeries::from_latest_points([(at(10, 0), MegawattHourRate(350.0))]);
        let plan = Setup::default().generate(&pv, &prices, at(10, 0), at(11, 0));

        let dispatch = plan.slots[0].dispatch;
        assert_eq!(dispatch.export_limit, Watts(12_200.0));
        assert_eq!(dispatch.battery_charge_current, Amperes::ZERO);
        assert_eq!(dispatch.heater_stage, HeaterStage::Off);
    }

    #[test]
    fn test_export_takes_precedence_over_minimum_needs() {
        let pv = HourlySeries::default();
        let prices = HourlySeries::from_latest_points([(at(10, 0), MegawattHourRate(500.0))]);
        let setup = Setup {
            state_of_charge: Percent(50.0),
            battery_need: ResourceNeed {
                to_minimum: KilowattHours(3.6),
                to_optimal: KilowattHours(6.0),
            },
            boiler_need: ResourceNeed {
                to_minimum: KilowattHours(0.8),
                to_optimal: KilowattHours(3.0),
            },
            ..Setup::default()
        };
        let plan = setup.generate(&pv, &prices, at(10, 0), at(10, 15));

        let dispatch = plan.slots[0].dispatch;
        assert_eq!(dispatch.export_limit, Watts(12_200.0));
        assert_eq!(dispatch.battery_charge_current, Amperes::ZERO);
        assert_eq!(dispatch.heater_stage, HeaterStage::Off);
    }

    #[test]
    fn test_emergency_overrides_the_price_signal() {
        let pv = HourlySeries::default();
        let prices = HourlySeries::from_latest_points([(at(10, 0), MegawattHourRate(500.0))]);
        let setup = Setup { state_of_charge: Percent(15.0), ..Setup::default() };
        let plan = setup.generate(&pv, &prices, at(10, 0), at(10, 15));

        let dispatch = plan.slots[0].dispatch;
        assert_eq!(dispatch.battery_charge_current, Amperes(12.0));
        assert_eq!(dispatch.export_limit, Watts::ZERO);
        assert_eq!(dispatch.heater_stage, HeaterStage::Off);
    }

    #[test]
    fn test_minimum_need_decrements_by_slot_pv() {
        // 2 kWh per hour is 0.5 kWh per quarter: the 1-kWh minimum need is
        // gone after two slots and the equal optimum leaves the rest idle.
        let pv = HourlySeries::from_summed_points([
            (at(10, 0), KilowattHours(2.0)),
            (at(11, 0), KilowattHours(2.0)),
        ]);
        let prices = HourlySeries::default();
        let setup = Setup {
            state_of_charge: Percent(50.0),
            battery_need: ResourceNeed {
                to_minimum: KilowattHours(1.0),
                to_optimal: KilowattHours(1.0),
            },
            ..Setup::default()
        };
        let plan = setup.generate(&pv, &prices, at(10, 0), at(11, 0));

        let currents =
            plan.slots.iter().map(|slot| slot.dispatch.battery_charge_current).collect_vec();
        assert_eq!(
            currents,
            [Amperes(25.0), Amperes(25.0), Amperes::ZERO, Amperes::ZERO],
        );
    }

    #[test]
    fn test_minimum_heating_stages_follow_the_forecast() {
        // 0.5, 0.25 and 0.05 kWh per slot against the 0.4/0.2 thresholds:
        let pv = HourlySeries::from_summed_points([
            (at(10, 0), KilowattHours(2.0)),
            (at(11, 0), KilowattHours(1.0)),
            (at(12, 0), KilowattHours(0.2)),
        ]);
        let prices = HourlySeries::default();
        let setup = Setup {
            boiler_need: ResourceNeed {
                to_minimum: KilowattHours(5.0),
                to_optimal: KilowattHours(8.0),
            },
            ..Setup::default()
        };
        let plan = setup.generate(&pv, &prices, at(10, 0), at(13, 0));

        assert_eq!(plan.slots[0].dispatch.heater_stage, HeaterStage::Full);
        assert_eq!(plan.slots[4].dispatch.heater_stage, HeaterStage::Partial);
        assert_eq!(plan.slots[8].dispatch.heater_stage, HeaterStage::Off);
    }

    #[test]
    fn test_grid_assisted_heating_stages_without_pv() {
        let pv = HourlySeries::default();
        let prices = HourlySeries::default();
        let setup = Setup {
            boiler: BoilerArgs { grid_assisted_heating: true, ..boiler_args() },
            boiler_need: ResourceNeed {
                to_minimum: KilowattHours(1.0),
                to_optimal: KilowattHours(3.0),
            },
            ..Setup::default()
        };
        let plan = setup.generate(&pv, &prices, at(10, 0), at(10, 15));

        assert_eq!(plan.slots[0].dispatch.heater_stage, HeaterStage::Partial);
    }

    #[test]
    fn test_optimal_stages_follow_the_minimums() {
        // 0.25 kWh per slot: two slots finish the battery optimum, then the
        // boiler optimum takes over on the first element.
        let pv = HourlySeries::from_summed_points([(at(10, 0), KilowattHours(1.0))]);
        let prices = HourlySeries::default();
        let setup = Setup {
            state_of_charge: Percent(95.0),
            battery_need: ResourceNeed {
                to_minimum: KilowattHours::ZERO,
                to_optimal: KilowattHours(0.4),
            },
            boiler_need: ResourceNeed {
                to_minimum: KilowattHours::ZERO,
                to_optimal: KilowattHours(10.0),
            },
            ..Setup::default()
        };
        let plan = setup.generate(&pv, &prices, at(10, 0), at(11, 0));

        assert_eq!(plan.slots[0].dispatch.battery_charge_current, Amperes(25.0));
        assert_eq!(plan.slots[1].dispatch.battery_charge_current, Amperes(25.0));
        assert_eq!(plan.slots[2].dispatch.heater_stage, HeaterStage::Partial);
        assert_eq!(plan.slots[2].dispatch.battery_charge_current, Amperes::ZERO);
        assert_eq!(plan.slots[3].dispatch.heater_stage, HeaterStage::Partial);
    }

    #[test]
    fn test_emergency_clears_as_the_estimated_charge_recovers() {
        // A 1-kWh battery absorbing 1 kWh in the first slot leaves the
        // emergency band before the second slot:
        let pv = HourlySeries::from_summed_points([(at(10, 0), KilowattHours(4.0))]);
        let prices = HourlySeries::default();
        let setup = Setup {
            state_of_charge: Percent(15.0),
            battery: BatteryArgs { capacity: KilowattHours(1.0), ..battery_args() },
            ..Setup::default()
        };
        let plan = setup.generate(&pv, &prices, at(10, 0), at(10, 30));

        assert_eq!(plan.slots[0].dispatch.battery_charge_current, Amperes(12.0));
        assert_eq!(plan.slots[1].dispatch.battery_charge_current, Amperes::ZERO);
    }
}
