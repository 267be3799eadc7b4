use chrono::{DateTime, FixedOffset, Utc};

use crate::{
    api::home_assistant::Client,
    cli::{BatteryArgs, BoilerArgs, EntityArgs, PlanningArgs},
    core::{need::ResourceNeed, plan::Plan, planner::Planner, series::HourlySeries},
    prelude::*,
    quantity::{
        energy::KilowattHours,
        percent::Percent,
        rate::MegawattHourRate,
        temperature::Celsius,
    },
};

/// Everything the planner needs, read in one go.
///
/// Every read degrades independently to its documented default, so planning
/// proceeds on whatever is available rather than aborting.
pub struct Snapshot {
    pub state_of_charge: Percent,
    pub boiler_temperature: Celsius,
    pub pv: HourlySeries<KilowattHours>,
    pub prices: HourlySeries<MegawattHourRate>,
    pub next_sunset: Option<DateTime<FixedOffset>>,
}

impl Snapshot {
    #[instrument(skip_all)]
    pub async fn observe(client: &Client, entities: &EntityArgs, offset: FixedOffset) -> Self {
        let state_of_charge = Percent(scalar_or(client, &entities.battery_soc, 50.0).await);
        let boiler_temperature =
            Celsius(scalar_or(client, &entities.boiler_temperature, 50.0).await);

        let prices = match client.get_state(&entities.spot_price).await {
            Ok(state) => HourlySeries::from_latest_points(state.hourly_prices(offset)),
            Err(error) => {
                warn!("failed to fetch the spot prices: {error:#}");
                HourlySeries::default()
            }
        };

        let mut solar_points = Vec::new();
        for entity_id in [&entities.solcast_today, &entities.solcast_tomorrow] {
            match client.get_state(entity_id).await {
                Ok(state) => solar_points.extend(state.solar_forecast(offset)),
                Err(error) => warn!(%entity_id, "failed to fetch the PV forecast: {error:#}"),
            }
        }
        let pv = HourlySeries::from_summed_points(solar_points);

        if prices.is_empty() {
            warn!("no upcoming spot prices, planning with an unknown price");
        }
        if pv.is_empty() {
            warn!("no PV forecast, planning with zero production");
        }

        let next_sunset = match client.get_state(&entities.sun_next_setting).await {
            Ok(state) => state.timestamp(offset),
            Err(error) => {
                warn!("failed to fetch the next sunset: {error:#}");
                None
            }
        };

        info!(
            %state_of_charge,
            %boiler_temperature,
            n_price_hours = prices.len(),
            n_pv_hours = pv.len(),
            "observed",
        );
        Self { state_of_charge, boiler_temperature, pv, prices, next_sunset }
    }

    /// Compute the residual needs and generate the plan for the current instant.
    #[must_use]
    pub fn plan(
        &self,
        now: DateTime<FixedOffset>,
        battery: BatteryArgs,
        boiler: BoilerArgs,
        planning: PlanningArgs,
    ) -> Plan {
        let battery_need = ResourceNeed::for_battery(
            self.state_of_charge,
            battery.minimum_state_of_charge,
            battery.optimal_state_of_charge,
            battery.capacity,
        );
        let boiler_need = ResourceNeed::for_boiler(
            self.boiler_temperature,
            boiler.minimum_temperature,
            boiler.optimal_temperature,
            boiler.volume_litres,
            boiler.specific_heat_wh,
            boiler.efficiency,
        );
        let horizon_end = self
            .next_sunset
            .filter(|sunset| *sunset > now)
            .unwrap_or_else(|| planning.fallback_horizon(now));

        Planner::builder()
            .pv(&self.pv)
            .prices(&self.prices)
            .state_of_charge(self.state_of_charge)
            .battery_need(battery_need)
            .boiler_need(boiler_need)
            .battery(battery)
            .boiler(boiler)
            .planning(planning)
            .build()
            .generate(now, horizon_end)
    }
}

/// Observe the external state and build a fresh plan from it.
pub async fn plan_now(
    client: &Client,
    entities: &EntityArgs,
    battery: BatteryArgs,
    boiler: BoilerArgs,
    planning: PlanningArgs,
) -> (Snapshot, Plan) {
    let now = Utc::now().with_timezone(&planning.utc_offset);
    let snapshot = Snapshot::observe(client, entities, planning.utc_offset).await;
    let plan = snapshot.plan(now, battery, boiler, planning);
    (snapshot, plan)
}

async fn scalar_or(client: &Client, entity_id: &str, default: f64) -> f64 {
    match client.get_scalar(entity_id).await {
        Ok(Some(value)) => value,
        Ok(None) => {
            warn!(entity_id, "the state is unavailable, using the default");
            default
        }
        Err(error) => {
            warn!(entity_id, "failed to read the state: {error:#}");
            default
        }
    }
}
