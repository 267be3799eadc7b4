use clap::Parser;
use ordered_float::OrderedFloat;

use crate::{
    cli::{BatteryArgs, BoilerArgs, EntityArgs, HomeAssistantArgs, PlanningArgs, snapshot::plan_now},
    prelude::*,
    tables::build_plan_table,
};

#[derive(Parser)]
pub struct PlanArgs {
    #[clap(flatten)]
    home_assistant: HomeAssistantArgs,

    #[clap(flatten)]
    entities: EntityArgs,

    #[clap(flatten)]
    battery: BatteryArgs,

    #[clap(flatten)]
    boiler: BoilerArgs,

    #[clap(flatten)]
    planning: PlanningArgs,
}

impl PlanArgs {
    /// Dry run: build a plan from the current forecasts and print it.
    pub async fn run(self) -> Result {
        let client = self.home_assistant.try_new_client()?;
        let (snapshot, plan) =
            plan_now(&client, &self.entities, self.battery, self.boiler, self.planning).await;

        if let Some((peak_time, peak_rate)) =
            snapshot.prices.iter().max_by_key(|(_, rate)| OrderedFloat(rate.0))
        {
            info!(%peak_time, %peak_rate, "upcoming price peak");
        }
        info!(n_slots = plan.slots.len(), horizon_end = %plan.horizon_end, "planned");

        println!(
            "{}",
            build_plan_table(
                &plan,
                &snapshot.pv,
                &snapshot.prices,
                self.planning.export_price_threshold,
            )
        );
        Ok(())
    }
}
