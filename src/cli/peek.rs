use clap::Parser;
use ordered_float::OrderedFloat;

use crate::{
    cli::{EntityArgs, HomeAssistantArgs, PlanningArgs, snapshot::Snapshot},
    prelude::*,
};

#[derive(Parser)]
pub struct PeekArgs {
    #[clap(flatten)]
    home_assistant: HomeAssistantArgs,

    #[clap(flatten)]
    entities: EntityArgs,

    #[clap(flatten)]
    planning: PlanningArgs,
}

impl PeekArgs {
    /// Print the parsed external state: a connectivity check.
    pub async fn run(self) -> Result {
        let client = self.home_assistant.try_new_client()?;
        let offset = self.planning.utc_offset;

        for (label, entity_id) in [
            ("battery state of charge, %", &self.entities.battery_soc),
            ("battery voltage, V", &self.entities.battery_voltage),
            ("boiler temperature, °C", &self.entities.boiler_temperature),
            ("PV power, W", &self.entities.pv_power),
            ("house load, W", &self.entities.house_load),
            ("grid import, W", &self.entities.grid_import_power),
        ] {
            match client.get_scalar(entity_id).await {
                Ok(Some(value)) => info!(%entity_id, value, "{label}"),
                Ok(None) => warn!(%entity_id, "{label}: unavailable"),
                Err(error) => warn!(%entity_id, "{label}: {error:#}"),
            }
        }

        match client.get_state(&self.entities.sun_next_rising).await {
            Ok(state) => match state.timestamp(offset) {
                Some(sunrise) => info!(%sunrise, "next sunrise"),
                None => warn!("the next sunrise is unavailable"),
            },
            Err(error) => warn!("failed to fetch the next sunrise: {error:#}"),
        }

        let snapshot = Snapshot::observe(&client, &self.entities, offset).await;
        if let Some(sunset) = snapshot.next_sunset {
            info!(%sunset, "next sunset");
        }
        if let Some((peak_time, peak_rate)) =
            snapshot.prices.iter().max_by_key(|(_, rate)| OrderedFloat(rate.0))
        {
            info!(%peak_time, %peak_rate, "upcoming price peak");
        }
        Ok(())
    }
}
