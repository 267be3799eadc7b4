mod peek;
mod plan;
pub mod snapshot;
mod steer;

use chrono::{DateTime, FixedOffset, NaiveTime, TimeDelta};
use clap::{Parser, Subcommand};
use reqwest::Url;

use crate::{
    api::home_assistant::Client,
    prelude::*,
    quantity::{
        current::Amperes,
        energy::KilowattHours,
        percent::Percent,
        power::Watts,
        rate::MegawattHourRate,
        temperature::Celsius,
    },
};
pub use self::{peek::PeekArgs, plan::PlanArgs, steer::SteerArgs};

#[derive(Parser)]
#[command(author, version, about, propagate_version = true)]
#[must_use]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Main command: keep re-planning the dispatch schedule and applying it.
    #[clap(name = "steer")]
    Steer(Box<SteerArgs>),

    /// Build a plan from the current forecasts and print it without applying it.
    #[clap(name = "plan")]
    Plan(Box<PlanArgs>),

    /// Dump the parsed external state.
    #[clap(name = "peek")]
    Peek(Box<PeekArgs>),
}

#[derive(Parser)]
pub struct HomeAssistantArgs {
    /// Home Assistant API access token.
    #[clap(long = "home-assistant-access-token", env = "HOME_ASSISTANT_ACCESS_TOKEN")]
    pub access_token: String,

    /// Home Assistant API base URL. For example: `http://localhost:8123/api`.
    #[clap(long = "home-assistant-api-base-url", env = "HOME_ASSISTANT_API_BASE_URL")]
    pub base_url: Url,
}

impl HomeAssistantArgs {
    pub fn try_new_client(&self) -> Result<Client> {
        Client::try_new(&self.access_token, self.base_url.clone())
    }
}

#[derive(Parser)]
pub struct EntityArgs {
    #[clap(long, env = "BATTERY_SOC_ENTITY_ID", default_value = "sensor.solax_battery_capacity")]
    pub battery_soc: String,

    #[clap(long, env = "BATTERY_VOLTAGE_ENTITY_ID", default_value = "sensor.solax_battery_voltage")]
    pub battery_voltage: String,

    #[clap(long, env = "BOILER_TEMPERATURE_ENTITY_ID", default_value = "sensor.boiler_temp")]
    pub boiler_temperature: String,

    #[clap(long, env = "PV_POWER_ENTITY_ID", default_value = "sensor.solax_pv_power_total")]
    pub pv_power: String,

    #[clap(long, env = "HOUSE_LOAD_ENTITY_ID", default_value = "sensor.solax_house_load")]
    pub house_load: String,

    #[clap(
        long,
        env = "GRID_IMPORT_POWER_ENTITY_ID",
        default_value = "sensor.solax_grid_import_power"
    )]
    pub grid_import_power: String,

    #[clap(
        long,
        env = "SPOT_PRICE_ENTITY_ID",
        default_value = "sensor.current_spot_electricity_price"
    )]
    pub spot_price: String,

    #[clap(
        long,
        env = "SOLCAST_TODAY_ENTITY_ID",
        default_value = "sensor.solcast_pv_forecast_forecast_today"
    )]
    pub solcast_today: String,

    #[clap(
        long,
        env = "SOLCAST_TOMORROW_ENTITY_ID",
        default_value = "sensor.solcast_pv_forecast_forecast_tomorrow"
    )]
    pub solcast_tomorrow: String,

    #[clap(long, env = "SUN_NEXT_SETTING_ENTITY_ID", default_value = "sensor.sun_next_setting")]
    pub sun_next_setting: String,

    #[clap(long, env = "SUN_NEXT_RISING_ENTITY_ID", default_value = "sensor.sun_next_rising")]
    pub sun_next_rising: String,

    #[clap(
        long,
        env = "BATTERY_CHARGE_CURRENT_ENTITY_ID",
        default_value = "number.solax_battery_charge_max_current"
    )]
    pub battery_charge_current: String,

    #[clap(
        long,
        env = "EXPORT_LIMIT_ENTITY_ID",
        default_value = "number.solax_export_control_user_limit"
    )]
    pub export_limit: String,

    #[clap(long, env = "BOILER_RELAY_1_ENTITY_ID", default_value = "switch.boiler_relay_1")]
    pub boiler_relay_1: String,

    #[clap(long, env = "BOILER_RELAY_2_ENTITY_ID", default_value = "switch.boiler_relay_2")]
    pub boiler_relay_2: String,
}

#[derive(Copy, Clone, Parser)]
pub struct BatteryArgs {
    /// Usable battery capacity.
    #[clap(long = "battery-capacity-kwh", default_value = "12", env = "BATTERY_CAPACITY_KWH")]
    pub capacity: KilowattHours,

    #[clap(
        long = "battery-max-charge-current",
        default_value = "25",
        env = "BATTERY_MAX_CHARGE_CURRENT"
    )]
    pub max_charge_current: Amperes,

    /// Reduced current used while the battery is critically low.
    #[clap(
        long = "battery-emergency-charge-current",
        default_value = "12",
        env = "BATTERY_EMERGENCY_CHARGE_CURRENT"
    )]
    pub emergency_charge_current: Amperes,

    #[clap(long = "min-battery-soc", default_value = "80", env = "MIN_BATTERY_SOC")]
    pub minimum_state_of_charge: Percent,

    #[clap(long = "optimal-battery-soc", default_value = "100", env = "OPTIMAL_BATTERY_SOC")]
    pub optimal_state_of_charge: Percent,

    /// Below this level the battery is protected regardless of the price.
    #[clap(long = "emergency-battery-soc", default_value = "20", env = "EMERGENCY_BATTERY_SOC")]
    pub emergency_state_of_charge: Percent,
}

#[derive(Copy, Clone, Parser)]
pub struct BoilerArgs {
    #[clap(long = "boiler-volume-litres", default_value = "120", env = "BOILER_VOLUME_LITRES")]
    pub volume_litres: f64,

    /// Watt-hours to heat one litre of water by one degree.
    #[clap(long = "boiler-specific-heat", default_value = "1.163", env = "BOILER_SPECIFIC_HEAT")]
    pub specific_heat_wh: f64,

    /// Electrical-to-thermal conversion efficiency.
    #[clap(long = "boiler-efficiency", default_value = "0.9", env = "BOILER_EFFICIENCY")]
    pub efficiency: f64,

    #[clap(long = "min-boiler-temp", default_value = "55", env = "MIN_BOILER_TEMP")]
    pub minimum_temperature: Celsius,

    #[clap(long = "optimal-boiler-temp", default_value = "70", env = "OPTIMAL_BOILER_TEMP")]
    pub optimal_temperature: Celsius,

    /// Forecast PV energy per slot required to run the first element.
    #[clap(long = "partial-stage-pv-kwh", default_value = "0.2", env = "PARTIAL_STAGE_PV_KWH")]
    pub partial_stage_pv_energy: KilowattHours,

    /// Forecast PV energy per slot required to run both elements.
    #[clap(long = "full-stage-pv-kwh", default_value = "0.4", env = "FULL_STAGE_PV_KWH")]
    pub full_stage_pv_energy: KilowattHours,

    /// Heat towards the minimum from the grid even when no PV is forecast.
    #[clap(long = "grid-assisted-heating", env = "GRID_ASSISTED_HEATING")]
    pub grid_assisted_heating: bool,
}

#[derive(Copy, Clone, Parser)]
pub struct PlanningArgs {
    /// Canonical UTC offset for all slot arithmetic.
    #[clap(long = "utc-offset", default_value = "+01:00", env = "UTC_OFFSET")]
    pub utc_offset: FixedOffset,

    #[clap(long = "slot-duration", default_value = "15m", env = "SLOT_DURATION")]
    pub slot_duration: humantime::Duration,

    /// Planning horizon hour used when the next sunset is unavailable.
    #[clap(long = "fallback-horizon-hour", default_value = "20", env = "FALLBACK_HORIZON_HOUR")]
    pub fallback_horizon_hour: u32,

    /// Minimum spot price at which exporting beats self-consumption.
    #[clap(long = "min-export-price", default_value = "300", env = "MIN_EXPORT_PRICE")]
    pub export_price_threshold: MegawattHourRate,

    #[clap(long = "max-export-limit", default_value = "12200", env = "MAX_EXPORT_LIMIT")]
    pub max_export_limit: Watts,

    /// Let the emergency rule keep staging the boiler from forecast PV.
    #[clap(long = "emergency-heating", env = "EMERGENCY_HEATING")]
    pub emergency_heating: bool,
}

impl PlanningArgs {
    pub fn slot_length(&self) -> TimeDelta {
        TimeDelta::from_std(self.slot_duration.into())
            .ok()
            .filter(|length| *length > TimeDelta::zero())
            .unwrap_or_else(|| TimeDelta::minutes(15))
    }

    /// End-of-day horizon used when the next sunset is unavailable.
    pub fn fallback_horizon(&self, now: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
        let time = NaiveTime::from_hms_opt(self.fallback_horizon_hour.min(23), 0, 0)
            .unwrap_or_default();
        now.with_time(time).single().unwrap_or(now)
    }
}

#[derive(Copy, Clone, Parser)]
pub struct GuardArgs {
    /// Grid import above this ceiling forces the safe dispatch.
    #[clap(long = "max-grid-import", default_value = "100", env = "MAX_GRID_IMPORT")]
    pub import_ceiling: Watts,
}
