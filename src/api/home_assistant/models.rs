use chrono::{DateTime, FixedOffset, TimeDelta};
use serde::Deserialize;
use serde_json::{Map, Value};
use serde_with::serde_as;

use crate::{
    prelude::*,
    quantity::{energy::KilowattHours, power::Kilowatts, rate::MegawattHourRate},
};

/// Solcast detailed forecasts come in half-hour periods.
const SOLCAST_PERIOD: TimeDelta = TimeDelta::minutes(30);

/// State object returned by `GET /api/states/{entity_id}`.
#[must_use]
#[derive(Debug, Deserialize)]
pub struct EntityState {
    pub state: String,

    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl EntityState {
    /// Numeric value of the state; `unknown` and `unavailable` are [`None`].
    pub fn scalar(&self) -> Option<f64> {
        match self.state.as_str() {
            "unknown" | "unavailable" => None,
            state => state.parse().ok(),
        }
    }

    /// The state parsed as a timestamp in the canonical offset.
    pub fn timestamp(&self, offset: FixedOffset) -> Option<DateTime<FixedOffset>> {
        DateTime::parse_from_rfc3339(&self.state).ok().map(|time| time.with_timezone(&offset))
    }

    /// Spot prices from the OTE attribute map: every attribute whose key
    /// parses as a timestamp carries the price for that hour.
    pub fn hourly_prices(
        &self,
        offset: FixedOffset,
    ) -> Vec<(DateTime<FixedOffset>, MegawattHourRate)> {
        self.attributes
            .iter()
            .filter_map(|(key, value)| {
                let time = match DateTime::parse_from_rfc3339(key) {
                    Ok(time) => time.with_timezone(&offset),
                    Err(error) => {
                        if value.is_number() {
                            warn!(%key, %error, "dropping a price with an unparseable timestamp");
                        }
                        return None;
                    }
                };
                let price = value.as_f64().or_else(|| value.as_str()?.parse().ok())?;
                Some((time, MegawattHourRate(price)))
            })
            .collect()
    }

    /// Per-period PV estimates from the Solcast `detailedForecast` attribute.
    ///
    /// The estimate is the average power over the period; it is converted
    /// to energy here so that downstream bucketing only ever sums energy.
    pub fn solar_forecast(
        &self,
        offset: FixedOffset,
    ) -> Vec<(DateTime<FixedOffset>, KilowattHours)> {
        let Some(raw) = self.attributes.get("detailedForecast") else {
            return Vec::new();
        };
        let n_raw = raw.as_array().map_or(0, Vec::len);
        let forecast: SolarForecast = serde_json::from_value(raw.clone()).unwrap_or_default();
        if forecast.0.len() != n_raw {
            warn!(n_dropped = n_raw - forecast.0.len(), "dropped unparseable forecast periods");
        }
        forecast
            .0
            .into_iter()
            .map(|period| {
                (
                    period.period_start.with_timezone(&offset),
                    Kilowatts(period.pv_estimate) * SOLCAST_PERIOD,
                )
            })
            .collect()
    }
}

#[must_use]
#[serde_as]
#[derive(Debug, Default, Deserialize)]
pub struct SolarForecast(
    #[serde_as(as = "serde_with::VecSkipError<_>")] pub Vec<SolarForecastPeriod>,
);

#[must_use]
#[derive(Debug, Deserialize)]
pub struct SolarForecastPeriod {
    pub period_start: DateTime<FixedOffset>,

    #[serde(default)]
    pub pv_estimate: f64,
}
