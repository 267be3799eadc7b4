use std::fmt::{Debug, Display, Formatter};

/// Spot market price per megawatt-hour, in the market's currency.
#[derive(
    Clone,
    Copy,
    Default,
    PartialEq,
    PartialOrd,
    derive_more::From,
    derive_more::FromStr,
)]
pub struct MegawattHourRate(pub f64);

impl Display for MegawattHourRate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.0}/MWh", self.0)
    }
}

impl Debug for MegawattHourRate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}
