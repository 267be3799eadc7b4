use std::fmt::{Debug, Display, Formatter};

#[derive(
    Clone,
    Copy,
    Default,
    PartialEq,
    PartialOrd,
    derive_more::Add,
    derive_more::AddAssign,
    derive_more::From,
    derive_more::FromStr,
    derive_more::Sub,
)]
pub struct Percent(pub f64);

impl Percent {
    /// Clamp into 0–100: sensors do report out-of-range states of charge.
    #[must_use]
    pub fn clamped(self) -> Self {
        Self(self.0.clamp(0.0, 100.0))
    }

    pub const fn to_proportion(self) -> f64 {
        0.01 * self.0
    }
}

impl Display for Percent {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.1}%", self.0)
    }
}

impl Debug for Percent {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}
