use std::fmt::{Debug, Display, Formatter};

#[derive(
    Clone,
    Copy,
    Default,
    PartialEq,
    PartialOrd,
    derive_more::From,
    derive_more::FromStr,
    derive_more::Sub,
)]
pub struct Celsius(pub f64);

impl Celsius {
    /// Clamp into the physically plausible range of a domestic water store.
    #[must_use]
    pub fn clamped(self) -> Self {
        Self(self.0.clamp(0.0, 100.0))
    }
}

impl Display for Celsius {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.1} °C", self.0)
    }
}

impl Debug for Celsius {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}
