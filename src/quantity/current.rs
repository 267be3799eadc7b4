use std::fmt::{Debug, Display, Formatter};

#[derive(
    Clone,
    Copy,
    Default,
    PartialEq,
    PartialOrd,
    derive_more::From,
    derive_more::FromStr,
)]
pub struct Amperes(pub f64);

impl Amperes {
    pub const ZERO: Self = Self(0.0);

    #[must_use]
    pub fn min(self, rhs: Self) -> Self {
        if rhs < self { rhs } else { self }
    }
}

impl Display for Amperes {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.0} A", self.0)
    }
}

impl Debug for Amperes {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}
