use std::{
    fmt::{Debug, Display, Formatter},
    ops::{Div, Mul},
};

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
    derive_more::SubAssign,
    derive_more::Sum,
)]
pub struct KilowattHours(pub f64);

impl KilowattHours {
    pub const ZERO: Self = Self(0.0);

    #[must_use]
    pub fn max(self, rhs: Self) -> Self {
        if rhs > self { rhs } else { self }
    }

    /// Decrease towards zero, never below.
    #[must_use]
    pub fn saturating_sub(self, rhs: Self) -> Self {
        (self - rhs).max(Self::ZERO)
    }

    pub const fn is_positive(self) -> bool {
        self.0 > 0.0
    }
}

impl Display for KilowattHours {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2} kWh", self.0)
    }
}

impl Debug for KilowattHours {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.0}Wh", self.0 * 1000.0)
    }
}

impl Mul<f64> for KilowattHours {
    type Output = Self;

    fn mul(self, rhs: f64) -> Self::Output {
        Self(self.0 * rhs)
    }
}

impl Div<KilowattHours> for KilowattHours {
    type Output = f64;

    fn div(self, rhs: KilowattHours) -> Self::Output {
        self.0 / rhs.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_saturating_sub() {
        assert_eq!(
            KilowattHours(1.0).saturating_sub(KilowattHours(0.25)),
            KilowattHours(0.75),
        );
        assert_eq!(KilowattHours(0.1).saturating_sub(KilowattHours(1.0)), KilowattHours::ZERO);
    }
}
