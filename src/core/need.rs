use crate::quantity::{energy::KilowattHours, percent::Percent, temperature::Celsius};

/// Residual energy required to bring a resource to its configured targets.
///
/// Recomputed from current state on every re-plan; `to_minimum` never
/// exceeds `to_optimal`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ResourceNeed {
    pub to_minimum: KilowattHours,
    pub to_optimal: KilowattHours,
}

impl ResourceNeed {
    pub fn for_battery(
        state_of_charge: Percent,
        minimum: Percent,
        optimal: Percent,
        capacity: KilowattHours,
    ) -> Self {
        let state_of_charge = state_of_charge.clamped();
        let to_minimum =
            capacity * (minimum.clamped() - state_of_charge).to_proportion().max(0.0);
        let to_optimal =
            capacity * (optimal.clamped() - state_of_charge).to_proportion().max(0.0);
        Self { to_minimum, to_optimal: to_optimal.max(to_minimum) }
    }

    /// The efficiency divisor makes the need reflect the actual electrical
    /// draw rather than the heat delivered to the water.
    pub fn for_boiler(
        temperature: Celsius,
        minimum: Celsius,
        optimal: Celsius,
        volume_litres: f64,
        specific_heat_wh: f64,
        efficiency: f64,
    ) -> Self {
        let temperature = temperature.clamped();
        let kwh_per_degree =
            volume_litres * specific_heat_wh / 1000.0 / efficiency.clamp(0.05, 1.0);
        let to_minimum =
            KilowattHours((minimum.clamped() - temperature).0.max(0.0) * kwh_per_degree);
        let to_optimal =
            KilowattHours((optimal.clamped() - temperature).0.max(0.0) * kwh_per_degree);
        Self { to_minimum, to_optimal: to_optimal.max(to_minimum) }
    }

    /// Account for energy absorbed by an earlier planning slot.
    pub fn absorb(&mut self, energy: KilowattHours) {
        self.to_minimum = self.to_minimum.saturating_sub(energy);
        self.to_optimal = self.to_optimal.saturating_sub(energy);
    }
}
