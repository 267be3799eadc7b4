use comfy_table::{Attribute, Cell, CellAlignment, Color, Table, modifiers, presets};

use crate::{
    core::{dispatch::HeaterStage, plan::Plan, series::HourlySeries},
    quantity::{energy::KilowattHours, rate::MegawattHourRate},
};

pub fn build_plan_table(
    plan: &Plan,
    pv: &HourlySeries<KilowattHours>,
    prices: &HourlySeries<MegawattHourRate>,
    export_price_threshold: MegawattHourRate,
) -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .apply_modifier(modifiers::UTF8_ROUND_CORNERS)
        .enforce_styling();
    table.set_header(vec!["Date", "Start", "End", "PV", "Price", "Battery", "Heater", "Export"]);

    for slot in &plan.slots {
        let pv_energy = pv.get(slot.start_time).unwrap_or(KilowattHours::ZERO)
            * (slot.duration.as_seconds_f64() / 3600.0);
        let price = prices.get(slot.start_time);

        table.add_row(vec![
            Cell::new(slot.start_time.format("%b %d")).add_attribute(Attribute::Dim),
            Cell::new(slot.start_time.format("%H:%M")),
            Cell::new(slot.end_time().format("%H:%M")).add_attribute(Attribute::Dim),
            Cell::new(pv_energy).set_alignment(CellAlignment::Right),
            price.map_or_else(
                || Cell::new("unknown").add_attribute(Attribute::Dim),
                |price| {
                    Cell::new(price).fg(if price >= export_price_threshold {
                        Color::Green
                    } else {
                        Color::DarkGrey
                    })
                },
            ),
            Cell::new(slot.dispatch.battery_charge_current).set_alignment(CellAlignment::Right),
            Cell::new(slot.dispatch.heater_stage).fg(heater_color(slot.dispatch.heater_stage)),
            Cell::new(slot.dispatch.export_limit).set_alignment(CellAlignment::Right),
        ]);
    }
    table
}

const fn heater_color(stage: HeaterStage) -> Color {
    match stage {
        HeaterStage::Off => Color::DarkGrey,
        HeaterStage::Partial => Color::DarkYellow,
        HeaterStage::Full => Color::Red,
    }
}
