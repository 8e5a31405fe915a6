//! Battery tracking (§4.11): constants and the piecewise cell-voltage curve;
//! see DESIGN.md for the dead-branch correction this already bakes in.

const INPUT_VOLTAGE: f64 = 4.68;
const VOLT_DIV_RATIO: f64 = 3.56;
const ADC_FULL_SCALE: f64 = 1024.0;

#[derive(Debug, Clone, Default)]
pub struct BatteryState {
    /// `SYS_STATUS.battery_remaining / 10.0`, percent.
    pub flight_battery: Option<f64>,
    /// Cell-voltage-derived percent, smoothed with an EMA.
    pub avionics_battery: Option<f64>,
    pub last_announced_flight_battery: Option<i64>,
}

impl BatteryState {
    /// SYS_STATUS handler (§4.11, first paragraph).
    pub fn on_sys_status(&mut self, battery_remaining: i8) {
        self.flight_battery = Some(battery_remaining as f64 / 10.0);
    }

    /// AP_ADC handler: converts a raw 10-bit `adc2` reading to a percent and
    /// folds it into the smoothed avionics-battery estimate.
    pub fn on_ap_adc(&mut self, adc2_raw: u16, numcells: i64) {
        if numcells <= 0 {
            return;
        }
        let voltage = adc2_raw as f64 * (INPUT_VOLTAGE / ADC_FULL_SCALE) * VOLT_DIV_RATIO;
        let vcell = voltage / numcells as f64;
        let sample = vcell_to_percent(vcell);

        self.avionics_battery = Some(match self.avionics_battery {
            None => sample,
            Some(prev) if (sample - prev).abs() > 70.0 => sample,
            Some(prev) => (95.0 * prev + 5.0 * sample) / 100.0,
        });
    }

    /// §4.7's `battery` trigger: round to nearest 10%, announce if changed.
    /// Returns `Some((rounded, is_warning))` when an announcement is due.
    pub fn maybe_announce(&mut self) -> Option<(i64, bool)> {
        let pct = self.flight_battery?;
        let rounded = (((pct + 5.0) / 10.0) as i64) * 10;
        if self.last_announced_flight_battery == Some(rounded) {
            return None;
        }
        self.last_announced_flight_battery = Some(rounded);
        Some((rounded, rounded <= 20))
    }
}

/// Piecewise-linear cell-voltage-to-percent curve (§4.11).
fn vcell_to_percent(vcell: f64) -> f64 {
    if vcell >= 4.1 {
        100.0
    } else if vcell > 3.81 {
        17.0 + 83.0 * (vcell - 3.81) / (4.1 - 3.81)
    } else if vcell > 3.20 {
        17.0 * (vcell - 3.20) / (3.81 - 3.20)
    } else {
        0.0
    }
}
