//! UPS status types: the per-poll snapshot and its component states.

use serde::{Deserialize, Serialize};

/// Battery state as reported by the PiJuice status register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatteryState {
    Normal,
    ChargingFromIn,
    ChargingFrom5vIo,
    NotPresent,
}

impl BatteryState {
    /// Short label used for the `ups_battery_status` packet field.
    pub fn label(&self) -> &'static str {
        match self {
            BatteryState::Normal => "normal",
            BatteryState::ChargingFromIn => "charging_from_in",
            BatteryState::ChargingFrom5vIo => "charging_from_5v_io",
            BatteryState::NotPresent => "not_present",
        }
    }

    pub fn is_charging(&self) -> bool {
        matches!(
            self,
            BatteryState::ChargingFromIn | BatteryState::ChargingFrom5vIo
        )
    }
}

/// Power input state (shared encoding for the main input and the 5V GPIO rail).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerInput {
    NotPresent,
    Bad,
    Weak,
    Present,
}

/// Charging temperature fault from the fault-event register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChargingTempFault {
    Normal,
    Suspend,
    Cool,
    Warm,
}

/// Latched fault flags from the fault-event register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaultStatus {
    pub button_power_off: bool,
    pub forced_power_off: bool,
    pub forced_sys_power_off: bool,
    pub watchdog_reset: bool,
    pub battery_profile_invalid: bool,
    pub charging_temp: ChargingTempFault,
}

impl FaultStatus {
    pub fn any(&self) -> bool {
        self.button_power_off
            || self.forced_power_off
            || self.forced_sys_power_off
            || self.watchdog_reset
            || self.battery_profile_invalid
            || self.charging_temp != ChargingTempFault::Normal
    }
}

/// Decoded status register (command 0x40).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpsStatus {
    pub fault_event: bool,
    pub button_event: bool,
    pub battery: BatteryState,
    pub power_input: PowerInput,
    pub power_input_io: PowerInput,
}

/// One complete poll of the UPS. Transient: read fresh each cycle, never
/// cached across cycles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpsSnapshot {
    /// Battery charge, percent (0-100).
    pub charge_percent: u8,
    /// Battery terminal voltage, volts.
    pub battery_voltage: f64,
    /// Battery current, amps. Negative while discharging.
    pub battery_current: f64,
    /// Battery temperature, degrees Celsius.
    pub battery_temperature: f64,
    /// 5V GPIO rail voltage, volts.
    pub io_voltage: f64,
    /// 5V GPIO rail current, amps.
    pub io_current: f64,
    pub battery: BatteryState,
    pub power_input: PowerInput,
    pub power_input_io: PowerInput,
    pub faults: FaultStatus,
}

impl UpsSnapshot {
    /// True when either power input reports a usable supply.
    pub fn power_present(&self) -> bool {
        self.power_input == PowerInput::Present || self.power_input_io == PowerInput::Present
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn power_present_checks_both_inputs() {
        let mut snap = test_snapshot();
        snap.power_input = PowerInput::NotPresent;
        snap.power_input_io = PowerInput::Present;
        assert!(snap.power_present());

        snap.power_input_io = PowerInput::Weak;
        assert!(!snap.power_present());
    }

    #[test]
    fn is_charging_covers_both_sources() {
        assert!(BatteryState::ChargingFromIn.is_charging());
        assert!(BatteryState::ChargingFrom5vIo.is_charging());
        assert!(!BatteryState::Normal.is_charging());
        assert!(!BatteryState::NotPresent.is_charging());
    }

    #[test]
    fn fault_status_any_covers_temperature() {
        let mut faults = no_faults();
        assert!(!faults.any());
        faults.charging_temp = ChargingTempFault::Suspend;
        assert!(faults.any());
    }

    fn no_faults() -> FaultStatus {
        FaultStatus {
            button_power_off: false,
            forced_power_off: false,
            forced_sys_power_off: false,
            watchdog_reset: false,
            battery_profile_invalid: false,
            charging_temp: ChargingTempFault::Normal,
        }
    }

    fn test_snapshot() -> UpsSnapshot {
        UpsSnapshot {
            charge_percent: 85,
            battery_voltage: 4.1,
            battery_current: 0.21,
            battery_temperature: 24.0,
            io_voltage: 5.12,
            io_current: 0.4,
            battery: BatteryState::ChargingFromIn,
            power_input: PowerInput::Present,
            power_input_io: PowerInput::NotPresent,
            faults: no_faults(),
        }
    }
}
