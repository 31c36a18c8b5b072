//! PiJuice HAT register protocol: command map, checksum, and decoders.
//!
//! The HAT answers each command byte with a payload followed by a single
//! checksum byte (XOR of the payload, seeded with 0xFF). Word values are
//! little-endian; currents are two's-complement.

use tracing::trace;

use crate::ups::i2c::I2cBus;
use crate::ups::types::*;
use crate::ups::UpsError;

pub const DEFAULT_BUS: u8 = 1;
pub const DEFAULT_ADDRESS: u16 = 0x14;

// Command bytes, per the PiJuice firmware interface.
const CMD_STATUS: u8 = 0x40;
const CMD_CHARGE_LEVEL: u8 = 0x41;
const CMD_FAULT_EVENT: u8 = 0x44;
const CMD_BATTERY_TEMPERATURE: u8 = 0x47;
const CMD_BATTERY_VOLTAGE: u8 = 0x49;
const CMD_BATTERY_CURRENT: u8 = 0x4B;
const CMD_IO_VOLTAGE: u8 = 0x4D;
const CMD_IO_CURRENT: u8 = 0x4F;

fn checksum(payload: &[u8]) -> u8 {
    payload.iter().fold(0xFFu8, |fcs, b| fcs ^ b)
}

/// Protocol driver over any [`I2cBus`].
pub struct PiJuice<B: I2cBus> {
    bus: B,
}

impl<B: I2cBus> PiJuice<B> {
    pub fn new(bus: B) -> Self {
        Self { bus }
    }

    /// Read `len` payload bytes for `command`, verifying the checksum.
    /// One retry on mismatch; transient bus noise is common on shared buses.
    fn read_data(&mut self, command: u8, len: usize) -> Result<Vec<u8>, UpsError> {
        let mut last_err = None;
        for attempt in 0..2 {
            let mut raw = self.bus.read_block(command, len)?;
            if raw.len() != len + 1 {
                return Err(UpsError::ShortResponse {
                    command,
                    got: raw.len(),
                    wanted: len + 1,
                });
            }
            let received = raw[len];
            raw.truncate(len);
            let expected = checksum(&raw);
            if received == expected {
                return Ok(raw);
            }
            trace!(
                "checksum mismatch on {:#04x} (attempt {}): {:#04x} != {:#04x}",
                command,
                attempt + 1,
                received,
                expected
            );
            last_err = Some(UpsError::BadChecksum {
                command,
                expected,
                received,
            });
        }
        Err(last_err.unwrap_or(UpsError::ShortResponse {
            command,
            got: 0,
            wanted: len + 1,
        }))
    }

    fn read_word(&mut self, command: u8) -> Result<u16, UpsError> {
        let d = self.read_data(command, 2)?;
        Ok(u16::from_le_bytes([d[0], d[1]]))
    }

    fn read_signed_word(&mut self, command: u8) -> Result<i16, UpsError> {
        Ok(self.read_word(command)? as i16)
    }

    /// Status register: fault/button flags, battery state, power inputs.
    pub fn status(&mut self) -> Result<UpsStatus, UpsError> {
        let d = self.read_data(CMD_STATUS, 1)?[0];
        Ok(UpsStatus {
            fault_event: d & 0x01 != 0,
            button_event: d & 0x02 != 0,
            battery: decode_battery((d >> 2) & 0x03),
            power_input: decode_power_input((d >> 4) & 0x03),
            power_input_io: decode_power_input((d >> 6) & 0x03),
        })
    }

    /// Battery charge, percent.
    pub fn charge_level(&mut self) -> Result<u8, UpsError> {
        let level = self.read_data(CMD_CHARGE_LEVEL, 1)?[0];
        if level > 100 {
            return Err(UpsError::MalformedValue {
                field: "charge_level",
                detail: format!("{} is outside 0-100", level),
            });
        }
        Ok(level)
    }

    /// Latched fault flags.
    pub fn fault_status(&mut self) -> Result<FaultStatus, UpsError> {
        let d = self.read_data(CMD_FAULT_EVENT, 1)?[0];
        Ok(FaultStatus {
            button_power_off: d & 0x01 != 0,
            forced_power_off: d & 0x02 != 0,
            forced_sys_power_off: d & 0x04 != 0,
            watchdog_reset: d & 0x08 != 0,
            battery_profile_invalid: d & 0x20 != 0,
            charging_temp: decode_charging_temp((d >> 6) & 0x03),
        })
    }

    /// Battery temperature, degrees Celsius. Sign bit lives in the high byte.
    pub fn battery_temperature(&mut self) -> Result<i16, UpsError> {
        let d = self.read_data(CMD_BATTERY_TEMPERATURE, 2)?;
        let mut temp = d[0] as i16;
        if d[1] & 0x80 != 0 {
            temp -= 1 << 8;
        }
        Ok(temp)
    }

    /// Battery terminal voltage, millivolts.
    pub fn battery_voltage_mv(&mut self) -> Result<u16, UpsError> {
        self.read_word(CMD_BATTERY_VOLTAGE)
    }

    /// Battery current, milliamps. Negative while discharging.
    pub fn battery_current_ma(&mut self) -> Result<i16, UpsError> {
        self.read_signed_word(CMD_BATTERY_CURRENT)
    }

    /// 5V GPIO rail voltage, millivolts.
    pub fn io_voltage_mv(&mut self) -> Result<u16, UpsError> {
        self.read_word(CMD_IO_VOLTAGE)
    }

    /// 5V GPIO rail current, milliamps.
    pub fn io_current_ma(&mut self) -> Result<i16, UpsError> {
        self.read_signed_word(CMD_IO_CURRENT)
    }

    /// Read everything the snapshot needs in one serial pass.
    pub fn snapshot(&mut self) -> Result<UpsSnapshot, UpsError> {
        let status = self.status()?;
        let charge_percent = self.charge_level()?;
        let battery_voltage = self.battery_voltage_mv()? as f64 / 1000.0;
        let battery_current = self.battery_current_ma()? as f64 / 1000.0;
        let battery_temperature = self.battery_temperature()? as f64;
        let io_voltage = self.io_voltage_mv()? as f64 / 1000.0;
        let io_current = self.io_current_ma()? as f64 / 1000.0;
        let faults = self.fault_status()?;

        Ok(UpsSnapshot {
            charge_percent,
            battery_voltage,
            battery_current,
            battery_temperature,
            io_voltage,
            io_current,
            battery: status.battery,
            power_input: status.power_input,
            power_input_io: status.power_input_io,
            faults,
        })
    }
}

fn decode_battery(bits: u8) -> BatteryState {
    match bits {
        0 => BatteryState::Normal,
        1 => BatteryState::ChargingFromIn,
        2 => BatteryState::ChargingFrom5vIo,
        _ => BatteryState::NotPresent,
    }
}

fn decode_power_input(bits: u8) -> PowerInput {
    match bits {
        0 => PowerInput::NotPresent,
        1 => PowerInput::Bad,
        2 => PowerInput::Weak,
        _ => PowerInput::Present,
    }
}

fn decode_charging_temp(bits: u8) -> ChargingTempFault {
    match bits {
        0 => ChargingTempFault::Normal,
        1 => ChargingTempFault::Suspend,
        2 => ChargingTempFault::Cool,
        _ => ChargingTempFault::Warm,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    /// Scripted bus: maps command byte to a canned payload, appends a valid
    /// checksum unless the script says otherwise.
    struct MockBus {
        responses: HashMap<u8, Vec<u8>>,
        corrupt_checksum: bool,
    }

    impl MockBus {
        fn new() -> Self {
            Self {
                responses: HashMap::new(),
                corrupt_checksum: false,
            }
        }

        fn with(mut self, command: u8, payload: &[u8]) -> Self {
            self.responses.insert(command, payload.to_vec());
            self
        }
    }

    impl I2cBus for MockBus {
        fn read_block(&mut self, command: u8, len: usize) -> Result<Vec<u8>, UpsError> {
            let payload = self.responses.get(&command).ok_or(UpsError::ReadFailed {
                command,
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            })?;
            assert_eq!(payload.len(), len, "script length mismatch for {command:#04x}");
            let mut raw = payload.clone();
            let mut fcs = checksum(&raw);
            if self.corrupt_checksum {
                fcs ^= 0xA5;
            }
            raw.push(fcs);
            Ok(raw)
        }
    }

    fn scripted() -> MockBus {
        // 85% charge, 4.1 V battery, 210 mA charging current, 24 C,
        // charging from the main input which is present.
        MockBus::new()
            .with(CMD_STATUS, &[0b0011_0100])
            .with(CMD_CHARGE_LEVEL, &[85])
            .with(CMD_BATTERY_VOLTAGE, &4100u16.to_le_bytes())
            .with(CMD_BATTERY_CURRENT, &210i16.to_le_bytes())
            .with(CMD_BATTERY_TEMPERATURE, &[24, 0])
            .with(CMD_IO_VOLTAGE, &5120u16.to_le_bytes())
            .with(CMD_IO_CURRENT, &(-300i16).to_le_bytes())
            .with(CMD_FAULT_EVENT, &[0x00])
    }

    #[test]
    fn decodes_status_register() {
        let mut pj = PiJuice::new(scripted());
        let status = pj.status().unwrap();
        assert!(!status.fault_event);
        assert!(!status.button_event);
        assert_eq!(status.battery, BatteryState::ChargingFromIn);
        assert_eq!(status.power_input, PowerInput::Present);
        assert_eq!(status.power_input_io, PowerInput::NotPresent);
    }

    #[test]
    fn snapshot_collects_all_scalars() {
        let mut pj = PiJuice::new(scripted());
        let snap = pj.snapshot().unwrap();
        assert_eq!(snap.charge_percent, 85);
        assert!((snap.battery_voltage - 4.1).abs() < 1e-9);
        assert!((snap.battery_current - 0.21).abs() < 1e-9);
        assert!((snap.battery_temperature - 24.0).abs() < 1e-9);
        assert!((snap.io_current - (-0.3)).abs() < 1e-9);
        assert!(!snap.faults.any());
    }

    #[test]
    fn snapshot_is_idempotent_for_unchanged_hardware() {
        let mut pj = PiJuice::new(scripted());
        let a = pj.snapshot().unwrap();
        let b = pj.snapshot().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn negative_temperature_decodes() {
        let bus = MockBus::new().with(CMD_BATTERY_TEMPERATURE, &[0xF6, 0xFF]);
        let mut pj = PiJuice::new(bus);
        assert_eq!(pj.battery_temperature().unwrap(), -10);
    }

    #[test]
    fn charge_above_100_is_malformed() {
        let bus = MockBus::new().with(CMD_CHARGE_LEVEL, &[101]);
        let mut pj = PiJuice::new(bus);
        assert!(matches!(
            pj.charge_level(),
            Err(UpsError::MalformedValue { field: "charge_level", .. })
        ));
    }

    #[test]
    fn bad_checksum_is_rejected_after_retry() {
        let mut bus = MockBus::new().with(CMD_CHARGE_LEVEL, &[85]);
        bus.corrupt_checksum = true;
        let mut pj = PiJuice::new(bus);
        assert!(matches!(
            pj.charge_level(),
            Err(UpsError::BadChecksum { command: CMD_CHARGE_LEVEL, .. })
        ));
    }

    #[test]
    fn fault_bits_decode() {
        let bus = MockBus::new().with(CMD_FAULT_EVENT, &[0x01 | 0x08 | 0x40]);
        let mut pj = PiJuice::new(bus);
        let faults = pj.fault_status().unwrap();
        assert!(faults.button_power_off);
        assert!(faults.watchdog_reset);
        assert!(!faults.forced_power_off);
        assert_eq!(faults.charging_temp, ChargingTempFault::Suspend);
        assert!(faults.any());
    }
}
