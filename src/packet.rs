//! Loop-packet augmentation: copy a UPS snapshot into the host's record.

use serde_json::{json, Map, Value};

use crate::config::types::UpsSettings;
use crate::ups::types::UpsSnapshot;

/// The host's per-cycle data record. Ownership stays with the host; the
/// agent only inserts (or overwrites) its own fields. Key order is
/// preserved so the record round-trips unchanged apart from our additions.
pub type LoopPacket = Map<String, Value>;

fn round_milli(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

/// Insert the configured UPS fields into `packet`.
///
/// All-or-nothing by construction: callers only reach this with a complete
/// snapshot in hand, so a failed poll never leaves partial fields behind.
/// Inserting the same snapshot twice yields an identical packet.
pub fn augment_packet(packet: &mut LoopPacket, snap: &UpsSnapshot, settings: &UpsSettings) {
    let p = &settings.field_prefix;

    packet.insert(format!("{p}charge"), json!(snap.charge_percent));
    packet.insert(
        format!("{p}batt_voltage"),
        json!(round_milli(snap.battery_voltage)),
    );
    packet.insert(
        format!("{p}batt_current"),
        json!(round_milli(snap.battery_current)),
    );
    packet.insert(format!("{p}power_present"), json!(snap.power_present()));
    packet.insert(format!("{p}battery_status"), json!(snap.battery.label()));

    if settings.include_temperature {
        packet.insert(
            format!("{p}batt_temperature"),
            json!(snap.battery_temperature),
        );
    }

    if settings.include_io {
        packet.insert(format!("{p}io_voltage"), json!(round_milli(snap.io_voltage)));
        packet.insert(format!("{p}io_current"), json!(round_milli(snap.io_current)));
    }
}

/// Field names this agent emits with the given settings. Sent to the host at
/// registration so it can extend its schema before the first packet arrives.
pub fn emitted_fields(settings: &UpsSettings) -> Vec<String> {
    let p = &settings.field_prefix;
    let mut fields = vec![
        format!("{p}charge"),
        format!("{p}batt_voltage"),
        format!("{p}batt_current"),
        format!("{p}power_present"),
        format!("{p}battery_status"),
    ];
    if settings.include_temperature {
        fields.push(format!("{p}batt_temperature"));
    }
    if settings.include_io {
        fields.push(format!("{p}io_voltage"));
        fields.push(format!("{p}io_current"));
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ups::types::*;

    fn snapshot() -> UpsSnapshot {
        UpsSnapshot {
            charge_percent: 85,
            battery_voltage: 4.1,
            battery_current: 0.21,
            battery_temperature: 24.0,
            io_voltage: 5.12,
            io_current: -0.3,
            battery: BatteryState::ChargingFromIn,
            power_input: PowerInput::Present,
            power_input_io: PowerInput::NotPresent,
            faults: FaultStatus {
                button_power_off: false,
                forced_power_off: false,
                forced_sys_power_off: false,
                watchdog_reset: false,
                battery_profile_invalid: false,
                charging_temp: ChargingTempFault::Normal,
            },
        }
    }

    fn settings() -> UpsSettings {
        UpsSettings::default()
    }

    fn weather_packet() -> LoopPacket {
        let mut packet = LoopPacket::new();
        packet.insert("dateTime".into(), json!(1627900000));
        packet.insert("outTemp".into(), json!(17.2));
        packet.insert("barometer".into(), json!(1014.1));
        packet
    }

    #[test]
    fn scenario_85_percent_on_mains() {
        let mut packet = weather_packet();
        augment_packet(&mut packet, &snapshot(), &settings());

        assert_eq!(packet["ups_charge"], json!(85));
        assert_eq!(packet["ups_batt_voltage"], json!(4.1));
        assert_eq!(packet["ups_power_present"], json!(true));
        assert_eq!(packet["ups_battery_status"], json!("charging_from_in"));
        // Host fields untouched
        assert_eq!(packet["outTemp"], json!(17.2));
    }

    #[test]
    fn charge_is_in_range_and_numeric() {
        let mut packet = weather_packet();
        augment_packet(&mut packet, &snapshot(), &settings());
        let charge = packet["ups_charge"].as_u64().unwrap();
        assert!(charge <= 100);
        assert!(packet["ups_batt_voltage"].is_f64());
        assert!(packet["ups_power_present"].is_boolean());
    }

    #[test]
    fn augmentation_is_idempotent() {
        let mut once = weather_packet();
        augment_packet(&mut once, &snapshot(), &settings());
        let mut twice = once.clone();
        augment_packet(&mut twice, &snapshot(), &settings());
        assert_eq!(once, twice);
    }

    #[test]
    fn io_fields_are_gated_by_config() {
        let mut packet = weather_packet();
        augment_packet(&mut packet, &snapshot(), &settings());
        assert!(!packet.contains_key("ups_io_voltage"));

        let mut with_io = settings();
        with_io.include_io = true;
        let mut packet = weather_packet();
        augment_packet(&mut packet, &snapshot(), &with_io);
        assert_eq!(packet["ups_io_voltage"], json!(5.12));
        assert_eq!(packet["ups_io_current"], json!(-0.3));
    }

    #[test]
    fn custom_prefix_is_applied_everywhere() {
        let mut custom = settings();
        custom.field_prefix = "pj_".into();
        let mut packet = weather_packet();
        augment_packet(&mut packet, &snapshot(), &custom);
        assert!(packet.contains_key("pj_charge"));
        assert!(!packet.contains_key("ups_charge"));
        for field in emitted_fields(&custom) {
            assert!(packet.contains_key(&field), "missing {field}");
        }
    }

    #[test]
    fn emitted_fields_match_augmentation() {
        let mut all = settings();
        all.include_io = true;
        let mut packet = LoopPacket::new();
        augment_packet(&mut packet, &snapshot(), &all);
        let mut inserted: Vec<_> = packet.keys().cloned().collect();
        let mut declared = emitted_fields(&all);
        inserted.sort();
        declared.sort();
        assert_eq!(inserted, declared);
    }
}
