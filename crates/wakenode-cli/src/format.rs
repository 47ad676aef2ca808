//! Output formatting for text and JSON output.

use std::fmt::Write as _;

use anyhow::Result;
use serde::Serialize;

use wakenode_core::BatteryStatus;
use wakenode_core::properties::{BATTERY_CHANNEL, DIAGNOSTICS_CHANNEL};

use crate::sim::CycleReport;

/// Serialize a value as pretty JSON with a trailing newline.
pub fn as_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)? + "\n")
}

/// Channels in first-publish order, excluding battery and diagnostics.
fn sensor_channels(report: &CycleReport) -> Vec<&str> {
    let mut channels: Vec<&str> = Vec::new();
    for property in &report.published {
        let channel = property.channel.as_str();
        if channel != BATTERY_CHANNEL
            && channel != DIAGNOSTICS_CHANNEL
            && !channels.contains(&channel)
        {
            channels.push(channel);
        }
    }
    channels
}

/// Human-readable summary of one cycle.
#[must_use]
pub fn format_cycle_text(report: &CycleReport) -> String {
    let mut output = String::new();

    let _ = writeln!(
        output,
        "Cycle {} [{}] {}: {} after {} ticks",
        report.cycle, report.started_at, report.device_id, report.final_state, report.stats.ticks
    );

    match &report.stats.battery {
        Some(battery) => {
            let _ = writeln!(
                output,
                "  {:<14} {:.2} V (raw {})",
                BATTERY_CHANNEL, battery.voltage, battery.raw_sample
            );
        }
        None => {
            let _ = writeln!(output, "  {:<14} not sampled", BATTERY_CHANNEL);
        }
    }

    for channel in sensor_channels(report) {
        let values: Vec<String> = report
            .published
            .iter()
            .filter(|p| p.channel == channel)
            .map(|p| format!("{}={}", p.key, p.value))
            .collect();
        let _ = writeln!(output, "  {:<14} {}", channel, values.join(" "));
    }

    if report.stats.had_timeout() {
        let _ = writeln!(output, "  timed out:     {}", report.stats.timed_out.join(", "));
    }

    match report.sleep_seconds {
        Some(seconds) => {
            let _ = writeln!(output, "  sleep          {} s", seconds);
        }
        None => {
            let _ = writeln!(output, "  sleep          not entered");
        }
    }

    output
}

/// Human-readable summary of several cycles.
#[must_use]
pub fn format_cycles_text(reports: &[CycleReport]) -> String {
    reports
        .iter()
        .map(format_cycle_text)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Heat index line.
#[must_use]
pub fn format_heat_index(temperature_f: f32, humidity: f32, heat_index: f32) -> String {
    format!(
        "Heat index: {:.2} °F ({:.2} °F at {:.2} %RH)\n",
        heat_index, temperature_f, humidity
    )
}

/// Battery voltage line.
#[must_use]
pub fn format_battery(status: &BatteryStatus) -> String {
    format!(
        "Battery: {:.2} V (raw {} × {})\n",
        status.voltage, status.raw_sample, status.coefficient
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::PublishedProperty;
    use wakenode_core::{CycleStats, LifecycleState};

    fn property(channel: &str, key: &str, value: &str) -> PublishedProperty {
        PublishedProperty {
            channel: channel.to_string(),
            key: key.to_string(),
            value: value.to_string(),
        }
    }

    fn report() -> CycleReport {
        CycleReport {
            cycle: 1,
            started_at: "2026-01-01T00:00:00Z".to_string(),
            device_id: "tempsensor".to_string(),
            final_state: LifecycleState::Sleeping,
            sleep_seconds: Some(300),
            stats: CycleStats {
                ticks: 6,
                battery: Some(BatteryStatus::from_raw(600, 0.0055)),
                timed_out: vec!["refrigerator".to_string()],
                ..Default::default()
            },
            published: vec![
                property("battery", "voltage", "3.30"),
                property("freezer", "tempC", "-18.00"),
                property("freezer", "humidity", "60.00"),
                property("diagnostics", "unreported", "refrigerator"),
            ],
        }
    }

    #[test]
    fn test_cycle_text() {
        let text = format_cycle_text(&report());
        assert!(text.starts_with("Cycle 1 [2026-01-01T00:00:00Z] tempsensor: sleeping after 6 ticks"));
        assert!(text.contains("3.30 V (raw 600)"));
        assert!(text.contains("freezer        tempC=-18.00 humidity=60.00"));
        assert!(text.contains("timed out:     refrigerator"));
        assert!(text.contains("300 s"));
        assert!(!text.contains("diagnostics "));
    }

    #[test]
    fn test_cycle_json() {
        let json = as_json(&[report()]).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value[0]["final_state"], "sleeping");
        assert_eq!(value[0]["published"][0]["value"], "3.30");
        assert_eq!(value[0]["stats"]["ticks"], 6);
    }

    #[test]
    fn test_heat_index_line() {
        assert_eq!(
            format_heat_index(77.0, 50.0, 76.75),
            "Heat index: 76.75 °F (77.00 °F at 50.00 %RH)\n"
        );
    }

    #[test]
    fn test_battery_line() {
        let line = format_battery(&BatteryStatus::from_raw(600, 0.0055));
        assert!(line.starts_with("Battery: 3.30 V (raw 600"));
    }
}
