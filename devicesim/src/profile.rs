//! Per-type attribute defaults and numeric ranges.

use crate::model::{AttributeValue, Attributes, DeviceType};

const TEMP_MIN: f64 = -50.0;
const TEMP_MAX: f64 = 100.0;
const PERCENT_MIN: f64 = 0.0;
const PERCENT_MAX: f64 = 100.0;

pub const UPTIME: &str = "uptime_s";
pub const LAST_ERROR: &str = "last_error";

/// Factory attributes for a device of `device_type`
pub fn defaults(device_type: DeviceType) -> Attributes {
    let pairs = match device_type {
        DeviceType::Sensor => vec![
            ("temp", AttributeValue::Number(20.0)),
            ("humidity", AttributeValue::Number(45.0)),
            ("battery", AttributeValue::Number(100.0)),
            ("power", AttributeValue::Bool(true)),
            (UPTIME, AttributeValue::Number(0.0)),
        ],
        DeviceType::Actuator => vec![
            ("position", AttributeValue::Number(0.0)),
            ("power", AttributeValue::Bool(true)),
            (UPTIME, AttributeValue::Number(0.0)),
        ],
        DeviceType::Gateway => vec![
            ("connected_devices", AttributeValue::Number(0.0)),
            (UPTIME, AttributeValue::Number(0.0)),
        ],
    };

    pairs
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
}

/// Inclusive bounds for attributes that carry a physical range
pub fn range(attribute: &str) -> Option<(f64, f64)> {
    match attribute {
        "temp" => Some((TEMP_MIN, TEMP_MAX)),
        "humidity" | "battery" | "position" => Some((PERCENT_MIN, PERCENT_MAX)),
        _ => None,
    }
}

/// Clamps `value` into the range of `attribute`.
///
/// Returns the clamped value and whether clamping changed it.
pub fn clamp(attribute: &str, value: f64) -> (f64, bool) {
    match range(attribute) {
        Some((min, _)) if value < min => (min, true),
        Some((_, max)) if value > max => (max, true),
        _ => (value, false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sensor_defaults() {
        let attrs = defaults(DeviceType::Sensor);
        assert_eq!(attrs.get("temp"), Some(&AttributeValue::Number(20.0)));
        assert_eq!(attrs.get("power"), Some(&AttributeValue::Bool(true)));
        assert!(attrs.contains_key(UPTIME));
    }

    #[test]
    fn test_gateway_has_no_power_switch() {
        assert!(!defaults(DeviceType::Gateway).contains_key("power"));
    }

    #[test]
    fn test_clamp_temperature() {
        assert_eq!(clamp("temp", 150.0), (100.0, true));
        assert_eq!(clamp("temp", -80.0), (-50.0, true));
        assert_eq!(clamp("temp", 25.0), (25.0, false));
    }

    #[test]
    fn test_clamp_unbounded_attribute() {
        assert_eq!(clamp("connected_devices", 1e6), (1e6, false));
    }
}
