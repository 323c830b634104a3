use chrono::{DateTime, Utc};
use devicesim::fleet;
use devicesim::model::{AttributeValue, Device, DeviceType};
use devicesim::profile::UPTIME;
use rand::Rng;

/// A default device of the given type with randomized readings
pub fn generate_device(rng: &mut impl Rng, id: String, device_type: DeviceType, now: DateTime<Utc>) -> Device {
    let mut device = fleet::default_device(id, device_type, now);

    let readings: Vec<(&str, f64)> = match device_type {
        DeviceType::Sensor => vec![
            ("temp", rng.gen_range(15.0..35.0)),
            ("humidity", rng.gen_range(30.0..80.0)),
            // 2% start with a low battery
            ("battery", if rng.gen_bool(0.02) { rng.gen_range(0.0..20.0) } else { rng.gen_range(20.0..100.0) }),
        ],
        DeviceType::Actuator => vec![("position", rng.gen_range(0.0..100.0))],
        DeviceType::Gateway => vec![("connected_devices", rng.gen_range(0..50) as f64)],
    };

    for (name, value) in readings {
        device.attributes.insert(name.to_string(), AttributeValue::Number(round(value)));
    }
    device.attributes.insert(
        UPTIME.to_string(),
        AttributeValue::Number(rng.gen_range(0..86_400) as f64),
    );

    device
}

fn round(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use devicesim::profile;

    #[test]
    fn test_generated_readings_in_range() {
        let mut rng = rand::thread_rng();
        for _ in 0..100 {
            let device = generate_device(&mut rng, "dev-1".to_string(), DeviceType::Sensor, Utc::now());
            for name in ["temp", "humidity", "battery"] {
                let Some(AttributeValue::Number(value)) = device.attributes.get(name) else {
                    panic!("missing {}", name);
                };
                let (min, max) = profile::range(name).unwrap();
                assert!(*value >= min && *value <= max, "{} = {}", name, value);
            }
        }
    }

    #[test]
    fn test_generated_device_keeps_type_attributes() {
        let mut rng = rand::thread_rng();
        let device = generate_device(&mut rng, "gw-1".to_string(), DeviceType::Gateway, Utc::now());
        assert!(!device.attributes.contains_key("power"));
        assert!(device.attributes.contains_key("connected_devices"));
    }
}
