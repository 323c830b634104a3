//! Pure device state transitions.
//!
//! [`apply`] never touches the store. Given the same device snapshot,
//! request and submission time it always yields the same [`Transition`].

use crate::command::{self, DeviceCommand, Rejection};
use crate::model::{AttributeValue, CommandOutcome, CommandRequest, Device, DeviceStatus};
use crate::profile;
use chrono::{DateTime, Utc};
use serde_json::json;

/// Next device state and the outcome that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub next: Device,
    pub outcome: CommandOutcome,
}

impl Transition {
    fn rejected(current: &Device, rejection: Rejection) -> Self {
        Self {
            next: current.clone(),
            outcome: CommandOutcome::rejected(rejection.to_string()),
        }
    }
}

pub fn apply(current: &Device, request: &CommandRequest, submitted_at: DateTime<Utc>) -> Transition {
    let command = match command::parse(request, current.device_type) {
        Ok(command) => command,
        Err(rejection) => return Transition::rejected(current, rejection),
    };

    let kind = command.kind();
    if !kind.allowed_in(current.status) {
        return Transition::rejected(
            current,
            Rejection::NotAllowed {
                command: kind.name(),
                status: current.status,
            },
        );
    }

    let mut next = current.clone();
    next.updated_at = submitted_at;
    let outcome = execute(&mut next, command);

    Transition { next, outcome }
}

fn execute(device: &mut Device, command: DeviceCommand) -> CommandOutcome {
    match command {
        DeviceCommand::Ping => CommandOutcome::executed(json!({
            "status": device.status,
            "device_type": device.device_type,
        })),
        DeviceCommand::Reset => {
            device.status = DeviceStatus::Online;
            device.attributes = profile::defaults(device.device_type);
            CommandOutcome::executed(json!({ "status": device.status }))
        }
        DeviceCommand::Reboot => {
            device.status = DeviceStatus::Online;
            if let Some(uptime) = device.attributes.get_mut(profile::UPTIME) {
                *uptime = AttributeValue::Number(0.0);
            }
            device.attributes.remove(profile::LAST_ERROR);
            CommandOutcome::executed(json!({ "status": device.status }))
        }
        DeviceCommand::Shutdown => {
            device.status = DeviceStatus::Offline;
            CommandOutcome::executed(json!({ "status": device.status }))
        }
        DeviceCommand::InjectFault { reason } => {
            device.status = DeviceStatus::Error;
            device
                .attributes
                .insert(profile::LAST_ERROR.to_string(), AttributeValue::Text(reason.clone()));
            CommandOutcome::executed(json!({ "status": device.status, "last_error": reason }))
        }
        DeviceCommand::SetValue { attribute, value } => set_value(device, attribute, value),
        DeviceCommand::Toggle { attribute } => toggle(device, attribute),
    }
}

fn set_value(device: &mut Device, attribute: String, value: AttributeValue) -> CommandOutcome {
    if let Some(existing) = device.attributes.get(&attribute) {
        if existing.kind() != value.kind() {
            return CommandOutcome::failed(
                format!(
                    "attribute '{}' holds a {}, cannot assign a {}",
                    attribute,
                    existing.kind(),
                    value.kind()
                ),
                None,
            );
        }
    }

    if let AttributeValue::Number(requested) = value {
        let (stored, clamped) = profile::clamp(&attribute, requested);
        device
            .attributes
            .insert(attribute.clone(), AttributeValue::Number(stored));
        let result = json!({ "attribute": attribute, "value": stored });
        if clamped {
            return CommandOutcome::failed(
                format!("value {} for '{}' out of range, clamped to {}", requested, attribute, stored),
                Some(result),
            );
        }
        return CommandOutcome::executed(result);
    }

    let result = json!({ "attribute": attribute, "value": value });
    device.attributes.insert(attribute, value);
    CommandOutcome::executed(result)
}

fn toggle(device: &mut Device, attribute: String) -> CommandOutcome {
    match device.attributes.get_mut(&attribute) {
        Some(AttributeValue::Bool(flag)) => {
            *flag = !*flag;
            CommandOutcome::executed(json!({ "attribute": attribute, "value": *flag }))
        }
        Some(other) => CommandOutcome::failed(
            format!("attribute '{}' is a {}, not a boolean", attribute, other.kind()),
            None,
        ),
        None => CommandOutcome::failed(format!("attribute '{}' does not exist", attribute), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fleet;
    use crate::model::{CommandStatus, DeviceType};
    use chrono::{Duration, TimeZone};

    fn seeded_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn sensor() -> Device {
        fleet::default_device("dev-1", DeviceType::Sensor, seeded_at())
    }

    fn later() -> DateTime<Utc> {
        seeded_at() + Duration::seconds(30)
    }

    #[test]
    fn test_set_value_overwrites_attribute() {
        let request = CommandRequest::new("set_value")
            .param("attribute", "temp")
            .param("value", 25.5);

        let transition = apply(&sensor(), &request, later());

        assert_eq!(transition.outcome.status, CommandStatus::Executed);
        assert_eq!(
            transition.next.attributes.get("temp"),
            Some(&AttributeValue::Number(25.5))
        );
        assert_eq!(transition.next.updated_at, later());
    }

    #[test]
    fn test_apply_is_deterministic() {
        let request = CommandRequest::new("toggle").param("attribute", "power");
        let device = sensor();

        let first = apply(&device, &request, later());
        let second = apply(&device, &request, later());
        assert_eq!(first, second);
    }

    #[test]
    fn test_toggle_flips_boolean() {
        let request = CommandRequest::new("toggle").param("attribute", "power");
        let transition = apply(&sensor(), &request, later());

        assert_eq!(transition.outcome.status, CommandStatus::Executed);
        assert_eq!(
            transition.next.attributes.get("power"),
            Some(&AttributeValue::Bool(false))
        );
    }

    #[test]
    fn test_toggle_non_boolean_reports_error() {
        let request = CommandRequest::new("toggle").param("attribute", "temp");
        let device = sensor();
        let transition = apply(&device, &request, later());

        assert_eq!(transition.outcome.status, CommandStatus::ExecutedWithError);
        assert_eq!(transition.next.attributes, device.attributes);
    }

    #[test]
    fn test_toggle_missing_attribute_reports_error() {
        let request = CommandRequest::new("toggle").param("attribute", "fan");
        let transition = apply(&sensor(), &request, later());
        assert_eq!(transition.outcome.status, CommandStatus::ExecutedWithError);
        assert!(transition.outcome.reason.unwrap().contains("does not exist"));
    }

    #[test]
    fn test_out_of_range_value_is_clamped() {
        let request = CommandRequest::new("set_value")
            .param("attribute", "humidity")
            .param("value", 140.0);
        let transition = apply(&sensor(), &request, later());

        assert_eq!(transition.outcome.status, CommandStatus::ExecutedWithError);
        assert_eq!(
            transition.next.attributes.get("humidity"),
            Some(&AttributeValue::Number(100.0))
        );
    }

    #[test]
    fn test_no_coercion_between_bool_and_number() {
        let request = CommandRequest::new("set_value")
            .param("attribute", "power")
            .param("value", 1.0);
        let device = sensor();
        let transition = apply(&device, &request, later());

        assert_eq!(transition.outcome.status, CommandStatus::ExecutedWithError);
        assert_eq!(transition.next.attributes.get("power"), Some(&AttributeValue::Bool(true)));
    }

    #[test]
    fn test_set_value_creates_new_attribute() {
        let request = CommandRequest::new("set_value")
            .param("attribute", "label")
            .param("value", "greenhouse");
        let transition = apply(&sensor(), &request, later());

        assert_eq!(transition.outcome.status, CommandStatus::Executed);
        assert_eq!(
            transition.next.attributes.get("label"),
            Some(&AttributeValue::Text("greenhouse".to_string()))
        );
    }

    #[test]
    fn test_offline_device_rejects_set_value() {
        let mut device = sensor();
        device.status = DeviceStatus::Offline;
        let request = CommandRequest::new("set_value")
            .param("attribute", "temp")
            .param("value", 25.5);

        let transition = apply(&device, &request, later());

        assert_eq!(transition.outcome.status, CommandStatus::Rejected);
        assert_eq!(transition.next, device);
    }

    #[test]
    fn test_offline_device_answers_ping() {
        let mut device = sensor();
        device.status = DeviceStatus::Offline;
        let transition = apply(&device, &CommandRequest::new("ping"), later());

        assert_eq!(transition.outcome.status, CommandStatus::Executed);
        assert_eq!(transition.next.status, DeviceStatus::Offline);
        assert_eq!(transition.outcome.result.unwrap()["status"], "offline");
    }

    #[test]
    fn test_reset_restores_defaults_from_error() {
        let faulted = apply(&sensor(), &CommandRequest::new("inject_fault"), later()).next;
        assert_eq!(faulted.status, DeviceStatus::Error);
        assert!(faulted.attributes.contains_key(profile::LAST_ERROR));

        let mut drifted = faulted.clone();
        drifted.attributes.insert("temp".to_string(), AttributeValue::Number(60.0));

        let reset = apply(&drifted, &CommandRequest::new("reset"), later());
        assert_eq!(reset.next.status, DeviceStatus::Online);
        assert_eq!(reset.next.attributes, profile::defaults(DeviceType::Sensor));
    }

    #[test]
    fn test_reboot_clears_transient_attributes() {
        let mut device = sensor();
        device.attributes.insert(profile::UPTIME.to_string(), AttributeValue::Number(3600.0));
        device
            .attributes
            .insert(profile::LAST_ERROR.to_string(), AttributeValue::Text("brownout".to_string()));
        device.attributes.insert("temp".to_string(), AttributeValue::Number(31.0));

        let transition = apply(&device, &CommandRequest::new("reboot"), later());

        assert_eq!(transition.outcome.status, CommandStatus::Executed);
        assert_eq!(
            transition.next.attributes.get(profile::UPTIME),
            Some(&AttributeValue::Number(0.0))
        );
        assert!(!transition.next.attributes.contains_key(profile::LAST_ERROR));
        assert_eq!(
            transition.next.attributes.get("temp"),
            Some(&AttributeValue::Number(31.0))
        );
    }

    #[test]
    fn test_shutdown_then_reboot_rejected() {
        let offline = apply(&sensor(), &CommandRequest::new("shutdown"), later()).next;
        assert_eq!(offline.status, DeviceStatus::Offline);

        let transition = apply(&offline, &CommandRequest::new("reboot"), later());
        assert_eq!(transition.outcome.status, CommandStatus::Rejected);
        assert!(transition.outcome.reason.unwrap().contains("offline"));
    }

    #[test]
    fn test_unsupported_command_leaves_state_untouched() {
        let gateway = fleet::default_device("gw-1", DeviceType::Gateway, seeded_at());
        let request = CommandRequest::new("toggle").param("attribute", "power");

        let transition = apply(&gateway, &request, later());
        assert_eq!(transition.outcome.status, CommandStatus::Rejected);
        assert_eq!(transition.next, gateway);
    }
}
