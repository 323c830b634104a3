use crate::model::{AttributeValue, CommandRequest, DeviceStatus, DeviceType, ValueKind};
use std::collections::BTreeMap;
use thiserror::Error;
use std::fmt;

/// Expected kind of a command parameter. `Any` accepts every scalar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Text,
    Any,
}

impl ParamKind {
    fn accepts(&self, value: &AttributeValue) -> bool {
        match self {
            ParamKind::Text => value.kind() == ValueKind::Text,
            ParamKind::Any => true,
        }
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamKind::Text => f.write_str("string"),
            ParamKind::Any => f.write_str("any value"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub required: bool,
}

const fn required(name: &'static str, kind: ParamKind) -> ParamSpec {
    ParamSpec { name, kind, required: true }
}

const fn optional(name: &'static str, kind: ParamKind) -> ParamSpec {
    ParamSpec { name, kind, required: false }
}

const NO_PARAMS: &[ParamSpec] = &[];
const SET_VALUE_PARAMS: &[ParamSpec] = &[
    required("attribute", ParamKind::Text),
    required("value", ParamKind::Any),
];
const TOGGLE_PARAMS: &[ParamSpec] = &[required("attribute", ParamKind::Text)];
const INJECT_FAULT_PARAMS: &[ParamSpec] = &[optional("reason", ParamKind::Text)];

pub const DEFAULT_FAULT_REASON: &str = "simulated fault";

/// Names of every command the simulator knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Ping,
    Reset,
    Reboot,
    Shutdown,
    InjectFault,
    SetValue,
    Toggle,
}

impl CommandKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "ping" => Some(CommandKind::Ping),
            "reset" => Some(CommandKind::Reset),
            "reboot" => Some(CommandKind::Reboot),
            "shutdown" => Some(CommandKind::Shutdown),
            "inject_fault" => Some(CommandKind::InjectFault),
            "set_value" => Some(CommandKind::SetValue),
            "toggle" => Some(CommandKind::Toggle),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CommandKind::Ping => "ping",
            CommandKind::Reset => "reset",
            CommandKind::Reboot => "reboot",
            CommandKind::Shutdown => "shutdown",
            CommandKind::InjectFault => "inject_fault",
            CommandKind::SetValue => "set_value",
            CommandKind::Toggle => "toggle",
        }
    }

    pub fn schema(&self) -> &'static [ParamSpec] {
        match self {
            CommandKind::SetValue => SET_VALUE_PARAMS,
            CommandKind::Toggle => TOGGLE_PARAMS,
            CommandKind::InjectFault => INJECT_FAULT_PARAMS,
            CommandKind::Ping | CommandKind::Reset | CommandKind::Reboot | CommandKind::Shutdown => {
                NO_PARAMS
            }
        }
    }

    pub fn supported_by(&self, device_type: DeviceType) -> bool {
        match self {
            CommandKind::SetValue | CommandKind::Toggle => device_type != DeviceType::Gateway,
            _ => true,
        }
    }

    /// Offline and faulted devices only answer pings and resets.
    pub fn allowed_in(&self, status: DeviceStatus) -> bool {
        match status {
            DeviceStatus::Online => true,
            DeviceStatus::Offline | DeviceStatus::Error => {
                matches!(self, CommandKind::Ping | CommandKind::Reset)
            }
        }
    }
}

/// A command whose parameters have been checked against its schema
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCommand {
    Ping,
    Reset,
    Reboot,
    Shutdown,
    InjectFault { reason: String },
    SetValue { attribute: String, value: AttributeValue },
    Toggle { attribute: String },
}

impl DeviceCommand {
    pub fn kind(&self) -> CommandKind {
        match self {
            DeviceCommand::Ping => CommandKind::Ping,
            DeviceCommand::Reset => CommandKind::Reset,
            DeviceCommand::Reboot => CommandKind::Reboot,
            DeviceCommand::Shutdown => CommandKind::Shutdown,
            DeviceCommand::InjectFault { .. } => CommandKind::InjectFault,
            DeviceCommand::SetValue { .. } => CommandKind::SetValue,
            DeviceCommand::Toggle { .. } => CommandKind::Toggle,
        }
    }
}

/// Why a request never reached a transition rule
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Rejection {
    #[error("unknown command '{0}'")]
    UnknownCommand(String),
    #[error("command '{command}' is not supported by {device_type} devices")]
    Unsupported { command: &'static str, device_type: DeviceType },
    #[error("missing required parameter '{0}'")]
    MissingParameter(&'static str),
    #[error("parameter '{parameter}' must be {expected}, got {found}")]
    WrongKind { parameter: &'static str, expected: ParamKind, found: ValueKind },
    #[error("parameter '{parameter}' is invalid: {message}")]
    InvalidParameter { parameter: &'static str, message: String },
    #[error("none of the supplied parameters are recognized by '{0}'")]
    NoRecognizedParameters(String),
    #[error("command '{command}' is not allowed while the device is {status}")]
    NotAllowed { command: &'static str, status: DeviceStatus },
}

/// Validates `request` against the command table for `device_type`.
///
/// Checks run in order: known name, type support, parameter schema.
/// Parameters outside the schema are ignored unless none of the supplied
/// parameters is recognized.
pub fn parse(request: &CommandRequest, device_type: DeviceType) -> Result<DeviceCommand, Rejection> {
    let kind = CommandKind::from_name(&request.name)
        .ok_or_else(|| Rejection::UnknownCommand(request.name.clone()))?;

    if !kind.supported_by(device_type) {
        return Err(Rejection::Unsupported {
            command: kind.name(),
            device_type,
        });
    }

    let params = check_schema(kind, &request.parameters)?;

    let command = match kind {
        CommandKind::Ping => DeviceCommand::Ping,
        CommandKind::Reset => DeviceCommand::Reset,
        CommandKind::Reboot => DeviceCommand::Reboot,
        CommandKind::Shutdown => DeviceCommand::Shutdown,
        CommandKind::InjectFault => DeviceCommand::InjectFault {
            reason: match params.get("reason") {
                Some(AttributeValue::Text(reason)) if !reason.is_empty() => reason.clone(),
                _ => DEFAULT_FAULT_REASON.to_string(),
            },
        },
        CommandKind::SetValue => {
            let value = params
                .get("value")
                .map(|v| (*v).clone())
                .ok_or(Rejection::MissingParameter("value"))?;
            if let AttributeValue::Number(n) = value {
                if !n.is_finite() {
                    return Err(Rejection::InvalidParameter {
                        parameter: "value",
                        message: "number must be finite".to_string(),
                    });
                }
            }
            DeviceCommand::SetValue {
                attribute: attribute_name(&params)?,
                value,
            }
        }
        CommandKind::Toggle => DeviceCommand::Toggle {
            attribute: attribute_name(&params)?,
        },
    };

    Ok(command)
}

fn check_schema<'a>(
    kind: CommandKind,
    supplied: &'a BTreeMap<String, AttributeValue>,
) -> Result<BTreeMap<&'static str, &'a AttributeValue>, Rejection> {
    let schema = kind.schema();
    let mut recognized = BTreeMap::new();

    for param in schema {
        match supplied.get(param.name) {
            Some(value) if !param.kind.accepts(value) => {
                return Err(Rejection::WrongKind {
                    parameter: param.name,
                    expected: param.kind,
                    found: value.kind(),
                });
            }
            Some(value) => {
                recognized.insert(param.name, value);
            }
            None if param.required => return Err(Rejection::MissingParameter(param.name)),
            None => {}
        }
    }

    if !supplied.is_empty() && recognized.is_empty() {
        return Err(Rejection::NoRecognizedParameters(kind.name().to_string()));
    }

    Ok(recognized)
}

fn attribute_name(params: &BTreeMap<&'static str, &AttributeValue>) -> Result<String, Rejection> {
    match params.get("attribute") {
        Some(AttributeValue::Text(name)) if !name.trim().is_empty() => Ok(name.clone()),
        Some(_) => Err(Rejection::InvalidParameter {
            parameter: "attribute",
            message: "attribute name cannot be empty".to_string(),
        }),
        None => Err(Rejection::MissingParameter("attribute")),
    }
}
