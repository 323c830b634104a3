use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

pub type Attributes = BTreeMap<String, AttributeValue>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceType {
    Sensor,
    Actuator,
    Gateway,
}

impl DeviceType {
    pub const ALL: [DeviceType; 3] = [DeviceType::Sensor, DeviceType::Actuator, DeviceType::Gateway];
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceType::Sensor => f.write_str("sensor"),
            DeviceType::Actuator => f.write_str("actuator"),
            DeviceType::Gateway => f.write_str("gateway"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceStatus {
    Online,
    Offline,
    Error,
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceStatus::Online => f.write_str("online"),
            DeviceStatus::Offline => f.write_str("offline"),
            DeviceStatus::Error => f.write_str("error"),
        }
    }
}

/// Attribute and parameter values. Serialized as bare JSON scalars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl AttributeValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            AttributeValue::Bool(_) => ValueKind::Boolean,
            AttributeValue::Number(_) => ValueKind::Number,
            AttributeValue::Text(_) => ValueKind::Text,
        }
    }
}

impl From<bool> for AttributeValue {
    fn from(v: bool) -> Self {
        AttributeValue::Bool(v)
    }
}

impl From<f64> for AttributeValue {
    fn from(v: f64) -> Self {
        AttributeValue::Number(v)
    }
}

impl From<&str> for AttributeValue {
    fn from(v: &str) -> Self {
        AttributeValue::Text(v.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Boolean,
    Number,
    Text,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueKind::Boolean => f.write_str("boolean"),
            ValueKind::Number => f.write_str("number"),
            ValueKind::Text => f.write_str("string"),
        }
    }
}

/// Simulated device state as stored under `device:{id}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub id: String,
    pub device_type: DeviceType,
    pub status: DeviceStatus,
    #[serde(default)]
    pub attributes: Attributes,
    pub updated_at: DateTime<Utc>,
}

/// Command as submitted by the API layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandRequest {
    #[serde(alias = "action")]
    pub name: String,
    #[serde(default)]
    pub parameters: BTreeMap<String, AttributeValue>,
}

impl CommandRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: BTreeMap::new(),
        }
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandStatus {
    Executed,
    Rejected,
    ExecutedWithError,
}

impl CommandStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandStatus::Executed => "executed",
            CommandStatus::Rejected => "rejected",
            CommandStatus::ExecutedWithError => "executed_with_error",
        }
    }
}

/// Classification of an applied command plus its result payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandOutcome {
    pub status: CommandStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
}

impl CommandOutcome {
    pub fn executed(result: serde_json::Value) -> Self {
        Self {
            status: CommandStatus::Executed,
            reason: None,
            result: Some(result),
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            status: CommandStatus::Rejected,
            reason: Some(reason.into()),
            result: None,
        }
    }

    pub fn failed(reason: impl Into<String>, result: Option<serde_json::Value>) -> Self {
        Self {
            status: CommandStatus::ExecutedWithError,
            reason: Some(reason.into()),
            result,
        }
    }
}

/// A recorded command. Immutable once appended to the history log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub id: Uuid,
    pub device_id: String,
    pub name: String,
    #[serde(default)]
    pub parameters: BTreeMap<String, AttributeValue>,
    pub submitted_at: DateTime<Utc>,
    #[serde(flatten)]
    pub outcome: CommandOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandHistoryEntry {
    pub command: Command,
    pub before: Device,
    pub after: Device,
}

/// REST API response wrapper for history pages
#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub data: Vec<CommandHistoryEntry>,
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
}
