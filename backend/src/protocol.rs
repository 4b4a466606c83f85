//! Text frame protocol: `COMMAND:payload`.

use hanger_core::coordinator::PipeRun;
use hanger_core::element::ElementId;
use hanger_core::geometry::Point3;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Deserialize)]
pub struct StructureCmd {
    pub name: String,
    pub min: Point3,
    pub max: Point3,
}

#[derive(Debug, Deserialize)]
pub struct PlaceCmd {
    pub pipes: Vec<PipeRun>,
    /// Also register each pipe body in the scene before casting rays.
    #[serde(default = "default_true")]
    pub register_pipes: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug)]
pub enum Command {
    /// Raw `Key: value` configuration text.
    LoadConfig(String),
    /// Raw `<diameter> <spacing>` lines.
    LoadSpec(String),
    SceneAdd(StructureCmd),
    SceneRemove(ElementId),
    SceneClear,
    Place(PlaceCmd),
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Unknown command '{0}'")]
    Unknown(String),

    #[error("Malformed {command} payload: {reason}")]
    Payload { command: &'static str, reason: String },
}

impl ProtocolError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unknown(_) => "UNKNOWN_COMMAND",
            Self::Payload { .. } => "BAD_PAYLOAD",
        }
    }
}

fn json_payload<T: for<'de> Deserialize<'de>>(command: &'static str, payload: &str) -> Result<T, ProtocolError> {
    serde_json::from_str(payload).map_err(|e| ProtocolError::Payload {
        command,
        reason: e.to_string(),
    })
}

impl Command {
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        if text == "SCENE_CLEAR" {
            return Ok(Self::SceneClear);
        }
        let (name, payload) = text
            .split_once(':')
            .ok_or_else(|| ProtocolError::Unknown(text.to_string()))?;

        match name {
            "LOAD_CONFIG" => Ok(Self::LoadConfig(payload.to_string())),
            "LOAD_SPEC" => Ok(Self::LoadSpec(payload.to_string())),
            "SCENE_ADD" => json_payload("SCENE_ADD", payload).map(Self::SceneAdd),
            "SCENE_REMOVE" => uuid::Uuid::parse_str(payload.trim())
                .map(|id| Self::SceneRemove(ElementId::from_uuid(id)))
                .map_err(|e| ProtocolError::Payload {
                    command: "SCENE_REMOVE",
                    reason: e.to_string(),
                }),
            "PLACE" => json_payload("PLACE", payload).map(Self::Place),
            other => Err(ProtocolError::Unknown(other.to_string())),
        }
    }
}

/// Format an error as a JSON message for the client
pub fn format_error(code: &str, message: &str, severity: &str) -> String {
    format!(
        "ERROR_UPDATE:{}",
        json!({
            "code": code,
            "message": message,
            "severity": severity
        })
    )
}
