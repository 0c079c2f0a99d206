use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

pub const AWAITING_MODE_SELECTION: &str = "AWAITING_MODE_SELECTION";
pub const MANUAL_OVERRIDE: &str = "MANUAL_OVERRIDE";

/// Where the installation is in the story.
///
/// Scene tokens are free-form: the decision service may name a scene the
/// table does not know, and the state still follows it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum SceneState {
    #[default]
    AwaitingModeSelection,
    /// Entered by a direct arm command that bypassed the decision service.
    ManualOverride,
    Scene(String),
}

impl SceneState {
    pub fn as_str(&self) -> &str {
        match self {
            SceneState::AwaitingModeSelection => AWAITING_MODE_SELECTION,
            SceneState::ManualOverride => MANUAL_OVERRIDE,
            SceneState::Scene(name) => name,
        }
    }
}

impl From<&str> for SceneState {
    fn from(token: &str) -> Self {
        match token {
            AWAITING_MODE_SELECTION => SceneState::AwaitingModeSelection,
            MANUAL_OVERRIDE => SceneState::ManualOverride,
            other => SceneState::Scene(other.to_string()),
        }
    }
}

impl FromStr for SceneState {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(SceneState::from(s))
    }
}

impl fmt::Display for SceneState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for SceneState {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SceneState {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let token = String::deserialize(d)?;
        Ok(SceneState::from(token.as_str()))
    }
}

/// What caused a state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeSource {
    Turn,
    SceneTrigger,
    ManualArm,
    Story,
}

/// Broadcast to dashboard subscribers whenever the scene state is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateChange {
    pub id: Uuid,
    pub scene: SceneState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narrative: Option<String>,
    pub source: ChangeSource,
    pub at: DateTime<Utc>,
}
