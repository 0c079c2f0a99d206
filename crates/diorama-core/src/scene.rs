//! Scene action table: scene names to ordered actuator operations.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ack::Ack;
use crate::error::{DioramaError, Result};
use crate::hardware::{Actuator, ArmMoveRequest};

const BUILTIN_SCENES: &str = include_str!("scenes.yaml");

// ---------------------------------------------------------------------------
// Table entries
// ---------------------------------------------------------------------------

/// One row of a scene's action list. Kept untyped so a table file with an
/// unknown action still loads; the action is rejected when it runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionSpec {
    pub action: String,
    #[serde(default)]
    pub params: Map<String, Value>,
}

impl ActionSpec {
    pub fn new(action: impl Into<String>, params: Value) -> Self {
        let params = match params {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            action: action.into(),
            params,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SceneEntry {
    /// Redirect to another scene.
    Alias(String),
    Actions(Vec<ActionSpec>),
}

/// Outcome of looking a name up, following aliases.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution<'a> {
    Resolved {
        scene: &'a str,
        actions: &'a [ActionSpec],
    },
    Unknown(String),
    /// The alias chain revisits a name; the path ends with the repeated name.
    Cycle(Vec<String>),
}

// ---------------------------------------------------------------------------
// SceneTable
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SceneTable {
    entries: BTreeMap<String, SceneEntry>,
}

impl SceneTable {
    /// The installation's scenes, compiled into the binary.
    pub fn builtin() -> Result<Self> {
        Self::from_yaml_str(BUILTIN_SCENES)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&data)
    }

    /// `path` when given, otherwise the built-in table.
    pub fn load_or_builtin(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Self::builtin(),
        }
    }

    pub fn insert(&mut self, name: impl Into<String>, entry: SceneEntry) {
        self.entries.insert(name.into(), entry);
    }

    pub fn get(&self, name: &str) -> Option<&SceneEntry> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Follow aliases until an action list, a missing name, or a repeat.
    pub fn resolve(&self, name: &str) -> Resolution<'_> {
        let mut path = vec![name.to_string()];
        let mut seen: HashSet<&str> = HashSet::new();
        let mut current = match self.entries.get_key_value(name) {
            Some((key, _)) => key.as_str(),
            None => return Resolution::Unknown(name.to_string()),
        };

        loop {
            seen.insert(current);
            match self.entries.get(current) {
                None => return Resolution::Unknown(current.to_string()),
                Some(SceneEntry::Actions(actions)) => {
                    return Resolution::Resolved {
                        scene: current,
                        actions,
                    }
                }
                Some(SceneEntry::Alias(target)) => {
                    path.push(target.clone());
                    if seen.contains(target.as_str()) {
                        return Resolution::Cycle(path);
                    }
                    current = target.as_str();
                }
            }
        }
    }

    /// Resolve to an action list or an error.
    pub fn actions_for(&self, name: &str) -> Result<&[ActionSpec]> {
        match self.resolve(name) {
            Resolution::Resolved { actions, .. } => Ok(actions),
            Resolution::Unknown(missing) => Err(DioramaError::SceneNotFound(missing)),
            Resolution::Cycle(path) => Err(DioramaError::AliasCycle(path)),
        }
    }

    /// Names with their own action list, sorted.
    pub fn primary_scenes(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(_, e)| matches!(e, SceneEntry::Actions(_)))
            .map(|(k, _)| k.as_str())
            .collect()
    }

    /// `(alias, target)` pairs, sorted by alias.
    pub fn aliases(&self) -> Vec<(&str, &str)> {
        self.entries
            .iter()
            .filter_map(|(k, e)| match e {
                SceneEntry::Alias(target) => Some((k.as_str(), target.as_str())),
                SceneEntry::Actions(_) => None,
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Operation
// ---------------------------------------------------------------------------

/// The closed set of things a scene action can do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    TriggerScene { scene_command_id: i64 },
    MoveArm(ArmMoveRequest),
    PlayMedia { identifier: String },
}

#[derive(Deserialize)]
struct TriggerParams {
    scene_command_id: i64,
}

#[derive(Deserialize)]
struct MediaParams {
    #[serde(alias = "video_file", alias = "file")]
    identifier: String,
}

impl Operation {
    /// Map a table row onto an operation. Unknown action names and
    /// malformed parameters are errors; parameter ranges are not checked
    /// here.
    pub fn from_spec(spec: &ActionSpec) -> Result<Self> {
        match spec.action.as_str() {
            "trigger_diorama_scene" | "trigger_scene" => {
                let p: TriggerParams = params(spec)?;
                Ok(Operation::TriggerScene {
                    scene_command_id: p.scene_command_id,
                })
            }
            "move_robotic_arm" | "move_arm" => Ok(Operation::MoveArm(params(spec)?)),
            "play_video" | "play_media" => {
                let p: MediaParams = params(spec)?;
                Ok(Operation::PlayMedia {
                    identifier: p.identifier,
                })
            }
            other => Err(DioramaError::UnknownOperation(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Operation::TriggerScene { .. } => "trigger_scene",
            Operation::MoveArm(_) => "move_arm",
            Operation::PlayMedia { .. } => "play_media",
        }
    }

    pub async fn apply(&self, actuator: &dyn Actuator) -> Ack {
        match self {
            Operation::TriggerScene { scene_command_id } => {
                actuator.trigger_scene(*scene_command_id).await
            }
            Operation::MoveArm(request) => actuator.move_arm(*request).await,
            Operation::PlayMedia { identifier } => actuator.play_media(identifier).await,
        }
    }
}

fn params<T: DeserializeOwned>(spec: &ActionSpec) -> Result<T> {
    serde_json::from_value(Value::Object(spec.params.clone())).map_err(|e| {
        DioramaError::InvalidParams {
            action: spec.action.clone(),
            reason: e.to_string(),
        }
    })
}
