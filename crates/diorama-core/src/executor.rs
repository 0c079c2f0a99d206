//! Runs a scene's action list against an [`Actuator`].

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::ack::Ack;
use crate::error::DioramaError;
use crate::hardware::Actuator;
use crate::scene::{Operation, Resolution, SceneTable};

pub const DEFAULT_SCENE_BUDGET: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SceneResolution {
    Resolved { scene: String },
    Unknown { missing: String },
    Cycle { path: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum ActionStatus {
    Completed(Ack),
    /// Rejected parameters, bad table params, or a hardware fault.
    Failed(String),
    UnknownOperation(String),
    /// The scene's time budget ran out before or during this action.
    TimedOut,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionOutcome {
    pub action: String,
    #[serde(flatten)]
    pub status: ActionStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SceneReport {
    pub requested: String,
    pub resolution: SceneResolution,
    pub actions: Vec<ActionOutcome>,
    pub elapsed_ms: u64,
}

impl SceneReport {
    /// Resolved and every action completed.
    pub fn is_clean(&self) -> bool {
        matches!(self.resolution, SceneResolution::Resolved { .. })
            && self
                .actions
                .iter()
                .all(|a| matches!(a.status, ActionStatus::Completed(_)))
    }

    pub fn completed(&self) -> usize {
        self.actions
            .iter()
            .filter(|a| matches!(a.status, ActionStatus::Completed(_)))
            .count()
    }
}

/// Sequential scene runner. Cheap to clone; background tasks each hold one.
#[derive(Clone)]
pub struct SceneExecutor {
    actuator: Arc<dyn Actuator>,
    table: Arc<SceneTable>,
    budget: Duration,
}

impl SceneExecutor {
    pub fn new(actuator: Arc<dyn Actuator>, table: Arc<SceneTable>) -> Self {
        Self {
            actuator,
            table,
            budget: DEFAULT_SCENE_BUDGET,
        }
    }

    pub fn with_budget(mut self, budget: Duration) -> Self {
        self.budget = budget;
        self
    }

    pub fn actuator(&self) -> &Arc<dyn Actuator> {
        &self.actuator
    }

    pub fn table(&self) -> &SceneTable {
        &self.table
    }

    /// Run every action of `name` in table order under one deadline.
    ///
    /// A failing action never stops the ones after it. Once the deadline
    /// passes, the running action is abandoned and the rest are reported
    /// as timed out without being started.
    pub async fn execute(&self, name: &str) -> SceneReport {
        let started = Instant::now();
        let deadline = started + self.budget;

        let (scene, actions) = match self.table.resolve(name) {
            Resolution::Resolved { scene, actions } => (scene, actions),
            Resolution::Unknown(missing) => {
                warn!(scene = %name, %missing, "no actions defined for scene");
                return report(name, SceneResolution::Unknown { missing }, Vec::new(), started);
            }
            Resolution::Cycle(path) => {
                error!(scene = %name, "scene alias cycle: {}", path.join(" -> "));
                return report(name, SceneResolution::Cycle { path }, Vec::new(), started);
            }
        };

        info!(scene = %name, resolved = %scene, count = actions.len(), "executing scene");
        let mut outcomes = Vec::with_capacity(actions.len());
        let mut expired = false;

        for spec in actions {
            if !expired && Instant::now() >= deadline {
                expired = true;
            }
            let status = if expired {
                ActionStatus::TimedOut
            } else {
                match Operation::from_spec(spec) {
                    Err(DioramaError::UnknownOperation(op)) => {
                        error!(scene = %name, action = %op, "unknown action");
                        ActionStatus::UnknownOperation(op)
                    }
                    Err(e) => {
                        error!(scene = %name, action = %spec.action, "{e}");
                        ActionStatus::Failed(e.to_string())
                    }
                    Ok(op) => {
                        info!(scene = %name, action = op.name(), "---> running action");
                        match tokio::time::timeout_at(deadline, op.apply(self.actuator.as_ref()))
                            .await
                        {
                            Ok(ack) if ack.is_ok() => ActionStatus::Completed(ack),
                            Ok(ack) => {
                                warn!(scene = %name, action = op.name(), "{ack}");
                                ActionStatus::Failed(ack.to_string())
                            }
                            Err(_) => {
                                warn!(scene = %name, action = op.name(), "scene budget exhausted");
                                expired = true;
                                ActionStatus::TimedOut
                            }
                        }
                    }
                }
            };
            outcomes.push(ActionOutcome {
                action: spec.action.clone(),
                status,
            });
        }

        let scene = scene.to_string();
        report(name, SceneResolution::Resolved { scene }, outcomes, started)
    }
}

fn report(
    requested: &str,
    resolution: SceneResolution,
    actions: Vec<ActionOutcome>,
    started: Instant,
) -> SceneReport {
    SceneReport {
        requested: requested.to_string(),
        resolution,
        actions,
        elapsed_ms: started.elapsed().as_millis() as u64,
    }
}
