//! The scene state machine.
//!
//! Each user turn goes to the decision service under a hard timeout; a
//! parsed answer updates the scene state and schedules the new scene's
//! hardware actions in the background, so narration returns without
//! waiting for the arm to move. Every failure degrades to a fixed apology
//! with the state left as it was.
//!
//! Story mode asks the service for a whole plan up front and then walks it
//! one step per `advance`. All hardware work, whatever started it, runs on
//! one lane: a newly scheduled job supersedes the one before it.

mod response;
mod state;
mod tasks;

pub use response::{parse_json_from_text, strip_code_fence, StoryPlan, StoryStep, TurnDecision};
pub use state::{ChangeSource, SceneState, StateChange, AWAITING_MODE_SELECTION, MANUAL_OVERRIDE};
pub use tasks::{BackgroundTasks, DrainReport};

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use gemini_agent::{DecisionRequest, DecisionService, Exchange};
use serde::Serialize;
use tokio::sync::{broadcast, watch, Mutex};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::error::ValidationError;
use crate::executor::SceneExecutor;
use crate::hardware::ArmMoveRequest;

pub const TIMEOUT_NARRATIVE: &str = "I took too long to think. Could you please try that again?";
pub const UNPARSEABLE_NARRATIVE: &str = "I'm not sure what to say next.";
pub const FAULT_NARRATIVE: &str =
    "I seem to have gotten my wires crossed. Could you try that again?";
pub const NO_STORY_PLAN_NARRATIVE: &str =
    "I'm sorry, I couldn't think of a story right now. Please ask me again!";
pub const NO_STORY_IN_PROGRESS_NARRATIVE: &str =
    "There is no story in progress. You can ask me to tell you one!";
pub const STORY_END_NARRATIVE: &str = "And that's the end of the story! I hope you enjoyed it.";

const EVENT_CAPACITY: usize = 64;

// ---------------------------------------------------------------------------
// Config and outcomes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub turn_timeout: Duration,
    /// Completed turns sent back with each request; 0 keeps no history.
    pub history_limit: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            turn_timeout: Duration::from_secs(8),
            history_limit: 0,
        }
    }
}

impl From<&Config> for OrchestratorConfig {
    fn from(config: &Config) -> Self {
        Self {
            turn_timeout: config.timing.turn_timeout(),
            history_limit: config.decision.history_limit,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnStatus {
    Advanced,
    TimedOut,
    Unparseable,
    ServiceError,
}

/// What a turn hands back to the caller. `scene` is the state after the
/// turn, which is the previous state for every status but `Advanced`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TurnOutcome {
    pub narrative: String,
    pub scene: SceneState,
    pub status: TurnStatus,
}

impl TurnOutcome {
    fn apology(status: TurnStatus, scene: SceneState) -> Self {
        let narrative = match status {
            TurnStatus::TimedOut => TIMEOUT_NARRATIVE,
            TurnStatus::Unparseable => UNPARSEABLE_NARRATIVE,
            TurnStatus::Advanced | TurnStatus::ServiceError => FAULT_NARRATIVE,
        };
        Self {
            narrative: narrative.to_string(),
            scene,
            status,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StoryStatus {
    Told,
    Ended,
    NoStory,
    TimedOut,
    Unparseable,
    ServiceError,
}

/// One story beat handed back to the caller. Every status but `Told`
/// leaves the scene state as it was.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoryOutcome {
    pub narrative: String,
    pub scene: SceneState,
    pub status: StoryStatus,
    pub is_finished: bool,
}

impl StoryOutcome {
    fn finished(status: StoryStatus, scene: SceneState) -> Self {
        let narrative = match status {
            StoryStatus::TimedOut => TIMEOUT_NARRATIVE,
            StoryStatus::Unparseable => NO_STORY_PLAN_NARRATIVE,
            StoryStatus::NoStory => NO_STORY_IN_PROGRESS_NARRATIVE,
            StoryStatus::Ended => STORY_END_NARRATIVE,
            StoryStatus::Told | StoryStatus::ServiceError => FAULT_NARRATIVE,
        };
        Self {
            narrative: narrative.to_string(),
            scene,
            status,
            is_finished: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

struct Story {
    steps: Vec<StoryStep>,
    /// Index of the step last told.
    step: usize,
}

struct Session {
    history: VecDeque<Exchange>,
    story: Option<Story>,
}

pub struct Orchestrator {
    decision: Arc<dyn DecisionService>,
    executor: SceneExecutor,
    config: OrchestratorConfig,
    /// Held for a whole turn: turns never interleave and a session never
    /// has two decision requests outstanding.
    session: Mutex<Session>,
    scene: watch::Sender<SceneState>,
    events: broadcast::Sender<StateChange>,
    tasks: BackgroundTasks,
}

impl Orchestrator {
    pub fn new(
        decision: Arc<dyn DecisionService>,
        executor: SceneExecutor,
        config: OrchestratorConfig,
    ) -> Self {
        let (scene, _) = watch::channel(SceneState::default());
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            decision,
            executor,
            config,
            session: Mutex::new(Session {
                history: VecDeque::new(),
                story: None,
            }),
            scene,
            events,
            tasks: BackgroundTasks::new(),
        }
    }

    /// Snapshot of the current state. Does not wait for a turn in progress.
    pub fn current_scene(&self) -> SceneState {
        self.scene.borrow().clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.events.subscribe()
    }

    pub fn executor(&self) -> &SceneExecutor {
        &self.executor
    }

    pub fn in_flight(&self) -> usize {
        self.tasks.in_flight()
    }

    /// Run one user turn. Never fails; faults come back as an apology with
    /// the state unchanged.
    pub async fn process_turn(&self, user_text: &str) -> TurnOutcome {
        let mut session = self.session.lock().await;
        let current = self.current_scene();

        let request = DecisionRequest::new(current.to_string(), user_text)
            .with_history(session.history.iter().cloned().collect());
        info!(scene = %current, "---> calling decision service");

        let decide = self.decision.decide(&request);
        let reply = match tokio::time::timeout(self.config.turn_timeout, decide).await {
            Err(_) => {
                warn!(timeout = ?self.config.turn_timeout, "decision service timed out");
                return TurnOutcome::apology(TurnStatus::TimedOut, current);
            }
            Ok(Err(e)) => {
                error!("decision service failed: {e}");
                return TurnOutcome::apology(TurnStatus::ServiceError, current);
            }
            Ok(Ok(text)) => text,
        };

        let Some(decision) = TurnDecision::from_text(&reply) else {
            warn!(%reply, "could not parse decision service response");
            return TurnOutcome::apology(TurnStatus::Unparseable, current);
        };

        let next = SceneState::from(decision.next_scene.as_str());
        info!(from = %current, to = %next, "<--- decision received");
        if next != current {
            self.schedule_scene(next.to_string());
        }
        self.set_scene(next.clone(), Some(decision.narrative.clone()), ChangeSource::Turn);

        if self.config.history_limit > 0 {
            session.history.push_back(Exchange {
                user_text: user_text.to_string(),
                narrative: decision.narrative.clone(),
                scene: next.to_string(),
            });
            while session.history.len() > self.config.history_limit {
                session.history.pop_front();
            }
        }

        TurnOutcome {
            narrative: decision.narrative,
            scene: next,
            status: TurnStatus::Advanced,
        }
    }

    /// Ask the decision service for a story plan about `user_text` and tell
    /// its first step. A failed request keeps any story already in progress.
    pub async fn request_story(&self, user_text: &str) -> StoryOutcome {
        let mut session = self.session.lock().await;
        let current = self.current_scene();

        let request = DecisionRequest::story(current.to_string(), user_text);
        info!(prompt = user_text, "---> requesting story plan");

        let decide = self.decision.decide(&request);
        let reply = match tokio::time::timeout(self.config.turn_timeout, decide).await {
            Err(_) => {
                warn!(timeout = ?self.config.turn_timeout, "story request timed out");
                return StoryOutcome::finished(StoryStatus::TimedOut, current);
            }
            Ok(Err(e)) => {
                error!("story request failed: {e}");
                return StoryOutcome::finished(StoryStatus::ServiceError, current);
            }
            Ok(Ok(text)) => text,
        };

        let Some(plan) = StoryPlan::from_text(&reply) else {
            warn!(%reply, "no usable story plan in response");
            return StoryOutcome::finished(StoryStatus::Unparseable, current);
        };
        info!(steps = plan.steps.len(), "<--- story plan received");

        let story = session.story.insert(Story {
            steps: plan.steps,
            step: 0,
        });
        self.tell_step(story, current)
    }

    /// Tell the next step of the story in progress. Past the last step the
    /// story is cleared.
    pub async fn advance(&self) -> StoryOutcome {
        let mut session = self.session.lock().await;
        let current = self.current_scene();

        let Some(story) = session.story.as_mut() else {
            return StoryOutcome::finished(StoryStatus::NoStory, current);
        };
        story.step += 1;
        if story.step >= story.steps.len() {
            info!("story finished");
            session.story = None;
            return StoryOutcome::finished(StoryStatus::Ended, current);
        }
        info!(step = story.step, "advancing story");
        self.tell_step(story, current)
    }

    pub async fn story_in_progress(&self) -> bool {
        self.session.lock().await.story.is_some()
    }

    /// Operator override: jump to `name` and run its actions in the
    /// background. The state follows even when the table has no such scene.
    /// A story in progress is left where it is.
    pub async fn execute_scene_by_name(&self, name: &str) -> SceneState {
        let _session = self.session.lock().await;
        let next = SceneState::from(name);
        info!(scene = %next, "manual scene trigger");
        self.schedule_scene(name.to_string());
        self.set_scene(next.clone(), None, ChangeSource::SceneTrigger);
        next
    }

    /// Operator override: move the arm directly. Invalid positions are
    /// rejected before anything is scheduled and leave the state unchanged.
    pub async fn execute_manual_arm_move(
        &self,
        p1: i64,
        p2: i64,
        p3: i64,
    ) -> Result<SceneState, ValidationError> {
        let request = ArmMoveRequest::new(p1, p2, p3);
        request.validate()?;

        let _session = self.session.lock().await;
        info!(p1, p2, p3, "manual arm move");
        let actuator = Arc::clone(self.executor.actuator());
        self.tasks.spawn_exclusive(async move {
            let ack = actuator.move_arm(request).await;
            info!("{ack}");
        });
        self.set_scene(SceneState::ManualOverride, None, ChangeSource::ManualArm);
        Ok(SceneState::ManualOverride)
    }

    /// Wait up to `grace` for background work. Returns what finished and
    /// what had to be aborted.
    pub async fn drain(&self, grace: Duration) -> DrainReport {
        self.tasks.drain(grace).await
    }

    /// Drain background work, then close the hardware links.
    pub async fn shutdown(&self, grace: Duration) -> DrainReport {
        let report = self.drain(grace).await;
        info!(
            completed = report.completed,
            superseded = report.superseded,
            aborted = report.aborted,
            "background tasks drained"
        );
        self.executor.actuator().close_all().await;
        report
    }

    fn tell_step(&self, story: &Story, current: SceneState) -> StoryOutcome {
        let step = &story.steps[story.step];
        let scene = match &step.location {
            Some(location) => {
                self.schedule_scene(location.clone());
                SceneState::from(location.as_str())
            }
            None => current,
        };
        self.set_scene(scene.clone(), Some(step.narrative.clone()), ChangeSource::Story);
        StoryOutcome {
            narrative: step.narrative.clone(),
            scene,
            status: StoryStatus::Told,
            is_finished: story.step + 1 >= story.steps.len(),
        }
    }

    fn schedule_scene(&self, name: String) {
        let executor = self.executor.clone();
        self.tasks.spawn_exclusive(async move {
            let report = executor.execute(&name).await;
            info!(
                scene = %name,
                completed = report.completed(),
                total = report.actions.len(),
                elapsed_ms = report.elapsed_ms,
                "scene finished"
            );
        });
    }

    fn set_scene(&self, scene: SceneState, narrative: Option<String>, source: ChangeSource) {
        self.scene.send_replace(scene.clone());
        // No subscribers is fine.
        let _ = self.events.send(StateChange {
            id: Uuid::new_v4(),
            scene,
            narrative,
            source,
            at: Utc::now(),
        });
    }
}
