//! Validated actuator commands and the manager that owns both links.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::ack::Ack;
use crate::config::{process_env, Config, ResolvedLinks};
use crate::error::{Field, ValidationError};
use crate::media::MediaPlayer;
use crate::serial::{LinkStatus, LinkTiming, PortOpener, SerialLink, SystemPortOpener};

pub const SCENE_ID_MIN: i64 = 1;
pub const SCENE_ID_MAX: i64 = 15;
pub const POSITION_MAX: i64 = 4095;
pub const VELOCITY_MAX: i64 = 1023;
pub const ACCELERATION_MAX: i64 = 254;

pub const DEFAULT_VELOCITY: i64 = 50;
pub const DEFAULT_ACCELERATION: i64 = 5;

/// Opcode for a full move (velocity, acceleration and position per axis).
const ARM_MOVE_OPCODE: u8 = 3;

// ---------------------------------------------------------------------------
// SceneCommand
// ---------------------------------------------------------------------------

/// A scene-controller trigger, rendered as the bare decimal id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SceneCommand(u8);

impl SceneCommand {
    pub fn new(id: i64) -> Result<Self, ValidationError> {
        let id = ValidationError::check(Field::SceneCommandId, id, SCENE_ID_MIN, SCENE_ID_MAX)?;
        Ok(Self(id as u8))
    }

    pub fn id(self) -> u8 {
        self.0
    }
}

impl fmt::Display for SceneCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// ArmMove
// ---------------------------------------------------------------------------

/// Unvalidated arm move, as it arrives from the scene table or an operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArmMoveRequest {
    pub p1: i64,
    pub p2: i64,
    pub p3: i64,
    #[serde(default = "default_velocity")]
    pub velocity: i64,
    #[serde(default = "default_acceleration")]
    pub acceleration: i64,
}

fn default_velocity() -> i64 {
    DEFAULT_VELOCITY
}

fn default_acceleration() -> i64 {
    DEFAULT_ACCELERATION
}

impl ArmMoveRequest {
    pub fn new(p1: i64, p2: i64, p3: i64) -> Self {
        Self {
            p1,
            p2,
            p3,
            velocity: DEFAULT_VELOCITY,
            acceleration: DEFAULT_ACCELERATION,
        }
    }

    pub fn with_velocity(mut self, velocity: i64) -> Self {
        self.velocity = velocity;
        self
    }

    pub fn with_acceleration(mut self, acceleration: i64) -> Self {
        self.acceleration = acceleration;
        self
    }

    pub fn validate(&self) -> Result<ArmMove, ValidationError> {
        ArmMove::new(self.p1, self.p2, self.p3, self.velocity, self.acceleration)
    }
}

/// A range-checked arm move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArmMove {
    position: ArmPosition,
    velocity: i64,
    acceleration: i64,
}

impl ArmMove {
    /// Fields are checked in order p1, p2, p3, velocity, acceleration; the
    /// first failure is reported.
    pub fn new(
        p1: i64,
        p2: i64,
        p3: i64,
        velocity: i64,
        acceleration: i64,
    ) -> Result<Self, ValidationError> {
        let p1 = ValidationError::check(Field::P1, p1, 0, POSITION_MAX)?;
        let p2 = ValidationError::check(Field::P2, p2, 0, POSITION_MAX)?;
        let p3 = ValidationError::check(Field::P3, p3, 0, POSITION_MAX)?;
        let velocity = ValidationError::check(Field::Velocity, velocity, 0, VELOCITY_MAX)?;
        let acceleration =
            ValidationError::check(Field::Acceleration, acceleration, 0, ACCELERATION_MAX)?;
        Ok(Self {
            position: ArmPosition { p1, p2, p3 },
            velocity,
            acceleration,
        })
    }

    pub fn position(&self) -> ArmPosition {
        self.position
    }
}

impl fmt::Display for ArmMove {
    /// `3 {v} {v} {v} {a} {a} {a} {p1} {p2} {p3}`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (v, a) = (self.velocity, self.acceleration);
        let ArmPosition { p1, p2, p3 } = self.position;
        write!(f, "{ARM_MOVE_OPCODE} {v} {v} {v} {a} {a} {a} {p1} {p2} {p3}")
    }
}

/// Joint positions reported by the arm controller as `angle:{p1}|{p2}|{p3}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArmPosition {
    pub p1: i64,
    pub p2: i64,
    pub p3: i64,
}

impl ArmPosition {
    pub fn parse(line: &str) -> Option<Self> {
        let mut parts = line.trim().strip_prefix("angle:")?.split('|');
        let mut next = || parts.next()?.trim().parse::<i64>().ok();
        let position = Self {
            p1: next()?,
            p2: next()?,
            p3: next()?,
        };
        match parts.next() {
            Some(_) => None,
            None => Some(position),
        }
    }
}

impl fmt::Display for ArmPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "angle:{}|{}|{}", self.p1, self.p2, self.p3)
    }
}

// ---------------------------------------------------------------------------
// Actuator
// ---------------------------------------------------------------------------

/// Validated hardware operations. Nothing here returns an error: validation
/// failures, mocked links, and I/O faults all come back as an [`Ack`].
#[async_trait]
pub trait Actuator: Send + Sync {
    async fn trigger_scene(&self, scene_command_id: i64) -> Ack;

    async fn move_arm(&self, request: ArmMoveRequest) -> Ack;

    async fn play_media(&self, identifier: &str) -> Ack;

    async fn connect_all(&self);

    async fn close_all(&self);
}

// ---------------------------------------------------------------------------
// HardwareManager
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct HardwareStatus {
    pub scene: LinkStatus,
    pub arm: LinkStatus,
    pub media: &'static str,
}

/// Owns the scene-controller link, the arm-controller link and the media
/// player. No other component touches the links.
pub struct HardwareManager {
    scene: SerialLink,
    arm: SerialLink,
    media: MediaPlayer,
}

impl HardwareManager {
    pub fn new(scene: SerialLink, arm: SerialLink, media: MediaPlayer) -> Self {
        Self { scene, arm, media }
    }

    pub fn from_links(
        links: ResolvedLinks,
        timing: LinkTiming,
        opener: Arc<dyn PortOpener>,
        media: MediaPlayer,
    ) -> Self {
        Self::new(
            SerialLink::new(links.scene, timing, Arc::clone(&opener)),
            SerialLink::new(links.arm, timing, opener),
            media,
        )
    }

    /// Real serial devices, ports resolved from `config` and the process
    /// environment.
    pub fn from_config(config: &Config) -> Self {
        Self::from_links(
            config.hardware.resolve_links_from(process_env),
            config.timing.link_timing(),
            Arc::new(SystemPortOpener),
            MediaPlayer::from_backend(config.hardware.media),
        )
    }

    pub async fn status(&self) -> HardwareStatus {
        let (scene, arm) = tokio::join!(self.scene.status(), self.arm.status());
        HardwareStatus {
            scene,
            arm,
            media: self.media.kind(),
        }
    }
}

#[async_trait]
impl Actuator for HardwareManager {
    async fn trigger_scene(&self, scene_command_id: i64) -> Ack {
        match SceneCommand::new(scene_command_id) {
            Ok(cmd) => self.scene.send(&cmd.to_string()).await,
            Err(e) => {
                error!("{e}");
                Ack::rejected(e)
            }
        }
    }

    async fn move_arm(&self, request: ArmMoveRequest) -> Ack {
        let mv = match request.validate() {
            Ok(mv) => mv,
            Err(e) => {
                error!("{e}");
                return Ack::rejected(e);
            }
        };
        let ack = self.arm.send(&mv.to_string()).await;
        if let Some(position) = ack.reply().and_then(ArmPosition::parse) {
            debug!(%position, "arm reported position");
        }
        ack
    }

    async fn play_media(&self, identifier: &str) -> Ack {
        self.media.play(identifier).await
    }

    async fn connect_all(&self) {
        tokio::join!(self.scene.connect(), self.arm.connect());
    }

    async fn close_all(&self) {
        tokio::join!(self.scene.close(), self.arm.close());
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
