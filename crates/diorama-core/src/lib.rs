//! Scene orchestration and hardware command core for the diorama
//! installation.
//!
//! ```text
//! Orchestrator ── DecisionService (gemini-agent)
//!     │ background tasks
//!     ▼
//! SceneExecutor ── SceneTable
//!     │
//!     ▼
//! Actuator (HardwareManager) ── SerialLink × 2, MediaPlayer
//! ```

pub mod ack;
pub mod config;
pub mod emulator;
pub mod error;
pub mod executor;
pub mod hardware;
pub mod media;
pub mod orchestrator;
pub mod scene;
pub mod serial;

pub use ack::Ack;
pub use config::Config;
pub use error::{DioramaError, Field, Result, ValidationError};
pub use executor::{SceneExecutor, SceneReport};
pub use hardware::{Actuator, ArmMoveRequest, HardwareManager};
pub use orchestrator::{
    Orchestrator, OrchestratorConfig, SceneState, StoryOutcome, StoryStatus, TurnOutcome, TurnStatus,
};
pub use scene::SceneTable;
