use std::fmt;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DioramaError {
    #[error("missing decision-service credentials: set {0}")]
    MissingCredentials(String),

    #[error("scene not found: {0}")]
    SceneNotFound(String),

    #[error("scene alias cycle: {}", .0.join(" -> "))]
    AliasCycle(Vec<String>),

    #[error("unknown operation '{0}'")]
    UnknownOperation(String),

    #[error("invalid parameters for '{action}': {reason}")]
    InvalidParams { action: String, reason: String },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, DioramaError>;

// ---------------------------------------------------------------------------
// ValidationError
// ---------------------------------------------------------------------------

/// Hardware parameter that failed a range check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    SceneCommandId,
    P1,
    P2,
    P3,
    Velocity,
    Acceleration,
}

impl Field {
    pub fn as_str(self) -> &'static str {
        match self {
            Field::SceneCommandId => "scene_command_id",
            Field::P1 => "p1",
            Field::P2 => "p2",
            Field::P3 => "p3",
            Field::Velocity => "velocity",
            Field::Acceleration => "acceleration",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parameter outside its inclusive valid range. Detected before any I/O.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("[HARDWARE] VALIDATION_ERROR: Invalid {field} '{value}' (expected {min}..={max}).")]
pub struct ValidationError {
    pub field: Field,
    pub value: i64,
    pub min: i64,
    pub max: i64,
}

impl ValidationError {
    /// Check `value` against `min..=max` for `field`.
    pub fn check(field: Field, value: i64, min: i64, max: i64) -> std::result::Result<i64, Self> {
        if (min..=max).contains(&value) {
            Ok(value)
        } else {
            Err(Self {
                field,
                value,
                min,
                max,
            })
        }
    }
}
