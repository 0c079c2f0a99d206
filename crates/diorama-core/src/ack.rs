use std::fmt;

use serde::Serialize;

use crate::error::ValidationError;

/// Result channel for every hardware operation.
///
/// Recoverable faults travel as values, not errors: a rejected parameter, a
/// mocked link, or an I/O failure all come back as an `Ack` the caller logs
/// and moves past.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Ack {
    /// Command written to a connected device. `reply` is the line the device
    /// sent back, if any arrived within the read timeout.
    Sent {
        target: String,
        command: String,
        reply: Option<String>,
    },
    /// No device behind the link; the command was accepted as a no-op.
    Mocked { target: String, command: String },
    /// The device was connected but the exchange failed.
    Failed {
        target: String,
        command: String,
        error: String,
    },
    /// A parameter failed validation; nothing was sent.
    Rejected {
        #[serde(serialize_with = "serialize_display")]
        error: ValidationError,
    },
}

impl Ack {
    pub fn rejected(error: ValidationError) -> Self {
        Ack::Rejected { error }
    }

    /// `true` for `Sent` and `Mocked`.
    pub fn is_ok(&self) -> bool {
        matches!(self, Ack::Sent { .. } | Ack::Mocked { .. })
    }

    pub fn reply(&self) -> Option<&str> {
        match self {
            Ack::Sent { reply, .. } => reply.as_deref(),
            _ => None,
        }
    }
}

impl fmt::Display for Ack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ack::Sent {
                target, command, ..
            } => write!(f, "Command '{command}' sent to {target}."),
            Ack::Mocked { target, command } => {
                write!(f, "Mock command '{command}' executed for {target}.")
            }
            Ack::Failed { target, error, .. } => {
                write!(f, "[HARDWARE] ERROR: Failed to send command to {target}: {error}")
            }
            Ack::Rejected { error } => write!(f, "{error}"),
        }
    }
}

fn serialize_display<S, T>(value: &T, s: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
    T: fmt::Display,
{
    s.collect_str(value)
}
