//! Video playback on the installation's tablet.

use std::path::PathBuf;

use tracing::{error, info, warn};

use crate::ack::Ack;
use crate::config::MediaBackend;

pub const MEDIA_TARGET: &str = "Media Player";

/// Directory on the tablet that holds the scene videos.
const DEVICE_MEDIA_DIR: &str = "/sdcard/DCIM/Camera";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaPlayer {
    /// Drives the tablet through `adb`.
    Adb { program: PathBuf },
    /// Logs playback requests only.
    Mock,
}

impl MediaPlayer {
    /// Pick a player for `backend`. `Auto` uses `adb` when it is on `PATH`.
    pub fn from_backend(backend: MediaBackend) -> Self {
        match backend {
            MediaBackend::Mock => MediaPlayer::Mock,
            MediaBackend::Adb => MediaPlayer::Adb {
                program: which::which("adb").unwrap_or_else(|_| PathBuf::from("adb")),
            },
            MediaBackend::Auto => match which::which("adb") {
                Ok(program) => {
                    info!(program = %program.display(), "using adb for media playback");
                    MediaPlayer::Adb { program }
                }
                Err(_) => {
                    warn!("adb not found on PATH; media playback will be mocked");
                    MediaPlayer::Mock
                }
            },
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            MediaPlayer::Adb { .. } => "adb",
            MediaPlayer::Mock => "mock",
        }
    }

    /// Arguments passed to `adb` to open `file` in the tablet's video player.
    pub fn adb_args(file: &str) -> Vec<String> {
        [
            "shell",
            "am",
            "start",
            "-a",
            "android.intent.action.VIEW",
            "-d",
            &format!("file://{DEVICE_MEDIA_DIR}/{file}"),
            "-t",
            "video/*",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    /// Start playback of `identifier`. Never errors; faults come back as
    /// `Ack::Failed`.
    pub async fn play(&self, identifier: &str) -> Ack {
        if let Some(reason) = invalid_identifier(identifier) {
            error!(identifier, "rejected media identifier: {reason}");
            return Ack::Failed {
                target: MEDIA_TARGET.to_string(),
                command: identifier.to_string(),
                error: reason.to_string(),
            };
        }

        let program = match self {
            MediaPlayer::Mock => {
                info!(identifier, "mock action: media playback");
                return Ack::Mocked {
                    target: MEDIA_TARGET.to_string(),
                    command: identifier.to_string(),
                };
            }
            MediaPlayer::Adb { program } => program,
        };

        let args = Self::adb_args(identifier);
        let command = format!("adb {}", args.join(" "));
        info!(%command, "---> executing adb command");

        let output = tokio::process::Command::new(program)
            .args(&args)
            .kill_on_drop(true)
            .output()
            .await;

        match output {
            Ok(out) if out.status.success() => {
                let stdout = String::from_utf8_lossy(&out.stdout).trim().to_string();
                info!(identifier, "<--- adb command succeeded");
                Ack::Sent {
                    target: MEDIA_TARGET.to_string(),
                    command,
                    reply: Some(stdout).filter(|s| !s.is_empty()),
                }
            }
            Ok(out) => {
                let stderr = String::from_utf8_lossy(&out.stderr).trim().to_string();
                error!(code = ?out.status.code(), "adb command failed: {stderr}");
                Ack::Failed {
                    target: MEDIA_TARGET.to_string(),
                    command,
                    error: format!("adb exited with {}: {stderr}", out.status),
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                error!("'adb' not found; is the Android platform-tools package installed?");
                Ack::Failed {
                    target: MEDIA_TARGET.to_string(),
                    command,
                    error: "'adb' command not found".to_string(),
                }
            }
            Err(e) => {
                error!("could not run adb: {e}");
                Ack::Failed {
                    target: MEDIA_TARGET.to_string(),
                    command,
                    error: e.to_string(),
                }
            }
        }
    }
}

/// Media identifiers are bare file names on the device.
fn invalid_identifier(identifier: &str) -> Option<&'static str> {
    if identifier.is_empty() {
        Some("empty media identifier")
    } else if identifier.contains('/') || identifier.contains("..") {
        Some("media identifier must be a bare file name")
    } else if identifier.chars().any(char::is_whitespace) {
        Some("media identifier must not contain whitespace")
    } else {
        None
    }
}
