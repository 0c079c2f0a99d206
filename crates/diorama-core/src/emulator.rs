//! Stand-ins for the two microcontrollers, for development without hardware.
//!
//! Pair each emulator with the orchestrator through a pseudo-terminal pair
//! (for example `socat -d -d pty,raw,echo=0,link=./robotic_arm_emu_port
//! pty,raw,echo=0,link=./robotic_arm_dev`) and point the emulator at one end.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{info, warn};

use crate::hardware::ArmPosition;
use crate::serial::PortIo;

/// Start pose of the arm controller.
pub const ARM_HOME: ArmPosition = ArmPosition {
    p1: 2048,
    p2: 0,
    p3: 3960,
};

pub trait Emulator: Send {
    fn name(&self) -> &'static str;

    /// Handle one received line; the returned line, if any, is written back.
    fn handle_line(&mut self, line: &str) -> Option<String>;
}

/// Arm controller: tracks the commanded position and reports it after
/// every recognised command.
#[derive(Debug, Clone)]
pub struct ArmEmulator {
    position: ArmPosition,
}

impl Default for ArmEmulator {
    fn default() -> Self {
        Self { position: ARM_HOME }
    }
}

impl ArmEmulator {
    pub fn position(&self) -> ArmPosition {
        self.position
    }

    fn apply(&mut self, parts: &[&str]) -> Result<(), String> {
        let opcode: i64 = parts
            .first()
            .ok_or("empty command")?
            .parse()
            .map_err(|_| format!("bad opcode '{}'", parts[0]))?;
        let range = match opcode {
            // Full move: opcode, 3 velocities, 3 accelerations, 3 positions.
            3 => Some(7..10),
            // Position only.
            4 => Some(1..4),
            _ => None,
        };
        if let Some(range) = range {
            let fields = parts
                .get(range)
                .ok_or_else(|| format!("too few fields for opcode {opcode}"))?;
            let mut values = [0i64; 3];
            for (slot, raw) in values.iter_mut().zip(fields) {
                *slot = raw.parse().map_err(|_| format!("bad position '{raw}'"))?;
            }
            self.position = ArmPosition {
                p1: values[0],
                p2: values[1],
                p3: values[2],
            };
        }
        Ok(())
    }
}

impl Emulator for ArmEmulator {
    fn name(&self) -> &'static str {
        "arm"
    }

    fn handle_line(&mut self, line: &str) -> Option<String> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        match self.apply(&parts) {
            Ok(()) => {
                info!(emulator = "arm", position = %self.position, "state updated");
                Some(self.position.to_string())
            }
            Err(e) => {
                warn!(emulator = "arm", command = line, "could not process command: {e}");
                None
            }
        }
    }
}

/// Scene controller: acknowledges every command with `OK`.
#[derive(Debug, Clone, Default)]
pub struct SceneEmulator {
    received: usize,
}

impl SceneEmulator {
    pub fn received(&self) -> usize {
        self.received
    }
}

impl Emulator for SceneEmulator {
    fn name(&self) -> &'static str {
        "scene"
    }

    fn handle_line(&mut self, line: &str) -> Option<String> {
        if line.trim().is_empty() {
            return None;
        }
        self.received += 1;
        Some("OK".to_string())
    }
}

/// Blocking read-handle-reply loop until `stop` is set. Returns the number
/// of lines handled.
pub fn serve(
    port: &mut dyn PortIo,
    emulator: &mut dyn Emulator,
    stop: &AtomicBool,
) -> io::Result<u64> {
    let mut handled = 0;
    while !stop.load(Ordering::Relaxed) {
        let Some(line) = port.read_line()? else {
            continue;
        };
        info!(emulator = emulator.name(), command = %line, "<--- received");
        handled += 1;
        if let Some(reply) = emulator.handle_line(&line) {
            port.write_all(format!("{reply}\n").as_bytes())?;
        }
    }
    Ok(handled)
}
