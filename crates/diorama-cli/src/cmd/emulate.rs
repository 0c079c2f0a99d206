use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use diorama_core::emulator::{self, ArmEmulator, Emulator, SceneEmulator};
use diorama_core::serial::{PortIo, PortOpener, SystemPortOpener};
use tokio::task::{JoinError, JoinSet};

use crate::setup;

type EmulatorExit = (&'static str, io::Result<u64>);

pub fn run(config_path: Option<&Path>, scene_port: &str, arm_port: &str) -> Result<()> {
    let config = setup::load_config(config_path)?;
    let read_timeout = config.timing.link_timing().read_timeout;

    let opener = SystemPortOpener;
    let scene = opener
        .open(scene_port, config.hardware.scene_baud_rate, read_timeout)
        .with_context(|| format!("failed to open scene emulator port {scene_port}"))?;
    let arm = opener
        .open(arm_port, config.hardware.arm_baud_rate, read_timeout)
        .with_context(|| format!("failed to open arm emulator port {arm_port}"))?;

    let stop = Arc::new(AtomicBool::new(false));
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let mut set = JoinSet::new();
        spawn_emulator(&mut set, scene, SceneEmulator::default(), Arc::clone(&stop));
        spawn_emulator(&mut set, arm, ArmEmulator::default(), Arc::clone(&stop));
        tracing::info!(scene = scene_port, arm = arm_port, "emulators listening; Ctrl-C to stop");

        // Stop on Ctrl-C, or as soon as either emulator gives up.
        tokio::select! {
            res = tokio::signal::ctrl_c() => res?,
            Some(res) = set.join_next() => log_exit(res),
        }
        stop.store(true, Ordering::Relaxed);
        while let Some(res) = set.join_next().await {
            log_exit(res);
        }
        Ok::<(), anyhow::Error>(())
    })
}

fn spawn_emulator<E>(
    set: &mut JoinSet<EmulatorExit>,
    mut port: Box<dyn PortIo>,
    mut emulator: E,
    stop: Arc<AtomicBool>,
) where
    E: Emulator + 'static,
{
    set.spawn_blocking(move || {
        let handled = emulator::serve(port.as_mut(), &mut emulator, &stop);
        (emulator.name(), handled)
    });
}

fn log_exit(res: Result<EmulatorExit, JoinError>) {
    match res {
        Ok((name, Ok(handled))) => tracing::info!(emulator = name, handled, "emulator stopped"),
        Ok((name, Err(e))) => tracing::error!(emulator = name, "emulator failed: {e}"),
        Err(e) => tracing::error!("emulator task panicked: {e}"),
    }
}
