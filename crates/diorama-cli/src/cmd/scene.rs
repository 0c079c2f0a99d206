use std::path::Path;

use anyhow::{bail, Result};
use diorama_core::executor::{ActionStatus, SceneReport, SceneResolution};
use diorama_core::Actuator;

use crate::output::{print_json, print_table};
use crate::setup;

pub fn run(config_path: Option<&Path>, name: &str, json: bool) -> Result<()> {
    let config = setup::load_config(config_path)?;
    let table = setup::load_scene_table(&config)?;

    let rt = tokio::runtime::Runtime::new()?;
    let report = rt.block_on(async {
        let hardware = setup::connect_hardware(&config).await;
        let executor = setup::build_executor(&config, hardware.clone(), table);
        let report = executor.execute(name).await;
        hardware.close_all().await;
        report
    });

    if json {
        print_json(&report)?;
    } else {
        print_report(&report);
    }

    match &report.resolution {
        SceneResolution::Resolved { .. } => Ok(()),
        SceneResolution::Unknown { missing } => bail!("scene '{missing}' not found"),
        SceneResolution::Cycle { path } => bail!("alias cycle: {}", path.join(" -> ")),
    }
}

fn print_report(report: &SceneReport) {
    if let SceneResolution::Resolved { scene } = &report.resolution {
        if scene != &report.requested {
            println!("{} -> {scene}", report.requested);
        }
    }
    if report.actions.is_empty() {
        return;
    }

    let rows = report
        .actions
        .iter()
        .map(|a| {
            let (status, detail) = match &a.status {
                ActionStatus::Completed(ack) => ("ok", ack.to_string()),
                ActionStatus::Failed(e) => ("failed", e.clone()),
                ActionStatus::UnknownOperation(op) => ("unknown", op.clone()),
                ActionStatus::TimedOut => ("timed out", String::new()),
            };
            vec![a.action.clone(), status.to_string(), detail]
        })
        .collect();
    print_table(&["ACTION", "STATUS", "DETAIL"], rows);
    println!(
        "{}/{} actions completed in {} ms",
        report.completed(),
        report.actions.len(),
        report.elapsed_ms
    );
}
