use std::path::Path;

use anyhow::Result;
use diorama_core::StoryStatus;

use crate::output::print_json;
use crate::setup;

/// Ask for a story and tell it through to the end. Each step's scene runs
/// to completion before the next step is told.
pub fn run(config_path: Option<&Path>, text: &str, json: bool) -> Result<()> {
    let config = setup::load_config(config_path)?;
    let grace = config.timing.shutdown_grace();
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let orchestrator = setup::build_orchestrator(&config).await?;

        let mut outcome = orchestrator.request_story(text).await;
        let mut told = vec![outcome.clone()];
        while !outcome.is_finished {
            orchestrator.drain(grace).await;
            outcome = orchestrator.advance().await;
            told.push(outcome.clone());
        }
        orchestrator.shutdown(grace).await;

        if json {
            print_json(&told)?;
        } else {
            for step in &told {
                println!("{}", step.narrative);
                if step.status == StoryStatus::Told {
                    println!("  [{}]", step.scene);
                }
            }
        }
        Ok::<(), anyhow::Error>(())
    })
}
