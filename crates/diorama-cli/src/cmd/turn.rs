use std::path::Path;

use anyhow::Result;

use crate::output::print_json;
use crate::setup;

pub fn run(config_path: Option<&Path>, text: &str, json: bool) -> Result<()> {
    let config = setup::load_config(config_path)?;
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let orchestrator = setup::build_orchestrator(&config).await?;
        let outcome = orchestrator.process_turn(text).await;
        // Let the scene the turn scheduled finish before the links close.
        orchestrator.shutdown(config.timing.shutdown_grace()).await;

        if json {
            print_json(&outcome)?;
        } else {
            println!("{}", outcome.narrative);
            println!("Scene: {}", outcome.scene);
        }
        Ok::<(), anyhow::Error>(())
    })
}
