use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::setup;

/// How long the runtime waits for the blocked stdin reader on the way out.
const STDIN_RELEASE: Duration = Duration::from_millis(200);

pub fn run(config_path: Option<&Path>, port: Option<u16>, no_server: bool) -> Result<()> {
    let mut config = setup::load_config(config_path)?;
    if let Some(port) = port {
        config.server.port = port;
    }
    if no_server {
        config.server.enabled = false;
    }

    let rt = tokio::runtime::Runtime::new()?;
    let result: Result<()> = rt.block_on(async move {
        let orchestrator = setup::build_orchestrator(&config).await?;

        let server = if config.server.enabled {
            let listener =
                tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.server.port)).await?;
            let orchestrator = orchestrator.clone();
            Some(tokio::spawn(async move {
                if let Err(e) = diorama_server::serve_on(orchestrator, listener).await {
                    tracing::error!("control server stopped: {e:#}");
                }
            }))
        } else {
            None
        };

        println!("Scene: {}", orchestrator.current_scene());
        println!("Type what the visitor says, one line per turn. Ctrl-D to stop.");
        println!("`/story <request>` starts a story; `/next` tells its next part.");

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line? else { break };
                    let text = line.trim();
                    if text.is_empty() {
                        continue;
                    }
                    let (narrative, scene) = if text == "/next" {
                        let outcome = orchestrator.advance().await;
                        (outcome.narrative, outcome.scene)
                    } else if let Some(request) = text.strip_prefix("/story ") {
                        let outcome = orchestrator.request_story(request.trim()).await;
                        (outcome.narrative, outcome.scene)
                    } else {
                        let outcome = orchestrator.process_turn(text).await;
                        (outcome.narrative, outcome.scene)
                    };
                    println!("{narrative}");
                    println!("  [{scene}]");
                }
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("interrupted");
                    break;
                }
            }
        }

        if let Some(server) = server {
            server.abort();
        }
        let report = orchestrator.shutdown(config.timing.shutdown_grace()).await;
        if report.aborted > 0 {
            tracing::warn!(aborted = report.aborted, "scene work cut short at shutdown");
        }
        println!("Stopped in scene {}.", orchestrator.current_scene());
        Ok::<(), anyhow::Error>(())
    });
    rt.shutdown_timeout(STDIN_RELEASE);
    result
}
