use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use diorama_core::config::process_env;
use diorama_core::{Actuator, Config, HardwareManager, Orchestrator, SceneExecutor, SceneTable};
use gemini_agent::{DecisionService, GeminiClient, GeminiConfig};

/// Config from `path` (or defaults) with environment overrides applied.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let mut config = Config::load_or_default(path).with_context(|| match path {
        Some(p) => format!("failed to load config from {}", p.display()),
        None => "failed to build default config".to_string(),
    })?;
    config.apply_env_from(process_env);
    Ok(config)
}

pub fn load_scene_table(config: &Config) -> Result<SceneTable> {
    SceneTable::load_or_builtin(config.scenes_file.as_deref())
        .context("failed to load scene table")
}

/// The decision-service system prompt. An unreadable prompt file is not
/// fatal: a generic prompt naming the table's scenes stands in.
pub fn load_system_prompt(config: &Config, table: &SceneTable) -> String {
    read_prompt(config.prompt_file.as_deref()).unwrap_or_else(|| default_prompt(table))
}

/// The system prompt for story-plan requests, with the same fallback rule.
pub fn load_story_prompt(config: &Config, table: &SceneTable) -> String {
    read_prompt(config.story_prompt_file.as_deref()).unwrap_or_else(|| default_story_prompt(table))
}

fn read_prompt(path: Option<&Path>) -> Option<String> {
    let path = path?;
    match std::fs::read_to_string(path) {
        Ok(prompt) => Some(prompt),
        Err(e) => {
            tracing::warn!(
                "could not read prompt file {}: {e}; using built-in prompt",
                path.display()
            );
            None
        }
    }
}

fn default_prompt(table: &SceneTable) -> String {
    format!(
        "You narrate an interactive diorama for a visitor.\n\
         Each message gives the current scene and what the visitor said.\n\
         Reply with only a JSON object: \
         {{\"narrative\": \"<what to say next>\", \"next_scene\": \"<scene name>\"}}.\n\
         Keep the current scene unless the visitor's words call for another.\n\
         Scenes: {}",
        table.primary_scenes().join(", ")
    )
}

fn default_story_prompt(table: &SceneTable) -> String {
    format!(
        "You tell short stories on an interactive diorama.\n\
         The message is what the visitor asked for.\n\
         Reply with only a JSON object: \
         {{\"story_plan\": [{{\"narrative\": \"<one part of the story>\", \"location\": \"<scene name>\"}}]}}.\n\
         Use three to six parts. Each location must be one of: {}",
        table.primary_scenes().join(", ")
    )
}

/// Gemini client built from config. Fails when no API key is set.
pub fn build_decision_service(
    config: &Config,
    system_prompt: String,
    story_prompt: String,
) -> Result<Arc<dyn DecisionService>> {
    let api_key = config.decision.api_key_from(process_env)?;
    let mut gemini = GeminiConfig::new(api_key, system_prompt);
    gemini.story_prompt = Some(story_prompt);
    gemini.model = config.decision.model.clone();
    gemini.temperature = config.decision.temperature;
    if let Some(base_url) = &config.decision.base_url {
        gemini.base_url = base_url.trim_end_matches('/').to_string();
    }
    Ok(Arc::new(GeminiClient::new(gemini)))
}

/// Hardware manager with both links connected (or degraded to mocked).
pub async fn connect_hardware(config: &Config) -> Arc<HardwareManager> {
    let hardware = Arc::new(HardwareManager::from_config(config));
    hardware.connect_all().await;
    let status = hardware.status().await;
    tracing::info!(
        scene = ?status.scene,
        arm = ?status.arm,
        media = status.media,
        "hardware ready"
    );
    hardware
}

pub fn build_executor(
    config: &Config,
    actuator: Arc<dyn Actuator>,
    table: SceneTable,
) -> SceneExecutor {
    SceneExecutor::new(actuator, Arc::new(table)).with_budget(config.timing.scene_budget())
}

/// Credentials are checked before any hardware is touched.
pub async fn build_orchestrator(config: &Config) -> Result<Arc<Orchestrator>> {
    let table = load_scene_table(config)?;
    let prompt = load_system_prompt(config, &table);
    let story_prompt = load_story_prompt(config, &table);
    let decision = build_decision_service(config, prompt, story_prompt)?;
    let hardware = connect_hardware(config).await;
    let executor = build_executor(config, hardware, table);
    Ok(Arc::new(Orchestrator::new(decision, executor, config.into())))
}
