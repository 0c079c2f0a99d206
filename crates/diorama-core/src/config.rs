use crate::error::{DioramaError, Result};
use crate::serial::{LinkConfig, LinkTiming};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info};

pub const SCENE_CONTROLLER_NAME: &str = "Main Scene Controller";
pub const ARM_CONTROLLER_NAME: &str = "Robotic Arm Controller";

pub const ENV_MODE: &str = "AUM_ENVIRONMENT";
pub const ENV_SCENE_PORT: &str = "MAIN_CONTROLLER_PORT";
pub const ENV_ARM_PORT: &str = "ROBOTIC_ARM_PORT";
pub const ENV_SCENE_PORT_EMULATOR: &str = "MAIN_CONTROLLER_PORT_EMULATOR";
pub const ENV_ARM_PORT_EMULATOR: &str = "ROBOTIC_ARM_PORT_EMULATOR";
pub const ENV_GOOGLE_API_KEY: &str = "GOOGLE_API_KEY";

/// Read a variable from the process environment. The default lookup passed
/// to the `*_from` helpers below; tests pass a closure over a map instead.
pub fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

// ---------------------------------------------------------------------------
// Mode
// ---------------------------------------------------------------------------

/// Which set of serial ports to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Emulator ports (socat pseudo-terminals driven by `diorama emulate`).
    Development,
    /// Real controller device paths.
    Production,
}

impl Mode {
    /// `dev` / `development` select emulator ports; anything else is production.
    pub fn from_env_value(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "dev" | "development" => Mode::Development,
            _ => Mode::Production,
        }
    }
}

// ---------------------------------------------------------------------------
// MediaBackend
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaBackend {
    /// Use `adb` when it is on `PATH`, otherwise mock.
    Auto,
    Adb,
    Mock,
}

// ---------------------------------------------------------------------------
// HardwareConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HardwareConfig {
    #[serde(default = "default_mode")]
    pub mode: Mode,
    /// Explicit scene-controller port; environment variables take precedence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scene_port: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arm_port: Option<String>,
    #[serde(default = "default_scene_baud")]
    pub scene_baud_rate: u32,
    #[serde(default = "default_arm_baud")]
    pub arm_baud_rate: u32,
    #[serde(default = "default_media")]
    pub media: MediaBackend,
}

fn default_mode() -> Mode {
    Mode::Production
}

fn default_scene_baud() -> u32 {
    9600
}

fn default_arm_baud() -> u32 {
    57600
}

fn default_media() -> MediaBackend {
    MediaBackend::Auto
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            scene_port: None,
            arm_port: None,
            scene_baud_rate: default_scene_baud(),
            arm_baud_rate: default_arm_baud(),
            media: default_media(),
        }
    }
}

/// The two link configurations the hardware manager is built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLinks {
    pub scene: LinkConfig,
    pub arm: LinkConfig,
}

impl HardwareConfig {
    /// Resolve port paths for the configured mode.
    ///
    /// Development reads the `*_EMULATOR` variables and falls back to the
    /// socat default paths. Production reads the real-device variables; a
    /// missing port is logged and replaced by a path that never exists, so
    /// the link degrades to mocked instead of failing startup.
    pub fn resolve_links_from<F>(&self, env: F) -> ResolvedLinks
    where
        F: Fn(&str) -> Option<String>,
    {
        let (scene, arm) = match self.mode {
            Mode::Development => {
                info!("running in development mode, using emulator ports");
                (
                    env(ENV_SCENE_PORT_EMULATOR)
                        .or_else(|| self.scene_port.clone())
                        .unwrap_or_else(|| "./main_controller_emu_port".into()),
                    env(ENV_ARM_PORT_EMULATOR)
                        .or_else(|| self.arm_port.clone())
                        .unwrap_or_else(|| "./robotic_arm_emu_port".into()),
                )
            }
            Mode::Production => {
                info!("running in production mode, using hardware ports");
                let scene = env(ENV_SCENE_PORT).or_else(|| self.scene_port.clone());
                let arm = env(ENV_ARM_PORT).or_else(|| self.arm_port.clone());
                if scene.is_none() || arm.is_none() {
                    error!(
                        "serial ports not defined ({ENV_SCENE_PORT}, {ENV_ARM_PORT}); commands will be mocked"
                    );
                }
                (
                    scene.unwrap_or_else(|| "./mock_main_port".into()),
                    arm.unwrap_or_else(|| "./mock_arm_port".into()),
                )
            }
        };

        ResolvedLinks {
            scene: LinkConfig::new(SCENE_CONTROLLER_NAME, scene, self.scene_baud_rate),
            arm: LinkConfig::new(ARM_CONTROLLER_NAME, arm, self.arm_baud_rate),
        }
    }
}

// ---------------------------------------------------------------------------
// TimingConfig
// ---------------------------------------------------------------------------

/// Timeouts and delays, in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    #[serde(default = "default_turn_timeout")]
    pub turn_timeout_ms: u64,
    #[serde(default = "default_scene_budget")]
    pub scene_budget_ms: u64,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_read_timeout")]
    pub read_timeout_ms: u64,
    #[serde(default = "default_settle_delay")]
    pub settle_delay_ms: u64,
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_ms: u64,
}

fn default_turn_timeout() -> u64 {
    8_000
}

fn default_scene_budget() -> u64 {
    10_000
}

fn default_connect_timeout() -> u64 {
    10_000
}

fn default_poll_interval() -> u64 {
    500
}

fn default_read_timeout() -> u64 {
    1_000
}

fn default_settle_delay() -> u64 {
    100
}

fn default_shutdown_grace() -> u64 {
    15_000
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            turn_timeout_ms: default_turn_timeout(),
            scene_budget_ms: default_scene_budget(),
            connect_timeout_ms: default_connect_timeout(),
            poll_interval_ms: default_poll_interval(),
            read_timeout_ms: default_read_timeout(),
            settle_delay_ms: default_settle_delay(),
            shutdown_grace_ms: default_shutdown_grace(),
        }
    }
}

impl TimingConfig {
    pub fn turn_timeout(&self) -> Duration {
        Duration::from_millis(self.turn_timeout_ms)
    }

    pub fn scene_budget(&self) -> Duration {
        Duration::from_millis(self.scene_budget_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    pub fn link_timing(&self) -> LinkTiming {
        LinkTiming {
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            read_timeout: Duration::from_millis(self.read_timeout_ms),
            settle_delay: Duration::from_millis(self.settle_delay_ms),
        }
    }
}

// ---------------------------------------------------------------------------
// DecisionConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionConfig {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Completed turns sent back with each request (0 = single-turn).
    #[serde(default)]
    pub history_limit: usize,
}

fn default_model() -> String {
    gemini_agent::DEFAULT_MODEL.to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            temperature: default_temperature(),
            base_url: None,
            api_key_env: default_api_key_env(),
            history_limit: 0,
        }
    }
}

impl DecisionConfig {
    /// The decision-service API key. `GOOGLE_API_KEY` is accepted as a
    /// fallback. Missing credentials are the one fatal startup error.
    pub fn api_key_from<F>(&self, env: F) -> Result<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| {
            env(key)
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty())
        };
        lookup(&self.api_key_env)
            .or_else(|| lookup(ENV_GOOGLE_API_KEY))
            .ok_or_else(|| {
                DioramaError::MissingCredentials(format!(
                    "{} or {ENV_GOOGLE_API_KEY}",
                    self.api_key_env
                ))
            })
    }
}

// ---------------------------------------------------------------------------
// ServerConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_enabled")]
    pub enabled: bool,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_server_enabled() -> bool {
    true
}

fn default_port() -> u16 {
    3141
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: default_server_enabled(),
            port: default_port(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub hardware: HardwareConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub decision: DecisionConfig,
    #[serde(default)]
    pub server: ServerConfig,
    /// Scene table override; the built-in table is used when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenes_file: Option<PathBuf>,
    /// System prompt for the decision service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_file: Option<PathBuf>,
    /// System prompt for story-plan requests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub story_prompt_file: Option<PathBuf>,
}

impl Config {
    /// Load `path` as YAML. Relative file entries are resolved against the
    /// config file's directory.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let mut config: Config = serde_yaml::from_str(&data)?;
        if let Some(dir) = path.parent() {
            config.scenes_file = config.scenes_file.map(|p| dir.join(p));
            config.prompt_file = config.prompt_file.map(|p| dir.join(p));
            config.story_prompt_file = config.story_prompt_file.map(|p| dir.join(p));
        }
        Ok(config)
    }

    /// Load `path` if given, otherwise defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    /// Apply environment overrides (currently the hardware mode).
    pub fn apply_env_from<F>(&mut self, env: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(mode) = env(ENV_MODE) {
            self.hardware.mode = Mode::from_env_value(&mode);
        }
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k: &str| map.get(k).cloned()
    }

    #[test]
    fn mode_parsing() {
        assert_eq!(Mode::from_env_value("dev"), Mode::Development);
        assert_eq!(Mode::from_env_value("Development"), Mode::Development);
        assert_eq!(Mode::from_env_value("prod"), Mode::Production);
        assert_eq!(Mode::from_env_value("anything"), Mode::Production);
    }

    #[test]
    fn development_uses_emulator_variables() {
        let mut hw = HardwareConfig::default();
        hw.mode = Mode::Development;
        let links = hw.resolve_links_from(env_of(&[
            (ENV_SCENE_PORT_EMULATOR, "/tmp/scene_emu"),
            (ENV_SCENE_PORT, "/dev/ttyACM0"),
        ]));
        assert_eq!(links.scene.path, "/tmp/scene_emu");
        assert_eq!(links.arm.path, "./robotic_arm_emu_port");
        assert_eq!(links.scene.baud_rate, 9600);
        assert_eq!(links.arm.baud_rate, 57600);
        assert_eq!(links.scene.name, SCENE_CONTROLLER_NAME);
    }

    #[test]
    fn production_missing_ports_fall_back_to_mock_paths() {
        let hw = HardwareConfig::default();
        let links = hw.resolve_links_from(env_of(&[(ENV_ARM_PORT, "/dev/ttyUSB1")]));
        assert_eq!(links.scene.path, "./mock_main_port");
        assert_eq!(links.arm.path, "/dev/ttyUSB1");
    }

    #[test]
    fn environment_beats_config_file_port() {
        let hw = HardwareConfig {
            scene_port: Some("/dev/from-config".into()),
            ..HardwareConfig::default()
        };
        let links = hw.resolve_links_from(env_of(&[(ENV_SCENE_PORT, "/dev/from-env")]));
        assert_eq!(links.scene.path, "/dev/from-env");

        let links = hw.resolve_links_from(env_of(&[]));
        assert_eq!(links.scene.path, "/dev/from-config");
    }

    #[test]
    fn api_key_required() {
        let cfg = DecisionConfig::default();
        let err = cfg.api_key_from(env_of(&[])).unwrap_err();
        assert!(matches!(err, DioramaError::MissingCredentials(_)));
        assert!(err.to_string().contains("GEMINI_API_KEY"));

        let err = cfg
            .api_key_from(env_of(&[("GEMINI_API_KEY", "   ")]))
            .unwrap_err();
        assert!(matches!(err, DioramaError::MissingCredentials(_)));
    }

    #[test]
    fn api_key_falls_back_to_google_key() {
        let cfg = DecisionConfig::default();
        assert_eq!(
            cfg.api_key_from(env_of(&[(ENV_GOOGLE_API_KEY, "g-key")]))
                .unwrap(),
            "g-key"
        );
        assert_eq!(
            cfg.api_key_from(env_of(&[("GEMINI_API_KEY", "k1"), (ENV_GOOGLE_API_KEY, "k2")]))
                .unwrap(),
            "k1"
        );
    }

    #[test]
    fn blank_primary_key_still_falls_back() {
        let cfg = DecisionConfig::default();
        let env = env_of(&[("GEMINI_API_KEY", ""), (ENV_GOOGLE_API_KEY, " g-key ")]);
        assert_eq!(cfg.api_key_from(env).unwrap(), "g-key");
    }

    #[test]
    fn apply_env_sets_mode() {
        let mut cfg = Config::default();
        cfg.apply_env_from(env_of(&[(ENV_MODE, "dev")]));
        assert_eq!(cfg.hardware.mode, Mode::Development);
    }

    #[test]
    fn load_partial_yaml_fills_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("diorama.yaml");
        std::fs::write(
            &path,
            "timing:\n  turn_timeout_ms: 3000\nscenes_file: scenes.yaml\nstory_prompt_file: story.md\nhardware:\n  media: mock\n",
        )
        .unwrap();

        let cfg = Config::load(&path).unwrap();
        assert_eq!(cfg.timing.turn_timeout(), Duration::from_secs(3));
        assert_eq!(cfg.timing.scene_budget(), Duration::from_secs(10));
        assert_eq!(cfg.hardware.media, MediaBackend::Mock);
        assert_eq!(cfg.hardware.arm_baud_rate, 57600);
        assert_eq!(cfg.scenes_file, Some(dir.path().join("scenes.yaml")));
        assert_eq!(cfg.story_prompt_file, Some(dir.path().join("story.md")));
        assert_eq!(cfg.server.port, 3141);
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let err = Config::load(Path::new("/nonexistent/diorama.yaml")).unwrap_err();
        assert!(matches!(err, DioramaError::Io(_)));
    }

    #[test]
    fn yaml_roundtrip_keeps_overrides() {
        let mut cfg = Config::default();
        cfg.decision.history_limit = 4;
        let yaml = cfg.to_yaml().unwrap();
        let back: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back.decision.history_limit, 4);
        assert_eq!(back.hardware.mode, Mode::Production);
    }
}
