//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across threads.
//! Every section is `#[serde(default)]`, so a partial `settings.toml` only
//! overrides the keys it names.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;

/// System instruction sent to the remote service before the first turn.
///
/// Restricts the assistant to a closed vocabulary of phonetic cat sounds.
pub const DEFAULT_INSTRUCTIONS: &str = "\
You are an AI that responds ONLY with cat sounds written phonetically. \
Never describe the sounds - make them directly. Use only these vocalizations:

Basic Sounds:
* Meow: \"mrow\", \"meow\", \"miaow\"
* Short meows: \"mew\", \"miu\"
* Questioning: \"mrrrp?\", \"prrrp?\"
* Purring: \"prrrrrrrrr\", \"rrrrrrrr\"
* Trills: \"brrrrup\", \"prrrrup\"
* Happy: \"prrp-prrp-prrp\"
* Angry: \"hssssssss\", \"MROWWW\"
* Distressed: \"yowwwwl\", \"MRRROWWW\"
* Chattering: \"ek-ek-ek\"
* Disappointed: \"mrrrrrr\"
* Demanding: \"MEOW\", \"MROW\"
* Sleepy: \"mrrrrmmm\"

Rules:
1. ONLY output the phonetic cat sounds - never describe them
2. Use capitalization for volume
3. Use letter repetition for duration
4. Use punctuation for tone:
   * ? for questions
   * ! for excitement
   * ... for uncertainty";

// ---------------------------------------------------------------------------
// AudioConfig
// ---------------------------------------------------------------------------

/// Format of the audio exchanged with the remote service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Sample rate in Hz of both captured frames and received deltas.
    pub sample_rate: u32,
    /// Length of one captured frame in milliseconds.
    pub frame_ms: u32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 24_000,
            frame_ms: 100,
        }
    }
}

impl AudioConfig {
    /// Number of mono samples in one captured frame.
    pub fn frame_samples(&self) -> usize {
        (self.sample_rate as usize * self.frame_ms as usize / 1000).max(1)
    }
}

// ---------------------------------------------------------------------------
// RealtimeConfig
// ---------------------------------------------------------------------------

/// Connection and conversation settings for the realtime channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RealtimeConfig {
    /// WebSocket endpoint without the `model` query parameter.
    pub url: String,
    /// Realtime model identifier appended as `?model=…`.
    pub model: String,
    /// Voice used for synthesized audio.
    pub voice: String,
    /// System instruction applied through `session.update`.
    pub instructions: String,
    /// Text turn sent right after connecting.  `None` disables the greeting.
    pub greeting: Option<String>,
    /// Seconds to wait for the WebSocket handshake.
    pub connect_timeout_secs: u64,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            url: "wss://api.openai.com/v1/realtime".into(),
            model: "gpt-4o-realtime-preview-2024-10-01".into(),
            voice: "alloy".into(),
            instructions: DEFAULT_INSTRUCTIONS.into(),
            greeting: Some("Hello!".into()),
            connect_timeout_secs: 15,
        }
    }
}

impl RealtimeConfig {
    /// Full endpoint URL including the model query parameter.
    pub fn endpoint(&self) -> String {
        format!("{}?model={}", self.url, self.model)
    }
}

// ---------------------------------------------------------------------------
// CredentialConfig
// ---------------------------------------------------------------------------

/// Where the API key comes from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialConfig {
    /// Key set directly in the settings file.  Takes precedence over `env_var`.
    pub api_key: Option<String>,
    /// Environment variable read once at startup.
    pub env_var: String,
    /// Namespaced key of the persisted credential cache slot.
    pub cache_key: String,
    /// Ask on the terminal when no other source yields a key.
    pub prompt: bool,
}

impl Default for CredentialConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            env_var: "OPENAI_API_KEY".into(),
            cache_key: "tmp::voice_api_key".into(),
            prompt: true,
        }
    }
}

impl CredentialConfig {
    /// The externally configured key: settings file first, then environment.
    pub fn configured_value(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| std::env::var(&self.env_var).ok())
    }
}

// ---------------------------------------------------------------------------
// HotkeyConfig
// ---------------------------------------------------------------------------

/// Global hotkey binding.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HotkeyConfig {
    /// Whether the global listener is started at all.
    pub enabled: bool,
    /// Key that toggles recording (e.g. `"F9"`).
    pub toggle_recording_key: String,
}

impl Default for HotkeyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            toggle_recording_key: "F9".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// UiConfig
// ---------------------------------------------------------------------------

/// egui window appearance settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    /// Last saved window position `(x, y)` in screen pixels.
    pub window_position: Option<(f32, f32)>,
    /// Keep the window floating above all other windows.
    pub always_on_top: bool,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            window_position: None,
            always_on_top: true,
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub audio: AudioConfig,
    pub realtime: RealtimeConfig,
    pub credential: CredentialConfig,
    pub hotkey: HotkeyConfig,
    pub ui: UiConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn default_values() {
        let cfg = AppConfig::default();

        assert_eq!(cfg.audio.sample_rate, 24_000);
        assert_eq!(cfg.audio.frame_samples(), 2_400);
        assert_eq!(cfg.realtime.greeting.as_deref(), Some("Hello!"));
        assert!(cfg.realtime.instructions.contains("cat sounds"));
        assert_eq!(cfg.credential.cache_key, "tmp::voice_api_key");
        assert_eq!(cfg.credential.env_var, "OPENAI_API_KEY");
        assert_eq!(cfg.hotkey.toggle_recording_key, "F9");
        assert!(cfg.ui.always_on_top);
    }

    #[test]
    fn endpoint_appends_model() {
        let cfg = RealtimeConfig {
            url: "wss://example.test/realtime".into(),
            model: "m1".into(),
            ..RealtimeConfig::default()
        };
        assert_eq!(cfg.endpoint(), "wss://example.test/realtime?model=m1");
    }

    #[test]
    fn load_missing_returns_default() {
        let dir = tempdir().expect("temp dir");
        let config = AppConfig::load_from(&dir.path().join("nope.toml")).expect("load");
        assert_eq!(config.audio.sample_rate, 24_000);
        assert_eq!(config.realtime.model, RealtimeConfig::default().model);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "[realtime]\nvoice = \"verse\"\n").expect("write");

        let config = AppConfig::load_from(&path).expect("load");
        assert_eq!(config.realtime.voice, "verse");
        assert_eq!(config.realtime.greeting.as_deref(), Some("Hello!"));
        assert_eq!(config.hotkey.toggle_recording_key, "F9");
    }

    #[test]
    fn modified_values_survive_save_and_load() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("nested").join("settings.toml");

        let mut cfg = AppConfig::default();
        cfg.audio.frame_ms = 40;
        cfg.realtime.greeting = None;
        cfg.realtime.instructions = "Be brief.".into();
        cfg.credential.prompt = false;
        cfg.ui.window_position = Some((10.0, 20.0));

        cfg.save_to(&path).expect("save");
        let loaded = AppConfig::load_from(&path).expect("load");

        assert_eq!(loaded.audio.frame_ms, 40);
        assert!(loaded.realtime.greeting.is_none());
        assert_eq!(loaded.realtime.instructions, "Be brief.");
        assert!(!loaded.credential.prompt);
        assert_eq!(loaded.ui.window_position, Some((10.0, 20.0)));
    }

    #[test]
    fn configured_value_prefers_settings_file() {
        let cfg = CredentialConfig {
            api_key: Some("sk-from-file".into()),
            env_var: "VOICE_CHAT_TEST_UNSET_VAR".into(),
            ..CredentialConfig::default()
        };
        assert_eq!(cfg.configured_value().as_deref(), Some("sk-from-file"));
    }

    #[test]
    fn configured_value_ignores_blank_file_key() {
        let cfg = CredentialConfig {
            api_key: Some("   ".into()),
            env_var: "VOICE_CHAT_TEST_UNSET_VAR".into(),
            ..CredentialConfig::default()
        };
        assert!(cfg.configured_value().is_none());
    }
}
