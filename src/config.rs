use crate::error::{VoiceError, VoiceResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Main plugin configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceConfig {
    // Announcements
    pub enabled: bool,
    pub volume: f32,
    pub voice_speed: f32,
    pub language: String,
    pub min_interval: f64,

    // Audio files
    pub audio_dir: String,
    pub audio_formats: Vec<String>,
    pub use_hardware_volume: bool,

    // Message templates, keyed by message kind
    pub messages: HashMap<String, String>,

    // Which event kinds announce automatically
    pub auto_announce: HashMap<String, bool>,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        let messages = HashMap::from([
            ("print_start".to_string(), "Print started".to_string()),
            ("print_end".to_string(), "Print completed".to_string()),
            ("print_pause".to_string(), "Print paused".to_string()),
            ("print_resume".to_string(), "Print resumed".to_string()),
            ("print_cancel".to_string(), "Print cancelled".to_string()),
            (
                "filament_runout".to_string(),
                "Filament runout detected".to_string(),
            ),
            ("error".to_string(), "Error occurred".to_string()),
            ("ready".to_string(), "Printer ready".to_string()),
            ("heating".to_string(), "Heating started".to_string()),
            (
                "temp_reached".to_string(),
                "Target temperature reached".to_string(),
            ),
        ]);

        // Errors are off by default to avoid spam
        let auto_announce = HashMap::from([
            ("print_start".to_string(), true),
            ("print_end".to_string(), true),
            ("print_pause".to_string(), true),
            ("print_resume".to_string(), true),
            ("print_cancel".to_string(), true),
            ("filament_runout".to_string(), true),
            ("error".to_string(), false),
            ("ready".to_string(), true),
        ]);

        Self {
            enabled: true,
            volume: 0.8,
            voice_speed: 1.0,
            language: "en".to_string(),
            min_interval: 2.0,
            audio_dir: dirs::data_dir()
                .unwrap_or_default()
                .join("printvoice/audio")
                .to_string_lossy()
                .to_string(),
            audio_formats: vec!["mp3".to_string(), "wav".to_string(), "ogg".to_string()],
            use_hardware_volume: true,
            messages,
            auto_announce,
        }
    }
}

impl VoiceConfig {
    /// Load config from file or create default
    pub fn load() -> VoiceResult<Self> {
        Self::load_from(&config_path())
    }

    /// Load config from an explicit path
    pub fn load_from(config_path: &PathBuf) -> VoiceResult<Self> {
        let config: Self = if config_path.exists() {
            let content = std::fs::read_to_string(config_path)?;
            match serde_json::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    // Graceful degradation: log warning and use defaults
                    tracing::warn!("⚠️ Config file corrupted or invalid, using defaults: {}", e);
                    // Backup corrupt file for debugging
                    let backup_path = config_path.with_extension("json.corrupt");
                    let _ = std::fs::rename(config_path, &backup_path);
                    Self::default()
                }
            }
        } else {
            Self::default()
        };

        // Bad numeric ranges are fatal to plugin load
        config.validate()?;
        Ok(config)
    }

    /// Check numeric ranges; out-of-range values are fatal at load time
    pub fn validate(&self) -> VoiceResult<()> {
        if !(0.0..=1.0).contains(&self.volume) {
            return Err(VoiceError::Config(format!(
                "volume must be between 0.0 and 1.0, got {}",
                self.volume
            )));
        }
        if !(0.5..=2.0).contains(&self.voice_speed) {
            return Err(VoiceError::Config(format!(
                "voice_speed must be between 0.5 and 2.0, got {}",
                self.voice_speed
            )));
        }
        if self.min_interval <= 0.0 {
            return Err(VoiceError::Config(format!(
                "min_interval must be positive, got {}",
                self.min_interval
            )));
        }
        Ok(())
    }

    /// Save config to file
    pub fn save(&self) -> VoiceResult<()> {
        let config_path = config_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }
}

pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("printvoice")
        .join("config.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = VoiceConfig::default();
        assert!(config.enabled);
        assert_eq!(config.volume, 0.8);
        assert_eq!(config.language, "en");
        assert_eq!(config.min_interval, 2.0);
        assert_eq!(config.messages["print_start"], "Print started");
        assert_eq!(config.auto_announce["error"], false);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = VoiceConfig::default();
        let json = serde_json::to_string(&config).expect("Failed to serialize");
        let restored: VoiceConfig = serde_json::from_str(&json).expect("Failed to deserialize");
        assert_eq!(config.volume, restored.volume);
        assert_eq!(config.messages, restored.messages);
        assert_eq!(config.auto_announce, restored.auto_announce);
    }

    #[test]
    fn test_out_of_range_volume_is_fatal() {
        let config = VoiceConfig {
            volume: 1.5,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(VoiceError::Config(_))));
    }

    #[test]
    fn test_out_of_range_speed_is_fatal() {
        let config = VoiceConfig {
            voice_speed: 3.0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(VoiceError::Config(_))));
    }

    #[test]
    fn test_zero_interval_is_fatal() {
        let config = VoiceConfig {
            min_interval: 0.0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(VoiceError::Config(_))));
    }

    #[test]
    fn test_corrupt_config_falls_back_to_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not valid json").expect("write");

        let config = VoiceConfig::load_from(&path).expect("load should not fail");
        assert_eq!(config.volume, 0.8);
        assert!(path.with_extension("json.corrupt").exists());
    }

    #[test]
    fn test_missing_config_uses_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nope.json");
        let config = VoiceConfig::load_from(&path).expect("load");
        assert!(config.enabled);
    }
}
