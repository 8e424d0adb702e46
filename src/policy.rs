//! Announcement Policy
//!
//! Single entry point for every announcement attempt, whether it came from a
//! lifecycle event, an operator command or a remote request. Decides
//! admission (enabled flag, minimum-interval rate limit), resolves the
//! message text and audio resource, and hands playback to the controller.
//!
//! "Announced" means the policy admitted the attempt and logged the message;
//! a missing resource or renderer degrades to log-only and does not change
//! the return value.

use crate::catalog::{ResourceCatalog, ScanReport};
use crate::config::VoiceConfig;
use crate::playback::PlaybackController;
use crate::renderer::Renderer;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex as StdMutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

/// Runtime-adjustable announcement settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub enabled: bool,
    pub volume: f32,
    pub voice_speed: f32,
    pub language: String,
}

/// Partial update applied by CONFIGURE
#[derive(Debug, Clone, Default)]
pub struct SettingsUpdate {
    pub enable: Option<bool>,
    pub volume: Option<f32>,
    pub speed: Option<f32>,
    pub language: Option<String>,
}

/// Last-announcement bookkeeping. The interval gate is timer-based, not
/// success-based: it is updated the moment admission passes.
#[derive(Debug, Default)]
struct AnnouncementState {
    last_kind: Option<String>,
    last_instant: Option<Instant>,
    last_wall: Option<DateTime<Utc>>,
}

pub struct AnnouncementPolicy {
    settings: RwLock<Settings>,
    messages: HashMap<String, String>,
    auto_announce: HashMap<String, bool>,
    min_interval: Duration,
    use_hardware_volume: bool,
    state: StdMutex<AnnouncementState>,
    catalog: Arc<RwLock<ResourceCatalog>>,
    renderer: Option<Renderer>,
    playback: PlaybackController,
    /// Serializes rescans against each other without blocking catalog reads
    rescan_lock: Mutex<()>,
}

impl AnnouncementPolicy {
    pub fn new(
        config: &VoiceConfig,
        catalog: Arc<RwLock<ResourceCatalog>>,
        renderer: Option<Renderer>,
        playback: PlaybackController,
    ) -> Self {
        Self {
            settings: RwLock::new(Settings {
                enabled: config.enabled,
                volume: config.volume,
                voice_speed: config.voice_speed,
                language: config.language.clone(),
            }),
            messages: config.messages.clone(),
            auto_announce: config.auto_announce.clone(),
            min_interval: Duration::from_secs_f64(config.min_interval),
            use_hardware_volume: config.use_hardware_volume,
            state: StdMutex::new(AnnouncementState::default()),
            catalog,
            renderer,
            playback,
            rescan_lock: Mutex::new(()),
        }
    }

    /// Announce a message kind, optionally overriding the template text
    pub async fn announce(&self, kind: &str, custom_text: Option<&str>) -> bool {
        self.announce_with_volume(kind, custom_text, None).await
    }

    /// Announce with a per-call volume override. The override applies to this
    /// invocation only; the persisted volume is never touched.
    pub async fn announce_with_volume(
        &self,
        kind: &str,
        custom_text: Option<&str>,
        volume_override: Option<f32>,
    ) -> bool {
        let settings = self.settings.read().await.clone();
        if !settings.enabled {
            debug!("Announcement blocked - disabled");
            return false;
        }

        // Admission check and state update are one atomic step so calls are
        // admitted in arrival order.
        {
            let mut state = match self.state.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            let now = Instant::now();
            if let Some(last) = state.last_instant {
                if now.duration_since(last) < self.min_interval {
                    debug!("Announcement blocked - too frequent");
                    return false;
                }
            }
            state.last_kind = Some(kind.to_string());
            state.last_instant = Some(now);
            state.last_wall = Some(Utc::now());
        }

        let text = custom_text
            .filter(|t| !t.is_empty())
            .map(|t| t.to_string())
            .or_else(|| self.messages.get(kind).cloned())
            .unwrap_or_else(|| "Unknown message".to_string());

        info!(
            "🔊 VOICE ANNOUNCEMENT [{}]: {} (volume: {:.1}, speed: {:.1}, lang: {})",
            kind.to_uppercase(),
            text,
            volume_override.unwrap_or(settings.volume),
            settings.voice_speed,
            settings.language
        );

        self.play(kind, &settings, volume_override).await;
        true
    }

    /// Resolve the audio resource and start playback. Failures here degrade
    /// to log-only announcements.
    async fn play(&self, kind: &str, settings: &Settings, volume_override: Option<f32>) {
        let Some(renderer) = &self.renderer else {
            debug!("No audio renderer selected, announcement logged only");
            return;
        };

        let preferred = renderer.preferred_formats();
        let resource = self
            .catalog
            .read()
            .await
            .resolve(kind, &settings.language, &preferred);

        let Some(resource) = resource else {
            warn!("No audio file found for message kind: {}", kind);
            return;
        };

        let volume = self
            .use_hardware_volume
            .then_some(volume_override.unwrap_or(settings.volume));
        let args = renderer.build_invocation(&resource, volume);

        if let Err(e) = self.playback.start(kind, renderer.program, &args).await {
            warn!("Failed to start audio playback: {}", e);
        }
    }

    /// Whether the given event kind should announce automatically
    pub fn should_auto_announce(&self, kind: &str) -> bool {
        self.auto_announce.get(kind).copied().unwrap_or(false)
    }

    pub async fn settings(&self) -> Settings {
        self.settings.read().await.clone()
    }

    /// Apply a partial settings update, returning "key=value" descriptions of
    /// what changed
    pub async fn reconfigure(&self, update: SettingsUpdate) -> Vec<String> {
        let mut settings = self.settings.write().await;
        let mut changed = Vec::new();

        if let Some(enable) = update.enable {
            settings.enabled = enable;
            changed.push(format!("enabled={}", enable));
        }
        if let Some(volume) = update.volume {
            settings.volume = volume;
            changed.push(format!("volume={:.1}", volume));
        }
        if let Some(speed) = update.speed {
            settings.voice_speed = speed;
            changed.push(format!("speed={:.1}", speed));
        }
        if let Some(language) = update.language {
            changed.push(format!("language={}", language));
            settings.language = language;
        }

        if !changed.is_empty() {
            info!("Voice config updated: {}", changed.join(", "));
        }
        changed
    }

    /// Last announced kind and wall-clock time
    pub fn last_announcement(&self) -> (Option<String>, Option<DateTime<Utc>>) {
        let state = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        (state.last_kind.clone(), state.last_wall)
    }

    pub fn messages(&self) -> &HashMap<String, String> {
        &self.messages
    }

    pub fn auto_announce_flags(&self) -> &HashMap<String, bool> {
        &self.auto_announce
    }

    pub fn renderer_name(&self) -> Option<&str> {
        self.renderer.as_ref().map(|r| r.name)
    }

    pub fn catalog(&self) -> Arc<RwLock<ResourceCatalog>> {
        self.catalog.clone()
    }

    pub fn playback(&self) -> &PlaybackController {
        &self.playback
    }

    /// Rebuild the catalog from disk. Builds outside the catalog write lock
    /// so playback reads see either the old or the fully-rebuilt catalog.
    pub async fn rescan(&self) -> ScanReport {
        let _serial = self.rescan_lock.lock().await;
        let (dir, formats) = {
            let catalog = self.catalog.read().await;
            (catalog.audio_dir().to_path_buf(), catalog.formats().to_vec())
        };
        let (entries, report) = ResourceCatalog::scan(&dir, &formats);
        self.catalog.write().await.install(entries);
        report
    }

    /// Stop playback on host teardown
    pub async fn shutdown(&self) {
        info!("PrintVoice shutting down");
        self.playback.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_policy(config: VoiceConfig) -> AnnouncementPolicy {
        let catalog = Arc::new(RwLock::new(ResourceCatalog::new(
            "/nonexistent/printvoice-test-audio",
            config.audio_formats.clone(),
        )));
        AnnouncementPolicy::new(&config, catalog, None, PlaybackController::new())
    }

    #[tokio::test]
    async fn test_rate_limit_blocks_cluster() {
        let config = VoiceConfig {
            min_interval: 10.0,
            ..Default::default()
        };
        let policy = test_policy(config);

        assert!(policy.announce("print_start", None).await);
        assert!(!policy.announce("print_end", None).await);
        assert!(!policy.announce("print_end", None).await);

        // The blocked calls left no trace
        let (kind, _) = policy.last_announcement();
        assert_eq!(kind.as_deref(), Some("print_start"));
    }

    #[tokio::test]
    async fn test_interval_elapsed_admits_again() {
        let config = VoiceConfig {
            min_interval: 0.05,
            ..Default::default()
        };
        let policy = test_policy(config);

        assert!(policy.announce("ready", None).await);
        assert!(!policy.announce("ready", None).await);
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(policy.announce("ready", None).await);
    }

    #[tokio::test]
    async fn test_disabled_blocks_everything() {
        let config = VoiceConfig {
            enabled: false,
            ..Default::default()
        };
        let policy = test_policy(config);

        assert!(!policy.announce("ready", None).await);
        assert!(!policy.announce("custom", Some("hello")).await);
        let (kind, at) = policy.last_announcement();
        assert!(kind.is_none());
        assert!(at.is_none());
    }

    #[tokio::test]
    async fn test_unknown_kind_still_admitted() {
        let policy = test_policy(VoiceConfig::default());
        assert!(policy.announce("totally_new_kind", None).await);
        let (kind, _) = policy.last_announcement();
        assert_eq!(kind.as_deref(), Some("totally_new_kind"));
    }

    #[tokio::test]
    async fn test_volume_override_never_persists() {
        let policy = test_policy(VoiceConfig::default());
        let before = policy.settings().await.volume;

        assert!(
            policy
                .announce_with_volume("ready", Some("loud"), Some(1.0))
                .await
        );

        assert_eq!(policy.settings().await.volume, before);
    }

    #[tokio::test]
    async fn test_reconfigure_reports_changes() {
        let policy = test_policy(VoiceConfig::default());
        let changed = policy
            .reconfigure(SettingsUpdate {
                enable: Some(false),
                volume: Some(0.5),
                ..Default::default()
            })
            .await;
        assert_eq!(changed, vec!["enabled=false", "volume=0.5"]);

        let settings = policy.settings().await;
        assert!(!settings.enabled);
        assert_eq!(settings.volume, 0.5);
    }

    #[tokio::test]
    async fn test_end_to_end_empty_catalog_no_renderer() {
        // Catalog empty, renderer none detected: policy still admits
        let config = VoiceConfig {
            min_interval: 2.0,
            ..Default::default()
        };
        let policy = test_policy(config);

        assert!(policy.announce("print_start", None).await);
        let (kind, at) = policy.last_announcement();
        assert_eq!(kind.as_deref(), Some("print_start"));
        assert!(at.is_some());

        assert!(!policy.announce("print_start", None).await);
    }

    #[tokio::test]
    async fn test_auto_announce_flags() {
        let policy = test_policy(VoiceConfig::default());
        assert!(policy.should_auto_announce("print_start"));
        assert!(!policy.should_auto_announce("error"));
        assert!(!policy.should_auto_announce("unknown_event"));
    }
}
