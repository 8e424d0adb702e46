//! Remote request/response records
//!
//! Transport-agnostic records for the three remote endpoints. The host's
//! RPC layer turns wire requests into these structures and serializes the
//! responses back to the client; failures are always structured responses,
//! never faults.

use crate::host::VoicePlugin;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tracing::warn;

/// `voice/announce` request
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnnounceRequest {
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub text: String,
}

/// `voice/announce` response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnounceResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// `voice/config` response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigResponse {
    pub enabled: bool,
    pub volume: f32,
    pub language: String,
    pub voice_speed: f32,
    pub auto_announce: HashMap<String, bool>,
    pub messages: HashMap<String, String>,
}

/// `voice/status` response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub enabled: bool,
    pub last_announced_kind: Option<String>,
    /// RFC3339 wall-clock time of the last admitted announcement
    pub last_announced_at: Option<String>,
    /// Always 0: playback is preemptive, nothing is ever queued
    pub queue_depth: u32,
}

impl VoicePlugin {
    pub async fn remote_announce(&self, request: AnnounceRequest) -> AnnounceResponse {
        if request.text.is_empty() {
            return AnnounceResponse {
                ok: false,
                text: None,
                error: Some("no text provided".to_string()),
            };
        }

        let kind = request.kind.as_deref().unwrap_or("custom");
        let ok = self.policy().announce(kind, Some(&request.text)).await;
        AnnounceResponse {
            ok,
            text: Some(request.text),
            error: None,
        }
    }

    pub async fn remote_config(&self) -> ConfigResponse {
        let policy = self.policy();
        let s = policy.settings().await;
        ConfigResponse {
            enabled: s.enabled,
            volume: s.volume,
            language: s.language,
            voice_speed: s.voice_speed,
            auto_announce: policy.auto_announce_flags().clone(),
            messages: policy.messages().clone(),
        }
    }

    pub async fn remote_status(&self) -> StatusResponse {
        let policy = self.policy();
        let s = policy.settings().await;
        let (last_kind, last_at) = policy.last_announcement();
        StatusResponse {
            enabled: s.enabled,
            last_announced_kind: last_kind,
            last_announced_at: last_at.map(|t| t.to_rfc3339()),
            queue_depth: 0,
        }
    }

    // JSON Value wrappers used by the endpoint registrations

    pub(crate) async fn remote_announce_value(&self, request: Value) -> Value {
        let request: AnnounceRequest = match serde_json::from_value(request) {
            Ok(req) => req,
            Err(e) => {
                warn!("Malformed announce request: {}", e);
                AnnounceRequest::default()
            }
        };
        serde_json::to_value(self.remote_announce(request).await).unwrap_or_default()
    }

    pub(crate) async fn remote_config_value(&self) -> Value {
        serde_json::to_value(self.remote_config().await).unwrap_or_default()
    }

    pub(crate) async fn remote_status_value(&self) -> Value {
        serde_json::to_value(self.remote_status().await).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ResourceCatalog;
    use crate::config::VoiceConfig;
    use crate::playback::PlaybackController;
    use crate::policy::AnnouncementPolicy;
    use serde_json::json;
    use std::sync::Arc;
    use tokio::sync::RwLock;

    fn test_plugin(config: VoiceConfig) -> Arc<VoicePlugin> {
        let catalog = Arc::new(RwLock::new(ResourceCatalog::new(
            "/nonexistent/printvoice-test-audio",
            config.audio_formats.clone(),
        )));
        let policy = Arc::new(AnnouncementPolicy::new(
            &config,
            catalog,
            None,
            PlaybackController::new(),
        ));
        VoicePlugin::new(policy)
    }

    #[tokio::test]
    async fn test_remote_announce_empty_text() {
        let plugin = test_plugin(VoiceConfig::default());
        let response = plugin.remote_announce(AnnounceRequest::default()).await;
        assert!(!response.ok);
        assert_eq!(response.error.as_deref(), Some("no text provided"));

        let (kind, _) = plugin.policy().last_announcement();
        assert!(kind.is_none());
    }

    #[tokio::test]
    async fn test_remote_announce_defaults_to_custom_kind() {
        let plugin = test_plugin(VoiceConfig::default());
        let response = plugin
            .remote_announce(AnnounceRequest {
                kind: None,
                text: "Door open".to_string(),
            })
            .await;
        assert!(response.ok);
        assert_eq!(response.text.as_deref(), Some("Door open"));

        let (kind, _) = plugin.policy().last_announcement();
        assert_eq!(kind.as_deref(), Some("custom"));
    }

    #[tokio::test]
    async fn test_remote_announce_blocked_when_disabled() {
        let plugin = test_plugin(VoiceConfig {
            enabled: false,
            ..Default::default()
        });
        let response = plugin
            .remote_announce(AnnounceRequest {
                kind: Some("ready".to_string()),
                text: "hello".to_string(),
            })
            .await;
        assert!(!response.ok);
        assert!(response.error.is_none());
    }

    #[tokio::test]
    async fn test_remote_config_shape() {
        let plugin = test_plugin(VoiceConfig::default());
        let value = plugin.remote_config_value().await;
        assert_eq!(value["enabled"], json!(true));
        assert_eq!(value["language"], json!("en"));
        assert_eq!(value["messages"]["print_start"], json!("Print started"));
        assert_eq!(value["auto_announce"]["error"], json!(false));
    }

    #[tokio::test]
    async fn test_remote_status_before_and_after_announce() {
        let plugin = test_plugin(VoiceConfig::default());

        let status = plugin.remote_status().await;
        assert!(status.last_announced_kind.is_none());
        assert!(status.last_announced_at.is_none());
        assert_eq!(status.queue_depth, 0);

        plugin.policy().announce("ready", None).await;

        let status = plugin.remote_status().await;
        assert_eq!(status.last_announced_kind.as_deref(), Some("ready"));
        assert!(status.last_announced_at.is_some());
        assert_eq!(status.queue_depth, 0);
    }

    #[tokio::test]
    async fn test_malformed_announce_value_gets_structured_error() {
        let plugin = test_plugin(VoiceConfig::default());
        let value = plugin.remote_announce_value(json!({"text": 42})).await;
        assert_eq!(value["ok"], json!(false));
        assert_eq!(value["error"], json!("no text provided"));
    }
}
