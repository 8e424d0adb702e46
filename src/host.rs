//! Host integration
//!
//! The control host delivers lifecycle events, dispatches operator commands
//! and routes remote requests. The plugin never depends on the host's
//! concrete types, only on the narrow capability traits below; the binary
//! provides an in-process implementation and a real host can provide its own.

use crate::commands::CommandRequest;
use crate::error::VoiceResult;
use crate::policy::AnnouncementPolicy;
use futures::future::BoxFuture;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

pub type EventHandler = Arc<dyn Fn(Value) -> BoxFuture<'static, ()> + Send + Sync>;
pub type CommandHandler =
    Arc<dyn Fn(CommandRequest) -> BoxFuture<'static, VoiceResult<String>> + Send + Sync>;
pub type RequestHandler = Arc<dyn Fn(Value) -> BoxFuture<'static, Value> + Send + Sync>;

/// Lifecycle event delivery (subscribe by event name)
pub trait EventSource {
    fn subscribe(&mut self, event: &str, handler: EventHandler);
}

/// Operator command registration (name, help text, handler)
pub trait CommandSink {
    fn register_command(&mut self, name: &str, help: &str, handler: CommandHandler);
}

/// Remote endpoint registration (path, handler)
pub trait RequestSink {
    fn register_endpoint(&mut self, path: &str, handler: RequestHandler);
}

/// Print lifecycle events that may announce automatically
const PRINT_EVENTS: [&str; 5] = [
    "print_start",
    "print_end",
    "print_pause",
    "print_resume",
    "print_cancel",
];

/// The plugin context object: owns the policy and wires it to the host
pub struct VoicePlugin {
    policy: Arc<AnnouncementPolicy>,
}

impl VoicePlugin {
    pub fn new(policy: Arc<AnnouncementPolicy>) -> Arc<Self> {
        Arc::new(Self { policy })
    }

    pub fn policy(&self) -> &Arc<AnnouncementPolicy> {
        &self.policy
    }

    /// Register event handlers, operator commands and remote endpoints
    pub fn register(
        self: &Arc<Self>,
        events: &mut dyn EventSource,
        commands: &mut dyn CommandSink,
        requests: &mut dyn RequestSink,
    ) {
        self.register_events(events);
        self.register_commands(commands);
        self.register_endpoints(requests);
        info!("PrintVoice connected and ready");
    }

    pub fn register_events(self: &Arc<Self>, events: &mut dyn EventSource) {
        let plugin = self.clone();
        events.subscribe(
            "klippy:ready",
            Arc::new(move |_| -> BoxFuture<'static, ()> {
                let plugin = plugin.clone();
                Box::pin(async move { plugin.handle_ready().await })
            }),
        );

        let plugin = self.clone();
        events.subscribe(
            "klippy:shutdown",
            Arc::new(move |_| -> BoxFuture<'static, ()> {
                let plugin = plugin.clone();
                Box::pin(async move { plugin.handle_shutdown().await })
            }),
        );

        let plugin = self.clone();
        events.subscribe(
            "print_stats",
            Arc::new(move |payload| -> BoxFuture<'static, ()> {
                let plugin = plugin.clone();
                Box::pin(async move { plugin.handle_print_event(payload).await })
            }),
        );
    }

    pub fn register_commands(self: &Arc<Self>, commands: &mut dyn CommandSink) {
        for (name, help) in crate::commands::COMMANDS {
            let plugin = self.clone();
            commands.register_command(
                name,
                help,
                Arc::new(move |req| -> BoxFuture<'static, VoiceResult<String>> {
                    let plugin = plugin.clone();
                    Box::pin(async move { plugin.dispatch_command(req).await })
                }),
            );
        }
    }

    pub fn register_endpoints(self: &Arc<Self>, requests: &mut dyn RequestSink) {
        let plugin = self.clone();
        requests.register_endpoint(
            "voice/announce",
            Arc::new(move |req| -> BoxFuture<'static, Value> {
                let plugin = plugin.clone();
                Box::pin(async move { plugin.remote_announce_value(req).await })
            }),
        );

        let plugin = self.clone();
        requests.register_endpoint(
            "voice/config",
            Arc::new(move |_| -> BoxFuture<'static, Value> {
                let plugin = plugin.clone();
                Box::pin(async move { plugin.remote_config_value().await })
            }),
        );

        let plugin = self.clone();
        requests.register_endpoint(
            "voice/status",
            Arc::new(move |_| -> BoxFuture<'static, Value> {
                let plugin = plugin.clone();
                Box::pin(async move { plugin.remote_status_value().await })
            }),
        );
    }

    /// Host fully initialized: announce readiness if allowed
    pub async fn handle_ready(&self) {
        if self.policy.should_auto_announce("ready") {
            self.policy.announce("ready", None).await;
        }
    }

    /// Host teardown: stop in-flight playback
    pub async fn handle_shutdown(&self) {
        self.policy.shutdown().await;
    }

    /// Print lifecycle event; announces per the auto-announce flags
    pub async fn handle_print_event(&self, payload: Value) {
        let Some(event) = payload.get("event").and_then(|v| v.as_str()) else {
            debug!("Print event without event name: {}", payload);
            return;
        };

        debug!("Print event received: {}", event);
        if PRINT_EVENTS.contains(&event) && self.policy.should_auto_announce(event) {
            self.policy.announce(event, None).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ResourceCatalog;
    use crate::config::VoiceConfig;
    use crate::playback::PlaybackController;
    use serde_json::json;
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
    async fn test_print_event_announces_when_enabled() {
        let plugin = test_plugin(VoiceConfig::default());
        plugin
            .handle_print_event(json!({"event": "print_start"}))
            .await;

        let (kind, _) = plugin.policy().last_announcement();
        assert_eq!(kind.as_deref(), Some("print_start"));
    }

    #[tokio::test]
    async fn test_error_event_not_auto_announced() {
        let plugin = test_plugin(VoiceConfig::default());
        plugin.handle_print_event(json!({"event": "error"})).await;

        let (kind, _) = plugin.policy().last_announcement();
        assert!(kind.is_none());
    }

    #[tokio::test]
    async fn test_unknown_event_ignored() {
        let plugin = test_plugin(VoiceConfig::default());
        plugin
            .handle_print_event(json!({"event": "spindle_start"}))
            .await;
        plugin.handle_print_event(json!({"other": 1})).await;

        let (kind, _) = plugin.policy().last_announcement();
        assert!(kind.is_none());
    }

    #[tokio::test]
    async fn test_ready_event_announces() {
        let plugin = test_plugin(VoiceConfig::default());
        plugin.handle_ready().await;

        let (kind, _) = plugin.policy().last_announcement();
        assert_eq!(kind.as_deref(), Some("ready"));
    }
}
