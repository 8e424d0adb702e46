//! Operator command surface
//!
//! The five commands the host registers on behalf of the plugin, with
//! `KEY=value` parameter parsing. Usage errors (unknown kinds, out-of-range
//! values) surface synchronously as `VoiceError::Usage` with no side effects.

use crate::error::{VoiceError, VoiceResult};
use crate::host::VoicePlugin;
use crate::policy::SettingsUpdate;
use std::collections::HashMap;

/// Command names and help strings, registered with the host's command sink
pub const COMMANDS: [(&str, &str); 5] = [
    ("ANNOUNCE", "Announce a voice message"),
    ("CONFIGURE", "Configure voice settings"),
    ("STATUS", "Show voice plugin status"),
    ("TEST", "Test voice functionality"),
    ("RESCAN", "Scan for audio files and rebuild the catalog"),
];

/// A parsed operator command: name plus KEY=value parameters
#[derive(Debug, Clone)]
pub struct CommandRequest {
    pub name: String,
    params: HashMap<String, String>,
}

impl CommandRequest {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_uppercase(),
            params: HashMap::new(),
        }
    }

    pub fn with_param(mut self, key: &str, value: &str) -> Self {
        self.params.insert(key.to_uppercase(), value.to_string());
        self
    }

    /// Parse a command line like `ANNOUNCE TEXT="hello there" VOLUME=0.5`
    pub fn parse(line: &str) -> Option<Self> {
        let mut tokens = tokenize(line).into_iter();
        let name = tokens.next()?;
        let mut params = HashMap::new();
        for token in tokens {
            match token.split_once('=') {
                Some((key, value)) => {
                    params.insert(key.to_uppercase(), value.to_string());
                }
                None => {
                    params.insert(token.to_uppercase(), String::new());
                }
            }
        }
        Some(Self {
            name: name.to_uppercase(),
            params,
        })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(|s| s.as_str())
    }

    /// Optional float parameter with range validation
    pub fn get_float(&self, key: &str, min: f32, max: f32) -> VoiceResult<Option<f32>> {
        let Some(raw) = self.params.get(key) else {
            return Ok(None);
        };
        let value: f32 = raw
            .parse()
            .map_err(|_| VoiceError::Usage(format!("{} must be a number, got '{}'", key, raw)))?;
        if !(min..=max).contains(&value) {
            return Err(VoiceError::Usage(format!(
                "{} must be between {} and {}, got {}",
                key, min, max, value
            )));
        }
        Ok(Some(value))
    }

    /// Optional 0/1 flag parameter
    pub fn get_flag(&self, key: &str) -> VoiceResult<Option<bool>> {
        let Some(raw) = self.params.get(key) else {
            return Ok(None);
        };
        match raw.as_str() {
            "0" => Ok(Some(false)),
            "1" => Ok(Some(true)),
            other => Err(VoiceError::Usage(format!(
                "{} must be 0 or 1, got '{}'",
                key, other
            ))),
        }
    }
}

/// Split on whitespace, keeping double-quoted values together
fn tokenize(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for c in line.trim().chars() {
        match c {
            '"' => in_quotes = !in_quotes,
            c if c.is_whitespace() && !in_quotes => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

impl VoicePlugin {
    /// Route a parsed command to its handler
    pub async fn dispatch_command(&self, req: CommandRequest) -> VoiceResult<String> {
        match req.name.as_str() {
            "ANNOUNCE" => self.cmd_announce(req).await,
            "CONFIGURE" => self.cmd_configure(req).await,
            "STATUS" => self.cmd_status().await,
            "TEST" => self.cmd_test(req).await,
            "RESCAN" => self.cmd_rescan().await,
            other => Err(VoiceError::Usage(format!("Unknown command: {}", other))),
        }
    }

    /// ANNOUNCE [TEXT=<text>] [KIND=<kind>] [VOLUME=<0.0-1.0>]
    async fn cmd_announce(&self, req: CommandRequest) -> VoiceResult<String> {
        let policy = self.policy();
        let kind = req.get("KIND").unwrap_or("custom").to_string();
        let volume = req.get_float("VOLUME", 0.0, 1.0)?;

        let text = match req.get("TEXT").filter(|t| !t.is_empty()) {
            Some(text) => text.to_string(),
            None => policy.messages().get(&kind).cloned().ok_or_else(|| {
                VoiceError::Usage(format!("No TEXT specified and KIND '{}' not found", kind))
            })?,
        };

        if policy
            .announce_with_volume(&kind, Some(&text), volume)
            .await
        {
            Ok(format!("Voice announcement sent: {}", text))
        } else {
            Ok("Voice announcement blocked (disabled or too frequent)".to_string())
        }
    }

    /// CONFIGURE [ENABLE=<0|1>] [VOLUME=<0.0-1.0>] [SPEED=<0.5-2.0>] [LANGUAGE=<code>]
    async fn cmd_configure(&self, req: CommandRequest) -> VoiceResult<String> {
        let policy = self.policy();
        let update = SettingsUpdate {
            enable: req.get_flag("ENABLE")?,
            volume: req.get_float("VOLUME", 0.0, 1.0)?,
            speed: req.get_float("SPEED", 0.5, 2.0)?,
            language: req.get("LANGUAGE").map(|l| l.to_string()),
        };

        let changed = policy.reconfigure(update).await;
        if changed.is_empty() {
            let s = policy.settings().await;
            Ok(format!(
                "Voice config - enabled: {}, volume: {:.1}, speed: {:.1}, language: {}",
                s.enabled, s.volume, s.voice_speed, s.language
            ))
        } else {
            Ok(format!("Voice config updated: {}", changed.join(", ")))
        }
    }

    /// STATUS
    async fn cmd_status(&self) -> VoiceResult<String> {
        let policy = self.policy();
        let s = policy.settings().await;
        let (last_kind, last_at) = policy.last_announcement();

        let last = match (last_kind, last_at) {
            (Some(kind), Some(at)) => format!("{} at {}", kind, at.to_rfc3339()),
            _ => "None".to_string(),
        };

        let lines = [
            "Voice plugin status:".to_string(),
            format!("  Enabled: {}", s.enabled),
            format!("  Volume: {:.1}", s.volume),
            format!("  Speed: {:.1}", s.voice_speed),
            format!("  Language: {}", s.language),
            format!("  Renderer: {}", policy.renderer_name().unwrap_or("none")),
            format!("  Last announcement: {}", last),
            // No queue exists; at-most-one-in-flight is achieved by preemption
            "  Queue length: 0".to_string(),
        ];
        Ok(lines.join("\n"))
    }

    /// TEST [KIND=<kind>] (default "ready")
    async fn cmd_test(&self, req: CommandRequest) -> VoiceResult<String> {
        let policy = self.policy();
        let kind = req.get("KIND").unwrap_or("ready");

        if !policy.messages().contains_key(kind) {
            let mut available: Vec<&str> = policy.messages().keys().map(|k| k.as_str()).collect();
            available.sort_unstable();
            return Err(VoiceError::Usage(format!(
                "Unknown test kind '{}'. Available: {}",
                kind,
                available.join(", ")
            )));
        }

        if policy.announce(kind, None).await {
            Ok(format!("Voice test completed: {}", kind))
        } else {
            Ok("Voice test blocked (disabled or too frequent)".to_string())
        }
    }

    /// RESCAN
    async fn cmd_rescan(&self) -> VoiceResult<String> {
        let policy = self.policy();
        let report = policy.rescan().await;

        let catalog = policy.catalog();
        let catalog = catalog.read().await;
        let mut missing: Vec<&str> = policy
            .messages()
            .keys()
            .filter(|kind| !catalog.contains_kind(kind))
            .map(|k| k.as_str())
            .collect();
        missing.sort_unstable();

        let mut lines = vec![
            "Audio file scan completed:".to_string(),
            format!("  Found {} audio files", report.files),
            format!("  Available message kinds: {}", catalog.kinds().join(", ")),
        ];
        if missing.is_empty() {
            lines.push("  All message kinds have audio files available".to_string());
        } else {
            lines.push(format!("  Missing audio files for: {}", missing.join(", ")));
        }
        Ok(lines.join("\n"))
    }
}
