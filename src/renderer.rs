//! Audio renderer selection
//!
//! Playback is delegated to an external player program. Candidates are probed
//! in a fixed priority order at startup and the first one present on the host
//! wins. Each renderer declares its own argument template, supported formats
//! and volume scale, so callers never branch on renderer identity.

use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tracing::{debug, info, warn};

/// Descriptor for an external audio player program
#[derive(Debug, Clone)]
pub struct Renderer {
    pub name: &'static str,
    pub program: &'static str,
    base_args: &'static [&'static str],
    formats: &'static [&'static str],
    /// Renderer-specific volume argument builder (0.0-1.0 in)
    volume_arg: Option<fn(f32) -> Vec<String>>,
}

impl Renderer {
    pub fn supports_volume(&self) -> bool {
        self.volume_arg.is_some()
    }

    /// Formats this renderer can play, in preference order
    pub fn preferred_formats(&self) -> Vec<String> {
        self.formats.iter().map(|f| f.to_string()).collect()
    }

    /// Build the argument list for playing `resource`.
    ///
    /// The volume argument is appended only when the renderer supports it and
    /// a volume was requested (hardware volume enabled).
    pub fn build_invocation(&self, resource: &Path, volume: Option<f32>) -> Vec<String> {
        let mut args: Vec<String> = self.base_args.iter().map(|a| a.to_string()).collect();
        if let (Some(build), Some(vol)) = (self.volume_arg, volume) {
            args.extend(build(vol.clamp(0.0, 1.0)));
        }
        args.push(resource.to_string_lossy().to_string());
        args
    }
}

fn mpg123_volume(volume: f32) -> Vec<String> {
    // mpg123 gain: 0-100 integer
    vec!["-g".to_string(), format!("{}", (volume * 100.0).round() as u32)]
}

fn paplay_volume(volume: f32) -> Vec<String> {
    // PulseAudio linear volume: 0-65536
    vec![format!("--volume={}", (volume * 65536.0).round() as u32)]
}

fn mpv_volume(volume: f32) -> Vec<String> {
    // mpv takes a floating percentage
    vec![format!("--volume={:.1}", volume * 100.0)]
}

/// Fixed probe priority order; first available renderer wins
pub const PRIORITY: &[Renderer] = &[
    Renderer {
        name: "mpg123",
        program: "mpg123",
        base_args: &["-q"],
        formats: &["mp3"],
        volume_arg: Some(mpg123_volume),
    },
    Renderer {
        name: "paplay",
        program: "paplay",
        base_args: &[],
        formats: &["wav", "ogg"],
        volume_arg: Some(paplay_volume),
    },
    Renderer {
        name: "mpv",
        program: "mpv",
        base_args: &["--no-video", "--really-quiet"],
        formats: &["mp3", "wav", "ogg"],
        volume_arg: Some(mpv_volume),
    },
    Renderer {
        name: "aplay",
        program: "aplay",
        base_args: &["-q"],
        formats: &["wav"],
        volume_arg: None,
    },
];

/// Capability for checking whether an executable exists on the host
#[async_trait]
pub trait ExecutableLocator: Send + Sync {
    async fn locate(&self, program: &str) -> bool;
}

/// Production locator backed by `which`
pub struct WhichLocator;

#[async_trait]
impl ExecutableLocator for WhichLocator {
    async fn locate(&self, program: &str) -> bool {
        match tokio::process::Command::new("which")
            .arg(program)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
        {
            Ok(status) => status.success(),
            Err(e) => {
                warn!("Error probing for {}: {}", program, e);
                false
            }
        }
    }
}

/// Probe renderers in priority order, short-circuiting on the first hit
pub async fn detect(locator: &dyn ExecutableLocator) -> Option<Renderer> {
    for renderer in PRIORITY {
        if locator.locate(renderer.program).await {
            info!("✅ Audio renderer found: {}", renderer.name);
            return Some(renderer.clone());
        }
        debug!("Renderer not available: {}", renderer.name);
    }
    warn!("⚠️ No audio renderer found, announcements will be logged only");
    None
}
