//! PrintVoice Library
//!
//! Voice announcements for 3D printer control hosts: lifecycle events and
//! operator commands become audio played by an external renderer program,
//! subject to rate limiting and preemptive single-slot playback.

pub mod api;
pub mod catalog;
pub mod commands;
pub mod config;
pub mod error;
pub mod host;
pub mod playback;
pub mod policy;
pub mod renderer;
