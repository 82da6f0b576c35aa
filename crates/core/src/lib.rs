//! Scene-by-scene narration assembly.
//!
//! Each scene of a video project gets one audio segment: synthesized speech
//! when a script is available, otherwise audio extracted from the scene's
//! video. Segments are normalized and concatenated into one narration track.

pub mod audio;
pub mod concat;
pub mod config;
pub mod error;
pub mod media;
pub mod pipeline;
pub mod process;
pub mod recognition;
pub mod script;
pub mod tts;
pub mod types;
pub mod workspace;
