//! Shared types for pluggable text-to-speech backends
//!
//! This crate is the external-collaborator surface: it defines the contract
//! a TTS backend implementation must satisfy (`TtsBackend`, `BackendStream`)
//! and the audio/error types that flow across it. It does not contain any
//! fallback, health-tracking, or orchestration logic — that lives in
//! `tts-fallback`.

pub mod audio;
pub mod backend;
pub mod error;

pub use audio::AudioFrame;
pub use backend::{BackendStream, ConnectOptions, FrameSource, TtsBackend};
pub use error::{Error, Result};
