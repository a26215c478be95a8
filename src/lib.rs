//! Client-side cores for the TalentFlow chat surface: voice-transcript
//! normalization and the realtime thread synchronizer, plus the thin
//! API and change-feed wrappers they bind to.

pub mod api;
pub mod chat;
pub mod config;
pub mod email;
pub mod realtime;
pub mod session;
pub mod timestamp;
pub mod transcript;
pub mod types;
