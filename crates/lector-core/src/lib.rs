//! Core Lector library: text preparation, speech, credentials and the
//! streaming read-aloud coordinator.

pub mod alerts;
pub mod config;
pub mod core;
pub mod credentials;
pub mod prompts;
pub mod providers;
pub mod speech;
pub mod store;
pub mod text;
pub mod text_service;
