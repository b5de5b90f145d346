//! Aura Bot
//!
//! Telegram expert bot that answers questions about one piece of equipment
//! strictly from a plain-text knowledge base, using Google Gemini.
//!
//! # Architecture
//!
//! ```text
//! Telegram ──► AccessGate ──► AuraEngine ──► Gemini API
//!  (polling)   (allow-list)      │
//!                                └── KnowledgeBase (static text)
//!
//! CLI ──► chat (REPL) ──► AuraEngine
//!     └─► state <entity> ──► HomeAssistantClient ──► Home Assistant REST API
//! ```

pub mod auth;
pub mod cli;
pub mod config;
pub mod engine;
pub mod gemini;
pub mod home_assistant;
pub mod knowledge;
pub mod telegram;


pub use auth::{AccessGate, Origin, Restricted, Sender};
pub use config::{Config, ConfigError, HomeAssistantConfig};
pub use engine::{AuraEngine, Completion, LanguageModel};
pub use gemini::GeminiClient;
pub use home_assistant::{EntityState, HomeAssistantClient, HomeAssistantError};
pub use knowledge::KnowledgeBase;
