//! `gemini-agent`: decision-service client for the diorama orchestrator.
//!
//! The orchestrator hands each user turn to a [`DecisionService`], which
//! answers with raw text that should contain a JSON object
//! `{"narrative": …, "next_scene": …}`. This crate provides the trait seam
//! and the production implementation against Gemini's `generateContent`
//! REST endpoint.
//!
//! # Architecture
//!
//! ```text
//! DecisionRequest  ← current scene + user speech (+ history)
//!     │
//!     ▼
//! DecisionService  ← trait; GeminiClient in production, stubs in tests
//!     │
//!     ▼
//! raw text         ← parsed by the orchestrator, not here
//! ```
//!
//! # Quick start
//!
//! ```rust,ignore
//! use gemini_agent::{DecisionRequest, DecisionService, GeminiClient, GeminiConfig};
//!
//! let client = GeminiClient::new(GeminiConfig::new(api_key, system_prompt));
//! let text = client.decide(&DecisionRequest::new("HOME", "hello")).await?;
//! ```

pub mod client;
pub mod error;
pub mod service;
pub mod types;

#[cfg(test)]
mod tests;

pub use client::{GeminiClient, GeminiConfig, DEFAULT_MODEL};
pub use error::GeminiAgentError;
pub use service::{DecisionRequest, DecisionService, Exchange, RequestKind};
pub use types::{GenerateContentRequest, GenerateContentResponse};

/// Convenience `Result` alias for this crate.
pub type Result<T> = std::result::Result<T, GeminiAgentError>;
