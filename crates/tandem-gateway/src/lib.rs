//! Model Gateway: wraps the Gemini `generateContent` REST API behind the
//! [`Narrator`] seam the turn pipeline consumes.
//!
//! The narration path degrades gracefully — any transport or provider
//! failure becomes a [`DmReply::Degraded`] carrying the failing model's
//! name, never an error. The one-shot concept generator is the exception:
//! it has no transcript to absorb placeholder text, so it fails hard.

mod client;
mod types;

use async_trait::async_trait;

pub use client::GeminiClient;
pub use types::{AdventureConcept, DmReply, GatewayError, ModelConfig, Role, Turn};

use tandem_types::models::Lane;

/// The model seam. One implementation talks to Gemini; tests stub it.
#[async_trait]
pub trait Narrator: Send + Sync {
    /// Produce the next DM reply for one lane. Never fails: upstream
    /// trouble surfaces as [`DmReply::Degraded`].
    async fn narrate(
        &self,
        lane: Lane,
        system_prompt: &str,
        history: &[Turn],
        input: &str,
    ) -> DmReply;

    /// One-shot structured generation of a random adventure concept.
    async fn improvise(&self) -> Result<AdventureConcept, GatewayError>;
}
