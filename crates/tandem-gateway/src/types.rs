use serde::Deserialize;
use tandem_types::models::Lane;
use thiserror::Error;

/// Both lanes run the same model; they differ only in how much extended
/// deliberation the provider is allowed to spend.
pub const DM_MODEL: &str = "gemini-2.5-flash";

/// Thinking budget for the deliberate lane. 0 disables thinking entirely.
pub const DELIBERATE_BUDGET: u32 = 1024;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("malformed provider response: {0}")]
    BadPayload(String),
}

/// Model identity plus the reasoning-budget dial for one lane.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub model: String,
    pub thinking_budget: u32,
}

impl ModelConfig {
    /// Lane 1 answers fast; lane 2 gets a thinking budget.
    pub fn for_lane(lane: Lane) -> Self {
        let thinking_budget = match lane {
            Lane::One => 0,
            Lane::Two => DELIBERATE_BUDGET,
        };
        Self {
            model: DM_MODEL.to_string(),
            thinking_budget,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Model,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "model",
        }
    }
}

/// One prior exchange in a lane's history, in the provider's terms.
#[derive(Debug, Clone)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            text: text.into(),
        }
    }
}

/// Outcome of one narration call.
///
/// `Degraded` is still a committable reply: the transcript records a
/// visible placeholder instead of the turn failing. Callers that need to
/// tell real text from a placeholder can match on the variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DmReply {
    Text(String),
    Degraded { model: String },
}

impl DmReply {
    /// The text that goes into the transcript for this reply.
    pub fn transcript_text(&self) -> String {
        match self {
            DmReply::Text(text) => text.clone(),
            DmReply::Degraded { model } => format!(
                "[The DM ({}) has lost contact with the material plane. \
                 Please try your action again.]",
                model
            ),
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, DmReply::Degraded { .. })
    }
}

/// A randomized adventure concept: a title plus a DM system prompt.
#[derive(Debug, Clone, Deserialize)]
pub struct AdventureConcept {
    pub title: String,
    pub prompt: String,
}

// -- generateContent response shape (the slice of it we read) --

#[derive(Debug, Deserialize)]
pub(crate) struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Candidate {
    pub content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CandidatePart {
    pub text: Option<String>,
}

impl GenerateContentResponse {
    /// Concatenated text of the first candidate's parts.
    pub(crate) fn into_text(self) -> Result<String, GatewayError> {
        let content = self
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .ok_or_else(|| GatewayError::BadPayload("no candidates in response".into()))?;

        let text: String = content
            .parts
            .into_iter()
            .filter_map(|p| p.text)
            .collect::<Vec<_>>()
            .join("");

        if text.is_empty() {
            return Err(GatewayError::BadPayload("candidate carried no text".into()));
        }

        Ok(text)
    }
}
