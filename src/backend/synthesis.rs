//! The synthesis response contract shared by `/synthesize` and `/greeting`.

use serde::{Deserialize, Serialize};

use crate::viseme::{Timeline, TimelineError, VisemeEvent};

use super::client::BackendError;

/// One synthesized utterance: where its audio lives and how the mouth moves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Synthesis {
    /// Audio location, usually relative to the backend (`/audio/<file>`).
    pub audio_url: String,
    /// Mouth-shape events, offsets in milliseconds.
    #[serde(default)]
    pub visemes: Vec<VisemeEvent>,
    /// Text to show on the board alongside the speech.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub board_text: Option<String>,
}

impl Synthesis {
    /// Validate the visemes into a [`Timeline`].
    pub fn timeline(&self) -> Result<Timeline, TimelineError> {
        Timeline::new(self.visemes.clone())
    }
}

/// A synthesis result whose visemes passed timeline validation.
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub synthesis: Synthesis,
    pub timeline: Timeline,
}

impl TryFrom<Synthesis> for Utterance {
    type Error = TimelineError;

    fn try_from(synthesis: Synthesis) -> Result<Self, Self::Error> {
        let timeline = synthesis.timeline()?;
        Ok(Self {
            synthesis,
            timeline,
        })
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// Interpret a backend reply.
///
/// Non-2xx replies carry `{"error": "..."}`; when they don't, a prefix of
/// the raw body is used as the message.
pub fn parse_response(status: u16, body: &str) -> Result<Synthesis, BackendError> {
    if !(200..300).contains(&status) {
        let message = serde_json::from_str::<ErrorBody>(body)
            .map(|b| b.error)
            .unwrap_or_else(|_| body.chars().take(200).collect());
        return Err(BackendError::Server { status, message });
    }

    serde_json::from_str(body).map_err(|e| BackendError::Parse(e.to_string()))
}

/// [`parse_response`], then validate the visemes into a [`Timeline`].
pub fn parse_utterance(status: u16, body: &str) -> Result<Utterance, BackendError> {
    let synthesis = parse_response(status, body)?;
    Ok(Utterance::try_from(synthesis)?)
}
