//! Client side of the tutor backend's speech contract.
//!
//! The backend turns text into an answer, synthesizes it, and returns the
//! audio location together with the viseme timeline:
//!
//! ```text
//! POST /synthesize {"text": "..."}  ─┐
//! GET  /greeting                    ─┴─▶ {"audio_url", "visemes": [{offset, viseme_id}], "board_text"?}
//! ```

pub mod client;
pub mod synthesis;

pub use client::{BackendClient, BackendError};
pub use synthesis::{parse_response, parse_utterance, Synthesis, Utterance};
