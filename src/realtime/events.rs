//! JSON wire events of the realtime API.
//!
//! Only the subset the voice session needs is modelled; every other server
//! event decodes to [`ServerEvent::Other`] and is ignored.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use super::channel::{ChannelEvent, ConversationItem, ItemDelta};
use crate::audio::AudioFrame;

// ---------------------------------------------------------------------------
// Session parameters
// ---------------------------------------------------------------------------

/// Server-side voice activity detection settings.  `None` in
/// [`SessionParameters::turn_detection`] means turns are ended manually.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnDetection {
    #[serde(rename = "type")]
    pub kind: String,
}

/// Conversation-level settings sent as `session.update`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionParameters {
    pub modalities: Vec<String>,
    pub instructions: String,
    pub voice: String,
    pub input_audio_format: String,
    pub output_audio_format: String,
    /// Serialised as `null` when absent, which disables server VAD.
    pub turn_detection: Option<TurnDetection>,
}

impl SessionParameters {
    /// Text + audio modalities, PCM16 both ways, manual turns.
    pub fn new(instructions: impl Into<String>, voice: impl Into<String>) -> Self {
        Self {
            modalities: vec!["text".into(), "audio".into()],
            instructions: instructions.into(),
            voice: voice.into(),
            input_audio_format: "pcm16".into(),
            output_audio_format: "pcm16".into(),
            turn_detection: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Client → server
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContentPart {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageItem {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub role: &'static str,
    pub content: Vec<ContentPart>,
}

impl MessageItem {
    /// A user turn carrying a single `input_text` part.
    pub fn user_text(text: &str) -> Self {
        Self {
            kind: "message",
            role: "user",
            content: vec![ContentPart {
                kind: "input_text",
                text: text.to_string(),
            }],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    #[serde(rename = "session.update")]
    SessionUpdate { session: SessionParameters },

    #[serde(rename = "input_audio_buffer.append")]
    InputAudioAppend { audio: String },

    #[serde(rename = "input_audio_buffer.commit")]
    InputAudioCommit,

    #[serde(rename = "conversation.item.create")]
    ItemCreate { item: MessageItem },

    #[serde(rename = "response.create")]
    ResponseCreate,
}

impl ClientEvent {
    /// `input_audio_buffer.append` carrying base64 little-endian PCM16.
    pub fn append_audio(frame: &AudioFrame) -> Self {
        Self::InputAudioAppend {
            audio: STANDARD.encode(frame.to_le_bytes()),
        }
    }

    pub fn user_text(text: &str) -> Self {
        Self::ItemCreate {
            item: MessageItem::user_text(text),
        }
    }
}

// ---------------------------------------------------------------------------
// Server → client
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ServerItem {
    pub id: String,
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ServerError {
    #[serde(default)]
    pub code: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    #[serde(rename = "conversation.item.created")]
    ItemCreated { item: ServerItem },

    #[serde(rename = "response.audio.delta")]
    AudioDelta { item_id: String, delta: String },

    #[serde(rename = "response.audio_transcript.delta")]
    TranscriptDelta { item_id: String, delta: String },

    #[serde(rename = "response.text.delta")]
    TextDelta { item_id: String, delta: String },

    #[serde(rename = "error")]
    Error { error: ServerError },

    #[serde(other)]
    Other,
}

impl ServerEvent {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Translate into the session-facing event.  `None` for ignored events.
    pub fn into_channel_event(self, sample_rate: u32) -> Option<ChannelEvent> {
        match self {
            Self::ItemCreated { item } => Some(ChannelEvent::ConversationUpdated {
                item: ConversationItem {
                    id: item.id,
                    role: item.role,
                },
                delta: None,
            }),
            Self::AudioDelta { item_id, delta } => match STANDARD.decode(delta.as_bytes()) {
                Ok(bytes) => Some(ChannelEvent::ConversationUpdated {
                    item: ConversationItem::assistant(item_id),
                    delta: Some(ItemDelta::Audio(
                        AudioFrame::from_le_bytes(&bytes, sample_rate).samples,
                    )),
                }),
                Err(e) => Some(ChannelEvent::Error {
                    message: format!("undecodable audio delta for {item_id}: {e}"),
                }),
            },
            Self::TranscriptDelta { item_id, delta } => Some(ChannelEvent::ConversationUpdated {
                item: ConversationItem::assistant(item_id),
                delta: Some(ItemDelta::Transcript(delta)),
            }),
            Self::TextDelta { item_id, delta } => Some(ChannelEvent::ConversationUpdated {
                item: ConversationItem::assistant(item_id),
                delta: Some(ItemDelta::Text(delta)),
            }),
            Self::Error { error } => Some(ChannelEvent::Error {
                message: match error.code {
                    Some(code) => format!("{code}: {}", error.message),
                    None => error.message,
                },
            }),
            Self::Other => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
