//! OpenAI API access: realtime sessions, chat completions, transcription and
//! speech synthesis

pub mod chat;
pub mod client;
pub mod realtime;

pub use chat::{ChatMessage, ChatToolCall, FunctionCall, Role};
pub use client::OpenAiClient;

use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;

/// Recorded audio submitted with a voice command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioClip {
    pub bytes: Vec<u8>,
    /// File name sent with the upload; the extension tells the API the format
    pub file_name: String,
}

impl AudioClip {
    pub fn new(bytes: Vec<u8>, format: &str) -> Self {
        let extension = format.trim().trim_start_matches('.');
        let extension = if extension.is_empty() { "webm" } else { extension };
        Self {
            bytes,
            file_name: format!("command.{extension}"),
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self.file_name.rsplit('.').next() {
            Some("mp3") | Some("mpeg") | Some("mpga") => "audio/mpeg",
            Some("wav") => "audio/wav",
            Some("ogg") => "audio/ogg",
            Some("m4a") | Some("mp4") => "audio/mp4",
            _ => "audio/webm",
        }
    }
}

/// Upstream model operations the assistant and voice routes depend on
#[async_trait]
pub trait AssistantBackend: Send + Sync {
    /// Create an ephemeral realtime session; the upstream JSON is returned as is
    async fn create_realtime_session(&self) -> Result<Value>;

    /// One chat completion; `tools` is `None` to force a plain answer
    async fn chat(&self, messages: &[ChatMessage], tools: Option<&[Value]>) -> Result<ChatMessage>;

    /// Transcribe recorded audio to text
    async fn transcribe(&self, audio: &AudioClip) -> Result<String>;

    /// Synthesize speech, returning the raw audio bytes
    async fn synthesize_speech(&self, text: &str) -> Result<Vec<u8>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_clip_naming() {
        let clip = AudioClip::new(vec![1, 2, 3], ".wav");
        assert_eq!(clip.file_name, "command.wav");
        assert_eq!(clip.mime_type(), "audio/wav");
        assert_eq!(AudioClip::new(vec![], "").mime_type(), "audio/webm");
    }
}
