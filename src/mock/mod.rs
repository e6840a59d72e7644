//! Mock implementations for testing
//!
//! [`MockAssistantBackend`] replays scripted chat replies and records every
//! request it receives so tests can assert on the conversation.

use crate::error::{HomeError, Result};
use crate::openai::{AssistantBackend, AudioClip, ChatMessage, ChatToolCall};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::Mutex;

/// A chat request as seen by the mock
#[derive(Debug, Clone)]
pub struct RecordedChat {
    pub messages: Vec<ChatMessage>,
    pub with_tools: bool,
}

/// Scripted backend for orchestrator and HTTP tests
pub struct MockAssistantBackend {
    replies: Mutex<VecDeque<ChatMessage>>,
    chats: Mutex<Vec<RecordedChat>>,
    spoken: Mutex<Vec<String>>,
    transcript: Option<String>,
    speech_fails: bool,
    session: Value,
}

impl Default for MockAssistantBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockAssistantBackend {
    /// Create new mock backend with no scripted replies
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            chats: Mutex::new(Vec::new()),
            spoken: Mutex::new(Vec::new()),
            transcript: None,
            speech_fails: false,
            session: json!({
                "id": "sess_mock",
                "object": "realtime.session",
                "client_secret": { "value": "ek_mock", "expires_at": 0 }
            }),
        }
    }

    /// Queue a plain text reply
    pub fn reply_text(self, text: &str) -> Self {
        self.push(ChatMessage::assistant(text))
    }

    /// Queue a reply requesting one tool call
    pub fn reply_tool_call(self, id: &str, name: &str, arguments: Value) -> Self {
        self.push(ChatMessage::assistant_tool_calls(vec![ChatToolCall::function(
            id,
            name,
            arguments.to_string(),
        )]))
    }

    /// Queue a reply with raw tool calls
    pub fn reply_tool_calls(self, calls: Vec<ChatToolCall>) -> Self {
        self.push(ChatMessage::assistant_tool_calls(calls))
    }

    /// Text returned by transcription; unset means transcription fails
    pub fn with_transcript(mut self, transcript: &str) -> Self {
        self.transcript = Some(transcript.to_string());
        self
    }

    /// Make speech synthesis fail
    pub fn with_failing_speech(mut self) -> Self {
        self.speech_fails = true;
        self
    }

    fn push(self, message: ChatMessage) -> Self {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(message);
        }
        self
    }

    /// Chat requests received so far
    pub fn chats(&self) -> Vec<RecordedChat> {
        self.chats.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Texts sent to speech synthesis
    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl AssistantBackend for MockAssistantBackend {
    async fn create_realtime_session(&self) -> Result<Value> {
        Ok(self.session.clone())
    }

    async fn chat(&self, messages: &[ChatMessage], tools: Option<&[Value]>) -> Result<ChatMessage> {
        self.chats
            .lock()
            .map_err(|_| HomeError::internal("mock lock poisoned"))?
            .push(RecordedChat {
                messages: messages.to_vec(),
                with_tools: tools.is_some(),
            });

        self.replies
            .lock()
            .map_err(|_| HomeError::internal("mock lock poisoned"))?
            .pop_front()
            .ok_or_else(|| HomeError::upstream("mock has no scripted reply left"))
    }

    async fn transcribe(&self, _audio: &AudioClip) -> Result<String> {
        self.transcript
            .clone()
            .ok_or_else(|| HomeError::transcription("mock transcription failure"))
    }

    async fn synthesize_speech(&self, text: &str) -> Result<Vec<u8>> {
        if self.speech_fails {
            return Err(HomeError::speech("mock speech failure"));
        }
        self.spoken
            .lock()
            .map_err(|_| HomeError::internal("mock lock poisoned"))?
            .push(text.to_string());
        Ok(b"mp3".to_vec())
    }
}
