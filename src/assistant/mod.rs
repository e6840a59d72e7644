//! Turn-based conversation orchestrator
//!
//! A turn takes text or recorded audio, runs the chat loop with the device
//! tools until the model answers in plain text, and then tries to speak the
//! answer. Speech is best effort: a synthesis failure never fails the turn.

use crate::config::AssistantConfig;
use crate::error::{HomeError, Result};
use crate::openai::{AssistantBackend, AudioClip, ChatMessage};
use crate::registry::{DeviceScope, UserId};
use crate::tools::{schema, ToolCall, ToolDispatcher, ToolResult};
use base64::Engine as _;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// System prompt for the chat loop
pub const SYSTEM_PROMPT: &str = "Eres un asistente inteligente para el hogar. \
Tienes acceso a los dispositivos del usuario. \
Usa las herramientas proporcionadas para controlar dispositivos o consultar su estado. \
Siempre responde de manera concisa y amable en español. \
NO alucines estados de dispositivos, usa SIEMPRE la herramienta get_devices.";

/// Progress of a single turn, reported in debug logs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    AwaitingUserInput,
    ModelRequested,
    ToolsRequested,
    ToolsExecuted,
    FinalAnswer,
    SpeechSynthesized,
    SpeechFailed,
    Done,
}

/// Input of a turn: typed text, recorded audio, or both (audio wins)
#[derive(Debug, Clone, Default)]
pub struct CommandInput {
    pub text: Option<String>,
    pub audio: Option<AudioClip>,
}

impl CommandInput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            audio: None,
        }
    }

    pub fn audio(audio: AudioClip) -> Self {
        Self {
            text: None,
            audio: Some(audio),
        }
    }
}

/// Result of the speech step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechOutcome {
    /// Base64-encoded audio
    Synthesized(String),
    Skipped { reason: String },
}

impl SpeechOutcome {
    pub fn into_audio(self) -> Option<String> {
        match self {
            SpeechOutcome::Synthesized(audio) => Some(audio),
            SpeechOutcome::Skipped { .. } => None,
        }
    }
}

/// Reply of a turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssistantReply {
    pub text: Option<String>,
    pub transcript: String,
    pub audio: Option<String>,
}

/// Conversation orchestrator
#[derive(Clone)]
pub struct VoiceAssistant {
    backend: Arc<dyn AssistantBackend>,
    dispatcher: ToolDispatcher,
    config: AssistantConfig,
    tools: Arc<Vec<Value>>,
}

impl VoiceAssistant {
    pub fn new(
        backend: Arc<dyn AssistantBackend>,
        dispatcher: ToolDispatcher,
        config: AssistantConfig,
    ) -> Self {
        Self {
            backend,
            dispatcher,
            config,
            tools: Arc::new(schema::chat_tools()),
        }
    }

    /// Run one full turn for a user
    pub async fn process_command(&self, user_id: UserId, input: CommandInput) -> Result<AssistantReply> {
        debug!(state = ?TurnState::AwaitingUserInput, user_id, "Turn started");

        let transcript = match &input.audio {
            Some(audio) => self.backend.transcribe(audio).await.map_err(|e| match e {
                HomeError::Transcription(_) => e,
                other => HomeError::transcription(other.to_string()),
            })?,
            None => input.text.unwrap_or_default(),
        };

        if transcript.trim().is_empty() {
            return Err(HomeError::invalid_input(
                "A text command or an audio clip is required",
            ));
        }

        let scope = DeviceScope::for_caller(self.config.scope, user_id);
        let text = self.converse(scope, &transcript).await?;
        debug!(state = ?TurnState::FinalAnswer, has_text = text.is_some(), "Final answer ready");

        let speech = self.speak(text.as_deref()).await;
        debug!(state = ?TurnState::Done, "Turn finished");

        Ok(AssistantReply {
            text,
            transcript,
            audio: speech.into_audio(),
        })
    }

    /// Chat loop: at most `max_tool_rounds` tool rounds, then one request
    /// without tools to force a plain answer
    async fn converse(&self, scope: DeviceScope, transcript: &str) -> Result<Option<String>> {
        let mut messages = vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(transcript),
        ];

        for round in 1..=self.config.max_tool_rounds {
            debug!(state = ?TurnState::ModelRequested, round, "Requesting model");
            let reply = self.backend.chat(&messages, Some(self.tools.as_slice())).await?;

            if reply.tool_calls.is_empty() {
                return Ok(reply.text_content().map(str::to_string));
            }

            debug!(
                state = ?TurnState::ToolsRequested,
                round,
                calls = reply.tool_calls.len(),
                "Model requested tools"
            );
            let calls = reply.tool_calls.clone();
            messages.push(reply);

            for call in calls {
                let result = self.run_tool_call(scope, &call.function.name, &call.function.arguments).await;
                messages.push(ChatMessage::tool(call.id, result.to_value().to_string()));
            }
            debug!(state = ?TurnState::ToolsExecuted, round, "Tool results appended");
        }

        warn!(
            max_rounds = self.config.max_tool_rounds,
            "Tool round limit reached, forcing a final answer"
        );
        debug!(state = ?TurnState::ModelRequested, "Requesting model without tools");
        let forced = self.backend.chat(&messages, None).await?;
        Ok(forced.text_content().map(str::to_string))
    }

    async fn run_tool_call(&self, scope: DeviceScope, name: &str, arguments: &str) -> ToolResult {
        match ToolCall::parse_encoded(name, arguments) {
            Ok(call) => self.dispatcher.execute(scope, call).await,
            Err(failure) => {
                warn!(tool = name, %failure, "Rejected tool call from model");
                failure.into()
            }
        }
    }

    /// Speak the final answer; failures are logged and skipped
    async fn speak(&self, text: Option<&str>) -> SpeechOutcome {
        if !self.config.speech_enabled {
            return SpeechOutcome::Skipped {
                reason: "speech disabled".to_string(),
            };
        }

        let Some(text) = text else {
            return SpeechOutcome::Skipped {
                reason: "no text to speak".to_string(),
            };
        };

        match self.backend.synthesize_speech(text).await {
            Ok(bytes) => {
                info!(bytes = bytes.len(), state = ?TurnState::SpeechSynthesized, "Speech synthesized");
                SpeechOutcome::Synthesized(base64::engine::general_purpose::STANDARD.encode(bytes))
            }
            Err(e) => {
                error!(state = ?TurnState::SpeechFailed, "TTS Error: {e}");
                SpeechOutcome::Skipped {
                    reason: e.to_string(),
                }
            }
        }
    }
}
