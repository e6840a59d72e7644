//! HTTP client for the OpenAI API

use super::chat::{ChatMessage, ChatRequest, ChatResponse, TranscriptionResponse};
use super::realtime::RealtimeSessionRequest;
use super::{AssistantBackend, AudioClip};
use crate::config::OpenAiConfig;
use crate::error::{HomeError, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde_json::{json, Value};
use tracing::{debug, error, info};

/// OpenAI API client
///
/// Construction fails with a configuration error when no API key is set, so a
/// running client always has credentials.
#[derive(Clone)]
pub struct OpenAiClient {
    config: OpenAiConfig,
    api_key: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("base_url", &self.config.base_url.as_str())
            .field("api_key", &"***")
            .finish()
    }
}

impl OpenAiClient {
    /// Create a new client from configuration
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        let api_key = config.require_api_key()?.to_string();

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| HomeError::config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            config,
            api_key,
            client,
        })
    }

    pub fn config(&self) -> &OpenAiConfig {
        &self.config
    }

    /// Read a failed response body for logging
    async fn failure_body(response: reqwest::Response) -> String {
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        format!("HTTP {status} - {body}")
    }
}

/// Log the cause of a failed upstream call and return the generic error
/// callers are allowed to see
fn upstream_failure(context: &str, cause: impl std::fmt::Display, public: HomeError) -> HomeError {
    error!("{context}: {cause}");
    public
}

const SESSION_FAILED: &str = "Failed to create OpenAI session";
const CHAT_FAILED: &str = "Chat completion request failed";
const TRANSCRIPTION_FAILED: &str = "Audio transcription request failed";

#[async_trait]
impl AssistantBackend for OpenAiClient {
    async fn create_realtime_session(&self) -> Result<Value> {
        let url = self.config.endpoint("realtime/sessions")?;
        let request = RealtimeSessionRequest::from_config(&self.config);

        debug!(model = %request.model, "Creating realtime session");

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .header("OpenAI-Beta", "realtime=v1")
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                upstream_failure(
                    "OpenAI Session Creation Failed",
                    e,
                    HomeError::upstream(SESSION_FAILED),
                )
            })?;

        if !response.status().is_success() {
            let body = Self::failure_body(response).await;
            return Err(upstream_failure(
                "OpenAI Session Creation Failed",
                body,
                HomeError::upstream(SESSION_FAILED),
            ));
        }

        let session: Value = response.json().await.map_err(|e| {
            upstream_failure(
                "OpenAI Session Creation Failed",
                e,
                HomeError::upstream(SESSION_FAILED),
            )
        })?;
        info!("Realtime session created");
        Ok(session)
    }

    async fn chat(&self, messages: &[ChatMessage], tools: Option<&[Value]>) -> Result<ChatMessage> {
        let url = self.config.endpoint("chat/completions")?;
        let request = ChatRequest {
            model: &self.config.chat_model,
            messages,
            tools,
            tool_choice: tools.map(|_| "auto"),
        };

        debug!(
            messages = messages.len(),
            with_tools = tools.is_some(),
            "Requesting chat completion"
        );

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                upstream_failure("Chat completion failed", e, HomeError::upstream(CHAT_FAILED))
            })?;

        if !response.status().is_success() {
            let body = Self::failure_body(response).await;
            return Err(upstream_failure(
                "Chat completion failed",
                body,
                HomeError::upstream(CHAT_FAILED),
            ));
        }

        let completion: ChatResponse = response.json().await.map_err(|e| {
            upstream_failure("Chat completion failed", e, HomeError::upstream(CHAT_FAILED))
        })?;
        completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message)
            .ok_or_else(|| HomeError::upstream("Chat completion returned no choices"))
    }

    async fn transcribe(&self, audio: &AudioClip) -> Result<String> {
        let url = self.config.endpoint("audio/transcriptions")?;

        let part = Part::bytes(audio.bytes.clone())
            .file_name(audio.file_name.clone())
            .mime_str(audio.mime_type())
            .map_err(|e| {
                upstream_failure(
                    "Transcription failed",
                    e,
                    HomeError::transcription(TRANSCRIPTION_FAILED),
                )
            })?;
        let form = Form::new()
            .text("model", self.config.transcription_model.clone())
            .text("response_format", "verbose_json")
            .part("file", part);

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                upstream_failure(
                    "Transcription failed",
                    e,
                    HomeError::transcription(TRANSCRIPTION_FAILED),
                )
            })?;

        if !response.status().is_success() {
            let body = Self::failure_body(response).await;
            return Err(upstream_failure(
                "Transcription failed",
                body,
                HomeError::transcription(TRANSCRIPTION_FAILED),
            ));
        }

        let transcription: TranscriptionResponse = response.json().await.map_err(|e| {
            upstream_failure(
                "Invalid transcription response",
                e,
                HomeError::transcription(TRANSCRIPTION_FAILED),
            )
        })?;

        debug!(
            language = transcription.language.as_deref().unwrap_or("unknown"),
            duration = transcription.duration.unwrap_or_default(),
            "Audio transcribed"
        );
        Ok(transcription.text)
    }

    async fn synthesize_speech(&self, text: &str) -> Result<Vec<u8>> {
        let url = self.config.endpoint("audio/speech")?;

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.config.speech_model,
                "input": text,
                "voice": self.config.speech_voice,
            }))
            .send()
            .await
            .map_err(|e| HomeError::speech(e.to_string()))?;

        if !response.status().is_success() {
            let body = Self::failure_body(response).await;
            return Err(HomeError::speech(body));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| HomeError::speech(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}
