//! OpenAI client tests against a wiremock server
//!
//! Verifies the realtime session contract (headers, body, failure mapping)
//! and the chat, transcription and speech calls.

use pretty_assertions::assert_eq;
use rstest::*;
use serde_json::{json, Value};
use smarthome_voice::config::{OpenAiConfig, ServerConfig};
use smarthome_voice::openai::{AssistantBackend, AudioClip, ChatMessage, OpenAiClient};
use smarthome_voice::tools::schema;
use smarthome_voice::HomeError;
use url::Url;
use wiremock::{
    matchers::{body_partial_json, header, method, path},
    Mock, MockServer, ResponseTemplate,
};

async fn client_for(server: &MockServer) -> OpenAiClient {
    let base = Url::parse(&format!("{}/v1/", server.uri())).unwrap();
    let config = ServerConfig::dev_mode(base, "sk-test");
    OpenAiClient::new(config.openai).unwrap()
}

#[fixture]
fn session_response() -> Value {
    json!({
        "id": "sess_123",
        "object": "realtime.session",
        "model": "gpt-realtime-mini-2025-10-06",
        "client_secret": { "value": "ek_abc", "expires_at": 1760000000 }
    })
}

#[rstest]
#[tokio::test]
async fn test_realtime_session_contract(session_response: Value) {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/realtime/sessions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(header("OpenAI-Beta", "realtime=v1"))
        .and(body_partial_json(json!({
            "model": "gpt-realtime-mini-2025-10-06",
            "modalities": ["audio", "text"],
            "voice": "verse",
            "turn_detection": {
                "type": "server_vad",
                "threshold": 0.5,
                "prefix_padding_ms": 300,
                "silence_duration_ms": 500
            },
            "tools": schema::realtime_tools()
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(session_response.clone()))
        .expect(1)
        .mount(&server)
        .await;

    let session = client_for(&server).await.create_realtime_session().await.unwrap();

    assert_eq!(session, session_response);
}

#[tokio::test]
async fn test_realtime_session_failure_is_generic() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/realtime/sessions"))
        .respond_with(ResponseTemplate::new(401).set_body_string("{\"error\":\"bad key\"}"))
        .expect(1)
        .mount(&server)
        .await;

    let err = client_for(&server)
        .await
        .create_realtime_session()
        .await
        .unwrap_err();

    match err {
        HomeError::UpstreamTransport(message) => {
            assert_eq!(message, "Failed to create OpenAI session")
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_chat_sends_tools_with_auto_choice() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({
            "model": "gpt-4o-mini",
            "tool_choice": "auto",
            "messages": [{ "role": "user", "content": "Hola" }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "chatcmpl-1",
            "choices": [{
                "index": 0,
                "finish_reason": "tool_calls",
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": { "name": "get_devices", "arguments": "{}" }
                    }]
                }
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let tools = schema::chat_tools();
    let reply = client_for(&server)
        .await
        .chat(&[ChatMessage::user("Hola")], Some(tools.as_slice()))
        .await
        .unwrap();

    assert_eq!(reply.tool_calls.len(), 1);
    assert_eq!(reply.tool_calls[0].function.name, "get_devices");
}

#[tokio::test]
async fn test_chat_without_tools_omits_tool_choice() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "role": "assistant", "content": "Listo." } }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let reply = client
        .chat(&[ChatMessage::user("Hola")], None)
        .await
        .unwrap();
    assert_eq!(reply.text_content(), Some("Listo."));

    let requests = server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert!(body.get("tools").is_none());
    assert!(body.get("tool_choice").is_none());
}

#[tokio::test]
async fn test_transcription_uses_verbose_json() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/audio/transcriptions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "task": "transcribe",
            "language": "spanish",
            "duration": 1.5,
            "text": "Apaga la cocina"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let text = client_for(&server)
        .await
        .transcribe(&AudioClip::new(b"RIFF".to_vec(), "wav"))
        .await
        .unwrap();
    assert_eq!(text, "Apaga la cocina");

    let requests = server.received_requests().await.unwrap();
    let body = String::from_utf8_lossy(&requests[0].body);
    assert!(body.contains("verbose_json"));
    assert!(body.contains("whisper-1"));
    assert!(body.contains("command.wav"));
}

#[tokio::test]
async fn test_speech_returns_audio_bytes() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/audio/speech"))
        .and(body_partial_json(json!({
            "model": "tts-1",
            "voice": "nova",
            "input": "Hecho."
        })))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ID3audio".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let audio = client_for(&server)
        .await
        .synthesize_speech("Hecho.")
        .await
        .unwrap();
    assert_eq!(audio, b"ID3audio".to_vec());
}

#[tokio::test]
async fn test_speech_failure_is_speech_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/audio/speech"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .await
        .synthesize_speech("Hecho.")
        .await
        .unwrap_err();
    assert!(matches!(err, HomeError::SpeechSynthesis(_)));
}

#[test]
fn test_client_requires_api_key() {
    let err = OpenAiClient::new(OpenAiConfig::default()).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Configuration error: OpenAI API key is not configured."
    );
}

#[tokio::test]
async fn test_unreachable_upstream_is_generic() {
    // Nothing listens on port 1
    let base = Url::parse("http://127.0.0.1:1/v1/").unwrap();
    let client = OpenAiClient::new(ServerConfig::dev_mode(base, "sk-test").openai).unwrap();

    let err = client.create_realtime_session().await.unwrap_err();
    match err {
        HomeError::UpstreamTransport(message) => {
            assert_eq!(message, "Failed to create OpenAI session")
        }
        other => panic!("unexpected error: {other}"),
    }

    let err = client
        .chat(&[ChatMessage::user("Hola")], None)
        .await
        .unwrap_err();
    assert!(!err.to_string().contains("127.0.0.1"));
    assert!(matches!(err, HomeError::UpstreamTransport(_)));

    let err = client
        .transcribe(&AudioClip::new(b"RIFF".to_vec(), "wav"))
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Transcription failed: Audio transcription request failed"
    );
}

#[tokio::test]
async fn test_malformed_session_body_is_generic() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/realtime/sessions"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .await
        .create_realtime_session()
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        HomeError::UpstreamTransport(ref message) if message == "Failed to create OpenAI session"
    ));
}
