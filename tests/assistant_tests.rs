//! Conversation orchestrator tests against the scripted mock backend

use pretty_assertions::assert_eq;
use rstest::*;
use serde_json::{json, Value};
use smarthome_voice::assistant::{CommandInput, VoiceAssistant, SYSTEM_PROMPT};
use smarthome_voice::config::{AssistantConfig, ScopeMode};
use smarthome_voice::mock::MockAssistantBackend;
use smarthome_voice::openai::{AudioClip, ChatToolCall, Role};
use smarthome_voice::registry::{DeviceRegistry, DeviceStatus};
use smarthome_voice::tools::ToolDispatcher;
use smarthome_voice::HomeError;
use std::sync::Arc;

mod common;
use common::{seeded_registry, OWNER};

fn assistant(
    registry: &DeviceRegistry,
    backend: &Arc<MockAssistantBackend>,
    config: AssistantConfig,
) -> VoiceAssistant {
    VoiceAssistant::new(
        backend.clone(),
        ToolDispatcher::new(registry.clone()),
        config,
    )
}

fn tool_content(content: &Option<String>) -> Value {
    serde_json::from_str(content.as_deref().unwrap_or("null")).unwrap()
}

#[rstest]
#[tokio::test]
async fn test_plain_answer_without_tools(#[future] seeded_registry: DeviceRegistry) {
    let registry = seeded_registry.await;
    let backend = Arc::new(MockAssistantBackend::new().reply_text("¡Hola! ¿En qué te ayudo?"));
    let assistant = assistant(&registry, &backend, AssistantConfig::default());

    let reply = assistant
        .process_command(OWNER, CommandInput::text("Hola"))
        .await
        .unwrap();

    assert_eq!(reply.text.as_deref(), Some("¡Hola! ¿En qué te ayudo?"));
    assert_eq!(reply.transcript, "Hola");
    assert_eq!(reply.audio.as_deref(), Some("bXAz"));

    let chats = backend.chats();
    assert_eq!(chats.len(), 1);
    assert!(chats[0].with_tools);
    assert_eq!(chats[0].messages[0].content.as_deref(), Some(SYSTEM_PROMPT));
    assert_eq!(chats[0].messages[1].role, Role::User);
    assert_eq!(backend.spoken(), vec!["¡Hola! ¿En qué te ayudo?".to_string()]);
}

#[rstest]
#[tokio::test]
async fn test_tool_round_trip(#[future] seeded_registry: DeviceRegistry) {
    let registry = seeded_registry.await;
    let backend = Arc::new(
        MockAssistantBackend::new()
            .reply_tool_call(
                "call_1",
                "control_device",
                json!({ "device_name": "luz sala", "action": "set_brightness", "brightness": 80 }),
            )
            .reply_text("Listo, la luz de la sala está al 80%."),
    );
    let assistant = assistant(&registry, &backend, AssistantConfig::default());

    let reply = assistant
        .process_command(OWNER, CommandInput::text("Pon la luz de la sala al 80"))
        .await
        .unwrap();

    assert_eq!(reply.text.as_deref(), Some("Listo, la luz de la sala está al 80%."));
    let device = registry.device(1).await.unwrap();
    assert_eq!(device.brightness, 80);
    assert_eq!(device.status, DeviceStatus::On);

    let chats = backend.chats();
    assert_eq!(chats.len(), 2);
    let second = &chats[1].messages;
    assert_eq!(second.len(), 4);
    assert_eq!(second[2].role, Role::Assistant);
    assert_eq!(second[2].tool_calls[0].id, "call_1");
    assert_eq!(second[3].role, Role::Tool);
    assert_eq!(second[3].tool_call_id.as_deref(), Some("call_1"));
    assert_eq!(
        tool_content(&second[3].content),
        json!({
            "success": true,
            "message": "Dispositivo 'Luz Sala' actualizado.",
            "device_state": { "status": "on", "brightness": 80 }
        })
    );
}

#[rstest]
#[tokio::test]
async fn test_tool_calls_run_in_order_with_errors_appended(
    #[future] seeded_registry: DeviceRegistry,
) {
    let registry = seeded_registry.await;
    let backend = Arc::new(
        MockAssistantBackend::new()
            .reply_tool_calls(vec![
                ChatToolCall::function("a", "control_device", r#"{"device_name":"Garaje","action":"turn_on"}"#),
                ChatToolCall::function("b", "open_garage", "{}"),
                ChatToolCall::function("c", "control_device", "{broken"),
                ChatToolCall::function("d", "get_devices", ""),
            ])
            .reply_text("No encontré el garaje."),
    );
    let assistant = assistant(&registry, &backend, AssistantConfig::default());

    assistant
        .process_command(OWNER, CommandInput::text("Abre el garaje"))
        .await
        .unwrap();

    let messages = &backend.chats()[1].messages;
    let tool_messages: Vec<_> = messages.iter().filter(|m| m.role == Role::Tool).collect();
    let ids: Vec<_> = tool_messages
        .iter()
        .map(|m| m.tool_call_id.clone().unwrap())
        .collect();
    assert_eq!(ids, vec!["a", "b", "c", "d"]);

    assert_eq!(
        tool_content(&tool_messages[0].content),
        json!({ "error": "No encontré ningún dispositivo llamado 'Garaje'." })
    );
    assert_eq!(
        tool_content(&tool_messages[1].content),
        json!({ "error": "Función desconocida" })
    );
    assert!(tool_content(&tool_messages[2].content)["error"]
        .as_str()
        .unwrap()
        .starts_with("Argumentos inválidos para 'control_device'"));
    assert_eq!(
        tool_content(&tool_messages[3].content).as_array().unwrap().len(),
        4
    );
}

#[rstest]
#[case(1)]
#[case(3)]
#[tokio::test]
async fn test_tool_loop_is_bounded(
    #[future] seeded_registry: DeviceRegistry,
    #[case] max_tool_rounds: usize,
) {
    let registry = seeded_registry.await;
    let mut backend = MockAssistantBackend::new();
    for round in 0..max_tool_rounds {
        backend = backend.reply_tool_call(&format!("call_{round}"), "get_devices", json!({}));
    }
    let backend = Arc::new(backend.reply_text("Tienes cuatro dispositivos."));
    let config = AssistantConfig {
        max_tool_rounds,
        ..Default::default()
    };
    let assistant = assistant(&registry, &backend, config);

    let reply = assistant
        .process_command(OWNER, CommandInput::text("¿Qué dispositivos tengo?"))
        .await
        .unwrap();

    assert_eq!(reply.text.as_deref(), Some("Tienes cuatro dispositivos."));
    let chats = backend.chats();
    assert_eq!(chats.len(), max_tool_rounds + 1);
    assert!(chats[..max_tool_rounds].iter().all(|c| c.with_tools));
    assert!(!chats[max_tool_rounds].with_tools);
}

#[rstest]
#[tokio::test]
async fn test_empty_forced_answer_yields_no_text(#[future] seeded_registry: DeviceRegistry) {
    let registry = seeded_registry.await;
    let backend = Arc::new(
        MockAssistantBackend::new()
            .reply_tool_call("call_1", "get_devices", json!({}))
            .reply_text("   "),
    );
    let config = AssistantConfig {
        max_tool_rounds: 1,
        ..Default::default()
    };
    let assistant = assistant(&registry, &backend, config);

    let reply = assistant
        .process_command(OWNER, CommandInput::text("Estado"))
        .await
        .unwrap();

    assert_eq!(reply.text, None);
    assert_eq!(reply.audio, None);
    assert!(backend.spoken().is_empty());
}

#[rstest]
#[tokio::test]
async fn test_speech_failure_keeps_text(#[future] seeded_registry: DeviceRegistry) {
    let registry = seeded_registry.await;
    let backend = Arc::new(
        MockAssistantBackend::new()
            .with_failing_speech()
            .reply_text("Hecho."),
    );
    let assistant = assistant(&registry, &backend, AssistantConfig::default());

    let reply = assistant
        .process_command(OWNER, CommandInput::text("Apaga todo"))
        .await
        .unwrap();

    assert_eq!(reply.text.as_deref(), Some("Hecho."));
    assert_eq!(reply.audio, None);
}

#[rstest]
#[tokio::test]
async fn test_speech_can_be_disabled(#[future] seeded_registry: DeviceRegistry) {
    let registry = seeded_registry.await;
    let backend = Arc::new(MockAssistantBackend::new().reply_text("Hecho."));
    let config = AssistantConfig {
        speech_enabled: false,
        ..Default::default()
    };
    let assistant = assistant(&registry, &backend, config);

    let reply = assistant
        .process_command(OWNER, CommandInput::text("Hola"))
        .await
        .unwrap();

    assert_eq!(reply.audio, None);
    assert!(backend.spoken().is_empty());
}

#[rstest]
#[tokio::test]
async fn test_audio_is_transcribed_first(#[future] seeded_registry: DeviceRegistry) {
    let registry = seeded_registry.await;
    let backend = Arc::new(
        MockAssistantBackend::new()
            .with_transcript("Enciende la bomba")
            .reply_text("Encendida."),
    );
    let assistant = assistant(&registry, &backend, AssistantConfig::default());

    let reply = assistant
        .process_command(
            OWNER,
            CommandInput {
                text: Some("ignored".to_string()),
                audio: Some(AudioClip::new(vec![0u8; 16], "webm")),
            },
        )
        .await
        .unwrap();

    assert_eq!(reply.transcript, "Enciende la bomba");
    assert_eq!(
        backend.chats()[0].messages[1].content.as_deref(),
        Some("Enciende la bomba")
    );
}

#[rstest]
#[tokio::test]
async fn test_transcription_failure_fails_turn(#[future] seeded_registry: DeviceRegistry) {
    let registry = seeded_registry.await;
    let backend = Arc::new(MockAssistantBackend::new().reply_text("unused"));
    let assistant = assistant(&registry, &backend, AssistantConfig::default());

    let err = assistant
        .process_command(OWNER, CommandInput::audio(AudioClip::new(vec![1], "wav")))
        .await
        .unwrap_err();

    assert!(matches!(err, HomeError::Transcription(_)));
    assert!(backend.chats().is_empty());
}

#[rstest]
#[tokio::test]
async fn test_global_scope_reaches_other_users(#[future] seeded_registry: DeviceRegistry) {
    let registry = seeded_registry.await;
    let backend = Arc::new(
        MockAssistantBackend::new()
            .reply_tool_call(
                "call_1",
                "control_device",
                json!({ "device_name": "Luz Vecino", "action": "turn_on" }),
            )
            .reply_text("Encendida."),
    );
    let config = AssistantConfig {
        scope: ScopeMode::Global,
        ..Default::default()
    };
    let assistant = assistant(&registry, &backend, config);

    assistant
        .process_command(OWNER, CommandInput::text("Enciende la luz del vecino"))
        .await
        .unwrap();

    assert_eq!(registry.device(5).await.unwrap().status, DeviceStatus::On);
}

#[tokio::test]
async fn test_blank_input_rejected() {
    let backend = Arc::new(MockAssistantBackend::new());
    let assistant = assistant(&DeviceRegistry::new(), &backend, AssistantConfig::default());

    let err = assistant
        .process_command(OWNER, CommandInput::text("  "))
        .await
        .unwrap_err();

    assert!(matches!(err, HomeError::InvalidInput(_)));
}
