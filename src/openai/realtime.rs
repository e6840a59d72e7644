//! Realtime session request

use crate::config::OpenAiConfig;
use crate::tools::schema;
use serde::Serialize;
use serde_json::Value;

/// Grounding rules given to the realtime model
pub const REALTIME_INSTRUCTIONS: &str = "Eres un asistente inteligente para el hogar (Smart Home). \
Tienes acceso a los dispositivos del usuario. \
Tu objetivo es controlar estos dispositivos y reportar su estado real. \
Habla español de manera concisa y amable.

IMPORTANTE:
1. NO alucines estados ni inventes dispositivos; si no conoces un estado o dispositivo, responde que no tienes datos y utiliza la herramienta get_devices para pedir la lista real.
2. Cuando te pidan cambiar algo (encender, apagar, brillo), usa control_device.
3. Si el usuario te saluda, saluda brevemente y espera ordenes.
4. Responde únicamente preguntas relacionadas con el hogar inteligente (Smart Home). Si el usuario pregunta algo ajeno, dile que solo puedes ayudar con lo relacionado al hogar inteligente y pide que reformule.
5. Todas tus respuestas deben limitarse a lo que puedas verificar usando las herramientas `get_devices` y `control_device`; si no puedes responder con ellas, indica que la consulta no está cubierta por el asistente.";

/// Server-side voice activity detection
#[derive(Debug, Clone, Serialize)]
pub struct TurnDetection {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub threshold: f32,
    pub prefix_padding_ms: u32,
    pub silence_duration_ms: u32,
}

impl Default for TurnDetection {
    fn default() -> Self {
        Self {
            kind: "server_vad",
            threshold: 0.5,
            prefix_padding_ms: 300,
            silence_duration_ms: 500,
        }
    }
}

/// Body of `POST realtime/sessions`
#[derive(Debug, Clone, Serialize)]
pub struct RealtimeSessionRequest {
    pub model: String,
    pub modalities: Vec<&'static str>,
    pub instructions: &'static str,
    pub voice: String,
    pub turn_detection: TurnDetection,
    pub tools: Vec<Value>,
}

impl RealtimeSessionRequest {
    pub fn from_config(config: &OpenAiConfig) -> Self {
        Self {
            model: config.realtime_model.clone(),
            modalities: vec!["audio", "text"],
            instructions: REALTIME_INSTRUCTIONS,
            voice: config.realtime_voice.clone(),
            turn_detection: TurnDetection::default(),
            tools: schema::realtime_tools(),
        }
    }
}
