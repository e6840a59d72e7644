//! Layered configuration loading: file, `SMARTHOME__*` variables and the
//! `OPENAI_API_KEY` fallback

use pretty_assertions::assert_eq;
use serial_test::serial;
use smarthome_voice::config::{ScopeMode, ServerConfig};
use smarthome_voice::HomeError;
use std::time::Duration;
use temp_env::with_vars;

const CLEARED: [(&str, Option<&str>); 5] = [
    ("OPENAI_API_KEY", None),
    ("SMARTHOME__OPENAI__API_KEY", None),
    ("SMARTHOME__HTTP__PORT", None),
    ("SMARTHOME__ASSISTANT__MAX_TOOL_ROUNDS", None),
    ("SMARTHOME__ASSISTANT__SCOPE", None),
];

fn vars<'a>(set: &[(&'a str, Option<&'a str>)]) -> Vec<(&'a str, Option<&'a str>)> {
    let mut all: Vec<_> = CLEARED
        .iter()
        .filter(|(k, _)| !set.iter().any(|(s, _)| s == k))
        .copied()
        .collect();
    all.extend_from_slice(set);
    all
}

#[test]
#[serial]
fn test_defaults_without_environment() {
    with_vars(vars(&[]), || {
        let config = ServerConfig::load(None).unwrap();

        assert_eq!(config.http.port, 3001);
        assert_eq!(config.assistant.max_tool_rounds, 3);
        assert_eq!(config.assistant.scope, ScopeMode::Owner);
        assert!(config.openai.api_key.is_none());
        assert!(matches!(
            config.openai.require_api_key(),
            Err(HomeError::Config(_))
        ));
    });
}

#[test]
#[serial]
fn test_environment_overrides() {
    with_vars(
        vars(&[
            ("SMARTHOME__HTTP__PORT", Some("8088")),
            ("SMARTHOME__ASSISTANT__MAX_TOOL_ROUNDS", Some("5")),
            ("SMARTHOME__ASSISTANT__SCOPE", Some("global")),
        ]),
        || {
            let config = ServerConfig::load(None).unwrap();

            assert_eq!(config.http.port, 8088);
            assert_eq!(config.assistant.max_tool_rounds, 5);
            assert_eq!(config.assistant.scope, ScopeMode::Global);
        },
    );
}

#[test]
#[serial]
fn test_openai_api_key_fallback() {
    with_vars(vars(&[("OPENAI_API_KEY", Some("sk-env"))]), || {
        let config = ServerConfig::load(None).unwrap();
        assert_eq!(config.openai.require_api_key().unwrap(), "sk-env");
    });

    // The prefixed variable wins over the bare one
    with_vars(
        vars(&[
            ("OPENAI_API_KEY", Some("sk-env")),
            ("SMARTHOME__OPENAI__API_KEY", Some("sk-layered")),
        ]),
        || {
            let config = ServerConfig::load(None).unwrap();
            assert_eq!(config.openai.require_api_key().unwrap(), "sk-layered");
        },
    );
}

#[test]
#[serial]
fn test_invalid_values_rejected() {
    with_vars(
        vars(&[("SMARTHOME__ASSISTANT__MAX_TOOL_ROUNDS", Some("0"))]),
        || {
            let err = ServerConfig::load(None).unwrap_err();
            assert!(err.to_string().contains("max_tool_rounds"));
        },
    );

    with_vars(vars(&[("SMARTHOME__HTTP__PORT", Some("not-a-port"))]), || {
        assert!(matches!(ServerConfig::load(None), Err(HomeError::Config(_))));
    });
}

#[test]
#[serial]
fn test_file_layer_below_environment() {
    let path = std::env::temp_dir().join(format!(
        "smarthome-voice-config-{}.toml",
        uuid::Uuid::new_v4()
    ));
    std::fs::write(
        &path,
        r#"
[http]
port = 9000
public_url = "https://casa.example.com/"

[openai]
chat_model = "gpt-4o"
timeout = "15s"

[assistant]
speech_enabled = false
"#,
    )
    .unwrap();

    with_vars(vars(&[("SMARTHOME__HTTP__PORT", Some("9100"))]), || {
        let config = ServerConfig::load(Some(&path)).unwrap();

        assert_eq!(config.http.port, 9100);
        assert_eq!(config.http.public_url.as_str(), "https://casa.example.com/");
        assert_eq!(config.openai.chat_model, "gpt-4o");
        assert_eq!(config.openai.timeout, Duration::from_secs(15));
        assert!(!config.assistant.speech_enabled);
    });

    std::fs::remove_file(&path).ok();
}

#[test]
#[serial]
fn test_missing_file_is_error() {
    with_vars(vars(&[]), || {
        let missing = std::env::temp_dir().join("smarthome-voice-does-not-exist.toml");
        assert!(matches!(
            ServerConfig::load(Some(&missing)),
            Err(HomeError::Config(_))
        ));
    });
}
