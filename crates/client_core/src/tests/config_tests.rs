use super::*;

use std::{
    env,
    time::{SystemTime, UNIX_EPOCH},
};

#[test]
fn derives_ws_scheme_from_http_scheme() {
    let mut settings = ClientSettings {
        server_url: "https://shop.example.com/".into(),
        ..ClientSettings::default()
    };
    assert_eq!(
        settings.ws_base_url().expect("wss"),
        "wss://shop.example.com/ws/chat"
    );

    settings.server_url = "http://127.0.0.1:9000".into();
    settings.ws_path = "ws/chat/".into();
    assert_eq!(
        settings.ws_base_url().expect("ws"),
        "ws://127.0.0.1:9000/ws/chat"
    );
}

#[test]
fn rejects_non_http_server_url() {
    let settings = ClientSettings {
        server_url: "ftp://example.com".into(),
        ..ClientSettings::default()
    };
    assert!(matches!(settings.ws_base_url(), Err(ChatError::Config(_))));
}

#[test]
fn api_base_joins_prefix_without_double_slash() {
    let settings = ClientSettings {
        server_url: "http://localhost:8080/".into(),
        api_prefix: "api/".into(),
        ..ClientSettings::default()
    };
    assert_eq!(settings.api_base_url(), "http://localhost:8080/api");
}

#[test]
fn file_values_are_applied_then_env_wins() {
    let mut settings = ClientSettings::default();
    apply_file_overrides(
        &mut settings,
        r#"
server_url = "http://file-host:1"
connect_timeout_ms = 750
store_url = "pottery"
"#,
    );
    assert_eq!(settings.server_url, "http://file-host:1");
    assert_eq!(settings.connect_timeout(), Duration::from_millis(750));
    assert_eq!(settings.store_url.as_deref(), Some("pottery"));

    apply_env_overrides(&mut settings, |key| match key {
        "APP__SERVER_URL" => Some("http://env-host:2".to_string()),
        "APP__CONNECT_TIMEOUT_MS" => Some("not-a-number".to_string()),
        _ => None,
    });
    assert_eq!(settings.server_url, "http://env-host:2");
    assert_eq!(settings.connect_timeout_ms, 750);
}

#[test]
fn malformed_file_keeps_defaults() {
    let mut settings = ClientSettings::default();
    apply_file_overrides(&mut settings, "server_url = [unterminated");
    assert_eq!(settings, ClientSettings::default());
}

#[test]
fn loads_settings_from_explicit_path() {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let path = env::temp_dir().join(format!("chat_client_settings_{suffix}.toml"));
    fs::write(&path, "ws_path = \"/live\"\n").expect("write settings");

    let settings = load_settings_from(&path);
    assert_eq!(settings.ws_path, "/live");

    fs::remove_file(path).expect("cleanup");
}
