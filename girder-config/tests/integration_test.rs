//! Integration tests for girder-config

use girder_config::*;
use std::fs;
use std::path::PathBuf;

fn scratch(name: &str, content: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("girder-config-{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_layers_apply_in_order() {
    let file = scratch(
        "layers.toml",
        r#"
            host = "127.0.0.1"
            port = 7000
            body_limit = 1024

            [log]
            level = "debug"
        "#,
    );
    let dotenv = scratch("layers.env", "GIRDER_PORT=7001\nGIRDER_LOG__FORMAT=pretty\n");

    let loader = ConfigLoader::new()
        .file(&file)
        .dotenv(&dotenv)
        .env_source(EnvSource::Fixed(vec![("GIRDER_PORT".into(), "7002".into())]));
    let config = ServerConfig::load_with(&loader).unwrap();

    assert_eq!(config.host, "127.0.0.1");
    assert_eq!(config.body_limit, 1024);
    assert_eq!(config.log.level, "debug");
    assert_eq!(config.log.format, "pretty");
    // the environment beats .env, which beats the file
    assert_eq!(config.port, 7002);
    assert_eq!(config.request_id_header, "x-request-id");
}

#[test]
fn test_custom_prefix() {
    let loader = ConfigLoader::new()
        .with_prefix("shop")
        .env_source(EnvSource::Fixed(vec![
            ("SHOP_PORT".into(), "8181".into()),
            ("GIRDER_PORT".into(), "1".into()),
        ]));
    let config = ServerConfig::load_with(&loader).unwrap();
    assert_eq!(config.port, 8181);
}

#[test]
fn test_without_env_ignores_dotenv() {
    let dotenv = scratch("ignored.env", "GIRDER_PORT=1234\n");
    let loader = ConfigLoader::new().dotenv(dotenv).without_env();
    let config = ServerConfig::load_with(&loader).unwrap();
    assert_eq!(config, ServerConfig::default());
}

#[test]
fn test_missing_file_is_a_load_error() {
    let loader = ConfigLoader::new().file("/no/such/girder.toml").without_env();
    assert!(matches!(
        ServerConfig::load_with(&loader),
        Err(ConfigError::LoadError(_))
    ));
}

#[test]
fn test_applies_to_application_builder() {
    let config = ServerConfig {
        request_id_header: "x-trace".into(),
        ..Default::default()
    };
    let container = girder_core::RegistryBuilder::new().build().unwrap();
    let app = config.apply(girder_core::Application::builder(container)).build().unwrap();
    assert_eq!(app.dispatcher().request_id_header(), "x-trace");
}
