use ferrule::{DuplicateImplementationAction, ResolveOptions, UnregisteredResolutionAction};
use ferrule_base::{Config, ConfigSection, ContainerConfig, Tracing, TracingConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use tempfile::NamedTempFile;

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct ServerConfig {
    bind_addr: String,
    workers: u32,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct DatabaseConfig {
    host: String,
    #[serde(default)]
    port: u16,
    #[serde(default)]
    ssl: bool,
}

impl ConfigSection for DatabaseConfig {
    fn key() -> &'static str {
        "database"
    }
}

#[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
struct CacheConfig {
    enabled: bool,
    capacity: usize,
}

impl ConfigSection for CacheConfig {
    fn key() -> &'static str {
        "cache"
    }
}

#[test]
fn test_config_new() {
    let config = Config::new();
    assert!(config.is_empty());
    assert_eq!(config.len(), 0);
}

#[test]
fn test_config_set_and_get() {
    let mut config = Config::new();
    let server = ServerConfig {
        bind_addr: "127.0.0.1:8080".to_string(),
        workers: 2,
    };
    config.set("server", &server).unwrap();

    let retrieved: ServerConfig = config.get("server").unwrap();
    assert_eq!(retrieved, server);
    assert!(config.contains("server"));
}

#[test]
fn test_config_get_nonexistent() {
    let config = Config::new();
    let result: Option<String> = config.get("nonexistent").unwrap();
    assert_eq!(result, None);
}

#[test]
fn test_config_with() {
    let config = Config::new().with("port", 8080u16).unwrap();
    let port: u16 = config.get("port").unwrap();
    assert_eq!(port, 8080);
}

#[test]
fn test_config_parse_invalid_json() {
    assert!(Config::parse(r#"{ "invalid": json }"#).is_err());
}

#[test]
fn test_config_typed_section() {
    let config = Config::parse(
        r#"
    {
        "database": {
            "host": "localhost",
            "port": 5432
        }
    }
    "#,
    )
    .unwrap();

    let database: DatabaseConfig = config.section().unwrap();
    assert_eq!(database.host, "localhost");
    assert_eq!(database.port, 5432);
    assert!(!database.ssl);

    // Missing sections fall back to the section defaults.
    let cache: CacheConfig = config.section().unwrap();
    assert_eq!(cache, CacheConfig::default());
}

#[test]
fn test_config_missing_required_section_fails() {
    let config = Config::new();
    assert!(config.section::<DatabaseConfig>().is_err());
}

#[tokio::test]
async fn test_config_parse_file() {
    let temp_file = NamedTempFile::new().unwrap();
    fs::write(
        temp_file.path(),
        r#"{"server": {"bind_addr": "0.0.0.0:80", "workers": 4}}"#,
    )
    .unwrap();

    let config = Config::parse_file(temp_file.path()).await.unwrap();
    let server: ServerConfig = config.get("server").unwrap();
    assert_eq!(server.bind_addr, "0.0.0.0:80");
    assert_eq!(server.workers, 4);
}

#[tokio::test]
async fn test_config_parse_file_not_found() {
    assert!(Config::parse_file("nonexistent_file.json").await.is_err());
}

#[test]
fn test_config_merge() {
    let mut config = Config::parse(
        r#"
    {
        "database": {"host": "localhost", "port": 5432},
        "tags": ["web"],
        "name": "old"
    }
    "#,
    )
    .unwrap();
    let other = Config::parse(
        r#"
    {
        "database": {"ssl": true},
        "tags": ["monitoring"],
        "name": "new",
        "cache": {"enabled": true}
    }
    "#,
    )
    .unwrap();
    config.merge_from(other);

    let database: DatabaseConfig = config.section().unwrap();
    assert_eq!(database.host, "localhost");
    assert_eq!(database.port, 5432);
    assert!(database.ssl);

    let tags: Vec<String> = config.get("tags").unwrap();
    assert_eq!(tags, vec!["web", "monitoring"]);

    let name: String = config.get("name").unwrap();
    assert_eq!(name, "new");

    let cache: CacheConfig = config.section().unwrap();
    assert!(cache.enabled);
}

#[test]
fn test_config_serialization() {
    let config = Config::new().with("name", "app").unwrap();
    let serialized = serde_json::to_string(&config).unwrap();
    assert_eq!(serialized, r#"{"name":"app"}"#);

    let deserialized: Config = serde_json::from_str(&serialized).unwrap();
    let name: String = deserialized.get("name").unwrap();
    assert_eq!(name, "app");
}

#[test]
fn test_container_config_defaults() {
    let config: ContainerConfig = Config::new().section().unwrap();
    assert_eq!(config.resolve_options, ResolveOptions::DEFAULT);
    assert_eq!(
        config.duplicate_implementation_action,
        DuplicateImplementationAction::RegisterSingle
    );
    assert!(!config.auto_register);
    assert!(config.modules.is_empty());
}

#[test]
fn test_container_config_parse() {
    let config = Config::parse(
        r#"
    {
        "container": {
            "resolve_options": {
                "unregistered_resolution_action": "fail"
            },
            "duplicate_implementation_action": "register_multiple",
            "auto_register": true,
            "modules": ["app::services"]
        }
    }
    "#,
    )
    .unwrap();

    let container: ContainerConfig = config.section().unwrap();
    assert_eq!(
        container.resolve_options.unregistered_resolution_action,
        UnregisteredResolutionAction::Fail
    );
    assert_eq!(container.resolve_options, ResolveOptions::FAIL_UNREGISTERED_ONLY);
    assert_eq!(
        container.duplicate_implementation_action,
        DuplicateImplementationAction::RegisterMultiple
    );
    assert!(container.auto_register);
    assert_eq!(container.modules, vec!["app::services"]);
}

#[test]
fn test_tracing_config() {
    let config = Config::parse(r#"{"tracing": {"level": "WARN", "directives": ["ferrule=trace"]}}"#)
        .unwrap();
    let tracing: TracingConfig = config.section().unwrap();
    assert_eq!(tracing.level, tracing::Level::WARN);
    assert_eq!(tracing.directives, vec!["ferrule=trace"]);
    assert!(Tracing::env_filter(&tracing).is_ok());

    let serialized = serde_json::to_value(&tracing).unwrap();
    assert_eq!(serialized["level"], "WARN");

    let defaults: TracingConfig = Config::new().section().unwrap();
    assert_eq!(defaults.level, tracing::Level::DEBUG);
}

#[test]
fn test_tracing_invalid_directive() {
    let tracing = TracingConfig {
        directives: vec!["ferrule=notalevel".to_string()],
        ..Default::default()
    };
    assert!(Tracing::env_filter(&tracing).is_err());
}
