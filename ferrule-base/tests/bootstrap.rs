use ferrule::{DependencyContainer, Injectable, ResolutionError, StdError};
use ferrule_base::{Bootstrap, BundleExt as _, Config};
use std::fs;
use std::sync::Arc;
use tempfile::NamedTempFile;

mod services {
    use ferrule::Injectable;
    use std::sync::Arc;

    pub trait Clock: Send + Sync {
        fn now(&self) -> u64;
    }

    #[derive(Injectable)]
    #[inject(implements(dyn Clock))]
    pub struct FixedClock;

    impl Clock for FixedClock {
        fn now(&self) -> u64 {
            42
        }
    }

    #[derive(Injectable)]
    pub struct Scheduler {
        pub clock: Arc<dyn Clock>,
    }
}

#[derive(Injectable)]
struct Unscanned;

fn greeting(container: &DependencyContainer) -> Result<(), StdError> {
    container.register_instance::<String, String>(Arc::new("hello".into()))?;
    Ok(())
}

#[test]
fn test_bootstrap_registers_config_and_bundles() {
    let config = Config::new().with("name", "app").unwrap();
    let container = Bootstrap::new(config).with_bundle(greeting).build().unwrap();

    assert_eq!(*container.resolve::<String>().unwrap(), "hello");
    let config = container.resolve::<Config>().unwrap();
    let name: String = config.get("name").unwrap();
    assert_eq!(name, "app");
}

#[test]
fn test_bootstrap_bundle_error() {
    let result = Bootstrap::new(Config::new())
        .with_bundle(greeting)
        .with_bundle(greeting)
        .build();
    assert!(result.is_err());
}

#[test]
fn test_bootstrap_applies_resolve_options() {
    let config = Config::parse(
        r#"{"container": {"resolve_options": {"unregistered_resolution_action": "fail"}}}"#,
    )
    .unwrap();
    let container = Bootstrap::new(config).build().unwrap();

    assert!(matches!(
        container.resolve::<Unscanned>(),
        Err(ResolutionError::Unresolvable { .. })
    ));
    // Children inherit the configured options.
    assert!(container.child_container().resolve::<Unscanned>().is_err());
}

#[test]
fn test_bootstrap_auto_registers_modules() {
    let config = Config::parse(
        r#"
    {
        "container": {
            "resolve_options": {"unregistered_resolution_action": "fail"},
            "auto_register": true,
            "modules": ["bootstrap::services"]
        }
    }
    "#,
    )
    .unwrap();
    let container = Bootstrap::new(config).build().unwrap();

    let scheduler = container.resolve::<services::Scheduler>().unwrap();
    assert_eq!(scheduler.clock.now(), 42);
    assert!(container.is_registered::<dyn services::Clock>(""));
    assert!(!container.is_registered::<Unscanned>(""));
}

#[tokio::test]
async fn test_bootstrap_from_file() {
    let temp_file = NamedTempFile::new().unwrap();
    fs::write(
        temp_file.path(),
        r#"{"tracing": {"level": "info"}, "container": {}}"#,
    )
    .unwrap();

    let bootstrap = Bootstrap::from_file(temp_file.path()).await.unwrap();
    assert!(bootstrap.config().contains("tracing"));
    let container = bootstrap.build().unwrap();
    assert!(container.can_resolve::<Config>());
}

#[test]
fn test_add_bundle() {
    let container = DependencyContainer::new();
    container
        .add_bundle(greeting)
        .unwrap()
        .add_bundle(|container: &DependencyContainer| -> Result<(), StdError> {
            container.register_instance::<u32, u32>(Arc::new(7))?;
            Ok(())
        })
        .unwrap();

    assert_eq!(*container.resolve::<String>().unwrap(), "hello");
    assert_eq!(*container.resolve::<u32>().unwrap(), 7);
}
