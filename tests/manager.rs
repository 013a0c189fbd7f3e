// tests/manager.rs

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use overseer::config::{
    ExecutorConfig, GceMetadataWatcherConfig, GcpSecretsWatcherConfig, MetadataSource,
    WatcherConfig,
};
use overseer::engine::Manager;
use overseer::errors::OverseerError;
use overseer::exec::Executor;
use overseer::registry::Registry;
use overseer::watch::Watcher;
use overseer::Change;
use overseer_test_utils::builders::OverseerConfigBuilder;
use overseer_test_utils::fake_executor::{FailingExecutor, RecordingExecutor};
use overseer_test_utils::fake_watcher::ScriptedWatcher;
use overseer_test_utils::{init_tracing, wait_until, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

fn values(n: usize) -> Vec<Change> {
    (0..n).map(|i| Change::Value(format!("v{i}"))).collect()
}

/// Builtin registry whose `time` watcher is replaced by a fresh scripted
/// watcher per pipeline, emitting `count` values 20ms apart.
fn scripted_registry(count: usize) -> Registry {
    let mut registry = Registry::with_builtins();
    registry.register_watcher("time", move |_, _| {
        Ok(Arc::new(ScriptedWatcher::with_interval(
            values(count),
            Duration::from_millis(20),
        )) as Arc<dyn Watcher>)
    });
    registry
}

fn override_executor(registry: &mut Registry, kind: &str, executor: Arc<dyn Executor>) {
    registry.register_executor(kind, move |_, _| Ok(Arc::clone(&executor)));
}

#[tokio::test]
async fn unknown_component_fails_run() {
    init_tracing();

    let manager = Manager::new(vec![OverseerConfigBuilder::new("orphan").build()]);
    let err = manager.run(&Registry::empty()).unwrap_err();

    match err {
        OverseerError::UnknownComponent { component, kind } => {
            assert_eq!(component, "watcher");
            assert_eq!(kind, "time");
        }
        other => panic!("expected UnknownComponent, got {other:?}"),
    }

    with_timeout(manager.stop()).await;
}

#[tokio::test]
async fn failed_construction_starts_no_pipeline() -> TestResult {
    init_tracing();

    let shared_watcher = Arc::new(ScriptedWatcher::new(values(3)));
    let recording = Arc::new(RecordingExecutor::new());

    let mut registry = Registry::with_builtins();
    {
        let shared_watcher = Arc::clone(&shared_watcher);
        registry.register_watcher("time", move |_, _| {
            Ok(Arc::clone(&shared_watcher) as Arc<dyn Watcher>)
        });
    }
    override_executor(&mut registry, "log", recording.clone());
    registry.register_executor("command", |_, _| {
        Err(OverseerError::ConfigError("refusing to build".to_string()))
    });

    let manager = Manager::new(vec![
        OverseerConfigBuilder::new("healthy").build(),
        OverseerConfigBuilder::new("broken")
            .command_executor("true")
            .build(),
    ]);

    let err = manager.run(&registry).unwrap_err();
    assert!(matches!(err, OverseerError::ConfigError(_)), "{err:?}");

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(shared_watcher.sent(), 0, "no watcher may start");
    assert!(recording.received().is_empty());

    // Once every pipeline builds, the same manager can start.
    let mut fixed = scripted_registry(3);
    override_executor(&mut fixed, "log", recording.clone());
    override_executor(&mut fixed, "command", Arc::new(RecordingExecutor::new()));
    manager.run(&fixed)?;
    wait_until(|| recording.received().len() == 3).await;

    with_timeout(manager.stop()).await;
    Ok(())
}

#[tokio::test]
async fn failing_pipeline_leaves_siblings_running() -> TestResult {
    init_tracing();

    let failing = Arc::new(FailingExecutor::new());
    let recording = Arc::new(RecordingExecutor::new());

    let mut registry = scripted_registry(3);
    override_executor(&mut registry, "command", failing.clone());
    override_executor(&mut registry, "log", recording.clone());

    let manager = Manager::new(vec![
        OverseerConfigBuilder::new("failing")
            .command_executor("exit 1")
            .build(),
        OverseerConfigBuilder::new("healthy").build(),
    ]);
    manager.run(&registry)?;

    wait_until(|| failing.calls() == 3 && recording.completed() == 3).await;
    assert_eq!(recording.received(), values(3));

    with_timeout(manager.stop()).await;
    assert!(recording.was_stopped());
    Ok(())
}

#[tokio::test]
async fn stop_waits_for_every_pipeline_to_drain() -> TestResult {
    init_tracing();

    let slow = Arc::new(RecordingExecutor::with_delay(Duration::from_millis(250)));
    let mut registry = scripted_registry(2);
    override_executor(&mut registry, "log", slow.clone());

    let manager = Manager::new(vec![
        OverseerConfigBuilder::new("a").build(),
        OverseerConfigBuilder::new("b").build(),
    ]);
    manager.run(&registry)?;

    wait_until(|| slow.received().len() == 4).await;
    with_timeout(manager.stop()).await;

    assert_eq!(slow.completed(), 4, "stop returned before executions finished");
    Ok(())
}

#[tokio::test]
async fn run_is_rejected_when_running_or_stopped() -> TestResult {
    init_tracing();

    let registry = scripted_registry(0);
    let manager = Manager::new(vec![OverseerConfigBuilder::new("only").build()]);

    manager.run(&registry)?;
    assert!(matches!(
        manager.run(&registry),
        Err(OverseerError::AlreadyRunning)
    ));

    with_timeout(manager.stop()).await;
    assert!(matches!(
        manager.run(&registry),
        Err(OverseerError::AlreadyStopped)
    ));

    // Stopping again is harmless.
    with_timeout(manager.stop()).await;
    Ok(())
}

#[tokio::test]
async fn stop_without_run_returns() {
    init_tracing();

    let manager = Manager::new(vec![OverseerConfigBuilder::new("idle").build()]);
    with_timeout(manager.stop()).await;
}

#[tokio::test]
async fn builtin_registry_knows_every_component() -> TestResult {
    init_tracing();

    let registry = Registry::with_builtins();
    let debug = format!("{registry:?}");
    assert!(debug.contains(r#"watchers: ["file", "gce_metadata", "gcp_secrets", "time"]"#), "{debug}");
    assert!(debug.contains(r#"executors: ["command", "log"]"#), "{debug}");

    let metadata = WatcherConfig::GceMetadata(GceMetadataWatcherConfig {
        key: "attributes/flag".to_string(),
        source: MetadataSource::Project,
        recursive: false,
        metadata_url: "http://127.0.0.1:1/computeMetadata/v1".to_string(),
        metadata_error_wait_seconds: 1,
    });

    let configs = [
        OverseerConfigBuilder::new("time-log").build(),
        OverseerConfigBuilder::new("file-cmd")
            .file_watcher("/tmp/overseer-watched")
            .command_executor("true")
            .build(),
        OverseerConfigBuilder::new("metadata")
            .watcher(metadata)
            .build(),
        OverseerConfigBuilder::new("secrets")
            .watcher(WatcherConfig::GcpSecrets(GcpSecretsWatcherConfig::new(
                "my-project",
                "app-secret",
                "/etc/app/secret",
            )))
            .build(),
    ];

    for cfg in &configs {
        let pipeline = registry.build_pipeline(cfg)?;
        assert_eq!(pipeline.name, cfg.name());
        assert_eq!(pipeline.change_buffer, cfg.change_buffer());
    }
    Ok(())
}

#[tokio::test]
async fn registered_constructor_replaces_builtin() -> TestResult {
    init_tracing();

    let recording = Arc::new(RecordingExecutor::new());
    let mut registry = Registry::with_builtins();
    override_executor(&mut registry, "log", recording.clone());

    let executor = registry.build_executor("test", &ExecutorConfig::Log(Default::default()))?;
    executor.execute(Change::Value("hello".to_string())).await?;

    assert_eq!(recording.received(), vec![Change::Value("hello".to_string())]);
    Ok(())
}

#[tokio::test]
async fn unknown_executor_is_reported_as_such() {
    init_tracing();

    let mut registry = Registry::empty();
    registry.register_watcher("time", |_, _| {
        Ok(Arc::new(ScriptedWatcher::new(Vec::new())) as Arc<dyn Watcher>)
    });

    let err = registry
        .build_pipeline(&OverseerConfigBuilder::new("no-executor").build())
        .unwrap_err();

    assert!(
        matches!(
            &err,
            OverseerError::UnknownComponent { component: "executor", kind } if kind == "log"
        ),
        "{err:?}"
    );
}
