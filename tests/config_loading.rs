// tests/config_loading.rs

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use overseer::config::{
    load_and_validate, load_dir, CommandExecutorConfig, ExecutorConfig, FileWatcherConfig,
    GceMetadataWatcherConfig, GcpSecretsWatcherConfig, LogExecutorConfig, MetadataSource,
    TimeWatcherConfig, WatcherConfig, DEFAULT_CHANGE_BUFFER, DEFAULT_METADATA_URL,
    DEFAULT_SECRET_MANAGER_URL, DEFAULT_SHELL,
};
use overseer::errors::OverseerError;

fn yaml_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::with_suffix(".yaml").unwrap();
    write!(file, "{contents}").unwrap();
    file
}

fn write(dir: &Path, rel: &str, contents: &str) -> PathBuf {
    let path = dir.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, contents).unwrap();
    path
}

fn pipeline_yaml(name: &str) -> String {
    format!(
        r#"
name: {name}
watcher:
  type: time
  config: {{}}
executor:
  type: log
  config: {{}}
"#
    )
}

fn expect_config_error(result: Result<impl std::fmt::Debug, OverseerError>, needle: &str) {
    match result {
        Err(OverseerError::ConfigError(msg)) => {
            assert!(msg.contains(needle), "'{msg}' should mention '{needle}'");
        }
        Err(e) => panic!("Expected ConfigError, got: {:?}", e),
        Ok(v) => panic!("Expected error, got Ok({:?})", v),
    }
}

#[test]
fn test_defaults_are_applied() {
    let file = yaml_file(
        r#"
name: rollout-secrets
watcher:
  type: gce_metadata
  config:
    key: attributes/app-secret
executor:
  type: command
  config:
    command: install -m 600 "$OVERSEER_DATA" /etc/app/secret
"#,
    );

    let cfg = load_and_validate(file.path()).unwrap();

    assert_eq!(cfg.name(), "rollout-secrets");
    assert_eq!(cfg.change_buffer(), DEFAULT_CHANGE_BUFFER);
    assert_eq!(
        cfg.watcher(),
        &WatcherConfig::GceMetadata(GceMetadataWatcherConfig {
            key: "attributes/app-secret".to_string(),
            source: MetadataSource::Instance,
            recursive: false,
            metadata_url: DEFAULT_METADATA_URL.to_string(),
            metadata_error_wait_seconds: 1,
        })
    );
    assert_eq!(
        cfg.executor(),
        &ExecutorConfig::Command(CommandExecutorConfig {
            command: r#"install -m 600 "$OVERSEER_DATA" /etc/app/secret"#.to_string(),
            shell: DEFAULT_SHELL.to_string(),
            work_dir: std::env::temp_dir(),
            persist_data: false,
        })
    );
}

#[test]
fn test_empty_config_section_uses_defaults() {
    let file = yaml_file(&pipeline_yaml("ticker"));

    let cfg = load_and_validate(file.path()).unwrap();

    assert_eq!(
        cfg.watcher(),
        &WatcherConfig::Time(TimeWatcherConfig { poll_seconds: 1 })
    );
    assert_eq!(
        cfg.executor(),
        &ExecutorConfig::Log(LogExecutorConfig::default())
    );
}

#[test]
fn test_every_field_can_be_set() {
    let file = yaml_file(
        r#"
name: watch-file
change_buffer: 7
watcher:
  type: file
  config:
    path: /etc/app/config.yaml
    poll_seconds: 30
executor:
  type: command
  config:
    command: systemctl reload app
    shell: /bin/bash -c
    work_dir: /var/lib/overseer
    persist_data: true
"#,
    );

    let cfg = load_and_validate(file.path()).unwrap();

    assert_eq!(cfg.change_buffer(), 7);
    assert_eq!(
        cfg.watcher(),
        &WatcherConfig::File(FileWatcherConfig {
            path: PathBuf::from("/etc/app/config.yaml"),
            poll_seconds: 30,
        })
    );
    assert_eq!(
        cfg.executor(),
        &ExecutorConfig::Command(CommandExecutorConfig {
            command: "systemctl reload app".to_string(),
            shell: "/bin/bash -c".to_string(),
            work_dir: PathBuf::from("/var/lib/overseer"),
            persist_data: true,
        })
    );
}

#[test]
fn test_project_source_and_recursive() {
    let file = yaml_file(
        r#"
name: project-attrs
watcher:
  type: gce_metadata
  config:
    key: attributes
    source: project
    recursive: true
    metadata_url: http://localhost:8888/computeMetadata/v1
    metadata_error_wait_seconds: 5
executor:
  type: log
  config:
    tag: attrs
"#,
    );

    let cfg = load_and_validate(file.path()).unwrap();

    match cfg.watcher() {
        WatcherConfig::GceMetadata(c) => {
            assert_eq!(c.source, MetadataSource::Project);
            assert!(c.recursive);
            assert_eq!(c.metadata_url, "http://localhost:8888/computeMetadata/v1");
            assert_eq!(c.metadata_error_wait_seconds, 5);
        }
        other => panic!("unexpected watcher {other:?}"),
    }
    assert_eq!(
        cfg.executor(),
        &ExecutorConfig::Log(LogExecutorConfig {
            tag: "attrs".to_string()
        })
    );
}

#[test]
fn test_gcp_secrets_defaults_and_overrides() {
    let file = yaml_file(
        r#"
name: db-password
watcher:
  type: gcp_secrets
  config:
    project_id: my-project
    secret_name: db-password
    secrets_file_path: /etc/app/db-password
executor:
  type: log
  config: {}
"#,
    );

    let cfg = load_and_validate(file.path()).unwrap();
    assert_eq!(
        cfg.watcher(),
        &WatcherConfig::GcpSecrets(GcpSecretsWatcherConfig {
            project_id: "my-project".to_string(),
            secret_name: "db-password".to_string(),
            credentials_file: None,
            check_interval_seconds: 60,
            secret_error_wait_seconds: 5,
            secrets_file_path: PathBuf::from("/etc/app/db-password"),
            secret_manager_url: DEFAULT_SECRET_MANAGER_URL.to_string(),
            metadata_url: DEFAULT_METADATA_URL.to_string(),
        })
    );

    let file = yaml_file(
        r#"
name: db-password
watcher:
  type: gcp_secrets
  config:
    project_id: my-project
    secret_name: db-password
    secrets_file_path: /etc/app/db-password
    credentials_file: /etc/overseer/adc.json
    check_interval_seconds: 300
    secret_error_wait_seconds: 10
executor:
  type: log
  config: {}
"#,
    );

    match load_and_validate(file.path()).unwrap().watcher() {
        WatcherConfig::GcpSecrets(c) => {
            assert_eq!(c.credentials_file, Some(PathBuf::from("/etc/overseer/adc.json")));
            assert_eq!(c.check_interval_seconds, 300);
            assert_eq!(c.secret_error_wait_seconds, 10);
        }
        other => panic!("unexpected watcher {other:?}"),
    }
}

#[test]
fn test_unknown_watcher_type_is_rejected() {
    let file = yaml_file(
        r#"
name: bogus
watcher:
  type: inotify
  config: {}
executor:
  type: log
  config: {}
"#,
    );

    let path = file.path().display().to_string();
    expect_config_error(load_and_validate(file.path()), &path);
}

#[test]
fn test_unknown_field_is_rejected() {
    let file = yaml_file(
        r#"
name: typo
watcher:
  type: time
  config:
    poll_secs: 3
executor:
  type: log
  config: {}
"#,
    );

    expect_config_error(load_and_validate(file.path()), "poll_secs");
}

#[test]
fn test_missing_executor_is_rejected() {
    let file = yaml_file(
        r#"
name: half
watcher:
  type: time
  config: {}
"#,
    );

    expect_config_error(load_and_validate(file.path()), "executor");
}

#[test]
fn test_invalid_values_are_rejected() {
    let cases = [
        (
            r#"
name: zero-buffer
change_buffer: 0
watcher: { type: time, config: {} }
executor: { type: log, config: {} }
"#,
            "change_buffer",
        ),
        (
            r#"
name: ""
watcher: { type: time, config: {} }
executor: { type: log, config: {} }
"#,
            "name",
        ),
        (
            r#"
name: zero-poll
watcher: { type: time, config: { poll_seconds: 0 } }
executor: { type: log, config: {} }
"#,
            "poll_seconds",
        ),
        (
            r#"
name: empty-key
watcher: { type: gce_metadata, config: { key: "" } }
executor: { type: log, config: {} }
"#,
            "key",
        ),
        (
            r#"
name: no-wait
watcher: { type: gce_metadata, config: { key: a, metadata_error_wait_seconds: 0 } }
executor: { type: log, config: {} }
"#,
            "metadata_error_wait_seconds",
        ),
        (
            r#"
name: no-secret
watcher: { type: gcp_secrets, config: { project_id: p, secret_name: "", secrets_file_path: /tmp/s } }
executor: { type: log, config: {} }
"#,
            "secret_name",
        ),
        (
            r#"
name: no-project
watcher: { type: gcp_secrets, config: { project_id: " ", secret_name: s, secrets_file_path: /tmp/s } }
executor: { type: log, config: {} }
"#,
            "project_id",
        ),
        (
            r#"
name: no-destination
watcher: { type: gcp_secrets, config: { project_id: p, secret_name: s } }
executor: { type: log, config: {} }
"#,
            "secrets_file_path",
        ),
        (
            r#"
name: zero-interval
watcher: { type: gcp_secrets, config: { project_id: p, secret_name: s, secrets_file_path: /tmp/s, check_interval_seconds: 0 } }
executor: { type: log, config: {} }
"#,
            "check_interval_seconds",
        ),
        (
            r#"
name: zero-error-wait
watcher: { type: gcp_secrets, config: { project_id: p, secret_name: s, secrets_file_path: /tmp/s, secret_error_wait_seconds: 0 } }
executor: { type: log, config: {} }
"#,
            "secret_error_wait_seconds",
        ),
        (
            r#"
name: blank-command
watcher: { type: time, config: {} }
executor: { type: command, config: { command: "  " } }
"#,
            "command",
        ),
        (
            r#"
name: blank-shell
watcher: { type: time, config: {} }
executor: { type: command, config: { command: "true", shell: "" } }
"#,
            "shell",
        ),
    ];

    for (yaml, needle) in cases {
        let file = yaml_file(yaml);
        expect_config_error(load_and_validate(file.path()), needle);
    }
}

#[test]
fn test_load_dir_reads_nested_yaml_and_yml_in_order() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "b.yaml", &pipeline_yaml("b"));
    write(dir.path(), "a.yml", &pipeline_yaml("a"));
    write(dir.path(), "nested/deeper/c.yaml", &pipeline_yaml("c"));
    write(dir.path(), "README.md", "not a pipeline");
    write(dir.path(), "disabled.yaml.bak", &pipeline_yaml("ignored"));

    let configs = load_dir(dir.path()).unwrap();
    let names: Vec<&str> = configs.iter().map(|c| c.name()).collect();

    assert_eq!(names, vec!["a", "b", "c"]);
}

#[test]
fn test_load_dir_rejects_duplicate_names() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "one.yaml", &pipeline_yaml("same"));
    write(dir.path(), "two.yaml", &pipeline_yaml("same"));

    expect_config_error(load_dir(dir.path()), "duplicate overseer name 'same'");
}

#[test]
fn test_load_dir_rejects_empty_directory() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "notes.txt", "nothing to see");

    expect_config_error(load_dir(dir.path()), "no .yaml or .yml files");
}

#[test]
fn test_load_dir_fails_on_first_invalid_file() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "good.yaml", &pipeline_yaml("good"));
    let bad = write(dir.path(), "bad.yaml", "name: [not, a, string]\n");

    expect_config_error(load_dir(dir.path()), &bad.display().to_string());
}

#[test]
fn test_missing_directory_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = load_dir(dir.path().join("nope"));

    assert!(matches!(result, Err(OverseerError::IoError(_))));
}
