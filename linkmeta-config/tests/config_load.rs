use linkmeta_config::{ExtractProfile, LinkmetaConfigLoader};
use serial_test::serial;
use std::{fs, path::PathBuf};
use tempfile::TempDir;

/// Helper to write a YAML file in a temp dir and return its path.
fn write_yaml(tmp: &TempDir, name: &str, yaml: &str) -> PathBuf {
    let p = tmp.path().join(name);
    fs::write(&p, yaml).expect("write yaml");
    p
}

#[test]
#[serial]
fn file_values_are_loaded() {
    let tmp = TempDir::new().unwrap();
    let p = write_yaml(
        &tmp,
        "linkmeta.yaml",
        r#"
fetch:
  timeout_secs: 30
  max_redirects: 0
extract:
  profile: extended
batch:
  concurrency: 4
logging:
  filter: "linkmeta_web=debug"
  format: json
  emit_stderr: true
"#,
    );

    let config = LinkmetaConfigLoader::new()
        .with_file(p)
        .load()
        .expect("load config");

    assert_eq!(config.fetch.timeout_secs, 30);
    assert_eq!(config.fetch.connect_timeout_secs, 5);
    assert_eq!(config.fetch.max_redirects, 0);
    assert_eq!(config.extract.profile, ExtractProfile::Extended);
    assert_eq!(config.batch.concurrency, 4);
    assert_eq!(config.logging.filter, "linkmeta_web=debug");
    assert_eq!(config.logging.format, "json");
    assert!(config.logging.emit_stderr);
}

#[test]
#[serial]
fn env_overrides_file() {
    let tmp = TempDir::new().unwrap();
    let p = write_yaml(
        &tmp,
        "linkmeta.yaml",
        "fetch:\n  timeout_secs: 30\nbatch:\n  concurrency: 4\n",
    );

    temp_env::with_vars(
        [
            ("LINKMETA__FETCH__TIMEOUT_SECS", Some("7")),
            ("LINKMETA__EXTRACT__PROFILE", Some("extended")),
        ],
        || {
            let config = LinkmetaConfigLoader::new()
                .with_file(&p)
                .load()
                .expect("load config");
            assert_eq!(config.fetch.timeout_secs, 7);
            assert_eq!(config.batch.concurrency, 4);
            assert_eq!(config.extract.profile, ExtractProfile::Extended);
        },
    );
}

#[test]
#[serial]
fn placeholders_expand_from_env() {
    let tmp = TempDir::new().unwrap();
    let p = write_yaml(
        &tmp,
        "linkmeta.yaml",
        "fetch:\n  user_agent: \"${PREVIEW_BOT_NAME}/1.0\"\nlogging:\n  dir: \"${PREVIEW_LOG_ROOT}/logs\"\n",
    );

    temp_env::with_vars(
        [
            ("PREVIEW_BOT_NAME", Some("cardbot")),
            ("PREVIEW_LOG_ROOT", Some("/var/tmp")),
        ],
        || {
            let config = LinkmetaConfigLoader::new().with_file(&p).load().unwrap();
            assert_eq!(config.fetch.user_agent.as_deref(), Some("cardbot/1.0"));
            assert_eq!(
                config.logging.dir,
                Some(PathBuf::from("/var/tmp/logs"))
            );
        },
    );
}

#[test]
#[serial]
fn missing_required_file_is_an_error() {
    let tmp = TempDir::new().unwrap();
    let result = LinkmetaConfigLoader::new()
        .with_file(tmp.path().join("absent.yaml"))
        .load();
    assert!(result.is_err());
}

#[test]
#[serial]
fn missing_optional_file_falls_back_to_defaults() {
    let tmp = TempDir::new().unwrap();
    let config = LinkmetaConfigLoader::new()
        .with_optional_file(tmp.path().join("absent.yaml"))
        .load()
        .expect("optional file may be absent");
    assert_eq!(config.fetch.timeout_secs, 15);
    assert_eq!(config.extract.profile, ExtractProfile::Standard);
}

#[test]
#[serial]
fn later_snippets_win() {
    let config = LinkmetaConfigLoader::new()
        .with_yaml_str("batch:\n  concurrency: 2")
        .with_yaml_str("batch:\n  concurrency: 16")
        .load()
        .unwrap();
    assert_eq!(config.batch.concurrency, 16);
}

#[test]
#[serial]
fn numeric_env_values_stay_strings_for_string_fields() {
    temp_env::with_vars(
        [
            ("LINKMETA__FETCH__USER_AGENT", Some("2024")),
            ("LINKMETA__LOGGING__FILTER", Some("3")),
            ("LINKMETA__FETCH__MAX_REDIRECTS", Some("0")),
            ("LINKMETA__LOGGING__EMIT_STDERR", Some("true")),
        ],
        || {
            let config = LinkmetaConfigLoader::new()
                .load()
                .expect("numeric-looking env values load");
            assert_eq!(config.fetch.user_agent.as_deref(), Some("2024"));
            assert_eq!(config.logging.filter, "3");
            assert_eq!(config.fetch.max_redirects, 0);
            assert!(config.logging.emit_stderr);
        },
    );
}
