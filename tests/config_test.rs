//! Configuration loading from TOML files.

use daq_sequencer::config::SequencerConfig;
use daq_sequencer::{SequencerError, StopPolicy};
use std::io::Write;
use std::time::Duration;

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn test_file_overrides_defaults() {
    let file = write_config(
        r#"
[application]
log_level = "debug"

[engine]
stop_poll_interval_ms = 25
stop_max_polls = 40
results_dir = "data/results"

[demo]
points = 9
fail_at_point = 4
"#,
    );

    let config = SequencerConfig::load_from(file.path()).unwrap();
    config.validate().unwrap();

    assert_eq!(config.application.log_level, "debug");
    assert_eq!(config.application.log_format, "pretty");
    assert_eq!(
        config.engine.stop_policy(),
        StopPolicy {
            poll_interval: Duration::from_millis(25),
            max_polls: 40,
        }
    );
    assert_eq!(
        config.engine.results_dir.as_deref(),
        Some(std::path::Path::new("data/results"))
    );
    assert_eq!(config.engine.default_retry_count, 1);
    assert_eq!(config.demo.points, 9);
    assert_eq!(config.demo.fail_at_point, Some(4));
    assert_eq!(config.demo.samples_per_point, 20);
}

#[test]
fn test_invalid_values_fail_validation() {
    let file = write_config(
        r#"
[engine]
default_retry_count = 0
"#,
    );

    let config = SequencerConfig::load_from(file.path()).unwrap();
    match config.validate() {
        Err(SequencerError::InvalidConfig(msg)) => assert!(msg.contains("default_retry_count")),
        other => panic!("expected validation error, got {:?}", other),
    }
}

#[test]
fn test_wrong_type_is_a_load_error() {
    let file = write_config(
        r#"
[demo]
points = "many"
"#,
    );

    assert!(matches!(
        SequencerConfig::load_from(file.path()),
        Err(SequencerError::Config(_))
    ));
}

#[test]
fn test_shipped_config_is_valid() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/sequencer.toml");
    let config = SequencerConfig::load_from(path).unwrap();
    config.validate().unwrap();
    assert_eq!(config, SequencerConfig::default());
}
