// tests/error_handling.rs

use std::io::Write;

use procline::config::{StepAction, load_and_validate, load_from_path};
use procline::errors::ProclineError;
use tempfile::NamedTempFile;

fn session_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{contents}").unwrap();
    file
}

#[test]
fn test_valid_session_loads_with_defaults() {
    let file = session_file(
        r#"
[process]
command = "/bin/cat"

[[step]]
send = "uci"

[[step]]
expect = "uciok"
timeout_ms = 5000
"#,
    );

    let cfg = load_and_validate(file.path()).unwrap();
    assert_eq!(cfg.command.to_str(), Some("/bin/cat"));
    assert!(cfg.args.is_empty());
    assert_eq!(cfg.reader.buffer_size(), 1024);
    assert_eq!(cfg.steps.len(), 2);
    assert!(matches!(cfg.steps[1].action, StepAction::Expect(_)));
}

#[test]
fn test_missing_file_returns_io_error() {
    let result = load_and_validate("/nonexistent/procline/Procline.toml");
    match result {
        Err(ProclineError::IoError(e)) => assert_eq!(e.kind(), std::io::ErrorKind::NotFound),
        Err(e) => panic!("Expected IoError, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn test_malformed_toml_returns_toml_error() {
    let file = session_file("[process\ncommand = ");
    match load_from_path(file.path()) {
        Err(ProclineError::TomlError(_)) => {}
        Err(e) => panic!("Expected TomlError, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn test_unknown_step_key_returns_toml_error() {
    let file = session_file(
        r#"
[process]
command = "/bin/cat"

[[step]]
sned = "typo"
"#,
    );
    assert!(matches!(
        load_and_validate(file.path()),
        Err(ProclineError::TomlError(_))
    ));
}

#[test]
fn test_relative_command_returns_config_error() {
    let file = session_file(
        r#"
[process]
command = "cat"

[[step]]
read = true
"#,
    );

    match load_and_validate(file.path()) {
        Err(ProclineError::ConfigError(msg)) => {
            assert!(msg.contains("absolute"));
            assert!(msg.contains("cat"));
        }
        Err(e) => panic!("Expected ConfigError, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn test_step_without_action_returns_config_error() {
    let file = session_file(
        r#"
[process]
command = "/bin/cat"

[[step]]
timeout_ms = 100
"#,
    );

    match load_and_validate(file.path()) {
        Err(ProclineError::ConfigError(msg)) => assert!(msg.contains("exactly one")),
        Err(e) => panic!("Expected ConfigError, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}
