//! Unit tests for the application error type.

use agent_console::AppError;

#[test]
fn display_prefixes_identify_the_failure_domain() {
    assert_eq!(
        AppError::Config("bad value".into()).to_string(),
        "config: bad value"
    );
    assert_eq!(
        AppError::Resolution("claude not on PATH".into()).to_string(),
        "resolution: claude not on PATH"
    );
    assert_eq!(
        AppError::NotFound("session x".into()).to_string(),
        "not found: session x"
    );
    assert_eq!(
        AppError::Precondition("not awaiting input".into()).to_string(),
        "precondition: not awaiting input"
    );
    assert_eq!(
        AppError::Spawn("exec failed".into()).to_string(),
        "spawn: exec failed"
    );
    assert_eq!(
        AppError::Protocol("line too long".into()).to_string(),
        "protocol: line too long"
    );
    assert_eq!(AppError::Io("pipe closed".into()).to_string(), "io: pipe closed");
}

#[test]
fn io_errors_convert_to_the_io_variant() {
    let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
    let err: AppError = io.into();
    assert!(matches!(err, AppError::Io(_)));
}

#[test]
fn toml_errors_convert_to_the_config_variant() {
    let toml_err = toml::from_str::<agent_console::GlobalConfig>("grace_seconds = []")
        .expect_err("invalid toml");
    let err: AppError = toml_err.into();
    assert!(matches!(err, AppError::Config(_)));
}

#[test]
fn error_is_std_error() {
    fn assert_error<E: std::error::Error>(_err: &E) {}
    assert_error(&AppError::Io("x".into()));
}
