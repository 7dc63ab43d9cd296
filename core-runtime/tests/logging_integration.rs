//! Integration tests for logging setup and credential redaction

use bridge_traits::time::LogLevel;
use core_runtime::logging::{init_logging, redact_if_sensitive, redact_url, LogFormat, LoggingConfig};

#[test]
fn test_global_subscriber_installs_once() {
    // Only one global subscriber per process; this is the only test installing it.
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Debug);

    assert!(init_logging(config.clone()).is_ok());
    assert!(init_logging(config).is_err());
}

#[test]
fn test_invalid_filter_is_rejected_before_install() {
    let config = LoggingConfig::default().with_filter("core_metadata=loud");
    assert!(init_logging(config).is_err());
}

#[test]
fn test_provider_credentials_are_masked() {
    assert_eq!(redact_if_sensitive("fanart_api_key", "0123abcd"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("access_token", "ya29"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("artist", "Björk"), "Björk");
    assert_eq!(redact_if_sensitive("library_id", "lib-1"), "lib-1");
}

#[test]
fn test_request_urls_lose_their_keys() {
    let url = "https://ws.audioscrobbler.com/2.0/?method=artist.getinfo&api_key=abc&artist=Cher";
    let redacted = redact_url(url);

    assert!(!redacted.contains("abc"));
    assert!(redacted.contains("method=artist.getinfo"));
    assert!(redacted.contains("artist=Cher"));
}

#[test]
fn test_format_follows_build_profile() {
    let expected = if cfg!(debug_assertions) {
        LogFormat::Pretty
    } else {
        LogFormat::Json
    };
    assert_eq!(LoggingConfig::default().format, expected);
}
