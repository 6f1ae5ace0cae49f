//! Tests for the error system.

use bearer_relay::auth::AuthError;
use bearer_relay::error::unified::*;
use bearer_relay::error::*;

#[test]
fn error_api_creation() {
    let err = RelayError::api(404, "Not found");
    assert!(matches!(&err, RelayError::Api { status: 404, .. }));
    assert_eq!(err.to_string(), "API error (status 404): Not found");
}

#[test]
fn error_helper_mappings_are_stable_for_major_variants() {
    struct Case {
        error: RelayError,
        expected_category: ErrorCategory,
        expected_recovery: RecoverySuggestion,
    }

    let network_error = reqwest::Client::new()
        .get("http://[::1")
        .build()
        .unwrap_err();
    let serde_error = serde_json::from_str::<serde_json::Value>("{not-json}").unwrap_err();

    let cases = vec![
        Case {
            error: RelayError::Refresh(AuthError::RefreshRejected { status: 401 }),
            expected_category: ErrorCategory::Authentication,
            expected_recovery: RecoverySuggestion::Reauthenticate,
        },
        Case {
            error: RelayError::Authentication(AuthError::NotLoggedIn),
            expected_category: ErrorCategory::Authentication,
            expected_recovery: RecoverySuggestion::Reauthenticate,
        },
        Case {
            error: RelayError::Transport(network_error),
            expected_category: ErrorCategory::Network,
            expected_recovery: RecoverySuggestion::RetryWithBackoff,
        },
        Case {
            error: RelayError::api(503, "unavailable"),
            expected_category: ErrorCategory::Server,
            expected_recovery: RecoverySuggestion::RetryWithBackoff,
        },
        Case {
            error: RelayError::api(403, "forbidden"),
            expected_category: ErrorCategory::Authentication,
            expected_recovery: RecoverySuggestion::Reauthenticate,
        },
        Case {
            error: RelayError::api(422, "invalid"),
            expected_category: ErrorCategory::Api,
            expected_recovery: RecoverySuggestion::ContactSupport,
        },
        Case {
            error: RelayError::Configuration("bad url".to_string()),
            expected_category: ErrorCategory::Configuration,
            expected_recovery: RecoverySuggestion::CheckConfiguration,
        },
        Case {
            error: RelayError::Storage("disk full".to_string()),
            expected_category: ErrorCategory::Storage,
            expected_recovery: RecoverySuggestion::CheckConfiguration,
        },
        Case {
            error: RelayError::Serialization(serde_error),
            expected_category: ErrorCategory::Serialization,
            expected_recovery: RecoverySuggestion::ContactSupport,
        },
    ];

    for case in cases {
        assert_eq!(case.error.category(), case.expected_category, "{}", case.error);
        assert_eq!(
            case.error.recovery_suggestion(),
            case.expected_recovery,
            "{}",
            case.error
        );
    }
}

#[test]
fn only_refresh_failures_end_the_session() {
    assert!(RelayError::Refresh(AuthError::Interrupted).is_session_ended());
    assert!(!RelayError::Authentication(AuthError::NotLoggedIn).is_session_ended());
    assert!(!RelayError::api(401, "expired").is_session_ended());
}

#[test]
fn storage_auth_errors_map_to_storage() {
    let err: RelayError = AuthError::Storage("read-only".to_string()).into();
    assert!(matches!(err, RelayError::Storage(_)));

    let err: RelayError = AuthError::InvalidResponse("no token".to_string()).into();
    assert!(matches!(
        err,
        RelayError::Authentication(AuthError::InvalidResponse(_))
    ));
}
