//! Property-based tests for error classification.

use proptest::prelude::*;

use super::classifier::ErrorClassifier;
use super::error_type::ErrorType;
use super::raw::{ProviderKind, RawProviderError};
use super::refresh::TokenRefreshErrorType;

fn provider_strategy() -> impl Strategy<Value = ProviderKind> {
    prop_oneof![
        Just(ProviderKind::GoogleDrive),
        Just(ProviderKind::S3),
        Just(ProviderKind::AzureBlob),
        Just(ProviderKind::LocalFs),
        Just(ProviderKind::Other),
    ]
}

/// Messages mixing known provider vocabulary with arbitrary text.
fn message_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        ".{0,80}",
        Just("Token has been expired or revoked".to_string()),
        Just("<Code>NoSuchBucket</Code>".to_string()),
        Just("connection reset by peer".to_string()),
        Just("userRateLimitExceeded".to_string()),
        Just("AuthenticationFailed".to_string()),
    ]
}

fn raw_error_strategy() -> impl Strategy<Value = RawProviderError> {
    (
        provider_strategy(),
        message_strategy(),
        proptest::option::of(100u16..600),
        proptest::option::of("[A-Za-z_]{1,24}"),
        proptest::option::of("[A-Za-z]{1,24}"),
    )
        .prop_map(|(provider, message, status, code, reason)| RawProviderError {
            provider,
            message,
            http_status: status,
            code,
            reason,
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Classification always yields one of the known categories and is stable.
    #[test]
    fn prop_classify_is_total_and_idempotent(raw in raw_error_strategy()) {
        let first = ErrorClassifier::classify(&raw);
        let second = ErrorClassifier::classify(&raw.clone());

        prop_assert_eq!(first, second);
        prop_assert!(ErrorType::ALL.contains(&first));
    }

    /// The detailed bundle always agrees with the type's static metadata.
    #[test]
    fn prop_detailed_matches_metadata(raw in raw_error_strategy()) {
        let detailed = ErrorClassifier::classify_detailed(&raw);

        prop_assert_eq!(detailed.error_type, ErrorClassifier::classify(&raw));
        prop_assert_eq!(detailed.severity, detailed.error_type.severity());
        prop_assert_eq!(detailed.recoverable, detailed.error_type.is_recoverable());
        prop_assert_eq!(
            detailed.requires_user_intervention,
            detailed.error_type.requires_user_intervention()
        );
    }

    /// Refresh classification is total as well.
    #[test]
    fn prop_refresh_classification_is_total(raw in raw_error_strategy()) {
        let error_type = TokenRefreshErrorType::from_raw(&raw);
        prop_assert!(TokenRefreshErrorType::ALL.contains(&error_type));
        prop_assert_eq!(error_type, TokenRefreshErrorType::from_raw(&raw));
    }
}
