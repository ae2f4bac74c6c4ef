//! Property-based tests for token classification, renewal timing and error
//! classification.

use proptest::prelude::*;
use std::{sync::Arc, time::Duration};
use test_utils::{
    ManualScheduler, MockAuthentication, MockTransport, client_error_status_strategy,
    lease_duration_strategy, login_token_strategy, server_error_status_strategy,
    token_value_strategy, vault_token_strategy,
};
use vault_session::{
    LifecycleAwareSessionManager, SessionManager, TokenKind, VaultError, VaultToken,
    renewal_delay,
};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn renewal_delay_is_lease_minus_five_with_one_second_floor(lease in lease_duration_strategy()) {
        let delay = renewal_delay(lease);
        let expected = lease.as_secs().saturating_sub(5).max(1);

        prop_assert_eq!(delay, Duration::from_secs(expected));
        prop_assert!(delay >= Duration::from_secs(1));
        prop_assert!(delay <= lease.max(Duration::from_secs(1)));
    }

    #[test]
    fn renewable_only_for_renewable_login_tokens_with_a_lease(token in vault_token_strategy()) {
        let expected = token.kind() == TokenKind::Login
            && token.renewable()
            && !token.lease_duration().is_zero();
        prop_assert_eq!(token.is_renewable(), expected);
    }

    #[test]
    fn static_tokens_are_never_renewable(value in token_value_strategy()) {
        let token = VaultToken::of(value);
        prop_assert!(!token.is_renewable());
        prop_assert!(!token.is_login_token());
        prop_assert_eq!(token.lease_duration(), Duration::ZERO);
    }

    #[test]
    fn debug_never_reveals_the_token(token in login_token_strategy()) {
        let debug = format!("{token:?}");
        prop_assert!(!debug.contains(token.token()));
        prop_assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn client_statuses_reset_the_session(status in client_error_status_strategy()) {
        let err = VaultError::status_error(status, "denied");
        prop_assert!(err.is_client_error());
        prop_assert_eq!(err.status(), Some(status));
    }

    #[test]
    fn server_statuses_are_retryable_not_client_errors(status in server_error_status_strategy()) {
        let err = VaultError::status_error(status, "unavailable");
        prop_assert!(!err.is_client_error());
        prop_assert!(err.is_retryable());
    }

    #[test]
    fn renewal_scheduled_iff_token_is_renewable(
        lease in lease_duration_strategy(),
        renewable in any::<bool>(),
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .start_paused(true)
            .build()
            .unwrap();

        runtime.block_on(async {
            let scheduler = Arc::new(ManualScheduler::new());
            let manager = LifecycleAwareSessionManager::new(
                Arc::new(MockAuthentication::new(lease, renewable)),
                scheduler.clone(),
                Arc::new(MockTransport::new()),
            );

            let token = manager.session_token().await.unwrap();
            if token.is_renewable() {
                prop_assert_eq!(scheduler.delays(), vec![renewal_delay(lease)]);
            } else {
                prop_assert_eq!(scheduler.scheduled_count(), 0);
            }
            Ok(())
        })?;
    }
}
