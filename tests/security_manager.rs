mod common;

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use jsonwebtoken::{EncodingKey, Header};
use serde_json::json;

use common::{
    ADMIN, INACTIVE, INACTIVE_PASSWORD, TESTER, TESTER_PASSWORD, TOKEN_SECRET, fixture,
};
use studymon::services::auth::{
    AuthError, Credential, Rolename, TokenError, UnauthorizedReason,
};

fn reason(res: Result<impl std::fmt::Debug, AuthError>) -> UnauthorizedReason {
    match res {
        Err(AuthError::Unauthorized(reason)) => reason,
        other => panic!("expected Unauthorized, got {other:?}"),
    }
}

#[tokio::test]
async fn context_is_built_once_per_user() {
    let fx = fixture(None);

    let first = fx.security.context_for(TESTER).await.unwrap();
    let reads = fx.store.reads.total();
    assert_eq!(reads, 3, "info + roles + devices");

    let second = fx.security.context_for(TESTER).await.unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(fx.store.reads.total(), reads);

    assert_eq!(first.user_id(), 2);
    assert_eq!(first.username(), TESTER);
    assert!(first.has_role(Rolename::DATA_COLLECTOR));
    assert!(first.has_device(1));
    assert!(!first.has_device(2));
}

#[tokio::test]
async fn invalidate_forces_a_rebuild() {
    let fx = fixture(None);

    let before = fx.security.context_for(TESTER).await.unwrap();
    fx.store.set_roles(TESTER, &[Rolename::ADMIN]);

    // Stale until invalidated
    let cached = fx.security.context_for(TESTER).await.unwrap();
    assert!(!cached.has_role(Rolename::ADMIN));

    fx.security.invalidate(Some(TESTER));
    let after = fx.security.context_for(TESTER).await.unwrap();
    assert!(!Arc::ptr_eq(&before, &after));
    assert!(after.has_role(Rolename::ADMIN));
    assert_eq!(fx.store.reads.infos.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn invalidate_all_clears_every_user() {
    let fx = fixture(None);
    fx.security.context_for(TESTER).await.unwrap();
    fx.security.context_for(ADMIN).await.unwrap();

    fx.security.invalidate(None);
    fx.security.context_for(TESTER).await.unwrap();
    fx.security.context_for(ADMIN).await.unwrap();

    assert_eq!(fx.store.reads.infos.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn unknown_user_context_is_not_found() {
    let fx = fixture(None);
    assert!(matches!(
        fx.security.context_for("ghost").await,
        Err(AuthError::NotFound(_))
    ));
    assert!(matches!(
        fx.security.context_for("").await,
        Err(AuthError::InputInvalid(_))
    ));
}

#[tokio::test]
async fn password_login_succeeds_and_warms_cache() {
    let fx = fixture(None);

    let ctx = fx
        .security
        .authenticate_password(TESTER, TESTER_PASSWORD)
        .await
        .unwrap();
    assert_eq!(ctx.username(), TESTER);

    let reads = fx.store.reads.total();
    fx.security
        .resolve(Credential::Basic {
            username: TESTER.to_string(),
            password: TESTER_PASSWORD.to_string(),
        })
        .await
        .unwrap();
    assert_eq!(fx.store.reads.total(), reads);
}

#[tokio::test]
async fn password_login_failures() {
    let fx = fixture(None);

    assert_eq!(
        reason(fx.security.authenticate_password("ghost", "whatever").await),
        UnauthorizedReason::UserNotFound
    );
    assert_eq!(
        reason(
            fx.security
                .authenticate_password(INACTIVE, INACTIVE_PASSWORD)
                .await
        ),
        UnauthorizedReason::UserInactive
    );
    assert_eq!(
        reason(fx.security.authenticate_password(TESTER, "wrong").await),
        UnauthorizedReason::InvalidPassword
    );
    assert_eq!(
        reason(fx.security.authenticate_password(TESTER, "").await),
        UnauthorizedReason::InvalidPassword
    );
}

#[tokio::test]
async fn token_round_trip() {
    let fx = fixture(None);

    let token = fx.security.issue_token(TESTER, 0).unwrap();
    assert_eq!(token.token_type, "bearer");
    assert_eq!(token.expires_in, 3600);
    assert!(fx.security.verify_token(&token.access_token));
    assert_eq!(
        fx.security.username_by_token(&token.access_token).unwrap(),
        TESTER
    );

    let ctx = fx
        .security
        .resolve(Credential::Bearer(token.access_token))
        .await
        .unwrap();
    assert_eq!(ctx.username(), TESTER);

    let short = fx.security.issue_token(TESTER, 60).unwrap();
    assert_eq!(short.expires_in, 60);
}

#[tokio::test]
async fn expired_or_foreign_tokens_are_rejected() {
    let fx = fixture(None);
    let now = chrono::Utc::now().timestamp();

    let expired = jsonwebtoken::encode(
        &Header::default(),
        &json!({"sub": TESTER, "exp": now - 5}),
        &EncodingKey::from_secret(TOKEN_SECRET.as_bytes()),
    )
    .unwrap();
    assert_eq!(
        reason(fx.security.resolve_token(&expired).await),
        UnauthorizedReason::Token(TokenError::Expired)
    );
    assert!(!fx.security.verify_token(&expired));

    let foreign = jsonwebtoken::encode(
        &Header::default(),
        &json!({"sub": TESTER, "exp": now + 600}),
        &EncodingKey::from_secret(b"some-other-secret-0123456789abcdef"),
    )
    .unwrap();
    assert_eq!(
        reason(fx.security.resolve_token(&foreign).await),
        UnauthorizedReason::Token(TokenError::InvalidSignature)
    );

    assert!(matches!(
        reason(fx.security.resolve_token("not-a-jwt").await),
        UnauthorizedReason::Token(_)
    ));
    assert_eq!(fx.store.reads.total(), 0);
}

#[tokio::test]
async fn token_for_deleted_user_is_unauthorized() {
    let fx = fixture(None);
    let token = fx.security.issue_token("ghost", 0).unwrap();

    assert_eq!(
        reason(fx.security.resolve_token(&token.access_token).await),
        UnauthorizedReason::UserNotFound
    );
}

#[tokio::test]
async fn issued_apikey_resolves_and_re_derives() {
    let fx = fixture(None);

    let issued = fx.accounts.renew_user_apikey(TESTER).await.unwrap();
    assert_eq!(issued.prefix.chars().count(), 5);
    assert!(issued.key.starts_with(&format!("{}.", issued.prefix)));
    assert_eq!(
        fx.store.apikey_hash_of(TESTER),
        Some(fx.security.fingerprint(&issued.key).unwrap())
    );

    let ctx = fx.security.resolve_apikey(&issued.key).await.unwrap();
    assert_eq!(ctx.username(), TESTER);

    let again = fx.security.apikey_for_user(TESTER).await.unwrap();
    assert_eq!(again.key, issued.key);

    // Cached owner: no further apikey lookups
    let lookups = fx.store.reads.apikeys.load(Ordering::SeqCst);
    fx.security
        .resolve(Credential::ApiKey(issued.key.clone()))
        .await
        .unwrap();
    assert_eq!(fx.store.reads.apikeys.load(Ordering::SeqCst), lookups);
}

#[tokio::test]
async fn revoked_apikey_stops_resolving() {
    let fx = fixture(None);
    let issued = fx.accounts.renew_user_apikey(TESTER).await.unwrap();
    fx.security.resolve_apikey(&issued.key).await.unwrap();

    fx.accounts.revoke_user_apikey(TESTER).await.unwrap();

    assert_eq!(
        reason(fx.security.resolve_apikey(&issued.key).await),
        UnauthorizedReason::InvalidApiKey
    );
    assert!(matches!(
        fx.security.apikey_for_user(TESTER).await,
        Err(AuthError::NotFound(_))
    ));
}

#[tokio::test]
async fn unknown_apikey_is_marked_invalid() {
    let fx = fixture(None);
    let bogus = "abcde.NotARealApiKeyBody";

    for _ in 0..3 {
        assert_eq!(
            reason(fx.security.resolve_apikey(bogus).await),
            UnauthorizedReason::InvalidApiKey
        );
    }
    assert_eq!(fx.store.reads.apikeys.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn malformed_apikey_never_reaches_the_store() {
    let fx = fixture(None);

    for bogus in ["no-dot-here", "a.b.c"] {
        assert_eq!(
            reason(fx.security.resolve_apikey(bogus).await),
            UnauthorizedReason::InvalidApiKey
        );
    }
    assert_eq!(
        reason(fx.security.resolve_apikey("").await),
        UnauthorizedReason::MissingCredential
    );
    assert_eq!(fx.store.reads.total(), 0);
}

#[tokio::test]
async fn store_failure_is_not_cached_as_invalid() {
    let fx = fixture(None);
    let issued = fx.accounts.renew_user_apikey(TESTER).await.unwrap();

    fx.store.set_failing(true);
    assert!(matches!(
        fx.security.resolve_apikey(&issued.key).await,
        Err(AuthError::Internal(_))
    ));

    fx.store.set_failing(false);
    let ctx = fx.security.resolve_apikey(&issued.key).await.unwrap();
    assert_eq!(ctx.username(), TESTER);
}

#[tokio::test]
async fn slow_store_times_out() {
    let fx = fixture(None);
    fx.store.set_delay(Some(Duration::from_secs(2)));

    assert_eq!(
        reason(fx.security.context_for(TESTER).await),
        UnauthorizedReason::StoreTimeout
    );

    fx.store.set_delay(None);
    assert!(fx.security.context_for(TESTER).await.is_ok());
}

#[tokio::test]
async fn no_credential_without_debug_user_is_anonymous() {
    let fx = fixture(None);

    let ctx = fx.security.resolve(Credential::None).await.unwrap();
    assert!(ctx.is_empty());
    assert_eq!(ctx.user_id(), 0);
    assert!(ctx.role_names().is_empty());
    assert_eq!(fx.store.reads.total(), 0);
}

#[tokio::test]
async fn debug_context_is_built_once() {
    let fx = fixture(Some(TESTER));

    let first = fx.security.default_context().await.unwrap();
    let second = fx.security.resolve(Credential::None).await.unwrap();

    assert_eq!(first.username(), TESTER);
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(fx.store.reads.infos.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn password_change_takes_effect_immediately() {
    let fx = fixture(None);
    fx.security
        .authenticate_password(TESTER, TESTER_PASSWORD)
        .await
        .unwrap();

    fx.accounts
        .set_user_password(TESTER, "brand-new-password")
        .await
        .unwrap();

    assert_eq!(
        reason(
            fx.security
                .authenticate_password(TESTER, TESTER_PASSWORD)
                .await
        ),
        UnauthorizedReason::InvalidPassword
    );
    fx.security
        .authenticate_password(TESTER, "brand-new-password")
        .await
        .unwrap();
}

#[tokio::test]
async fn deactivation_blocks_password_login() {
    let fx = fixture(None);
    fx.accounts.set_user_active(TESTER, false).await.unwrap();

    assert_eq!(
        reason(
            fx.security
                .authenticate_password(TESTER, TESTER_PASSWORD)
                .await
        ),
        UnauthorizedReason::UserInactive
    );
    assert!(matches!(
        fx.accounts.set_user_active("ghost", true).await,
        Err(AuthError::NotFound(_))
    ));
}

#[tokio::test]
async fn hashed_password_verifies() {
    let fx = fixture(None);
    let hash = fx.security.hash_password("s3cret").await.unwrap();

    assert!(hash.starts_with("$argon2id$"));
    assert!(fx.security.verify_password("s3cret", &hash).await.unwrap());
    assert!(!fx.security.verify_password("other", &hash).await.unwrap());
    assert!(matches!(
        fx.security.hash_password("").await,
        Err(AuthError::InputInvalid(_))
    ));
}

#[tokio::test]
async fn invalidate_wins_over_an_in_flight_build() {
    let fx = fixture(None);
    fx.store.set_delay(Some(Duration::from_millis(50)));

    let building = {
        let security = fx.security.clone();
        tokio::spawn(async move { security.context_for(TESTER).await })
    };

    // Inside the third store read of that build
    tokio::time::sleep(Duration::from_millis(120)).await;
    fx.store.set_roles(TESTER, &[Rolename::ADMIN]);
    fx.security.invalidate(Some(TESTER));

    building.await.unwrap().unwrap();

    fx.store.set_delay(None);
    let ctx = fx.security.context_for(TESTER).await.unwrap();
    assert!(ctx.has_role(Rolename::ADMIN));
    assert!(!ctx.has_role(Rolename::DATA_COLLECTOR));
}

#[tokio::test]
async fn revoke_during_apikey_lookup_keeps_key_revoked() {
    let fx = fixture(None);
    let issued = fx.accounts.renew_user_apikey(TESTER).await.unwrap();
    fx.store.set_delay(Some(Duration::from_millis(100)));

    let resolving = {
        let security = fx.security.clone();
        let key = issued.key.clone();
        tokio::spawn(async move { security.resolve_apikey(&key).await })
    };

    tokio::time::sleep(Duration::from_millis(30)).await;
    fx.accounts.revoke_user_apikey(TESTER).await.unwrap();
    let _ = resolving.await.unwrap();

    fx.store.set_delay(None);
    assert_eq!(
        reason(fx.security.resolve_apikey(&issued.key).await),
        UnauthorizedReason::InvalidApiKey
    );
}

#[tokio::test]
async fn deactivation_leaves_tokens_and_apikeys_alone() {
    let fx = fixture(None);
    let token = fx.security.issue_token(TESTER, 0).unwrap();
    let issued = fx.accounts.renew_user_apikey(TESTER).await.unwrap();

    fx.accounts.set_user_active(TESTER, false).await.unwrap();

    let by_token = fx
        .security
        .resolve_token(&token.access_token)
        .await
        .unwrap();
    assert_eq!(by_token.username(), TESTER);
    let by_key = fx.security.resolve_apikey(&issued.key).await.unwrap();
    assert_eq!(by_key.username(), TESTER);

    // Revoking is what shuts the API key off
    fx.accounts.revoke_user_apikey(TESTER).await.unwrap();
    assert_eq!(
        reason(fx.security.resolve_apikey(&issued.key).await),
        UnauthorizedReason::InvalidApiKey
    );
}
