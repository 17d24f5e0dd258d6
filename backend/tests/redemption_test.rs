mod helpers;

use chrono::{Duration, Utc};
use helpers::*;
use pool_finalizer::config::AccessConfig;
use pool_finalizer::error::AppError;
use pool_finalizer::models::*;
use pool_finalizer::services::{AccessRedemptionService, CodeGenerator, NewCodeBatch};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use uuid::Uuid;

/// CODE pool with one batch holding a single code
async fn seed_code(harness: &TestHarness, uses_per_code: i32, code: &str) -> (Uuid, CodeBatch, InviteCode) {
    let pool_id = Uuid::new_v4();
    harness.access_repo.set_policy(pool_id, AccessPolicy::Code).await;
    let batch = make_batch(harness.tenant_id, pool_id, uses_per_code, 1);
    let invite_code = make_code(&batch, code);
    harness.access_repo.insert_batch(batch.clone()).await;
    harness.access_repo.insert_code(invite_code.clone()).await;
    (pool_id, batch, invite_code)
}

async fn seed_invitation(harness: &TestHarness, email: &str, expires_in: Duration) -> (Uuid, Invitation) {
    let pool_id = Uuid::new_v4();
    harness.access_repo.set_policy(pool_id, AccessPolicy::Invite).await;
    let invitation = make_invitation(harness.tenant_id, pool_id, email, expires_in);
    harness.access_repo.insert_invitation(invitation.clone()).await;
    (pool_id, invitation)
}

#[tokio::test]
async fn test_concurrent_single_use_redemption() {
    let harness = TestHarness::new();
    let (_, batch, code) = seed_code(&harness, 1, "SINGLE23").await;

    let (first, second) = tokio::join!(
        harness.access.redeem_code(code.id, harness.tenant_id),
        harness.access.redeem_code(code.id, harness.tenant_id),
    );

    let results = [first, second];
    let successes = results.iter().filter(|r| r.is_ok()).count();
    let limited = results
        .iter()
        .filter(|r| matches!(r, Err(AppError::LimitReached(_))))
        .count();
    assert_eq!(successes, 1);
    assert_eq!(limited, 1);

    let stored = harness.access_repo.code(code.id).await;
    assert_eq!(stored.used_count, 1);
    assert_eq!(stored.status_enum(), CodeStatus::Used);
    assert_eq!(harness.access_repo.batch(batch.id).await.used_codes, 1);
}

#[tokio::test]
async fn test_multi_use_code_lifecycle() {
    let harness = TestHarness::new();
    let (pool_id, batch, code) = seed_code(&harness, 3, "MULTI234").await;

    // Step 1: First use leaves the code partially used
    let after_first = harness
        .access
        .redeem_code(code.id, harness.tenant_id)
        .await
        .expect("Failed to redeem code");
    assert_eq!(after_first.status_enum(), CodeStatus::PartiallyUsed);
    assert_eq!(after_first.remaining_uses(), 2);
    assert_eq!(harness.access_repo.batch(batch.id).await.used_codes, 0);

    // Step 2: Still valid by its text, in any case and with whitespace
    let validated = harness
        .access
        .validate_code("  multi234 ", pool_id, harness.tenant_id)
        .await
        .expect("Failed to validate code");
    assert_eq!(validated.id, code.id);

    // Step 3: Remaining uses
    harness.access.redeem_code(code.id, harness.tenant_id).await.unwrap();
    let last = harness.access.redeem_code(code.id, harness.tenant_id).await.unwrap();
    assert_eq!(last.status_enum(), CodeStatus::Used);
    assert_eq!(last.used_count, 3);
    assert_eq!(harness.access_repo.batch(batch.id).await.used_codes, 1);

    // Step 4: Exhausted
    let result = harness.access.redeem_code(code.id, harness.tenant_id).await;
    assert!(matches!(result, Err(AppError::LimitReached(_))));
    let result = harness.access.validate_code("MULTI234", pool_id, harness.tenant_id).await;
    assert!(matches!(result, Err(AppError::LimitReached(_))));
    assert_eq!(harness.access_repo.batch(batch.id).await.used_codes, 1);

    let redeemed = harness.audit_sink.with_action("code.redeemed");
    assert_eq!(redeemed.len(), 3);
}

#[tokio::test]
async fn test_expired_code_rejected() {
    let harness = TestHarness::new();
    let pool_id = Uuid::new_v4();
    harness.access_repo.set_policy(pool_id, AccessPolicy::Code).await;
    let mut batch = make_batch(harness.tenant_id, pool_id, 5, 1);
    batch.expires_at = Some(Utc::now() - Duration::hours(1));
    let code = make_code(&batch, "OLDCODE2");
    harness.access_repo.insert_batch(batch).await;
    harness.access_repo.insert_code(code.clone()).await;

    let result = harness.access.validate_code("OLDCODE2", pool_id, harness.tenant_id).await;
    assert!(matches!(result, Err(AppError::Expired(_))));

    let result = harness.access.redeem_code(code.id, harness.tenant_id).await;
    assert!(matches!(result, Err(AppError::Expired(_))));
    assert_eq!(harness.access_repo.code(code.id).await.used_count, 0);
}

#[tokio::test]
async fn test_pause_and_resume() {
    let harness = TestHarness::new();
    let (pool_id, _, code) = seed_code(&harness, 2, "PAUSE234").await;
    harness.access.redeem_code(code.id, harness.tenant_id).await.unwrap();

    let paused = harness
        .access
        .pause_code(code.id, harness.tenant_id)
        .await
        .expect("Failed to pause code");
    assert_eq!(paused.status_enum(), CodeStatus::Paused);

    let result = harness.access.validate_code("PAUSE234", pool_id, harness.tenant_id).await;
    assert!(matches!(result, Err(AppError::Paused(_))));
    let result = harness.access.redeem_code(code.id, harness.tenant_id).await;
    assert!(matches!(result, Err(AppError::Paused(_))));

    // Resuming restores the usage-derived status
    let resumed = harness
        .access
        .resume_code(code.id, harness.tenant_id)
        .await
        .expect("Failed to resume code");
    assert_eq!(resumed.status_enum(), CodeStatus::PartiallyUsed);

    let last = harness.access.redeem_code(code.id, harness.tenant_id).await.unwrap();
    assert_eq!(last.status_enum(), CodeStatus::Used);

    assert_eq!(harness.audit_sink.with_action("code.paused").len(), 1);
    assert_eq!(harness.audit_sink.with_action("code.resumed").len(), 1);
}

#[tokio::test]
async fn test_code_checks_pool_and_policy() {
    let harness = TestHarness::new();
    let (pool_id, _, _) = seed_code(&harness, 1, "POOLCODE").await;

    // Code exists but belongs to another pool
    let other_pool = Uuid::new_v4();
    harness.access_repo.set_policy(other_pool, AccessPolicy::Code).await;
    let result = harness.access.validate_code("POOLCODE", other_pool, harness.tenant_id).await;
    assert!(matches!(result, Err(AppError::NotFound(_))));

    // Pool does not take codes
    let public_pool = Uuid::new_v4();
    harness.access_repo.set_policy(public_pool, AccessPolicy::Public).await;
    let result = harness.access.validate_code("POOLCODE", public_pool, harness.tenant_id).await;
    assert!(matches!(result, Err(AppError::Conflict(_))));

    // Unknown pool
    let result = harness
        .access
        .validate_code("POOLCODE", Uuid::new_v4(), harness.tenant_id)
        .await;
    assert!(matches!(result, Err(AppError::NotFound(_))));

    // Unknown code
    let result = harness.access.validate_code("NOSUCH23", pool_id, harness.tenant_id).await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn test_register_with_code() {
    let harness = TestHarness::new();
    let (pool_id, _, code) = seed_code(&harness, 5, "JOINME23").await;
    let user_id = Uuid::new_v4();

    let redeemed = harness
        .access
        .register_with_code("joinme23", pool_id, harness.tenant_id, user_id)
        .await
        .expect("Failed to register with code");
    assert_eq!(redeemed.used_count, 1);

    let registrations = harness.access_repo.registrations().await;
    assert_eq!(registrations.len(), 1);
    assert_eq!(registrations[0].user_id, user_id);
    assert_eq!(registrations[0].source_id, code.id);
    assert_eq!(registrations[0].source, RegistrationSource::Code.as_str());

    // A second registration is rejected and does not consume a use
    let result = harness
        .access
        .register_with_code("JOINME23", pool_id, harness.tenant_id, user_id)
        .await;
    assert!(matches!(result, Err(AppError::Conflict(_))));
    assert_eq!(harness.access_repo.code(code.id).await.used_count, 1);
}

#[tokio::test]
async fn test_transient_conflicts_are_retried() {
    let harness = TestHarness::new();
    let (_, _, code) = seed_code(&harness, 1, "BUSY2345").await;
    harness.access_repo.transient_failures.store(2, Ordering::SeqCst);

    let redeemed = harness
        .access
        .redeem_code(code.id, harness.tenant_id)
        .await
        .expect("retries should absorb two conflicts");

    assert_eq!(redeemed.used_count, 1);
    assert_eq!(harness.access_repo.redeem_calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_transient_conflicts_exhaust_budget() {
    let harness = TestHarness::new();
    let (_, _, code) = seed_code(&harness, 1, "BUSY6789").await;
    harness.access_repo.transient_failures.store(10, Ordering::SeqCst);

    let result = harness.access.redeem_code(code.id, harness.tenant_id).await;

    assert!(matches!(result, Err(AppError::Transient(_))));
    assert_eq!(
        harness.access_repo.redeem_calls.load(Ordering::SeqCst),
        AccessConfig::default().redemption_max_attempts
    );
    assert_eq!(harness.access_repo.code(code.id).await.used_count, 0);
}

#[tokio::test]
async fn test_invitation_single_acceptance() {
    let harness = TestHarness::new();
    let (pool_id, invitation) = seed_invitation(&harness, "fan@example.com", Duration::days(7)).await;
    let user_id = Uuid::new_v4();

    // Email comparison ignores case
    let accepted = harness
        .access
        .register_with_invitation(&invitation.token, pool_id, harness.tenant_id, user_id, "Fan@Example.COM")
        .await
        .expect("Failed to accept invitation");
    assert_eq!(accepted.status_enum(), InvitationStatus::Accepted);
    assert_eq!(accepted.accepted_by, Some(user_id));
    assert!(accepted.accepted_at.is_some());

    let result = harness
        .access
        .redeem_invitation(invitation.id, harness.tenant_id, "fan@example.com")
        .await;
    assert!(matches!(result, Err(AppError::AlreadyUsed(_))));

    let result = harness
        .access
        .validate_invitation(&invitation.token, pool_id, harness.tenant_id)
        .await;
    assert!(matches!(result, Err(AppError::AlreadyUsed(_))));

    assert_eq!(harness.access_repo.registrations().await.len(), 1);
    assert_eq!(harness.audit_sink.with_action("invitation.accepted").len(), 1);
}

#[tokio::test]
async fn test_invitation_email_mismatch() {
    let harness = TestHarness::new();
    let (_, invitation) = seed_invitation(&harness, "fan@example.com", Duration::days(7)).await;

    let result = harness
        .access
        .redeem_invitation(invitation.id, harness.tenant_id, "someone@else.org")
        .await;
    assert!(matches!(result, Err(AppError::EmailMismatch(_))));

    // Still open for the right holder
    let accepted = harness
        .access
        .redeem_invitation(invitation.id, harness.tenant_id, "fan@example.com")
        .await
        .expect("Failed to accept invitation");
    assert_eq!(accepted.status_enum(), InvitationStatus::Accepted);
}

#[tokio::test]
async fn test_invitation_non_ascii_email() {
    let harness = TestHarness::new();
    let pool_id = Uuid::new_v4();
    harness.access_repo.set_policy(pool_id, AccessPolicy::Invite).await;

    let invitation = harness
        .access
        .create_invitation(pool_id, harness.tenant_id, "ÉLODIE@Example.com")
        .await
        .expect("Failed to create invitation");
    assert_eq!(invitation.email, "élodie@example.com");

    let accepted = harness
        .access
        .redeem_invitation(invitation.id, harness.tenant_id, "ÉLODIE@Example.com")
        .await
        .expect("Failed to accept invitation");
    assert_eq!(accepted.status_enum(), InvitationStatus::Accepted);
}

#[tokio::test]
async fn test_expired_invitation() {
    let harness = TestHarness::new();
    let (pool_id, invitation) = seed_invitation(&harness, "late@example.com", Duration::hours(-1)).await;

    let result = harness
        .access
        .validate_invitation(&invitation.token, pool_id, harness.tenant_id)
        .await;
    assert!(matches!(result, Err(AppError::Expired(_))));

    let result = harness
        .access
        .redeem_invitation(invitation.id, harness.tenant_id, "late@example.com")
        .await;
    assert!(matches!(result, Err(AppError::Expired(_))));
}

#[tokio::test]
async fn test_create_invitation() {
    let harness = TestHarness::new();
    let pool_id = Uuid::new_v4();
    harness.access_repo.set_policy(pool_id, AccessPolicy::Invite).await;

    let invitation = harness
        .access
        .create_invitation(pool_id, harness.tenant_id, "  New.Fan@Example.com ")
        .await
        .expect("Failed to create invitation");
    assert_eq!(invitation.email, "new.fan@example.com");
    assert_eq!(invitation.token.len(), 64);
    assert_eq!(invitation.status_enum(), InvitationStatus::Pending);
    assert!(invitation.expires_at > Utc::now() + Duration::hours(167));

    // One open invitation per email and pool
    let result = harness
        .access
        .create_invitation(pool_id, harness.tenant_id, "NEW.FAN@example.com")
        .await;
    assert!(matches!(result, Err(AppError::Conflict(_))));

    let result = harness.access.create_invitation(pool_id, harness.tenant_id, "not-an-email").await;
    assert!(matches!(result, Err(AppError::Validation(_))));

    // Token round trip
    let found = harness
        .access
        .validate_invitation(&invitation.token, pool_id, harness.tenant_id)
        .await
        .expect("Failed to validate invitation");
    assert_eq!(found.id, invitation.id);
    assert_eq!(harness.audit_sink.with_action("invitation.created").len(), 1);
}

#[tokio::test]
async fn test_invitation_requires_invite_pool() {
    let harness = TestHarness::new();
    let pool_id = Uuid::new_v4();
    harness.access_repo.set_policy(pool_id, AccessPolicy::Code).await;

    let result = harness.access.create_invitation(pool_id, harness.tenant_id, "fan@example.com").await;
    assert!(matches!(result, Err(AppError::Conflict(_))));
}

#[tokio::test]
async fn test_create_code_batch() {
    let harness = TestHarness::new();
    let pool_id = Uuid::new_v4();
    harness.access_repo.set_policy(pool_id, AccessPolicy::Code).await;

    let batch = harness
        .access
        .create_code_batch(NewCodeBatch {
            pool_id,
            tenant_id: harness.tenant_id,
            name: " Launch ".to_string(),
            code_count: 25,
            uses_per_code: 2,
            expires_at: None,
        })
        .await
        .expect("Failed to create batch");

    assert_eq!(batch.name, "Launch");
    assert_eq!(batch.code_count, 25);
    assert_eq!(batch.used_codes, 0);
    assert_eq!(harness.audit_sink.with_action("code_batch.created").len(), 1);

    let stored = harness.access_repo.batch(batch.id).await;
    assert_eq!(stored.id, batch.id);
}

#[tokio::test]
async fn test_code_generation_exhaustion() {
    let harness = TestHarness::new();
    let pool_id = Uuid::new_v4();
    harness.access_repo.set_policy(pool_id, AccessPolicy::Code).await;

    // A generator that always draws the same code
    let constant: CodeGenerator = Arc::new(|length| "A".repeat(length));
    let access = AccessRedemptionService::new(harness.access_repo.clone(), AccessConfig::default())
        .with_code_generator(constant);

    let request = NewCodeBatch {
        pool_id,
        tenant_id: harness.tenant_id,
        name: "Collisions".to_string(),
        code_count: 2,
        uses_per_code: 1,
        expires_at: None,
    };

    let result = access.create_code_batch(request).await;
    assert!(matches!(result, Err(AppError::Internal(_))));
}
