//! Service tests against a throwaway Postgres. Run with `cargo test -- --ignored`.

mod common;

use assert_matches::assert_matches;
use axum::http::{Method, StatusCode};
use chrono::Utc;
use fake::faker::name::en::Name;
use fake::Fake;
use pretty_assertions::assert_eq;
use serde_json::json;
use sqlx::PgPool;
use tower::ServiceExt;
use uuid::Uuid;

use common::{access_token, app_with, authed_request, body_json, Mocks, TestDatabase};
use gym_manager::auth::{AuthError, RefreshTokenRequest, TokenType, UserRole, UserSession};
use gym_manager::config::DatabaseSeeder;
use gym_manager::error::AppError;
use gym_manager::models::{
    AssignTrainerRequest, CheckoutRequest, MembershipStatus, PaymentMethod, PaymentStatus,
    RegisterRequest, SendMessageRequest, SendOtpRequest, SleepLogRequest, SubscriptionPlan,
    UpgradeMembershipRequest, User, VerifyOtpRequest,
};
use gym_manager::services::SubscriptionService;

async fn insert_user(pool: &PgPool, role: UserRole) -> Uuid {
    let id = Uuid::new_v4();
    let name: String = Name().fake();
    sqlx::query(
        "INSERT INTO users (id, uid, email, password_hash, name, user_type, phone_number)
         VALUES ($1, $2, $3, 'hash', $4, $5, $6)",
    )
    .bind(id)
    .bind(format!("uid-{id}"))
    .bind(format!("{id}@example.com"))
    .bind(name)
    .bind(role)
    .bind(format!("+1555{:07}", id.as_u128() % 10_000_000))
    .execute(pool)
    .await
    .unwrap();
    id
}

async fn load_user(pool: &PgPool, user_id: Uuid) -> User {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await
        .unwrap()
}

fn switch_to(plan_id: Uuid) -> UpgradeMembershipRequest {
    serde_json::from_value(json!({ "new_plan_id": plan_id })).unwrap()
}

fn session(user_id: Uuid, role: UserRole) -> UserSession {
    UserSession {
        user_id,
        email: format!("{user_id}@example.com"),
        role,
        jti: Uuid::new_v4().to_string(),
    }
}

async fn seeded_plans(subscriptions: &SubscriptionService, pool: &PgPool) -> Vec<SubscriptionPlan> {
    DatabaseSeeder::new(pool.clone(), subscriptions.clone(), std::sync::Arc::new(common::MockIdentity::new()))
        .seed_all(None)
        .await
        .unwrap();
    subscriptions.list_plans().await.unwrap()
}

#[tokio::test]
#[ignore = "requires docker"]
async fn otp_registration_creates_member_with_membership() {
    let db = TestDatabase::new().await;

    let mut mocks = Mocks::default();
    mocks.mailer.expect_send().times(2).returning(|_| Ok(()));
    mocks.identity.expect_find_user_by_email().returning(|_| Ok(None));
    mocks
        .identity
        .expect_create_user()
        .times(1)
        .returning(|_, _, _| Ok("uid-registered".to_string()));
    let (_, state) = app_with(db.pool.clone(), mocks);

    let plans = seeded_plans(&state.subscriptions, &db.pool).await;
    let basic = plans.iter().find(|plan| plan.name == "Basic").unwrap();

    state
        .registration
        .send_otp(SendOtpRequest {
            email: Some("New.Member@example.com".to_string()),
        })
        .await
        .unwrap();

    let otp: i32 = sqlx::query_scalar("SELECT otp FROM otp_verifications WHERE email = $1")
        .bind("new.member@example.com")
        .fetch_one(&db.pool)
        .await
        .unwrap();

    let wrong_otp = if otp == 999_999 { 100_000 } else { otp + 1 };
    let wrong = state
        .registration
        .verify_otp(VerifyOtpRequest {
            email: Some("new.member@example.com".to_string()),
            otp: json!(wrong_otp),
        })
        .await;
    assert_matches!(wrong, Err(AppError::Validation(ref message)) if message == "Invalid OTP");

    state
        .registration
        .verify_otp(VerifyOtpRequest {
            email: Some("new.member@example.com".to_string()),
            otp: json!(otp.to_string()),
        })
        .await
        .unwrap();

    let request: RegisterRequest = serde_json::from_value(json!({
        "email": "new.member@example.com",
        "password": "Password123",
        "name": "New Member",
        "phone_number": "+15550001111",
        "subscription_plan_id": basic.id,
    }))
    .unwrap();
    let response = state.registration.register(request).await.unwrap();

    assert_eq!(response.uid, "uid-registered");
    assert_eq!(response.user_type, UserRole::User);
    assert_eq!(response.subscription_plan.as_deref(), Some("Basic"));
    assert_eq!(response.payment_status, Some(PaymentStatus::Completed));

    let memberships = state.subscriptions.memberships_for_user(response.user_id).await.unwrap();
    assert_eq!(memberships.len(), 1);
    assert_eq!(memberships[0].status, MembershipStatus::Active);
    assert_eq!(memberships[0].start_date, Utc::now().date_naive());

    let otp_left: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM otp_verifications")
        .fetch_one(&db.pool)
        .await
        .unwrap();
    assert_eq!(otp_left, 0);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn registration_without_verified_otp_is_rejected() {
    let db = TestDatabase::new().await;
    let (_, state) = app_with(db.pool.clone(), Mocks::default());

    let request: RegisterRequest = serde_json::from_value(json!({
        "email": "unverified@example.com",
        "password": "Password123",
        "name": "Unverified",
        "phone_number": "+15550002222",
        "user_type": "admin",
    }))
    .unwrap();

    let result = state.registration.register(request).await;
    assert_matches!(result, Err(AppError::Validation(_)));
}

#[tokio::test]
#[ignore = "requires docker"]
async fn upgrade_on_the_first_day_credits_the_full_price() {
    let db = TestDatabase::new().await;
    let (_, state) = app_with(db.pool.clone(), Mocks::default());
    let plans = seeded_plans(&state.subscriptions, &db.pool).await;
    let basic = plans.iter().find(|plan| plan.name == "Basic").unwrap();
    let annual = plans.iter().find(|plan| plan.name == "Annual").unwrap();
    let member = insert_user(&db.pool, UserRole::User).await;

    let first = state
        .subscriptions
        .upgrade(
            member,
            serde_json::from_value::<UpgradeMembershipRequest>(json!({ "new_plan_id": basic.id })).unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(first.credit_cents, 0);
    assert_eq!(first.amount_charged_cents, basic.price_cents);

    let again = state
        .subscriptions
        .upgrade(
            member,
            serde_json::from_value::<UpgradeMembershipRequest>(json!({ "new_plan_id": basic.id })).unwrap(),
        )
        .await;
    assert_matches!(again, Err(AppError::Conflict(_)));

    let switched = state
        .subscriptions
        .upgrade(
            member,
            serde_json::from_value::<UpgradeMembershipRequest>(json!({ "new_plan_id": annual.id })).unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(switched.credit_cents, basic.price_cents);
    assert_eq!(switched.amount_charged_cents, annual.price_cents - basic.price_cents);

    let memberships = state.subscriptions.memberships_for_user(member).await.unwrap();
    let active: Vec<_> = memberships
        .iter()
        .filter(|m| m.status == MembershipStatus::Active)
        .collect();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].plan_id, annual.id);

    let cancelled = state.subscriptions.cancel_active(member).await.unwrap();
    assert_eq!(cancelled.status, MembershipStatus::Cancelled);
    assert_matches!(
        state.subscriptions.cancel_active(member).await,
        Err(AppError::NotFound(ref message)) if message == "No active subscription found"
    );
}

#[tokio::test]
#[ignore = "requires docker"]
async fn plan_with_active_members_cannot_be_deleted() {
    let db = TestDatabase::new().await;
    let (_, state) = app_with(db.pool.clone(), Mocks::default());
    let plans = seeded_plans(&state.subscriptions, &db.pool).await;
    let basic = plans.iter().find(|plan| plan.name == "Basic").unwrap();
    let member = insert_user(&db.pool, UserRole::User).await;

    state
        .subscriptions
        .upgrade(
            member,
            serde_json::from_value::<UpgradeMembershipRequest>(json!({ "new_plan_id": basic.id })).unwrap(),
        )
        .await
        .unwrap();

    assert_matches!(state.subscriptions.delete_plan(basic.id).await, Err(AppError::Conflict(_)));
}

#[tokio::test]
#[ignore = "requires docker"]
async fn check_in_and_out_follow_the_open_visit() {
    let db = TestDatabase::new().await;
    let (_, state) = app_with(db.pool.clone(), Mocks::default());
    let member = insert_user(&db.pool, UserRole::User).await;

    state.attendance.check_in(member).await.unwrap();
    assert_matches!(state.attendance.check_in(member).await, Err(AppError::Conflict(_)));

    let closed = state.attendance.check_out(member).await.unwrap();
    assert!(closed.check_out_time.is_some());
    assert_matches!(state.attendance.check_out(member).await, Err(AppError::NotFound(_)));

    let streak = state.attendance.streak(member).await.unwrap();
    assert_eq!(streak.current_streak, 1);
    assert_eq!(streak.last_attended, Some(Utc::now().date_naive()));
}

#[tokio::test]
#[ignore = "requires docker"]
async fn sleep_log_dates_are_unique() {
    let db = TestDatabase::new().await;
    let (_, state) = app_with(db.pool.clone(), Mocks::default());
    let member = insert_user(&db.pool, UserRole::User).await;
    let today = Utc::now().date_naive();

    let log = SleepLogRequest {
        sleep_date: today,
        sleep_duration_hours: 7.5,
        sleep_quality: "Good".to_string(),
    };
    state.sleep_logs.create(member, log.clone()).await.unwrap();
    assert_matches!(state.sleep_logs.create(member, log).await, Err(AppError::Conflict(_)));

    state.sleep_logs.delete(member, today).await.unwrap();
    assert_matches!(state.sleep_logs.delete(member, today).await, Err(AppError::NotFound(_)));
}

#[tokio::test]
#[ignore = "requires docker"]
async fn members_message_only_their_trainer() {
    let db = TestDatabase::new().await;
    let (_, state) = app_with(db.pool.clone(), Mocks::default());
    let member = insert_user(&db.pool, UserRole::User).await;
    let trainer = insert_user(&db.pool, UserRole::Trainer).await;

    let hello = || SendMessageRequest {
        recipient_id: trainer,
        content: "Can we move Friday's session?".to_string(),
    };

    assert_matches!(
        state.messages.send(&session(member, UserRole::User), hello()).await,
        Err(AppError::Forbidden(_))
    );

    state
        .trainers
        .assign(AssignTrainerRequest {
            user_id: member,
            trainer_id: trainer,
        })
        .await
        .unwrap();

    let sent = state.messages.send(&session(member, UserRole::User), hello()).await.unwrap();
    assert_eq!(sent.recipient_id, trainer);

    let conversations = state.messages.conversations(trainer).await.unwrap();
    assert_eq!(conversations.len(), 1);
    assert_eq!(conversations[0].unread_count, 1);

    let thread = state
        .messages
        .thread(trainer, member, &Default::default())
        .await
        .unwrap();
    assert_eq!(thread.len(), 1);

    let conversations = state.messages.conversations(trainer).await.unwrap();
    assert_eq!(conversations[0].unread_count, 0);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn admin_routes_reject_other_roles() {
    let db = TestDatabase::new().await;
    let (app, _) = app_with(db.pool.clone(), Mocks::default());
    let member = insert_user(&db.pool, UserRole::User).await;
    let admin = insert_user(&db.pool, UserRole::Admin).await;

    let response = app
        .clone()
        .oneshot(authed_request(
            Method::GET,
            "/api/v1/users",
            &access_token(member, UserRole::User),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .clone()
        .oneshot(authed_request(
            Method::GET,
            "/api/v1/users?type=user",
            &access_token(admin, UserRole::Admin),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let users = body_json(response).await;
    assert_eq!(users.as_array().map(Vec::len), Some(1));

    let response = app
        .oneshot(authed_request(
            Method::GET,
            &format!("/api/v1/users/{admin}"),
            &access_token(member, UserRole::User),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn logged_out_tokens_are_rejected() {
    let db = TestDatabase::new().await;
    let (app, _) = app_with(db.pool.clone(), Mocks::default());
    let member = insert_user(&db.pool, UserRole::User).await;
    let token = access_token(member, UserRole::User);

    let response = app
        .clone()
        .oneshot(authed_request(Method::POST, "/api/v1/auth/logout", &token, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(authed_request(Method::GET, "/api/v1/users/profile", &token, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn refresh_tokens_only_mint_access_tokens() {
    let db = TestDatabase::new().await;
    let (app, state) = app_with(db.pool.clone(), Mocks::default());
    let member = insert_user(&db.pool, UserRole::User).await;
    let tokens = state.auth.issue_tokens(&load_user(&db.pool, member).await).await.unwrap();

    let response = app
        .clone()
        .oneshot(authed_request(Method::POST, "/api/v1/auth/logout", &tokens.access, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(authed_request(Method::GET, "/api/v1/users/profile", &tokens.refresh, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let swapped = state
        .auth
        .refresh_token(RefreshTokenRequest {
            refresh_token: tokens.access.clone(),
        })
        .await;
    assert_matches!(swapped, Err(AuthError::InvalidToken));
}

#[tokio::test]
#[ignore = "requires docker"]
async fn refresh_reflects_the_current_account() {
    let db = TestDatabase::new().await;
    let (_, state) = app_with(db.pool.clone(), Mocks::default());
    let member = insert_user(&db.pool, UserRole::User).await;
    let tokens = state.auth.issue_tokens(&load_user(&db.pool, member).await).await.unwrap();
    let refresh = || RefreshTokenRequest {
        refresh_token: tokens.refresh.clone(),
    };

    sqlx::query("UPDATE users SET user_type = 'trainer' WHERE id = $1")
        .bind(member)
        .execute(&db.pool)
        .await
        .unwrap();
    let renewed = state.auth.refresh_token(refresh()).await.unwrap();
    let claims = state
        .auth
        .jwt()
        .validate_token_of(&renewed.access_token, TokenType::Access)
        .unwrap();
    assert_eq!(claims.role, UserRole::Trainer);

    sqlx::query("UPDATE users SET is_active = FALSE WHERE id = $1")
        .bind(member)
        .execute(&db.pool)
        .await
        .unwrap();
    assert_matches!(state.auth.refresh_token(refresh()).await, Err(AuthError::AccountDisabled));

    sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(member)
        .execute(&db.pool)
        .await
        .unwrap();
    assert_matches!(state.auth.refresh_token(refresh()).await, Err(AuthError::InvalidToken));
}

#[tokio::test]
#[ignore = "requires docker"]
async fn repeated_wrong_otps_discard_the_code() {
    let db = TestDatabase::new().await;
    let mut mocks = Mocks::default();
    mocks.mailer.expect_send().times(1).returning(|_| Ok(()));
    let (_, state) = app_with(db.pool.clone(), mocks);

    state
        .registration
        .send_otp(SendOtpRequest {
            email: Some("guesser@example.com".to_string()),
        })
        .await
        .unwrap();
    let otp: i32 = sqlx::query_scalar("SELECT otp FROM otp_verifications WHERE email = $1")
        .bind("guesser@example.com")
        .fetch_one(&db.pool)
        .await
        .unwrap();
    let wrong_otp = if otp == 999_999 { 100_000 } else { otp + 1 };
    let guess = |otp: i32| VerifyOtpRequest {
        email: Some("guesser@example.com".to_string()),
        otp: json!(otp),
    };

    for _ in 0..4 {
        assert_matches!(
            state.registration.verify_otp(guess(wrong_otp)).await,
            Err(AppError::Validation(ref message)) if message == "Invalid OTP"
        );
    }
    assert_matches!(
        state.registration.verify_otp(guess(wrong_otp)).await,
        Err(AppError::Validation(ref message)) if message.starts_with("Too many failed attempts")
    );
    assert_matches!(
        state.registration.verify_otp(guess(otp)).await,
        Err(AppError::Validation(ref message)) if message == "OTP not found or already used"
    );
}

#[tokio::test]
#[ignore = "requires docker"]
async fn registering_a_local_email_conflicts_before_verification() {
    let db = TestDatabase::new().await;
    let (_, state) = app_with(db.pool.clone(), Mocks::default());
    let existing = insert_user(&db.pool, UserRole::User).await;

    let request: RegisterRequest = serde_json::from_value(json!({
        "email": format!("{existing}@example.com"),
        "password": "Password123",
        "name": "Second Signup",
        "phone_number": "+15550004444",
        "user_type": "admin",
    }))
    .unwrap();

    assert_matches!(state.registration.register(request).await, Err(AppError::Conflict(_)));
}

#[tokio::test]
#[ignore = "requires docker"]
async fn failed_registration_removes_the_identity_account() {
    let db = TestDatabase::new().await;
    let existing = insert_user(&db.pool, UserRole::User).await;
    let taken_uid = format!("uid-{existing}");

    let mut mocks = Mocks::default();
    mocks.identity.expect_find_user_by_email().returning(|_| Ok(None));
    let uid = taken_uid.clone();
    mocks
        .identity
        .expect_create_user()
        .times(1)
        .returning(move |_, _, _| Ok(uid.clone()));
    let uid = taken_uid.clone();
    mocks
        .identity
        .expect_delete_user()
        .withf(move |candidate| candidate.to_string() == uid)
        .times(1)
        .returning(|_| Ok(()));
    let (_, state) = app_with(db.pool.clone(), mocks);
    let plans = seeded_plans(&state.subscriptions, &db.pool).await;
    let basic = plans.iter().find(|plan| plan.name == "Basic").unwrap();

    sqlx::query("INSERT INTO otp_verifications (email, otp, verified_at) VALUES ($1, 123456, NOW())")
        .bind("late.duplicate@example.com")
        .execute(&db.pool)
        .await
        .unwrap();

    let request: RegisterRequest = serde_json::from_value(json!({
        "email": "late.duplicate@example.com",
        "password": "Password123",
        "name": "Late Duplicate",
        "phone_number": "+15550003333",
        "subscription_plan_id": basic.id,
    }))
    .unwrap();

    assert_matches!(state.registration.register(request).await, Err(AppError::Conflict(_)));

    let created: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE email = $1")
        .bind("late.duplicate@example.com")
        .fetch_one(&db.pool)
        .await
        .unwrap();
    assert_eq!(created, 0);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn checkout_prices_against_the_current_membership() {
    let db = TestDatabase::new().await;
    let (_, state) = app_with(db.pool.clone(), Mocks::default());
    let plans = seeded_plans(&state.subscriptions, &db.pool).await;
    let basic = plans.iter().find(|plan| plan.name == "Basic").unwrap();
    let annual = plans.iter().find(|plan| plan.name == "Annual").unwrap();
    let member = insert_user(&db.pool, UserRole::User).await;
    let trainer = insert_user(&db.pool, UserRole::Trainer).await;

    let fresh = state
        .payments
        .checkout(
            member,
            CheckoutRequest {
                plan_id: basic.id,
                trainer_id: None,
                payment_method: PaymentMethod::Online,
            },
        )
        .await
        .unwrap();
    assert_eq!(fresh.credit_cents, 0);
    assert_eq!(fresh.payment.amount_cents, basic.price_cents);
    assert_eq!(fresh.payment.status, PaymentStatus::Pending);

    state.subscriptions.upgrade(member, switch_to(basic.id)).await.unwrap();

    let switch = state
        .payments
        .checkout(
            member,
            CheckoutRequest {
                plan_id: annual.id,
                trainer_id: Some(trainer),
                payment_method: PaymentMethod::Online,
            },
        )
        .await
        .unwrap();
    assert_eq!(switch.credit_cents, basic.price_cents);
    assert_eq!(switch.payment.amount_cents, annual.price_cents - basic.price_cents);
    assert_eq!(switch.payment.trainer_id, Some(trainer));

    let not_a_trainer = state
        .payments
        .checkout(
            member,
            CheckoutRequest {
                plan_id: annual.id,
                trainer_id: Some(member),
                payment_method: PaymentMethod::Online,
            },
        )
        .await;
    assert_matches!(not_a_trainer, Err(AppError::Validation(_)));

    let no_training = state
        .payments
        .checkout(
            member,
            CheckoutRequest {
                plan_id: basic.id,
                trainer_id: Some(trainer),
                payment_method: PaymentMethod::Online,
            },
        )
        .await;
    assert_matches!(no_training, Err(AppError::Validation(ref message)) if message.contains("personal training"));
}

#[tokio::test]
#[ignore = "requires docker"]
async fn confirming_a_payment_switches_membership_and_assigns_trainer() {
    let db = TestDatabase::new().await;
    let mut mocks = Mocks::default();
    mocks.mailer.expect_send().times(1).returning(|_| Ok(()));
    let (_, state) = app_with(db.pool.clone(), mocks);
    let plans = seeded_plans(&state.subscriptions, &db.pool).await;
    let basic = plans.iter().find(|plan| plan.name == "Basic").unwrap();
    let annual = plans.iter().find(|plan| plan.name == "Annual").unwrap();
    let member = insert_user(&db.pool, UserRole::User).await;
    let stranger = insert_user(&db.pool, UserRole::User).await;
    let trainer = insert_user(&db.pool, UserRole::Trainer).await;

    state.subscriptions.upgrade(member, switch_to(basic.id)).await.unwrap();
    let pending = state
        .payments
        .checkout(
            member,
            CheckoutRequest {
                plan_id: annual.id,
                trainer_id: Some(trainer),
                payment_method: PaymentMethod::Online,
            },
        )
        .await
        .unwrap()
        .payment;

    assert_matches!(
        state.payments.confirm(&session(stranger, UserRole::User), pending.id).await,
        Err(AppError::Forbidden(_))
    );

    let confirmed = state
        .payments
        .confirm(&session(member, UserRole::User), pending.id)
        .await
        .unwrap();
    assert_eq!(confirmed.payment.status, PaymentStatus::Completed);
    assert!(confirmed.trainer_assigned);

    let active = state.subscriptions.active_membership(member).await.unwrap().unwrap();
    assert_eq!(active.id, confirmed.membership_id);
    assert_eq!(active.plan_id, annual.id);

    let assigned: Uuid = sqlx::query_scalar("SELECT trainer_id FROM trainer_assignments WHERE user_id = $1")
        .bind(member)
        .fetch_one(&db.pool)
        .await
        .unwrap();
    assert_eq!(assigned, trainer);

    assert_matches!(
        state.payments.confirm(&session(member, UserRole::User), pending.id).await,
        Err(AppError::Conflict(_))
    );
}

#[tokio::test]
#[ignore = "requires docker"]
async fn failed_payments_cannot_be_confirmed() {
    let db = TestDatabase::new().await;
    let (_, state) = app_with(db.pool.clone(), Mocks::default());
    let plans = seeded_plans(&state.subscriptions, &db.pool).await;
    let quarterly = plans.iter().find(|plan| plan.name == "Quarterly").unwrap();
    let member = insert_user(&db.pool, UserRole::User).await;

    let pending = state
        .payments
        .checkout(
            member,
            CheckoutRequest {
                plan_id: quarterly.id,
                trainer_id: None,
                payment_method: PaymentMethod::Offline,
            },
        )
        .await
        .unwrap()
        .payment;

    let failed = state.payments.mark_failed(pending.id).await.unwrap();
    assert_eq!(failed.status, PaymentStatus::Failed);

    assert_matches!(state.payments.mark_failed(pending.id).await, Err(AppError::Conflict(_)));
    assert_matches!(
        state.payments.confirm(&session(member, UserRole::User), pending.id).await,
        Err(AppError::Conflict(_))
    );
    assert_matches!(state.payments.mark_failed(Uuid::new_v4()).await, Err(AppError::NotFound(_)));
    assert!(state.subscriptions.active_membership(member).await.unwrap().is_none());
}

#[tokio::test]
#[ignore = "requires docker"]
async fn upgrade_mid_term_credits_the_unused_share() {
    let db = TestDatabase::new().await;
    let (_, state) = app_with(db.pool.clone(), Mocks::default());
    let plans = seeded_plans(&state.subscriptions, &db.pool).await;
    let basic = plans.iter().find(|plan| plan.name == "Basic").unwrap();
    let annual = plans.iter().find(|plan| plan.name == "Annual").unwrap();
    let member = insert_user(&db.pool, UserRole::User).await;
    let today = Utc::now().date_naive();

    state.subscriptions.upgrade(member, switch_to(basic.id)).await.unwrap();
    sqlx::query("UPDATE user_subscriptions SET start_date = $2, end_date = $3 WHERE user_id = $1 AND status = 'active'")
        .bind(member)
        .bind(today - chrono::Duration::days(10))
        .bind(today + chrono::Duration::days(20))
        .execute(&db.pool)
        .await
        .unwrap();

    let switched = state.subscriptions.upgrade(member, switch_to(annual.id)).await.unwrap();

    // 20 of 30 days unused
    let expected_credit = basic.price_cents * 20 / 30;
    assert_eq!(switched.credit_cents, expected_credit);
    assert_eq!(switched.amount_charged_cents, annual.price_cents - expected_credit);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn overdue_memberships_expire() {
    let db = TestDatabase::new().await;
    let (_, state) = app_with(db.pool.clone(), Mocks::default());
    let plans = seeded_plans(&state.subscriptions, &db.pool).await;
    let basic = plans.iter().find(|plan| plan.name == "Basic").unwrap();
    let lapsed = insert_user(&db.pool, UserRole::User).await;
    let current = insert_user(&db.pool, UserRole::User).await;
    let today = Utc::now().date_naive();

    state.subscriptions.upgrade(lapsed, switch_to(basic.id)).await.unwrap();
    state.subscriptions.upgrade(current, switch_to(basic.id)).await.unwrap();
    sqlx::query("UPDATE user_subscriptions SET start_date = $2, end_date = $3 WHERE user_id = $1")
        .bind(lapsed)
        .bind(today - chrono::Duration::days(40))
        .bind(today - chrono::Duration::days(1))
        .execute(&db.pool)
        .await
        .unwrap();

    assert_eq!(state.subscriptions.expire_overdue(today).await.unwrap(), 1);
    assert_eq!(state.subscriptions.expire_overdue(today).await.unwrap(), 0);

    let memberships = state.subscriptions.memberships_for_user(lapsed).await.unwrap();
    assert_eq!(memberships[0].status, MembershipStatus::Expired);
    assert!(state.subscriptions.active_membership(current).await.unwrap().is_some());
}

#[tokio::test]
#[ignore = "requires docker"]
async fn absence_for_unknown_user_is_not_found() {
    let db = TestDatabase::new().await;
    let (_, state) = app_with(db.pool.clone(), Mocks::default());

    assert_matches!(
        state.attendance.mark_absent(Uuid::new_v4(), Utc::now().date_naive()).await,
        Err(AppError::NotFound(ref message)) if message == "User not found"
    );
}
